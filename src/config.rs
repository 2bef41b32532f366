//! Device configuration and harness timing profiles.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::mode::DeviceMode;

/// Network identifier shared by all devices in the conformance scenarios.
pub const DEFAULT_PAN_ID: u16 = 0xface;

/// Default election weight for a device that was never given one.
pub const DEFAULT_WEIGHT: u8 = 64;

/// Device identity inside a harness context.
///
/// Small positive integer; also the key of the context's device arena.
/// The stable 64-bit hardware id is derived from it, see
/// [`crate::protocol::hardware_id`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeviceId(pub u8);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration applied to a device before it starts.
///
/// Weight is the one field that may also be changed live: the election
/// reads it at the moment leadership is taken, not at start.
#[derive(Clone, Copy, Debug)]
pub struct DeviceConfig {
    pub pan_id: u16,
    pub mode: DeviceMode,
    pub weight: u8,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            pan_id: DEFAULT_PAN_ID,
            mode: DeviceMode::full(),
            weight: DEFAULT_WEIGHT,
        }
    }
}

/// Every interval the harness and the simulated protocol run on.
///
/// Scenario waits and the election engine pull from one profile, so tests
/// can scale time down without changing behavior; nothing reads a
/// hardcoded duration at a call site.
#[derive(Clone, Copy, Debug)]
pub struct Timing {
    /// Gap between partition advertisements from routers and leaders.
    pub advertisement_interval: Duration,
    /// How long a detached device probes for parents before concluding
    /// the network is empty and taking leadership.
    pub attach_window: Duration,
    /// Silence on the partition after which an attached non-leader
    /// detaches and starts over.
    pub leader_timeout: Duration,
    /// Housekeeping cadence of the device event loop, also the poll step
    /// of role waits.
    pub tick: Duration,
    /// Settle interval after starting a joiner.
    pub settle: Duration,
    /// Worst-case re-election plus propagation after a merge.
    pub convergence: Duration,
    /// Echo probe round-trip budget.
    pub ping_timeout: Duration,
}

impl Timing {
    /// Conformance profile: the intervals the certification run uses.
    pub const fn cert() -> Self {
        Timing {
            advertisement_interval: Duration::from_secs(1),
            attach_window: Duration::from_secs(1),
            leader_timeout: Duration::from_secs(120),
            tick: Duration::from_millis(250),
            settle: Duration::from_secs(3),
            convergence: Duration::from_secs(140),
            ping_timeout: Duration::from_secs(1),
        }
    }

    /// Scaled-down profile for in-process tests. Preserves the ordering
    /// constraints of the cert profile: attach window < settle,
    /// leader timeout + attach window < convergence.
    pub const fn fast() -> Self {
        Timing {
            advertisement_interval: Duration::from_millis(25),
            attach_window: Duration::from_millis(60),
            leader_timeout: Duration::from_millis(400),
            tick: Duration::from_millis(10),
            settle: Duration::from_millis(400),
            convergence: Duration::from_millis(2000),
            ping_timeout: Duration::from_millis(250),
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Timing::cert()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DeviceConfig::default();
        assert_eq!(config.pan_id, DEFAULT_PAN_ID);
        assert_eq!(config.weight, DEFAULT_WEIGHT);
        assert!(config.mode.router_eligible());
    }

    #[test]
    fn test_profiles_keep_ordering_constraints() {
        for timing in [Timing::cert(), Timing::fast()] {
            assert!(timing.attach_window < timing.settle);
            assert!(timing.leader_timeout + timing.attach_window < timing.convergence);
            assert!(timing.tick < timing.attach_window);
            assert!(timing.advertisement_interval < timing.leader_timeout);
        }
    }
}
