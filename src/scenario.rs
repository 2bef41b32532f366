//! Ordered scenario steps and the shipped election scenarios.

use std::time::Duration;

use crate::config::{DeviceConfig, DeviceId, Timing, DEFAULT_PAN_ID};
use crate::mode::DeviceMode;
use crate::role::Role;

/// How role expectations wait for convergence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WaitStyle {
    /// Poll the role at the housekeeping cadence until it matches or the
    /// deadline passes.
    #[default]
    Poll,
    /// Sleep the full interval, then read once. Reproduces the original
    /// conformance run's opaque sleeps.
    Fixed,
}

/// One scenario step. Steps run strictly in order; no step begins before
/// the previous one completed.
#[derive(Clone, Copy, Debug)]
pub enum Step {
    Configure { device: DeviceId, config: DeviceConfig },
    SetWeight { device: DeviceId, weight: u8 },
    SetFiltering { device: DeviceId, enabled: bool },
    AddEdge { from: DeviceId, to: DeviceId },
    RemoveEdge { from: DeviceId, to: DeviceId },
    ClearEdges { device: DeviceId },
    ConnectBidirectional { a: DeviceId, b: DeviceId },
    Start { device: DeviceId },
    Stop { device: DeviceId },
    /// Blocking fixed-duration sleep.
    Wait { duration: Duration },
    /// Wait until the device reports the role, up to the timeout.
    /// Records a role check either way; a timeout marks the check as
    /// unconfirmed but never aborts the scenario.
    WaitForRole {
        device: DeviceId,
        role: Role,
        timeout: Duration,
    },
    /// Read the role once and record the check.
    ExpectRole { device: DeviceId, role: Role },
    /// Ping every address `to` currently holds, from `from`. Results are
    /// recorded but do not decide the scenario outcome.
    PingSweep { from: DeviceId, to: DeviceId },
}

/// An ordered list of steps with a name for reporting. Built once per
/// test case, executed exactly once.
#[derive(Clone, Debug)]
pub struct Scenario {
    name: String,
    steps: Vec<Step>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Scenario {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Builder-style append.
    pub fn step(mut self, step: Step) -> Self {
        self.push(step);
        self
    }

    /// Append a role expectation in the requested wait style.
    pub fn expect_role(&mut self, style: WaitStyle, device: DeviceId, role: Role, within: Duration) {
        match style {
            WaitStyle::Poll => self.push(Step::WaitForRole {
                device,
                role,
                timeout: within,
            }),
            WaitStyle::Fixed => {
                self.push(Step::Wait { duration: within });
                self.push(Step::ExpectRole { device, role });
            }
        }
    }
}

/// The split-weight election scenario.
///
/// Three devices on one PAN, star topology around the first. The star
/// center starts alone and leads; the two spokes join as routers. The
/// center then stops, partitioning the spokes from each other; connecting
/// them directly merges the survivors, and the higher-weight spoke must
/// win the new election. Finally the winner pings every address the loser
/// holds as a reachability sanity check.
pub fn split_weight(timing: &Timing, style: WaitStyle) -> Scenario {
    const CENTER: DeviceId = DeviceId(1);
    const HIGH: DeviceId = DeviceId(2);
    const LOW: DeviceId = DeviceId(3);

    let mut s = Scenario::new("split-weight");

    for (device, weight) in [(CENTER, 2), (HIGH, 1), (LOW, 0)] {
        s.push(Step::Configure {
            device,
            config: DeviceConfig {
                pan_id: DEFAULT_PAN_ID,
                mode: DeviceMode::full(),
                weight,
            },
        });
        s.push(Step::SetFiltering {
            device,
            enabled: true,
        });
    }
    s.push(Step::ConnectBidirectional { a: CENTER, b: HIGH });
    s.push(Step::ConnectBidirectional { a: CENTER, b: LOW });

    // Sequenced startup: first in an empty network leads, joiners route.
    s.push(Step::Start { device: CENTER });
    s.expect_role(style, CENTER, Role::Leader, timing.settle);
    s.push(Step::Start { device: HIGH });
    s.expect_role(style, HIGH, Role::Router, timing.settle);
    s.push(Step::Start { device: LOW });
    s.expect_role(style, LOW, Role::Router, timing.settle);

    // Partition: drop the leader, then merge the two survivors.
    s.push(Step::Stop { device: CENTER });
    s.push(Step::ConnectBidirectional { a: HIGH, b: LOW });

    // The higher weight must win the re-election.
    s.expect_role(style, HIGH, Role::Leader, timing.convergence);
    s.expect_role(style, LOW, Role::Router, timing.convergence);
    s.push(Step::ExpectRole {
        device: HIGH,
        role: Role::Leader,
    });

    s.push(Step::PingSweep {
        from: HIGH,
        to: LOW,
    });
    s
}
