//! Device handle: lifecycle guards over a backend driver.

use std::net::Ipv6Addr;

use tracing::{debug, warn};

use crate::config::{DeviceConfig, DeviceId};
use crate::driver::{AddressSet, DeviceDriver};
use crate::error::HarnessError;
use crate::role::Role;

/// Lifecycle of a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Stopped,
    Running,
    /// Released for good; every further operation fails.
    TornDown,
}

/// Owns one device for the duration of a harness context.
///
/// The handle enforces the lifecycle contract; the wrapped driver only
/// ever sees calls that are legal in its current state. Dropping a handle
/// tears the device down.
pub struct DeviceHandle {
    id: DeviceId,
    driver: Box<dyn DeviceDriver>,
    lifecycle: Lifecycle,
}

impl DeviceHandle {
    pub fn new(id: DeviceId, driver: Box<dyn DeviceDriver>) -> Self {
        DeviceHandle {
            id,
            driver,
            lifecycle: Lifecycle::Stopped,
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Stable hardware identity. The one query that stays valid on a
    /// torn-down handle: the topology graph keys on it.
    pub fn id64(&self) -> u64 {
        self.driver.id64()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    fn guard_live(&self) -> Result<(), HarnessError> {
        if self.lifecycle == Lifecycle::TornDown {
            return Err(HarnessError::resource(self.id, "handle torn down"));
        }
        Ok(())
    }

    /// Apply pre-start configuration. Only legal while stopped.
    pub fn configure(&mut self, config: &DeviceConfig) -> Result<(), HarnessError> {
        self.guard_live()?;
        if self.lifecycle == Lifecycle::Running {
            return Err(HarnessError::configuration(
                self.id,
                "configure while running",
            ));
        }
        self.driver.configure(config)
    }

    /// Change the election weight, before or after start.
    pub fn set_weight(&self, weight: u8) -> Result<(), HarnessError> {
        self.guard_live()?;
        self.driver.set_weight(weight)
    }

    /// Start the device. Calling twice is an error; a backend start
    /// failure is fatal to the scenario and is not retried.
    pub fn start(&mut self) -> Result<(), HarnessError> {
        self.guard_live()?;
        if self.lifecycle == Lifecycle::Running {
            return Err(HarnessError::configuration(self.id, "already started"));
        }
        self.driver.start()?;
        self.lifecycle = Lifecycle::Running;
        debug!(device = %self.id, "device started");
        Ok(())
    }

    /// Stop the device. No-op on an already-stopped device, so teardown
    /// can be unconditional.
    pub fn stop(&mut self) -> Result<(), HarnessError> {
        self.guard_live()?;
        if self.lifecycle == Lifecycle::Stopped {
            return Ok(());
        }
        self.driver.stop()?;
        self.lifecycle = Lifecycle::Stopped;
        debug!(device = %self.id, "device stopped");
        Ok(())
    }

    /// Release the device for good. Never fails; a backend stop error is
    /// logged and the handle is marked torn down regardless.
    pub fn tear_down(&mut self) {
        if self.lifecycle == Lifecycle::TornDown {
            return;
        }
        if self.lifecycle == Lifecycle::Running {
            if let Err(err) = self.driver.stop() {
                warn!(device = %self.id, %err, "stop failed during teardown");
            }
        }
        self.lifecycle = Lifecycle::TornDown;
    }

    /// Current role; `Detached` while stopped.
    pub fn role(&self) -> Result<Role, HarnessError> {
        self.guard_live()?;
        if !self.is_running() {
            return Ok(Role::Detached);
        }
        Ok(self.driver.role())
    }

    /// Addresses currently held; empty while stopped or before joining.
    pub fn addresses(&self) -> Result<AddressSet, HarnessError> {
        self.guard_live()?;
        if !self.is_running() {
            return Ok(AddressSet::new());
        }
        Ok(self.driver.addresses())
    }

    /// Reachability probe. Requires a running device.
    pub fn ping(&self, dst: Ipv6Addr) -> Result<bool, HarnessError> {
        self.guard_live()?;
        if !self.is_running() {
            return Err(HarnessError::resource(self.id, "ping on a stopped device"));
        }
        self.driver.ping(dst)
    }

    pub fn add_allowed_peer(&self, peer: u64) -> Result<(), HarnessError> {
        self.guard_live()?;
        self.driver.add_allowed_peer(peer)
    }

    pub fn remove_allowed_peer(&self, peer: u64) -> Result<(), HarnessError> {
        self.guard_live()?;
        self.driver.remove_allowed_peer(peer)
    }

    pub fn clear_allowed_peers(&self) -> Result<(), HarnessError> {
        self.guard_live()?;
        self.driver.clear_allowed_peers()
    }

    pub fn set_filtering(&self, enabled: bool) -> Result<(), HarnessError> {
        self.guard_live()?;
        self.driver.set_filtering(enabled)
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.tear_down();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::StubDriver;

    fn handle(id: u8) -> DeviceHandle {
        DeviceHandle::new(DeviceId(id), Box::new(StubDriver::new(id)))
    }

    #[test]
    fn test_configure_while_running_is_rejected() {
        let mut h = handle(1);
        h.start().unwrap();
        let err = h.configure(&DeviceConfig::default()).unwrap_err();
        assert!(matches!(err, HarnessError::Configuration { .. }));
    }

    #[test]
    fn test_double_start_is_rejected() {
        let mut h = handle(1);
        h.start().unwrap();
        let err = h.start().unwrap_err();
        assert!(matches!(err, HarnessError::Configuration { .. }));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut h = handle(1);
        h.stop().unwrap();
        h.start().unwrap();
        h.stop().unwrap();
        h.stop().unwrap();
    }

    #[test]
    fn test_set_weight_allowed_in_both_states() {
        let mut h = handle(1);
        h.set_weight(7).unwrap();
        h.start().unwrap();
        h.set_weight(9).unwrap();
    }

    #[test]
    fn test_torn_down_handle_rejects_everything() {
        let mut h = handle(1);
        h.start().unwrap();
        h.tear_down();
        h.tear_down(); // second teardown is a no-op

        assert!(matches!(h.role(), Err(HarnessError::Resource { .. })));
        assert!(matches!(h.stop(), Err(HarnessError::Resource { .. })));
        assert!(matches!(
            h.set_weight(1),
            Err(HarnessError::Resource { .. })
        ));
    }

    #[test]
    fn test_stopped_device_reports_detached_and_no_addresses() {
        let h = handle(1);
        assert_eq!(h.role().unwrap(), Role::Detached);
        assert!(h.addresses().unwrap().is_empty());
        assert!(h.ping("::1".parse().unwrap()).is_err());
    }
}
