//! Helpers shared by the unit suites.

use std::net::Ipv6Addr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

use crate::config::{DeviceConfig, DeviceId};
use crate::driver::{AddressSet, DeviceDriver};
use crate::error::HarnessError;
use crate::harness::TestContext;
use crate::protocol;
use crate::role::Role;

/// Inert driver that records calls and reports a settable role. Lets the
/// lifecycle and topology layers be tested without spawning tasks.
pub struct StubDriver {
    id64: u64,
    role: AtomicU8,
    calls: Mutex<Vec<String>>,
}

impl StubDriver {
    pub fn new(id: u8) -> Self {
        StubDriver {
            id64: protocol::hardware_id(DeviceId(id)),
            role: AtomicU8::new(Role::Detached.as_u8()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_role(&self, role: Role) {
        self.role.store(role.as_u8(), Ordering::Relaxed);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("call log poisoned").clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().expect("call log poisoned").push(call.into());
    }
}

impl DeviceDriver for StubDriver {
    fn configure(&self, config: &DeviceConfig) -> Result<(), HarnessError> {
        self.record(format!("configure weight={}", config.weight));
        Ok(())
    }

    fn set_weight(&self, weight: u8) -> Result<(), HarnessError> {
        self.record(format!("set_weight {weight}"));
        Ok(())
    }

    fn start(&self) -> Result<(), HarnessError> {
        self.record("start");
        Ok(())
    }

    fn stop(&self) -> Result<(), HarnessError> {
        self.record("stop");
        Ok(())
    }

    fn role(&self) -> Role {
        Role::from_u8(self.role.load(Ordering::Relaxed))
    }

    fn id64(&self) -> u64 {
        self.id64
    }

    fn addresses(&self) -> AddressSet {
        AddressSet::new()
    }

    fn ping(&self, dst: Ipv6Addr) -> Result<bool, HarnessError> {
        self.record(format!("ping {dst}"));
        Ok(true)
    }

    fn add_allowed_peer(&self, peer: u64) -> Result<(), HarnessError> {
        self.record(format!("add_allowed_peer {peer:#x}"));
        Ok(())
    }

    fn remove_allowed_peer(&self, peer: u64) -> Result<(), HarnessError> {
        self.record(format!("remove_allowed_peer {peer:#x}"));
        Ok(())
    }

    fn clear_allowed_peers(&self) -> Result<(), HarnessError> {
        self.record("clear_allowed_peers");
        Ok(())
    }

    fn set_filtering(&self, enabled: bool) -> Result<(), HarnessError> {
        self.record(format!("set_filtering {enabled}"));
        Ok(())
    }
}

/// Context with `count` simulated devices on the fast timing profile.
pub fn fast_context(count: u8) -> TestContext {
    TestContext::with_simulated_devices(count, crate::config::Timing::fast())
        .expect("bring up test context")
}
