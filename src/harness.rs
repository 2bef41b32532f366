//! Harness context: owns the devices, topology, radio, and runtime, and
//! executes scenarios against them.

use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::config::{DeviceId, Timing};
use crate::device::DeviceHandle;
use crate::error::HarnessError;
use crate::node::SimDriver;
use crate::radio::Airwaves;
use crate::role::Role;
use crate::scenario::{Scenario, Step};
use crate::topology::TopologyController;
use crate::verify::{PingCheck, RoleCheck, ScenarioReport};

/// Owns everything one test case needs: an id-indexed arena of device
/// handles, the topology controller, the shared radio, and the runtime
/// the device tasks run on.
///
/// Teardown stops every device unconditionally and also runs from `Drop`,
/// so an assertion failure or an aborted scenario never leaks devices.
pub struct TestContext {
    devices: FxHashMap<DeviceId, DeviceHandle>,
    topology: TopologyController,
    air: Airwaves,
    timing: Timing,
    torn_down: bool,
    // Dropped last so device teardown still has a live runtime.
    runtime: Runtime,
}

impl TestContext {
    /// Bring up a context with `count` simulated devices, ids `1..=count`.
    pub fn with_simulated_devices(count: u8, timing: Timing) -> Result<Self, HarnessError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|err| HarnessError::Infrastructure(err.to_string()))?;

        let air = Airwaves::new();
        let mut devices = FxHashMap::default();
        for i in 1..=count {
            let id = DeviceId(i);
            let driver = SimDriver::new(id, timing, air.clone(), runtime.handle().clone());
            devices.insert(id, DeviceHandle::new(id, Box::new(driver)));
        }

        debug!(count, "context up");
        Ok(TestContext {
            devices,
            topology: TopologyController::new(),
            air,
            timing,
            torn_down: false,
            runtime,
        })
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// Handle to the runtime device tasks run on, for drivers created
    /// outside the context.
    pub fn runtime_handle(&self) -> tokio::runtime::Handle {
        self.runtime.handle().clone()
    }

    pub fn topology(&self) -> &TopologyController {
        &self.topology
    }

    pub fn device(&self, id: DeviceId) -> Result<&DeviceHandle, HarnessError> {
        self.devices.get(&id).ok_or(HarnessError::UnknownDevice(id))
    }

    pub fn device_mut(&mut self, id: DeviceId) -> Result<&mut DeviceHandle, HarnessError> {
        self.devices
            .get_mut(&id)
            .ok_or(HarnessError::UnknownDevice(id))
    }

    pub fn add_edge(&mut self, from: DeviceId, to: DeviceId) -> Result<(), HarnessError> {
        self.topology.add_edge(&self.devices, from, to)
    }

    pub fn remove_edge(&mut self, from: DeviceId, to: DeviceId) -> Result<(), HarnessError> {
        self.topology.remove_edge(&self.devices, from, to)
    }

    pub fn clear_edges(&mut self, from: DeviceId) -> Result<(), HarnessError> {
        self.topology.clear_edges(&self.devices, from)
    }

    pub fn set_filtering(&mut self, id: DeviceId, enabled: bool) -> Result<(), HarnessError> {
        self.topology.set_filtering(&self.devices, id, enabled)
    }

    pub fn connect_bidirectional(
        &mut self,
        a: DeviceId,
        b: DeviceId,
    ) -> Result<(), HarnessError> {
        self.topology.connect_bidirectional(&self.devices, a, b)
    }

    /// Execute a scenario, step by step, in order.
    ///
    /// Configuration and resource errors abort immediately with `Err`;
    /// role mismatches and unreachable pings are recorded in the report.
    /// The caller still owns teardown either way (and `Drop` backstops it).
    pub fn run(&mut self, scenario: &Scenario) -> Result<ScenarioReport, HarnessError> {
        info!(scenario = scenario.name(), "running scenario");
        let mut report = ScenarioReport::new(scenario.name());
        for step in scenario.steps() {
            self.execute(step, &mut report)?;
        }
        info!(
            scenario = scenario.name(),
            passed = report.passed(),
            "scenario finished"
        );
        Ok(report)
    }

    fn execute(&mut self, step: &Step, report: &mut ScenarioReport) -> Result<(), HarnessError> {
        match *step {
            Step::Configure { device, config } => self.device_mut(device)?.configure(&config),
            Step::SetWeight { device, weight } => self.device(device)?.set_weight(weight),
            Step::SetFiltering { device, enabled } => self.set_filtering(device, enabled),
            Step::AddEdge { from, to } => self.add_edge(from, to),
            Step::RemoveEdge { from, to } => self.remove_edge(from, to),
            Step::ClearEdges { device } => self.clear_edges(device),
            Step::ConnectBidirectional { a, b } => self.connect_bidirectional(a, b),
            Step::Start { device } => self.device_mut(device)?.start(),
            Step::Stop { device } => self.device_mut(device)?.stop(),
            Step::Wait { duration } => {
                debug!(?duration, "fixed wait");
                std::thread::sleep(duration);
                Ok(())
            }
            Step::WaitForRole {
                device,
                role,
                timeout,
            } => {
                let check = self.wait_for_role(device, role, timeout)?;
                report.record_role(check);
                Ok(())
            }
            Step::ExpectRole { device, role } => {
                let observed = self.device(device)?.role()?;
                report.record_role(RoleCheck {
                    device,
                    expected: role,
                    observed,
                    timed_out: false,
                });
                Ok(())
            }
            Step::PingSweep { from, to } => self.ping_sweep(from, to, report),
        }
    }

    /// Poll a device's role until it matches or the deadline passes.
    pub fn wait_for_role(
        &self,
        device: DeviceId,
        expected: Role,
        timeout: Duration,
    ) -> Result<RoleCheck, HarnessError> {
        let deadline = Instant::now() + timeout;
        loop {
            let observed = self.device(device)?.role()?;
            if observed == expected {
                return Ok(RoleCheck {
                    device,
                    expected,
                    observed,
                    timed_out: false,
                });
            }
            if Instant::now() >= deadline {
                warn!(%device, %expected, %observed, "role wait deadline passed");
                return Ok(RoleCheck {
                    device,
                    expected,
                    observed,
                    timed_out: true,
                });
            }
            std::thread::sleep(self.timing.tick);
        }
    }

    fn ping_sweep(
        &self,
        from: DeviceId,
        to: DeviceId,
        report: &mut ScenarioReport,
    ) -> Result<(), HarnessError> {
        let addresses = self.device(to)?.addresses()?;
        if addresses.is_empty() {
            warn!(%to, "ping sweep target holds no addresses");
        }
        for address in addresses {
            let reachable = self.device(from)?.ping(address)?;
            if !reachable {
                warn!(%from, %to, %address, "ping failed");
            }
            report.record_ping(PingCheck {
                from,
                to,
                address,
                reachable,
            });
        }
        Ok(())
    }

    /// Stop every device. Unconditional: runs on already-stopped devices
    /// and after failed assertions without raising.
    pub fn tear_down(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        for handle in self.devices.values_mut() {
            handle.tear_down();
        }
        debug!(listeners = self.air.listener_count(), "context torn down");
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.tear_down();
    }
}
