//! Scenario outcome collection and comparison.
//!
//! Pure bookkeeping: the orchestrator records expected-vs-observed pairs
//! here and the report decides pass/fail. Role checks carry the verdict;
//! ping checks are advisory and never change it.

use std::fmt;
use std::net::Ipv6Addr;

use serde::Serialize;

use crate::config::DeviceId;
use crate::role::Role;

/// One expected-vs-observed role comparison.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct RoleCheck {
    pub device: DeviceId,
    pub expected: Role,
    pub observed: Role,
    /// True when a polled wait gave up: the observed value is a final
    /// read after the deadline, so convergence can only be inferred from
    /// it, not confirmed.
    pub timed_out: bool,
}

impl RoleCheck {
    pub fn passed(&self) -> bool {
        self.expected == self.observed
    }
}

/// Outcome of one reachability probe during a ping sweep.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct PingCheck {
    pub from: DeviceId,
    pub to: DeviceId,
    pub address: Ipv6Addr,
    pub reachable: bool,
}

/// Everything a finished scenario produced.
#[derive(Clone, Debug, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub role_checks: Vec<RoleCheck>,
    pub ping_checks: Vec<PingCheck>,
}

impl ScenarioReport {
    pub fn new(scenario: impl Into<String>) -> Self {
        ScenarioReport {
            scenario: scenario.into(),
            role_checks: Vec::new(),
            ping_checks: Vec::new(),
        }
    }

    pub fn record_role(&mut self, check: RoleCheck) {
        self.role_checks.push(check);
    }

    pub fn record_ping(&mut self, check: PingCheck) {
        self.ping_checks.push(check);
    }

    /// All role checks passed. Ping results are reported alongside but do
    /// not decide the outcome.
    pub fn passed(&self) -> bool {
        self.role_checks.iter().all(RoleCheck::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &RoleCheck> {
        self.role_checks.iter().filter(|check| !check.passed())
    }

    pub fn reachable_pings(&self) -> usize {
        self.ping_checks.iter().filter(|p| p.reachable).count()
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "scenario '{}': {}",
            self.scenario,
            if self.passed() { "PASS" } else { "FAIL" }
        )?;
        for check in &self.role_checks {
            writeln!(
                f,
                "  device {}: expected {}, observed {}{}{}",
                check.device,
                check.expected,
                check.observed,
                if check.passed() { "" } else { "  <-- mismatch" },
                if check.timed_out {
                    " (wait deadline passed)"
                } else {
                    ""
                },
            )?;
        }
        if !self.ping_checks.is_empty() {
            writeln!(
                f,
                "  pings: {}/{} reachable",
                self.reachable_pings(),
                self.ping_checks.len()
            )?;
            for ping in self.ping_checks.iter().filter(|p| !p.reachable) {
                writeln!(
                    f,
                    "    device {} -> device {} via {}: unreachable",
                    ping.from, ping.to, ping.address
                )?;
            }
        }
        Ok(())
    }
}
