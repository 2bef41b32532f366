//! Conformance harness for weighted leader election in mesh networks.
//!
//! Provisions simulated network devices, shapes their connectivity
//! through a directed allow-list topology, drives ordered scenarios
//! (configuration, sequenced startup, partition, merge, convergence
//! waits), and verifies the elected role of every device.
//!
//! # Modules
//!
//! - [`device`] / [`driver`]: device handles and the backend seam
//! - [`node`]: in-process simulated device backend
//! - [`radio`]: shared broadcast medium with receiver-side filtering
//! - [`topology`]: directed allow-list graph management
//! - [`scenario`] / [`harness`]: ordered steps and their executor
//! - [`verify`]: expected-vs-observed reporting

// Use mimalloc as the global allocator for tests (non-Windows only)
#[cfg(not(windows))]
#[cfg(test)]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod config;
pub mod device;
pub mod driver;
pub mod error;
pub mod harness;
pub mod mode;
pub mod node;
pub mod protocol;
pub mod radio;
pub mod role;
pub mod scenario;
pub mod topology;
pub mod verify;

// Test helpers - available when the test-internals feature is enabled
#[cfg(any(test, feature = "test-internals"))]
pub mod test_helpers;

#[cfg(test)]
pub mod tests;

// Re-export commonly used items
pub use config::{DeviceConfig, DeviceId, Timing, DEFAULT_PAN_ID};
pub use device::DeviceHandle;
pub use driver::DeviceDriver;
pub use error::HarnessError;
pub use harness::TestContext;
pub use mode::DeviceMode;
pub use role::Role;
pub use scenario::{split_weight, Scenario, Step, WaitStyle};
pub use verify::ScenarioReport;
