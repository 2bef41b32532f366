//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::sync::Once;

use meshcert::ScenarioReport;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initialize tracing once per test binary. Honors `RUST_LOG`.
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_target(false)
            .with_test_writer()
            .init();
    });
}

/// Print the full report for debugging failed tests.
pub fn dump_report(report: &ScenarioReport) {
    eprintln!("--- scenario report ---");
    eprint!("{report}");
    eprintln!("-----------------------");
}
