//! End-to-end split-weight election scenario.
//!
//! Three devices in a star: the center leads, both spokes join as
//! routers. Stopping the center partitions the spokes; connecting them
//! merges the survivors and the higher-weight spoke must win the new
//! election, with the loser routing under it.

mod common;

use meshcert::{scenario, TestContext, Timing, WaitStyle};

#[test]
fn test_split_weight_scenario_passes() {
    common::init_tracing();

    let timing = Timing::fast();
    let mut ctx = TestContext::with_simulated_devices(3, timing).expect("bring up context");
    let plan = scenario::split_weight(&timing, WaitStyle::Poll);

    let report = ctx.run(&plan).expect("scenario aborted");
    ctx.tear_down();
    common::dump_report(&report);

    assert!(report.passed(), "role checks failed:\n{report}");

    // The new leader reached every address the surviving router holds.
    assert!(
        !report.ping_checks.is_empty(),
        "router held no addresses to probe"
    );
    assert!(
        report.ping_checks.iter().all(|p| p.reachable),
        "unreachable addresses:\n{report}"
    );
}

#[test]
fn test_report_file_roundtrip() {
    common::init_tracing();

    let timing = Timing::fast();
    let mut ctx = TestContext::with_simulated_devices(3, timing).expect("bring up context");
    let plan = scenario::split_weight(&timing, WaitStyle::Poll);
    let report = ctx.run(&plan).expect("scenario aborted");
    ctx.tear_down();

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("report.json");
    std::fs::write(&path, serde_json::to_string_pretty(&report).unwrap()).unwrap();

    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(parsed["scenario"], "split-weight");
    assert!(parsed["role_checks"].as_array().is_some_and(|c| !c.is_empty()));
}
