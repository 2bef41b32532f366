//! Election behavior of the simulated backend, driven through scenarios.

use crate::config::{DeviceConfig, DeviceId, DEFAULT_PAN_ID};
use crate::mode::DeviceMode;
use crate::role::Role;
use crate::scenario::{Scenario, Step};
use crate::test_helpers::fast_context;

fn configure(s: &mut Scenario, device: DeviceId, mode: DeviceMode, weight: u8) {
    s.push(Step::Configure {
        device,
        config: DeviceConfig {
            pan_id: DEFAULT_PAN_ID,
            mode,
            weight,
        },
    });
    s.push(Step::SetFiltering {
        device,
        enabled: true,
    });
}

#[test]
fn test_solo_device_becomes_leader() {
    let mut ctx = fast_context(1);
    let timing = ctx.timing();

    let mut s = Scenario::new("solo");
    configure(&mut s, DeviceId(1), DeviceMode::full(), 1);
    s.push(Step::Start { device: DeviceId(1) });
    s.push(Step::WaitForRole {
        device: DeviceId(1),
        role: Role::Leader,
        timeout: timing.settle,
    });

    let report = ctx.run(&s).expect("scenario aborted");
    ctx.tear_down();
    assert!(report.passed(), "{report}");
}

#[test]
fn test_joiner_becomes_router_within_settle() {
    let mut ctx = fast_context(2);
    let timing = ctx.timing();

    let mut s = Scenario::new("join");
    configure(&mut s, DeviceId(1), DeviceMode::full(), 2);
    configure(&mut s, DeviceId(2), DeviceMode::full(), 1);
    s.push(Step::ConnectBidirectional {
        a: DeviceId(1),
        b: DeviceId(2),
    });
    s.push(Step::Start { device: DeviceId(1) });
    s.push(Step::WaitForRole {
        device: DeviceId(1),
        role: Role::Leader,
        timeout: timing.settle,
    });
    s.push(Step::Start { device: DeviceId(2) });
    s.push(Step::WaitForRole {
        device: DeviceId(2),
        role: Role::Router,
        timeout: timing.settle,
    });
    // The joiner found an elected leader, so it must never lead.
    s.push(Step::ExpectRole {
        device: DeviceId(1),
        role: Role::Leader,
    });

    let report = ctx.run(&s).expect("scenario aborted");
    ctx.tear_down();
    assert!(report.passed(), "{report}");
}

#[test]
fn test_joiner_without_router_eligibility_stays_child() {
    let mut ctx = fast_context(2);
    let timing = ctx.timing();

    let mut s = Scenario::new("child");
    configure(&mut s, DeviceId(1), DeviceMode::full(), 2);
    // Receiver on and secure, but not a full-function device.
    configure(&mut s, DeviceId(2), "rsn".parse().unwrap(), 1);
    s.push(Step::ConnectBidirectional {
        a: DeviceId(1),
        b: DeviceId(2),
    });
    s.push(Step::Start { device: DeviceId(1) });
    s.push(Step::WaitForRole {
        device: DeviceId(1),
        role: Role::Leader,
        timeout: timing.settle,
    });
    s.push(Step::Start { device: DeviceId(2) });
    s.push(Step::WaitForRole {
        device: DeviceId(2),
        role: Role::Child,
        timeout: timing.settle,
    });
    // Still a child a full settle later: no upgrade ever happens.
    s.push(Step::Wait {
        duration: timing.settle,
    });
    s.push(Step::ExpectRole {
        device: DeviceId(2),
        role: Role::Child,
    });

    let report = ctx.run(&s).expect("scenario aborted");
    ctx.tear_down();
    assert!(report.passed(), "{report}");
}

#[test]
fn test_merge_elects_higher_weight() {
    let mut ctx = fast_context(2);
    let timing = ctx.timing();

    let mut s = Scenario::new("merge");
    configure(&mut s, DeviceId(1), DeviceMode::full(), 1);
    configure(&mut s, DeviceId(2), DeviceMode::full(), 0);
    // No edges yet: both start isolated and lead their own partitions.
    s.push(Step::Start { device: DeviceId(1) });
    s.push(Step::Start { device: DeviceId(2) });
    s.push(Step::WaitForRole {
        device: DeviceId(1),
        role: Role::Leader,
        timeout: timing.settle,
    });
    s.push(Step::WaitForRole {
        device: DeviceId(2),
        role: Role::Leader,
        timeout: timing.settle,
    });

    s.push(Step::ConnectBidirectional {
        a: DeviceId(1),
        b: DeviceId(2),
    });
    s.push(Step::WaitForRole {
        device: DeviceId(2),
        role: Role::Router,
        timeout: timing.convergence,
    });
    s.push(Step::ExpectRole {
        device: DeviceId(1),
        role: Role::Leader,
    });

    let report = ctx.run(&s).expect("scenario aborted");
    ctx.tear_down();
    assert!(report.passed(), "{report}");
}

#[test]
fn test_weight_set_before_start_wins_the_merge() {
    let mut ctx = fast_context(2);
    let timing = ctx.timing();

    let mut s = Scenario::new("live-weight");
    configure(&mut s, DeviceId(1), DeviceMode::full(), 1);
    configure(&mut s, DeviceId(2), DeviceMode::full(), 0);
    // Raise the second device's weight through the live setter; the
    // election must read this value, not the configured one.
    s.push(Step::SetWeight {
        device: DeviceId(2),
        weight: 5,
    });
    s.push(Step::Start { device: DeviceId(1) });
    s.push(Step::Start { device: DeviceId(2) });
    s.push(Step::WaitForRole {
        device: DeviceId(1),
        role: Role::Leader,
        timeout: timing.settle,
    });
    s.push(Step::WaitForRole {
        device: DeviceId(2),
        role: Role::Leader,
        timeout: timing.settle,
    });

    s.push(Step::ConnectBidirectional {
        a: DeviceId(1),
        b: DeviceId(2),
    });
    s.push(Step::WaitForRole {
        device: DeviceId(1),
        role: Role::Router,
        timeout: timing.convergence,
    });
    s.push(Step::ExpectRole {
        device: DeviceId(2),
        role: Role::Leader,
    });

    let report = ctx.run(&s).expect("scenario aborted");
    ctx.tear_down();
    assert!(report.passed(), "{report}");
}
