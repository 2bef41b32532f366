//! Multi-device behavior suites against the simulated backend.

mod election_tests;
