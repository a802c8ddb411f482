//! End-to-end convergence tests against the in-memory runtime.

mod common;
mod properties_tests;
mod scenario_tests;
