//! Scenario-based tests for batchline

#[path = "../helpers.rs"]
mod helpers;

mod chaining;
mod fan_out;
mod guards;
mod resolution;
