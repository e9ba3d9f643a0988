//! Benchmark harness core
//!
//! ## Modules
//!
//! - `discovery` - Variant discovery from the build-script / runner naming convention
//! - `process` - External process execution with merged output capture
//! - `metric` - Metric line extraction from captured run output
//! - `builder` - Build phase task execution
//! - `runner` - Run phase task execution (standardized benchmark invocation)
//! - `scheduler` - Sequential build phase, bounded concurrent run phase
//! - `report` - Result aggregation and reporters (console, JSON)
//! - `workload` - Workload ROM acquisition
//! - `error` - Fatal harness errors

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod builder;
pub mod discovery;
pub mod error;
pub mod metric;
pub mod process;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod workload;
