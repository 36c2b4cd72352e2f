//! Metrics collection and reporting for the regbench harness
//!
//! - Outcome classification and per-outcome summaries
//! - Aggregate metrics collection across all clients
//! - Run report formatting

pub mod aggregate;
pub mod outcome;
pub mod reporting;

// Re-export public types for easier access
pub use aggregate::MetricsAggregator;
pub use outcome::Outcome;
pub use reporting::RunReport;
