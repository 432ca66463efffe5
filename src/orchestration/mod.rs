//! Rebalance passes: version check, constituent refresh, valuation and marker commit.

pub mod locks;
pub mod orchestrator;
pub mod report;

pub use locks::BenchmarkLocks;
pub use orchestrator::{RebalanceError, RebalanceOrchestrator, RebalanceSettings};
pub use report::{BenchmarkOutcome, RunReport, RunStatus};
