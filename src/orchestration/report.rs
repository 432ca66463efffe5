use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Catalog version and criteria matched the marker; nothing was written.
    UpToDate,
    Completed,
}

/// What a rebalance pass did to one configured benchmark.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BenchmarkOutcome {
    Updated { constituents: usize, level: f64 },
    Unvalued { constituents: usize, reason: String },
    AlreadyValued { constituents: usize },
    Dropped,
    Skipped { reason: String },
}

impl BenchmarkOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, BenchmarkOutcome::Skipped { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub catalog_version: String,
    pub evaluation_date: NaiveDate,
    pub status: RunStatus,
    pub outcomes: BTreeMap<String, BenchmarkOutcome>,
    pub marker_committed: bool,
}

impl RunReport {
    pub fn skipped(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_skipped()).count()
    }
}
