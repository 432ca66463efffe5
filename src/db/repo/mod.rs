//! Repository layer for benchmark storage.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by concern:
//! - `benchmarks.rs` - Benchmark definitions and constituent sets
//! - `series.rs` - Index points, price snapshots and unvalued dates
//! - `marker.rs` - The process-wide version marker
//!
//! Every mutating call runs in its own transaction and is committed before returning.
//! Write transactions are serialized through `Repository::writer`: a deferred SQLite
//! transaction that reads before writing cannot upgrade while another connection holds
//! the write lock, and `busy_timeout` does not apply to that upgrade.

mod benchmarks;
mod marker;
mod series;

use crate::domain::{EvaluationType, IndexPoint, Weighting};
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("benchmark already exists: {0}")]
    AlreadyExists(String),
    #[error("unknown benchmark: {0}")]
    UnknownBenchmark(String),
    #[error("benchmark {name} already has an index point for {date}")]
    DuplicateDate { name: String, date: NaiveDate },
    #[error("corrupt stored value: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Listing row for a stored benchmark.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkSummary {
    pub name: String,
    pub evaluation_type: EvaluationType,
    pub weighting: Weighting,
    pub constituent_count: i64,
    pub latest: Option<IndexPoint>,
}

/// What [`Repository::save_benchmark`] did to the stored definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionChange {
    Created,
    Updated,
    Unchanged,
}

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
    writer: Mutex<()>,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository {
            pool,
            writer: Mutex::new(()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn date_from_sql(value: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| StoreError::Corrupt(format!("date `{}`: {}", value, e)))
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Fail with `UnknownBenchmark` unless `name` has a definition row.
async fn ensure_exists(conn: &mut SqliteConnection, name: &str) -> Result<(), StoreError> {
    let found: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM benchmarks WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    match found {
        Some(_) => Ok(()),
        None => Err(StoreError::UnknownBenchmark(name.to_string())),
    }
}
