//! SQLite-backed benchmark store.
//!
//! This module provides:
//! - Database initialization, pragmas and schema migrations
//! - The `Repository` holding benchmark definitions, constituents, index series,
//!   price snapshots and the version marker

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::{BenchmarkSummary, DefinitionChange, Repository, StoreError};
