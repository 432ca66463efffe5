//! Domain types for card catalogs, benchmark criteria and index series.
//!
//! This module provides:
//! - Card records with typed attribute values and immutable catalog snapshots
//! - Declarative criteria (attribute / operator / value) and criteria sets
//! - Benchmark definitions, stored benchmarks, index points and the version marker

pub mod benchmark;
pub mod card;
pub mod criteria;
pub mod primitives;

pub use benchmark::{
    criteria_fingerprint, Benchmark, BenchmarkDefinition, ConstituentPrice, IndexPoint,
    UnvaluedDate, VersionMarker,
};
pub use card::{AttributeValue, CardRecord, CatalogSnapshot};
pub use criteria::{CriteriaSet, Criterion, CriterionValue, Operator};
pub use primitives::{CardId, EvaluationType, Weighting};
