//! Benchmark definitions, stored benchmarks and index points.

use super::{CardId, CriteriaSet, EvaluationType, Weighting};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// A configured benchmark: what to select and how to value it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkDefinition {
    pub name: String,
    pub criteria: CriteriaSet,
    #[serde(default)]
    pub evaluation_type: EvaluationType,
    #[serde(default)]
    pub weighting: Weighting,
}

impl BenchmarkDefinition {
    pub fn new(name: impl Into<String>, criteria: CriteriaSet) -> Self {
        Self {
            name: name.into(),
            criteria,
            evaluation_type: EvaluationType::default(),
            weighting: Weighting::default(),
        }
    }

    pub fn with_evaluation_type(mut self, evaluation_type: EvaluationType) -> Self {
        self.evaluation_type = evaluation_type;
        self
    }

    pub fn with_weighting(mut self, weighting: Weighting) -> Self {
        self.weighting = weighting;
        self
    }
}

/// A benchmark as persisted in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benchmark {
    pub name: String,
    pub criteria: CriteriaSet,
    pub evaluation_type: EvaluationType,
    pub weighting: Weighting,
    pub constituents: BTreeSet<CardId>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl Benchmark {
    /// The definition this benchmark was last created or updated from.
    pub fn definition(&self) -> BenchmarkDefinition {
        BenchmarkDefinition {
            name: self.name.clone(),
            criteria: self.criteria.clone(),
            evaluation_type: self.evaluation_type,
            weighting: self.weighting,
        }
    }
}

/// One entry of a benchmark's index series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexPoint {
    pub date: NaiveDate,
    pub level: f64,
}

/// A date that was evaluated but could not be valued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnvaluedDate {
    pub date: NaiveDate,
    pub reason: String,
}

/// A constituent and its value for one valuation; `None` means no price recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstituentPrice {
    pub id: CardId,
    pub price: Option<f64>,
}

impl ConstituentPrice {
    pub fn new(id: CardId, price: Option<f64>) -> Self {
        Self { id, price }
    }
}

/// Last catalog version and criteria fingerprint incorporated by a rebalance pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMarker {
    pub catalog_version: String,
    pub criteria_fingerprint: String,
    pub updated_at_ms: i64,
}

/// SHA-256 over the canonical JSON of all definitions, independent of their order.
pub fn criteria_fingerprint(definitions: &[BenchmarkDefinition]) -> String {
    let mut sorted: Vec<&BenchmarkDefinition> = definitions.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut hasher = Sha256::new();
    for def in sorted {
        // Serializing plain data structs cannot fail.
        let json = serde_json::to_string(def).unwrap_or_default();
        hasher.update(json.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Criterion, Operator};

    fn def(name: &str, cmc: f64) -> BenchmarkDefinition {
        BenchmarkDefinition::new(
            name,
            CriteriaSet::new(vec![Criterion::new("convertedManaCost", Operator::Eq, cmc)]),
        )
    }

    #[test]
    fn test_fingerprint_ignores_definition_order() {
        let a = criteria_fingerprint(&[def("two_drops", 2.0), def("five_drops", 5.0)]);
        let b = criteria_fingerprint(&[def("five_drops", 5.0), def("two_drops", 2.0)]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fingerprint_changes_with_criteria() {
        let a = criteria_fingerprint(&[def("two_drops", 2.0)]);
        let b = criteria_fingerprint(&[def("two_drops", 3.0)]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_changes_with_evaluation_type() {
        let paper = def("two_drops", 2.0);
        let foil = def("two_drops", 2.0).with_evaluation_type(EvaluationType::Foil);
        assert_ne!(criteria_fingerprint(&[paper]), criteria_fingerprint(&[foil]));
    }

    #[test]
    fn test_definition_defaults_when_deserialized() {
        let json = r#"{"name": "any", "criteria": []}"#;
        let def: BenchmarkDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.evaluation_type, EvaluationType::Paper);
        assert_eq!(def.weighting, Weighting::Equal);
        assert!(def.criteria.is_empty());
    }
}
