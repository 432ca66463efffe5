//! Card records and catalog snapshots.

use super::CardId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A single attribute value on a card record.
///
/// Absent or null attributes are not represented; they are simply missing from the
/// record's attribute map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(f64),
    Text(String),
    Set(Vec<String>),
}

impl AttributeValue {
    /// Numeric view of the value, if it is a number or a text that parses as one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            AttributeValue::Text(s) => parse_number(s),
            AttributeValue::Set(_) => None,
        }
    }

    /// Stringified form used by substring matching and string equality.
    pub fn to_text(&self) -> String {
        match self {
            AttributeValue::Number(n) => format_number(*n),
            AttributeValue::Text(s) => s.clone(),
            AttributeValue::Set(items) => items.join(","),
        }
    }

    /// Convert a JSON value from a feed. Returns `None` for null.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(AttributeValue::Text(b.to_string())),
            Value::Number(n) => n.as_f64().map(AttributeValue::Number),
            Value::String(s) => Some(AttributeValue::Text(s.clone())),
            Value::Array(items) => Some(AttributeValue::Set(
                items
                    .iter()
                    .filter_map(|v| match v {
                        Value::Null => None,
                        Value::String(s) => Some(s.clone()),
                        other => Some(other.to_string()),
                    })
                    .collect(),
            )),
            Value::Object(_) => Some(AttributeValue::Text(value.to_string())),
        }
    }
}

/// Parse a trimmed string as a finite number.
pub fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Integers print without a fractional part so `2` and `"2"` stringify the same way.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// One printed card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRecord {
    pub id: CardId,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl CardRecord {
    pub fn new(id: CardId) -> Self {
        Self {
            id,
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn get(&self, attribute: &str) -> Option<&AttributeValue> {
        self.attributes.get(attribute)
    }
}

/// An immutable catalog as fetched for one rebalance pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSnapshot {
    /// Identifier that changes iff the underlying data changed.
    pub version_id: String,
    /// Every attribute name the catalog knows about, whether or not a given record has it.
    pub schema: BTreeSet<String>,
    pub records: Vec<CardRecord>,
}

impl CatalogSnapshot {
    /// Build a snapshot whose schema is the union of all record attribute names.
    pub fn new(version_id: impl Into<String>, records: Vec<CardRecord>) -> Self {
        let schema = records
            .iter()
            .flat_map(|r| r.attributes.keys().cloned())
            .collect();
        Self {
            version_id: version_id.into(),
            schema,
            records,
        }
    }

    /// Build a snapshot with an explicit schema (e.g. CSV headers).
    pub fn with_schema(
        version_id: impl Into<String>,
        schema: BTreeSet<String>,
        records: Vec<CardRecord>,
    ) -> Self {
        Self {
            version_id: version_id.into(),
            schema,
            records,
        }
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.schema.contains(attribute)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
