//! Declarative benchmark criteria.

use super::card::format_number;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Comparison applied by a [`Criterion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    Excludes,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Ge => "ge",
            Operator::Lt => "lt",
            Operator::Le => "le",
            Operator::Contains => "contains",
            Operator::Excludes => "excludes",
        }
    }

    /// Ordering operators need numbers on both sides.
    pub fn is_ordering(&self) -> bool {
        matches!(self, Operator::Gt | Operator::Ge | Operator::Lt | Operator::Le)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eq" | "=" | "==" => Ok(Operator::Eq),
            "ne" | "!=" | "<>" => Ok(Operator::Ne),
            "gt" | ">" => Ok(Operator::Gt),
            "ge" | ">=" => Ok(Operator::Ge),
            "lt" | "<" => Ok(Operator::Lt),
            "le" | "<=" => Ok(Operator::Le),
            "contains" | "contain" => Ok(Operator::Contains),
            "excludes" | "exclude" => Ok(Operator::Excludes),
            other => Err(format!("unknown operator: {}", other)),
        }
    }
}

impl TryFrom<String> for Operator {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Operator::from_str(&value)
    }
}

/// Right-hand side of a criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CriterionValue {
    Number(f64),
    Text(String),
}

impl CriterionValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CriterionValue::Number(n) => Some(*n),
            CriterionValue::Text(s) => super::card::parse_number(s),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            CriterionValue::Number(n) => format_number(*n),
            CriterionValue::Text(s) => s.clone(),
        }
    }
}

impl From<f64> for CriterionValue {
    fn from(n: f64) -> Self {
        CriterionValue::Number(n)
    }
}

impl From<&str> for CriterionValue {
    fn from(s: &str) -> Self {
        CriterionValue::Text(s.to_string())
    }
}

/// An atomic filter `(attribute, operator, value)`.
///
/// Deserializes from both `{"attribute", "operator", "value"}` and the older
/// `{"property", "operation", "value"}` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    #[serde(alias = "property")]
    pub attribute: String,
    #[serde(alias = "operation")]
    pub operator: Operator,
    pub value: CriterionValue,
}

impl Criterion {
    pub fn new(
        attribute: impl Into<String>,
        operator: Operator,
        value: impl Into<CriterionValue>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            operator,
            value: value.into(),
        }
    }
}

impl std::fmt::Display for Criterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.attribute,
            self.operator,
            self.value.to_text()
        )
    }
}

/// Ordered conjunction of criteria. Empty matches every record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CriteriaSet(pub Vec<Criterion>);

impl CriteriaSet {
    pub fn new(criteria: Vec<Criterion>) -> Self {
        CriteriaSet(criteria)
    }

    pub fn any() -> Self {
        CriteriaSet(Vec::new())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Criterion> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Criterion>> for CriteriaSet {
    fn from(criteria: Vec<Criterion>) -> Self {
        CriteriaSet(criteria)
    }
}
