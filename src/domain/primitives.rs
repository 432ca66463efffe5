//! Domain primitives: CardId, EvaluationType, Weighting.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Stable card identifier (the upstream `uuid` column).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CardId(pub String);

impl CardId {
    /// Create a CardId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        CardId(id.into())
    }

    /// Get the id as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pricing channel a price applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationType {
    /// Physical, non-foil printing.
    #[default]
    Paper,
    /// Physical foil printing.
    Foil,
    /// Digital (MTGO) printing.
    Online,
}

impl EvaluationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationType::Paper => "paper",
            EvaluationType::Foil => "foil",
            EvaluationType::Online => "online",
        }
    }
}

impl std::fmt::Display for EvaluationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvaluationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paper" => Ok(EvaluationType::Paper),
            "foil" => Ok(EvaluationType::Foil),
            "online" | "mtgo" => Ok(EvaluationType::Online),
            other => Err(format!("unknown evaluation type: {}", other)),
        }
    }
}

/// How constituents are weighted when rolling an index forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weighting {
    /// Every priced constituent carries the same weight.
    #[default]
    Equal,
    /// Constituents are weighted by their previous price.
    Price,
}

impl Weighting {
    pub fn as_str(&self) -> &'static str {
        match self {
            Weighting::Equal => "equal",
            Weighting::Price => "price",
        }
    }
}

impl std::fmt::Display for Weighting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Weighting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equal" => Ok(Weighting::Equal),
            "price" => Ok(Weighting::Price),
            other => Err(format!("unknown weighting: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_type_serialization() {
        let json = serde_json::to_string(&EvaluationType::Foil).unwrap();
        assert_eq!(json, "\"foil\"");

        let parsed: EvaluationType = serde_json::from_str("\"online\"").unwrap();
        assert_eq!(parsed, EvaluationType::Online);
    }

    #[test]
    fn test_evaluation_type_from_str_accepts_mtgo() {
        assert_eq!(
            EvaluationType::from_str("MTGO").unwrap(),
            EvaluationType::Online
        );
        assert!(EvaluationType::from_str("digital").is_err());
    }

    #[test]
    fn test_weighting_default_is_equal() {
        assert_eq!(Weighting::default(), Weighting::Equal);
        assert_eq!(Weighting::from_str("price").unwrap(), Weighting::Price);
    }

    #[test]
    fn test_card_id_display() {
        let id = CardId::new("5f8287b1-5bb6-5f4c-ad17-316a40d5bb0c");
        assert_eq!(id.to_string(), "5f8287b1-5bb6-5f4c-ad17-316a40d5bb0c");
    }
}
