//! Data source abstraction for fetching card catalogs and daily prices.

use crate::domain::{CardId, CatalogSnapshot, EvaluationType};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::warn;

pub mod csv_catalog;
pub mod mock;
pub mod mtgjson;
pub mod price_db;

pub use csv_catalog::CsvCatalogSource;
pub use mock::{MockCatalogSource, MockPriceSource};
pub use mtgjson::MtgJsonSource;
pub use price_db::SqlitePriceSource;

/// Source of card catalog snapshots.
///
/// Implementations must return a `version_id` that changes iff the underlying data
/// changed, and must treat returned records as immutable.
#[async_trait]
pub trait CatalogSource: Send + Sync + fmt::Debug {
    /// Fetch only the current version identifier.
    ///
    /// Cheaper than [`CatalogSource::fetch_catalog`]; used to decide whether a rebalance
    /// is needed at all.
    async fn fetch_version(&self) -> Result<String, DataSourceError>;

    /// Fetch the full catalog with its version identifier.
    async fn fetch_catalog(&self) -> Result<CatalogSnapshot, DataSourceError>;
}

/// Source of daily card prices.
#[async_trait]
pub trait PriceSource: Send + Sync + fmt::Debug {
    /// Fetch prices for the given cards on a date under an evaluation type.
    ///
    /// # Returns
    /// Map from card id to price. Cards without a recorded price are absent from the map;
    /// absence never means zero.
    async fn fetch_prices(
        &self,
        date: NaiveDate,
        evaluation_type: EvaluationType,
        ids: &BTreeSet<CardId>,
    ) -> Result<HashMap<CardId, f64>, DataSourceError>;
}

/// Drop prices that are negative or not finite, logging each one.
pub fn sanitize_prices(prices: HashMap<CardId, f64>) -> HashMap<CardId, f64> {
    prices
        .into_iter()
        .filter(|(id, price)| {
            let valid = price.is_finite() && *price >= 0.0;
            if !valid {
                warn!(card = %id, price = %price, "Dropping invalid price from feed");
            }
            valid
        })
        .collect()
}

/// Error type for data source operations.
#[derive(Debug, Clone)]
pub enum DataSourceError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 429 rate limit, 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON, CSV or malformed rows)
    ParseError(String),
    /// Local file access error
    Io(String),
    /// Rate limit exceeded
    RateLimited,
    /// Other error
    Other(String),
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DataSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            DataSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DataSourceError::Io(msg) => write!(f, "IO error: {}", msg),
            DataSourceError::RateLimited => write!(f, "Rate limited"),
            DataSourceError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for DataSourceError {}

impl From<std::io::Error> for DataSourceError {
    fn from(err: std::io::Error) -> Self {
        DataSourceError::Io(err.to_string())
    }
}

impl From<sqlx::Error> for DataSourceError {
    fn from(err: sqlx::Error) -> Self {
        DataSourceError::Other(format!("price database: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datasource_error_display() {
        let err = DataSourceError::NetworkError("connection timeout".to_string());
        assert_eq!(err.to_string(), "Network error: connection timeout");

        let err = DataSourceError::HttpError {
            status: 429,
            message: "Too many requests".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 429: Too many requests");

        let err = DataSourceError::ParseError("invalid JSON".to_string());
        assert_eq!(err.to_string(), "Parse error: invalid JSON");

        let err = DataSourceError::RateLimited;
        assert_eq!(err.to_string(), "Rate limited");
    }

    #[test]
    fn test_sanitize_prices_drops_invalid() {
        let prices: HashMap<CardId, f64> = [
            (CardId::new("ok"), 1.5),
            (CardId::new("zero"), 0.0),
            (CardId::new("neg"), -1.0),
            (CardId::new("nan"), f64::NAN),
            (CardId::new("inf"), f64::INFINITY),
        ]
        .into_iter()
        .collect();

        let cleaned = sanitize_prices(prices);
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned.get(&CardId::new("ok")), Some(&1.5));
        assert_eq!(cleaned.get(&CardId::new("zero")), Some(&0.0));
    }
}
