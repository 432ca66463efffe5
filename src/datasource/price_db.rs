//! Price source reading a local SQLite `prices` table.

use super::{sanitize_prices, DataSourceError, PriceSource};
use crate::domain::{CardId, EvaluationType};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::{BTreeSet, HashMap};

/// SQLite bind-variable budget per query, leaving room for the date and type binds.
const IDS_PER_QUERY: usize = 900;

/// Reads prices from a table shaped `prices(uuid TEXT, date TEXT, type TEXT, price REAL)`
/// with dates stored as `YYYY-MM-DD`.
#[derive(Debug, Clone)]
pub struct SqlitePriceSource {
    pool: SqlitePool,
}

impl SqlitePriceSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open an existing price database read-only.
    pub async fn connect(db_path: &str) -> Result<Self, DataSourceError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect(&format!("sqlite:{}?mode=ro", db_path))
            .await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl PriceSource for SqlitePriceSource {
    async fn fetch_prices(
        &self,
        date: NaiveDate,
        evaluation_type: EvaluationType,
        ids: &BTreeSet<CardId>,
    ) -> Result<HashMap<CardId, f64>, DataSourceError> {
        let ids: Vec<&CardId> = ids.iter().collect();
        let date = date.format("%Y-%m-%d").to_string();
        let mut prices = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(IDS_PER_QUERY) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT uuid, price FROM prices WHERE type = ? AND date = ? AND uuid IN ({})",
                placeholders
            );

            let mut query = sqlx::query(&sql)
                .bind(evaluation_type.as_str())
                .bind(&date);
            for id in chunk {
                query = query.bind(id.as_str());
            }

            for row in query.fetch_all(&self.pool).await? {
                let uuid: String = row.get("uuid");
                let price: Option<f64> = row.get("price");
                if let Some(price) = price {
                    prices.insert(CardId::new(uuid), price);
                }
            }
        }

        Ok(sanitize_prices(prices))
    }
}
