//! Index series, price snapshot and unvalued-date operations for the repository.

use crate::domain::{CardId, IndexPoint, UnvaluedDate};
use chrono::NaiveDate;
use sqlx::sqlite::SqliteConnection;
use std::collections::HashMap;

use super::{date_from_sql, date_to_sql, ensure_exists, now_ms, Repository, StoreError};

impl Repository {
    /// Append one index point.
    ///
    /// # Errors
    /// `UnknownBenchmark` if the benchmark was never created, `DuplicateDate` if the date
    /// already has a point. The series is unchanged on error.
    pub async fn append_index_point(
        &self,
        name: &str,
        date: NaiveDate,
        level: f64,
    ) -> Result<(), StoreError> {
        let _writer = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;
        ensure_exists(&mut tx, name).await?;
        insert_index_point(&mut tx, name, date, level).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Append an index point and the prices it was computed from, atomically.
    ///
    /// # Errors
    /// Same as [`Repository::append_index_point`].
    pub async fn append_valuation(
        &self,
        name: &str,
        date: NaiveDate,
        level: f64,
        prices: &HashMap<CardId, f64>,
    ) -> Result<(), StoreError> {
        let _writer = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;
        ensure_exists(&mut tx, name).await?;
        insert_index_point(&mut tx, name, date, level).await?;
        insert_price_snapshot(&mut tx, name, date, prices).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Most recent index point, or `None` if the benchmark has not been valued yet.
    pub async fn latest_index(&self, name: &str) -> Result<Option<IndexPoint>, StoreError> {
        let row: Option<(String, f64)> = sqlx::query_as(
            r#"
            SELECT evaluation_date, level
            FROM index_points
            WHERE benchmark = ?
            ORDER BY evaluation_date DESC
            LIMIT 1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(date, level)| {
            Ok(IndexPoint {
                date: date_from_sql(&date)?,
                level,
            })
        })
        .transpose()
    }

    /// Full index series in ascending date order.
    pub async fn index_series(&self, name: &str) -> Result<Vec<IndexPoint>, StoreError> {
        let rows: Vec<(String, f64)> = sqlx::query_as(
            r#"
            SELECT evaluation_date, level
            FROM index_points
            WHERE benchmark = ?
            ORDER BY evaluation_date ASC
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(date, level)| {
                Ok(IndexPoint {
                    date: date_from_sql(&date)?,
                    level,
                })
            })
            .collect()
    }

    /// Store (or overwrite) the constituent prices observed on a date.
    ///
    /// # Errors
    /// `UnknownBenchmark` if the benchmark was never created.
    pub async fn store_price_snapshot(
        &self,
        name: &str,
        date: NaiveDate,
        prices: &HashMap<CardId, f64>,
    ) -> Result<(), StoreError> {
        let _writer = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;
        ensure_exists(&mut tx, name).await?;
        insert_price_snapshot(&mut tx, name, date, prices).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Each card's most recently observed price strictly before `date`.
    ///
    /// A card missing from the latest snapshot keeps the price of the last snapshot that
    /// had it, so a one-day gap in the feed does not lose its move across the gap.
    pub async fn last_known_prices_before(
        &self,
        name: &str,
        date: NaiveDate,
    ) -> Result<HashMap<CardId, f64>, StoreError> {
        let rows: Vec<(String, f64)> = sqlx::query_as(
            r#"
            SELECT s.card_id, s.price
            FROM price_snapshots s
            JOIN (
                SELECT card_id, MAX(evaluation_date) AS last_date
                FROM price_snapshots
                WHERE benchmark = ? AND evaluation_date < ?
                GROUP BY card_id
            ) latest
              ON latest.card_id = s.card_id AND latest.last_date = s.evaluation_date
            WHERE s.benchmark = ?
            "#,
        )
        .bind(name)
        .bind(date_to_sql(date))
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, price)| (CardId::new(id), price))
            .collect())
    }

    /// Record that a date was evaluated but produced no level.
    ///
    /// # Errors
    /// `UnknownBenchmark` if the benchmark was never created.
    pub async fn record_unvalued(
        &self,
        name: &str,
        date: NaiveDate,
        reason: &str,
    ) -> Result<(), StoreError> {
        let _writer = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;
        ensure_exists(&mut tx, name).await?;

        sqlx::query(
            r#"
            INSERT INTO unvalued_dates (benchmark, evaluation_date, reason, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(benchmark, evaluation_date) DO UPDATE SET
                reason = excluded.reason,
                created_at = excluded.created_at
            "#,
        )
        .bind(name)
        .bind(date_to_sql(date))
        .bind(reason)
        .bind(now_ms())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Dates recorded as unvalued, ascending.
    pub async fn unvalued_dates(&self, name: &str) -> Result<Vec<UnvaluedDate>, StoreError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT evaluation_date, reason
            FROM unvalued_dates
            WHERE benchmark = ?
            ORDER BY evaluation_date ASC
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(date, reason)| {
                Ok(UnvaluedDate {
                    date: date_from_sql(&date)?,
                    reason,
                })
            })
            .collect()
    }
}

async fn insert_index_point(
    conn: &mut SqliteConnection,
    name: &str,
    date: NaiveDate,
    level: f64,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        INSERT INTO index_points (benchmark, evaluation_date, level, created_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(benchmark, evaluation_date) DO NOTHING
        "#,
    )
    .bind(name)
    .bind(date_to_sql(date))
    .bind(level)
    .bind(now_ms())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::DuplicateDate {
            name: name.to_string(),
            date,
        });
    }

    // A date is either valued or unvalued, never both.
    sqlx::query("DELETE FROM unvalued_dates WHERE benchmark = ? AND evaluation_date = ?")
        .bind(name)
        .bind(date_to_sql(date))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn insert_price_snapshot(
    conn: &mut SqliteConnection,
    name: &str,
    date: NaiveDate,
    prices: &HashMap<CardId, f64>,
) -> Result<(), StoreError> {
    let date = date_to_sql(date);

    sqlx::query("DELETE FROM price_snapshots WHERE benchmark = ? AND evaluation_date = ?")
        .bind(name)
        .bind(&date)
        .execute(&mut *conn)
        .await?;

    for (id, price) in prices {
        sqlx::query(
            "INSERT INTO price_snapshots (benchmark, evaluation_date, card_id, price) VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(&date)
        .bind(id.as_str())
        .bind(*price)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
