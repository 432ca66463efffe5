//! Benchmark definition and constituent operations for the repository.

use crate::domain::{
    Benchmark, BenchmarkDefinition, CardId, CriteriaSet, EvaluationType, IndexPoint, Weighting,
};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;
use std::collections::BTreeSet;
use std::str::FromStr;

use super::{
    date_from_sql, ensure_exists, now_ms, BenchmarkSummary, DefinitionChange, Repository,
    StoreError,
};

impl Repository {
    /// Check whether a benchmark definition exists.
    pub async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        let found: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM benchmarks WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Create a benchmark with no constituents and an empty series.
    ///
    /// # Errors
    /// `AlreadyExists` if the name is taken.
    pub async fn create(&self, definition: &BenchmarkDefinition) -> Result<Benchmark, StoreError> {
        let _writer = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;
        let now = insert_definition(&mut tx, definition).await?;
        tx.commit().await?;

        Ok(Benchmark {
            name: definition.name.clone(),
            criteria: definition.criteria.clone(),
            evaluation_type: definition.evaluation_type,
            weighting: definition.weighting,
            constituents: BTreeSet::new(),
            created_at_ms: now,
            updated_at_ms: now,
        })
    }

    /// Load a benchmark with its current constituents.
    pub async fn get(&self, name: &str) -> Result<Option<Benchmark>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT name, criteria, evaluation_type, weighting, created_at, updated_at
            FROM benchmarks
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let criteria_json: String = row.get("criteria");
        let criteria: CriteriaSet = serde_json::from_str(&criteria_json)?;
        let evaluation_type: String = row.get("evaluation_type");
        let weighting: String = row.get("weighting");

        Ok(Some(Benchmark {
            name: row.get("name"),
            criteria,
            evaluation_type: EvaluationType::from_str(&evaluation_type).map_err(StoreError::Corrupt)?,
            weighting: Weighting::from_str(&weighting).map_err(StoreError::Corrupt)?,
            constituents: self.constituents(name).await?,
            created_at_ms: row.get("created_at"),
            updated_at_ms: row.get("updated_at"),
        }))
    }

    /// Replace the stored criteria, evaluation type and weighting.
    ///
    /// # Errors
    /// `UnknownBenchmark` if the benchmark was never created.
    pub async fn update_definition(&self, definition: &BenchmarkDefinition) -> Result<(), StoreError> {
        let _writer = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;
        update_definition_row(&mut tx, definition).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Replace the constituent set wholesale in one transaction.
    ///
    /// Idempotent. An empty set is stored as-is; dropping empty benchmarks is the
    /// orchestrator's decision.
    ///
    /// # Errors
    /// `UnknownBenchmark` if the benchmark was never created.
    pub async fn replace_constituents(
        &self,
        name: &str,
        ids: &BTreeSet<CardId>,
    ) -> Result<(), StoreError> {
        let _writer = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;
        ensure_exists(&mut tx, name).await?;
        write_constituents(&mut tx, name, ids).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Create or update a benchmark's definition and replace its constituents in a
    /// single transaction, so readers never see a definition without its constituents.
    pub async fn save_benchmark(
        &self,
        definition: &BenchmarkDefinition,
        ids: &BTreeSet<CardId>,
    ) -> Result<DefinitionChange, StoreError> {
        let _writer = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;

        let change = match stored_definition(&mut tx, &definition.name).await? {
            None => {
                insert_definition(&mut tx, definition).await?;
                DefinitionChange::Created
            }
            Some(stored) if stored != *definition => {
                update_definition_row(&mut tx, definition).await?;
                DefinitionChange::Updated
            }
            Some(_) => DefinitionChange::Unchanged,
        };
        write_constituents(&mut tx, &definition.name, ids).await?;

        tx.commit().await?;
        Ok(change)
    }

    /// Current constituents, ordered by id. Empty for unknown benchmarks.
    pub async fn constituents(&self, name: &str) -> Result<BTreeSet<CardId>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT card_id FROM benchmark_constituents WHERE benchmark = ? ORDER BY card_id",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| CardId::new(id)).collect())
    }

    /// Remove a benchmark definition together with its constituents, series, price
    /// snapshots and unvalued records.
    ///
    /// Idempotent; returns whether a definition was actually removed.
    pub async fn drop_benchmark(&self, name: &str) -> Result<bool, StoreError> {
        let _writer = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;

        for table in [
            "benchmark_constituents",
            "index_points",
            "price_snapshots",
            "unvalued_dates",
        ] {
            sqlx::query(&format!("DELETE FROM {} WHERE benchmark = ?", table))
                .bind(name)
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query("DELETE FROM benchmarks WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Summaries of every stored benchmark, ordered by name.
    pub async fn list(&self) -> Result<Vec<BenchmarkSummary>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT b.name, b.evaluation_type, b.weighting,
                   (SELECT COUNT(*) FROM benchmark_constituents c WHERE c.benchmark = b.name)
                       AS constituent_count,
                   p.evaluation_date AS latest_date,
                   p.level AS latest_level
            FROM benchmarks b
            LEFT JOIN index_points p
              ON p.benchmark = b.name
             AND p.evaluation_date = (
                 SELECT MAX(evaluation_date) FROM index_points WHERE benchmark = b.name
             )
            ORDER BY b.name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<BenchmarkSummary, StoreError> {
                let evaluation_type: String = row.get("evaluation_type");
                let weighting: String = row.get("weighting");
                let latest_date: Option<String> = row.get("latest_date");
                let latest_level: Option<f64> = row.get("latest_level");

                let latest = match (latest_date, latest_level) {
                    (Some(date), Some(level)) => Some(IndexPoint {
                        date: date_from_sql(&date)?,
                        level,
                    }),
                    _ => None,
                };

                Ok(BenchmarkSummary {
                    name: row.get("name"),
                    evaluation_type: EvaluationType::from_str(&evaluation_type)
                        .map_err(StoreError::Corrupt)?,
                    weighting: Weighting::from_str(&weighting).map_err(StoreError::Corrupt)?,
                    constituent_count: row.get("constituent_count"),
                    latest,
                })
            })
            .collect()
    }
}

async fn stored_definition(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<BenchmarkDefinition>, StoreError> {
    let row: Option<(String, String, String)> = sqlx::query_as(
        "SELECT criteria, evaluation_type, weighting FROM benchmarks WHERE name = ?",
    )
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?;

    let Some((criteria, evaluation_type, weighting)) = row else {
        return Ok(None);
    };
    Ok(Some(BenchmarkDefinition {
        name: name.to_string(),
        criteria: serde_json::from_str(&criteria)?,
        evaluation_type: EvaluationType::from_str(&evaluation_type).map_err(StoreError::Corrupt)?,
        weighting: Weighting::from_str(&weighting).map_err(StoreError::Corrupt)?,
    }))
}

/// Insert a new definition row, returning its creation time.
async fn insert_definition(
    conn: &mut SqliteConnection,
    definition: &BenchmarkDefinition,
) -> Result<i64, StoreError> {
    let criteria = serde_json::to_string(&definition.criteria)?;
    let now = now_ms();

    let result = sqlx::query(
        r#"
        INSERT INTO benchmarks (name, criteria, evaluation_type, weighting, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(name) DO NOTHING
        "#,
    )
    .bind(&definition.name)
    .bind(&criteria)
    .bind(definition.evaluation_type.as_str())
    .bind(definition.weighting.as_str())
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::AlreadyExists(definition.name.clone()));
    }
    Ok(now)
}

async fn update_definition_row(
    conn: &mut SqliteConnection,
    definition: &BenchmarkDefinition,
) -> Result<(), StoreError> {
    let criteria = serde_json::to_string(&definition.criteria)?;
    let result = sqlx::query(
        r#"
        UPDATE benchmarks
        SET criteria = ?, evaluation_type = ?, weighting = ?, updated_at = ?
        WHERE name = ?
        "#,
    )
    .bind(&criteria)
    .bind(definition.evaluation_type.as_str())
    .bind(definition.weighting.as_str())
    .bind(now_ms())
    .bind(&definition.name)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::UnknownBenchmark(definition.name.clone()));
    }
    Ok(())
}

async fn write_constituents(
    conn: &mut SqliteConnection,
    name: &str,
    ids: &BTreeSet<CardId>,
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM benchmark_constituents WHERE benchmark = ?")
        .bind(name)
        .execute(&mut *conn)
        .await?;

    for id in ids {
        sqlx::query("INSERT INTO benchmark_constituents (benchmark, card_id) VALUES (?, ?)")
            .bind(name)
            .bind(id.as_str())
            .execute(&mut *conn)
            .await?;
    }

    sqlx::query("UPDATE benchmarks SET updated_at = ? WHERE name = ?")
        .bind(now_ms())
        .bind(name)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
