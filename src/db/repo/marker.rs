//! Version marker operations for the repository.

use crate::domain::VersionMarker;

use super::{now_ms, Repository, StoreError};

impl Repository {
    /// The last committed version marker, if any pass has completed.
    pub async fn version_marker(&self) -> Result<Option<VersionMarker>, StoreError> {
        let row: Option<(String, String, i64)> = sqlx::query_as(
            "SELECT catalog_version, criteria_fingerprint, updated_at FROM version_marker WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(catalog_version, criteria_fingerprint, updated_at_ms)| VersionMarker {
                catalog_version,
                criteria_fingerprint,
                updated_at_ms,
            },
        ))
    }

    /// Overwrite the version marker.
    pub async fn commit_version_marker(
        &self,
        catalog_version: &str,
        criteria_fingerprint: &str,
    ) -> Result<VersionMarker, StoreError> {
        let _writer = self.writer.lock().await;
        let updated_at_ms = now_ms();
        sqlx::query(
            r#"
            INSERT INTO version_marker (id, catalog_version, criteria_fingerprint, updated_at)
            VALUES (1, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                catalog_version = excluded.catalog_version,
                criteria_fingerprint = excluded.criteria_fingerprint,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(catalog_version)
        .bind(criteria_fingerprint)
        .bind(updated_at_ms)
        .execute(&self.pool)
        .await?;

        Ok(VersionMarker {
            catalog_version: catalog_version.to_string(),
            criteria_fingerprint: criteria_fingerprint.to_string(),
            updated_at_ms,
        })
    }
}
