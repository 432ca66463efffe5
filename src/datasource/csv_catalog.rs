//! Catalog source reading the newest card CSV export from a directory.

use super::{CatalogSource, DataSourceError};
use crate::domain::{AttributeValue, CardId, CardRecord, CatalogSnapshot};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Columns holding list values in card exports.
pub const DEFAULT_SET_VALUED_COLUMNS: &[&str] =
    &["colorIdentity", "colors", "types", "subtypes", "supertypes"];

/// Reads the lexicographically last `*.csv` file in a directory.
///
/// The header row is the catalog schema and the version id is the hex SHA-256 of the file
/// contents, so it changes iff the data changed.
#[derive(Debug, Clone)]
pub struct CsvCatalogSource {
    dir: PathBuf,
    id_column: String,
    set_valued_columns: BTreeSet<String>,
}

impl CsvCatalogSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            id_column: "uuid".to_string(),
            set_valued_columns: DEFAULT_SET_VALUED_COLUMNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    pub fn with_set_valued_columns(mut self, columns: impl IntoIterator<Item = String>) -> Self {
        self.set_valued_columns = columns.into_iter().collect();
        self
    }

    async fn latest_file(&self) -> Result<PathBuf, DataSourceError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut latest: Option<PathBuf> = None;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if latest.as_ref().map_or(true, |l| path > *l) {
                latest = Some(path);
            }
        }
        latest.ok_or_else(|| {
            DataSourceError::Io(format!("no csv catalog found in {}", self.dir.display()))
        })
    }

    async fn read_latest(&self) -> Result<(PathBuf, Vec<u8>), DataSourceError> {
        let path = self.latest_file().await?;
        let bytes = tokio::fs::read(&path).await?;
        Ok((path, bytes))
    }

    fn parse_cell(&self, column: &str, cell: &str) -> Option<AttributeValue> {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return None;
        }
        if self.set_valued_columns.contains(column) {
            let items = trimmed
                .trim_matches(|c| c == '[' || c == ']')
                .split(',')
                .map(|s| s.trim().trim_matches(|c| c == '\'' || c == '"').trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            return Some(AttributeValue::Set(items));
        }
        // Numeric cells stay text so substring tests see the exported digits; comparisons
        // parse them on demand.
        Some(AttributeValue::Text(trimmed.to_string()))
    }

    /// Parse CSV bytes into a snapshot.
    pub fn parse(&self, version_id: String, bytes: &[u8]) -> Result<CatalogSnapshot, DataSourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| DataSourceError::ParseError(e.to_string()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let id_index = headers
            .iter()
            .position(|h| *h == self.id_column)
            .ok_or_else(|| {
                DataSourceError::ParseError(format!("missing id column `{}`", self.id_column))
            })?;

        let mut records = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let row = row.map_err(|e| DataSourceError::ParseError(e.to_string()))?;
            let id = match row.get(id_index).map(str::trim) {
                Some(id) if !id.is_empty() => CardId::new(id),
                _ => {
                    warn!(line = line + 2, "Skipping catalog row without id");
                    continue;
                }
            };

            let mut record = CardRecord::new(id);
            for (column, cell) in headers.iter().zip(row.iter()) {
                if let Some(value) = self.parse_cell(column, cell) {
                    record.attributes.insert(column.clone(), value);
                }
            }
            records.push(record);
        }

        Ok(CatalogSnapshot::with_schema(
            version_id,
            headers.into_iter().collect(),
            records,
        ))
    }
}

fn content_version(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[async_trait]
impl CatalogSource for CsvCatalogSource {
    async fn fetch_version(&self) -> Result<String, DataSourceError> {
        let (_, bytes) = self.read_latest().await?;
        Ok(content_version(&bytes))
    }

    async fn fetch_catalog(&self) -> Result<CatalogSnapshot, DataSourceError> {
        let (path, bytes) = self.read_latest().await?;
        debug!("Loading catalog from {}", path.display());
        self.parse(content_version(&bytes), &bytes)
    }
}
