//! HTTP catalog client for an MTGJSON-style feed.

use super::{CatalogSource, DataSourceError};
use crate::domain::{AttributeValue, CardId, CardRecord, CatalogSnapshot};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, warn};

/// Keys tried, in order, when reading the version document.
const VERSION_KEYS: &[&str] = &["pricesDate", "version"];

/// Catalog source backed by two JSON documents: a small version document and the full
/// card list (an array of card objects keyed by `uuid`).
#[derive(Debug, Clone)]
pub struct MtgJsonSource {
    client: Client,
    version_url: String,
    cards_url: String,
}

impl MtgJsonSource {
    pub fn new(version_url: String, cards_url: String) -> Self {
        Self {
            client: Client::new(),
            version_url,
            cards_url,
        }
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, DataSourceError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self.client.get(url).send().await.map_err(|e| {
                backoff::Error::transient(DataSourceError::NetworkError(e.to_string()))
            })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(DataSourceError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(DataSourceError::ParseError(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl CatalogSource for MtgJsonSource {
    async fn fetch_version(&self) -> Result<String, DataSourceError> {
        debug!("Fetching catalog version from {}", self.version_url);
        let body = self.get_json(&self.version_url).await?;
        parse_version(&body)
    }

    async fn fetch_catalog(&self) -> Result<CatalogSnapshot, DataSourceError> {
        let version_id = self.fetch_version().await?;
        debug!("Fetching catalog {} from {}", version_id, self.cards_url);
        let body = self.get_json(&self.cards_url).await?;
        parse_cards(version_id, &body)
    }
}

/// Read the version id from a version document; accepts a top-level or `data`-nested
/// object.
pub fn parse_version(body: &serde_json::Value) -> Result<String, DataSourceError> {
    let object = body.get("data").unwrap_or(body);
    VERSION_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(|v| v.as_str()))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DataSourceError::ParseError("version document has no version".to_string()))
}

/// Convert a JSON card array (optionally under `data`) into a snapshot.
pub fn parse_cards(
    version_id: String,
    body: &serde_json::Value,
) -> Result<CatalogSnapshot, DataSourceError> {
    let cards = body
        .get("data")
        .unwrap_or(body)
        .as_array()
        .ok_or_else(|| DataSourceError::ParseError("Expected array response".to_string()))?;

    let mut schema = BTreeSet::new();
    let mut records = Vec::with_capacity(cards.len());
    for card in cards {
        let Some(object) = card.as_object() else {
            warn!("Skipping non-object card entry");
            continue;
        };
        let Some(id) = object.get("uuid").and_then(|v| v.as_str()) else {
            warn!("Skipping card without uuid");
            continue;
        };

        let mut record = CardRecord::new(CardId::new(id));
        for (key, value) in object {
            schema.insert(key.clone());
            if let Some(value) = AttributeValue::from_json(value) {
                record.attributes.insert(key.clone(), value);
            }
        }
        records.push(record);
    }

    Ok(CatalogSnapshot::with_schema(version_id, schema, records))
}
