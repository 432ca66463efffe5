//! Mock data sources for testing without network or file access.

use super::{CatalogSource, DataSourceError, PriceSource};
use crate::domain::{CardId, CardRecord, CatalogSnapshot, EvaluationType};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Mock catalog whose contents can be swapped between rebalance passes.
#[derive(Debug, Clone, Default)]
pub struct MockCatalogSource {
    inner: Arc<RwLock<MockCatalogState>>,
}

#[derive(Debug, Default)]
struct MockCatalogState {
    snapshot: Option<CatalogSnapshot>,
    failure: Option<DataSourceError>,
    catalog_fetches: usize,
}

impl MockCatalogSource {
    /// Create a mock catalog with no data; fetches fail until a snapshot is set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock catalog serving the given records under a version id.
    pub fn with_records(version_id: &str, records: Vec<CardRecord>) -> Self {
        let source = Self::new();
        source.set_records(version_id, records);
        source
    }

    /// Replace the served catalog.
    pub fn set_records(&self, version_id: &str, records: Vec<CardRecord>) {
        self.set_snapshot(CatalogSnapshot::new(version_id, records));
    }

    /// Replace the served catalog with an explicit snapshot.
    pub fn set_snapshot(&self, snapshot: CatalogSnapshot) {
        if let Ok(mut state) = self.inner.write() {
            state.snapshot = Some(snapshot);
            state.failure = None;
        }
    }

    /// Make every fetch fail with the given error.
    pub fn fail_with(&self, error: DataSourceError) {
        if let Ok(mut state) = self.inner.write() {
            state.failure = Some(error);
        }
    }

    /// Number of full catalog fetches served so far.
    pub fn catalog_fetches(&self) -> usize {
        self.inner.read().map(|s| s.catalog_fetches).unwrap_or(0)
    }

    fn current(&self) -> Result<CatalogSnapshot, DataSourceError> {
        let state = self
            .inner
            .read()
            .map_err(|_| DataSourceError::Other("mock catalog lock poisoned".to_string()))?;
        if let Some(err) = &state.failure {
            return Err(err.clone());
        }
        state
            .snapshot
            .clone()
            .ok_or_else(|| DataSourceError::Other("mock catalog has no data".to_string()))
    }
}

#[async_trait]
impl CatalogSource for MockCatalogSource {
    async fn fetch_version(&self) -> Result<String, DataSourceError> {
        self.current().map(|s| s.version_id)
    }

    async fn fetch_catalog(&self) -> Result<CatalogSnapshot, DataSourceError> {
        let snapshot = self.current()?;
        if let Ok(mut state) = self.inner.write() {
            state.catalog_fetches += 1;
        }
        Ok(snapshot)
    }
}

type PriceKey = (NaiveDate, EvaluationType, CardId);

/// Mock price feed backed by an in-memory table.
#[derive(Debug, Clone, Default)]
pub struct MockPriceSource {
    prices: Arc<RwLock<HashMap<PriceKey, f64>>>,
    failing: Arc<RwLock<HashSet<EvaluationType>>>,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a price (builder style).
    pub fn with_price(
        self,
        date: NaiveDate,
        evaluation_type: EvaluationType,
        id: &str,
        price: f64,
    ) -> Self {
        self.set_price(date, evaluation_type, id, price);
        self
    }

    /// Add or overwrite a price.
    pub fn set_price(&self, date: NaiveDate, evaluation_type: EvaluationType, id: &str, price: f64) {
        if let Ok(mut prices) = self.prices.write() {
            prices.insert((date, evaluation_type, CardId::new(id)), price);
        }
    }

    /// Make fetches for an evaluation type fail.
    pub fn fail_for(&self, evaluation_type: EvaluationType) {
        if let Ok(mut failing) = self.failing.write() {
            failing.insert(evaluation_type);
        }
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn fetch_prices(
        &self,
        date: NaiveDate,
        evaluation_type: EvaluationType,
        ids: &BTreeSet<CardId>,
    ) -> Result<HashMap<CardId, f64>, DataSourceError> {
        let failing = self
            .failing
            .read()
            .map_err(|_| DataSourceError::Other("mock price lock poisoned".to_string()))?;
        if failing.contains(&evaluation_type) {
            return Err(DataSourceError::NetworkError(format!(
                "mock price feed down for {}",
                evaluation_type
            )));
        }

        let prices = self
            .prices
            .read()
            .map_err(|_| DataSourceError::Other("mock price lock poisoned".to_string()))?;
        Ok(ids
            .iter()
            .filter_map(|id| {
                prices
                    .get(&(date, evaluation_type, id.clone()))
                    .map(|p| (id.clone(), *p))
            })
            .collect())
    }
}
