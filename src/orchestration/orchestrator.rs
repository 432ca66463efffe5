use crate::config::MarkerPolicy;
use crate::datasource::{sanitize_prices, CatalogSource, DataSourceError, PriceSource};
use crate::db::{DefinitionChange, Repository, StoreError};
use crate::domain::{criteria_fingerprint, BenchmarkDefinition, CardId, CatalogSnapshot, Weighting};
use crate::engine::{
    next_level, price_changes, price_weighted_next_level, CriteriaEngine, IndexError, SEED_LEVEL,
};
use crate::orchestration::locks::BenchmarkLocks;
use crate::orchestration::report::{BenchmarkOutcome, RunReport, RunStatus};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RebalanceError {
    #[error("catalog unavailable: {0}")]
    Catalog(#[from] DataSourceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy)]
pub struct RebalanceSettings {
    pub concurrency: usize,
    pub marker_policy: MarkerPolicy,
}

impl Default for RebalanceSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            marker_policy: MarkerPolicy::Advance,
        }
    }
}

/// Drives rebalance passes: version check, constituent refresh, valuation and marker
/// commit.
pub struct RebalanceOrchestrator {
    catalog: Arc<dyn CatalogSource>,
    prices: Arc<dyn PriceSource>,
    repo: Arc<Repository>,
    definitions: Vec<BenchmarkDefinition>,
    fingerprint: String,
    settings: RebalanceSettings,
    locks: BenchmarkLocks,
    run_lock: Mutex<()>,
}

impl RebalanceOrchestrator {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        prices: Arc<dyn PriceSource>,
        repo: Arc<Repository>,
        definitions: Vec<BenchmarkDefinition>,
        settings: RebalanceSettings,
    ) -> Self {
        let fingerprint = criteria_fingerprint(&definitions);
        Self {
            catalog,
            prices,
            repo,
            definitions,
            fingerprint,
            settings,
            locks: BenchmarkLocks::new(),
            run_lock: Mutex::new(()),
        }
    }

    pub fn definitions(&self) -> &[BenchmarkDefinition] {
        &self.definitions
    }

    /// Run one rebalance pass for `evaluation_date`.
    ///
    /// Unless `force` is set, the pass is a no-op when both the catalog version and the
    /// configured criteria match the stored version marker. Passes never overlap.
    ///
    /// # Errors
    /// `Catalog` if the catalog cannot be fetched (nothing has been written), `Store` on
    /// any storage failure (the marker is left untouched).
    pub async fn run(
        &self,
        evaluation_date: NaiveDate,
        force: bool,
    ) -> Result<RunReport, RebalanceError> {
        let _pass = self.run_lock.lock().await;
        let run_id = Uuid::new_v4();

        let marker = self.repo.version_marker().await?;
        if !force {
            let version = self.catalog.fetch_version().await?;
            let up_to_date = marker.as_ref().is_some_and(|m| {
                m.catalog_version == version && m.criteria_fingerprint == self.fingerprint
            });
            if up_to_date {
                info!(%run_id, catalog_version = %version, "Benchmarks up to date, skipping rebalance");
                return Ok(RunReport {
                    run_id,
                    catalog_version: version,
                    evaluation_date,
                    status: RunStatus::UpToDate,
                    outcomes: BTreeMap::new(),
                    marker_committed: false,
                });
            }
        }

        let catalog = self.catalog.fetch_catalog().await?;
        info!(
            %run_id,
            catalog_version = %catalog.version_id,
            records = catalog.len(),
            benchmarks = self.definitions.len(),
            %evaluation_date,
            force,
            "Starting rebalance"
        );

        let tasks: Vec<_> = self
            .definitions
            .iter()
            .map(|definition| self.rebalance_benchmark(definition, &catalog, evaluation_date))
            .collect();
        let outcomes: BTreeMap<String, BenchmarkOutcome> = stream::iter(tasks)
            .buffer_unordered(self.settings.concurrency.max(1))
            .try_collect()
            .await?;

        let skipped = outcomes.values().filter(|o| o.is_skipped()).count();
        let commit = match self.settings.marker_policy {
            MarkerPolicy::Advance => true,
            MarkerPolicy::Strict => skipped == 0,
        };

        if commit {
            self.repo
                .commit_version_marker(&catalog.version_id, &self.fingerprint)
                .await?;
        } else {
            warn!(
                %run_id,
                skipped,
                "Version marker not advanced, failed benchmarks will be retried next pass"
            );
        }

        info!(
            %run_id,
            catalog_version = %catalog.version_id,
            skipped,
            marker_committed = commit,
            "Rebalance completed"
        );

        Ok(RunReport {
            run_id,
            catalog_version: catalog.version_id.clone(),
            evaluation_date,
            status: RunStatus::Completed,
            outcomes,
            marker_committed: commit,
        })
    }

    /// Re-evaluate one benchmark and value it. Only store failures escape; criteria,
    /// price and index failures become `Skipped`.
    async fn rebalance_benchmark(
        &self,
        definition: &BenchmarkDefinition,
        catalog: &CatalogSnapshot,
        evaluation_date: NaiveDate,
    ) -> Result<(String, BenchmarkOutcome), StoreError> {
        let outcome = self
            .evaluate_and_value(definition, catalog, evaluation_date)
            .await?;
        Ok((definition.name.clone(), outcome))
    }

    async fn evaluate_and_value(
        &self,
        definition: &BenchmarkDefinition,
        catalog: &CatalogSnapshot,
        evaluation_date: NaiveDate,
    ) -> Result<BenchmarkOutcome, StoreError> {
        let name = definition.name.as_str();

        let ids = match CriteriaEngine::evaluate(catalog, &definition.criteria) {
            Ok(ids) => ids,
            Err(e) => {
                warn!(benchmark = %name, error = %e, "Criteria evaluation failed, skipping benchmark");
                return Ok(BenchmarkOutcome::Skipped {
                    reason: e.to_string(),
                });
            }
        };

        let _guard = self.locks.acquire(name).await;

        if ids.is_empty() {
            let removed = self.repo.drop_benchmark(name).await?;
            info!(benchmark = %name, removed, "No constituents matched, benchmark dropped");
            return Ok(BenchmarkOutcome::Dropped);
        }

        match self.repo.save_benchmark(definition, &ids).await? {
            DefinitionChange::Created => info!(benchmark = %name, "Benchmark created"),
            DefinitionChange::Updated => info!(benchmark = %name, "Benchmark definition updated"),
            DefinitionChange::Unchanged => {}
        }
        debug!(benchmark = %name, constituents = ids.len(), "Constituents replaced");

        self.value_benchmark(definition, &ids, evaluation_date).await
    }

    async fn value_benchmark(
        &self,
        definition: &BenchmarkDefinition,
        ids: &BTreeSet<CardId>,
        evaluation_date: NaiveDate,
    ) -> Result<BenchmarkOutcome, StoreError> {
        let name = definition.name.as_str();
        let constituents = ids.len();

        let latest = self.repo.latest_index(name).await?;
        if latest.is_some_and(|point| point.date >= evaluation_date) {
            debug!(benchmark = %name, %evaluation_date, "Already valued for this date");
            return Ok(BenchmarkOutcome::AlreadyValued { constituents });
        }

        let prices = match self
            .prices
            .fetch_prices(evaluation_date, definition.evaluation_type, ids)
            .await
        {
            Ok(prices) => sanitize_prices(prices),
            Err(e) => {
                warn!(benchmark = %name, error = %e, "Price fetch failed, skipping valuation");
                return Ok(BenchmarkOutcome::Skipped {
                    reason: format!("price fetch failed: {}", e),
                });
            }
        };
        let prices: HashMap<CardId, f64> = prices
            .into_iter()
            .filter(|(id, _)| ids.contains(id))
            .collect();

        let level = match latest {
            None if prices.is_empty() => Err(IndexError::NoPricedConstituents),
            None => Ok(SEED_LEVEL),
            Some(prior) => {
                let previous = self
                    .repo
                    .last_known_prices_before(name, evaluation_date)
                    .await?;
                match definition.weighting {
                    Weighting::Equal => next_level(
                        prior.level,
                        &price_changes(ids.iter().cloned(), &previous, &prices),
                    ),
                    Weighting::Price => price_weighted_next_level(
                        prior.level,
                        ids.iter().cloned(),
                        &previous,
                        &prices,
                    ),
                }
            }
        };

        match level {
            Ok(level) => {
                self.repo
                    .append_valuation(name, evaluation_date, level, &prices)
                    .await?;
                info!(
                    benchmark = %name,
                    %evaluation_date,
                    index_level = level,
                    constituents,
                    "Index point appended"
                );
                Ok(BenchmarkOutcome::Updated {
                    constituents,
                    level,
                })
            }
            Err(IndexError::NoPricedConstituents) => {
                let reason = IndexError::NoPricedConstituents.to_string();
                self.repo
                    .record_unvalued(name, evaluation_date, &reason)
                    .await?;
                // Later valuations chain from the newest observed prices.
                if !prices.is_empty() {
                    self.repo
                        .store_price_snapshot(name, evaluation_date, &prices)
                        .await?;
                }
                warn!(benchmark = %name, %evaluation_date, "No priced constituents, date left unvalued");
                Ok(BenchmarkOutcome::Unvalued {
                    constituents,
                    reason,
                })
            }
            Err(e) => {
                warn!(benchmark = %name, error = %e, "Index calculation failed, skipping valuation");
                Ok(BenchmarkOutcome::Skipped {
                    reason: e.to_string(),
                })
            }
        }
    }
}
