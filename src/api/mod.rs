pub mod benchmarks;
pub mod health;
pub mod rebalance;

use crate::config::Config;
use crate::db::Repository;
use crate::orchestration::RebalanceOrchestrator;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub orchestrator: Arc<RebalanceOrchestrator>,
}

impl AppState {
    pub fn new(
        repo: Arc<Repository>,
        config: Config,
        orchestrator: Arc<RebalanceOrchestrator>,
    ) -> Self {
        Self {
            repo,
            config,
            orchestrator,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/benchmarks", get(benchmarks::list_benchmarks))
        .route("/v1/benchmarks/:name", get(benchmarks::get_benchmark))
        .route("/v1/benchmarks/:name/index", get(benchmarks::get_index))
        .route("/v1/rebalance", post(rebalance::trigger_rebalance))
        .layer(cors)
        .with_state(state)
}
