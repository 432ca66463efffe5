use anyhow::Context;
use mtgindex::config::{load_benchmark_definitions, CatalogConfig, Config};
use mtgindex::orchestration::{RebalanceOrchestrator, RebalanceSettings};
use mtgindex::{
    api, init_db, CatalogSource, CsvCatalogSource, MtgJsonSource, PriceSource, Repository,
    SqlitePriceSource,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env().context("Configuration error")?;
    let definitions = load_benchmark_definitions(&config.benchmarks_path)?;
    tracing::info!(benchmarks = definitions.len(), "Benchmark definitions loaded");

    let pool = init_db(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    let repo = Arc::new(Repository::new(pool));

    let catalog: Arc<dyn CatalogSource> = match &config.catalog {
        CatalogConfig::Csv { dir } => {
            let mut source = CsvCatalogSource::new(dir);
            if let Some(columns) = &config.set_valued_columns {
                source = source.with_set_valued_columns(columns.clone());
            }
            Arc::new(source)
        }
        CatalogConfig::Http {
            version_url,
            cards_url,
        } => Arc::new(MtgJsonSource::new(version_url.clone(), cards_url.clone())),
    };
    let prices: Arc<dyn PriceSource> = Arc::new(
        SqlitePriceSource::connect(&config.prices_database_path)
            .await
            .context("Failed to open price database")?,
    );

    let orchestrator = Arc::new(RebalanceOrchestrator::new(
        catalog,
        prices,
        repo.clone(),
        definitions,
        RebalanceSettings {
            concurrency: config.rebalance_concurrency,
            marker_policy: config.marker_policy,
        },
    ));

    spawn_scheduler(orchestrator.clone(), config.clone());

    let port = config.port;
    let app = api::create_router(api::AppState::new(repo, config, orchestrator));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

/// Run a rebalance pass immediately and then every `REBALANCE_INTERVAL_SECS`.
fn spawn_scheduler(orchestrator: Arc<RebalanceOrchestrator>, config: Config) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(config.rebalance_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let evaluation_date = config.evaluation_date_or_today();
            match orchestrator.run(evaluation_date, false).await {
                Ok(report) => tracing::debug!(
                    run_id = %report.run_id,
                    status = ?report.status,
                    "Scheduled rebalance finished"
                ),
                Err(e) => tracing::error!(error = %e, "Scheduled rebalance failed"),
            }
        }
    });
}
