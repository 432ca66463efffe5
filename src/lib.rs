pub mod api;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::Config;
pub use datasource::{
    CatalogSource, CsvCatalogSource, DataSourceError, MockCatalogSource, MockPriceSource,
    MtgJsonSource, PriceSource, SqlitePriceSource,
};
pub use db::{init_db, Repository, StoreError};
pub use domain::{
    AttributeValue, Benchmark, BenchmarkDefinition, CardId, CardRecord, CatalogSnapshot,
    CriteriaSet, Criterion, EvaluationType, IndexPoint, Operator, Weighting,
};
pub use engine::{CriteriaEngine, CriteriaError, IndexError};
pub use error::AppError;
pub use orchestration::{BenchmarkOutcome, RebalanceOrchestrator, RunReport, RunStatus};
