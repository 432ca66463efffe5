use axum::extract::{Path, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Serialize;

use super::AppState;
use crate::db::BenchmarkSummary;
use crate::domain::{Benchmark, CriteriaSet, IndexPoint, UnvaluedDate};
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarksResponse {
    pub benchmarks: Vec<BenchmarkSummaryDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkSummaryDto {
    pub name: String,
    pub evaluation_type: String,
    pub weighting: String,
    pub constituent_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<IndexPointDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkDto {
    pub name: String,
    pub criteria: CriteriaSet,
    pub evaluation_type: String,
    pub weighting: String,
    pub constituents: Vec<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexResponse {
    pub name: String,
    pub points: Vec<IndexPointDto>,
    pub unvalued: Vec<UnvaluedDateDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexPointDto {
    pub date: NaiveDate,
    pub level: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnvaluedDateDto {
    pub date: NaiveDate,
    pub reason: String,
}

impl From<IndexPoint> for IndexPointDto {
    fn from(point: IndexPoint) -> Self {
        Self {
            date: point.date,
            level: point.level,
        }
    }
}

impl From<UnvaluedDate> for UnvaluedDateDto {
    fn from(unvalued: UnvaluedDate) -> Self {
        Self {
            date: unvalued.date,
            reason: unvalued.reason,
        }
    }
}

impl From<BenchmarkSummary> for BenchmarkSummaryDto {
    fn from(summary: BenchmarkSummary) -> Self {
        Self {
            name: summary.name,
            evaluation_type: summary.evaluation_type.to_string(),
            weighting: summary.weighting.to_string(),
            constituent_count: summary.constituent_count,
            latest: summary.latest.map(IndexPointDto::from),
        }
    }
}

impl From<Benchmark> for BenchmarkDto {
    fn from(benchmark: Benchmark) -> Self {
        Self {
            name: benchmark.name,
            criteria: benchmark.criteria,
            evaluation_type: benchmark.evaluation_type.to_string(),
            weighting: benchmark.weighting.to_string(),
            constituents: benchmark
                .constituents
                .into_iter()
                .map(|id| id.0)
                .collect(),
            created_at_ms: benchmark.created_at_ms,
            updated_at_ms: benchmark.updated_at_ms,
        }
    }
}

pub async fn list_benchmarks(
    State(state): State<AppState>,
) -> Result<Json<BenchmarksResponse>, AppError> {
    let benchmarks = state
        .repo
        .list()
        .await?
        .into_iter()
        .map(BenchmarkSummaryDto::from)
        .collect();

    Ok(Json(BenchmarksResponse { benchmarks }))
}

pub async fn get_benchmark(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<BenchmarkDto>, AppError> {
    let benchmark = state
        .repo
        .get(&name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("unknown benchmark: {}", name)))?;

    Ok(Json(benchmark.into()))
}

pub async fn get_index(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<IndexResponse>, AppError> {
    if !state.repo.exists(&name).await? {
        return Err(AppError::NotFound(format!("unknown benchmark: {}", name)));
    }

    let points = state
        .repo
        .index_series(&name)
        .await?
        .into_iter()
        .map(IndexPointDto::from)
        .collect();
    let unvalued = state
        .repo
        .unvalued_dates(&name)
        .await?
        .into_iter()
        .map(UnvaluedDateDto::from)
        .collect();

    Ok(Json(IndexResponse {
        name,
        points,
        unvalued,
    }))
}
