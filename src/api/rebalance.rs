use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use super::AppState;
use crate::error::AppError;
use crate::orchestration::RunReport;

#[derive(Debug, Deserialize)]
pub struct RebalanceQuery {
    pub force: Option<bool>,
    /// `YYYY-MM-DD`; defaults to the configured evaluation date.
    pub date: Option<String>,
}

pub async fn trigger_rebalance(
    Query(params): Query<RebalanceQuery>,
    State(state): State<AppState>,
) -> Result<Json<RunReport>, AppError> {
    let evaluation_date = match params.date.as_deref() {
        Some("") | None => state.config.evaluation_date_or_today(),
        Some(d) => parse_date(d)?,
    };
    let force = params.force.unwrap_or(false);

    let report = state.orchestrator.run(evaluation_date, force).await?;
    Ok(Json(report))
}

fn parse_date(value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("invalid date: {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2019-02-01").unwrap(),
            NaiveDate::from_ymd_opt(2019, 2, 1).unwrap()
        );
        assert!(matches!(parse_date("02/01/2019"), Err(AppError::BadRequest(_))));
    }
}
