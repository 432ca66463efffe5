//! Index level calculation.
//!
//! Both variants roll the prior level forward as
//! `level_t = level_{t-1} * (1 + Σ c_i · w_i)` where `c_i` is the per-constituent change
//! and `w_i` its weight.

use crate::domain::{CardId, ConstituentPrice};
use std::collections::HashMap;
use thiserror::Error;

/// Level assigned to a benchmark on its first valuation.
pub const SEED_LEVEL: f64 = 1000.0;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndexError {
    #[error("no priced constituents")]
    NoPricedConstituents,
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
}

/// Equal-weighted next level.
///
/// Missing and non-finite values are excluded from both the sum and the weight
/// denominator; they are never treated as zero.
///
/// # Errors
/// `NoPricedConstituents` if no constituent carries a usable value.
pub fn next_level(prior_level: f64, constituents: &[ConstituentPrice]) -> Result<f64, IndexError> {
    let priced: Vec<f64> = constituents
        .iter()
        .filter_map(|c| c.price)
        .filter(|p| p.is_finite())
        .collect();

    if priced.is_empty() {
        return Err(IndexError::NoPricedConstituents);
    }

    let weight = 1.0 / priced.len() as f64;
    let weights = vec![weight; priced.len()];
    price_weighted_level(prior_level, &priced, &weights)
}

/// Weighted next level with caller-supplied weights.
///
/// # Errors
/// `DimensionMismatch` if `values` and `weights` differ in length or the weights do not
/// sum to 1.
pub fn price_weighted_level(
    prior_level: f64,
    values: &[f64],
    weights: &[f64],
) -> Result<f64, IndexError> {
    if values.len() != weights.len() {
        return Err(IndexError::DimensionMismatch(format!(
            "{} values but {} weights",
            values.len(),
            weights.len()
        )));
    }
    let weight_sum: f64 = weights.iter().sum();
    if (weight_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(IndexError::DimensionMismatch(format!(
            "weights sum to {} instead of 1",
            weight_sum
        )));
    }

    let weighted: f64 = values.iter().zip(weights).map(|(v, w)| v * w).sum();
    Ok(prior_level * (1.0 + weighted))
}

/// Per-constituent price changes between a previous snapshot and current prices.
///
/// A constituent is missing unless it is priced on both dates with a positive previous
/// price.
pub fn price_changes(
    constituents: impl IntoIterator<Item = CardId>,
    previous: &HashMap<CardId, f64>,
    current: &HashMap<CardId, f64>,
) -> Vec<ConstituentPrice> {
    constituents
        .into_iter()
        .map(|id| {
            let change = match (previous.get(&id), current.get(&id)) {
                (Some(&prev), Some(&cur)) if prev > 0.0 => Some(cur / prev - 1.0),
                _ => None,
            };
            ConstituentPrice::new(id, change)
        })
        .collect()
}

/// Price-weighted next level: constituents are weighted by their previous price, so the
/// level moves with `Σ p_t / Σ p_prev` over constituents priced on both dates.
///
/// # Errors
/// `NoPricedConstituents` if no constituent is priced on both dates.
pub fn price_weighted_next_level(
    prior_level: f64,
    constituents: impl IntoIterator<Item = CardId>,
    previous: &HashMap<CardId, f64>,
    current: &HashMap<CardId, f64>,
) -> Result<f64, IndexError> {
    let pairs: Vec<(f64, f64)> = constituents
        .into_iter()
        .filter_map(|id| match (previous.get(&id), current.get(&id)) {
            (Some(&prev), Some(&cur)) if prev > 0.0 && cur.is_finite() => Some((prev, cur)),
            _ => None,
        })
        .collect();

    let prev_total: f64 = pairs.iter().map(|(prev, _)| prev).sum();
    if pairs.is_empty() || prev_total <= 0.0 {
        return Err(IndexError::NoPricedConstituents);
    }

    let (changes, weights): (Vec<f64>, Vec<f64>) = pairs
        .iter()
        .map(|(prev, cur)| (cur / prev - 1.0, prev / prev_total))
        .unzip();

    // Re-normalise against floating point drift before the strict weight check.
    let drift: f64 = weights.iter().sum();
    let weights: Vec<f64> = weights.iter().map(|w| w / drift).collect();

    price_weighted_level(prior_level, &changes, &weights)
}
