//! Criteria evaluation against a catalog snapshot.

use crate::domain::{
    AttributeValue, CardId, CardRecord, CatalogSnapshot, CriteriaSet, Criterion, CriterionValue,
    Operator,
};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CriteriaError {
    #[error("type mismatch on `{attribute}` ({operator}): {detail}")]
    TypeKind {
        attribute: String,
        operator: Operator,
        detail: String,
    },
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),
}

/// Evaluates criteria sets against catalog snapshots.
pub struct CriteriaEngine;

impl CriteriaEngine {
    /// Return the ids of every record matching all criteria.
    ///
    /// The catalog and criteria are only borrowed; the result is ordered and identical for
    /// identical inputs. Every criterion is evaluated for every record so type errors do
    /// not depend on criterion order.
    ///
    /// # Errors
    /// `UnknownAttribute` if a criterion names an attribute outside the catalog schema,
    /// `TypeKind` if an ordering comparison meets a non-numeric value.
    pub fn evaluate(
        catalog: &CatalogSnapshot,
        criteria: &CriteriaSet,
    ) -> Result<BTreeSet<CardId>, CriteriaError> {
        for criterion in criteria.iter() {
            Self::validate(catalog, criterion)?;
        }

        catalog
            .records
            .iter()
            .try_fold(BTreeSet::new(), |mut matched, record| {
                let is_match = criteria
                    .iter()
                    .try_fold(true, |all, c| Self::matches(record, c).map(|m| all & m))?;
                if is_match {
                    matched.insert(record.id.clone());
                }
                Ok(matched)
            })
    }

    fn validate(catalog: &CatalogSnapshot, criterion: &Criterion) -> Result<(), CriteriaError> {
        if !catalog.has_attribute(&criterion.attribute) {
            return Err(CriteriaError::UnknownAttribute(criterion.attribute.clone()));
        }
        if criterion.operator.is_ordering() && criterion.value.as_number().is_none() {
            return Err(CriteriaError::TypeKind {
                attribute: criterion.attribute.clone(),
                operator: criterion.operator,
                detail: format!("criterion value `{}` is not numeric", criterion.value.to_text()),
            });
        }
        Ok(())
    }

    /// Test a single record against a single criterion.
    pub fn matches(record: &CardRecord, criterion: &Criterion) -> Result<bool, CriteriaError> {
        let value = record.get(&criterion.attribute);

        match criterion.operator {
            // Absent data vacuously "does not contain" / "is not equal".
            Operator::Contains => Ok(value.is_some_and(|v| contains_ci(v, &criterion.value))),
            Operator::Excludes => Ok(value.map_or(true, |v| !contains_ci(v, &criterion.value))),
            Operator::Eq => Ok(value.is_some_and(|v| equals(v, &criterion.value))),
            Operator::Ne => Ok(value.map_or(true, |v| !equals(v, &criterion.value))),
            op => {
                let Some(value) = value else {
                    return Ok(false);
                };
                let lhs = value.as_number().ok_or_else(|| CriteriaError::TypeKind {
                    attribute: criterion.attribute.clone(),
                    operator: op,
                    detail: format!(
                        "card {} has non-numeric value `{}`",
                        record.id,
                        value.to_text()
                    ),
                })?;
                let rhs = criterion
                    .value
                    .as_number()
                    .ok_or_else(|| CriteriaError::TypeKind {
                        attribute: criterion.attribute.clone(),
                        operator: op,
                        detail: format!(
                            "criterion value `{}` is not numeric",
                            criterion.value.to_text()
                        ),
                    })?;
                Ok(match op {
                    Operator::Gt => lhs > rhs,
                    Operator::Ge => lhs >= rhs,
                    Operator::Lt => lhs < rhs,
                    Operator::Le => lhs <= rhs,
                    _ => unreachable!("non-ordering operators handled above"),
                })
            }
        }
    }
}

fn contains_ci(value: &AttributeValue, needle: &CriterionValue) -> bool {
    value
        .to_text()
        .to_lowercase()
        .contains(&needle.to_text().to_lowercase())
}

fn equals(value: &AttributeValue, other: &CriterionValue) -> bool {
    match value {
        AttributeValue::Set(items) => {
            let lhs: BTreeSet<&str> = items.iter().map(|s| s.trim()).collect();
            let rhs_text = other.to_text();
            let rhs: BTreeSet<&str> = rhs_text
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            lhs == rhs
        }
        _ => match (value.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => value.to_text() == other.to_text(),
        },
    }
}
