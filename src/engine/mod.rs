//! Pure computation engines for benchmark selection and index levels.

pub mod criteria;
pub mod index;

pub use criteria::{CriteriaEngine, CriteriaError};
pub use index::{
    next_level, price_changes, price_weighted_level, price_weighted_next_level, IndexError,
    SEED_LEVEL,
};
