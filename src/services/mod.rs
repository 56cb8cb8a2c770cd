use thiserror::Error;

use crate::models::Context;

pub mod collaborative;
pub mod content;
pub mod context_filter;

pub use collaborative::CollaborativeRecommender;
pub use content::ContentRecommender;
pub use context_filter::{ContextFilter, ContextMatch};

/// Largest recommendation count a model accepts unless configured otherwise
pub const DEFAULT_MAX_RECOMMENDATIONS: usize = 100;

/// Error types for the recommendation models
#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("No rating data for context ({0})")]
    NoDataForContext(Context),
    #[error("Context matched {rows} ratings, more than the limit of {limit}")]
    FilteredSubsetTooLarge { rows: usize, limit: usize },
}

/// Checks a requested recommendation count against `1..=limit`
pub(crate) fn ensure_count(n: usize, limit: usize) -> Result<(), RecommendError> {
    if n == 0 {
        return Err(RecommendError::InvalidArgument(
            "number of recommendations must be at least 1".to_string(),
        ));
    }
    if n > limit {
        return Err(RecommendError::InvalidArgument(format!(
            "number of recommendations must be at most {}",
            limit
        )));
    }
    Ok(())
}
