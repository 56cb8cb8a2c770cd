use serde::Deserialize;

use crate::models::{Context, RatingEvent};

use super::RecommendError;

/// How the three context fields combine when matching a rating row
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContextMatch {
    /// A row is in context when any one field matches. Copes with sparse
    /// per-context data.
    #[default]
    Any,
    /// A row is in context only when every field matches
    All,
}

/// Selects the rating rows relevant to a requested context
///
/// A field matches when the row's value contains the requested value as a
/// case-sensitive substring, so an empty requested value matches every row.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextFilter {
    policy: ContextMatch,
}

impl ContextFilter {
    pub fn new(policy: ContextMatch) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ContextMatch {
        self.policy
    }

    /// Whether a single rating row belongs to the context
    pub fn matches(&self, event: &RatingEvent, ctx: &Context) -> bool {
        let time = event.time.contains(ctx.time.as_str());
        let location = event.location.contains(ctx.location.as_str());
        let companion = event.companion.contains(ctx.companion.as_str());

        match self.policy {
            ContextMatch::Any => time || location || companion,
            ContextMatch::All => time && location && companion,
        }
    }

    /// Narrows the rating log to the context
    ///
    /// An empty result is reported as [`RecommendError::NoDataForContext`]
    /// so callers can retry with a broader context.
    pub fn filter<'a>(
        &self,
        ratings: &'a [RatingEvent],
        ctx: &Context,
    ) -> Result<Vec<&'a RatingEvent>, RecommendError> {
        let filtered: Vec<&RatingEvent> = ratings
            .iter()
            .filter(|event| self.matches(event, ctx))
            .collect();

        tracing::debug!(
            total_rows = ratings.len(),
            filtered_rows = filtered.len(),
            policy = ?self.policy,
            "Applied context filter"
        );

        if filtered.is_empty() {
            return Err(RecommendError::NoDataForContext(ctx.clone()));
        }

        Ok(filtered)
    }
}
