use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::MovieId;

/// One row of the contextual rating log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatingEvent {
    pub user_id: String,
    pub movie_id: MovieId,
    pub rating: f64,
    pub time: String,
    pub location: String,
    pub companion: String,
}

/// Situation in which a recommendation is requested
///
/// Values are free text and are not checked against the vocabulary of the
/// rating log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Context {
    pub time: String,
    pub location: String,
    pub companion: String,
}

impl Context {
    pub fn new(
        time: impl Into<String>,
        location: impl Into<String>,
        companion: impl Into<String>,
    ) -> Self {
        Self {
            time: time.into(),
            location: location.into(),
            companion: companion.into(),
        }
    }
}

impl Display for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "time={}, location={}, companion={}",
            self.time, self.location, self.companion
        )
    }
}
