use serde::Serialize;

use super::Movie;

/// Collaborative-filtering hit; lower `distance` ranks higher
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CollaborativeRecommendation {
    #[serde(flatten)]
    pub movie: Movie,
    pub distance: f64,
}

/// Content-based hit; higher `similarity` ranks higher
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContentRecommendation {
    #[serde(flatten)]
    pub movie: Movie,
    pub similarity: f64,
}
