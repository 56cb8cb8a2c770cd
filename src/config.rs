use serde::Deserialize;

use crate::services::{ContextMatch, DEFAULT_MAX_RECOMMENDATIONS};

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Contextual rating log (CSV)
    #[serde(default = "default_ratings_path")]
    pub ratings_path: String,

    /// Movie metadata catalog (CSV)
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,

    /// User favourites database (JSON)
    #[serde(default = "default_favourites_path")]
    pub favourites_path: String,

    /// Recommendations per model when the request does not say
    #[serde(default = "default_recommendation_count")]
    pub recommendation_count: usize,

    /// Largest `n` a recommendation request may ask for
    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: usize,

    /// How context fields combine when selecting ratings: `any` or `all`
    #[serde(default)]
    pub context_match: ContextMatch,

    /// Build the content similarity matrix at startup instead of on first request
    #[serde(default = "default_precompute_similarity")]
    pub precompute_similarity: bool,

    /// Upper bound on context-filtered ratings fed to the collaborative model
    #[serde(default = "default_max_filtered_ratings")]
    pub max_filtered_ratings: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7777
}

fn default_ratings_path() -> String {
    "data/depaulmovie/ratings.txt".to_string()
}

fn default_catalog_path() -> String {
    "data/depaulmovie/filtered_metadata.csv".to_string()
}

fn default_favourites_path() -> String {
    "data/user_db.json".to_string()
}

fn default_recommendation_count() -> usize {
    10
}

fn default_max_recommendations() -> usize {
    DEFAULT_MAX_RECOMMENDATIONS
}

fn default_precompute_similarity() -> bool {
    true
}

fn default_max_filtered_ratings() -> usize {
    500_000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }
}
