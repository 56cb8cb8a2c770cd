use std::sync::Arc;

use crate::{
    config::Config,
    db::{
        FavouritesStore, InMemoryMovieCatalog, InMemoryRatingLog, JsonFavouritesStore,
        MovieCatalog, RatingLog,
    },
    error::{AppError, AppResult},
    services::{CollaborativeRecommender, ContentRecommender, ContextFilter},
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn MovieCatalog>,
    pub favourites: Arc<dyn FavouritesStore>,
    pub collaborative: Arc<CollaborativeRecommender>,
    pub content: Arc<ContentRecommender>,
    /// Recommendations per model when a request gives no `n`
    pub recommendation_count: usize,
    /// Largest `n` a request may ask for
    pub max_recommendations: usize,
}

impl AppState {
    /// Wires both recommenders over the same rating log and catalog
    pub fn new(
        ratings: Arc<dyn RatingLog>,
        catalog: Arc<dyn MovieCatalog>,
        favourites: Arc<dyn FavouritesStore>,
        config: &Config,
    ) -> Self {
        let filter = ContextFilter::new(config.context_match);
        let max_recommendations = config.max_recommendations;

        Self {
            collaborative: Arc::new(
                CollaborativeRecommender::new(
                    ratings.clone(),
                    catalog.clone(),
                    filter,
                    config.max_filtered_ratings,
                )
                .with_max_recommendations(max_recommendations),
            ),
            content: Arc::new(
                ContentRecommender::new(ratings, catalog.clone(), filter)
                    .with_max_recommendations(max_recommendations),
            ),
            catalog,
            favourites,
            recommendation_count: config.recommendation_count,
            max_recommendations,
        }
    }

    /// Loads ratings, catalog and favourites from the configured files
    pub async fn load(config: &Config) -> AppResult<Self> {
        let ratings = InMemoryRatingLog::load_csv(&config.ratings_path)?;
        let catalog = InMemoryMovieCatalog::load_csv(&config.catalog_path)?;
        let favourites = JsonFavouritesStore::open(&config.favourites_path).await?;

        let state = Self::new(
            Arc::new(ratings),
            Arc::new(catalog),
            Arc::new(favourites),
            config,
        );

        if config.precompute_similarity {
            let content = state.content.clone();
            tokio::task::spawn_blocking(move || content.precompute())
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;
        }

        tracing::info!(
            context_match = ?config.context_match,
            precomputed = state.content.is_ready(),
            "Recommenders ready"
        );

        Ok(state)
    }
}
