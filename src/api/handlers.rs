use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{CollaborativeRecommendation, ContentRecommendation, Context, Movie, MovieId},
    services::RecommendError,
};

use super::AppState;

// Request/Response types

/// Query of the recommendation endpoint, e.g. `/?u=alice&t=Weekday&loc=Cinema&comp=Alone`
#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    pub u: Option<String>,
    pub t: Option<String>,
    pub loc: Option<String>,
    pub comp: Option<String>,
    pub n: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub u: Option<String>,
}

/// One ranked list per model. The two scores are not comparable.
#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    /// Ascending cosine distance
    pub collab: Vec<CollaborativeRecommendation>,
    /// Descending cosine similarity
    pub content: Vec<ContentRecommendation>,
    /// Why `collab` is empty when the collaborative model could not run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collab_error: Option<String>,
    pub generated_at: DateTime<Utc>,
}

fn required(value: Option<String>, name: &str) -> AppResult<String> {
    value.ok_or_else(|| AppError::InvalidInput(format!("Missing query parameter: {}", name)))
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Recommend movies for a user's favourites in a context, using both models
pub async fn recommend(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<RecommendQuery>,
) -> AppResult<Json<RecommendationResponse>> {
    let user = required(query.u, "u")?;
    let ctx = Context::new(
        required(query.t, "t")?,
        required(query.loc, "loc")?,
        required(query.comp, "comp")?,
    );
    let n = query.n.unwrap_or(state.recommendation_count);
    if n == 0 {
        return Err(AppError::InvalidInput("n must be at least 1".to_string()));
    }
    if n > state.max_recommendations {
        return Err(AppError::InvalidInput(format!(
            "n must be at most {}",
            state.max_recommendations
        )));
    }

    let favourites: Vec<MovieId> = state.favourites.favourites(&user).await.into_iter().collect();
    if favourites.is_empty() {
        return Err(AppError::InvalidInput("No favourite movies found.".to_string()));
    }

    tracing::info!(
        request_id = %request_id,
        user = %user,
        context = %ctx,
        favourites = favourites.len(),
        n,
        "Processing recommendation request"
    );

    let collaborative = state.collaborative.clone();
    let content = state.content.clone();
    let (collab, content) = tokio::task::spawn_blocking(move || {
        (
            collaborative.recommend(&favourites, &ctx, n),
            content.recommend(&favourites, &ctx, n),
        )
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?;

    // the subset bound only limits the collaborative model
    let content = content?;
    let (collab, collab_error) = match collab {
        Ok(collab) => (collab, None),
        Err(e @ RecommendError::FilteredSubsetTooLarge { .. }) => {
            tracing::warn!(
                request_id = %request_id,
                error = %e,
                "Collaborative model skipped"
            );
            (Vec::new(), Some(e.to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(
        request_id = %request_id,
        collab = collab.len(),
        content = content.len(),
        "Recommendations completed"
    );

    Ok(Json(RecommendationResponse {
        collab,
        content,
        collab_error,
        generated_at: Utc::now(),
    }))
}

/// List a user's favourite movies
pub async fn get_favourites(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<Vec<Movie>>> {
    let user = required(query.u, "u")?;
    let ids: Vec<MovieId> = state.favourites.favourites(&user).await.into_iter().collect();
    Ok(Json(state.catalog.get_by_ids(&ids)))
}

/// Add movies, given by exact title, to a user's favourites
pub async fn add_favourites(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    Json(titles): Json<Vec<String>>,
) -> AppResult<Json<Vec<Movie>>> {
    let user = required(query.u, "u")?;

    let mut found = Vec::new();
    let mut failed = Vec::new();
    for title in titles {
        match state.catalog.get_by_title(&title) {
            Some(movie) => found.push(movie),
            None => failed.push(title),
        }
    }

    if found.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "Movies not found: {}.",
            failed.join(", ")
        )));
    }

    let ids: Vec<MovieId> = found.iter().map(|m| m.movie_id).collect();
    state.favourites.add_favourites(&user, &ids).await;
    state.favourites.save().await?;

    tracing::info!(
        user = %user,
        added = ids.len(),
        not_found = failed.len(),
        "Updated favourites"
    );

    Ok(Json(found))
}
