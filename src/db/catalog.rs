use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::{
    error::{AppError, AppResult},
    models::{movie::split_tags, Movie, MovieId},
};

/// Read access to the movie catalog
#[cfg_attr(test, mockall::automock)]
pub trait MovieCatalog: Send + Sync {
    /// Movies for the given ids, in the same order; unknown ids are omitted
    fn get_by_ids(&self, ids: &[MovieId]) -> Vec<Movie>;

    /// First movie whose title matches exactly
    fn get_by_title(&self, title: &str) -> Option<Movie>;

    /// The whole attribute table in catalog order
    fn raw_metadata(&self) -> Vec<Movie>;
}

/// Pairs ranked ids with their catalog entries, keeping the ranking order.
/// Ids the catalog does not know are dropped.
pub fn resolve_in_order<S: Copy>(
    catalog: &dyn MovieCatalog,
    ranked: &[(MovieId, S)],
) -> Vec<(Movie, S)> {
    if ranked.is_empty() {
        return Vec::new();
    }

    let ids: Vec<MovieId> = ranked.iter().map(|(id, _)| *id).collect();
    let mut found: HashMap<MovieId, Movie> = catalog
        .get_by_ids(&ids)
        .into_iter()
        .map(|movie| (movie.movie_id, movie))
        .collect();

    ranked
        .iter()
        .filter_map(|(id, score)| found.remove(id).map(|movie| (movie, *score)))
        .collect()
}

/// Row of the catalog file; missing cells are empty
#[derive(Debug, Deserialize)]
struct CatalogRecord {
    movie_id: MovieId,
    title: Option<String>,
    director: Option<String>,
    genres: Option<String>,
    actor_1: Option<String>,
    actor_2: Option<String>,
    actor_3: Option<String>,
    plot_keywords: Option<String>,
    language: Option<String>,
    country: Option<String>,
    imdb_score: Option<f64>,
}

impl From<CatalogRecord> for Movie {
    fn from(record: CatalogRecord) -> Self {
        Movie {
            movie_id: record.movie_id,
            title: record.title.unwrap_or_default(),
            director: record.director.unwrap_or_default(),
            genres: split_tags(&record.genres.unwrap_or_default()),
            actor_1: record.actor_1.unwrap_or_default(),
            actor_2: record.actor_2.unwrap_or_default(),
            actor_3: record.actor_3.unwrap_or_default(),
            plot_keywords: split_tags(&record.plot_keywords.unwrap_or_default()),
            language: split_tags(&record.language.unwrap_or_default()),
            country: record.country.unwrap_or_default(),
            imdb_score: record.imdb_score.unwrap_or(0.0),
        }
    }
}

/// Catalog held in memory, loaded once at startup
pub struct InMemoryMovieCatalog {
    movies: Vec<Movie>,
    by_id: HashMap<MovieId, usize>,
}

impl InMemoryMovieCatalog {
    pub fn new(movies: Vec<Movie>) -> Self {
        let mut by_id = HashMap::with_capacity(movies.len());
        for (pos, movie) in movies.iter().enumerate() {
            by_id.entry(movie.movie_id).or_insert(pos);
        }
        Self { movies, by_id }
    }

    /// Loads the catalog from a CSV file with a header row
    pub fn load_csv(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)?;
        let movies = Self::read_records(&mut reader)?;

        tracing::info!(path = %path.display(), movies = movies.len(), "Loaded movie catalog");

        Ok(Self::new(movies))
    }

    fn read_records<R: std::io::Read>(reader: &mut csv::Reader<R>) -> AppResult<Vec<Movie>> {
        reader
            .deserialize::<CatalogRecord>()
            .map(|record| record.map(Movie::from).map_err(AppError::from))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }
}

impl MovieCatalog for InMemoryMovieCatalog {
    fn get_by_ids(&self, ids: &[MovieId]) -> Vec<Movie> {
        ids.iter()
            .filter_map(|id| self.by_id.get(id))
            .map(|&pos| self.movies[pos].clone())
            .collect()
    }

    fn get_by_title(&self, title: &str) -> Option<Movie> {
        self.movies.iter().find(|movie| movie.title == title).cloned()
    }

    fn raw_metadata(&self) -> Vec<Movie> {
        self.movies.clone()
    }
}
