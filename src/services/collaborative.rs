use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::{
    db::{resolve_in_order, MovieCatalog, RatingLog},
    models::{CollaborativeRecommendation, Context, MovieId, RatingEvent},
};

use super::{ensure_count, ContextFilter, RecommendError, DEFAULT_MAX_RECOMMENDATIONS};

/// Item x user matrix built from a context-filtered slice of the rating log
///
/// Rows are the distinct movies of the slice in ascending id order, columns the
/// distinct users in ascending order. Cells hold the mean rating of the pair;
/// absent pairs are zero and are not stored.
#[derive(Debug, Clone)]
pub struct RatingMatrix {
    movie_ids: Vec<MovieId>,
    users: Vec<String>,
    /// Sparse rows of (column, rating), sorted by column
    rows: Vec<Vec<(usize, f64)>>,
    norms: Vec<f64>,
}

impl RatingMatrix {
    pub fn build(events: &[&RatingEvent]) -> Self {
        let mut cells: BTreeMap<(MovieId, &str), (f64, u32)> = BTreeMap::new();
        for event in events {
            let cell = cells
                .entry((event.movie_id, event.user_id.as_str()))
                .or_insert((0.0, 0));
            cell.0 += event.rating;
            cell.1 += 1;
        }

        let users: BTreeSet<&str> = cells.keys().map(|(_, user)| *user).collect();
        let columns: HashMap<&str, usize> = users
            .iter()
            .enumerate()
            .map(|(col, user)| (*user, col))
            .collect();

        let mut movie_ids: Vec<MovieId> = Vec::new();
        let mut rows: Vec<Vec<(usize, f64)>> = Vec::new();
        for ((movie_id, user), (sum, count)) in &cells {
            if movie_ids.last() != Some(movie_id) {
                movie_ids.push(*movie_id);
                rows.push(Vec::new());
            }
            if let Some(row) = rows.last_mut() {
                row.push((columns[user], sum / f64::from(*count)));
            }
        }

        let norms = rows
            .iter()
            .map(|row| row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt())
            .collect();

        Self {
            movie_ids,
            users: users.into_iter().map(str::to_string).collect(),
            rows,
            norms,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.movie_ids.len()
    }

    pub fn n_cols(&self) -> usize {
        self.users.len()
    }

    pub fn row_of(&self, movie_id: MovieId) -> Option<usize> {
        self.movie_ids.binary_search(&movie_id).ok()
    }

    pub fn movie_at(&self, row: usize) -> MovieId {
        self.movie_ids[row]
    }

    /// Rating of a (movie, user) pair, zero when absent
    pub fn get(&self, movie_id: MovieId, user: &str) -> f64 {
        let (Some(row), Ok(col)) = (
            self.row_of(movie_id),
            self.users.binary_search_by(|u| u.as_str().cmp(user)),
        ) else {
            return 0.0;
        };
        self.rows[row]
            .binary_search_by_key(&col, |(c, _)| *c)
            .map(|idx| self.rows[row][idx].1)
            .unwrap_or(0.0)
    }

    fn dot(&self, a: usize, b: usize) -> f64 {
        let (left, right) = (&self.rows[a], &self.rows[b]);
        let (mut i, mut j, mut acc) = (0, 0, 0.0);
        while i < left.len() && j < right.len() {
            match left[i].0.cmp(&right[j].0) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    acc += left[i].1 * right[j].1;
                    i += 1;
                    j += 1;
                }
            }
        }
        acc
    }

    /// Cosine distance between two rows; a zero row is at distance 1 from everything
    pub fn cosine_distance(&self, a: usize, b: usize) -> f64 {
        let denom = self.norms[a] * self.norms[b];
        if denom == 0.0 {
            return 1.0;
        }
        (1.0 - self.dot(a, b) / denom).clamp(0.0, 2.0)
    }
}

/// Exact brute-force cosine nearest-neighbor search over matrix rows
pub struct CosineNeighbors<'a> {
    matrix: &'a RatingMatrix,
}

impl<'a> CosineNeighbors<'a> {
    pub fn fit(matrix: &'a RatingMatrix) -> Self {
        Self { matrix }
    }

    /// The `k` rows closest to `row`, ascending by distance then row index.
    /// The query row itself is included.
    pub fn kneighbors(&self, row: usize, k: usize) -> Vec<(usize, f64)> {
        let mut scored: Vec<(usize, f64)> = (0..self.matrix.n_rows())
            .map(|other| (other, self.matrix.cosine_distance(row, other)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        scored
    }
}

/// Item-based collaborative filtering over the contextual rating log
///
/// Holds no state between calls: the matrix and neighbor index are rebuilt
/// from the context-filtered log on every request.
pub struct CollaborativeRecommender {
    ratings: Arc<dyn RatingLog>,
    catalog: Arc<dyn MovieCatalog>,
    filter: ContextFilter,
    max_filtered_ratings: usize,
    max_recommendations: usize,
}

impl CollaborativeRecommender {
    pub fn new(
        ratings: Arc<dyn RatingLog>,
        catalog: Arc<dyn MovieCatalog>,
        filter: ContextFilter,
        max_filtered_ratings: usize,
    ) -> Self {
        Self {
            ratings,
            catalog,
            filter,
            max_filtered_ratings,
            max_recommendations: DEFAULT_MAX_RECOMMENDATIONS,
        }
    }

    /// Largest `n` accepted by [`Self::recommend`]
    pub fn with_max_recommendations(mut self, limit: usize) -> Self {
        self.max_recommendations = limit;
        self
    }

    /// Top `n` movies closest to the favourites, ascending by cosine distance
    ///
    /// Favourites without a row in the context-filtered matrix are skipped. If
    /// none remain the result is empty. Fewer than `n` results is not an error.
    pub fn recommend(
        &self,
        favourites: &[MovieId],
        ctx: &Context,
        n: usize,
    ) -> Result<Vec<CollaborativeRecommendation>, RecommendError> {
        let ranked = self.rank(favourites, ctx, n)?;

        let results: Vec<CollaborativeRecommendation> =
            resolve_in_order(self.catalog.as_ref(), &ranked)
                .into_iter()
                .map(|(movie, distance)| CollaborativeRecommendation { movie, distance })
                .collect();

        if results.len() < ranked.len() {
            tracing::warn!(
                ranked = ranked.len(),
                resolved = results.len(),
                "Some collaborative recommendations are missing from the catalog"
            );
        }

        for (i, rec) in results.iter().enumerate() {
            tracing::debug!(
                rank = i + 1,
                distance = rec.distance,
                movie_id = rec.movie.movie_id,
                title = %rec.movie.title,
                "Collaborative recommendation"
            );
        }

        Ok(results)
    }

    /// Ranked (movie id, distance) pairs before catalog resolution
    pub fn rank(
        &self,
        favourites: &[MovieId],
        ctx: &Context,
        n: usize,
    ) -> Result<Vec<(MovieId, f64)>, RecommendError> {
        ensure_count(n, self.max_recommendations)?;
        let start = Instant::now();

        let snapshot = self.ratings.snapshot();
        let filtered = self.filter.filter(&snapshot, ctx)?;
        if filtered.len() > self.max_filtered_ratings {
            return Err(RecommendError::FilteredSubsetTooLarge {
                rows: filtered.len(),
                limit: self.max_filtered_ratings,
            });
        }

        let matrix = RatingMatrix::build(&filtered);
        let index = CosineNeighbors::fit(&matrix);

        let seeds: Vec<usize> = favourites
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter_map(|movie_id| matrix.row_of(movie_id))
            .collect();

        tracing::info!(
            filtered_rows = filtered.len(),
            matrix_rows = matrix.n_rows(),
            matrix_cols = matrix.n_cols(),
            favourites = favourites.len(),
            seeds = seeds.len(),
            "Built item-user matrix"
        );

        let k = n.saturating_add(1).min(matrix.n_rows());
        let mut stream: Vec<(usize, f64)> = seeds
            .iter()
            .flat_map(|&seed| index.kneighbors(seed, k))
            .collect();
        // stable: equal distances keep seed order, then neighbor rank
        stream.sort_by(|a, b| a.1.total_cmp(&b.1));

        let seed_rows: HashSet<usize> = seeds.iter().copied().collect();
        let mut selected: HashSet<usize> = HashSet::new();
        let mut ranked: Vec<(MovieId, f64)> = Vec::new();
        for (row, distance) in stream {
            if ranked.len() >= n {
                break;
            }
            if seed_rows.contains(&row) || !selected.insert(row) {
                continue;
            }
            ranked.push((matrix.movie_at(row), distance));
        }

        tracing::info!(
            results = ranked.len(),
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Collaborative ranking completed"
        );

        Ok(ranked)
    }
}
