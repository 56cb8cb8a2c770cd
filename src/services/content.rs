//! Content-based ranking over movie attributes
//!
//! Every catalog movie is reduced to a bag of normalized attribute tokens.
//! Raw term counts are compared pairwise by cosine similarity once, and each
//! request ranks context-relevant movies by their best similarity to any
//! favourite.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use ndarray::{Array2, ArrayView1};

use crate::{
    db::{resolve_in_order, MovieCatalog, RatingLog},
    models::{ContentRecommendation, Context, Movie, MovieId},
};

use super::{ensure_count, ContextFilter, RecommendError, DEFAULT_MAX_RECOMMENDATIONS};

fn squash(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Token document for one movie
///
/// People and country become single tokens with whitespace removed. Tags of
/// the multi-value fields are lowercased; plot keywords also lose their
/// inner whitespace.
pub fn bag_of_words(movie: &Movie) -> String {
    let mut words: Vec<String> = [
        &movie.director,
        &movie.actor_1,
        &movie.actor_2,
        &movie.actor_3,
        &movie.country,
    ]
    .into_iter()
    .map(|value| squash(value))
    .collect();

    words.extend(movie.genres.iter().map(|tag| tag.to_lowercase()));
    words.extend(movie.language.iter().map(|tag| tag.to_lowercase()));
    words.extend(movie.plot_keywords.iter().map(|tag| squash(tag)));

    words.join(" ")
}

/// Splits a document into runs of two or more word characters
pub fn tokenize(document: &str) -> Vec<&str> {
    document
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| token.chars().count() >= 2)
        .collect()
}

/// Per-movie token documents in catalog order
#[derive(Debug, Clone)]
pub struct FeatureCorpus {
    movie_ids: Vec<MovieId>,
    documents: Vec<String>,
}

impl FeatureCorpus {
    pub fn build(movies: &[Movie]) -> Self {
        Self {
            movie_ids: movies.iter().map(|m| m.movie_id).collect(),
            documents: movies.iter().map(bag_of_words).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn document(&self, pos: usize) -> &str {
        &self.documents[pos]
    }

    /// Sparse raw-count vectors over a shared vocabulary, sorted by term
    fn count_vectors(&self) -> (usize, Vec<Vec<(usize, f64)>>) {
        let mut vocabulary: BTreeMap<&str, usize> = BTreeMap::new();
        let counts: Vec<BTreeMap<&str, u32>> = self
            .documents
            .iter()
            .map(|doc| {
                let mut counts = BTreeMap::new();
                for token in tokenize(doc) {
                    *counts.entry(token).or_insert(0) += 1;
                }
                counts
            })
            .collect();
        for doc in &counts {
            for term in doc.keys() {
                let next = vocabulary.len();
                vocabulary.entry(term).or_insert(next);
            }
        }

        let vectors = counts
            .iter()
            .map(|doc| {
                let mut vector: Vec<(usize, f64)> = doc
                    .iter()
                    .map(|(term, count)| (vocabulary[term], f64::from(*count)))
                    .collect();
                vector.sort_by_key(|(term, _)| *term);
                vector
            })
            .collect();

        (vocabulary.len(), vectors)
    }
}

/// Dense symmetric matrix of pairwise cosine similarities between catalog
/// movies, indexed by catalog position. The diagonal is 1.
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    movie_ids: Vec<MovieId>,
    positions: HashMap<MovieId, usize>,
    values: Array2<f64>,
}

impl SimilarityMatrix {
    pub fn build(corpus: &FeatureCorpus) -> Self {
        let start = Instant::now();
        let size = corpus.len();
        let (vocabulary_size, vectors) = corpus.count_vectors();

        let norms: Vec<f64> = vectors
            .iter()
            .map(|v| v.iter().map(|(_, c)| c * c).sum::<f64>().sqrt())
            .collect();

        let mut postings: Vec<Vec<(usize, f64)>> = vec![Vec::new(); vocabulary_size];
        for (doc, vector) in vectors.iter().enumerate() {
            for &(term, count) in vector {
                postings[term].push((doc, count));
            }
        }

        let mut values = Array2::<f64>::zeros((size, size));
        let mut dots = vec![0.0; size];
        for i in 0..size {
            dots.fill(0.0);
            for &(term, count) in &vectors[i] {
                for &(j, other) in postings[term].iter().filter(|(j, _)| *j > i) {
                    dots[j] += count * other;
                }
            }

            values[[i, i]] = 1.0;
            for j in (i + 1)..size {
                let denom = norms[i] * norms[j];
                let similarity = if denom == 0.0 { 0.0 } else { dots[j] / denom };
                values[[i, j]] = similarity;
                values[[j, i]] = similarity;
            }
        }

        let mut positions = HashMap::with_capacity(size);
        for (pos, id) in corpus.movie_ids.iter().enumerate() {
            positions.entry(*id).or_insert(pos);
        }

        tracing::info!(
            movies = size,
            vocabulary = vocabulary_size,
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Built content similarity matrix"
        );

        Self {
            movie_ids: corpus.movie_ids.clone(),
            positions,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.movie_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movie_ids.is_empty()
    }

    pub fn position(&self, movie_id: MovieId) -> Option<usize> {
        self.positions.get(&movie_id).copied()
    }

    pub fn movie_at(&self, pos: usize) -> MovieId {
        self.movie_ids[pos]
    }

    pub fn get(&self, a: usize, b: usize) -> f64 {
        self.values[[a, b]]
    }

    pub fn row(&self, pos: usize) -> ArrayView1<'_, f64> {
        self.values.row(pos)
    }
}

/// Content-based recommender
///
/// The similarity matrix is built at most once, either eagerly through
/// [`ContentRecommender::precompute`] or by the first request, and is then
/// shared read-only. It is not rebuilt if the catalog changes.
pub struct ContentRecommender {
    ratings: Arc<dyn RatingLog>,
    catalog: Arc<dyn MovieCatalog>,
    filter: ContextFilter,
    max_recommendations: usize,
    similarity: OnceLock<SimilarityMatrix>,
}

impl ContentRecommender {
    pub fn new(
        ratings: Arc<dyn RatingLog>,
        catalog: Arc<dyn MovieCatalog>,
        filter: ContextFilter,
    ) -> Self {
        Self {
            ratings,
            catalog,
            filter,
            max_recommendations: DEFAULT_MAX_RECOMMENDATIONS,
            similarity: OnceLock::new(),
        }
    }

    /// Largest `n` accepted by [`Self::recommend`]
    pub fn with_max_recommendations(mut self, limit: usize) -> Self {
        self.max_recommendations = limit;
        self
    }

    /// The similarity matrix, built on first access
    pub fn similarity(&self) -> &SimilarityMatrix {
        self.similarity.get_or_init(|| {
            let corpus = FeatureCorpus::build(&self.catalog.raw_metadata());
            SimilarityMatrix::build(&corpus)
        })
    }

    pub fn precompute(&self) {
        self.similarity();
    }

    pub fn is_ready(&self) -> bool {
        self.similarity.get().is_some()
    }

    /// Top `n` context-relevant movies most similar to the favourites,
    /// descending by cosine similarity
    ///
    /// Favourites missing from the catalog are skipped; when none is left, or
    /// no context-relevant movie is in the catalog, the result is empty.
    pub fn recommend(
        &self,
        favourites: &[MovieId],
        ctx: &Context,
        n: usize,
    ) -> Result<Vec<ContentRecommendation>, RecommendError> {
        let ranked = self.rank(favourites, ctx, n)?;

        let results: Vec<ContentRecommendation> =
            resolve_in_order(self.catalog.as_ref(), &ranked)
                .into_iter()
                .map(|(movie, similarity)| ContentRecommendation { movie, similarity })
                .collect();

        if results.len() < ranked.len() {
            tracing::warn!(
                ranked = ranked.len(),
                resolved = results.len(),
                "Some content recommendations are missing from the catalog"
            );
        }

        for (i, rec) in results.iter().enumerate() {
            tracing::debug!(
                rank = i + 1,
                similarity = rec.similarity,
                movie_id = rec.movie.movie_id,
                title = %rec.movie.title,
                "Content recommendation"
            );
        }

        Ok(results)
    }

    /// Ranked (movie id, similarity) pairs before catalog resolution
    pub fn rank(
        &self,
        favourites: &[MovieId],
        ctx: &Context,
        n: usize,
    ) -> Result<Vec<(MovieId, f64)>, RecommendError> {
        ensure_count(n, self.max_recommendations)?;

        let snapshot = self.ratings.snapshot();
        let in_context: HashSet<MovieId> = self
            .filter
            .filter(&snapshot, ctx)?
            .into_iter()
            .map(|event| event.movie_id)
            .collect();

        let similarity = self.similarity();
        let favourites: BTreeSet<MovieId> = favourites.iter().copied().collect();

        let candidates: Vec<usize> = (0..similarity.len())
            .filter(|&pos| in_context.contains(&similarity.movie_at(pos)))
            .collect();
        let seeds: Vec<usize> = favourites
            .iter()
            .filter_map(|&movie_id| similarity.position(movie_id))
            .collect();

        tracing::info!(
            context_movies = in_context.len(),
            candidates = candidates.len(),
            favourites = favourites.len(),
            seeds = seeds.len(),
            "Ranking content candidates"
        );

        // best similarity per candidate, in first-recorded order
        let mut best: Vec<(usize, f64)> = Vec::new();
        let mut slot: HashMap<usize, usize> = HashMap::new();

        for &seed in &seeds {
            let row = similarity.row(seed);
            let mut scored: Vec<(usize, f64)> = candidates
                .iter()
                .filter(|&&pos| pos != seed)
                .map(|&pos| (pos, row[pos]))
                .collect();
            scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
            scored.truncate(n);

            for (pos, score) in scored {
                if favourites.contains(&similarity.movie_at(pos)) {
                    continue;
                }
                match slot.get(&pos).copied() {
                    Some(idx) => {
                        if score > best[idx].1 {
                            best[idx].1 = score;
                        }
                    }
                    None => {
                        slot.insert(pos, best.len());
                        best.push((pos, score));
                    }
                }
            }
        }

        // stable: equal similarities keep first-recorded order
        best.sort_by(|a, b| b.1.total_cmp(&a.1));
        best.truncate(n);

        Ok(best
            .into_iter()
            .map(|(pos, score)| (similarity.movie_at(pos), score))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryMovieCatalog, InMemoryRatingLog, MockMovieCatalog};
    use crate::models::RatingEvent;

    fn movie(movie_id: MovieId, title: &str, genres: &[&str]) -> Movie {
        Movie {
            movie_id,
            title: title.to_string(),
            director: String::new(),
            genres: genres.iter().map(|g| g.to_string()).collect(),
            actor_1: String::new(),
            actor_2: String::new(),
            actor_3: String::new(),
            plot_keywords: Vec::new(),
            language: Vec::new(),
            country: String::new(),
            imdb_score: 0.0,
        }
    }

    fn rated(movie_id: MovieId, time: &str) -> RatingEvent {
        RatingEvent {
            user_id: "1".to_string(),
            movie_id,
            rating: 4.0,
            time: time.to_string(),
            location: "Home".to_string(),
            companion: "Alone".to_string(),
        }
    }

    fn recommender(movies: Vec<Movie>, ratings: Vec<RatingEvent>) -> ContentRecommender {
        ContentRecommender::new(
            Arc::new(InMemoryRatingLog::new(ratings)),
            Arc::new(InMemoryMovieCatalog::new(movies)),
            ContextFilter::default(),
        )
    }

    fn everywhere() -> Context {
        Context::new("Weekend", "Home", "Alone")
    }

    fn genre_catalog() -> Vec<Movie> {
        vec![
            Movie {
                director: "Ridley Scott".to_string(),
                ..movie(1, "Alien", &["Horror", "Sci-Fi"])
            },
            Movie {
                director: "Ridley Scott".to_string(),
                ..movie(2, "Prometheus", &["Adventure", "Sci-Fi"])
            },
            movie(3, "Aliens", &["Horror", "Sci-Fi", "Action"]),
            movie(4, "Notting Hill", &["Comedy", "Romance"]),
            movie(5, "Love Actually", &["Comedy", "Romance", "Drama"]),
        ]
    }

    #[test]
    fn test_bag_of_words_normalizes_fields() {
        let movie = Movie {
            director: "James Cameron".to_string(),
            actor_1: "Sigourney  Weaver".to_string(),
            country: "New Zealand".to_string(),
            language: vec!["English".to_string()],
            plot_keywords: vec!["space marine".to_string(), "Alien".to_string()],
            ..movie(1, "Aliens", &["Action", "Sci-Fi"])
        };

        assert_eq!(
            bag_of_words(&movie),
            "jamescameron sigourneyweaver   newzealand action sci-fi english spacemarine alien"
        );
    }

    #[test]
    fn test_corpus_keeps_catalog_order() {
        let corpus = FeatureCorpus::build(&genre_catalog());
        assert_eq!(corpus.len(), 5);
        assert_eq!(corpus.document(3), "     comedy romance");
    }

    #[test]
    fn test_tokenize_drops_single_characters() {
        assert_eq!(
            tokenize("sci-fi a  x2 jamescameron"),
            vec!["sci", "fi", "x2", "jamescameron"]
        );
    }

    #[test]
    fn test_similarity_matrix_is_symmetric_with_unit_diagonal() {
        let movies = genre_catalog();
        let matrix = SimilarityMatrix::build(&FeatureCorpus::build(&movies));

        assert_eq!(matrix.len(), 5);
        for i in 0..matrix.len() {
            assert_eq!(matrix.get(i, i), 1.0);
            for j in 0..matrix.len() {
                assert_eq!(matrix.get(i, j), matrix.get(j, i));
                assert!((0.0..=1.0 + 1e-12).contains(&matrix.get(i, j)));
            }
        }
        assert_eq!(matrix.get(0, 3), 0.0);
        assert_eq!(matrix.position(4), Some(3));
        assert_eq!(matrix.movie_at(3), 4);
        assert_eq!(matrix.row(2).len(), 5);
    }

    #[test]
    fn test_raw_count_cosine() {
        // "action action" vs "action drama": counts (2,0) and (1,1)
        let movies = vec![
            movie(1, "A", &["Action", "Action"]),
            movie(2, "B", &["Action", "Drama"]),
        ];
        let matrix = SimilarityMatrix::build(&FeatureCorpus::build(&movies));
        assert!((matrix.get(0, 1) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn test_empty_document_keeps_unit_diagonal() {
        let movies = vec![movie(1, "A", &[]), movie(2, "B", &["Drama"])];
        let matrix = SimilarityMatrix::build(&FeatureCorpus::build(&movies));
        assert_eq!(matrix.get(0, 0), 1.0);
        assert_eq!(matrix.get(0, 1), 0.0);
    }

    #[test]
    fn test_shared_genre_ranks_first() {
        let movies = vec![
            movie(1, "A", &["action"]),
            movie(2, "B", &["action"]),
            movie(3, "C", &["drama"]),
        ];
        let ratings = vec![rated(1, "Weekend"), rated(2, "Weekend"), rated(3, "Weekend")];
        let rec = recommender(movies, ratings);

        let results = rec.recommend(&[1], &everywhere(), 2).unwrap();
        let ids: Vec<MovieId> = results.iter().map(|r| r.movie.movie_id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(results[0].similarity > results[1].similarity);
    }

    #[test]
    fn test_results_exclude_favourites_and_are_sorted() {
        let ratings = (1..=5).map(|id| rated(id, "Weekend")).collect();
        let rec = recommender(genre_catalog(), ratings);

        for n in 1..=5 {
            let results = rec.recommend(&[1, 4], &everywhere(), n).unwrap();
            assert!(results.len() <= n);
            assert!(results
                .iter()
                .all(|r| r.movie.movie_id != 1 && r.movie.movie_id != 4));
            assert!(results
                .windows(2)
                .all(|w| w[0].similarity >= w[1].similarity));
        }
    }

    #[test]
    fn test_best_similarity_across_seeds() {
        let ratings = (1..=5).map(|id| rated(id, "Weekend")).collect();
        let rec = recommender(genre_catalog(), ratings);
        let matrix = rec.similarity().clone();

        let ranked = rec.rank(&[1, 2], &everywhere(), 3).unwrap();
        let (id, score) = ranked[0];
        assert_eq!(id, 3);
        assert_eq!(score, matrix.get(0, 2).max(matrix.get(1, 2)));
    }

    #[test]
    fn test_only_context_movies_are_candidates() {
        let ratings = vec![rated(1, "Weekend"), rated(4, "Weekend"), rated(3, "Weekday")];
        let rec = ContentRecommender::new(
            Arc::new(InMemoryRatingLog::new(ratings)),
            Arc::new(InMemoryMovieCatalog::new(genre_catalog())),
            ContextFilter::new(crate::services::ContextMatch::All),
        );

        let ranked = rec.rank(&[1], &everywhere(), 5).unwrap();
        let ids: Vec<MovieId> = ranked.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![4]);
    }

    #[test]
    fn test_unknown_favourites_give_empty_result() {
        let ratings = (1..=5).map(|id| rated(id, "Weekend")).collect();
        let rec = recommender(genre_catalog(), ratings);

        assert!(rec.recommend(&[42], &everywhere(), 3).unwrap().is_empty());
        assert!(rec.recommend(&[], &everywhere(), 3).unwrap().is_empty());
    }

    #[test]
    fn test_context_movies_outside_catalog_give_empty_result() {
        let rec = recommender(genre_catalog(), vec![rated(77, "Weekend")]);
        assert!(rec.recommend(&[1], &everywhere(), 3).unwrap().is_empty());
    }

    #[test]
    fn test_context_without_rows_is_no_data() {
        let rec = recommender(genre_catalog(), vec![rated(1, "Weekend")]);
        let err = rec
            .recommend(&[1], &Context::new("Weekday", "Cinema", "Family"), 3)
            .unwrap_err();
        assert!(matches!(err, RecommendError::NoDataForContext(_)));
    }

    #[test]
    fn test_zero_n_is_invalid() {
        let rec = recommender(genre_catalog(), vec![rated(1, "Weekend")]);
        assert!(matches!(
            rec.recommend(&[1], &everywhere(), 0),
            Err(RecommendError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_matrix_built_once_and_reused() {
        let rec = recommender(genre_catalog(), vec![rated(2, "Weekend")]);
        assert!(!rec.is_ready());

        rec.precompute();
        assert!(rec.is_ready());
        let first = rec.similarity() as *const SimilarityMatrix;

        rec.recommend(&[1], &everywhere(), 3).unwrap();
        assert!(std::ptr::eq(first, rec.similarity()));
    }

    #[test]
    fn test_concurrent_first_access_builds_once() {
        let movies = genre_catalog();
        let metadata = movies.clone();
        let mut catalog = MockMovieCatalog::new();
        catalog
            .expect_raw_metadata()
            .times(1)
            .returning(move || metadata.clone());
        catalog.expect_get_by_ids().returning(move |ids: &[MovieId]| {
            movies
                .iter()
                .filter(|m| ids.contains(&m.movie_id))
                .cloned()
                .collect()
        });

        let rec = ContentRecommender::new(
            Arc::new(InMemoryRatingLog::new(
                (1..=5).map(|id| rated(id, "Weekend")).collect(),
            )),
            Arc::new(catalog),
            ContextFilter::default(),
        );
        assert!(!rec.is_ready());

        let seen: Vec<usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        let results = rec.recommend(&[1], &everywhere(), 3).unwrap();
                        assert!(!results.is_empty());
                        rec.similarity() as *const SimilarityMatrix as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(seen.len(), 8);
        assert!(seen.iter().all(|&ptr| ptr == seen[0]));
        assert!(rec.is_ready());
    }

    #[test]
    fn test_oversized_n_is_invalid() {
        let rec = recommender(genre_catalog(), vec![rated(1, "Weekend")]);
        for n in [DEFAULT_MAX_RECOMMENDATIONS + 1, 1usize << 44, usize::MAX] {
            assert!(matches!(
                rec.rank(&[1], &everywhere(), n),
                Err(RecommendError::InvalidArgument(_))
            ));
        }
        assert!(!rec.is_ready());
    }

    #[test]
    fn test_seeds_follow_favourite_ids() {
        let ratings = (1..=5).map(|id| rated(id, "Weekend")).collect();
        let rec = recommender(genre_catalog(), ratings);
        let matrix = rec.similarity();

        // 42 is not in the catalog
        let ranked = rec.rank(&[42, 4], &everywhere(), 1).unwrap();
        assert_eq!(ranked, vec![(5, matrix.get(3, 4))]);
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let ratings = (1..=5).map(|id| rated(id, "Weekend")).collect();
        let rec = recommender(genre_catalog(), ratings);

        let first = rec.rank(&[1, 5], &everywhere(), 4).unwrap();
        let second = rec.rank(&[5, 1], &everywhere(), 4).unwrap();
        assert_eq!(first, second);
    }
}
