use serde::{Deserialize, Serialize};

/// Catalog key of a movie
pub type MovieId = i64;

/// Movie metadata as held by the catalog
///
/// Multi-value attributes are kept as tag lists but travel as `|`-joined
/// strings, which is the format of the catalog file and of the mobile client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub movie_id: MovieId,
    pub title: String,
    pub director: String,
    #[serde(with = "pipe_tags")]
    pub genres: Vec<String>,
    pub actor_1: String,
    pub actor_2: String,
    pub actor_3: String,
    #[serde(with = "pipe_tags")]
    pub plot_keywords: Vec<String>,
    #[serde(with = "pipe_tags")]
    pub language: Vec<String>,
    pub country: String,
    pub imdb_score: f64,
}

/// Splits a `|`-delimited attribute into its tags, dropping empty segments
pub(crate) fn split_tags(raw: &str) -> Vec<String> {
    raw.split('|')
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

mod pipe_tags {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(tags: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&tags.join("|"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(super::split_tags(&raw))
    }
}
