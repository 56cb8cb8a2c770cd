use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::{error::AppResult, models::MovieId};

/// Per-user favourite movies
#[async_trait]
pub trait FavouritesStore: Send + Sync {
    /// Favourites of a user; an unknown user has none
    async fn favourites(&self, user: &str) -> BTreeSet<MovieId>;

    /// Adds movies to a user's favourites
    async fn add_favourites(&self, user: &str, movie_ids: &[MovieId]);

    /// Persists every user's favourites
    async fn save(&self) -> AppResult<()>;
}

/// Favourites kept in memory and persisted as a JSON object of
/// `user -> [movie_id, ...]`
pub struct JsonFavouritesStore {
    path: PathBuf,
    users: RwLock<BTreeMap<String, BTreeSet<MovieId>>>,
}

impl JsonFavouritesStore {
    /// Opens the store at `path`; a missing file starts an empty store
    pub async fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();

        let users = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Favourites file not found, starting empty");
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(path = %path.display(), users = users.len(), "Loaded user favourites");

        Ok(Self {
            path,
            users: RwLock::new(users),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FavouritesStore for JsonFavouritesStore {
    async fn favourites(&self, user: &str) -> BTreeSet<MovieId> {
        self.users
            .read()
            .await
            .get(user)
            .cloned()
            .unwrap_or_default()
    }

    async fn add_favourites(&self, user: &str, movie_ids: &[MovieId]) {
        let mut users = self.users.write().await;
        users
            .entry(user.to_string())
            .or_default()
            .extend(movie_ids.iter().copied());
    }

    async fn save(&self) -> AppResult<()> {
        let json = {
            let users = self.users.read().await;
            serde_json::to_vec_pretty(&*users)?
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, json).await?;

        tracing::debug!(path = %self.path.display(), "Saved user favourites");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFavouritesStore::open(dir.path().join("user_db.json"))
            .await
            .unwrap();
        assert!(store.favourites("alice").await.is_empty());
    }

    #[tokio::test]
    async fn test_add_is_a_set_union() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFavouritesStore::open(dir.path().join("user_db.json"))
            .await
            .unwrap();

        store.add_favourites("alice", &[3, 1]).await;
        store.add_favourites("alice", &[1, 2]).await;

        let favs: Vec<MovieId> = store.favourites("alice").await.into_iter().collect();
        assert_eq!(favs, vec![1, 2, 3]);
        assert!(store.favourites("bob").await.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("user_db.json");

        let store = JsonFavouritesStore::open(&path).await.unwrap();
        store.add_favourites("alice", &[7, 5]).await;
        store.save().await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["alice"], serde_json::json!([5, 7]));

        let reopened = JsonFavouritesStore::open(&path).await.unwrap();
        assert_eq!(reopened.favourites("alice").await.len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_db.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(JsonFavouritesStore::open(&path).await.is_err());
    }
}
