pub mod catalog;
pub mod favourites;
pub mod ratings;

pub use catalog::{resolve_in_order, InMemoryMovieCatalog, MovieCatalog};
#[cfg(test)]
pub use catalog::MockMovieCatalog;
pub use favourites::{FavouritesStore, JsonFavouritesStore};
pub use ratings::{InMemoryRatingLog, RatingLog};
