pub(crate) mod movie;
mod rating;
mod recommendation;

pub use movie::{Movie, MovieId};
pub use rating::{Context, RatingEvent};
pub use recommendation::{CollaborativeRecommendation, ContentRecommendation};
