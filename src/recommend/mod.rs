pub mod extract;
pub mod handlers;
pub mod prompt;
pub mod service;
pub mod types;

pub use extract::{extract_movies, Extraction};
pub use prompt::build_prompt;
pub use service::{RecommendationError, Recommender};
pub use types::{RecommendationFilters, RecommendationRequest, ValidationError};
