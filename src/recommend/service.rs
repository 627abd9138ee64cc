use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::db::{ChatTurn, DbError, MovieRecommendation, Repository, Sender};
use crate::gemini::{TextGenerator, UpstreamError};

use super::extract::extract_movies;
use super::prompt::build_prompt;
use super::types::RecommendationFilters;

/// How much conversation history goes into the prompt.
const HISTORY_LIMIT: i32 = 20;

#[derive(Debug, thiserror::Error)]
pub enum RecommendationError {
    #[error("Failed to load chat history: {0}")]
    History(#[source] DbError),
    #[error("Generative API call failed: {0}")]
    Upstream(#[from] UpstreamError),
    #[error("Failed to persist results: {0}")]
    Persist(#[source] DbError),
}

/// Drives one request through prompt building, the generative call,
/// extraction and persistence.
pub struct Recommender {
    generator: Arc<dyn TextGenerator>,
    db: Arc<dyn Repository>,
}

impl Recommender {
    pub fn new(generator: Arc<dyn TextGenerator>, db: Arc<dyn Repository>) -> Self {
        Self { generator, db }
    }

    /// Produce recommendations for one user message.
    ///
    /// On success exactly two chat turns are appended (the user message
    /// and a summary attributed to the AI), however many movies came
    /// back. A history or upstream failure aborts before any write.
    pub async fn recommend(
        &self,
        user_id: &str,
        message: &str,
        filters: &RecommendationFilters,
    ) -> Result<Vec<MovieRecommendation>, RecommendationError> {
        let mut history = self
            .db
            .fetch_recent_turns(user_id, HISTORY_LIMIT)
            .await
            .map_err(RecommendationError::History)?;
        // Fetched newest-first; the prompt wants chronological order.
        history.reverse();

        let prompt = build_prompt(&history, message, filters);
        info!(user_id, history_len = history.len(), "sending prompt to model");

        let raw = self.generator.generate(&prompt).await?;

        let extraction = extract_movies(&raw, user_id);
        if let Some(ref diagnostic) = extraction.diagnostic {
            warn!(user_id, %diagnostic, "no movies recovered from model reply");
        }
        let movies = extraction.movies;
        info!(user_id, count = movies.len(), "extracted recommendations");

        self.db
            .append_turn(&ChatTurn {
                user_id: user_id.to_string(),
                sender: Sender::User,
                content: message.to_string(),
                created: Utc::now(),
            })
            .await
            .map_err(RecommendationError::Persist)?;

        self.db
            .append_turn(&ChatTurn {
                user_id: user_id.to_string(),
                sender: Sender::Ai,
                content: format!("Recommended {} movies.", movies.len()),
                created: Utc::now(),
            })
            .await
            .map_err(RecommendationError::Persist)?;

        if !movies.is_empty() {
            self.db
                .save_recommendations(&movies)
                .await
                .map_err(RecommendationError::Persist)?;
        }

        Ok(movies)
    }
}
