use serde::{Deserialize, Serialize};

/// Incoming request for movie recommendations. Everything past
/// `userExternalId` and `message` is an optional filter.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRequest {
    #[serde(default)]
    pub user_external_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub year_from: Option<i32>,
    #[serde(default)]
    pub year_to: Option<i32>,
    #[serde(default)]
    pub mood: Option<String>,
}

impl RecommendationRequest {
    /// Checked before the pipeline runs; nothing downstream sees an
    /// invalid request.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.user_external_id.trim().is_empty() {
            return Err(ValidationError::MissingUserId);
        }
        if self.message.trim().is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        let len = self.message.chars().count();
        if !(2..=500).contains(&len) {
            return Err(ValidationError::MessageLength);
        }
        Ok(())
    }

    pub fn filters(&self) -> RecommendationFilters {
        RecommendationFilters {
            genre: self.genre.clone(),
            year_from: self.year_from,
            year_to: self.year_to,
            mood: self.mood.clone(),
        }
    }
}

/// Filter preferences. A value object: no identity, fully optional.
#[derive(Debug, Clone, Default)]
pub struct RecommendationFilters {
    pub genre: Option<String>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub mood: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("userExternalId is required")]
    MissingUserId,
    #[error("Message cannot be empty")]
    EmptyMessage,
    #[error("Message must be between 2 and 500 characters")]
    MessageLength,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
