use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AppUser {
    pub id: String,
    pub external_id: String,
    pub display_name: String,
    pub created: DateTime<Utc>,
}

/// Who produced a chat-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum Sender {
    User,
    Ai,
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sender::User => write!(f, "USER"),
            Sender::Ai => write!(f, "AI"),
        }
    }
}

/// One logged conversation turn. Append-only: never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub user_id: String,
    pub sender: Sender,
    pub content: String,
    pub created: DateTime<Utc>,
}

/// One structured movie record recovered from model output.
///
/// Always constructible: every field the model omits defaults to an
/// empty string (rating to 0.0).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MovieRecommendation {
    pub user_id: String,
    pub title: String,
    pub year: String,
    pub genre: String,
    pub mood_tag: String,
    pub poster_url: String,
    pub preview_url: String,
    pub rating: f64,
    pub created: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Not found: {0}")]
    NotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;
