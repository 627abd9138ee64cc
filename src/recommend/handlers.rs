use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info};

use super::service::RecommendationError;
use super::types::{ErrorBody, RecommendationRequest};
use crate::db::{AppUser, ChatLogRepo, DbError, UserRepo};
use crate::server::AppState;

/// POST /api/recommendations
pub async fn recommend(
    State(state): State<AppState>,
    Json(req): Json<RecommendationRequest>,
) -> Response {
    if let Err(e) = req.validate() {
        return (StatusCode::BAD_REQUEST, Json(ErrorBody::new(e.to_string()))).into_response();
    }

    info!(
        external_id = %req.user_external_id,
        genre = ?req.genre,
        mood = ?req.mood,
        "recommendation request"
    );

    let user = match resolve_user(&state, &req.user_external_id).await {
        Ok(user) => user,
        Err(e) => {
            error!("Failed to resolve user: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new(format!("Failed to resolve user: {}", e))),
            )
                .into_response();
        }
    };

    match state
        .recommender
        .recommend(&user.id, &req.message, &req.filters())
        .await
    {
        Ok(movies) => {
            info!(user_id = %user.id, count = movies.len(), "returning recommendations");
            Json(movies).into_response()
        }
        Err(e) => {
            error!("Error while generating recommendations: {}", e);
            let status = match e {
                RecommendationError::Upstream(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(ErrorBody::new(format!(
                    "Error while generating recommendations: {}",
                    e
                ))),
            )
                .into_response()
        }
    }
}

/// Look up the internal user for an external id, creating a Guest
/// record on first contact.
async fn resolve_user(state: &AppState, external_id: &str) -> Result<AppUser, DbError> {
    match state.db.get_user_by_external_id(external_id).await {
        Ok(user) => Ok(user),
        Err(DbError::NotFound(_)) => {
            info!(external_id, "creating new user");
            let user = AppUser {
                id: uuid::Uuid::new_v4().to_string(),
                external_id: external_id.to_string(),
                display_name: "Guest".to_string(),
                created: Utc::now(),
            };
            state.db.upsert_user(&user).await?;
            Ok(user)
        }
        Err(e) => Err(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct TestParams {
    #[serde(default = "default_test_prompt")]
    pub prompt: String,
}

fn default_test_prompt() -> String {
    "Suggest 3 feel-good movies from 2015 onwards.".to_string()
}

/// GET /api/test/gemini — connectivity probe returning the generated
/// text as-is, no parsing beyond the envelope.
pub async fn test_gemini(
    State(state): State<AppState>,
    Query(params): Query<TestParams>,
) -> Response {
    info!(prompt = %params.prompt, "testing generative API connection");

    match state.generator.generate(&params.prompt).await {
        Ok(text) => text.into_response(),
        Err(e) => {
            error!("Gemini request failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorBody::new(format!("Gemini request failed: {}", e))),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_history_limit")]
    pub limit: i32,
}

fn default_history_limit() -> i32 {
    20
}

/// GET /api/users/:external_id/history — recent chat turns, newest
/// first.
pub async fn chat_history(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Response {
    let user = match state.db.get_user_by_external_id(&external_id).await {
        Ok(user) => user,
        Err(DbError::NotFound(_)) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorBody::new(format!("User not found: {}", external_id))),
            )
                .into_response();
        }
        Err(e) => {
            error!("Failed to load user: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match state
        .db
        .fetch_recent_turns(&user.id, params.limit.clamp(1, 100))
        .await
    {
        Ok(turns) => Json(turns).into_response(),
        Err(e) => {
            error!("Failed to load chat history: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Repository, SqliteRepository};
    use crate::gemini::{TextGenerator, UpstreamError};
    use crate::recommend::Recommender;
    use crate::server::{build_router, AppState};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct StubGenerator(Result<String, ()>);

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, UpstreamError> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(()) => Err(UpstreamError::EmptyResponse),
            }
        }
    }

    async fn spawn_app(generator: StubGenerator) -> (String, Arc<SqliteRepository>) {
        let db = Arc::new(SqliteRepository::new("sqlite::memory:").await.unwrap());
        let generator: Arc<dyn TextGenerator> = Arc::new(generator);
        let recommender = Arc::new(Recommender::new(
            generator.clone(),
            db.clone() as Arc<dyn Repository>,
        ));
        let app = build_router(AppState::new(db.clone(), recommender, generator));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), db)
    }

    #[tokio::test]
    async fn test_first_contact_creates_guest_user() {
        let (base, db) =
            spawn_app(StubGenerator(Ok(r#"[{"title":"Alien"}]"#.to_string()))).await;
        let http = reqwest::Client::new();

        let resp = http
            .post(format!("{}/api/recommendations", base))
            .json(&serde_json::json!({
                "userExternalId": "ext-77",
                "message": "something scary"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let movies: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(movies[0]["title"], "Alien");

        let user = db.get_user_by_external_id("ext-77").await.unwrap();
        assert_eq!(user.display_name, "Guest");

        // A second request reuses the record instead of creating another.
        http.post(format!("{}/api/recommendations", base))
            .json(&serde_json::json!({
                "userExternalId": "ext-77",
                "message": "more of that"
            }))
            .send()
            .await
            .unwrap();
        let again = db.get_user_by_external_id("ext-77").await.unwrap();
        assert_eq!(again.id, user.id);

        let turns = db.fetch_recent_turns(&user.id, 20).await.unwrap();
        assert_eq!(turns.len(), 4);
    }

    #[tokio::test]
    async fn test_validation_failure_returns_400() {
        let (base, _db) = spawn_app(StubGenerator(Ok("[]".to_string()))).await;
        let http = reqwest::Client::new();

        let resp = http
            .post(format!("{}/api/recommendations", base))
            .json(&serde_json::json!({"userExternalId": "", "message": "hello there"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "userExternalId is required");

        let resp = http
            .post(format!("{}/api/recommendations", base))
            .json(&serde_json::json!({"userExternalId": "ext-1", "message": "x"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Message must be between 2 and 500 characters");
    }

    #[tokio::test]
    async fn test_upstream_failure_maps_to_502() {
        let (base, db) = spawn_app(StubGenerator(Err(()))).await;

        let resp = reqwest::Client::new()
            .post(format!("{}/api/recommendations", base))
            .json(&serde_json::json!({
                "userExternalId": "ext-1",
                "message": "anything good"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 502);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Error while generating recommendations"));

        // The failed request must not log any turns.
        let user = db.get_user_by_external_id("ext-1").await.unwrap();
        let turns = db.fetch_recent_turns(&user.id, 20).await.unwrap();
        assert!(turns.is_empty());
    }

    #[tokio::test]
    async fn test_gemini_probe_returns_raw_text() {
        let (base, _db) = spawn_app(StubGenerator(Ok("plain model text".to_string()))).await;

        let resp = reqwest::Client::new()
            .get(format!("{}/api/test/gemini", base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        assert_eq!(resp.text().await.unwrap(), "plain model text");
    }
}
