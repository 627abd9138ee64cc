use axum::{
    extract::Request,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::db::SqliteRepository;
use crate::gemini::TextGenerator;
use crate::recommend::Recommender;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqliteRepository>,
    pub recommender: Arc<Recommender>,
    pub generator: Arc<dyn TextGenerator>,
}

impl AppState {
    pub fn new(
        db: Arc<SqliteRepository>,
        recommender: Arc<Recommender>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            db,
            recommender,
            generator,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/recommendations", post(crate::recommend::handlers::recommend))
        .route("/api/test/gemini", get(crate::recommend::handlers::test_gemini))
        .route(
            "/api/users/:external_id/history",
            get(crate::recommend::handlers::chat_history),
        )
        .route("/robots.txt", get(robots_txt_handler))
        .fallback(fallback_handler)
        .layer(axum::middleware::from_fn(crate::middleware::log_request))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn robots_txt_handler() -> &'static str {
    "User-agent: *\nDisallow: /\n"
}

async fn fallback_handler(req: Request<axum::body::Body>) -> impl IntoResponse {
    // OPTIONS preflights get their headers from the CORS layer.
    if req.method() == axum::http::Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    StatusCode::NOT_FOUND.into_response()
}
