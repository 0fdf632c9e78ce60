pub mod error;
pub mod media;
pub mod notify;
pub mod state;
pub mod stories;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::{AppState, AppStateInner};

/// Request bodies may carry inline media, so the cap sits above the media limit.
const MAX_BODY_SIZE: usize = media::MAX_MEDIA_SIZE + 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stories", get(stories::list_stories).post(stories::create_story))
        .route("/stories/{id}/view", post(stories::view_story))
        .route("/stories/{id}/like", post(stories::like_story))
        .route("/stories/{id}/reply", post(stories::reply_story))
        .route("/media", post(media::upload_media))
        .route("/media/{file_id}", get(media::download_media))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
