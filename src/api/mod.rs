//! HTTP surface: ingestion, chat, reset, and config management.

pub mod chat;
pub mod config;
pub mod ingest;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::error::Error;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/ingest", post(ingest::ingest))
        .route("/api/reset", post(ingest::reset))
        .route("/api/chat", post(chat::chat))
        .route(
            "/api/config",
            get(config::get_config).put(config::put_config),
        )
        .with_state(state)
}

/// Map an internal error onto a status code and a JSON error body. Contract
/// violations the caller can fix are 4xx; missing backends are 503;
/// everything else is a 500 with the chain of causes.
pub(crate) fn error_response(err: &anyhow::Error) -> Response {
    let status = match err.downcast_ref::<Error>() {
        Some(
            Error::InvalidUrl(_)
            | Error::MissingCredentials
            | Error::NoEmbeddingProvider
            | Error::AmbiguousEmbeddingProvider(_)
            | Error::Configuration(_),
        ) => StatusCode::BAD_REQUEST,
        Some(Error::RepositoryNotFound(_)) => StatusCode::NOT_FOUND,
        Some(Error::NoModelAvailable) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": format!("{err:#}") }))).into_response()
}

pub(crate) fn conflict(message: &str) -> Response {
    (
        StatusCode::CONFLICT,
        Json(json!({ "error": message })),
    )
        .into_response()
}
