//! Chat endpoint over the active session.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::llm::Tier;
use crate::state::AppState;
use crate::store::ScoredChunk;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub tier: Tier,
    pub model: String,
    pub sources: Vec<ScoredChunk>,
}

pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Response {
    let mut session = state.session.lock().await;
    if session.is_none() {
        // A previous process may have left a persisted store behind
        match super::ingest::restore_session(&state).await {
            Ok(restored) => *session = restored,
            Err(err) => {
                tracing::error!("Session restore failed: {err:#}");
                return super::error_response(&err);
            }
        }
    }
    let Some(session) = session.as_mut() else {
        return super::conflict("No repository ingested yet; call /api/ingest first");
    };

    match session.chain.ask(&state.http_client, &req.message).await {
        Ok(result) => (
            StatusCode::OK,
            Json(ChatResponse {
                answer: result.answer,
                tier: session.llm.tier,
                model: session.llm.model.clone(),
                sources: result.sources,
            }),
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Chat failed: {err:#}");
            super::error_response(&err)
        }
    }
}
