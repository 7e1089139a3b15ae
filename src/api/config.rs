//! Config endpoints: redacted read, whole-document write.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::config::Config;
use crate::state::AppState;

/// Serve the config with secrets replaced by presence flags.
pub async fn get_config(State(state): State<AppState>) -> Response {
    let config = match state.load_config() {
        Ok(config) => config,
        Err(err) => return super::error_response(&err),
    };
    (StatusCode::OK, Json(redact(&config))).into_response()
}

/// Replace the config file with the submitted document.
///
/// Omitted secrets are carried over from the file on disk, so a client can
/// round-trip the redacted GET body without wiping credentials.
pub async fn put_config(
    State(state): State<AppState>,
    Json(mut incoming): Json<Config>,
) -> Response {
    if let Ok(current) = state.load_config() {
        if incoming.github.token.is_none() {
            incoming.github.token = current.github.token;
        }
        if incoming.keys.openrouter.is_none() {
            incoming.keys.openrouter = current.keys.openrouter;
        }
        for (name, provider) in incoming.models.embedding.iter_mut() {
            if provider.api_key.is_none() {
                if let Some(existing) = current.models.embedding.get(name) {
                    provider.api_key = existing.api_key.clone();
                }
            }
        }
    }

    if let Err(err) = incoming.validate() {
        return super::error_response(&err);
    }

    match incoming.save(&state.config_path) {
        Ok(()) => {
            tracing::info!("Config updated via API");
            (StatusCode::OK, Json(redact(&incoming))).into_response()
        }
        Err(err) => super::error_response(&err),
    }
}

fn redact(config: &Config) -> Value {
    let mut value = match serde_json::to_value(config) {
        Ok(value) => value,
        Err(_) => return json!({}),
    };

    if let Some(github) = value.pointer_mut("/github") {
        let has_token = config.github.token.as_deref().is_some_and(|t| !t.is_empty());
        github["token"] = Value::Null;
        github["has_token"] = json!(has_token);
    }
    if let Some(keys) = value.pointer_mut("/keys") {
        let has_key = config.keys.openrouter.as_deref().is_some_and(|k| !k.is_empty());
        keys["openrouter"] = Value::Null;
        keys["has_openrouter_key"] = json!(has_key);
    }
    if let Some(Value::Object(providers)) = value.pointer_mut("/models/embedding") {
        for provider in providers.values_mut() {
            if provider.get("api_key").is_some_and(|k| !k.is_null()) {
                provider["api_key"] = Value::Null;
                provider["has_api_key"] = json!(true);
            }
        }
    }
    value
}
