//! Non-streaming chat completion against the bound model.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::chooser::{LlmHandle, Tier};

/// Generation can be slow on small local hardware; bound it rather than
/// inheriting the client default.
const CHAT_TIMEOUT: Duration = Duration::from_secs(300);
const TEMPERATURE: f32 = 0.3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Send a conversation to the bound model and return the assistant reply.
pub async fn chat(
    client: &reqwest::Client,
    handle: &LlmHandle,
    messages: &[ChatMessage],
) -> Result<String> {
    match handle.tier {
        Tier::Local | Tier::Remote => chat_ollama(client, handle, messages).await,
        Tier::Openrouter => chat_openai_compatible(client, handle, messages).await,
    }
}

/// Single-turn convenience wrapper around [`chat`].
pub async fn complete(
    client: &reqwest::Client,
    handle: &LlmHandle,
    prompt: &str,
) -> Result<String> {
    chat(client, handle, &[ChatMessage::user(prompt)]).await
}

async fn chat_ollama(
    client: &reqwest::Client,
    handle: &LlmHandle,
    messages: &[ChatMessage],
) -> Result<String> {
    let url = format!("{}/api/chat", handle.base_url);
    let req = OllamaChatRequest {
        model: handle.model.clone(),
        messages: messages.to_vec(),
        stream: false,
        options: OllamaOptions {
            temperature: TEMPERATURE,
        },
    };

    let resp = client
        .post(&url)
        .timeout(CHAT_TIMEOUT)
        .json(&req)
        .send()
        .await
        .context("Failed to call ollama chat API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("ollama chat API returned {status}: {body}");
    }

    let body: OllamaChatResponse = resp
        .json()
        .await
        .context("Failed to parse ollama chat response")?;
    Ok(body.message.content)
}

async fn chat_openai_compatible(
    client: &reqwest::Client,
    handle: &LlmHandle,
    messages: &[ChatMessage],
) -> Result<String> {
    let url = format!("{}/chat/completions", handle.base_url);
    let api_key = handle.api_key.as_deref().unwrap_or_default();
    let req = OpenAiChatRequest {
        model: handle.model.clone(),
        messages: messages.to_vec(),
        temperature: TEMPERATURE,
    };

    let resp = client
        .post(&url)
        .timeout(CHAT_TIMEOUT)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&req)
        .send()
        .await
        .context("Failed to call openrouter chat API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("openrouter chat API returned {status}: {body}");
    }

    let body: OpenAiChatResponse = resp
        .json()
        .await
        .context("Failed to parse openrouter chat response")?;
    body.choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .context("openrouter chat response contained no choices")
}

// ─── Wire types ──────────────────────────────────────────

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

#[derive(Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChatChoice>,
}

#[derive(Deserialize)]
struct OpenAiChatChoice {
    message: ChatMessage,
}
