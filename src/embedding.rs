//! Embedding provider selection and HTTP embedding calls.
//!
//! Exactly one provider under `models.embedding` may be enabled. Zero or
//! several enabled entries is a configuration error, never a pick-first
//! fallback: silently embedding with an unintended model would poison the
//! vector store undetected.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;

/// Maximum characters to send per text to an embedding API. Most embedding
/// models have an 8k-token context; dense content can tokenize at ~2.3
/// tokens per char, so 3 000 chars stays safely under the limit.
const MAX_EMBED_CHARS: usize = 3_000;

/// A selected embedding backend: one provider, one model.
#[derive(Debug, Clone)]
pub struct Embedder {
    pub provider: String,
    pub model: String,
    base_url: Option<String>,
    api_key: Option<String>,
}

/// Scan the config for the single enabled embedding provider.
///
/// Pure over the config; fails with [`Error::NoEmbeddingProvider`] or
/// [`Error::AmbiguousEmbeddingProvider`] and mutates nothing.
pub fn choose_embedding_provider(config: &Config) -> Result<Embedder> {
    let enabled: Vec<(&String, &crate::config::EmbeddingProviderConfig)> = config
        .models
        .embedding
        .iter()
        .filter(|(_, p)| p.enabled)
        .collect();

    match enabled.as_slice() {
        [] => Err(Error::NoEmbeddingProvider.into()),
        [(name, provider)] => Ok(Embedder {
            provider: name.to_string(),
            model: provider.model.clone(),
            base_url: provider.base_url.clone(),
            api_key: provider.api_key.clone(),
        }),
        many => Err(Error::AmbiguousEmbeddingProvider(
            many.iter().map(|(name, _)| name.to_string()).collect(),
        )
        .into()),
    }
}

/// Truncate `text` to at most `MAX_EMBED_CHARS`, splitting on a UTF-8 char
/// boundary.
fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

impl Embedder {
    /// Generate embeddings for a batch of texts with the selected provider.
    pub async fn embed_batch(
        &self,
        client: &reqwest::Client,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let truncated: Vec<String> = texts
            .iter()
            .map(|t| truncate_for_embedding(t).to_string())
            .collect();

        match self.provider.as_str() {
            "ollama" => self.embed_ollama(client, &truncated).await,
            "openai" | "voyageai" => self.embed_openai_compatible(client, &truncated).await,
            "huggingface" => self.embed_huggingface(client, &truncated).await,
            other => anyhow::bail!("Unknown embedding provider: {other}"),
        }
    }

    /// Generate an embedding for a single text.
    pub async fn embed_single(&self, client: &reqwest::Client, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(client, &[text.to_string()]).await?;
        results.into_iter().next().context("No embedding returned")
    }

    fn base_url(&self) -> &str {
        if let Some(url) = self.base_url.as_deref() {
            return url;
        }
        match self.provider.as_str() {
            "ollama" => "http://localhost:11434",
            "voyageai" => "https://api.voyageai.com",
            "openai" => "https://api.openai.com",
            _ => "https://api-inference.huggingface.co",
        }
    }

    async fn embed_ollama(
        &self,
        client: &reqwest::Client,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url());

        let batch_size = 32;
        let mut all_embeddings = Vec::new();

        for chunk in texts.chunks(batch_size) {
            let req = OllamaEmbedRequest {
                model: self.model.clone(),
                input: chunk.to_vec(),
                truncate: true,
            };

            let resp = client
                .post(&url)
                .json(&req)
                .send()
                .await
                .context("Failed to call ollama embed API")?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                anyhow::bail!("ollama embed API returned {status}: {body}");
            }

            let body: OllamaEmbedResponse = resp
                .json()
                .await
                .context("Failed to parse ollama embed response")?;
            all_embeddings.extend(body.embeddings);
        }

        Ok(all_embeddings)
    }

    async fn embed_openai_compatible(
        &self,
        client: &reqwest::Client,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.base_url());
        let api_key = self.api_key.as_deref().unwrap_or_default();

        let batch_size = 64;
        let mut all_embeddings = Vec::new();

        for chunk in texts.chunks(batch_size) {
            let req = OpenAiEmbedRequest {
                model: self.model.clone(),
                input: chunk.to_vec(),
            };

            let resp = client
                .post(&url)
                .header("Authorization", format!("Bearer {api_key}"))
                .json(&req)
                .send()
                .await
                .with_context(|| format!("Failed to call {} embed API", self.provider))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                anyhow::bail!("{} embed API returned {status}: {body}", self.provider);
            }

            let body: OpenAiEmbedResponse = resp
                .json()
                .await
                .with_context(|| format!("Failed to parse {} embed response", self.provider))?;

            all_embeddings.extend(body.data.into_iter().map(|d| d.embedding));
        }

        Ok(all_embeddings)
    }

    async fn embed_huggingface(
        &self,
        client: &reqwest::Client,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>> {
        let url = format!(
            "{}/pipeline/feature-extraction/{}",
            self.base_url(),
            self.model
        );
        let api_key = self.api_key.as_deref().unwrap_or_default();

        let batch_size = 32;
        let mut all_embeddings = Vec::new();

        for chunk in texts.chunks(batch_size) {
            let req = HuggingFaceEmbedRequest {
                inputs: chunk.to_vec(),
            };

            let resp = client
                .post(&url)
                .header("Authorization", format!("Bearer {api_key}"))
                .json(&req)
                .send()
                .await
                .context("Failed to call huggingface embed API")?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                anyhow::bail!("huggingface embed API returned {status}: {body}");
            }

            let body: Vec<Vec<f32>> = resp
                .json()
                .await
                .context("Failed to parse huggingface embed response")?;
            all_embeddings.extend(body);
        }

        Ok(all_embeddings)
    }
}

// ─── Wire types ──────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest {
    model: String,
    input: Vec<String>,
    /// Ask ollama to silently truncate inputs that exceed the model context
    /// instead of returning a 400 error.
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct OpenAiEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct HuggingFaceEmbedRequest {
    inputs: Vec<String>,
}
