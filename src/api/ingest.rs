//! Ingestion endpoint: clone, prune, split, embed, and open a session.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::chain::ConversationChain;
use crate::config::Config;
use crate::embedding::choose_embedding_provider;
use crate::llm::{choose_model, Tier};
use crate::retriever::{Retriever, DEFAULT_QUERY_VARIANTS};
use crate::state::{AppState, Session};
use crate::store::{VectorStore, COLLECTION_NAME, DEFAULT_TOP_K};
use crate::{git, loader, paths, prune, splitter};

#[derive(Debug, Deserialize, Default)]
pub struct IngestRequest {
    /// Overrides `github.url` in the config (and is persisted there).
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub repo: String,
    pub files: usize,
    pub chunks: usize,
    pub tier: Tier,
    pub model: String,
}

pub async fn ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Response {
    match run_ingest(&state, req).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(err) => {
            tracing::error!("Ingestion failed: {err:#}");
            super::error_response(&err)
        }
    }
}

async fn run_ingest(state: &AppState, req: IngestRequest) -> anyhow::Result<IngestResponse> {
    let mut config = state.load_config()?;
    if let Some(url) = req.url {
        paths::parse_github_url(&url)?;
        config.github.url = url;
        config.save(&state.config_path)?;
    }

    // Validate everything that can fail cheaply before touching the network
    let (owner, repo) = paths::parse_github_url(&config.github.url)?;
    let embedder = choose_embedding_provider(&config)?;

    // Tear down the old session first, including its directories: they may
    // belong to a different URL than the one being ingested now. The lock
    // is held throughout, so no chat runs against a store mid-rebuild.
    let mut session = state.session.lock().await;
    teardown_session(&mut session);

    let repo_dir = git::clone_repository(&state.http_client, &config).await?;
    let database_dir = paths::database_dir(&config.data_dir, &config.github.url)?;

    let prune_config = config.clone();
    let prune_dir = repo_dir.clone();
    let documents = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<loader::Document>> {
        prune::prune(&prune_dir, &prune_config)?;
        Ok(loader::load_documents(&prune_dir))
    })
    .await??;

    let chunks = splitter::split_documents(&documents, config.chunk_size, config.chunk_overlap);
    tracing::info!(
        "Loaded {} documents into {} chunks from {owner}/{repo}",
        documents.len(),
        chunks.len()
    );

    let store = Arc::new(
        VectorStore::build(
            &chunks,
            &embedder,
            &state.http_client,
            &database_dir,
            COLLECTION_NAME,
        )
        .await?,
    );

    // Probes block on subprocess and TCP connects; keep them off the runtime
    let probe_config = config.clone();
    let llm = tokio::task::spawn_blocking(move || choose_model(&probe_config)).await??;
    let retriever = build_retriever(&config, store, embedder, &llm);

    let response = IngestResponse {
        repo: format!("{owner}/{repo}"),
        files: documents.len(),
        chunks: chunks.len(),
        tier: llm.tier,
        model: llm.model.clone(),
    };

    *session = Some(Session {
        repo_dir,
        database_dir,
        llm: llm.clone(),
        chain: ConversationChain::new(llm, retriever),
    });

    Ok(response)
}

fn build_retriever(
    config: &Config,
    store: Arc<VectorStore>,
    embedder: crate::embedding::Embedder,
    llm: &crate::llm::LlmHandle,
) -> Retriever {
    if config.models.multi_query {
        Retriever::MultiQuery {
            store,
            embedder,
            llm: llm.clone(),
            top_k: DEFAULT_TOP_K,
            num_variants: DEFAULT_QUERY_VARIANTS,
        }
    } else {
        Retriever::Direct {
            store,
            embedder,
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// Drop the session and delete its on-disk artifacts, wherever they point.
fn teardown_session(slot: &mut Option<Session>) {
    if let Some(old) = slot.take() {
        git::remove_dir_if_present(&old.repo_dir);
        git::remove_dir_if_present(&old.database_dir);
    }
}

/// Reopen a collection persisted by an earlier run, if one exists for the
/// configured URL.
fn open_persisted_store(config: &Config) -> anyhow::Result<Option<Arc<VectorStore>>> {
    let database_dir = paths::database_dir(&config.data_dir, &config.github.url)?;
    if !VectorStore::exists(&database_dir, COLLECTION_NAME) {
        return Ok(None);
    }
    let store = VectorStore::open(&database_dir, COLLECTION_NAME)?;
    tracing::info!(
        "Reopened persisted vector store ({} chunks) from {}",
        store.len(),
        database_dir.display()
    );
    Ok(Some(Arc::new(store)))
}

/// Rebuild a session from a vector store persisted by an earlier process,
/// skipping clone and embedding. Returns `None` when nothing is persisted
/// for the configured URL.
pub(crate) async fn restore_session(state: &AppState) -> anyhow::Result<Option<Session>> {
    let config = state.load_config()?;
    let Some(store) = open_persisted_store(&config)? else {
        return Ok(None);
    };
    let embedder = choose_embedding_provider(&config)?;
    let probe_config = config.clone();
    let llm = tokio::task::spawn_blocking(move || choose_model(&probe_config)).await??;
    let retriever = build_retriever(&config, store, embedder, &llm);
    Ok(Some(Session {
        repo_dir: paths::repo_dir(&config.data_dir, &config.github.url)?,
        database_dir: paths::database_dir(&config.data_dir, &config.github.url)?,
        llm: llm.clone(),
        chain: ConversationChain::new(llm, retriever),
    }))
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub reset: bool,
}

/// Drop the session and delete its on-disk artifacts.
pub async fn reset(State(state): State<AppState>) -> Response {
    let mut session = state.session.lock().await;
    if session.is_some() {
        teardown_session(&mut session);
        tracing::info!("Session reset");
    }
    (StatusCode::OK, Json(ResetResponse { reset: true })).into_response()
}
