//! Shared application state.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;

use crate::chain::ConversationChain;
use crate::config::Config;
use crate::llm::LlmHandle;

/// Everything bound to one ingested repository. Replaced wholesale on
/// re-ingest, dropped on reset.
pub struct Session {
    pub repo_dir: PathBuf,
    pub database_dir: PathBuf,
    pub llm: LlmHandle,
    pub chain: ConversationChain,
}

#[derive(Clone)]
pub struct AppState {
    pub config_path: PathBuf,
    pub http_client: reqwest::Client,
    /// At most one session, and at most one operation touching it at a
    /// time. Ingest holds this lock for its whole run, so a concurrent chat
    /// waits instead of reading a half-built session.
    pub session: Arc<Mutex<Option<Session>>>,
}

impl AppState {
    pub fn new(config_path: PathBuf) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            config_path,
            http_client,
            session: Arc::new(Mutex::new(None)),
        })
    }

    /// Re-read the config file so edits take effect without a restart.
    pub fn load_config(&self) -> Result<Config> {
        Config::load(&self.config_path)
    }
}
