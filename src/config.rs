use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Whole-process configuration, persisted as one YAML document.
///
/// The file is re-read on every access and only ever rewritten as a whole
/// document (read-modify-write); there is no partial-update path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where cloned repos and vector databases are stored
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub developer: DeveloperConfig,
    pub github: GithubConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    /// File extensions (with leading dot) kept by the pruner
    #[serde(default = "default_allowed_extensions")]
    pub allowed_file_extensions: Vec<String>,
    /// Relative paths removed recursively after clone
    #[serde(default)]
    pub blocked_file_paths: Vec<String>,
    /// Basenames removed anywhere in the tree after clone
    #[serde(default = "default_blocked_files")]
    pub blocked_files: Vec<String>,
    /// Maximum characters per document chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks of one document
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeveloperConfig {
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    pub url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// When false, only the hosted openrouter tier is attempted
    #[serde(default = "default_true")]
    pub escalation: bool,
    /// Expand each question into paraphrased variants before retrieval
    #[serde(default = "default_true")]
    pub multi_query: bool,
    pub ollama: OllamaConfig,
    pub openrouter: OpenRouterModels,
    /// Provider name -> embedding settings; exactly one entry may be enabled
    #[serde(default)]
    pub embedding: BTreeMap<String, EmbeddingProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Model name used when a local ollama answers the probe
    pub local: String,
    /// Model name used on the remote ollama server
    pub remote: String,
    /// Remote ollama base URL, e.g. http://10.0.0.5:11434
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterModels {
    pub low: String,
    pub medium: String,
    pub high: String,
    pub supervisor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingProviderConfig {
    /// Model identifier sent to the provider
    pub model: String,
    /// Enabled flag; the selector requires exactly one `use: true`
    #[serde(rename = "use")]
    pub enabled: bool,
    /// Override for the provider API base URL
    #[serde(default)]
    pub base_url: Option<String>,
    /// API key for hosted providers
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeysConfig {
    #[serde(default)]
    pub openrouter: Option<String>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_bind_addr() -> String {
    "127.0.0.1:9000".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_true() -> bool {
    true
}

fn default_chunk_size() -> usize {
    2048
}

fn default_chunk_overlap() -> usize {
    256
}

fn default_allowed_extensions() -> Vec<String> {
    [".py", ".rs", ".go", ".html", ".css", ".js", ".ts", ".md", ".toml", ".yaml"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_blocked_files() -> Vec<String> {
    ["__init__.py", ".gitignore", ".DS_Store"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        let mut embedding = BTreeMap::new();
        embedding.insert(
            "huggingface".to_string(),
            EmbeddingProviderConfig {
                model: "sentence-transformers/all-mpnet-base-v2".to_string(),
                enabled: true,
                base_url: None,
                api_key: None,
            },
        );

        Self {
            data_dir: default_data_dir(),
            bind_addr: default_bind_addr(),
            developer: DeveloperConfig::default(),
            github: GithubConfig {
                url: "<your github url>".to_string(),
                branch: default_branch(),
                username: None,
                token: None,
            },
            models: ModelsConfig {
                escalation: true,
                multi_query: true,
                ollama: OllamaConfig {
                    local: "dolphin-mistral:v2.6".to_string(),
                    remote: "dolphin-mistral:v2.6".to_string(),
                    base_url: "http://localhost:11434".to_string(),
                },
                openrouter: OpenRouterModels {
                    low: "openchat/openchat-7b:free".to_string(),
                    medium: "google/gemini-pro".to_string(),
                    high: "mistralai/mistral-medium".to_string(),
                    supervisor: "openai/gpt-4-turbo-preview".to_string(),
                },
                embedding,
            },
            keys: KeysConfig::default(),
            allowed_file_extensions: default_allowed_extensions(),
            blocked_file_paths: Vec::new(),
            blocked_files: default_blocked_files(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl Config {
    /// Path to the config file, from REPOCHAT_CONFIG or ./config.yaml.
    pub fn default_path() -> PathBuf {
        std::env::var("REPOCHAT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.yaml"))
    }

    /// Read and parse the whole config file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Configuration("chunk_size must be positive".to_string()).into());
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            ))
            .into());
        }
        Ok(())
    }

    /// Rewrite the whole config file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self).context("Failed to serialize config")?;
        std::fs::write(path, data)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Write a scaffold config when none exists yet.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if path.exists() {
            return Ok(());
        }
        tracing::info!("Writing default config to {}", path.display());
        Config::default().save(path)
    }
}
