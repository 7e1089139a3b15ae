use thiserror::Error;

/// Contract errors surfaced across module boundaries.
///
/// Stage-internal failures travel as `anyhow::Error`; these variants mark
/// the failure modes callers are expected to match on. File-level problems
/// (undecodable content, missing prune targets) are logged and skipped, and
/// never appear here.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid GitHub URL {0:?}: expected https://github.com/<owner>/<repo>")]
    InvalidUrl(String),

    #[error(
        "private repository requires credentials: set both github.username and github.token in the config"
    )]
    MissingCredentials,

    #[error(
        "repository {0:?} not found: check the URL, or set github.username and github.token if it is private"
    )]
    RepositoryNotFound(String),

    #[error("failed to clone repository: {0}")]
    Clone(#[from] git2::Error),

    #[error("no embedding provider enabled: set `use: true` on exactly one entry under models.embedding")]
    NoEmbeddingProvider,

    #[error(
        "multiple embedding providers enabled ({0:?}): exactly one models.embedding entry may have `use: true`"
    )]
    AmbiguousEmbeddingProvider(Vec<String>),

    #[error("no AI model available: local ollama, remote ollama, and openrouter all failed their probes")]
    NoModelAvailable,

    #[error("configuration error: {0}")]
    Configuration(String),
}
