use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use repochat::api;
use repochat::config::Config;
use repochat::error::Error;
use repochat::llm;
use repochat::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config_path = Config::default_path();
    Config::write_default_if_missing(&config_path)?;
    let config = Config::load(&config_path)?;
    if config.developer.debug {
        tracing::info!("Debug mode enabled");
    }

    // Refuse to start with no reachable model rather than failing on the
    // first question
    match llm::choose_model(&config) {
        Ok(handle) => tracing::info!(
            "Startup model check passed: {} tier, model {}",
            handle.tier.as_str(),
            handle.model
        ),
        Err(err) if matches!(err.downcast_ref::<Error>(), Some(Error::NoModelAvailable)) => {
            anyhow::bail!(
                "No LLM backend is reachable. Install ollama, make the remote \
                 ollama server reachable, or allow outbound access to openrouter.ai."
            );
        }
        Err(err) => return Err(err),
    }

    let state = AppState::new(config_path)?;
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("Listening on {}", config.bind_addr);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
