//! Chat with a GitHub repository over a local RAG pipeline.
//!
//! Ingestion clones the configured repository, prunes files that add noise,
//! splits the rest into overlapping chunks, embeds them, and persists a
//! vector store. Questions are answered by a tiered LLM (local ollama,
//! remote ollama, then openrouter) over the chunks retrieved for each
//! question, with optional multi-query expansion.

pub mod api;
pub mod chain;
pub mod config;
pub mod embedding;
pub mod error;
pub mod git;
pub mod llm;
pub mod loader;
pub mod paths;
pub mod prune;
pub mod retriever;
pub mod splitter;
pub mod state;
pub mod store;
