//! Retrieval over the vector store: direct lookup or multi-query expansion.
//!
//! Multi-query asks the LLM to rephrase the question a few ways, searches
//! once per phrasing (original first), and merges the hit lists with
//! first-seen-rank deduplication keyed on chunk id. Expansion failures are
//! not fatal; the retriever degrades to the original question alone.

use std::sync::Arc;

use anyhow::Result;

use crate::embedding::Embedder;
use crate::llm::{self, LlmHandle};
use crate::store::{ScoredChunk, VectorStore};

pub const DEFAULT_QUERY_VARIANTS: usize = 3;

const EXPANSION_PROMPT: &str = "\
You generate alternative phrasings of a question about a software codebase, \
for use in vector similarity search. Produce {n} rephrasings of the question \
below. Keep each one short and self-contained. Output one rephrasing per \
line with no numbering, bullets, or commentary.

Question: {question}";

pub enum Retriever {
    Direct {
        store: Arc<VectorStore>,
        embedder: Embedder,
        top_k: usize,
    },
    MultiQuery {
        store: Arc<VectorStore>,
        embedder: Embedder,
        llm: LlmHandle,
        top_k: usize,
        num_variants: usize,
    },
}

impl Retriever {
    /// Retrieve the chunks most relevant to `question`.
    pub async fn retrieve(
        &self,
        client: &reqwest::Client,
        question: &str,
    ) -> Result<Vec<ScoredChunk>> {
        match self {
            Retriever::Direct {
                store,
                embedder,
                top_k,
            } => {
                let query_embedding = embedder.embed_single(client, question).await?;
                Ok(store.search(&query_embedding, *top_k))
            }
            Retriever::MultiQuery {
                store,
                embedder,
                llm,
                top_k,
                num_variants,
            } => {
                let variants =
                    generate_query_variants(client, llm, question, *num_variants).await;
                tracing::debug!("Expanded question into {} variants", variants.len());

                let mut queries = vec![question.to_string()];
                queries.extend(variants);

                let mut merged: Vec<ScoredChunk> = Vec::new();
                for query in &queries {
                    let query_embedding = embedder.embed_single(client, query).await?;
                    merged.extend(store.search(&query_embedding, *top_k));
                }
                Ok(dedup_by_first_seen(merged))
            }
        }
    }
}

/// Ask the LLM for `n` rephrasings of `question`. Degrades to an empty list
/// when the call or the parse fails; expansion is an enhancement, never a
/// requirement.
async fn generate_query_variants(
    client: &reqwest::Client,
    llm: &LlmHandle,
    question: &str,
    n: usize,
) -> Vec<String> {
    if n == 0 {
        return Vec::new();
    }
    let prompt = EXPANSION_PROMPT
        .replace("{n}", &n.to_string())
        .replace("{question}", question);

    match llm::complete(client, llm, &prompt).await {
        Ok(response) => parse_variants(&response, n),
        Err(err) => {
            tracing::warn!("Query expansion failed, using original question only: {err:#}");
            Vec::new()
        }
    }
}

/// Parse LLM output into at most `n` clean query lines. Models sometimes
/// number or bullet their output despite instructions; strip that.
fn parse_variants(response: &str, n: usize) -> Vec<String> {
    response
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')')
                .trim_start_matches(['-', '*'])
                .trim()
        })
        .filter(|line| !line.is_empty())
        .take(n)
        .map(str::to_string)
        .collect()
}

/// Merge hit lists keeping only the first occurrence of each chunk id, in
/// first-seen order.
fn dedup_by_first_seen(hits: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
    let mut seen = std::collections::HashSet::new();
    hits.into_iter()
        .filter(|hit| seen.insert(hit.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            id: id.to_string(),
            relative_path: id.split('#').next().unwrap().to_string(),
            chunk_index: 0,
            text: format!("text for {id}"),
            score,
        }
    }

    #[test]
    fn test_dedup_keeps_first_seen_rank() {
        // The same chunk surfacing for several query variants must keep the
        // rank from the earliest variant that found it
        let merged = dedup_by_first_seen(vec![
            hit("a.md#0", 0.9),
            hit("b.md#0", 0.8),
            hit("a.md#0", 0.95),
            hit("c.md#0", 0.7),
            hit("b.md#0", 0.6),
        ]);
        let ids: Vec<&str> = merged.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a.md#0", "b.md#0", "c.md#0"]);
        assert!((merged[0].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_dedup_empty_input() {
        assert!(dedup_by_first_seen(Vec::new()).is_empty());
    }

    #[test]
    fn test_parse_variants_plain_lines() {
        let parsed = parse_variants("how does auth work\nwhere is login handled\n", 3);
        assert_eq!(
            parsed,
            vec!["how does auth work", "where is login handled"]
        );
    }

    #[test]
    fn test_parse_variants_strips_numbering_and_bullets() {
        let response = "1. first phrasing\n2) second phrasing\n- third phrasing\n* fourth";
        let parsed = parse_variants(response, 4);
        assert_eq!(
            parsed,
            vec![
                "first phrasing",
                "second phrasing",
                "third phrasing",
                "fourth"
            ]
        );
    }

    #[test]
    fn test_parse_variants_caps_at_n() {
        let response = "one\ntwo\nthree\nfour\nfive";
        assert_eq!(parse_variants(response, 2).len(), 2);
    }

    #[test]
    fn test_parse_variants_garbage_yields_empty() {
        assert!(parse_variants("", 3).is_empty());
        assert!(parse_variants("\n\n  \n--\n", 3).is_empty());
    }
}
