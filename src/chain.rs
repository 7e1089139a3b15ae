//! Conversational question answering over retrieved context.
//!
//! Follow-up questions are first condensed against the conversation history
//! into a standalone question, which is what gets embedded for retrieval.
//! The answer prompt carries the retrieved chunks verbatim; when nothing is
//! retrieved the chain answers with a fixed no-context message instead of
//! calling the model with an empty context.

use anyhow::Result;

use crate::llm::{self, ChatMessage, LlmHandle};
use crate::retriever::Retriever;
use crate::store::ScoredChunk;

pub const NO_CONTEXT_ANSWER: &str =
    "I could not find anything relevant to that in the ingested repository. \
     Try rephrasing the question, or check that the repository was ingested \
     successfully.";

const SYSTEM_PROMPT: &str = "\
You are an assistant answering questions about a software repository. Answer \
using only the context excerpts provided with each question. If the context \
is insufficient to answer, say so plainly instead of guessing.";

/// The condense prompt asks for tagged output so the standalone question can
/// be separated from any preamble the model adds.
const CONDENSE_PROMPT: &str = "\
Given the conversation below and a follow-up question, rewrite the follow-up \
as a single standalone question that needs no conversation context to be \
understood. Wrap the rewritten question in <question></question> tags.

Conversation:
{history}

Follow-up question: {question}";

/// An answer and the chunks it was grounded on.
#[derive(Debug)]
pub struct ChainAnswer {
    pub answer: String,
    pub sources: Vec<ScoredChunk>,
}

pub struct ConversationChain {
    llm: LlmHandle,
    retriever: Retriever,
    history: Vec<ChatMessage>,
}

impl ConversationChain {
    pub fn new(llm: LlmHandle, retriever: Retriever) -> Self {
        Self {
            llm,
            retriever,
            history: Vec::new(),
        }
    }

    /// Answer `question`, updating the conversation history.
    ///
    /// Retrieval failure is not fatal: the chain logs it and answers as if
    /// nothing was found.
    pub async fn ask(&mut self, client: &reqwest::Client, question: &str) -> Result<ChainAnswer> {
        let standalone = if self.history.is_empty() {
            question.to_string()
        } else {
            self.condense(client, question).await
        };

        let hits = match self.retriever.retrieve(client, &standalone).await {
            Ok(hits) => hits,
            Err(err) => {
                tracing::warn!("Retrieval failed, answering without context: {err:#}");
                Vec::new()
            }
        };

        if hits.is_empty() {
            let answer = NO_CONTEXT_ANSWER.to_string();
            self.remember(question, &answer);
            return Ok(ChainAnswer {
                answer,
                sources: Vec::new(),
            });
        }

        let messages = build_messages(&self.history, &hits, question);
        let answer = llm::chat(client, &self.llm, &messages).await?;
        self.remember(question, &answer);
        Ok(ChainAnswer {
            answer,
            sources: hits,
        })
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    fn remember(&mut self, question: &str, answer: &str) {
        self.history.push(ChatMessage::user(question));
        self.history.push(ChatMessage::assistant(answer));
    }

    /// Rewrite a follow-up into a standalone question. Falls back to the
    /// original question when the model call fails.
    async fn condense(&self, client: &reqwest::Client, question: &str) -> String {
        let prompt = CONDENSE_PROMPT
            .replace("{history}", &transcript(&self.history))
            .replace("{question}", question);

        match llm::complete(client, &self.llm, &prompt).await {
            Ok(response) => extract_standalone_question(&response),
            Err(err) => {
                tracing::warn!("Question condensing failed, using follow-up verbatim: {err:#}");
                question.to_string()
            }
        }
    }
}

/// One-shot answer with no conversation memory.
pub async fn rag_answer(
    client: &reqwest::Client,
    llm: &LlmHandle,
    retriever: &Retriever,
    question: &str,
) -> Result<ChainAnswer> {
    let hits = retriever.retrieve(client, question).await.unwrap_or_else(|err| {
        tracing::warn!("Retrieval failed, answering without context: {err:#}");
        Vec::new()
    });
    if hits.is_empty() {
        return Ok(ChainAnswer {
            answer: NO_CONTEXT_ANSWER.to_string(),
            sources: Vec::new(),
        });
    }
    let messages = build_messages(&[], &hits, question);
    let answer = llm::chat(client, llm, &messages).await?;
    Ok(ChainAnswer {
        answer,
        sources: hits,
    })
}

fn transcript(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pull the question out of `<question></question>` tags; when the tags are
/// missing or malformed the whole trimmed response is used.
fn extract_standalone_question(response: &str) -> String {
    if let Some(start) = response.find("<question>") {
        let after = &response[start + "<question>".len()..];
        if let Some(end) = after.find("</question>") {
            let tagged = after[..end].trim();
            if !tagged.is_empty() {
                return tagged.to_string();
            }
        }
    }
    response.trim().to_string()
}

/// Retrieved chunks joined by blank lines, retrieval order preserved.
fn build_context_block(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|hit| format!("[{}]\n{}", hit.relative_path, hit.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// System prompt, then the running history, then the current question with
/// its context attached.
fn build_messages(
    history: &[ChatMessage],
    hits: &[ScoredChunk],
    question: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));
    messages.extend_from_slice(history);
    messages.push(ChatMessage::user(format!(
        "Context:\n{}\n\nQuestion: {question}",
        build_context_block(hits)
    )));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, EmbeddingProviderConfig};
    use crate::embedding::choose_embedding_provider;
    use crate::llm::Tier;
    use crate::store::VectorStore;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn hit(path: &str, text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            id: format!("{path}#0"),
            relative_path: path.to_string(),
            chunk_index: 0,
            text: text.to_string(),
            score,
        }
    }

    fn stub_llm() -> LlmHandle {
        LlmHandle {
            tier: Tier::Local,
            model: "stub".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: None,
        }
    }

    /// An embedder whose base_url points at a closed port, so every embed
    /// call fails fast.
    fn unreachable_embedder() -> crate::embedding::Embedder {
        let mut config = Config::default();
        config.models.embedding.clear();
        config.models.embedding.insert(
            "ollama".to_string(),
            EmbeddingProviderConfig {
                model: "stub".to_string(),
                enabled: true,
                base_url: Some("http://127.0.0.1:9".to_string()),
                api_key: None,
            },
        );
        choose_embedding_provider(&config).unwrap()
    }

    #[test]
    fn test_messages_start_with_system_and_end_with_question() {
        let history = vec![
            ChatMessage::user("earlier question"),
            ChatMessage::assistant("earlier answer"),
        ];
        let hits = vec![hit("src/main.rs", "fn main() {}", 0.9)];
        let messages = build_messages(&history, &hits, "what does main do?");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].content, "earlier question");
        assert_eq!(messages[2].content, "earlier answer");
        assert_eq!(messages[3].role, "user");
        assert!(messages[3].content.contains("fn main() {}"));
        assert!(messages[3].content.ends_with("what does main do?"));
    }

    #[test]
    fn test_context_block_preserves_retrieval_order() {
        let hits = vec![
            hit("b.rs", "second ranked", 0.8),
            hit("a.rs", "first ranked", 0.9),
        ];
        let block = build_context_block(&hits);
        let b_pos = block.find("second ranked").unwrap();
        let a_pos = block.find("first ranked").unwrap();
        assert!(b_pos < a_pos);
        assert!(block.contains("[b.rs]"));
    }

    #[test]
    fn test_extract_tagged_question() {
        let response = "Sure, here it is:\n<question>What does the parser do?</question>";
        assert_eq!(
            extract_standalone_question(response),
            "What does the parser do?"
        );
    }

    #[test]
    fn test_extract_falls_back_to_whole_response() {
        assert_eq!(
            extract_standalone_question("  What does the parser do?  "),
            "What does the parser do?"
        );
        assert_eq!(
            extract_standalone_question("<question></question> nothing tagged"),
            "<question></question> nothing tagged"
        );
    }

    #[tokio::test]
    async fn test_empty_store_answers_without_model_call() {
        // An empty store means retrieval returns no hits even when the
        // embedding call would succeed; here the embed call itself fails,
        // which must degrade the same way
        let retriever = Retriever::Direct {
            store: Arc::new(VectorStore::from_entries(
                Vec::new(),
                PathBuf::from("/tmp/unused.json"),
            )),
            embedder: unreachable_embedder(),
            top_k: 3,
        };
        let mut chain = ConversationChain::new(stub_llm(), retriever);
        let client = reqwest::Client::new();

        let result = chain.ask(&client, "anything in here?").await.unwrap();
        assert_eq!(result.answer, NO_CONTEXT_ANSWER);
        assert!(result.sources.is_empty());
        // History still advances so the conversation stays coherent
        assert_eq!(chain.history().len(), 2);
    }

    #[tokio::test]
    async fn test_stateless_answer_degrades_the_same_way() {
        let retriever = Retriever::Direct {
            store: Arc::new(VectorStore::from_entries(
                Vec::new(),
                PathBuf::from("/tmp/unused.json"),
            )),
            embedder: unreachable_embedder(),
            top_k: 3,
        };
        let client = reqwest::Client::new();
        let result = rag_answer(&client, &stub_llm(), &retriever, "anything?")
            .await
            .unwrap();
        assert_eq!(result.answer, NO_CONTEXT_ANSWER);
        assert!(result.sources.is_empty());
    }
}
