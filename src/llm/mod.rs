//! LLM tier selection and chat completion calls.

pub mod chat;
pub mod chooser;

pub use chat::{chat, complete, ChatMessage};
pub use chooser::{choose_model, LlmHandle, Tier};
