//! Chat message types and the completion seam used by the roleplay bot.

mod client;
mod error;
mod providers;
mod types;

pub use client::{ChatCompletion, ChatCompletionRef};
pub use error::{ChatError, ChatErrorCode};
pub use providers::{
    DEFAULT_OLLAMA_BASE_URL, DEFAULT_OLLAMA_MODEL, OllamaClient, build_ollama_chat_payload,
    parse_ollama_chat_reply,
};
pub use types::{ChatMessage, Role};
