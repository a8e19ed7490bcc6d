mod common;
mod ollama;

pub use ollama::{
    DEFAULT_OLLAMA_BASE_URL, DEFAULT_OLLAMA_MODEL, OllamaClient, build_ollama_chat_payload,
    parse_ollama_chat_reply,
};
