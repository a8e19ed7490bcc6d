//! Long-term memory for the roleplay bot.
//!
//! Notes are appended to a JSONL log, scored for importance once at write
//! time, indexed by keyword in memory and selected for each prompt either by
//! importance/recency or by keyword overlap with a query.

pub mod config;
pub mod extractor;
pub mod index;
pub mod retriever;
pub mod store;

pub use config::MemoryConfig;
pub use extractor::{MAX_AUTO_MEMORIES, MemoryCue, classify, extract};
pub use index::{MemoryIndex, tokenize};
pub use retriever::{CONTEXT_HEADER, MemoryRetriever, format_context, importance_marker};
pub use store::{MemoryError, MemoryRecord, MemoryStore, importance};

/// Re-export common memory types.
pub mod prelude {
    pub use super::config::MemoryConfig;
    pub use super::extractor::{MemoryCue, extract};
    pub use super::index::{MemoryIndex, tokenize};
    pub use super::retriever::{MemoryRetriever, format_context};
    pub use super::store::{MemoryError, MemoryRecord, MemoryStore, importance};
}
