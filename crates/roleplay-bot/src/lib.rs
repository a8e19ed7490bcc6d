//! Persona roleplay chat with long-term keyword memory.

pub mod chat_log;
pub mod cli;
pub mod commands;
pub mod conversation;
pub mod memory;
pub mod persona;
pub mod session;
pub mod transcript;

pub const DEFAULT_BOTINFO_FILE: &str = "BotInfo.json";
pub const DEFAULT_CHAT_DIR: &str = "chats";
pub const DEFAULT_TRANSCRIPT_DIR: &str = "transcripts";

pub use chat_log::{ChatLogError, ChatLogger};
pub use commands::{ReplCommand, ReplCommandParser, help_text};
pub use conversation::{
    ConversationWindow, DiscardSink, KEEP_RECENT_MESSAGES, MAX_CONTEXT_MESSAGES, MessageSink,
    SUMMARY_PREFIX, WindowCheckpoint, memory_limit, summarize,
};
pub use persona::{Persona, PersonaError, PromptModes, build_system_prompt};
pub use session::{AUTO_MEMORY_TAG, ChatSession, MANUAL_MEMORY_TAG, ModeChange};
pub use transcript::{TranscriptError, TranscriptFormat, export_transcript};
