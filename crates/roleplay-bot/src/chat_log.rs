//! Human-readable per-persona chat log, one append-only file per bot name.

use chrono::Local;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::conversation::MessageSink;

const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum ChatLogError {
    #[error("failed to prepare chat log {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ChatLogger {
    chat_file: PathBuf,
}

impl ChatLogger {
    /// Open (or create with a header) `{chat_dir}/{bot_name}.txt`.
    pub fn new(bot_name: &str, chat_dir: &Path) -> Result<Self, ChatLogError> {
        let chat_file = chat_dir.join(format!("{bot_name}.txt"));
        let create_error = |source| ChatLogError::Create {
            path: chat_file.clone(),
            source,
        };
        fs::create_dir_all(chat_dir).map_err(create_error)?;

        if !chat_file.exists() {
            let header = format!(
                "Chat Log for {bot_name}\n{}\n\nStarted: {}\n\n",
                "=".repeat(50),
                Local::now().format(LOG_TIME_FORMAT)
            );
            fs::write(&chat_file, header).map_err(create_error)?;
        }

        Ok(Self { chat_file })
    }

    pub fn path(&self) -> &Path {
        &self.chat_file
    }

    /// Append one `[time] Speaker:\ncontent\n\n` block.
    pub fn try_log_message(&self, speaker: &str, content: &str) -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.chat_file)?;
        write!(
            file,
            "[{}] {speaker}:\n{content}\n\n",
            Local::now().format(LOG_TIME_FORMAT)
        )
    }
}

impl MessageSink for ChatLogger {
    fn log_message(&mut self, speaker: &str, content: &str) {
        if let Err(error) = self.try_log_message(speaker, content) {
            warn!(path = %self.chat_file.display(), "failed to write chat log: {error}");
        }
    }
}
