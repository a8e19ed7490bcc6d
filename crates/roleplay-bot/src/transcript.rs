use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Local;
use roleplay_ai::{ChatMessage, Role};
use serde::Serialize;
use thiserror::Error;

const FILE_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to encode transcript: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),
}

/// Output format of `/export`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranscriptFormat {
    /// Full fidelity, system messages included.
    #[default]
    Json,
    /// Speaker-labeled plain text without system messages.
    Txt,
    /// Speaker-labeled markdown without system messages.
    Markdown,
}

impl TranscriptFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptFormat::Json => "json",
            TranscriptFormat::Txt => "txt",
            TranscriptFormat::Markdown => "markdown",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            TranscriptFormat::Json => "json",
            TranscriptFormat::Txt => "txt",
            TranscriptFormat::Markdown => "md",
        }
    }
}

impl FromStr for TranscriptFormat {
    type Err = TranscriptError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(TranscriptFormat::Json),
            "txt" | "text" => Ok(TranscriptFormat::Txt),
            "markdown" | "md" => Ok(TranscriptFormat::Markdown),
            other => Err(TranscriptError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl Display for TranscriptFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize)]
struct JsonTranscript<'a> {
    created: String,
    messages: &'a [ChatMessage],
}

/// Write a snapshot of `messages` to `{out_dir}/{bot_name}_{timestamp}.{ext}`.
pub fn export_transcript(
    messages: &[ChatMessage],
    out_dir: &Path,
    bot_name: &str,
    format: TranscriptFormat,
) -> Result<PathBuf, TranscriptError> {
    fs::create_dir_all(out_dir)?;
    let now = Local::now();
    let stamp = now.format(FILE_TIME_FORMAT).to_string();
    let path = out_dir.join(format!("{bot_name}_{stamp}.{}", format.extension()));

    let body = match format {
        TranscriptFormat::Json => serde_json::to_string_pretty(&JsonTranscript {
            created: now.format("%Y-%m-%dT%H:%M:%S").to_string(),
            messages,
        })?,
        TranscriptFormat::Txt => render_text(messages, bot_name, &stamp),
        TranscriptFormat::Markdown => render_markdown(messages, bot_name, &stamp),
    };
    fs::write(&path, body)?;
    Ok(path)
}

fn speaker<'a>(message: &ChatMessage, bot_name: &'a str) -> &'a str {
    if message.role == Role::Assistant {
        bot_name
    } else {
        "User"
    }
}

fn render_text(messages: &[ChatMessage], bot_name: &str, stamp: &str) -> String {
    let mut out = format!("Transcript with {bot_name} - {stamp}\n{}\n\n", "=".repeat(50));
    for message in messages.iter().filter(|message| message.role != Role::System) {
        out.push_str(&format!(
            "{}: {}\n\n",
            speaker(message, bot_name),
            message.content
        ));
    }
    out
}

fn render_markdown(messages: &[ChatMessage], bot_name: &str, stamp: &str) -> String {
    let mut out = format!("# Transcript with {bot_name}\n\n**Date:** {stamp}\n\n---\n\n");
    for message in messages.iter().filter(|message| message.role != Role::System) {
        out.push_str(&format!(
            "## {}\n\n{}\n\n",
            speaker(message, bot_name),
            message.content
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parses_aliases() {
        assert_eq!("JSON".parse::<TranscriptFormat>().unwrap(), TranscriptFormat::Json);
        assert_eq!("md".parse::<TranscriptFormat>().unwrap(), TranscriptFormat::Markdown);
        assert_eq!("text".parse::<TranscriptFormat>().unwrap(), TranscriptFormat::Txt);
        assert!("pdf".parse::<TranscriptFormat>().is_err());
    }

    #[test]
    fn text_rendering_labels_speakers() {
        let messages = vec![
            ChatMessage::system("persona"),
            ChatMessage::assistant("Hello."),
            ChatMessage::user("Hi!"),
        ];
        let text = render_text(&messages, "Mira", "2025-01-01_10-00-00");
        assert!(text.starts_with("Transcript with Mira - 2025-01-01_10-00-00\n"));
        assert!(text.contains("Mira: Hello.\n\nUser: Hi!\n\n"));
        assert!(!text.contains("persona"));
    }
}
