//! One interactive roleplay session: persona, prompt modes, conversation
//! window, memory store and completion client wired together.

use std::path::PathBuf;

use roleplay_ai::{ChatCompletionRef, ChatError, Role};
use tracing::{debug, error, info};

use crate::conversation::{ConversationWindow, MessageSink};
use crate::memory::{MemoryConfig, MemoryRecord, MemoryRetriever, MemoryStore, extract};
use crate::persona::{Persona, PromptModes, build_system_prompt};
use crate::transcript::{TranscriptError, TranscriptFormat, export_transcript};

pub const MANUAL_MEMORY_TAG: &str = "manual";
pub const AUTO_MEMORY_TAG: &str = "auto";

/// Outcome of a mode switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChange {
    Changed,
    Unchanged,
}

pub struct ChatSession {
    persona: Persona,
    modes: PromptModes,
    memory: MemoryConfig,
    store: MemoryStore,
    window: ConversationWindow,
    client: ChatCompletionRef,
    transcript_dir: PathBuf,
    export_format: TranscriptFormat,
}

impl ChatSession {
    pub fn new(
        persona: Persona,
        modes: PromptModes,
        memory: MemoryConfig,
        client: ChatCompletionRef,
        sink: Box<dyn MessageSink>,
    ) -> Self {
        let system_prompt = build_system_prompt(&persona, modes);
        let window =
            ConversationWindow::new(system_prompt, persona.name.clone(), memory.enabled, sink);
        Self {
            store: MemoryStore::new(&memory),
            persona,
            modes,
            memory,
            window,
            client,
            transcript_dir: PathBuf::from(crate::DEFAULT_TRANSCRIPT_DIR),
            export_format: TranscriptFormat::default(),
        }
    }

    pub fn with_transcripts(mut self, dir: impl Into<PathBuf>, format: TranscriptFormat) -> Self {
        self.transcript_dir = dir.into();
        self.export_format = format;
        self
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn modes(&self) -> PromptModes {
        self.modes
    }

    pub fn window(&self) -> &ConversationWindow {
        &self.window
    }

    pub fn store_mut(&mut self) -> &mut MemoryStore {
        &mut self.store
    }

    /// Add the persona's intro message as the first assistant turn.
    pub fn start(&mut self) -> &str {
        info!(bot = %self.persona.name, "starting roleplay session");
        self.window
            .add_message(Role::Assistant, self.persona.intro_message.clone());
        &self.persona.intro_message
    }

    /// Run one user turn through the model.
    ///
    /// On failure the window is restored to its state before the turn,
    /// including any compaction the user message triggered.
    pub async fn send(&mut self, text: &str) -> Result<String, ChatError> {
        let checkpoint = self.window.checkpoint();
        self.window.add_user_turn(text, &mut self.store);

        let result = self.client.complete(self.window.messages()).await;
        let reply = match result {
            Ok(reply) => reply,
            Err(err) => {
                error!("Model error: {err}");
                self.window.restore(checkpoint);
                return Err(err);
            }
        };

        self.window.add_message(Role::Assistant, reply.clone());
        if self.memory.enabled {
            for note in extract(&reply) {
                if let Some(record) = self.store.append(&note, &[AUTO_MEMORY_TAG]) {
                    debug!(key = record.key, "auto-remembered note");
                }
            }
        }
        Ok(reply)
    }

    pub fn remember(&mut self, note: &str) -> Option<MemoryRecord> {
        let record = self.store.append(note, &[MANUAL_MEMORY_TAG])?;
        self.window
            .log_event(&format!("Manual memory added: {}", record.note));
        Some(record)
    }

    pub fn search(&mut self, query: &str) -> Vec<MemoryRecord> {
        MemoryRetriever::new(&mut self.store).search(query, self.memory.search_limit)
    }

    /// Rebuild the prompt from the current modes and start over.
    pub fn reset(&mut self) {
        let prompt = build_system_prompt(&self.persona, self.modes);
        self.window.update_system_prompt(prompt);
        self.window.log_event("Session reset");
    }

    /// Drop the last exchange; returns the message now at the end of the history.
    pub fn rewind(&mut self) -> Option<String> {
        if !self.window.rewind_last_exchange() {
            return None;
        }
        self.window.log_event("Rewound to previous message");
        self.window
            .last_message()
            .map(|message| message.content.clone())
    }

    pub fn set_nsfw(&mut self, enabled: bool) -> ModeChange {
        if self.modes.nsfw == enabled {
            return ModeChange::Unchanged;
        }
        self.modes.nsfw = enabled;
        self.apply_modes(if enabled {
            "NSFW mode enabled"
        } else {
            "NSFW mode disabled"
        });
        ModeChange::Changed
    }

    pub fn set_romantic(&mut self, enabled: bool) -> ModeChange {
        if self.modes.romantic == enabled {
            return ModeChange::Unchanged;
        }
        self.modes.romantic = enabled;
        self.apply_modes(if enabled {
            "Romantic mode enabled"
        } else {
            "Romantic mode disabled"
        });
        ModeChange::Changed
    }

    fn apply_modes(&mut self, event: &str) {
        let prompt = build_system_prompt(&self.persona, self.modes);
        self.window.replace_system_prompt(prompt);
        self.window.log_event(event);
        info!("{event}");
    }

    pub fn export(&mut self) -> Result<PathBuf, TranscriptError> {
        let path = export_transcript(
            self.window.messages(),
            &self.transcript_dir,
            &self.persona.name,
            self.export_format,
        )?;
        self.window
            .log_event(&format!("Transcript exported to {}", path.display()));
        Ok(path)
    }

    pub fn end(&mut self) {
        self.window.log_event("Conversation ended");
    }
}
