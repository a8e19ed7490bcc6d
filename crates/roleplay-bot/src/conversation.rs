//! Conversation window: the bounded message history sent to the model.

use roleplay_ai::{ChatMessage, Role};
use tracing::debug;

use crate::memory::{MemoryRetriever, MemoryStore, format_context};

/// History length above which older messages are compacted.
pub const MAX_CONTEXT_MESSAGES: usize = 50;
/// Messages kept verbatim after compaction, besides the system prompt.
pub const KEEP_RECENT_MESSAGES: usize = 20;
/// Character budget of each part of the compaction summary.
pub const SUMMARY_PART_CHARS: usize = 100;
pub const SUMMARY_PREFIX: &str = "Earlier in the conversation: ";

// Injected memory shrinks as the session grows:
// clamp(BASE - turn_count / DECAY_TURNS, MIN, MAX).
pub const MEMORY_LIMIT_BASE: usize = 10;
pub const MEMORY_LIMIT_DECAY_TURNS: usize = 5;
pub const MEMORY_LIMIT_MIN: usize = 3;
pub const MEMORY_LIMIT_MAX: usize = 8;

/// Receives every message added to the conversation, for the on-disk chat log.
pub trait MessageSink {
    fn log_message(&mut self, speaker: &str, content: &str);
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl MessageSink for DiscardSink {
    fn log_message(&mut self, _speaker: &str, _content: &str) {}
}

/// Number of memories injected into the next user turn.
pub fn memory_limit(turn_count: usize) -> usize {
    MEMORY_LIMIT_BASE
        .saturating_sub(turn_count / MEMORY_LIMIT_DECAY_TURNS)
        .clamp(MEMORY_LIMIT_MIN, MEMORY_LIMIT_MAX)
}

/// History state saved before a turn, so a failed turn can be undone even
/// when it crossed the compaction boundary.
#[derive(Debug, Clone)]
pub struct WindowCheckpoint {
    messages: Vec<ChatMessage>,
    turn_count: usize,
    summary: String,
}

/// Owns the ordered history; index 0 is always the single system message.
pub struct ConversationWindow {
    system_prompt: String,
    bot_name: String,
    use_memory: bool,
    messages: Vec<ChatMessage>,
    turn_count: usize,
    summary: String,
    sink: Box<dyn MessageSink>,
}

impl ConversationWindow {
    pub fn new(
        system_prompt: impl Into<String>,
        bot_name: impl Into<String>,
        use_memory: bool,
        sink: Box<dyn MessageSink>,
    ) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            messages: vec![ChatMessage::system(system_prompt.clone())],
            system_prompt,
            bot_name: bot_name.into(),
            use_memory,
            turn_count: 0,
            summary: String::new(),
            sink,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn turn_count(&self) -> usize {
        self.turn_count
    }

    /// Rolling summary of compacted history; empty until the first compaction.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Append a message, log it, and compact when the history grows too long.
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        let content = content.into();
        let speaker = self.speaker_for(role).to_string();
        self.sink.log_message(&speaker, &content);
        self.messages.push(ChatMessage::new(role, content));
        self.turn_count += 1;

        if self.messages.len() > MAX_CONTEXT_MESSAGES {
            self.compact();
        }
    }

    /// Record a `System` line in the chat log without touching the history.
    pub fn log_event(&mut self, content: &str) {
        self.sink.log_message("System", content);
    }

    /// Formatted memory block for the next user turn, sized by [`memory_limit`].
    pub fn memory_context(&self, store: &mut MemoryStore) -> String {
        if !self.use_memory {
            return String::new();
        }
        let recent = MemoryRetriever::new(store).recent(memory_limit(self.turn_count));
        format_context(&recent)
    }

    /// Append the user's text with the memory block prepended.
    ///
    /// The stored and logged message includes the memory block, so the model
    /// also sees it in later turns.
    pub fn add_user_turn(&mut self, text: &str, store: &mut MemoryStore) {
        let context = self.memory_context(store);
        let payload = if context.is_empty() {
            text.to_string()
        } else {
            format!("{context}\n\n{text}")
        };
        self.add_message(Role::User, payload);
    }

    pub fn checkpoint(&self) -> WindowCheckpoint {
        WindowCheckpoint {
            messages: self.messages.clone(),
            turn_count: self.turn_count,
            summary: self.summary.clone(),
        }
    }

    /// Put back the history, turn counter and summary saved by [`Self::checkpoint`].
    /// The chat log keeps whatever was already written.
    pub fn restore(&mut self, checkpoint: WindowCheckpoint) {
        self.messages = checkpoint.messages;
        self.turn_count = checkpoint.turn_count;
        self.summary = checkpoint.summary;
        debug!(messages = self.messages.len(), "conversation restored");
    }

    /// Undo the user message of a turn whose completion failed.
    ///
    /// Only valid while that message is still the last one; a turn that
    /// triggered compaction needs [`Self::restore`].
    pub fn retract_last_user_message(&mut self) -> bool {
        match self.messages.last() {
            Some(message) if message.role == Role::User && self.messages.len() > 1 => {
                self.messages.pop();
                self.turn_count = self.turn_count.saturating_sub(1);
                true
            }
            _ => false,
        }
    }

    /// Drop the last exchange (assistant reply and the user message before it).
    ///
    /// Needs the system prompt plus at least one exchange; otherwise the
    /// history is left untouched and `false` is returned.
    pub fn rewind_last_exchange(&mut self) -> bool {
        if self.messages.len() < 3 {
            return false;
        }
        self.messages.pop();
        self.messages.pop();
        self.turn_count = self.turn_count.saturating_sub(1);
        debug!("rewound last exchange");
        true
    }

    /// Start over with `[system]`. Long-term memory is not affected.
    pub fn reset(&mut self, new_system_prompt: Option<&str>) {
        let prompt = new_system_prompt
            .unwrap_or(self.system_prompt.as_str())
            .to_string();
        self.messages = vec![ChatMessage::system(prompt)];
        self.turn_count = 0;
        self.summary.clear();
        debug!("conversation reset");
    }

    /// Store a new system prompt and reset the conversation with it.
    pub fn update_system_prompt(&mut self, system_prompt: impl Into<String>) {
        self.system_prompt = system_prompt.into();
        let prompt = self.system_prompt.clone();
        self.reset(Some(&prompt));
    }

    /// Swap the system prompt in place, keeping the history.
    pub fn replace_system_prompt(&mut self, system_prompt: impl Into<String>) {
        self.system_prompt = system_prompt.into();
        let prompt = ChatMessage::system(self.system_prompt.clone());
        if self
            .messages
            .first()
            .is_some_and(|first| first.role == Role::System)
        {
            self.messages[0] = prompt;
        } else {
            self.messages.insert(0, prompt);
        }
    }

    fn speaker_for(&self, role: Role) -> &str {
        match role {
            Role::Assistant => &self.bot_name,
            Role::User => "User",
            Role::System => "System",
        }
    }

    fn compact(&mut self) {
        let total = self.messages.len();
        if total <= KEEP_RECENT_MESSAGES + 1 {
            return;
        }
        let split = total - KEEP_RECENT_MESSAGES;
        let recent = self.messages.split_off(split);
        let elided = self.messages.split_off(1);

        self.summary = summarize(&elided);
        self.messages.push(ChatMessage::system(format!(
            "{SUMMARY_PREFIX}{}",
            self.summary
        )));
        self.messages.extend(recent);
        debug!(
            elided = elided.len(),
            kept = self.messages.len(),
            "conversation compacted"
        );
    }
}

/// Lossy summary of elided messages: distinct user and assistant contents,
/// each side truncated to [`SUMMARY_PART_CHARS`].
pub fn summarize(messages: &[ChatMessage]) -> String {
    let mut user_inputs: Vec<&str> = Vec::new();
    let mut bot_responses: Vec<&str> = Vec::new();
    for message in messages {
        let bucket = match message.role {
            Role::User => &mut user_inputs,
            Role::Assistant => &mut bot_responses,
            Role::System => continue,
        };
        if !bucket.contains(&message.content.as_str()) {
            bucket.push(message.content.as_str());
        }
    }

    let mut parts = Vec::new();
    if !user_inputs.is_empty() {
        parts.push(format!(
            "User mentioned topics like: {}...",
            truncate_chars(&user_inputs.join(", "), SUMMARY_PART_CHARS)
        ));
    }
    if !bot_responses.is_empty() {
        parts.push(format!(
            "Bot shared information about: {}...",
            truncate_chars(&bot_responses.join(", "), SUMMARY_PART_CHARS)
        ));
    }
    parts.join(" | ")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
