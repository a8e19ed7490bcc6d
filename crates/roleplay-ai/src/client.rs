use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ChatError;
use crate::types::ChatMessage;

/// Obtains the next assistant reply for an ordered message list.
///
/// Implementations must not mutate or retain the messages; the caller owns
/// conversation state and decides how to roll back on failure.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError>;
}

pub type ChatCompletionRef = Arc<dyn ChatCompletion>;
