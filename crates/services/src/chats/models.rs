use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of the settings record the orchestrator reads
pub const GENERAL_SETTINGS_ID: &str = "general";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub Uuid);

impl ChatId {
    pub fn new() -> Self {
        ChatId(Uuid::new_v4())
    }
}

impl Default for ChatId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ChatId {
    fn from(uuid: Uuid) -> Self {
        ChatId(uuid)
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        MessageId(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for MessageId {
    fn from(uuid: Uuid) -> Self {
        MessageId(uuid)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A conversation and its running token total. The total only grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: ChatId,
    pub total_tokens: i64,
}

/// Assistant message being filled in by a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingMessage {
    pub id: MessageId,
    pub content: String,
    pub complete: bool,
}

/// Client-wide settings; `model_identifier` overrides the default model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub id: String,
    pub model_identifier: Option<String>,
}
