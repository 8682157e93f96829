use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Trait for streaming language-model clients used by the insight relay.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., "openai", "mock").
    fn name(&self) -> &str;

    /// Open a streaming completion.
    ///
    /// Resolves once the upstream has accepted the request; failures to open
    /// are returned here, failures after that arrive as `Err` items.
    async fn stream(&self, request: &LlmRequest) -> Result<ChunkStream>;
}

/// Ordered text increments of one completion.
pub type ChunkStream = BoxStream<'static, Result<ChatChunk>>;

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Request to an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

/// One chunk of a streamed completion. Role-only or usage-only chunks carry no content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatChunk {
    pub content: Option<String>,
}

impl ChatChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
        }
    }

    /// The increment to relay, if any. Empty strings are not increments.
    pub fn increment(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.is_empty())
    }
}
