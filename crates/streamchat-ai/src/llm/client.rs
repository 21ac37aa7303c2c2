//! LLM client trait and types

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Chat message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Reason the provider gave for ending generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    MaxTokens,
    ContentFilter,
    Other(String),
}

impl FinishReason {
    pub(crate) fn from_provider(reason: &str) -> Self {
        match reason {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::MaxTokens,
            "content_filter" => FinishReason::ContentFilter,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

/// One incremental piece of a streamed completion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamChunk {
    /// Text delta, empty for control chunks
    pub text: String,
    pub finish_reason: Option<FinishReason>,
}

impl StreamChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            finish_reason: None,
        }
    }

    pub fn final_chunk(reason: FinishReason) -> Self {
        Self {
            text: String::new(),
            finish_reason: Some(reason),
        }
    }

    pub fn is_final(&self) -> bool {
        self.finish_reason.is_some()
    }
}

/// Stream of completion chunks, in provider order
pub type StreamResult = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// LLM completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// Create a new completion request
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set temperature
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }
}

/// LLM client trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Get provider name
    fn provider(&self) -> &str;

    /// Get model name
    fn model(&self) -> &str;

    /// Open a streaming completion.
    ///
    /// Resolves once the provider has accepted the request. Connection, authentication and
    /// provider-side rejections are reported here; failures after that point arrive as `Err`
    /// items on the returned stream. Dropping the stream closes the upstream connection.
    async fn complete_stream(&self, request: CompletionRequest) -> Result<StreamResult>;
}
