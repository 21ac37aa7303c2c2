//! streamchat AI - streaming chat completion client
//!
//! This crate provides:
//! - The `LlmClient` abstraction over a streaming completion provider
//! - An OpenAI-compatible client that decodes server-sent events incrementally
//! - A scripted mock client for tests (`test-utils` feature)

pub mod error;
pub mod llm;

pub use error::{AiError, Result};
pub use llm::{
    CompletionRequest, FinishReason, LlmClient, Message, OpenAIClient, Role, StreamChunk,
    StreamResult,
};

#[cfg(any(test, feature = "test-utils"))]
pub use llm::{MockLlmClient, MockStep};
