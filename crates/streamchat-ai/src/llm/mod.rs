//! LLM module - streaming completion provider abstraction

mod client;
#[cfg(any(test, feature = "test-utils"))]
mod mock_client;
mod openai;

pub use client::{
    CompletionRequest, FinishReason, LlmClient, Message, Role, StreamChunk, StreamResult,
};
#[cfg(any(test, feature = "test-utils"))]
pub use mock_client::{MockLlmClient, MockStep};
pub use openai::OpenAIClient;
