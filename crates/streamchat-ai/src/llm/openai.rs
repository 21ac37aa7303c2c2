//! OpenAI LLM provider

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::error::{AiError, Result};
use crate::llm::client::{
    CompletionRequest, FinishReason, LlmClient, StreamChunk, StreamResult,
};

const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const USER_AGENT: &str = concat!("streamchat/", env!("CARGO_PKG_VERSION"));

// Keeps provider error bodies out of logs and responses past this size.
const MAX_ERROR_BODY: usize = 512;

/// OpenAI client
#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIClient {
    /// Create a new OpenAI client
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Set the model to use
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set custom base URL (for API-compatible services)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn http_client() -> Client {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Using default HTTP client");
            Client::new()
        })
}

impl std::fmt::Debug for OpenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Serialize)]
struct OpenAIMessage<'a> {
    role: &'static str,
    content: &'a str,
}

// Streaming types

#[derive(Deserialize, Debug)]
struct OpenAIStreamResponse {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    error: Option<OpenAIErrorBody>,
}

#[derive(Deserialize, Debug)]
struct OpenAIStreamChoice {
    #[serde(default)]
    delta: OpenAIStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct OpenAIStreamDelta {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct OpenAIErrorBody {
    message: String,
}

/// Outcome of decoding one server-sent event.
#[derive(Debug)]
enum SseEvent {
    Chunks(Vec<StreamChunk>),
    Done,
    Failed(AiError),
}

#[async_trait]
impl LlmClient for OpenAIClient {
    fn provider(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<StreamResult> {
        let body = OpenAIRequest {
            model: &self.model,
            messages: request
                .messages
                .iter()
                .map(|m| OpenAIMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: true,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_to_error(response, "OpenAI").await);
        }

        tracing::debug!(model = %self.model, "OpenAI stream opened");

        let mut byte_stream = response.bytes_stream();

        Ok(Box::pin(async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        yield Err(AiError::Llm(format!("Stream error: {}", e)));
                        return;
                    }
                };
                buffer.extend_from_slice(&chunk);

                while let Some(event) = take_event(&mut buffer) {
                    match decode_event(&event) {
                        SseEvent::Chunks(chunks) => {
                            for chunk in chunks {
                                yield Ok(chunk);
                            }
                        }
                        SseEvent::Done => return,
                        SseEvent::Failed(err) => {
                            yield Err(err);
                            return;
                        }
                    }
                }
            }

            // The last event may lack its blank-line terminator if the connection closed early.
            let remaining = String::from_utf8_lossy(&buffer).trim().to_string();
            if !remaining.is_empty() {
                match decode_event(&remaining) {
                    SseEvent::Chunks(chunks) => {
                        for chunk in chunks {
                            yield Ok(chunk);
                        }
                    }
                    SseEvent::Done => {}
                    SseEvent::Failed(err) => yield Err(err),
                }
            }
        }))
    }
}

/// Split the next complete event (terminated by a blank line) off the front of `buffer`.
fn take_event(buffer: &mut Vec<u8>) -> Option<String> {
    let (pos, sep_len) = find_event_boundary(buffer)?;
    let event: Vec<u8> = buffer.drain(..pos + sep_len).take(pos).collect();
    Some(String::from_utf8_lossy(&event).into_owned())
}

fn find_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|p| (p, 2));
    let crlf = buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|p| (p, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn decode_event(event: &str) -> SseEvent {
    let mut chunks = Vec::new();

    for line in event.lines() {
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() {
            continue;
        }
        if data == "[DONE]" {
            return SseEvent::Done;
        }

        let parsed: OpenAIStreamResponse = match serde_json::from_str(data) {
            Ok(p) => p,
            Err(err) => {
                tracing::debug!(error = %err, "Skipping unparseable stream payload");
                continue;
            }
        };

        if let Some(error) = parsed.error {
            return SseEvent::Failed(AiError::Llm(error.message));
        }

        // Only the first choice is relayed; the request never asks for more than one.
        if let Some(choice) = parsed.choices.into_iter().next() {
            if let Some(content) = choice.delta.content
                && !content.is_empty()
            {
                chunks.push(StreamChunk::text(content));
            }
            if let Some(reason) = choice.finish_reason {
                chunks.push(StreamChunk::final_chunk(FinishReason::from_provider(&reason)));
            }
        }
    }

    SseEvent::Chunks(chunks)
}

pub(crate) async fn response_to_error(response: Response, provider: &str) -> AiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    let message = if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated]", &body[..end])
    } else {
        body
    };

    AiError::LlmHttp {
        provider: provider.to_string(),
        status,
        message,
    }
}
