use serde::Deserialize;
use serde::de::Error as _;
use streamchat_ai::{CompletionRequest, Message};

use super::RelayError;

const DEFAULT_MAX_TOKENS: u32 = 20;
const DEFAULT_TEMPERATURE: f64 = 0.8;

/// Wire shape of the `/chat` body. Field names, including `tempature`, are part of the API.
#[derive(Debug, Deserialize, Default)]
struct ChatRequestBody {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    max_token: Option<i64>,
    #[serde(default)]
    tempature: Option<f64>,
}

/// A parsed chat request with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub content: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl ChatRequest {
    /// Decode the first JSON value in `body`; anything after it is ignored. A `null` body or
    /// `null` fields count as absent.
    pub fn from_body(body: &[u8]) -> Result<Self, RelayError> {
        let raw = serde_json::Deserializer::from_slice(body)
            .into_iter::<Option<ChatRequestBody>>()
            .next()
            .unwrap_or_else(|| Err(serde_json::Error::custom("empty request body")))
            .map_err(RelayError::InvalidRequestBody)?
            .unwrap_or_default();

        let max_tokens = match raw.max_token {
            Some(n) if n > 0 => u32::try_from(n).unwrap_or(u32::MAX),
            _ => DEFAULT_MAX_TOKENS,
        };
        let temperature = match raw.tempature {
            Some(t) if t != 0.0 => t,
            _ => DEFAULT_TEMPERATURE,
        };

        Ok(Self {
            content: raw.content.unwrap_or_default(),
            max_tokens,
            temperature,
        })
    }

    /// Single user-role message carrying the prompt.
    pub fn to_completion_request(&self) -> CompletionRequest {
        CompletionRequest::new(vec![Message::user(self.content.clone())])
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature as f32)
    }
}
