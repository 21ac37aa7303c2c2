use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use streamchat_ai::AiError;
use thiserror::Error;

/// Failures of a single relay session, each mapped to the response the caller sees.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Invalid request body")]
    InvalidRequestBody(#[source] serde_json::Error),

    #[error("Missing OpenAI API key")]
    MissingApiKey,

    #[error("Error creating chat completion stream")]
    StreamOpen(#[source] AiError),

    #[error("Error receiving stream response")]
    StreamReceive(#[source] AiError),

    #[error("Error writing server-sent event")]
    SinkWrite(String),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            RelayError::MissingApiKey
            | RelayError::StreamOpen(_)
            | RelayError::StreamReceive(_)
            | RelayError::SinkWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}
