use axum::{
    body::{Body, Bytes},
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

use crate::api::AppState;
use crate::relay::{ChannelSink, ChatRequest, RelayError, RelaySession};

// GET /chat
pub async fn chat(State(state): State<AppState>, body: Bytes) -> Response {
    match start_relay(&state, &body).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(
                error = %err,
                cause = ?std::error::Error::source(&err).map(|e| e.to_string()),
                "Chat request failed before streaming"
            );
            err.into_response()
        }
    }
}

/// Open the session, then hand it to a background task that feeds the response body.
async fn start_relay(state: &AppState, body: &[u8]) -> Result<Response, RelayError> {
    let request = ChatRequest::from_body(body)?;
    let source = state.fragment_source()?;

    let mut session = RelaySession::new();
    session.open(source.as_ref(), &request).await?;
    tracing::debug!(
        source = source.name(),
        state = ?session.state(),
        "Chat relay session opened"
    );

    let (mut sink, body) = ChannelSink::new();
    tokio::spawn(async move {
        match session.run(&mut sink).await {
            Ok(summary) => tracing::info!(
                fragments = summary.fragments,
                bytes = summary.bytes,
                "Chat relay completed"
            ),
            Err(err) => tracing::warn!(error = %err, "Chat relay ended early"),
        }
    });

    Ok(streaming_response(body))
}

fn streaming_response(body: Body) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        body,
    )
        .into_response()
}
