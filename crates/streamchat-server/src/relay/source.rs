use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt, stream};
use streamchat_ai::LlmClient;

use super::{ChatRequest, RelayError};

/// Text fragments in the order they must reach the client.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, RelayError>> + Send>>;

/// Reference paragraph replayed in development mode.
pub const REFERENCE_PARAGRAPH: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. \
Vestibulum volutpat magna quis dui ultrices, sed ornare diam aliquet. Sed sem nisi, molestie vitae \
pretium dictum, pretium vel felis. Vestibulum ultricies semper erat tempor maximus. Aliquam eu \
cursus velit, eu blandit enim. Suspendisse quis convallis ligula. Donec eros justo, lobortis ut \
ullamcorper vel, mattis quis libero.";

/// Something that can produce the fragment stream for one chat request.
#[async_trait]
pub trait FragmentSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Open the stream. No fragment has been produced when this fails.
    async fn open(&self, request: &ChatRequest) -> Result<FragmentStream, RelayError>;
}

/// Streams completions from the upstream provider.
pub struct LiveProviderSource {
    client: Arc<dyn LlmClient>,
}

impl LiveProviderSource {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FragmentSource for LiveProviderSource {
    fn name(&self) -> &'static str {
        "live"
    }

    async fn open(&self, request: &ChatRequest) -> Result<FragmentStream, RelayError> {
        tracing::debug!(
            provider = self.client.provider(),
            model = self.client.model(),
            max_tokens = request.max_tokens,
            temperature = request.temperature,
            "Opening upstream completion stream"
        );

        let upstream = self
            .client
            .complete_stream(request.to_completion_request())
            .await
            .inspect_err(|err| {
                tracing::warn!(status = ?err.status(), error = %err, "Upstream stream rejected");
            })
            .map_err(RelayError::StreamOpen)?;

        let fragments = upstream.filter_map(|item| async move {
            match item {
                Ok(chunk) if chunk.is_final() => {
                    tracing::debug!(finish_reason = ?chunk.finish_reason, "Upstream finished");
                    None
                }
                Ok(chunk) => Some(Ok(chunk.text)),
                Err(err) => Some(Err(RelayError::StreamReceive(err))),
            }
        });

        Ok(Box::pin(fragments))
    }
}

/// Replays [`REFERENCE_PARAGRAPH`] one word at a time, ignoring the request.
pub struct FixedParagraphSource {
    interval: Duration,
}

impl FixedParagraphSource {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

#[async_trait]
impl FragmentSource for FixedParagraphSource {
    fn name(&self) -> &'static str {
        "fixed-paragraph"
    }

    async fn open(&self, _request: &ChatRequest) -> Result<FragmentStream, RelayError> {
        let interval = self.interval;
        let words = stream::iter(REFERENCE_PARAGRAPH.split_whitespace()).then(move |word| {
            async move {
                tokio::time::sleep(interval).await;
                Ok::<_, RelayError>(format!("{word} "))
            }
        });

        Ok(Box::pin(words))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use streamchat_ai::{AiError, MockLlmClient, MockStep};

    fn request() -> ChatRequest {
        ChatRequest::from_body(br#"{"content":"hi"}"#).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_paragraph_emits_every_word_with_trailing_space() {
        let source = FixedParagraphSource::new(Duration::from_millis(100));

        let fragments: Vec<String> = source
            .open(&request())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        let expected: Vec<String> = REFERENCE_PARAGRAPH
            .split_whitespace()
            .map(|w| format!("{w} "))
            .collect();
        assert_eq!(fragments, expected);
        assert_eq!(fragments.concat().trim_end(), REFERENCE_PARAGRAPH);
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_paragraph_paces_each_word() {
        let source = FixedParagraphSource::new(Duration::from_millis(100));
        let mut fragments = source.open(&request()).await.unwrap();

        let started = tokio::time::Instant::now();
        fragments.next().await.unwrap().unwrap();
        fragments.next().await.unwrap().unwrap();

        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn live_source_drops_final_chunk_and_keeps_order() {
        let client = Arc::new(MockLlmClient::from_steps(
            "mock",
            vec![MockStep::fragments(["Hel", "lo", " world"])],
        ));
        let source = LiveProviderSource::new(client.clone());

        let fragments: Vec<String> = source
            .open(&request())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(fragments, vec!["Hel", "lo", " world"]);
        let sent = client.requests().await;
        assert_eq!(sent[0].max_tokens, Some(20));
        assert_eq!(sent[0].temperature, Some(0.8));
    }

    #[tokio::test]
    async fn live_source_maps_open_failure() {
        let client = Arc::new(MockLlmClient::from_steps(
            "mock",
            vec![MockStep::open_error("connection refused")],
        ));
        let source = LiveProviderSource::new(client);

        let result = source.open(&request()).await;
        assert!(matches!(
            result,
            Err(RelayError::StreamOpen(AiError::Llm(message))) if message == "connection refused"
        ));
    }

    #[tokio::test]
    async fn live_source_maps_receive_failure() {
        let client = Arc::new(MockLlmClient::from_steps(
            "mock",
            vec![MockStep::fail_after(["partial"], "reset")],
        ));
        let source = LiveProviderSource::new(client);

        let items: Vec<_> = source.open(&request()).await.unwrap().collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().ok(), Some("partial"));
        assert!(matches!(items[1], Err(RelayError::StreamReceive(_))));
    }
}
