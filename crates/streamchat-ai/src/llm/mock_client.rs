//! Deterministic mock LLM client for relay tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};

use crate::error::{AiError, Result};

use super::{CompletionRequest, FinishReason, LlmClient, StreamChunk, StreamResult};

/// Scripted behaviour for one `complete_stream` call.
#[derive(Debug, Clone)]
pub enum MockStep {
    /// Open successfully and yield these fragments, then end the stream.
    Fragments(Vec<String>),
    /// Open successfully, yield these fragments, then fail with an error.
    FailAfter {
        fragments: Vec<String>,
        error: String,
    },
    /// Fail while opening the stream.
    OpenError(String),
}

impl MockStep {
    pub fn fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Fragments(fragments.into_iter().map(Into::into).collect())
    }

    pub fn fail_after<I, S>(fragments: I, error: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::FailAfter {
            fragments: fragments.into_iter().map(Into::into).collect(),
            error: error.into(),
        }
    }

    pub fn open_error(message: impl Into<String>) -> Self {
        Self::OpenError(message.into())
    }
}

/// A deterministic mock LLM client driven by scripted steps.
///
/// Records every request it receives and tracks how many of the streams it handed out are
/// still alive, so callers can assert the upstream stream was released.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    model: String,
    script: Arc<Mutex<VecDeque<MockStep>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    live_streams: Arc<AtomicUsize>,
    delay_ms: u64,
}

impl MockLlmClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn from_steps(model: impl Into<String>, steps: Vec<MockStep>) -> Self {
        Self {
            model: model.into(),
            script: Arc::new(Mutex::new(VecDeque::from(steps))),
            ..Self::default()
        }
    }

    /// Pause before every fragment.
    pub fn with_fragment_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Requests received so far, in call order.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of streams returned by `complete_stream` that have not been dropped yet.
    pub fn live_streams(&self) -> usize {
        self.live_streams.load(Ordering::SeqCst)
    }

    async fn next_step(&self) -> Option<MockStep> {
        self.script.lock().await.pop_front()
    }
}

/// Decrements the live stream counter when the owning stream is dropped.
struct StreamGuard(Arc<AtomicUsize>);

impl StreamGuard {
    fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<StreamResult> {
        self.requests.lock().await.push(request);

        let (fragments, error) = match self.next_step().await {
            Some(MockStep::Fragments(fragments)) => (fragments, None),
            Some(MockStep::FailAfter { fragments, error }) => (fragments, Some(error)),
            Some(MockStep::OpenError(message)) => return Err(AiError::Llm(message)),
            None => (vec!["mock-ok".to_string()], None),
        };

        let guard = StreamGuard::acquire(&self.live_streams);
        let delay_ms = self.delay_ms;

        Ok(Box::pin(async_stream::stream! {
            let _guard = guard;

            for fragment in fragments {
                if delay_ms > 0 {
                    sleep(Duration::from_millis(delay_ms)).await;
                }
                yield Ok(StreamChunk::text(fragment));
            }

            match error {
                Some(message) => yield Err(AiError::Llm(message)),
                None => yield Ok(StreamChunk::final_chunk(FinishReason::Stop)),
            }
        }))
    }
}
