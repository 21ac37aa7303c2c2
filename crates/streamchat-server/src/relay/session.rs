use futures::StreamExt;

use super::sink::FragmentSink;
use super::source::{FragmentSource, FragmentStream};
use super::{ChatRequest, RelayError};

/// Lifecycle of one relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    StreamOpening,
    Streaming,
    Completed,
    Failed,
}

/// Totals reported when a session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelaySummary {
    pub fragments: usize,
    pub bytes: usize,
}

/// Binds one chat request to one fragment stream.
///
/// The session owns the stream exclusively; it is dropped, closing the upstream connection,
/// as soon as the session is consumed by [`RelaySession::run`] or dropped itself.
pub struct RelaySession {
    state: SessionState,
    stream: Option<FragmentStream>,
    pending: Option<String>,
}

impl RelaySession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            stream: None,
            pending: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        tracing::trace!(from = ?self.state, to = ?next, "Relay session state change");
        self.state = next;
    }

    /// Open the fragment stream and wait for its first fragment.
    ///
    /// Runs before any response framing is committed, so every error returned here can still
    /// be reported to the client as a regular error response.
    pub async fn open(
        &mut self,
        source: &dyn FragmentSource,
        request: &ChatRequest,
    ) -> Result<(), RelayError> {
        self.transition(SessionState::StreamOpening);
        let mut stream = match source.open(request).await {
            Ok(stream) => stream,
            Err(err) => {
                self.transition(SessionState::Failed);
                return Err(err);
            }
        };

        self.transition(SessionState::Streaming);
        match stream.next().await {
            Some(Ok(fragment)) => {
                self.pending = Some(fragment);
                self.stream = Some(stream);
                Ok(())
            }
            // Nothing to relay; the stream is dropped here and never polled again.
            None => {
                self.transition(SessionState::Completed);
                Ok(())
            }
            Some(Err(err)) => {
                self.transition(SessionState::Failed);
                Err(err)
            }
        }
    }

    /// Forward every fragment to `sink`, flushing after each, until the stream ends or fails.
    pub async fn run<S: FragmentSink + ?Sized>(
        mut self,
        sink: &mut S,
    ) -> Result<RelaySummary, RelayError> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(RelaySummary::default());
        };
        let mut summary = RelaySummary::default();

        loop {
            let next = match self.pending.take() {
                Some(fragment) => Some(Ok(fragment)),
                None if sink.is_closed() => {
                    self.transition(SessionState::Failed);
                    return Err(RelayError::SinkWrite("client disconnected".to_string()));
                }
                None => stream.next().await,
            };

            let fragment = match next {
                None => {
                    self.transition(SessionState::Completed);
                    return Ok(summary);
                }
                Some(Err(err)) => {
                    self.transition(SessionState::Failed);
                    return Err(err);
                }
                Some(Ok(fragment)) => fragment,
            };

            tracing::trace!(fragment = %fragment, "Relaying fragment");

            if let Err(err) = write_fragment(sink, &fragment).await {
                self.transition(SessionState::Failed);
                return Err(err);
            }
            summary.fragments += 1;
            summary.bytes += fragment.len();
        }
    }
}

impl Default for RelaySession {
    fn default() -> Self {
        Self::new()
    }
}

async fn write_fragment<S: FragmentSink + ?Sized>(
    sink: &mut S,
    fragment: &str,
) -> Result<(), RelayError> {
    sink.write(fragment).await?;
    sink.flush().await
}
