//! Streaming relay: forwards one chat request's completion fragments to one client.

mod error;
mod request;
mod session;
mod sink;
pub(crate) mod source;

pub use error::RelayError;
pub use request::ChatRequest;
pub use session::RelaySession;
pub use sink::ChannelSink;
pub use source::{FixedParagraphSource, FragmentSource, LiveProviderSource};
