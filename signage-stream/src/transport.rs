//! Transport seams
//!
//! The supervisor only needs two capabilities from the outside world: open a
//! push channel for a display, and pull a display's full state. Both are
//! traits so tests and alternative transports can stand in for the WebSocket
//! and HTTP implementations.

use async_trait::async_trait;
use signage_model::{DisplaySlug, FullState, InboundMessage, OutboundMessage};

use crate::error::Result;

/// Opens push channels
#[async_trait]
pub trait PushConnector: Send + Sync + 'static {
    async fn connect(&self, slug: &DisplaySlug) -> Result<Box<dyn PushConnection>>;
}

/// One open push channel
#[async_trait]
pub trait PushConnection: Send {
    /// Next decoded frame.
    ///
    /// `None` means the peer closed the channel. An `Err` that
    /// [`is_malformed`](crate::StreamError::is_malformed) concerns only that
    /// frame; any other `Err` means the channel is unusable.
    ///
    /// Must be cancel-safe: the supervisor races it against timers.
    async fn recv(&mut self) -> Option<Result<InboundMessage>>;

    async fn send(&mut self, message: &OutboundMessage) -> Result<()>;

    async fn close(&mut self);
}

/// Pulls full state for a display
#[async_trait]
pub trait StateSource: Send + Sync + 'static {
    async fn fetch(&self, slug: &DisplaySlug) -> Result<FullState>;
}

/// Joins a base URL and a relative path without caring about trailing slashes
pub(crate) fn join_url(base: &str, path: &str) -> Result<url::Url> {
    let joined = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Ok(url::Url::parse(&joined)?)
}
