//! # signage-state
//!
//! Per-display synchronization and playback for signage-sync.
//!
//! A [`DisplaySession`] ties together:
//!
//! - the [`reconciler`], which decides whether incoming playlist state is a
//!   real change,
//! - the [`Scheduler`], which moves through the playlist on dwell timers and
//!   remote commands,
//! - a [`SnapshotStore`], which keeps the last accepted state for when the
//!   server is unreachable,
//! - the [`adaptor`], which picks rendering limits for the device.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use signage_state::{DisplaySession, MemorySnapshotStore, SessionConfig};
//! use signage_stream::{HttpStateSource, WsConnector};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::new("lobby");
//! let connector = Arc::new(WsConnector::new(config.stream.push_url.clone())?);
//! let source = Arc::new(HttpStateSource::new(
//!     config.stream.server_url.clone(),
//!     config.stream.request_timeout,
//! )?);
//!
//! let (handle, mut updates) = DisplaySession::spawn(
//!     config,
//!     connector,
//!     source,
//!     Arc::new(MemorySnapshotStore::new()),
//!     CancellationToken::new(),
//! );
//!
//! while let Some(update) = updates.recv().await {
//!     println!("{:?}", update);
//! }
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod adaptor;
pub mod cache;
mod error;
pub mod logging;
pub mod reconciler;
pub mod scheduler;
mod session;
mod sync_state;

pub use adaptor::{classify, DeviceClass, PerformancePolicy, RuntimeMetrics};
pub use cache::{CachedSnapshot, FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
pub use error::{CacheError, CommandError, Result, StateError};
pub use reconciler::{classify_drift, reconcile, Decision, Drift, HeldPlaylist};
pub use scheduler::{DwellTimer, Scheduler, SchedulerOutput};
pub use session::{
    Directive, DisplaySession, PresentationUpdate, SessionConfig, SessionEvent, SessionHandle,
};
pub use sync_state::{Provenance, SessionStatus, SyncState};
