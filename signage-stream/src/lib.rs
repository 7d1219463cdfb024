//! # signage-stream
//!
//! Keeps a display connected to the signage server.
//!
//! A [`ConnectionSupervisor`] owns one display's push channel. While the
//! channel is up it forwards frames and keeps the heartbeat going; while it is
//! down it reconnects with jittered exponential backoff and pulls full state
//! on a fixed interval so the display never goes stale for long.
//!
//! The transports sit behind [`PushConnector`] and [`StateSource`], with
//! WebSocket ([`WsConnector`]) and HTTP ([`HttpStateSource`]) implementations
//! provided.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use signage_model::DisplaySlug;
//! use signage_stream::{ConnectionSupervisor, HttpStateSource, StreamConfig, WsConnector};
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StreamConfig::new()
//!     .with_server_url("https://signage.example")
//!     .with_push_url("wss://signage.example/ws");
//! config.validate()?;
//!
//! let connector = Arc::new(WsConnector::new(config.push_url.clone())?);
//! let source = Arc::new(HttpStateSource::new(config.server_url.clone(), config.request_timeout)?);
//! let (events_tx, mut events_rx) = mpsc::channel(config.event_buffer_size);
//!
//! let handle = ConnectionSupervisor::spawn(
//!     DisplaySlug::new("lobby"),
//!     config,
//!     connector,
//!     source,
//!     events_tx,
//!     CancellationToken::new(),
//! );
//!
//! while let Some(event) = events_rx.recv().await {
//!     println!("{:?}", event);
//! }
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod backoff;
mod config;
mod error;
mod http;
mod supervisor;
mod transport;
mod types;
mod ws;

pub use backoff::Backoff;
pub use config::StreamConfig;
pub use error::{Result, StreamError};
pub use http::HttpStateSource;
pub use supervisor::{ConnectionSupervisor, SupervisorHandle};
pub use transport::{PushConnection, PushConnector, StateSource};
pub use types::{ConnectionStatus, StreamEvent, SupervisorCommand};
pub use ws::WsConnector;
