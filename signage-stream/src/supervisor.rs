//! Connection supervision
//!
//! One [`ConnectionSupervisor`] runs per display. It keeps trying to hold a
//! push channel open and, whenever it cannot, falls back to pulling full state
//! on a fixed interval. Everything it learns is forwarded as [`StreamEvent`]s
//! to a single consumer, which is the only place state decisions are made.
//!
//! ```text
//!            ┌──────────── connect ok ───────────┐
//!            │                                   ▼
//!   Connecting ──fail──▶ Error ──backoff──▶ Connecting     Connected
//!        ▲                 │  (polling)                      │
//!        └─────────────────┴──── closed / heartbeat lost ────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use signage_model::{DisplaySlug, InboundMessage, OutboundMessage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::backoff::Backoff;
use crate::config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::transport::{PushConnection, PushConnector, StateSource};
use crate::types::{ConnectionStatus, StreamEvent, SupervisorCommand};

/// Handle to a running supervisor task
#[derive(Debug)]
pub struct SupervisorHandle {
    commands: mpsc::Sender<SupervisorCommand>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    /// Queue a frame for the push channel.
    ///
    /// Never waits: if the queue is full or the channel is down the frame is
    /// dropped. Returns whether it was queued.
    pub fn send(&self, message: OutboundMessage) -> bool {
        match self.commands.try_send(SupervisorCommand::Send(message)) {
            Ok(()) => true,
            Err(e) => {
                debug!("Dropping outbound frame: {}", e);
                false
            }
        }
    }

    /// Ask for an immediate full-state pull
    pub fn request_refresh(&self) -> bool {
        self.commands.try_send(SupervisorCommand::Refresh).is_ok()
    }

    /// Stop reconnecting and polling, and wait for the task to finish
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Supervisor task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// How a connected period ended
enum Ended {
    Closed,
    Failed(StreamError),
    Cancelled,
}

/// Keeps one display's channel alive and polls while it is not
pub struct ConnectionSupervisor {
    slug: DisplaySlug,
    config: StreamConfig,
    connector: Arc<dyn PushConnector>,
    source: Arc<dyn StateSource>,
    events: mpsc::Sender<StreamEvent>,
    commands: mpsc::Receiver<SupervisorCommand>,
    cancel: CancellationToken,
    backoff: Backoff,
    status: Option<ConnectionStatus>,
    /// Next fallback poll; `None` while the push channel is up
    next_poll: Option<Instant>,
    /// No poll has completed since the channel last went down
    first_poll_pending: bool,
}

impl ConnectionSupervisor {
    /// Spawn a supervisor for `slug`, forwarding events to `events`.
    ///
    /// The supervisor stops when `cancel` fires, when the handle is shut down,
    /// or when the receiving side of `events` is dropped.
    pub fn spawn(
        slug: DisplaySlug,
        config: StreamConfig,
        connector: Arc<dyn PushConnector>,
        source: Arc<dyn StateSource>,
        events: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> SupervisorHandle {
        let (command_tx, command_rx) = mpsc::channel(config.event_buffer_size);
        let backoff = Backoff::new(
            config.reconnect_base_delay,
            config.reconnect_max_delay,
            config.reconnect_jitter,
        );

        let supervisor = Self {
            slug,
            config,
            connector,
            source,
            events,
            commands: command_rx,
            cancel: cancel.clone(),
            backoff,
            status: None,
            next_poll: None,
            first_poll_pending: false,
        };
        let task = tokio::spawn(supervisor.run());

        SupervisorHandle {
            commands: command_tx,
            cancel,
            task,
        }
    }

    async fn run(mut self) {
        info!("Connection supervisor started for {}", self.slug);

        loop {
            if self.set_status(ConnectionStatus::Connecting).await.is_err() {
                break;
            }

            let attempt = tokio::select! {
                _ = self.cancel.cancelled() => break,
                attempt = timeout(self.config.connect_timeout, self.connector.connect(&self.slug)) => attempt,
            };

            let next_status = match attempt {
                Ok(Ok(connection)) => {
                    self.backoff.reset();
                    self.next_poll = None;
                    if self.set_status(ConnectionStatus::Connected).await.is_err() {
                        break;
                    }
                    match self.run_connected(connection).await {
                        Ended::Cancelled => break,
                        Ended::Closed => {
                            info!("Push channel for {} closed", self.slug);
                            ConnectionStatus::Disconnected
                        }
                        Ended::Failed(e) => {
                            warn!("Push channel for {} failed: {}", self.slug, e);
                            ConnectionStatus::Error
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!("Connecting {} failed: {}", self.slug, e);
                    ConnectionStatus::Error
                }
                Err(_) => {
                    warn!(
                        "Connecting {} timed out after {:?}",
                        self.slug, self.config.connect_timeout
                    );
                    ConnectionStatus::Error
                }
            };

            if self.set_status(next_status).await.is_err() {
                break;
            }
            if self.next_poll.is_none() {
                self.next_poll = Some(Instant::now());
                self.first_poll_pending = true;
            }

            let delay = self.backoff.next_delay();
            debug!(
                "Reconnecting {} in {:?} (attempt {})",
                self.slug,
                delay,
                self.backoff.attempt()
            );
            if !self.run_degraded(delay).await {
                break;
            }
        }

        info!("Connection supervisor stopped for {}", self.slug);
    }

    /// Pump a live channel until it ends
    async fn run_connected(&mut self, mut connection: Box<dyn PushConnection>) -> Ended {
        let register = OutboundMessage::Register {
            slug: self.slug.clone(),
        };
        if let Err(e) = connection.send(&register).await {
            return Ended::Failed(e);
        }

        let heartbeat_interval = self.config.heartbeat_interval;
        let heartbeat_timeout = self.config.heartbeat_timeout;
        let mut heartbeat = interval_at(Instant::now() + heartbeat_interval, heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_inbound = Instant::now();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    connection.close().await;
                    return Ended::Cancelled;
                }
                frame = connection.recv() => match frame {
                    None => return Ended::Closed,
                    Some(Ok(message)) => {
                        last_inbound = Instant::now();
                        if message == InboundMessage::HeartbeatAck {
                            trace!("Heartbeat acknowledged");
                            continue;
                        }
                        debug!("Push frame {} for {}", message.kind(), self.slug);
                        if self.emit(StreamEvent::Message(message)).await.is_err() {
                            connection.close().await;
                            return Ended::Cancelled;
                        }
                    }
                    Some(Err(e)) if e.is_malformed() => {
                        last_inbound = Instant::now();
                        warn!("Discarding malformed frame for {}: {}", self.slug, e);
                    }
                    Some(Err(e)) => return Ended::Failed(e),
                },
                _ = heartbeat.tick() => {
                    if let Err(e) = connection.send(&OutboundMessage::Heartbeat).await {
                        return Ended::Failed(e);
                    }
                }
                _ = sleep_until(last_inbound + heartbeat_timeout) => {
                    connection.close().await;
                    return Ended::Failed(StreamError::HeartbeatTimeout(heartbeat_timeout));
                }
                command = self.commands.recv() => match command {
                    Some(SupervisorCommand::Send(message)) => {
                        if let Err(e) = connection.send(&message).await {
                            return Ended::Failed(e);
                        }
                    }
                    Some(SupervisorCommand::Refresh) => {
                        if !self.refresh().await {
                            connection.close().await;
                            return Ended::Cancelled;
                        }
                    }
                    None => {
                        connection.close().await;
                        return Ended::Cancelled;
                    }
                },
            }
        }
    }

    /// Poll until it is time to reconnect. Returns `false` when the
    /// supervisor should stop.
    async fn run_degraded(&mut self, delay: Duration) -> bool {
        let reconnect_at = Instant::now() + delay;

        loop {
            let poll_at = self.next_poll.unwrap_or(reconnect_at);

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return false,
                _ = sleep_until(poll_at) => {
                    if !self.poll().await {
                        return false;
                    }
                    self.next_poll = Some(Instant::now() + self.config.poll_interval);
                }
                _ = sleep_until(reconnect_at) => return true,
                command = self.commands.recv() => match command {
                    Some(SupervisorCommand::Send(message)) => {
                        debug!("Channel down, dropping {:?}", message);
                    }
                    Some(SupervisorCommand::Refresh) => {
                        if !self.refresh().await {
                            return false;
                        }
                    }
                    None => return false,
                },
            }
        }
    }

    /// One fallback poll. Returns `false` when the supervisor should stop.
    async fn poll(&mut self) -> bool {
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return false,
            result = self.fetch() => result,
        };

        let event = match result {
            Ok(state) => {
                debug!("Fallback poll for {} succeeded", self.slug);
                StreamEvent::Polled(state)
            }
            Err(e) => {
                warn!("Fallback poll for {} failed: {}", self.slug, e);
                StreamEvent::PollFailed {
                    first_since_disconnect: self.first_poll_pending,
                }
            }
        };
        self.first_poll_pending = false;
        self.emit(event).await.is_ok()
    }

    /// Explicitly requested pull. Failures are logged only.
    async fn refresh(&mut self) -> bool {
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return false,
            result = self.fetch() => result,
        };

        match result {
            Ok(state) => self.emit(StreamEvent::Refreshed(state)).await.is_ok(),
            Err(e) => {
                warn!("Refresh for {} failed: {}", self.slug, e);
                true
            }
        }
    }

    async fn fetch(&self) -> Result<signage_model::FullState> {
        let deadline = self.config.request_timeout;
        match timeout(deadline, self.source.fetch(&self.slug)).await {
            Ok(result) => result,
            Err(_) => Err(StreamError::Timeout(deadline)),
        }
    }

    async fn set_status(&mut self, status: ConnectionStatus) -> Result<()> {
        if self.status == Some(status) {
            return Ok(());
        }
        debug!("Channel for {} is {}", self.slug, status);
        self.status = Some(status);
        self.emit(StreamEvent::Status(status)).await
    }

    async fn emit(&self, event: StreamEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| StreamError::ChannelClosed)
    }
}
