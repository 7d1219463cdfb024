//! Supervisor behavior against scripted transports, on paused time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use signage_model::{
    Display, DisplaySlug, FullState, InboundMessage, OutboundMessage, PlaybackState,
    RemoteCommand, StatusReport,
};
use signage_stream::{
    ConnectionStatus, ConnectionSupervisor, PushConnection, PushConnector, Result, StateSource,
    StreamConfig, StreamError, StreamEvent, SupervisorHandle,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

struct MockConnection {
    inbound: mpsc::UnboundedReceiver<Result<InboundMessage>>,
    sent: mpsc::UnboundedSender<OutboundMessage>,
}

#[async_trait]
impl PushConnection for MockConnection {
    async fn recv(&mut self) -> Option<Result<InboundMessage>> {
        self.inbound.recv().await
    }

    async fn send(&mut self, message: &OutboundMessage) -> Result<()> {
        self.sent
            .send(message.clone())
            .map_err(|_| StreamError::Connection("peer gone".to_string()))
    }

    async fn close(&mut self) {}
}

/// Hands out scripted connections in order; refuses once the script runs out
#[derive(Default)]
struct MockConnector {
    script: Mutex<VecDeque<MockConnection>>,
}

/// Test side of a scripted connection
struct Peer {
    inbound: mpsc::UnboundedSender<Result<InboundMessage>>,
    sent: mpsc::UnboundedReceiver<OutboundMessage>,
}

impl MockConnector {
    fn refusing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn accept_next(&self) -> Peer {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        self.script.lock().unwrap().push_back(MockConnection {
            inbound: inbound_rx,
            sent: sent_tx,
        });
        Peer {
            inbound: inbound_tx,
            sent: sent_rx,
        }
    }
}

#[async_trait]
impl PushConnector for MockConnector {
    async fn connect(&self, _slug: &DisplaySlug) -> Result<Box<dyn PushConnection>> {
        match self.script.lock().unwrap().pop_front() {
            Some(conn) => Ok(Box::new(conn)),
            None => Err(StreamError::Connection("refused".to_string())),
        }
    }
}

struct MockSource {
    state: Option<FullState>,
}

#[async_trait]
impl StateSource for MockSource {
    async fn fetch(&self, _slug: &DisplaySlug) -> Result<FullState> {
        self.state
            .clone()
            .ok_or_else(|| StreamError::Connection("unreachable".to_string()))
    }
}

fn state() -> FullState {
    FullState {
        display: Display::new("d-1", "lobby"),
        playlist: None,
    }
}

fn config() -> StreamConfig {
    StreamConfig::default().with_jitter(0.0)
}

fn spawn(
    connector: Arc<MockConnector>,
    source: Option<FullState>,
) -> (SupervisorHandle, mpsc::Receiver<StreamEvent>) {
    let (tx, rx) = mpsc::channel(64);
    let handle = ConnectionSupervisor::spawn(
        DisplaySlug::new("lobby"),
        config(),
        connector,
        Arc::new(MockSource { state: source }),
        tx,
        CancellationToken::new(),
    );
    (handle, rx)
}

async fn next(rx: &mut mpsc::Receiver<StreamEvent>) -> StreamEvent {
    timeout(Duration::from_secs(600), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

#[tokio::test(start_paused = true)]
async fn test_registers_and_forwards_frames() {
    let connector = MockConnector::refusing();
    let mut peer = connector.accept_next();
    let (handle, mut rx) = spawn(connector, None);

    assert_eq!(next(&mut rx).await, StreamEvent::Status(ConnectionStatus::Connecting));
    assert_eq!(next(&mut rx).await, StreamEvent::Status(ConnectionStatus::Connected));
    assert_eq!(
        peer.sent.recv().await,
        Some(OutboundMessage::Register {
            slug: DisplaySlug::new("lobby")
        })
    );

    peer.inbound.send(Ok(InboundMessage::HeartbeatAck)).unwrap();
    peer.inbound
        .send(Ok(InboundMessage::DisplayControl(RemoteCommand::Play)))
        .unwrap();

    // the ack is swallowed
    assert_eq!(
        next(&mut rx).await,
        StreamEvent::Message(InboundMessage::DisplayControl(RemoteCommand::Play))
    );

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_keeps_channel() {
    let connector = MockConnector::refusing();
    let peer = connector.accept_next();
    let (handle, mut rx) = spawn(connector, None);

    next(&mut rx).await;
    assert_eq!(next(&mut rx).await, StreamEvent::Status(ConnectionStatus::Connected));

    let garbage = InboundMessage::decode("{not json").unwrap_err();
    peer.inbound.send(Err(garbage.into())).unwrap();
    peer.inbound
        .send(Ok(InboundMessage::DisplayControl(RemoteCommand::Next)))
        .unwrap();

    assert_eq!(
        next(&mut rx).await,
        StreamEvent::Message(InboundMessage::DisplayControl(RemoteCommand::Next))
    );

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_heartbeats_sent_while_connected() {
    let connector = MockConnector::refusing();
    let mut peer = connector.accept_next();
    let (handle, mut rx) = spawn(connector, None);

    next(&mut rx).await;
    next(&mut rx).await;
    assert!(matches!(peer.sent.recv().await, Some(OutboundMessage::Register { .. })));

    let started = tokio::time::Instant::now();
    assert_eq!(peer.sent.recv().await, Some(OutboundMessage::Heartbeat));
    assert_eq!(started.elapsed(), Duration::from_secs(30));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_silent_channel_times_out() {
    let connector = MockConnector::refusing();
    let _peer = connector.accept_next();
    let (handle, mut rx) = spawn(connector, None);

    next(&mut rx).await;
    assert_eq!(next(&mut rx).await, StreamEvent::Status(ConnectionStatus::Connected));

    let started = tokio::time::Instant::now();
    assert_eq!(next(&mut rx).await, StreamEvent::Status(ConnectionStatus::Error));
    assert!(started.elapsed() >= Duration::from_secs(75));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_peer_close_reports_disconnected() {
    let connector = MockConnector::refusing();
    let peer = connector.accept_next();
    let (handle, mut rx) = spawn(connector, Some(state()));

    next(&mut rx).await;
    next(&mut rx).await;
    drop(peer);

    assert_eq!(next(&mut rx).await, StreamEvent::Status(ConnectionStatus::Disconnected));
    // polling starts immediately
    assert_eq!(next(&mut rx).await, StreamEvent::Polled(state()));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_polls_flag_only_the_first() {
    let connector = MockConnector::refusing();
    let (handle, mut rx) = spawn(connector, None);

    assert_eq!(next(&mut rx).await, StreamEvent::Status(ConnectionStatus::Connecting));
    assert_eq!(next(&mut rx).await, StreamEvent::Status(ConnectionStatus::Error));
    assert_eq!(
        next(&mut rx).await,
        StreamEvent::PollFailed {
            first_since_disconnect: true
        }
    );

    let second = loop {
        match next(&mut rx).await {
            StreamEvent::Status(_) => continue,
            other => break other,
        }
    };
    assert_eq!(
        second,
        StreamEvent::PollFailed {
            first_since_disconnect: false
        }
    );

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_polls_on_interval_while_down() {
    let connector = MockConnector::refusing();
    let (handle, mut rx) = spawn(connector, Some(state()));

    let mut polled_at = Vec::new();
    while polled_at.len() < 3 {
        if let StreamEvent::Polled(_) = next(&mut rx).await {
            polled_at.push(tokio::time::Instant::now());
        }
    }

    assert_eq!(polled_at[1] - polled_at[0], Duration::from_secs(15));
    assert_eq!(polled_at[2] - polled_at[1], Duration::from_secs(15));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_outbound_dropped_while_down() {
    let connector = MockConnector::refusing();
    let (handle, mut rx) = spawn(connector.clone(), Some(state()));

    next(&mut rx).await;
    assert_eq!(next(&mut rx).await, StreamEvent::Status(ConnectionStatus::Error));

    assert!(handle.send(OutboundMessage::Status(StatusReport {
        state: PlaybackState::Playing,
        index: 0,
    })));

    let mut peer = connector.accept_next();
    loop {
        if next(&mut rx).await == StreamEvent::Status(ConnectionStatus::Connected) {
            break;
        }
    }

    assert!(matches!(peer.sent.recv().await, Some(OutboundMessage::Register { .. })));
    tokio::task::yield_now().await;
    assert!(peer.sent.try_recv().is_err());

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_refresh_pulls_while_connected() {
    let connector = MockConnector::refusing();
    let _peer = connector.accept_next();
    let (handle, mut rx) = spawn(connector, Some(state()));

    next(&mut rx).await;
    next(&mut rx).await;

    assert!(handle.request_refresh());
    assert_eq!(next(&mut rx).await, StreamEvent::Refreshed(state()));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_task() {
    let connector = MockConnector::refusing();
    let (handle, mut rx) = spawn(connector, None);

    next(&mut rx).await;
    handle.shutdown().await;

    // the supervisor dropped its sender
    while rx.recv().await.is_some() {}
}

#[tokio::test(start_paused = true)]
async fn test_external_cancel_stops_task() {
    let (tx, mut rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();
    let handle = ConnectionSupervisor::spawn(
        DisplaySlug::new("lobby"),
        config(),
        MockConnector::refusing(),
        Arc::new(MockSource { state: None }),
        tx,
        cancel.clone(),
    );

    next(&mut rx).await;
    cancel.cancel();
    while rx.recv().await.is_some() {}
    tokio::task::yield_now().await;
    assert!(handle.is_finished());
}
