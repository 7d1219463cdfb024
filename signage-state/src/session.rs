//! Display session actor
//!
//! Each display runs one session task. It owns the [`SyncState`], the
//! [`Scheduler`] and the snapshot store handle, and it is the only place any
//! of them change. Stream events, commands from the local side and dwell
//! timer expiries all become a [`SessionEvent`] and go through one reducer in
//! arrival order.
//!
//! ```text
//!  ConnectionSupervisor ──StreamEvent──┐
//!  SessionHandle ───────RemoteCommand──┼──▶ reduce() ──▶ PresentationUpdate
//!                       FrameStats ────┤        │
//!  Scheduler deadline ──DwellExpired───┘        │
//!                                               └──────▶ status / view telemetry
//! ```

use std::future::pending;
use std::sync::Arc;

use signage_model::{
    ContentRef, Display, DisplaySlug, EmergencyScope, FullState, InboundMessage, OutboundMessage,
    PlaylistItem, PlaylistPayload, Renderer, RemoteCommand, StatusReport, Transition,
};
use signage_stream::{
    ConnectionStatus, ConnectionSupervisor, PushConnector, StateSource, StreamConfig, StreamEvent,
    SupervisorHandle,
};
use tokio::sync::mpsc::OwnedPermit;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adaptor::{classify, PerformancePolicy, RuntimeMetrics};
use crate::cache::{CachedSnapshot, SnapshotStore};
use crate::error::{Result, StateError};
use crate::reconciler::{classify_drift, reconcile, Drift, HeldPlaylist};
use crate::scheduler::{DwellTimer, Scheduler, SchedulerOutput};
use crate::sync_state::{Provenance, SessionStatus, SyncState};

/// Settings for one display session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub slug: DisplaySlug,
    pub stream: StreamConfig,
    /// Start playing as soon as a playlist is applied
    pub autoplay: bool,
    /// Local device-class override; takes precedence over the display's hint
    pub low_power: Option<bool>,
    /// Device metrics for classification; probed from the host when `None`
    pub metrics: Option<RuntimeMetrics>,
    /// Buffer for commands and presentation updates
    pub mailbox_size: usize,
}

impl SessionConfig {
    pub fn new(slug: impl Into<DisplaySlug>) -> Self {
        Self {
            slug: slug.into(),
            stream: StreamConfig::default(),
            autoplay: true,
            low_power: None,
            metrics: None,
            mailbox_size: 64,
        }
    }

    pub fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    pub fn with_low_power(mut self, low_power: Option<bool>) -> Self {
        self.low_power = low_power;
        self
    }

    pub fn with_metrics(mut self, metrics: RuntimeMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.slug.is_valid() {
            return Err(StateError::Configuration(format!(
                "display slug {:?} must be non-empty and contain only letters, digits, '-' or '_'",
                self.slug.as_str()
            )));
        }
        if self.mailbox_size == 0 {
            return Err(StateError::Configuration(
                "mailbox_size must be greater than 0".to_string(),
            ));
        }
        self.stream.validate()?;
        Ok(())
    }
}

/// Presentation-layer directives the engine surfaces but does not carry out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Reload,
    ClearCache,
}

/// What the presentation layer should do next
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationUpdate {
    /// Show `item`
    Render {
        index: usize,
        item: PlaylistItem,
        renderer: Renderer,
        /// Transition after device policy is applied
        transition: Transition,
    },
    /// No playlist, or an empty one
    NoContent,
    /// Fetch these ahead of time; advisory
    Preload(Vec<ContentRef>),
    Display(Display),
    Connection(ConnectionStatus),
    Playback(StatusReport),
    Policy(PerformancePolicy),
    Directive(Directive),
}

/// Every input the reducer handles
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Stream(StreamEvent),
    Command(RemoteCommand),
    /// Frame counts from the presentation layer over its latest sampling window
    FrameStats { rendered: u64, dropped: u64 },
    DwellExpired { token: u64 },
}

/// Handle to a running session
#[derive(Debug)]
pub struct SessionHandle {
    slug: DisplaySlug,
    commands: mpsc::Sender<SessionEvent>,
    status: watch::Receiver<SessionStatus>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Issue a command as if it came from the server
    pub async fn command(&self, command: RemoteCommand) -> Result<()> {
        self.send(SessionEvent::Command(command)).await
    }

    /// Report how many frames the presentation layer rendered and dropped.
    ///
    /// Devices without a low-power override are reclassified from the ratio.
    pub async fn report_frames(&self, rendered: u64, dropped: u64) -> Result<()> {
        self.send(SessionEvent::FrameStats { rendered, dropped }).await
    }

    async fn send(&self, event: SessionEvent) -> Result<()> {
        self.commands
            .send(event)
            .await
            .map_err(|_| StateError::SessionClosed(self.slug.clone()))
    }

    /// Latest published status
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Receiver that is notified on every status change
    pub fn watch(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    pub fn slug(&self) -> &DisplaySlug {
        &self.slug
    }

    /// Stop the session and its supervisor, and wait for both
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Session task for {} ended abnormally: {}", self.slug, e);
        }
    }
}

/// Spawns display sessions
pub struct DisplaySession;

impl DisplaySession {
    /// Start a session for `config.slug`.
    ///
    /// Returns the handle and the stream of presentation updates. The session
    /// runs until the handle is shut down or `cancel` fires.
    pub fn spawn(
        config: SessionConfig,
        connector: Arc<dyn PushConnector>,
        source: Arc<dyn StateSource>,
        store: Arc<dyn SnapshotStore>,
        cancel: CancellationToken,
    ) -> (SessionHandle, mpsc::Receiver<PresentationUpdate>) {
        let buffer = config.mailbox_size.max(1);
        let (command_tx, command_rx) = mpsc::channel(buffer);
        let (update_tx, update_rx) = mpsc::channel(config.stream.event_buffer_size.max(buffer));
        let (event_tx, event_rx) = mpsc::channel(config.stream.event_buffer_size);
        let (status_tx, status_rx) = watch::channel(SessionStatus::new(config.slug.clone()));

        let supervisor = ConnectionSupervisor::spawn(
            config.slug.clone(),
            config.stream.clone(),
            connector,
            source,
            event_tx,
            cancel.child_token(),
        );

        let metrics = config.metrics.unwrap_or_else(RuntimeMetrics::detect);
        let policy = PerformancePolicy::for_class(classify(config.low_power, &metrics));

        let session = Session {
            slug: config.slug.clone(),
            state: SyncState::new(),
            scheduler: Scheduler::new(
                signage_model::DisplayId::new(config.slug.as_str()),
                policy.preload_count,
                config.autoplay,
            ),
            store,
            policy,
            metrics,
            local_low_power: config.low_power,
            supervisor,
            updates: update_tx,
            status: status_tx,
            rendered: None,
        };

        let task = tokio::spawn(session.run(event_rx, command_rx, cancel.clone()));

        let handle = SessionHandle {
            slug: config.slug,
            commands: command_tx,
            status: status_rx,
            cancel,
            task,
        };
        (handle, update_rx)
    }
}

/// What the presentation layer was last told to show
#[derive(Debug, Clone, PartialEq)]
enum Rendered {
    Item(usize, PlaylistItem),
    Nothing,
}

struct Session {
    slug: DisplaySlug,
    state: SyncState,
    scheduler: Scheduler,
    store: Arc<dyn SnapshotStore>,
    policy: PerformancePolicy,
    metrics: RuntimeMetrics,
    local_low_power: Option<bool>,
    supervisor: SupervisorHandle,
    updates: mpsc::Sender<PresentationUpdate>,
    status: watch::Sender<SessionStatus>,
    rendered: Option<Rendered>,
}

impl Session {
    async fn run(
        mut self,
        mut events: mpsc::Receiver<StreamEvent>,
        mut commands: mpsc::Receiver<SessionEvent>,
        cancel: CancellationToken,
    ) {
        info!("Display session started for {}", self.slug);
        self.present(PresentationUpdate::Policy(self.policy));
        self.publish();

        loop {
            let timer = self.scheduler.timer();

            let event = tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                Some(event) = commands.recv() => event,
                event = events.recv() => match event {
                    Some(event) => SessionEvent::Stream(event),
                    None => {
                        warn!("Supervisor for {} stopped", self.slug);
                        break;
                    }
                },
                token = dwell(timer) => SessionEvent::DwellExpired { token },
                permit = self.updates.clone().reserve_owned(), if self.render_pending() => {
                    if let Ok(permit) = permit {
                        self.deliver_render(permit);
                    }
                    continue;
                }
            };

            self.reduce(event, Instant::now());
        }

        self.supervisor.shutdown().await;
        info!("Display session stopped for {}", self.slug);
    }

    /// Apply one event
    fn reduce(&mut self, event: SessionEvent, now: Instant) {
        match event {
            SessionEvent::Stream(event) => self.on_stream(event, now),
            SessionEvent::Command(command) => self.on_command(command, now),
            SessionEvent::FrameStats { rendered, dropped } => {
                self.metrics = self.metrics.with_frames(rendered, dropped);
                self.update_policy();
            }
            SessionEvent::DwellExpired { token } => {
                self.scheduler.advance(token, now);
            }
        }

        self.flush();
        self.publish();
    }

    fn on_stream(&mut self, event: StreamEvent, now: Instant) {
        match event {
            StreamEvent::Status(status) => {
                self.state.connection = status;
                self.present(PresentationUpdate::Connection(status));
                if status.is_live() {
                    self.supervisor
                        .send(OutboundMessage::Status(self.scheduler.status()));
                }
            }
            StreamEvent::Message(message) => self.on_message(message, now),
            StreamEvent::Polled(state) => self.apply_full_state(state, Provenance::Poll, now),
            StreamEvent::Refreshed(state) => {
                self.apply_full_state(state, Provenance::Refresh, now)
            }
            StreamEvent::PollFailed {
                first_since_disconnect,
            } => {
                if first_since_disconnect {
                    self.substitute_cache(now);
                }
            }
        }
    }

    fn on_message(&mut self, message: InboundMessage, now: Instant) {
        debug!("Reducing {} for {}", message.kind(), self.slug);
        match message {
            InboundMessage::FullSnapshot(state) => {
                self.apply_full_state(state, Provenance::Push, now)
            }
            InboundMessage::PlaylistUpdate { playlist } => {
                self.apply_candidate(playlist, false, Provenance::Push, now)
            }
            InboundMessage::DisplayUpdate { display } => self.apply_display(display),
            InboundMessage::DisplayControl(command) => self.on_command(command, now),
            InboundMessage::EmergencyStop(scope) => {
                if self.targeted_by(&scope) {
                    warn!("Emergency stop for {}", self.slug);
                    self.scheduler.emergency_stop();
                }
            }
            InboundMessage::HeartbeatAck => {}
        }
    }

    fn on_command(&mut self, command: RemoteCommand, now: Instant) {
        let result = match &command {
            RemoteCommand::Play => self.scheduler.play(now),
            RemoteCommand::Pause => self.scheduler.pause(),
            RemoteCommand::Stop => self.scheduler.stop(now),
            RemoteCommand::Restart => self.scheduler.restart(now),
            RemoteCommand::Next => self.scheduler.next(now),
            RemoteCommand::Previous => self.scheduler.previous(now),
            RemoteCommand::Seek { index } => self.scheduler.seek(*index, now),
            RemoteCommand::Reload => {
                self.present(PresentationUpdate::Directive(Directive::Reload));
                Ok(())
            }
            RemoteCommand::RefreshContent => {
                if !self.supervisor.request_refresh() {
                    warn!("Could not queue refresh for {}", self.slug);
                }
                Ok(())
            }
            RemoteCommand::ClearCache => {
                if let Err(e) = self.store.clear(&self.slug) {
                    warn!("Failed to clear snapshot for {}: {}", self.slug, e);
                }
                self.present(PresentationUpdate::Directive(Directive::ClearCache));
                Ok(())
            }
        };

        if let Err(e) = result {
            debug!("Ignoring {:?} for {}: {}", command, self.slug, e);
        }
    }

    fn apply_full_state(&mut self, state: FullState, provenance: Provenance, now: Instant) {
        self.apply_display(state.display);
        let force = provenance == Provenance::Refresh;
        self.apply_candidate(state.playlist, force, provenance, now);
    }

    /// Reconcile a playlist candidate and, if accepted, hand it to the scheduler
    fn apply_candidate(
        &mut self,
        candidate: Option<PlaylistPayload>,
        force: bool,
        provenance: Provenance,
        now: Instant,
    ) {
        let decision = reconcile(&self.state.playlist, candidate, force);
        for repair in &decision.repairs {
            warn!("Repaired playlist for {}: {}", self.slug, repair);
        }
        if !decision.apply {
            debug!("{:?} state for {} is unchanged", provenance, self.slug);
            return;
        }

        let drift = classify_drift(&self.state.playlist, decision.normalized.as_ref());
        match (provenance, drift, decision.normalized.clone()) {
            (_, Drift::Unchanged, _) if !force => {}
            (Provenance::Poll, Drift::InPlace, Some(playlist)) => {
                debug!("Patching playlist for {} in place", self.slug);
                self.scheduler.patch_items(playlist, now);
            }
            (Provenance::Poll, Drift::Hard, playlist) => {
                info!("Item count drifted for {}, resynchronizing", self.slug);
                self.scheduler.apply_playlist(playlist, now);
                self.present(PresentationUpdate::Directive(Directive::Reload));
            }
            (_, _, playlist) => self.scheduler.apply_playlist(playlist, now),
        }

        self.state.playlist = HeldPlaylist::from(decision.normalized);
        self.state.mark_applied(provenance);
        if provenance != Provenance::Cache {
            self.persist();
        }
    }

    fn apply_display(&mut self, display: Display) {
        let previous = self.state.display.as_ref();
        if previous == Some(&display) {
            return;
        }

        let hint_changed = previous.map_or(true, |p| p.low_power != display.low_power);
        let refresh_raised = display.refresh && !previous.is_some_and(|p| p.refresh);

        self.scheduler.set_display_id(display.id.clone());
        self.state.display = Some(display.clone());
        self.present(PresentationUpdate::Display(display.clone()));

        if hint_changed {
            self.update_policy();
        }
        if refresh_raised {
            self.present(PresentationUpdate::Directive(Directive::Reload));
        }
        if self.state.playlist.is_initialized() {
            self.persist();
        }
    }

    fn update_policy(&mut self) {
        let hint = self.state.display.as_ref().and_then(|d| d.low_power);
        let class = classify(self.local_low_power.or(hint), &self.metrics);
        if class == self.policy.class {
            return;
        }
        info!("Device class for {} is now {:?}", self.slug, class);
        self.policy = PerformancePolicy::for_class(class);
        self.scheduler.set_preload_count(self.policy.preload_count);
        self.present(PresentationUpdate::Policy(self.policy));
        // the current item's transition may be different under the new policy
        self.rendered = None;
    }

    fn targeted_by(&self, scope: &EmergencyScope) -> bool {
        match (scope, self.state.display.as_ref()) {
            (EmergencyScope::All, _) => true,
            (scope, Some(display)) => scope.includes(display),
            (EmergencyScope::Displays { ids }, None) => {
                ids.iter().any(|id| DisplaySlug::new(id) == self.slug)
            }
        }
    }

    /// Fall back to the last-known-good snapshot, unless live state is held
    fn substitute_cache(&mut self, now: Instant) {
        if let Some(provenance) = self.state.applied_from.filter(|p| *p != Provenance::Cache) {
            debug!(
                "Keeping {:?} state for {} over the cached snapshot",
                provenance, self.slug
            );
            return;
        }

        let snapshot = match self.store.get(&self.slug) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!("No snapshot cached for {}", self.slug);
                return;
            }
            Err(e) => {
                warn!("Failed to read snapshot for {}: {}", self.slug, e);
                return;
            }
        };

        info!(
            "Server unreachable, using snapshot for {} saved at {}",
            self.slug, snapshot.saved_at
        );
        self.apply_display(snapshot.display);
        let candidate = snapshot.playlist.as_ref().map(PlaylistPayload::from);
        self.apply_candidate(candidate, false, Provenance::Cache, now);
    }

    fn persist(&self) {
        let Some(display) = self.state.display.clone() else {
            debug!("No display known for {} yet, not caching", self.slug);
            return;
        };
        let snapshot = CachedSnapshot::new(display, self.state.playlist.playlist().cloned());
        if let Err(e) = self.store.put(&self.slug, &snapshot) {
            warn!("Failed to cache snapshot for {}: {}", self.slug, e);
        }
    }

    /// Route scheduler side effects and announce a changed current item
    fn flush(&mut self) {
        for output in self.scheduler.drain() {
            match output {
                SchedulerOutput::Status(status) => {
                    self.supervisor.send(OutboundMessage::Status(status));
                    self.present(PresentationUpdate::Playback(status));
                }
                SchedulerOutput::View(record) => {
                    self.supervisor.send(OutboundMessage::View(record));
                }
                SchedulerOutput::Preload(items) => {
                    self.present(PresentationUpdate::Preload(items));
                }
            }
        }

        // a dropped render stays pending and is retried once the channel has room
        if let Some((current, update)) = self.pending_render() {
            if self.present(update) {
                self.rendered = Some(current);
            }
        }
    }

    /// The current item, when the presentation layer has not been told about it
    fn pending_render(&self) -> Option<(Rendered, PresentationUpdate)> {
        if !self.state.playlist.is_initialized() {
            return None;
        }
        let current = match self.scheduler.current_item() {
            Some(item) => Rendered::Item(self.scheduler.index(), item.clone()),
            None => Rendered::Nothing,
        };
        if self.rendered.as_ref() == Some(&current) {
            return None;
        }

        let update = match &current {
            Rendered::Item(index, item) => PresentationUpdate::Render {
                index: *index,
                item: item.clone(),
                renderer: item.content.kind.renderer(),
                transition: self.policy.effective_transition(item),
            },
            Rendered::Nothing => PresentationUpdate::NoContent,
        };
        Some((current, update))
    }

    fn render_pending(&self) -> bool {
        !self.updates.is_closed() && self.pending_render().is_some()
    }

    fn deliver_render(&mut self, permit: OwnedPermit<PresentationUpdate>) {
        if let Some((current, update)) = self.pending_render() {
            debug!("Delivering held-back render for {}", self.slug);
            permit.send(update);
            self.rendered = Some(current);
        }
    }

    /// Returns whether the update was queued
    fn present(&self, update: PresentationUpdate) -> bool {
        match self.updates.try_send(update) {
            Ok(()) => true,
            Err(e) => {
                warn!("Presentation update for {} dropped: {}", self.slug, e);
                false
            }
        }
    }

    fn publish(&self) {
        let scheduler = &self.scheduler;
        let status = SessionStatus {
            slug: self.slug.clone(),
            connection: self.state.connection,
            display: self.state.display.clone(),
            playlist: self.state.playlist.clone(),
            playback: scheduler.state(),
            index: scheduler.index(),
            current_item: scheduler.current_item().map(|i| i.id.clone()),
            previous_item: scheduler.previous_item().map(|i| i.id.clone()),
            next_item: scheduler.next_item().map(|i| i.id.clone()),
            applied_from: self.state.applied_from,
            last_applied_at: self.state.last_applied_at,
            device_class: self.policy.class,
            timer_generation: scheduler.generation(),
        };
        self.status.send_replace(status);
    }
}

/// Resolves with the timer's token at its deadline; never resolves without one
async fn dwell(timer: Option<DwellTimer>) -> u64 {
    match timer {
        Some(timer) => {
            sleep_until(timer.deadline).await;
            timer.token
        }
        None => pending().await,
    }
}
