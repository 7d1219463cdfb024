//! Playback progression for one display
//!
//! [`Scheduler`] is a plain state machine: it never spawns tasks or sleeps.
//! It holds at most one [`DwellTimer`], and its owner awaits that deadline and
//! calls [`Scheduler::advance`] with the timer's token when it expires. Every
//! transition replaces or clears the timer and bumps the generation, so an
//! expiry that raced a manual command carries a stale token and is ignored.
//!
//! ```text
//!              apply (≥1 item)
//!   Idle ───────────────────────▶ Playing ◀──── play ────┐
//!    ▲                              │  ▲                  │
//!    │ apply(none / empty)    pause │  │ restart       Paused / Stopped
//!    └──────────────────────────────┘  └──────────────────┘
//! ```
//!
//! Side effects (status reports, view records, preload hints) are queued in an
//! outbox and collected with [`Scheduler::drain`].

use std::time::Duration;

use signage_model::{
    ContentRef, DisplayId, PlaybackState, Playlist, PlaylistItem, StatusReport, ViewRecord,
};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::CommandError;

/// The single armed dwell timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DwellTimer {
    pub token: u64,
    pub deadline: Instant,
}

/// Side effects of a transition
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerOutput {
    Status(StatusReport),
    View(ViewRecord),
    /// Upcoming items, nearest first
    Preload(Vec<ContentRef>),
}

/// How an item left the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leave {
    Completed,
    Skipped,
}

#[derive(Debug)]
pub struct Scheduler {
    display_id: DisplayId,
    playlist: Option<Playlist>,
    state: PlaybackState,
    index: usize,
    timer: Option<DwellTimer>,
    /// Incremented every time a timer is armed
    generation: u64,
    item_started: Option<Instant>,
    preload_count: usize,
    autoplay: bool,
    outbox: Vec<SchedulerOutput>,
}

impl Scheduler {
    pub fn new(display_id: DisplayId, preload_count: usize, autoplay: bool) -> Self {
        Self {
            display_id,
            playlist: None,
            state: PlaybackState::Idle,
            index: 0,
            timer: None,
            generation: 0,
            item_started: None,
            preload_count,
            autoplay,
            outbox: Vec::new(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn playlist(&self) -> Option<&Playlist> {
        self.playlist.as_ref()
    }

    pub fn timer(&self) -> Option<DwellTimer> {
        self.timer
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.timer.map(|t| t.deadline)
    }

    /// Number of timers armed so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            state: self.state,
            index: self.index,
        }
    }

    pub fn current_item(&self) -> Option<&PlaylistItem> {
        self.playlist.as_ref()?.item(self.index)
    }

    pub fn previous_item(&self) -> Option<&PlaylistItem> {
        let playlist = self.playlist.as_ref()?;
        let len = playlist.len();
        if len == 0 {
            return None;
        }
        playlist.item((self.index + len - 1) % len)
    }

    pub fn next_item(&self) -> Option<&PlaylistItem> {
        let playlist = self.playlist.as_ref()?;
        let len = playlist.len();
        if len == 0 {
            return None;
        }
        playlist.item((self.index + 1) % len)
    }

    /// Identity used in view records
    pub fn set_display_id(&mut self, display_id: DisplayId) {
        self.display_id = display_id;
    }

    pub fn set_preload_count(&mut self, count: usize) {
        self.preload_count = count;
    }

    /// Take queued side effects, oldest first
    pub fn drain(&mut self) -> Vec<SchedulerOutput> {
        std::mem::take(&mut self.outbox)
    }

    /// Replace the playlist and start over from the first item.
    ///
    /// `None` or an empty playlist leaves the scheduler idle.
    pub fn apply_playlist(&mut self, playlist: Option<Playlist>, now: Instant) {
        self.cancel_timer();
        self.index = 0;
        self.playlist = playlist;

        if self.item_count() == 0 {
            self.item_started = None;
            self.state = PlaybackState::Idle;
            self.emit_status();
            return;
        }

        self.state = if self.autoplay {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        };
        self.enter_current(now);
        self.emit_status();
        self.emit_preload();
    }

    /// Swap in new item content without moving.
    ///
    /// The playlist must have the same number of items as the held one. The
    /// dwell timer is only restarted when the current item itself changed.
    pub fn patch_items(&mut self, playlist: Playlist, now: Instant) {
        let current_changed = match (self.current_item(), playlist.item(self.index)) {
            (Some(old), Some(new)) => !old.same_structure(new),
            _ => true,
        };

        if self.item_count() != playlist.len() {
            debug!("Patch changes item count, reinitializing instead");
            self.apply_playlist(Some(playlist), now);
            return;
        }

        self.playlist = Some(playlist);
        if current_changed {
            self.enter_current(now);
        }
        self.emit_preload();
    }

    pub fn play(&mut self, now: Instant) -> Result<(), CommandError> {
        self.require_content()?;
        match self.state {
            PlaybackState::Playing => Ok(()),
            _ => {
                self.state = PlaybackState::Playing;
                self.enter_current(now);
                self.emit_status();
                Ok(())
            }
        }
    }

    pub fn pause(&mut self) -> Result<(), CommandError> {
        self.require_content()?;
        if self.state == PlaybackState::Playing {
            self.cancel_timer();
            self.state = PlaybackState::Paused;
            self.emit_status();
        }
        Ok(())
    }

    pub fn stop(&mut self, now: Instant) -> Result<(), CommandError> {
        self.require_content()?;
        self.cancel_timer();
        let moved = self.index != 0;
        self.index = 0;
        self.state = PlaybackState::Stopped;
        self.item_started = Some(now);
        self.emit_status();
        if moved {
            self.emit_preload();
        }
        Ok(())
    }

    pub fn restart(&mut self, now: Instant) -> Result<(), CommandError> {
        self.require_content()?;
        self.index = 0;
        self.state = PlaybackState::Playing;
        self.enter_current(now);
        self.emit_status();
        self.emit_preload();
        Ok(())
    }

    pub fn next(&mut self, now: Instant) -> Result<(), CommandError> {
        let len = self.require_content()?;
        self.move_to((self.index + 1) % len, Leave::Skipped, now);
        Ok(())
    }

    pub fn previous(&mut self, now: Instant) -> Result<(), CommandError> {
        let len = self.require_content()?;
        self.move_to((self.index + len - 1) % len, Leave::Skipped, now);
        Ok(())
    }

    /// Jump to `index`. Out-of-range requests change nothing.
    pub fn seek(&mut self, index: usize, now: Instant) -> Result<(), CommandError> {
        let len = self.require_content()?;
        if index >= len {
            return Err(CommandError::OutOfRange { index, len });
        }
        self.move_to(index, Leave::Skipped, now);
        Ok(())
    }

    /// Dwell timer expiry. Returns whether the token was current.
    pub fn advance(&mut self, token: u64, now: Instant) -> bool {
        match self.timer {
            Some(timer) if timer.token == token && self.state == PlaybackState::Playing => {
                let len = self.item_count();
                self.move_to((self.index + 1) % len, Leave::Completed, now);
                true
            }
            _ => {
                trace!("Ignoring stale dwell timer {}", token);
                false
            }
        }
    }

    /// Force `Paused` at the current index, whatever the state
    pub fn emergency_stop(&mut self) {
        if self.state == PlaybackState::Idle {
            return;
        }
        self.cancel_timer();
        self.state = PlaybackState::Paused;
        self.emit_status();
    }

    fn item_count(&self) -> usize {
        self.playlist.as_ref().map_or(0, Playlist::len)
    }

    fn require_content(&self) -> Result<usize, CommandError> {
        match self.item_count() {
            0 => Err(CommandError::NoContent),
            len => Ok(len),
        }
    }

    fn move_to(&mut self, index: usize, leave: Leave, now: Instant) {
        self.record_view(leave, now);
        self.index = index;
        self.enter_current(now);
        self.emit_status();
        self.emit_preload();
    }

    /// Start the dwell for the current item, arming a timer when playing
    fn enter_current(&mut self, now: Instant) {
        self.cancel_timer();
        self.item_started = Some(now);

        if self.state != PlaybackState::Playing || self.item_count() < 2 {
            return;
        }
        let Some(item) = self.current_item() else {
            return;
        };

        let dwell = Duration::from_secs(u64::from(item.duration));
        self.generation += 1;
        self.timer = Some(DwellTimer {
            token: self.generation,
            deadline: now + dwell,
        });
        trace!("Armed dwell timer {} for {:?}", self.generation, dwell);
    }

    fn cancel_timer(&mut self) {
        self.timer = None;
    }

    fn record_view(&mut self, leave: Leave, now: Instant) {
        let (Some(playlist), Some(started)) = (self.playlist.as_ref(), self.item_started) else {
            return;
        };
        let Some(item) = playlist.item(self.index) else {
            return;
        };

        let record = ViewRecord {
            display_id: self.display_id.clone(),
            playlist_id: playlist.id.clone(),
            content_id: item.content.id.clone(),
            observed_duration: now.saturating_duration_since(started).as_secs_f64(),
            expected_duration: f64::from(item.duration),
            completed: leave == Leave::Completed,
            skipped: leave == Leave::Skipped,
        };
        self.outbox.push(SchedulerOutput::View(record));
    }

    fn emit_status(&mut self) {
        let status = self.status();
        debug!("Playback {:?} at {}", status.state, status.index);
        self.outbox.push(SchedulerOutput::Status(status));
    }

    fn emit_preload(&mut self) {
        let Some(playlist) = self.playlist.as_ref() else {
            return;
        };
        let len = playlist.len();
        let count = self.preload_count.min(len.saturating_sub(1));
        if count == 0 {
            return;
        }

        let upcoming = (1..=count)
            .filter_map(|offset| playlist.item((self.index + offset) % len))
            .map(|item| item.content.clone())
            .collect();
        self.outbox.push(SchedulerOutput::Preload(upcoming));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signage_model::ContentRef;

    fn playlist(durations: &[u32]) -> Playlist {
        let items = durations
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                PlaylistItem::new(format!("i{i}"), ContentRef::image(format!("c{i}"), format!("{i}.png")), d)
                    .with_position(i as u32)
            })
            .collect();
        Playlist::new("p1", items)
    }

    fn scheduler() -> Scheduler {
        Scheduler::new(DisplayId::new("d1"), 2, true)
    }

    fn statuses(outputs: &[SchedulerOutput]) -> Vec<StatusReport> {
        outputs
            .iter()
            .filter_map(|o| match o {
                SchedulerOutput::Status(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    fn views(outputs: &[SchedulerOutput]) -> Vec<ViewRecord> {
        outputs
            .iter()
            .filter_map(|o| match o {
                SchedulerOutput::View(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_apply_starts_playing_at_zero() {
        let now = Instant::now();
        let mut s = scheduler();
        s.apply_playlist(Some(playlist(&[5, 5, 5])), now);

        assert_eq!(s.state(), PlaybackState::Playing);
        assert_eq!(s.index(), 0);
        assert_eq!(s.deadline(), Some(now + Duration::from_secs(5)));

        let out = s.drain();
        assert_eq!(
            statuses(&out),
            vec![StatusReport {
                state: PlaybackState::Playing,
                index: 0
            }]
        );
        let preload = out.iter().find_map(|o| match o {
            SchedulerOutput::Preload(p) => Some(p.clone()),
            _ => None,
        });
        let ids: Vec<_> = preload.unwrap().iter().map(|c| c.id.to_string()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
    }

    #[test]
    fn test_apply_without_autoplay_pauses() {
        let mut s = Scheduler::new(DisplayId::new("d1"), 2, false);
        s.apply_playlist(Some(playlist(&[5, 5])), Instant::now());
        assert_eq!(s.state(), PlaybackState::Paused);
        assert!(s.timer().is_none());
    }

    #[test]
    fn test_apply_none_or_empty_is_idle() {
        let now = Instant::now();
        let mut s = scheduler();
        s.apply_playlist(Some(playlist(&[5, 5])), now);
        s.apply_playlist(None, now);
        assert_eq!(s.state(), PlaybackState::Idle);
        assert!(s.timer().is_none());
        assert!(s.current_item().is_none());

        s.apply_playlist(Some(playlist(&[])), now);
        assert_eq!(s.state(), PlaybackState::Idle);
        assert_eq!(s.next(now), Err(CommandError::NoContent));
    }

    #[test]
    fn test_single_item_never_arms() {
        let now = Instant::now();
        let mut s = scheduler();
        s.apply_playlist(Some(playlist(&[3])), now);
        assert_eq!(s.state(), PlaybackState::Playing);
        assert!(s.timer().is_none());

        s.next(now).unwrap();
        s.restart(now).unwrap();
        s.play(now).unwrap();
        assert!(s.timer().is_none());
        assert_eq!(s.index(), 0);
    }

    #[test]
    fn test_wraparound() {
        let now = Instant::now();
        let mut s = scheduler();
        s.apply_playlist(Some(playlist(&[5, 5, 5])), now);

        s.seek(2, now).unwrap();
        s.next(now).unwrap();
        assert_eq!(s.index(), 0);

        s.previous(now).unwrap();
        assert_eq!(s.index(), 2);
    }

    #[test]
    fn test_neighbours() {
        let mut s = scheduler();
        s.apply_playlist(Some(playlist(&[5, 5, 5])), Instant::now());
        assert_eq!(s.previous_item().map(|i| i.id.as_str()), Some("i2"));
        assert_eq!(s.next_item().map(|i| i.id.as_str()), Some("i1"));
    }

    #[test]
    fn test_seek_out_of_range_ignored() {
        let now = Instant::now();
        let mut s = scheduler();
        s.apply_playlist(Some(playlist(&[5, 5, 5])), now);
        s.next(now).unwrap();
        let timer = s.timer();
        s.drain();

        assert_eq!(s.seek(3, now), Err(CommandError::OutOfRange { index: 3, len: 3 }));
        assert_eq!(s.index(), 1);
        assert_eq!(s.timer(), timer);
        assert!(s.drain().is_empty());
    }

    #[test]
    fn test_advance_records_completion() {
        let start = Instant::now();
        let mut s = scheduler();
        s.apply_playlist(Some(playlist(&[4, 6])), start);
        s.drain();

        let timer = s.timer().unwrap();
        let fired = timer.deadline;
        assert!(s.advance(timer.token, fired));
        assert_eq!(s.index(), 1);
        assert_eq!(s.deadline(), Some(fired + Duration::from_secs(6)));

        let out = s.drain();
        let view = &views(&out)[0];
        assert!(view.completed);
        assert!(!view.skipped);
        assert_eq!(view.content_id.as_str(), "c0");
        assert_eq!(view.observed_duration, 4.0);
        assert_eq!(view.expected_duration, 4.0);
    }

    #[test]
    fn test_next_records_skip() {
        let start = Instant::now();
        let mut s = scheduler();
        s.apply_playlist(Some(playlist(&[10, 10])), start);
        s.drain();

        s.next(start + Duration::from_secs(3)).unwrap();
        let view = &views(&s.drain())[0];
        assert!(view.skipped);
        assert!(!view.completed);
        assert_eq!(view.observed_duration, 3.0);
    }

    #[test]
    fn test_stale_token_ignored() {
        let now = Instant::now();
        let mut s = scheduler();
        s.apply_playlist(Some(playlist(&[5, 5, 5])), now);
        let stale = s.timer().unwrap().token;

        s.seek(2, now + Duration::from_secs(1)).unwrap();
        assert!(!s.advance(stale, now + Duration::from_secs(5)));
        assert_eq!(s.index(), 2);
    }

    #[test]
    fn test_pause_play_stop_restart() {
        let now = Instant::now();
        let mut s = scheduler();
        s.apply_playlist(Some(playlist(&[5, 5, 5])), now);
        s.next(now).unwrap();
        s.drain();

        s.pause().unwrap();
        assert_eq!(s.state(), PlaybackState::Paused);
        assert!(s.timer().is_none());

        s.pause().unwrap();
        s.play(now).unwrap();
        assert_eq!(s.state(), PlaybackState::Playing);
        assert!(s.timer().is_some());
        s.play(now).unwrap();

        assert_eq!(
            statuses(&s.drain()),
            vec![
                StatusReport { state: PlaybackState::Paused, index: 1 },
                StatusReport { state: PlaybackState::Playing, index: 1 },
            ]
        );

        s.stop(now).unwrap();
        assert_eq!((s.state(), s.index()), (PlaybackState::Stopped, 0));
        assert!(s.timer().is_none());

        s.next(now).unwrap();
        assert_eq!(s.index(), 1);
        assert!(s.timer().is_none());

        s.restart(now).unwrap();
        assert_eq!((s.state(), s.index()), (PlaybackState::Playing, 0));
        assert!(s.timer().is_some());
    }

    #[test]
    fn test_emergency_stop_keeps_index() {
        let now = Instant::now();
        let mut s = scheduler();
        s.apply_playlist(Some(playlist(&[5, 5, 5])), now);
        s.next(now).unwrap();

        s.emergency_stop();
        assert_eq!((s.state(), s.index()), (PlaybackState::Paused, 1));
        assert!(s.timer().is_none());

        let mut idle = scheduler();
        idle.emergency_stop();
        assert_eq!(idle.state(), PlaybackState::Idle);
        assert!(idle.drain().is_empty());
    }

    #[test]
    fn test_patch_keeps_position() {
        let now = Instant::now();
        let mut s = scheduler();
        s.apply_playlist(Some(playlist(&[5, 5, 5])), now);
        s.next(now).unwrap();
        let timer = s.timer();
        s.drain();

        let mut patched = playlist(&[5, 5, 5]);
        patched.items[2].content = ContentRef::image("c-new", "new.png");
        s.patch_items(patched.clone(), now + Duration::from_secs(2));

        assert_eq!(s.index(), 1);
        assert_eq!(s.timer(), timer);
        assert_eq!(s.playlist(), Some(&patched));
        assert!(statuses(&s.drain()).is_empty());

        let mut current_changed = patched.clone();
        current_changed.items[1].duration = 20;
        let later = now + Duration::from_secs(3);
        s.patch_items(current_changed, later);
        assert_eq!(s.index(), 1);
        assert_eq!(s.deadline(), Some(later + Duration::from_secs(20)));
    }

    #[test]
    fn test_preload_limited_by_policy_and_length() {
        let now = Instant::now();
        let mut s = Scheduler::new(DisplayId::new("d1"), 1, true);
        s.apply_playlist(Some(playlist(&[5, 5, 5])), now);
        let out = s.drain();
        assert!(out.contains(&SchedulerOutput::Preload(vec![ContentRef::image("c1", "1.png")])));

        let mut s = scheduler();
        s.apply_playlist(Some(playlist(&[5, 5])), now);
        s.seek(1, now).unwrap();
        let out = s.drain();
        assert!(out.contains(&SchedulerOutput::Preload(vec![ContentRef::image("c0", "0.png")])));
    }
}
