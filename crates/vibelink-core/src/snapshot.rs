//! Shared playback snapshot store.
//!
//! Holds the authoritative polled state plus optimistic overlays, and merges
//! them into the view consumers render. The poller replaces the baseline
//! wholesale; overlays are owned by the mutation coordinator (placeholder
//! groups) and the skip orchestrator (playing override) and never persist
//! into the next poll's baseline.

use std::sync::{Arc, Mutex};

use vibelink_types::{AnnotatedTrack, PlaybackView, RemotePlaybackState, TrackRef};

use crate::events::EventBus;

/// Placeholder overlay entry tagged with its operation's group id.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Placeholder {
    group_id: String,
    entry: AnnotatedTrack,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct ViewState {
    currently_playing: Option<TrackRef>,
    progress_ms: Option<u64>,
    is_playing: bool,
    queue: Vec<AnnotatedTrack>,
    placeholders: Vec<Placeholder>,
    playing_override: Option<TrackRef>,
}

/// Opaque rollback capture of the cached view.
pub struct ViewCapture {
    state: ViewState,
}

/// Cached playback view shared by the poller and mutation paths.
#[derive(Clone)]
pub struct SnapshotStore {
    inner: Arc<Mutex<ViewState>>,
    events: EventBus,
}

impl SnapshotStore {
    pub fn new(events: EventBus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ViewState::default())),
            events,
        }
    }

    /// Merged view for rendering: baseline plus optimistic overlays.
    pub fn view(&self) -> PlaybackView {
        let state = match self.inner.lock() {
            Ok(state) => state,
            Err(_) => return PlaybackView::default(),
        };
        merge(&state)
    }

    /// Identifier of the track consumers currently see as playing.
    pub fn playing_track_id(&self) -> Option<String> {
        let state = self.inner.lock().ok()?;
        state
            .playing_override
            .as_ref()
            .or(state.currently_playing.as_ref())
            .map(|track| track.id.clone())
    }

    /// Replace the authoritative queue baseline from a poll cycle.
    ///
    /// Clears any skip override: the fresh baseline supersedes it.
    pub fn apply_queue_poll(
        &self,
        currently_playing: Option<TrackRef>,
        queue: Vec<AnnotatedTrack>,
    ) {
        let changed = {
            let Ok(mut state) = self.inner.lock() else {
                return;
            };
            let before = merge(&state);
            state.currently_playing = currently_playing;
            state.queue = queue;
            state.playing_override = None;
            before != merge(&state)
        };
        if changed {
            self.events.queue_changed();
        }
    }

    /// Replace the playback transport baseline from a poll cycle.
    pub fn apply_playback_poll(&self, playback: RemotePlaybackState) {
        let changed = {
            let Ok(mut state) = self.inner.lock() else {
                return;
            };
            let before = merge(&state);
            state.is_playing = playback.is_playing;
            state.progress_ms = playback.progress_ms;
            if let Some(item) = playback.item {
                state.currently_playing = Some(item);
            }
            before != merge(&state)
        };
        if changed {
            self.events.status_changed();
        }
    }

    /// Splice a group of optimistic placeholders onto the end of the queue.
    pub fn push_placeholders(&self, group_id: &str, entries: Vec<AnnotatedTrack>) {
        if let Ok(mut state) = self.inner.lock() {
            state
                .placeholders
                .extend(entries.into_iter().map(|entry| Placeholder {
                    group_id: group_id.to_string(),
                    entry,
                }));
        }
        self.events.queue_changed();
    }

    /// Remove all placeholders belonging to one operation's group.
    pub fn retract_group(&self, group_id: &str) -> bool {
        let removed = {
            let Ok(mut state) = self.inner.lock() else {
                return false;
            };
            let before = state.placeholders.len();
            state.placeholders.retain(|p| p.group_id != group_id);
            before != state.placeholders.len()
        };
        if removed {
            self.events.queue_changed();
        }
        removed
    }

    /// Count of placeholders still present for a group.
    pub fn group_len(&self, group_id: &str) -> usize {
        self.inner
            .lock()
            .map(|state| {
                state
                    .placeholders
                    .iter()
                    .filter(|p| p.group_id == group_id)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Optimistically present a track as playing and drop it from the queue.
    ///
    /// Used by the skip orchestrator while polls are suspended.
    pub fn apply_skip_target(&self, target: TrackRef) {
        if let Ok(mut state) = self.inner.lock() {
            state.queue.retain(|entry| entry.track.id != target.id);
            state.playing_override = Some(target);
        }
        self.events.queue_changed();
        self.events.status_changed();
    }

    /// Capture the full cached view for rollback.
    pub fn capture(&self) -> ViewCapture {
        ViewCapture {
            state: self
                .inner
                .lock()
                .map(|state| state.clone())
                .unwrap_or_default(),
        }
    }

    /// Restore a previously-captured view.
    pub fn restore(&self, capture: ViewCapture) {
        if let Ok(mut state) = self.inner.lock() {
            *state = capture.state;
        }
        self.events.queue_changed();
        self.events.status_changed();
    }
}

fn merge(state: &ViewState) -> PlaybackView {
    let mut queue = state.queue.clone();
    queue.extend(state.placeholders.iter().map(|p| p.entry.clone()));
    PlaybackView {
        currently_playing: state
            .playing_override
            .clone()
            .or_else(|| state.currently_playing.clone()),
        progress_ms: state.progress_ms,
        is_playing: state.is_playing,
        queue,
    }
}
