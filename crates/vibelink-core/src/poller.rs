//! Remote queue and playback polling.
//!
//! Two background loops keep the cached snapshot current at adaptive
//! intervals, filtered to the tracks this client is responsible for and
//! annotated with provenance. Both loops suspend entirely while a disruptive
//! operation holds the poll-suspend flag.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use vibelink_types::AnnotatedTrack;

use crate::events::EventBus;
use crate::membership::QueueMembershipTracker;
use crate::playback_service::{PlaybackService, PlaybackServiceError};
use crate::provenance::ProvenanceStore;
use crate::snapshot::SnapshotStore;

/// Tick used while polling is suspended or halted.
const SUSPENDED_TICK: Duration = Duration::from_millis(250);

/// Wake signal for the poll loops.
///
/// Lets resume/refresh cut a sleeping loop's interval short instead of
/// waiting out the full adaptive delay.
pub(crate) struct PollWake {
    seq: Mutex<u64>,
    cvar: Condvar,
}

impl PollWake {
    fn new() -> Self {
        Self {
            seq: Mutex::new(0),
            cvar: Condvar::new(),
        }
    }

    fn notify(&self) {
        let mut seq = self.seq.lock().expect("poll wake lock");
        *seq = seq.wrapping_add(1);
        self.cvar.notify_all();
    }

    fn wait_timeout(&self, last_seen: &mut u64, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        let mut seq = self.seq.lock().expect("poll wake lock");
        while *seq == *last_seen {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, result) = self
                .cvar
                .wait_timeout(seq, deadline - now)
                .expect("poll wake wait");
            seq = guard;
            if result.timed_out() {
                break;
            }
        }
        *last_seen = *seq;
    }
}

/// Shared polling control flags.
///
/// The suspend flag is the coarse mutual-exclusion mechanism that keeps the
/// poller from fetching mid-skip; the halt flag parks polling after a
/// credential rejection until re-authentication completes.
#[derive(Clone)]
pub struct PollControl {
    suspended: Arc<AtomicBool>,
    halted: Arc<AtomicBool>,
    wake: Arc<PollWake>,
}

impl PollControl {
    pub fn new() -> Self {
        Self {
            suspended: Arc::new(AtomicBool::new(false)),
            halted: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(PollWake::new()),
        }
    }

    /// Suspend both poll loops; consumers keep the cached snapshot.
    pub fn suspend(&self) {
        self.suspended.store(true, Ordering::Relaxed);
    }

    /// Resume polling and wake sleeping loops.
    pub fn resume(&self) {
        self.suspended.store(false, Ordering::Relaxed);
        self.wake.notify();
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Relaxed)
    }

    /// Park polling after a credential rejection.
    pub fn halt(&self) {
        self.halted.store(true, Ordering::Relaxed);
    }

    /// Restart polling once the auth collaborator has a fresh credential.
    pub fn resume_after_reauth(&self) {
        self.halted.store(false, Ordering::Relaxed);
        self.wake.notify();
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Relaxed)
    }

    /// Ask sleeping loops to poll again immediately.
    pub fn request_refresh(&self) {
        self.wake.notify();
    }
}

impl Default for PollControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls the remote service and publishes filtered, annotated snapshots.
pub struct Poller {
    service: Arc<dyn PlaybackService + Send + Sync>,
    snapshot: SnapshotStore,
    provenance: ProvenanceStore,
    membership: QueueMembershipTracker,
    events: EventBus,
    control: PollControl,
    queue_poll_playing: Duration,
    queue_poll_idle: Duration,
    playback_poll_playing: Duration,
    playback_poll_idle: Duration,
    last_playing: Mutex<Option<String>>,
}

impl Poller {
    pub fn new(
        service: Arc<dyn PlaybackService + Send + Sync>,
        snapshot: SnapshotStore,
        provenance: ProvenanceStore,
        membership: QueueMembershipTracker,
        events: EventBus,
        control: PollControl,
        queue_poll_playing: Duration,
        queue_poll_idle: Duration,
        playback_poll_playing: Duration,
        playback_poll_idle: Duration,
    ) -> Self {
        Self {
            service,
            snapshot,
            provenance,
            membership,
            events,
            control,
            queue_poll_playing,
            queue_poll_idle,
            playback_poll_playing,
            playback_poll_idle,
            last_playing: Mutex::new(None),
        }
    }

    /// Shared polling control flags.
    pub fn control(&self) -> &PollControl {
        &self.control
    }

    /// Run one queue poll cycle; returns `false` when nothing was applied.
    ///
    /// A transient fetch error leaves the last good snapshot in place. A
    /// credential rejection halts polling and notifies subscribers.
    pub fn poll_queue_once(&self) -> bool {
        if self.control.is_suspended() || self.control.is_halted() {
            return false;
        }

        // Scheduled maintenance runs on the poll cycle, keeping reads pure.
        self.membership.purge_expired();
        self.provenance.purge_stale();

        let remote = match self.service.get_queue() {
            Ok(remote) => remote,
            Err(err) => {
                self.handle_poll_error("queue", err);
                return false;
            }
        };

        let playing_id = remote.currently_playing.as_ref().map(|t| t.id.clone());
        self.apply_lifecycle(&playing_id);

        let mut annotated = Vec::new();
        for track in remote.queue {
            if Some(&track.id) == playing_id.as_ref() {
                continue;
            }
            if !self.membership.is_member(&track.id) {
                continue;
            }
            let provenance = self.provenance.get(&track.id);
            annotated.push(AnnotatedTrack {
                prompt_summary: provenance.as_ref().map(|p| p.prompt_summary.clone()),
                prompt_id: provenance.as_ref().map(|p| p.prompt_id.clone()),
                track,
                optimistic: false,
            });
        }

        // Presence-based collection only runs while something is playing;
        // when playback stops entirely the staleness purge owns cleanup.
        if playing_id.is_some() {
            let live: HashSet<String> = annotated
                .iter()
                .map(|entry| entry.track.id.clone())
                .chain(playing_id.clone())
                .collect();
            self.provenance.retain_live(&live);
        }

        self.snapshot
            .apply_queue_poll(remote.currently_playing, annotated);
        true
    }

    /// Run one playback poll cycle; returns `false` when nothing was applied.
    pub fn poll_playback_once(&self) -> bool {
        if self.control.is_suspended() || self.control.is_halted() {
            return false;
        }
        match self.service.get_playback_state() {
            Ok(state) => {
                self.snapshot.apply_playback_poll(state);
                true
            }
            Err(err) => {
                self.handle_poll_error("playback", err);
                false
            }
        }
    }

    fn apply_lifecycle(&self, playing_id: &Option<String>) {
        if let Ok(mut last) = self.last_playing.lock() {
            if let Some(previous) = last.as_ref() {
                if Some(previous) != playing_id.as_ref() {
                    self.provenance.mark_ended(previous);
                }
            }
            *last = playing_id.clone();
        }
        if let Some(id) = playing_id {
            // The track graduated from queued to playing.
            self.provenance.mark_active(id);
            self.membership.forget(id);
        }
    }

    fn handle_poll_error(&self, which: &str, err: PlaybackServiceError) {
        match err {
            PlaybackServiceError::Transport(msg) => {
                tracing::debug!(poll = which, error = %msg, "poll failed; keeping last snapshot");
            }
            PlaybackServiceError::CredentialExpired => {
                tracing::warn!(poll = which, "service credential expired; polling halted");
                self.control.halt();
                self.events.auth_expired();
            }
        }
    }

    fn queue_interval(&self) -> Duration {
        if self.snapshot.view().is_playing {
            self.queue_poll_playing
        } else {
            self.queue_poll_idle
        }
    }

    fn playback_interval(&self) -> Duration {
        if self.snapshot.view().is_playing {
            self.playback_poll_playing
        } else {
            self.playback_poll_idle
        }
    }
}

/// Spawn the queue poll loop; `after_cycle` runs once per completed cycle.
pub fn spawn_queue_poll_loop<F>(poller: Arc<Poller>, after_cycle: F)
where
    F: Fn() + Send + 'static,
{
    std::thread::spawn(move || {
        let control = poller.control().clone();
        let mut wake_seq = 0u64;
        loop {
            if control.is_suspended() || control.is_halted() {
                control.wake.wait_timeout(&mut wake_seq, SUSPENDED_TICK);
                continue;
            }
            if poller.poll_queue_once() {
                after_cycle();
            }
            let interval = poller.queue_interval();
            control.wake.wait_timeout(&mut wake_seq, interval);
        }
    });
}

/// Spawn the playback poll loop.
pub fn spawn_playback_poll_loop(poller: Arc<Poller>) {
    std::thread::spawn(move || {
        let control = poller.control().clone();
        let mut wake_seq = 0u64;
        loop {
            if control.is_suspended() || control.is_halted() {
                control.wake.wait_timeout(&mut wake_seq, SUSPENDED_TICK);
                continue;
            }
            poller.poll_playback_once();
            let interval = poller.playback_interval();
            control.wake.wait_timeout(&mut wake_seq, interval);
        }
    });
}
