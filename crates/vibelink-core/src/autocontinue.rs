//! Auto-continue triggering.
//!
//! Watches each queue poll cycle for depletion (nothing left queued by this
//! client while a non-auto track is playing) and fires exactly one
//! recommendation request per depletion event.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::enqueue::{EnqueueCoordinator, PromptTag, TrackRequest};
use crate::events::EventBus;
use crate::provenance::ProvenanceStore;
use crate::recommender::{RecommendError, RecommendRequest, Recommender};
use crate::snapshot::SnapshotStore;

/// Prompt text sent when continuing an exhausted queue.
const CONTINUE_PROMPT: &str =
    "Continue the vibe: queue more tracks in the same style as what's playing.";

/// Saved-track page used as listening context for continue requests.
const RECENT_TRACK_LIMIT: u32 = 20;

/// Observed state feeding one trigger evaluation.
#[derive(Clone, Debug, Default)]
pub struct TriggerInputs {
    /// Auto-mode toggle.
    pub auto_mode: bool,
    /// `true` while the service reports active playback.
    pub is_playing: bool,
    /// Identifier of the currently-playing track.
    pub playing_id: Option<String>,
    /// Prompt summary and auto-generated flag of the playing track's
    /// provenance, when one exists.
    pub playing_prompt: Option<(String, bool)>,
    /// Length of the client-managed queue, optimistic entries included.
    pub queue_len: usize,
}

/// Decision to emit one continue request for a depletion event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContinueRequest {
    /// Depletion-event marker (the playing track's identifier).
    pub marker: String,
    /// Prompt summary the playing track originated from.
    pub prompt_summary: String,
}

#[derive(Debug)]
enum Phase {
    Idle,
    Armed { marker: String, since: Instant },
    Fired { marker: String },
}

/// Single-fire state machine over depletion events.
///
/// The marker is the playing track's identifier, not the prompt summary, so
/// a legitimate repeat of the same prompt re-arms once the track changes.
pub struct AutoContinueTrigger {
    phase: Phase,
    settle: Duration,
}

impl AutoContinueTrigger {
    pub fn new(settle: Duration) -> Self {
        Self {
            phase: Phase::Idle,
            settle,
        }
    }

    /// Evaluate one cycle's inputs; returns a request exactly once per
    /// depletion event, and only after the settle delay has elapsed with the
    /// conditions still holding.
    pub fn observe(&mut self, inputs: &TriggerInputs, now: Instant) -> Option<ContinueRequest> {
        // The marker resets naturally when the playing track changes.
        match &self.phase {
            Phase::Armed { marker, .. } | Phase::Fired { marker }
                if inputs.playing_id.as_deref() != Some(marker.as_str()) =>
            {
                self.phase = Phase::Idle;
            }
            _ => {}
        }

        let Some((marker, summary)) = eligible(inputs) else {
            if matches!(self.phase, Phase::Armed { .. }) {
                self.phase = Phase::Idle;
            }
            return None;
        };

        match &self.phase {
            Phase::Fired { .. } => None,
            Phase::Idle => {
                tracing::debug!(marker = %marker, "auto-continue armed");
                self.phase = Phase::Armed { marker, since: now };
                None
            }
            Phase::Armed { since, .. } => {
                if now.duration_since(*since) < self.settle {
                    return None;
                }
                tracing::info!(marker = %marker, prompt = %summary, "auto-continue firing");
                self.phase = Phase::Fired {
                    marker: marker.clone(),
                };
                Some(ContinueRequest {
                    marker,
                    prompt_summary: summary,
                })
            }
        }
    }
}

/// Pure fire-condition check: auto-mode on, something playing, the playing
/// track traced to a non-auto prompt, and the client queue empty.
fn eligible(inputs: &TriggerInputs) -> Option<(String, String)> {
    if !inputs.auto_mode || !inputs.is_playing || inputs.queue_len > 0 {
        return None;
    }
    let marker = inputs.playing_id.clone()?;
    let (summary, auto_generated) = inputs.playing_prompt.clone()?;
    if auto_generated {
        return None;
    }
    Some((marker, summary))
}

/// Wires the trigger to the recommender and enqueue coordinator.
pub struct AutoContinueDriver {
    trigger: Mutex<AutoContinueTrigger>,
    enabled: AtomicBool,
    snapshot: SnapshotStore,
    provenance: ProvenanceStore,
    coordinator: EnqueueCoordinator,
    recommender: Arc<dyn Recommender + Send + Sync>,
    events: EventBus,
    model: Option<String>,
}

impl AutoContinueDriver {
    pub fn new(
        settle: Duration,
        snapshot: SnapshotStore,
        provenance: ProvenanceStore,
        coordinator: EnqueueCoordinator,
        recommender: Arc<dyn Recommender + Send + Sync>,
        events: EventBus,
        model: Option<String>,
    ) -> Self {
        Self {
            trigger: Mutex::new(AutoContinueTrigger::new(settle)),
            enabled: AtomicBool::new(false),
            snapshot,
            provenance,
            coordinator,
            recommender,
            events,
            model,
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Evaluate the trigger against the current view; called once per queue
    /// poll cycle. A firing decision is executed off the poll thread.
    pub fn observe(self: &Arc<Self>) {
        let decision = {
            let inputs = self.gather_inputs();
            let Ok(mut trigger) = self.trigger.lock() else {
                return;
            };
            trigger.observe(&inputs, Instant::now())
        };
        if let Some(request) = decision {
            self.events.auto_continue_fired();
            let driver = Arc::clone(self);
            std::thread::spawn(move || driver.run_continue(request));
        }
    }

    fn gather_inputs(&self) -> TriggerInputs {
        let view = self.snapshot.view();
        let playing_id = view.currently_playing.as_ref().map(|t| t.id.clone());
        let playing_prompt = playing_id.as_deref().and_then(|id| {
            self.provenance
                .get(id)
                .map(|entry| (entry.prompt_summary, entry.auto_generated))
        });
        TriggerInputs {
            auto_mode: self.is_enabled(),
            is_playing: view.is_playing,
            playing_id,
            playing_prompt,
            queue_len: view.queue.len(),
        }
    }

    /// Fetch recommendations for the depleted queue and enqueue them.
    fn run_continue(&self, request: ContinueRequest) {
        let view = self.snapshot.view();
        let context_tracks: Vec<String> = view
            .currently_playing
            .iter()
            .map(|t| format!("{} - {}", t.artist, t.name))
            .collect();
        let recent_tracks = match self.coordinator.service().get_liked_tracks(RECENT_TRACK_LIMIT, 0)
        {
            Ok(tracks) => tracks
                .iter()
                .map(|t| format!("{} - {}", t.artist, t.name))
                .collect(),
            Err(err) => {
                tracing::debug!(error = %err, "liked tracks unavailable for continue context");
                Vec::new()
            }
        };

        let response = self.recommender.recommend(&RecommendRequest {
            prompt: CONTINUE_PROMPT.to_string(),
            history: vec![request.prompt_summary.clone()],
            recent_tracks,
            context_tracks,
            model: self.model.clone(),
        });
        let response = match response {
            Ok(response) => response,
            Err(err @ (RecommendError::QuotaExceeded | RecommendError::TierRequired)) => {
                tracing::warn!(error = %err, "auto-continue rejected by recommendation service");
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "auto-continue recommendation failed");
                return;
            }
        };

        let requests: Vec<TrackRequest> = response
            .recommendations
            .iter()
            .map(|rec| TrackRequest {
                artist: rec.artist.clone(),
                title: rec.title.clone(),
            })
            .collect();
        if requests.is_empty() {
            tracing::debug!("auto-continue got no recommendations");
            return;
        }

        let summary = response
            .prompt_summary
            .unwrap_or_else(|| request.prompt_summary.clone());
        let report = self.coordinator.enqueue(&requests, &PromptTag::auto(&summary));
        tracing::info!(
            marker = %request.marker,
            succeeded = report.succeeded,
            failed = report.failed,
            "auto-continue enqueue complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use vibelink_types::{Recommendation, RecommendationResponse, RemotePlaybackState, RemoteQueue};

    use crate::membership::QueueMembershipTracker;
    use crate::testutil::{FakeService, track};

    fn inputs() -> TriggerInputs {
        TriggerInputs {
            auto_mode: true,
            is_playing: true,
            playing_id: Some("playing".to_string()),
            playing_prompt: Some(("chill vibes".to_string(), false)),
            queue_len: 0,
        }
    }

    #[test]
    fn fires_once_per_depletion_event() {
        let mut trigger = AutoContinueTrigger::new(Duration::from_secs(2));
        let t0 = Instant::now();

        assert!(trigger.observe(&inputs(), t0).is_none()); // arms
        assert!(trigger.observe(&inputs(), t0 + Duration::from_secs(1)).is_none());
        let fired = trigger
            .observe(&inputs(), t0 + Duration::from_secs(2))
            .unwrap();
        assert_eq!(fired.marker, "playing");
        assert_eq!(fired.prompt_summary, "chill vibes");

        // Repeated polls within the same event stay quiet.
        for extra in 3..10 {
            assert!(
                trigger
                    .observe(&inputs(), t0 + Duration::from_secs(extra))
                    .is_none()
            );
        }
    }

    #[test]
    fn marker_resets_when_playing_track_changes() {
        let mut trigger = AutoContinueTrigger::new(Duration::ZERO);
        let t0 = Instant::now();
        trigger.observe(&inputs(), t0);
        assert!(trigger.observe(&inputs(), t0).is_some());

        let mut next = inputs();
        next.playing_id = Some("other".to_string());
        trigger.observe(&next, t0); // re-arms for the new event
        assert!(trigger.observe(&next, t0).is_some());
    }

    #[test]
    fn auto_generated_provenance_never_triggers() {
        let mut trigger = AutoContinueTrigger::new(Duration::ZERO);
        let mut auto_inputs = inputs();
        auto_inputs.playing_prompt = Some(("continue the vibe".to_string(), true));

        let t0 = Instant::now();
        assert!(trigger.observe(&auto_inputs, t0).is_none());
        assert!(trigger.observe(&auto_inputs, t0).is_none());
    }

    #[test]
    fn refilled_queue_disarms_before_firing() {
        let mut trigger = AutoContinueTrigger::new(Duration::from_secs(2));
        let t0 = Instant::now();
        trigger.observe(&inputs(), t0); // arms

        let mut refilled = inputs();
        refilled.queue_len = 3;
        assert!(
            trigger
                .observe(&refilled, t0 + Duration::from_secs(5))
                .is_none()
        );
        // Depletes again: must re-arm, not fire immediately.
        assert!(
            trigger
                .observe(&inputs(), t0 + Duration::from_secs(6))
                .is_none()
        );
        assert!(
            trigger
                .observe(&inputs(), t0 + Duration::from_secs(8))
                .is_some()
        );
    }

    #[test]
    fn missing_provenance_or_paused_playback_is_ineligible() {
        let mut no_prompt = inputs();
        no_prompt.playing_prompt = None;
        assert!(eligible(&no_prompt).is_none());

        let mut paused = inputs();
        paused.is_playing = false;
        assert!(eligible(&paused).is_none());

        let mut disabled = inputs();
        disabled.auto_mode = false;
        assert!(eligible(&disabled).is_none());
    }

    struct CannedRecommender {
        response: RecommendationResponse,
    }

    impl Recommender for CannedRecommender {
        fn recommend(
            &self,
            _request: &RecommendRequest,
        ) -> Result<RecommendationResponse, RecommendError> {
            Ok(self.response.clone())
        }
    }

    #[test]
    fn driver_fires_and_enqueues_auto_tagged_tracks() {
        let service = Arc::new(FakeService::with_catalog(vec![track(
            "rec1", "Bonobo", "Kerala",
        )]));
        service.set_queue(RemoteQueue {
            currently_playing: Some(track("playing", "A", "Origin")),
            queue: vec![],
        });
        service.set_playback(RemotePlaybackState {
            is_playing: true,
            progress_ms: Some(1),
            item: Some(track("playing", "A", "Origin")),
        });

        let events = EventBus::new();
        let snapshot = SnapshotStore::new(events.clone());
        let provenance = ProvenanceStore::new(Duration::from_secs(3600));
        let membership = QueueMembershipTracker::new(Duration::from_secs(3600));
        let coordinator = EnqueueCoordinator::new(
            service.clone(),
            snapshot.clone(),
            provenance.clone(),
            membership.clone(),
            Duration::from_secs(3600),
        );
        let recommender = Arc::new(CannedRecommender {
            response: RecommendationResponse {
                recommendations: vec![Recommendation {
                    artist: "Bonobo".to_string(),
                    title: "Kerala".to_string(),
                    reason: None,
                }],
                message: None,
                prompt_summary: Some("more downtempo".to_string()),
            },
        });
        let driver = Arc::new(AutoContinueDriver::new(
            Duration::ZERO,
            snapshot.clone(),
            provenance.clone(),
            coordinator,
            recommender,
            events,
            None,
        ));
        driver.set_enabled(true);

        // Seed the view the way a poll cycle would: playing, empty queue.
        snapshot.apply_queue_poll(Some(track("playing", "A", "Origin")), vec![]);
        snapshot.apply_playback_poll(RemotePlaybackState {
            is_playing: true,
            progress_ms: Some(1),
            item: None,
        });
        provenance.assign("playing", "p1", "chill vibes", false);

        driver.observe(); // arms
        driver.observe(); // fires; continue runs on a spawned thread

        for _ in 0..200 {
            if !service.enqueued.lock().unwrap().is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(service.enqueued.lock().unwrap().as_slice(), ["rec1"]);
        let entry = provenance.get("rec1").unwrap();
        assert!(entry.auto_generated);
        assert_eq!(entry.prompt_summary, "more downtempo");
    }
}
