//! Optimistic enqueue coordination.
//!
//! Splices placeholder entries into the cached view immediately, performs the
//! real search + enqueue calls against the remote service, and reconciles or
//! rolls back the optimistic state afterwards.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;
use vibelink_types::{AnnotatedTrack, TrackRef};

use crate::membership::{MembershipInsert, QueueMembershipTracker};
use crate::playback_service::PlaybackService;
use crate::provenance::ProvenanceStore;
use crate::snapshot::SnapshotStore;
use crate::track_search::resolve_track;

/// Prefix marking locally-synthesized, non-authoritative identifiers.
pub const OPTIMISTIC_ID_PREFIX: &str = "optimistic:";

/// One requested track in an enqueue batch.
#[derive(Clone, Debug)]
pub struct TrackRequest {
    pub artist: String,
    pub title: String,
}

/// The prompt a batch of tracks is attributed to.
#[derive(Clone, Debug)]
pub struct PromptTag {
    /// Identifier of the originating prompt.
    pub prompt_id: String,
    /// Human-readable prompt summary.
    pub summary: String,
    /// `true` when synthesized by auto-continue.
    pub auto_generated: bool,
}

impl PromptTag {
    /// Tag for a direct user request.
    pub fn user(summary: &str) -> Self {
        Self {
            prompt_id: Uuid::new_v4().to_string(),
            summary: summary.to_string(),
            auto_generated: false,
        }
    }

    /// Tag for an auto-continue request.
    pub fn auto(summary: &str) -> Self {
        Self {
            prompt_id: Uuid::new_v4().to_string(),
            summary: summary.to_string(),
            auto_generated: true,
        }
    }
}

/// Per-track outcome of an enqueue batch.
#[derive(Clone, Debug)]
pub struct TrackOutcome {
    pub artist: String,
    pub title: String,
    pub success: bool,
    /// Matched catalog track on success.
    pub matched: Option<TrackRef>,
    /// Human-readable failure reason.
    pub error: Option<String>,
}

/// Batch result; partial success is expected and reported per track.
#[derive(Clone, Debug)]
pub struct EnqueueReport {
    /// Group id shared by this operation's placeholders.
    pub group_id: String,
    pub outcomes: Vec<TrackOutcome>,
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Coordinates optimistic queue mutations against the remote service.
#[derive(Clone)]
pub struct EnqueueCoordinator {
    service: Arc<dyn PlaybackService + Send + Sync>,
    snapshot: SnapshotStore,
    provenance: ProvenanceStore,
    membership: QueueMembershipTracker,
    settle_delay: Duration,
}

impl EnqueueCoordinator {
    pub fn new(
        service: Arc<dyn PlaybackService + Send + Sync>,
        snapshot: SnapshotStore,
        provenance: ProvenanceStore,
        membership: QueueMembershipTracker,
        settle_delay: Duration,
    ) -> Self {
        Self {
            service,
            snapshot,
            provenance,
            membership,
            settle_delay,
        }
    }

    /// Enqueue a batch of requested tracks attributed to one prompt.
    ///
    /// Placeholders become visible before any remote call is made. Each
    /// request resolves independently; the report carries per-track outcomes
    /// plus aggregate counts. A batch with zero successes rolls the
    /// optimistic state back immediately; otherwise the placeholders are
    /// stripped after the settle delay and the next poll cycle supplies the
    /// authoritative entries.
    pub fn enqueue(&self, requests: &[TrackRequest], prompt: &PromptTag) -> EnqueueReport {
        let group_id = Uuid::new_v4().to_string();
        self.snapshot
            .push_placeholders(&group_id, synthesize_placeholders(requests, prompt));

        self.ensure_playback_started();

        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            outcomes.push(self.enqueue_one(request, prompt));
        }

        let succeeded = outcomes.iter().filter(|o| o.success).count();
        let failed = outcomes.len() - succeeded;
        tracing::info!(
            requested = requests.len(),
            succeeded,
            failed,
            prompt = %prompt.summary,
            "enqueue batch complete"
        );

        if succeeded == 0 {
            // Nothing will ever confirm these placeholders.
            self.snapshot.retract_group(&group_id);
        } else {
            self.schedule_settle(&group_id);
        }

        EnqueueReport {
            group_id,
            requested: requests.len(),
            succeeded,
            failed,
            outcomes,
        }
    }

    fn enqueue_one(&self, request: &TrackRequest, prompt: &PromptTag) -> TrackOutcome {
        let found = match resolve_track(self.service.as_ref(), &request.artist, &request.title) {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(
                    artist = %request.artist,
                    title = %request.title,
                    error = %err,
                    "track search failed"
                );
                return failure(request, err.to_string());
            }
        };
        let Some(track) = found else {
            return failure(
                request,
                format!("Track not found: {} - {}", request.artist, request.title),
            );
        };

        if let Err(err) = self.service.enqueue(&track.id) {
            tracing::warn!(track_id = %track.id, error = %err, "remote enqueue failed");
            return failure(request, err.to_string());
        }

        self.provenance
            .assign(&track.id, &prompt.prompt_id, &prompt.summary, prompt.auto_generated);
        self.membership.record(vec![MembershipInsert {
            track_id: track.id.clone(),
            artist: track.artist.clone(),
            title: track.name.clone(),
            prompt_summary: Some(prompt.summary.clone()),
        }]);

        TrackOutcome {
            artist: request.artist.clone(),
            title: request.title.clone(),
            success: true,
            matched: Some(track),
            error: None,
        }
    }

    /// Start playback when nothing is playing, without blocking the batch.
    fn ensure_playback_started(&self) {
        let playing = match self.service.get_playback_state() {
            Ok(state) => state.is_playing,
            Err(err) => {
                tracing::debug!(error = %err, "playback state probe failed before enqueue");
                return;
            }
        };
        if playing {
            return;
        }
        let service = self.service.clone();
        std::thread::spawn(move || {
            if let Err(err) = service.start_playback() {
                tracing::warn!(error = %err, "start playback failed");
            }
        });
    }

    /// Strip this operation's placeholders once the settle delay elapses.
    fn schedule_settle(&self, group_id: &str) {
        let snapshot = self.snapshot.clone();
        let delay = self.settle_delay;
        let group = group_id.to_string();
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            if snapshot.retract_group(&group) {
                tracing::debug!(group_id = %group, "optimistic placeholders reconciled");
            }
        });
    }

    /// Synchronous settle, for callers that manage their own timing.
    pub fn settle_now(&self, group_id: &str) -> bool {
        self.snapshot.retract_group(group_id)
    }

    /// The remote service this coordinator mutates.
    pub fn service(&self) -> &Arc<dyn PlaybackService + Send + Sync> {
        &self.service
    }
}

fn synthesize_placeholders(requests: &[TrackRequest], prompt: &PromptTag) -> Vec<AnnotatedTrack> {
    requests
        .iter()
        .map(|request| AnnotatedTrack {
            track: TrackRef {
                id: format!("{OPTIMISTIC_ID_PREFIX}{}", Uuid::new_v4()),
                name: request.title.clone(),
                artist: request.artist.clone(),
                artwork_url: None,
                duration_ms: None,
            },
            prompt_summary: Some(prompt.summary.clone()),
            prompt_id: Some(prompt.prompt_id.clone()),
            optimistic: true,
        })
        .collect()
}

fn failure(request: &TrackRequest, error: String) -> TrackOutcome {
    TrackOutcome {
        artist: request.artist.clone(),
        title: request.title.clone(),
        success: false,
        matched: None,
        error: Some(error),
    }
}
