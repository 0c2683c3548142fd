//! Engine facade wiring the reconciliation components together.
//!
//! Owns the shared stores and exposes the operations the rest of the
//! application consumes: the merged view, enqueue, skip-to-track,
//! auto-continue, provenance lookup, and persistence.

use std::sync::Arc;

use anyhow::Result;
use vibelink_types::PlaybackView;

use crate::autocontinue::AutoContinueDriver;
use crate::config::EngineConfigResolved;
use crate::enqueue::{EnqueueCoordinator, EnqueueReport, PromptTag, TrackRequest};
use crate::events::EventBus;
use crate::membership::QueueMembershipTracker;
use crate::persistence::KvStore;
use crate::playback_service::PlaybackService;
use crate::poller::{PollControl, Poller, spawn_playback_poll_loop, spawn_queue_poll_loop};
use crate::provenance::{ProvenanceEntry, ProvenanceStore};
use crate::recommender::{HttpRecommender, Recommender};
use crate::skip::SkipOrchestrator;
use crate::snapshot::SnapshotStore;
use crate::streaming::{HttpPlaybackService, TokenProvider};

const MEMBERSHIP_KEY: &str = "queue_membership";
const PROVENANCE_KEY: &str = "track_provenance";

pub struct Engine {
    events: EventBus,
    snapshot: SnapshotStore,
    provenance: ProvenanceStore,
    membership: QueueMembershipTracker,
    coordinator: EnqueueCoordinator,
    skip: SkipOrchestrator,
    poller: Arc<Poller>,
    driver: Arc<AutoContinueDriver>,
}

impl Engine {
    /// Wire an engine around arbitrary service implementations.
    pub fn new(
        cfg: EngineConfigResolved,
        service: Arc<dyn PlaybackService + Send + Sync>,
        recommender: Arc<dyn Recommender + Send + Sync>,
    ) -> Self {
        let events = EventBus::new();
        let snapshot = SnapshotStore::new(events.clone());
        let provenance = ProvenanceStore::new(cfg.membership_retention);
        let membership = QueueMembershipTracker::new(cfg.membership_retention);
        let control = PollControl::new();

        let coordinator = EnqueueCoordinator::new(
            service.clone(),
            snapshot.clone(),
            provenance.clone(),
            membership.clone(),
            cfg.settle_delay,
        );
        let skip = SkipOrchestrator::new(
            service.clone(),
            snapshot.clone(),
            control.clone(),
            cfg.skip_step_delay,
            cfg.post_skip_refresh,
        );
        let poller = Arc::new(Poller::new(
            service.clone(),
            snapshot.clone(),
            provenance.clone(),
            membership.clone(),
            events.clone(),
            control,
            cfg.queue_poll_playing,
            cfg.queue_poll_idle,
            cfg.playback_poll_playing,
            cfg.playback_poll_idle,
        ));
        let driver = Arc::new(AutoContinueDriver::new(
            cfg.settle_delay,
            snapshot.clone(),
            provenance.clone(),
            coordinator.clone(),
            recommender,
            events.clone(),
            cfg.recommender_model.clone(),
        ));

        Self {
            events,
            snapshot,
            provenance,
            membership,
            coordinator,
            skip,
            poller,
            driver,
        }
    }

    /// Wire an engine against the HTTP service and recommender from config.
    pub fn with_http(
        cfg: EngineConfigResolved,
        token: Arc<dyn TokenProvider + Send + Sync>,
    ) -> Self {
        let service = Arc::new(HttpPlaybackService::new(&cfg.service_base_url, token));
        let recommender = Arc::new(HttpRecommender::new(&cfg.recommender_base_url));
        Self::new(cfg, service, recommender)
    }

    /// Merged, annotated snapshot for rendering.
    pub fn view(&self) -> PlaybackView {
        self.snapshot.view()
    }

    /// Event bus carrying change notifications.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Enqueue tracks on behalf of a user prompt.
    pub fn enqueue(&self, requests: &[TrackRequest], prompt_summary: &str) -> EnqueueReport {
        self.coordinator
            .enqueue(requests, &PromptTag::user(prompt_summary))
    }

    /// Jump playback to a track in the remote queue.
    pub fn skip_to(&self, target_id: &str) -> Result<String> {
        self.skip.skip_to(target_id)
    }

    /// Provenance lookup by track identifier.
    pub fn provenance_for(&self, track_id: &str) -> Option<ProvenanceEntry> {
        self.provenance.get(track_id)
    }

    /// Toggle auto-continue.
    pub fn set_auto_mode(&self, enabled: bool) {
        self.driver.set_enabled(enabled);
    }

    pub fn auto_mode(&self) -> bool {
        self.driver.is_enabled()
    }

    /// Restart polling after the auth collaborator refreshed the credential.
    pub fn resume_after_reauth(&self) {
        self.poller.control().resume_after_reauth();
    }

    /// Spawn the background poll loops.
    pub fn spawn_pollers(&self) {
        let driver = self.driver.clone();
        spawn_queue_poll_loop(self.poller.clone(), move || driver.observe());
        spawn_playback_poll_loop(self.poller.clone());
    }

    /// The poller, for hosts that schedule cycles themselves.
    pub fn poller(&self) -> &Arc<Poller> {
        &self.poller
    }

    /// The auto-continue driver, for hosts that schedule cycles themselves.
    pub fn auto_continue(&self) -> &Arc<AutoContinueDriver> {
        &self.driver
    }

    /// Save membership and provenance into the key-value store.
    pub fn persist(&self, store: &dyn KvStore) -> Result<()> {
        store.set(MEMBERSHIP_KEY, self.membership.dehydrate()?)?;
        store.set(PROVENANCE_KEY, self.provenance.dehydrate()?)?;
        Ok(())
    }

    /// Restore membership and provenance from the key-value store.
    pub fn hydrate(&self, store: &dyn KvStore) -> Result<()> {
        if let Some(value) = store.get(MEMBERSHIP_KEY) {
            self.membership.hydrate(value)?;
        }
        if let Some(value) = store.get(PROVENANCE_KEY) {
            self.provenance.hydrate(value)?;
        }
        Ok(())
    }
}
