//! Skip-to-track orchestration.
//!
//! Resolves a jump to an arbitrary queue position into a sequence of
//! primitive skip-forward calls, with optimistic reordering of the cached
//! view and rollback when a primitive call fails.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::playback_service::PlaybackService;
use crate::poller::PollControl;
use crate::snapshot::SnapshotStore;

/// Drives multi-step skips against a service that only exposes next/previous.
#[derive(Clone)]
pub struct SkipOrchestrator {
    service: Arc<dyn PlaybackService + Send + Sync>,
    snapshot: SnapshotStore,
    control: PollControl,
    step_delay: Duration,
    refresh_delay: Duration,
}

impl SkipOrchestrator {
    pub fn new(
        service: Arc<dyn PlaybackService + Send + Sync>,
        snapshot: SnapshotStore,
        control: PollControl,
        step_delay: Duration,
        refresh_delay: Duration,
    ) -> Self {
        Self {
            service,
            snapshot,
            control,
            step_delay,
            refresh_delay,
        }
    }

    /// Jump playback to a track currently in the remote queue.
    ///
    /// Polling is suspended for the whole operation and resumed on
    /// settlement regardless of outcome, followed by a forced refresh once
    /// the remote state has had a moment to stabilize. The position is
    /// computed against the service's real ordering, not the filtered view.
    pub fn skip_to(&self, target_id: &str) -> Result<String> {
        self.control.suspend();
        let result = self.run(target_id);
        self.control.resume();
        self.schedule_refresh();
        if let Err(err) = &result {
            tracing::warn!(target_id, error = %err, "skip-to-track failed");
        }
        result
    }

    fn run(&self, target_id: &str) -> Result<String> {
        let remote = self
            .service
            .get_queue()
            .map_err(|err| anyhow!("queue fetch before skip failed: {err}"))?;

        let offset = remote
            .queue
            .iter()
            .position(|track| track.id == target_id)
            .ok_or_else(|| anyhow!("track not found in queue"))?;
        let target = remote.queue[offset].clone();

        let capture = self.snapshot.capture();
        self.snapshot.apply_skip_target(target);

        // offset is zero-based; reaching the target takes offset + 1 steps.
        for step in 0..=offset {
            if step > 0 && !self.step_delay.is_zero() {
                std::thread::sleep(self.step_delay);
            }
            if let Err(err) = self.service.skip_next() {
                self.snapshot.restore(capture);
                return Err(anyhow!("skip step {} of {} failed: {err}", step + 1, offset + 1));
            }
        }

        tracing::info!(target_id, steps = offset + 1, "skip-to-track complete");
        Ok(target_id.to_string())
    }

    /// Re-fetch queue and playback after the remote state settles.
    fn schedule_refresh(&self) {
        let control = self.control.clone();
        let delay = self.refresh_delay;
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            control.request_refresh();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use vibelink_types::{AnnotatedTrack, RemoteQueue};

    use crate::events::EventBus;
    use crate::testutil::{FakeService, track};

    fn make_orchestrator(service: Arc<FakeService>) -> (SkipOrchestrator, SnapshotStore) {
        let snapshot = SnapshotStore::new(EventBus::new());
        let orchestrator = SkipOrchestrator::new(
            service,
            snapshot.clone(),
            PollControl::new(),
            Duration::ZERO,
            Duration::ZERO,
        );
        (orchestrator, snapshot)
    }

    fn remote_queue() -> RemoteQueue {
        RemoteQueue {
            currently_playing: Some(track("playing", "P", "Playing")),
            queue: vec![
                track("q0", "A", "Zero"),
                track("q1", "B", "One"),
                track("q2", "C", "Two"),
            ],
        }
    }

    #[test]
    fn issues_offset_plus_one_skip_calls() {
        let service = Arc::new(FakeService::new());
        service.set_queue(remote_queue());
        let (orchestrator, snapshot) = make_orchestrator(service.clone());

        let landed = orchestrator.skip_to("q1").unwrap();

        assert_eq!(landed, "q1");
        assert_eq!(*service.skip_calls.lock().unwrap(), 2);
        assert_eq!(snapshot.view().currently_playing.unwrap().id, "q1");
        assert!(!orchestrator.control.is_suspended());
    }

    #[test]
    fn first_queue_entry_takes_one_call() {
        let service = Arc::new(FakeService::new());
        service.set_queue(remote_queue());
        let (orchestrator, _snapshot) = make_orchestrator(service.clone());

        orchestrator.skip_to("q0").unwrap();

        assert_eq!(*service.skip_calls.lock().unwrap(), 1);
    }

    #[test]
    fn missing_target_fails_without_skip_calls() {
        let service = Arc::new(FakeService::new());
        service.set_queue(remote_queue());
        let (orchestrator, _snapshot) = make_orchestrator(service.clone());

        let err = orchestrator.skip_to("nope").unwrap_err();

        assert_eq!(err.to_string(), "track not found in queue");
        assert_eq!(*service.skip_calls.lock().unwrap(), 0);
        assert!(!orchestrator.control.is_suspended());
    }

    #[test]
    fn failed_step_restores_pre_operation_view() {
        let service = Arc::new(FakeService::new());
        service.set_queue(remote_queue());
        *service.fail_skip_after.lock().unwrap() = Some(1);
        let (orchestrator, snapshot) = make_orchestrator(service.clone());

        // Seed the cached view the way a poll cycle would.
        snapshot.apply_queue_poll(
            Some(track("playing", "P", "Playing")),
            remote_queue()
                .queue
                .into_iter()
                .map(AnnotatedTrack::bare)
                .collect(),
        );
        let before = snapshot.view();

        let err = orchestrator.skip_to("q2").unwrap_err();

        assert!(err.to_string().contains("skip step 2 of 3 failed"));
        assert_eq!(snapshot.view(), before);
        assert!(!orchestrator.control.is_suspended());
    }

    #[test]
    fn optimistic_view_drops_target_from_queue() {
        let service = Arc::new(FakeService::new());
        service.set_queue(remote_queue());
        let (orchestrator, snapshot) = make_orchestrator(service);
        snapshot.apply_queue_poll(
            Some(track("playing", "P", "Playing")),
            remote_queue()
                .queue
                .into_iter()
                .map(AnnotatedTrack::bare)
                .collect(),
        );

        orchestrator.skip_to("q1").unwrap();

        let view = snapshot.view();
        let ids: Vec<&str> = view.queue.iter().map(|e| e.track.id.as_str()).collect();
        assert_eq!(ids, ["q0", "q2"]);
    }
}
