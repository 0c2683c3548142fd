//! Shared test doubles for the playback service seam.

use std::sync::Mutex;

use vibelink_types::{RemotePlaybackState, RemoteQueue, TrackRef};

use crate::playback_service::{PlaybackService, PlaybackServiceError, ServiceResult};

pub(crate) fn track(id: &str, artist: &str, name: &str) -> TrackRef {
    TrackRef {
        id: id.to_string(),
        name: name.to_string(),
        artist: artist.to_string(),
        artwork_url: Some(format!("https://img.example/{id}")),
        duration_ms: Some(180_000),
    }
}

/// Scriptable in-memory playback service recording every call.
#[derive(Default)]
pub(crate) struct FakeService {
    /// Served by `get_queue` unless `queue_error` is set.
    pub queue: Mutex<RemoteQueue>,
    /// Served by `get_playback_state`.
    pub playback: Mutex<RemotePlaybackState>,
    /// Catalog matched against search queries by artist/name substring.
    pub catalog: Mutex<Vec<TrackRef>>,
    /// Track ids passed to `enqueue`.
    pub enqueued: Mutex<Vec<String>>,
    /// Number of `skip_next` calls observed.
    pub skip_calls: Mutex<usize>,
    /// Number of `start_playback` calls observed.
    pub start_calls: Mutex<usize>,
    /// Number of `get_queue` calls observed.
    pub queue_fetches: Mutex<usize>,
    /// Error returned by `get_queue`, if set.
    pub queue_error: Mutex<Option<PlaybackServiceError>>,
    /// Error returned by `get_playback_state`, if set.
    pub playback_error: Mutex<Option<PlaybackServiceError>>,
    /// Error returned by `enqueue`, if set.
    pub enqueue_error: Mutex<Option<PlaybackServiceError>>,
    /// Fail `skip_next` once this many calls have succeeded.
    pub fail_skip_after: Mutex<Option<usize>>,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(tracks: Vec<TrackRef>) -> Self {
        let service = Self::new();
        *service.catalog.lock().unwrap() = tracks;
        service
    }

    pub fn set_queue(&self, queue: RemoteQueue) {
        *self.queue.lock().unwrap() = queue;
    }

    pub fn set_playback(&self, playback: RemotePlaybackState) {
        *self.playback.lock().unwrap() = playback;
    }
}

impl PlaybackService for FakeService {
    fn get_queue(&self) -> ServiceResult<RemoteQueue> {
        *self.queue_fetches.lock().unwrap() += 1;
        if let Some(err) = self.queue_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.queue.lock().unwrap().clone())
    }

    fn get_playback_state(&self) -> ServiceResult<RemotePlaybackState> {
        if let Some(err) = self.playback_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.playback.lock().unwrap().clone())
    }

    fn skip_next(&self) -> ServiceResult<()> {
        let mut calls = self.skip_calls.lock().unwrap();
        if let Some(limit) = *self.fail_skip_after.lock().unwrap() {
            if *calls >= limit {
                return Err(PlaybackServiceError::Transport("skip failed".to_string()));
            }
        }
        *calls += 1;
        Ok(())
    }

    fn skip_previous(&self) -> ServiceResult<()> {
        Ok(())
    }

    fn seek(&self, _position_ms: u64) -> ServiceResult<()> {
        Ok(())
    }

    fn enqueue(&self, track_id: &str) -> ServiceResult<()> {
        if let Some(err) = self.enqueue_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.enqueued.lock().unwrap().push(track_id.to_string());
        Ok(())
    }

    fn search(&self, query: &str, limit: u32) -> ServiceResult<Vec<TrackRef>> {
        let lowered = query.to_lowercase();
        let hits: Vec<TrackRef> = self
            .catalog
            .lock()
            .unwrap()
            .iter()
            .filter(|t| {
                lowered.contains(&t.name.to_lowercase())
                    && lowered.contains(&t.artist.to_lowercase())
            })
            .take(limit as usize)
            .cloned()
            .collect();
        Ok(hits)
    }

    fn start_playback(&self) -> ServiceResult<()> {
        *self.start_calls.lock().unwrap() += 1;
        Ok(())
    }

    fn get_liked_tracks(&self, limit: u32, offset: u32) -> ServiceResult<Vec<TrackRef>> {
        let catalog = self.catalog.lock().unwrap();
        Ok(catalog
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
