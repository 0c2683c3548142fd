//! Track provenance bookkeeping.
//!
//! Associates each queued track with the prompt that caused it to be
//! enqueued, and follows the track through its playback lifecycle.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::membership::epoch_ms;

/// Lifecycle of a provenance entry's track.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackLifecycle {
    /// Queued (or optimistically queued), not yet observed playing.
    Pending,
    /// Observed in the currently-playing slot.
    Active,
    /// No longer playing.
    Ended,
}

/// Provenance of a single queued track.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvenanceEntry {
    /// Identifier of the originating prompt.
    pub prompt_id: String,
    /// Human-readable prompt summary.
    pub prompt_summary: String,
    /// `true` when synthesized by auto-continue rather than direct input.
    pub auto_generated: bool,
    /// Current lifecycle state.
    pub state: PlaybackLifecycle,
    /// Assignment wall-clock timestamp (epoch milliseconds).
    pub recorded_at_ms: u64,
}

/// Maps track identifiers to the prompt that enqueued them.
///
/// At most one entry per identifier; a newer assignment overwrites.
#[derive(Clone)]
pub struct ProvenanceStore {
    inner: Arc<Mutex<HashMap<String, ProvenanceEntry>>>,
    retention: Duration,
}

impl ProvenanceStore {
    /// Create an empty store with the given staleness bound.
    pub fn new(retention: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            retention,
        }
    }

    /// Assign provenance to a track, overwriting any previous entry.
    pub fn assign(&self, track_id: &str, prompt_id: &str, summary: &str, auto_generated: bool) {
        if let Ok(mut map) = self.inner.lock() {
            map.insert(
                track_id.to_string(),
                ProvenanceEntry {
                    prompt_id: prompt_id.to_string(),
                    prompt_summary: summary.to_string(),
                    auto_generated,
                    state: PlaybackLifecycle::Pending,
                    recorded_at_ms: epoch_ms(),
                },
            );
        }
    }

    /// Look up the entry for a track.
    pub fn get(&self, track_id: &str) -> Option<ProvenanceEntry> {
        self.inner.lock().ok()?.get(track_id).cloned()
    }

    /// Mark a track as observed in the currently-playing slot.
    pub fn mark_active(&self, track_id: &str) {
        if let Ok(mut map) = self.inner.lock() {
            if let Some(entry) = map.get_mut(track_id) {
                entry.state = PlaybackLifecycle::Active;
            }
        }
    }

    /// Mark a track as finished playing.
    pub fn mark_ended(&self, track_id: &str) {
        if let Ok(mut map) = self.inner.lock() {
            if let Some(entry) = map.get_mut(track_id) {
                entry.state = PlaybackLifecycle::Ended;
            }
        }
    }

    /// Drop entries whose track is neither queued nor currently playing.
    pub fn retain_live(&self, live_ids: &HashSet<String>) {
        if let Ok(mut map) = self.inner.lock() {
            let before = map.len();
            map.retain(|id, _| live_ids.contains(id));
            let collected = before - map.len();
            if collected > 0 {
                tracing::debug!(collected, "provenance entries garbage-collected");
            }
        }
    }

    /// Drop entries older than the staleness bound.
    ///
    /// This is what eventually clears entries left behind when playback
    /// stops entirely and presence-based collection cannot run.
    pub fn purge_stale(&self) {
        self.purge_stale_at(epoch_ms());
    }

    pub(crate) fn purge_stale_at(&self, now_ms: u64) {
        let retention_ms = self.retention.as_millis() as u64;
        if let Ok(mut map) = self.inner.lock() {
            map.retain(|_, entry| now_ms.saturating_sub(entry.recorded_at_ms) <= retention_ms);
        }
    }

    /// Number of tracked entries.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize entries as an array of `(track_id, entry)` pairs.
    pub fn dehydrate(&self) -> Result<Value> {
        let pairs: Vec<(String, ProvenanceEntry)> = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("provenance lock poisoned"))?
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect();
        serde_json::to_value(pairs).context("serialize provenance entries")
    }

    /// Replace entries from a previously-dehydrated array.
    pub fn hydrate(&self, value: Value) -> Result<()> {
        let pairs: Vec<(String, ProvenanceEntry)> =
            serde_json::from_value(value).context("parse provenance entries")?;
        let mut map = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("provenance lock poisoned"))?;
        map.clear();
        map.extend(pairs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> ProvenanceStore {
        ProvenanceStore::new(Duration::from_secs(3600))
    }

    #[test]
    fn assign_overwrites_previous_entry() {
        let store = make_store();
        store.assign("t1", "p1", "first prompt", false);
        store.assign("t1", "p2", "second prompt", true);

        let entry = store.get("t1").unwrap();
        assert_eq!(entry.prompt_id, "p2");
        assert_eq!(entry.prompt_summary, "second prompt");
        assert!(entry.auto_generated);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn lifecycle_transitions() {
        let store = make_store();
        store.assign("t1", "p1", "prompt", false);
        assert_eq!(store.get("t1").unwrap().state, PlaybackLifecycle::Pending);

        store.mark_active("t1");
        assert_eq!(store.get("t1").unwrap().state, PlaybackLifecycle::Active);

        store.mark_ended("t1");
        assert_eq!(store.get("t1").unwrap().state, PlaybackLifecycle::Ended);
    }

    #[test]
    fn retain_live_collects_departed_tracks() {
        let store = make_store();
        store.assign("queued", "p1", "prompt", false);
        store.assign("gone", "p1", "prompt", false);

        let live: HashSet<String> = ["queued".to_string()].into_iter().collect();
        store.retain_live(&live);

        assert!(store.get("queued").is_some());
        assert!(store.get("gone").is_none());
    }

    #[test]
    fn purge_stale_respects_retention_bound() {
        let store = make_store();
        store.assign("t1", "p1", "prompt", false);
        let recorded = store.get("t1").unwrap().recorded_at_ms;

        store.purge_stale_at(recorded + 59 * 60 * 1000);
        assert!(store.get("t1").is_some());
        store.purge_stale_at(recorded + 61 * 60 * 1000);
        assert!(store.get("t1").is_none());
    }

    #[test]
    fn hydrate_round_trips_entries() {
        let store = make_store();
        store.assign("t1", "p1", "prompt", false);
        store.mark_active("t1");
        let value = store.dehydrate().unwrap();

        let restored = make_store();
        restored.hydrate(value).unwrap();
        let entry = restored.get("t1").unwrap();
        assert_eq!(entry.state, PlaybackLifecycle::Active);
        assert_eq!(entry.prompt_summary, "prompt");
    }
}
