//! Queue membership tracking.
//!
//! Records which track identifiers this client inserted into the remote
//! queue, so poll results can be filtered down to entries we are responsible
//! for. Tracks queued directly on the service stay invisible by design.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One client-inserted queue entry.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MembershipRecord {
    /// Remote track identifier.
    pub track_id: String,
    /// Insertion wall-clock timestamp (epoch milliseconds).
    pub inserted_at_ms: u64,
    /// Artist at insertion time.
    pub artist: String,
    /// Title at insertion time.
    pub title: String,
    /// Summary of the prompt that caused the insertion.
    pub prompt_summary: Option<String>,
}

/// Insertion request for [`QueueMembershipTracker::record`].
#[derive(Clone, Debug)]
pub struct MembershipInsert {
    pub track_id: String,
    pub artist: String,
    pub title: String,
    pub prompt_summary: Option<String>,
}

/// Tracks client-inserted queue entries with time-based expiry.
///
/// Entries are never mutated in place; `forget` and the expiry purge only
/// delete. The purge runs on the poll cycle, not inside reads.
#[derive(Clone)]
pub struct QueueMembershipTracker {
    inner: Arc<Mutex<HashMap<String, MembershipRecord>>>,
    retention: Duration,
}

pub(crate) fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl QueueMembershipTracker {
    /// Create an empty tracker with the given retention window.
    pub fn new(retention: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            retention,
        }
    }

    /// Record a batch of inserted tracks, stamped with the current time.
    pub fn record(&self, inserts: Vec<MembershipInsert>) {
        let now = epoch_ms();
        if let Ok(mut map) = self.inner.lock() {
            for insert in inserts {
                map.insert(
                    insert.track_id.clone(),
                    MembershipRecord {
                        track_id: insert.track_id,
                        inserted_at_ms: now,
                        artist: insert.artist,
                        title: insert.title,
                        prompt_summary: insert.prompt_summary,
                    },
                );
            }
        }
    }

    /// Drop one entry; called when its track graduates to "currently playing".
    pub fn forget(&self, track_id: &str) {
        if let Ok(mut map) = self.inner.lock() {
            map.remove(track_id);
        }
    }

    /// Whether this identifier was inserted by us and is still tracked.
    pub fn is_member(&self, track_id: &str) -> bool {
        self.inner
            .lock()
            .map(|map| map.contains_key(track_id))
            .unwrap_or(false)
    }

    /// Remove entries older than the retention window.
    pub fn purge_expired(&self) {
        self.purge_expired_at(epoch_ms());
    }

    pub(crate) fn purge_expired_at(&self, now_ms: u64) {
        let retention_ms = self.retention.as_millis() as u64;
        if let Ok(mut map) = self.inner.lock() {
            let before = map.len();
            map.retain(|_, record| now_ms.saturating_sub(record.inserted_at_ms) <= retention_ms);
            let purged = before - map.len();
            if purged > 0 {
                tracing::debug!(purged, "membership records expired");
            }
        }
    }

    /// Number of tracked entries.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize tracked records as an array for the key-value store.
    pub fn dehydrate(&self) -> Result<Value> {
        let records: Vec<MembershipRecord> = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("membership lock poisoned"))?
            .values()
            .cloned()
            .collect();
        serde_json::to_value(records).context("serialize membership records")
    }

    /// Replace tracked records from a previously-dehydrated array.
    pub fn hydrate(&self, value: Value) -> Result<()> {
        let records: Vec<MembershipRecord> =
            serde_json::from_value(value).context("parse membership records")?;
        let mut map = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("membership lock poisoned"))?;
        map.clear();
        for record in records {
            map.insert(record.track_id.clone(), record);
        }
        Ok(())
    }
}
