use serde::{Deserialize, Serialize};

/// Catalog track reference owned by the remote streaming service.
///
/// The identifier is opaque and stable per catalog entry; everything else is
/// display metadata and read-only to this system.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackRef {
    /// Opaque stable identifier assigned by the remote service.
    pub id: String,
    /// Display name of the track.
    pub name: String,
    /// Primary artist name.
    pub artist: String,
    /// Artwork image reference, if available.
    pub artwork_url: Option<String>,
    /// Track duration in milliseconds, if known.
    pub duration_ms: Option<u64>,
}

/// Authoritative queue snapshot returned by the remote service.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteQueue {
    /// Track occupying the currently-playing slot, if any.
    pub currently_playing: Option<TrackRef>,
    /// Upcoming tracks in service order.
    pub queue: Vec<TrackRef>,
}

/// Playback transport state reported by the remote service.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemotePlaybackState {
    /// `true` while the service reports active playback.
    pub is_playing: bool,
    /// Progress offset into the current item in milliseconds.
    pub progress_ms: Option<u64>,
    /// Item the progress refers to, if any.
    pub item: Option<TrackRef>,
}

/// Single track suggestion from the recommendation service.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recommendation {
    /// Suggested artist name.
    pub artist: String,
    /// Suggested track title.
    pub title: String,
    /// Short reasoning supplied by the recommender, if any.
    pub reason: Option<String>,
}

/// Response payload from the recommendation service.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecommendationResponse {
    /// Recommended tracks in preference order.
    pub recommendations: Vec<Recommendation>,
    /// Conversational message for display, if any.
    pub message: Option<String>,
    /// Condensed summary of the prompt that produced the batch.
    pub prompt_summary: Option<String>,
}

/// Queue entry annotated with locally-known provenance.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnnotatedTrack {
    /// The underlying track reference.
    pub track: TrackRef,
    /// Summary of the prompt that caused this track to be queued.
    pub prompt_summary: Option<String>,
    /// Identifier of the originating prompt.
    pub prompt_id: Option<String>,
    /// `true` for locally-synthesized entries awaiting remote confirmation.
    pub optimistic: bool,
}

impl AnnotatedTrack {
    /// Wrap a confirmed remote track with no provenance attached.
    pub fn bare(track: TrackRef) -> Self {
        Self {
            track,
            prompt_summary: None,
            prompt_id: None,
            optimistic: false,
        }
    }
}

/// Merged, annotated playback snapshot exposed to consumers.
///
/// The queue contains only entries this client is responsible for, in the
/// service's relative order, with optimistic placeholders appended.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaybackView {
    /// Currently-playing track, if any.
    pub currently_playing: Option<TrackRef>,
    /// Progress offset into the current track in milliseconds.
    pub progress_ms: Option<u64>,
    /// `true` while the service reports active playback.
    pub is_playing: bool,
    /// Annotated client-managed queue.
    pub queue: Vec<AnnotatedTrack>,
}
