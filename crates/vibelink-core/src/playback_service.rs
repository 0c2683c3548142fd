//! Remote playback service abstraction.
//!
//! Implementations translate queue/playback operations into calls against a
//! concrete streaming service API.

use vibelink_types::{RemotePlaybackState, RemoteQueue, TrackRef};

/// Failure modes surfaced by the remote playback service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackServiceError {
    /// Network or remote-side failure; safe to treat as "no change".
    Transport(String),
    /// The bearer credential was rejected; polling must halt until re-auth.
    CredentialExpired,
}

impl std::fmt::Display for PlaybackServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "service request failed: {msg}"),
            Self::CredentialExpired => write!(f, "service credential expired"),
        }
    }
}

impl std::error::Error for PlaybackServiceError {}

pub type ServiceResult<T> = Result<T, PlaybackServiceError>;

/// Contract used against the remote streaming service.
///
/// All calls are synchronous at this seam; scheduling is the caller's
/// concern. Every call may fail with a transport error or a credential
/// rejection.
pub trait PlaybackService {
    /// Fetch the authoritative queue and currently-playing slot.
    fn get_queue(&self) -> ServiceResult<RemoteQueue>;
    /// Fetch the playback transport state.
    fn get_playback_state(&self) -> ServiceResult<RemotePlaybackState>;
    /// Advance playback by exactly one position.
    fn skip_next(&self) -> ServiceResult<()>;
    /// Move playback back by one position.
    fn skip_previous(&self) -> ServiceResult<()>;
    /// Seek within the current track.
    fn seek(&self, position_ms: u64) -> ServiceResult<()>;
    /// Append a catalog track to the remote queue.
    fn enqueue(&self, track_id: &str) -> ServiceResult<()>;
    /// Search the catalog; returns up to `limit` candidates.
    fn search(&self, query: &str, limit: u32) -> ServiceResult<Vec<TrackRef>>;
    /// Start or resume playback on the active device.
    fn start_playback(&self) -> ServiceResult<()>;
    /// Fetch a page of the user's saved tracks.
    fn get_liked_tracks(&self, limit: u32, offset: u32) -> ServiceResult<Vec<TrackRef>>;
}
