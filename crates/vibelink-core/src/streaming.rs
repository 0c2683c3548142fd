//! HTTP client for the remote streaming service.
//!
//! Implements the playback service seam over a JSON API with bearer
//! authentication. Remote payloads are validated here and converted into the
//! typed data model; malformed entries are dropped at the boundary.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use vibelink_types::{RemotePlaybackState, RemoteQueue, TrackRef};

use crate::playback_service::{PlaybackService, PlaybackServiceError, ServiceResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Supplies a currently-valid bearer credential.
///
/// Refresh is the identity collaborator's concern; this seam only hands the
/// engine whatever credential is valid right now.
pub trait TokenProvider {
    fn bearer_token(&self) -> anyhow::Result<String>;
}

/// Fixed-token provider for tools and tests.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
        }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn bearer_token(&self) -> anyhow::Result<String> {
        Ok(self.token.clone())
    }
}

/// Track payload as returned by the service.
#[derive(Debug, Deserialize)]
struct TrackPayload {
    id: String,
    name: String,
    #[serde(default)]
    artists: Vec<ArtistPayload>,
    album: Option<AlbumPayload>,
    duration_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ArtistPayload {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumPayload {
    #[serde(default)]
    images: Vec<ImagePayload>,
}

#[derive(Debug, Deserialize)]
struct ImagePayload {
    url: String,
}

impl TrackPayload {
    /// Validate into the typed model; entries with no usable identity are
    /// dropped rather than trusted downstream.
    fn into_track(self) -> Option<TrackRef> {
        if self.id.is_empty() || self.name.is_empty() {
            return None;
        }
        let artist = self.artists.into_iter().next()?.name;
        Some(TrackRef {
            id: self.id,
            name: self.name,
            artist,
            artwork_url: self
                .album
                .and_then(|album| album.images.into_iter().next())
                .map(|image| image.url),
            duration_ms: self.duration_ms,
        })
    }
}

#[derive(Debug, Deserialize)]
struct QueuePayload {
    currently_playing: Option<TrackPayload>,
    #[serde(default)]
    queue: Vec<TrackPayload>,
}

#[derive(Debug, Deserialize)]
struct PlaybackPayload {
    #[serde(default)]
    is_playing: bool,
    progress_ms: Option<u64>,
    item: Option<TrackPayload>,
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    #[serde(default)]
    tracks: Vec<TrackPayload>,
}

#[derive(Debug, Deserialize)]
struct SavedTracksPayload {
    #[serde(default)]
    items: Vec<TrackPayload>,
}

/// HTTP transport for the streaming service API.
pub struct HttpPlaybackService {
    base_url: String,
    token: Arc<dyn TokenProvider + Send + Sync>,
    agent: ureq::Agent,
}

impl HttpPlaybackService {
    pub fn new(base_url: &str, token: Arc<dyn TokenProvider + Send + Sync>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    fn authorization(&self) -> ServiceResult<String> {
        self.token
            .bearer_token()
            .map(|token| format!("Bearer {token}"))
            .map_err(|e| PlaybackServiceError::Transport(format!("token unavailable: {e}")))
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> ServiceResult<T> {
        let url = format!("{}{path}", self.base_url);
        let auth = self.authorization()?;
        let mut request = self.agent.get(&url).header("authorization", auth.as_str());
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        let resp = request
            .config()
            .timeout_per_call(Some(REQUEST_TIMEOUT))
            .http_status_as_error(false)
            .build()
            .call()
            .map_err(|e| PlaybackServiceError::Transport(format!("GET {path} failed: {e}")))?;
        let mut resp = check_status(path, resp)?;
        resp.body_mut()
            .read_json()
            .map_err(|e| PlaybackServiceError::Transport(format!("GET {path} decode failed: {e}")))
    }

    fn post(&self, path: &str, query: &[(&str, &str)]) -> ServiceResult<()> {
        let url = format!("{}{path}", self.base_url);
        let auth = self.authorization()?;
        let mut request = self.agent.post(&url).header("authorization", auth.as_str());
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        let resp = request
            .config()
            .timeout_per_call(Some(REQUEST_TIMEOUT))
            .http_status_as_error(false)
            .build()
            .send_json(serde_json::json!({}))
            .map_err(|e| PlaybackServiceError::Transport(format!("POST {path} failed: {e}")))?;
        check_status(path, resp).map(|_| ())
    }
}

fn check_status(
    path: &str,
    resp: ureq::http::Response<ureq::Body>,
) -> ServiceResult<ureq::http::Response<ureq::Body>> {
    match resp.status().as_u16() {
        401 => Err(PlaybackServiceError::CredentialExpired),
        code if code >= 400 => Err(PlaybackServiceError::Transport(format!(
            "{path} failed (status {code})"
        ))),
        _ => Ok(resp),
    }
}

impl PlaybackService for HttpPlaybackService {
    fn get_queue(&self) -> ServiceResult<RemoteQueue> {
        let payload: QueuePayload = self.get_json("/me/player/queue", &[])?;
        Ok(RemoteQueue {
            currently_playing: payload.currently_playing.and_then(TrackPayload::into_track),
            queue: payload
                .queue
                .into_iter()
                .filter_map(TrackPayload::into_track)
                .collect(),
        })
    }

    fn get_playback_state(&self) -> ServiceResult<RemotePlaybackState> {
        let payload: PlaybackPayload = self.get_json("/me/player", &[])?;
        Ok(RemotePlaybackState {
            is_playing: payload.is_playing,
            progress_ms: payload.progress_ms,
            item: payload.item.and_then(TrackPayload::into_track),
        })
    }

    fn skip_next(&self) -> ServiceResult<()> {
        self.post("/me/player/next", &[])
    }

    fn skip_previous(&self) -> ServiceResult<()> {
        self.post("/me/player/previous", &[])
    }

    fn seek(&self, position_ms: u64) -> ServiceResult<()> {
        self.post("/me/player/seek", &[("position_ms", &position_ms.to_string())])
    }

    fn enqueue(&self, track_id: &str) -> ServiceResult<()> {
        self.post("/me/player/queue", &[("id", track_id)])
    }

    fn search(&self, query: &str, limit: u32) -> ServiceResult<Vec<TrackRef>> {
        let payload: SearchPayload = self.get_json(
            "/search",
            &[
                ("q", query),
                ("type", "track"),
                ("limit", &limit.to_string()),
            ],
        )?;
        Ok(payload
            .tracks
            .into_iter()
            .filter_map(TrackPayload::into_track)
            .collect())
    }

    fn start_playback(&self) -> ServiceResult<()> {
        self.post("/me/player/play", &[])
    }

    fn get_liked_tracks(&self, limit: u32, offset: u32) -> ServiceResult<Vec<TrackRef>> {
        let payload: SavedTracksPayload = self.get_json(
            "/me/tracks",
            &[("limit", &limit.to_string()), ("offset", &offset.to_string())],
        )?;
        Ok(payload
            .items
            .into_iter()
            .filter_map(TrackPayload::into_track)
            .collect())
    }
}
