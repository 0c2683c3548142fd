//! Recommendation service client.
//!
//! Turns a prompt plus listening context into track suggestions. Quota and
//! tier failures are surfaced as distinct variants for the caller to
//! present; nothing is retried here.

use std::time::Duration;

use serde::Serialize;
use vibelink_types::RecommendationResponse;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Inputs for one recommendation call.
#[derive(Clone, Debug, Default)]
pub struct RecommendRequest {
    /// Free-form prompt text.
    pub prompt: String,
    /// Prior prompt summaries for conversational continuity.
    pub history: Vec<String>,
    /// Recently played tracks, formatted as "Artist - Title".
    pub recent_tracks: Vec<String>,
    /// Tracks currently visible in the queue, same format.
    pub context_tracks: Vec<String>,
    /// Model identifier passed through to the service.
    pub model: Option<String>,
}

/// Failure modes surfaced by the recommendation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecommendError {
    /// Network or remote-side failure.
    Transport(String),
    /// The account's request quota is exhausted.
    QuotaExceeded,
    /// The feature requires a higher billing tier.
    TierRequired,
}

impl std::fmt::Display for RecommendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "recommendation request failed: {msg}"),
            Self::QuotaExceeded => write!(f, "recommendation quota exceeded"),
            Self::TierRequired => write!(f, "recommendations require a higher tier"),
        }
    }
}

impl std::error::Error for RecommendError {}

/// Contract used against the recommendation service.
pub trait Recommender {
    fn recommend(&self, request: &RecommendRequest)
    -> Result<RecommendationResponse, RecommendError>;
}

/// JSON payload for recommendation requests.
#[derive(Debug, Serialize)]
struct RecommendPayload<'a> {
    prompt: &'a str,
    conversation_history: &'a [String],
    recent_tracks: &'a [String],
    context_tracks: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

/// HTTP client for the recommendation service.
pub struct HttpRecommender {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpRecommender {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}

impl Recommender for HttpRecommender {
    fn recommend(
        &self,
        request: &RecommendRequest,
    ) -> Result<RecommendationResponse, RecommendError> {
        let url = format!("{}/recommendations", self.base_url);
        let payload = RecommendPayload {
            prompt: &request.prompt,
            conversation_history: &request.history,
            recent_tracks: &request.recent_tracks,
            context_tracks: &request.context_tracks,
            model: request.model.as_deref(),
        };

        let mut resp = self
            .agent
            .post(&url)
            .config()
            .timeout_per_call(Some(REQUEST_TIMEOUT))
            .http_status_as_error(false)
            .build()
            .send_json(&payload)
            .map_err(|e| RecommendError::Transport(format!("recommend request failed: {e}")))?;

        match resp.status().as_u16() {
            code if code < 400 => {}
            402 => return Err(RecommendError::TierRequired),
            429 => return Err(RecommendError::QuotaExceeded),
            code => {
                return Err(RecommendError::Transport(format!(
                    "recommend request failed (status {code})"
                )));
            }
        }

        resp.body_mut()
            .read_json()
            .map_err(|e| RecommendError::Transport(format!("recommend decode failed: {e}")))
    }
}
