pub mod autocontinue;
pub mod config;
pub mod engine;
pub mod enqueue;
pub mod events;
pub mod membership;
pub mod persistence;
pub mod playback_service;
pub mod poller;
pub mod provenance;
pub mod recommender;
pub mod skip;
pub mod snapshot;
pub mod streaming;
pub mod track_search;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{EngineConfig, EngineConfigResolved};
pub use engine::Engine;
pub use enqueue::{EnqueueReport, TrackOutcome, TrackRequest};
pub use events::{EngineEvent, EventBus};
pub use playback_service::{PlaybackService, PlaybackServiceError};
pub use recommender::{RecommendError, Recommender};
pub use streaming::{HttpPlaybackService, StaticTokenProvider, TokenProvider};
