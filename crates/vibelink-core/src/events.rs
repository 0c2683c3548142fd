//! In-process event bus for engine updates.
//!
//! Provides a lightweight broadcast channel consumers subscribe to for
//! re-rendering the merged playback view.

use tokio::sync::broadcast;

/// Event payloads published by the engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The annotated queue changed (poll result or optimistic mutation).
    QueueChanged,
    /// Playback transport state changed (progress, play/pause, track).
    StatusChanged,
    /// The remote service rejected our credential; polling is halted.
    AuthExpired,
    /// An auto-continue recommendation request was dispatched.
    AutoContinueFired,
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a new event bus with a bounded broadcast channel.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Notify subscribers that the annotated queue has changed.
    pub fn queue_changed(&self) {
        let _ = self.sender.send(EngineEvent::QueueChanged);
    }

    /// Notify subscribers that playback status has changed.
    pub fn status_changed(&self) {
        let _ = self.sender.send(EngineEvent::StatusChanged);
    }

    /// Notify subscribers that the service credential expired.
    pub fn auth_expired(&self) {
        let _ = self.sender.send(EngineEvent::AuthExpired);
    }

    /// Notify subscribers that auto-continue dispatched a request.
    pub fn auto_continue_fired(&self) {
        let _ = self.sender.send(EngineEvent::AutoContinueFired);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
