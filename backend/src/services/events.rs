use serde::Serialize;
use tokio::sync::broadcast;

use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::models::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageEventKind {
    Created,
    Updated,
}

/// One message lifecycle event, keyed by the thread it belongs to so a
/// transport layer can fan it out to the right peers.
#[derive(Debug, Clone, Serialize)]
pub struct MessageEvent {
    pub kind: MessageEventKind,
    pub conversation_key: String,
    pub message: Message,
}

/// In-process fan-out point for message events. The core only publishes;
/// whatever delivers to connected peers (socket server, SSE, ...) subscribes
/// and owns the connections.
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<MessageEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MessageEvent> {
        self.tx.subscribe()
    }

    /// Best-effort publish; with no subscribers the event is dropped.
    pub fn publish(&self, event: MessageEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
