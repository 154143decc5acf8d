//! Realtime fan-out of messages and notifications.
//!
//! Every connected client holds one receiver on a process-wide broadcast channel and
//! filters it down to the events addressed to its own user.

pub mod handlers;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RealtimeKind {
    Message,
    Notification,
}

impl RealtimeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RealtimeKind::Message => "message",
            RealtimeKind::Notification => "notification",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RealtimeEvent {
    pub user_id: Uuid,
    pub kind: RealtimeKind,
    pub payload: Value,
}

#[derive(Clone)]
pub struct RealtimeHub {
    sender: broadcast::Sender<RealtimeEvent>,
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new(CHANNEL_CAPACITY)
    }
}

impl RealtimeHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event. Having no connected subscriber is not an error.
    pub fn publish(&self, user_id: Uuid, kind: RealtimeKind, payload: Value) {
        let event = RealtimeEvent {
            user_id,
            kind,
            payload,
        };
        match self.sender.send(event) {
            Ok(receivers) => debug!("Published {} event to {receivers} receivers", kind.as_str()),
            Err(_) => debug!("No realtime subscribers for {} event", kind.as_str()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.sender.subscribe()
    }
}
