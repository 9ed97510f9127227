use crate::chat::{ChatMessage, Session};
use crate::connection::ConnectionState;
use serde::Serialize;
use tokio::sync::broadcast;

/// Events published by the chat core. A UI host subscribes and renders the
/// message log and connection indicator as a projection of these.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ChatEvent {
    /// A chat session was opened for a listing
    SessionOpened(Session),

    /// A message was appended to the session log
    MessageAppended(ChatMessage),

    /// A previously pending message was confirmed by the relay
    MessageDelivered { id: String },

    /// The transport connection changed state
    ConnectionChanged {
        state: ConnectionState,
        status: String,
    },

    /// The active session was torn down
    SessionClosed,
}

pub struct EventBus {
    tx: broadcast::Sender<ChatEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: ChatEvent) {
        // We ignore the error if there are no receivers
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
