use crate::bus::{ChatEvent, EventBus};
use crate::chat::{AckFrame, ChatMessage, DeliveryStatus, OutboundFrame, Session};
use crate::connection::{ConnectionManager, ConnectionState};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Banner frame the public relay sends on connect; filtered, never displayed.
pub const RELAY_BANNER: &str = "echo.websocket.events sponsored by Lob.com";

/// Delay before the scripted seller reply follows an acknowledgment.
pub const SCRIPTED_REPLY_DELAY: Duration = Duration::from_millis(700);

/// What an inbound frame turned out to be.
#[derive(Debug, PartialEq, Eq)]
pub enum InboundOutcome {
    /// A pending buyer message was confirmed; the owner should schedule the
    /// scripted reply.
    Acknowledged { id: String },
    /// Plain text appended to the log as a system entry.
    SystemNote,
    /// Banner, blank frame, or an acknowledgment that matched nothing.
    Dropped,
}

/// Owns the ordered message log for one session and the send/acknowledge
/// protocol on top of the echo relay. No other component mutates the log.
pub struct Conversation {
    session: Session,
    log: Vec<ChatMessage>,
    /// Outstanding message id -> log index, so an acknowledgment is O(1)
    /// regardless of log length.
    outstanding: HashMap<String, usize>,
    bus: Arc<EventBus>,
}

impl Conversation {
    pub fn new(session: Session, bus: Arc<EventBus>) -> Self {
        Self {
            session,
            log: Vec::new(),
            outstanding: HashMap::new(),
            bus,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.log
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.log.clone()
    }

    /// Reset the log to the single seller welcome. Runs once per session
    /// open, before any connection event is processed.
    pub fn initialize(&mut self) {
        self.log.clear();
        self.outstanding.clear();
        let welcome = self.session.welcome();
        self.push(welcome);
    }

    /// Whether a submit would currently go through.
    pub fn can_submit(&self, conn: &ConnectionManager, input: &str) -> bool {
        conn.state() == ConnectionState::Open && !input.trim().is_empty()
    }

    /// Optimistic send: append a pending buyer message and hand the wire
    /// frame to the connection. The message shows up in the log before the
    /// relay confirms anything.
    pub fn submit(&mut self, text: &str, conn: &mut ConnectionManager) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        if conn.state() != ConnectionState::Open {
            debug!(state = ?conn.state(), "ignoring submit, connection is not open");
            return;
        }

        let message = ChatMessage::buyer(trimmed);
        let payload = match serde_json::to_string(&OutboundFrame::new(&message, &self.session)) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("failed to encode outbound frame: {err}");
                return;
            }
        };

        self.outstanding.insert(message.id.clone(), self.log.len());
        self.push(message);
        conn.send(payload);
    }

    /// The acknowledgment protocol. A JSON frame whose `id` matches an
    /// outstanding buyer message confirms delivery exactly once; duplicate
    /// or unknown ids do nothing. Anything that fails to decode falls back
    /// to a plain system entry, except the relay banner, which is dropped.
    pub fn on_inbound_frame(&mut self, raw: &str) -> InboundOutcome {
        if raw == RELAY_BANNER {
            return InboundOutcome::Dropped;
        }

        match serde_json::from_str::<AckFrame>(raw) {
            Ok(ack) => match self.outstanding.remove(&ack.id) {
                Some(index) => {
                    self.log[index].status = DeliveryStatus::Delivered;
                    self.bus
                        .publish(ChatEvent::MessageDelivered { id: ack.id.clone() });
                    InboundOutcome::Acknowledged { id: ack.id }
                }
                None => {
                    debug!(id = %ack.id, "acknowledgment matches no pending message");
                    InboundOutcome::Dropped
                }
            },
            Err(err) => {
                debug!("inbound frame is not an acknowledgment: {err}");
                if raw.trim().is_empty() {
                    return InboundOutcome::Dropped;
                }
                self.push(ChatMessage::system(raw));
                InboundOutcome::SystemNote
            }
        }
    }

    /// Append the scripted seller reply for an acknowledged message. The
    /// owner only calls this while the session is still live.
    pub fn scripted_reply(&mut self, ack_id: &str) {
        let reply = self.session.scripted_reply(ack_id);
        self.push(reply);
    }

    fn push(&mut self, message: ChatMessage) {
        self.bus.publish(ChatEvent::MessageAppended(message.clone()));
        self.log.push(message);
    }
}
