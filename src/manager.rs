use crate::bus::{ChatEvent, EventBus};
use crate::catalog::Item;
use crate::chat::{ChatMessage, Participant, Session};
use crate::connection::{
    relay_endpoint, ConnectionManager, ConnectionState, TransportEvent, TransportEventKind,
};
use crate::conversation::{Conversation, InboundOutcome, SCRIPTED_REPLY_DELAY};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Pull-style view of the active session for hosts that poll instead of
/// subscribing to the bus.
#[derive(Debug, Clone)]
pub struct ChatSnapshot {
    pub session: Session,
    pub messages: Vec<ChatMessage>,
    pub connection: ConnectionState,
}

enum Command {
    Submit(String),
    Retry,
    Snapshot(oneshot::Sender<ChatSnapshot>),
}

struct ActiveSession {
    session_id: String,
    commands: mpsc::Sender<Command>,
    liveness: CancellationToken,
    #[allow(dead_code)]
    task: JoinHandle<()>,
}

/// Owns the lifecycle of the single open chat session. Opening a chat for a
/// new listing tears down the previous session, its timers, and its
/// connection; nothing is shared across sessions.
pub struct ChatManager {
    bus: Arc<EventBus>,
    endpoint: String,
    active: Option<ActiveSession>,
}

impl ChatManager {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self::with_endpoint(bus, relay_endpoint())
    }

    pub fn with_endpoint(bus: Arc<EventBus>, endpoint: impl Into<String>) -> Self {
        Self {
            bus,
            endpoint: endpoint.into(),
            active: None,
        }
    }

    pub fn has_open_session(&self) -> bool {
        self.active.is_some()
    }

    /// Start a chat with the seller of `item`. Any prior session is closed
    /// first so exactly one connection is live at a time.
    pub fn open_chat(&mut self, item: &Item, buyer: Participant) -> Session {
        self.close_chat();

        let session = Session::new(item, buyer);
        info!(session = %session.id, item = %item.id, "opening chat session");

        let liveness = CancellationToken::new();
        let (commands, command_rx) = mpsc::channel(32);
        let task = tokio::spawn(run_session(
            session.clone(),
            self.endpoint.clone(),
            self.bus.clone(),
            command_rx,
            liveness.clone(),
        ));

        self.active = Some(ActiveSession {
            session_id: session.id.clone(),
            commands,
            liveness,
            task,
        });
        session
    }

    /// Tear down the active session, cancelling its pending timers and
    /// forcibly closing the connection. Idempotent.
    pub fn close_chat(&mut self) {
        if let Some(active) = self.active.take() {
            info!(session = %active.session_id, "closing chat session");
            active.liveness.cancel();
        }
    }

    pub async fn submit(&self, text: impl Into<String>) {
        match &self.active {
            Some(active) => {
                let _ = active.commands.send(Command::Submit(text.into())).await;
            }
            None => debug!("submit ignored, no chat session is open"),
        }
    }

    /// Explicit user-triggered reconnect; there is no automatic retry loop.
    pub async fn retry(&self) {
        if let Some(active) = &self.active {
            let _ = active.commands.send(Command::Retry).await;
        }
    }

    pub async fn snapshot(&self) -> Option<ChatSnapshot> {
        let active = self.active.as_ref()?;
        let (tx, rx) = oneshot::channel();
        active.commands.send(Command::Snapshot(tx)).await.ok()?;
        rx.await.ok()
    }
}

impl Drop for ChatManager {
    fn drop(&mut self) {
        self.close_chat();
    }
}

/// Per-session event loop. All state transitions happen here, on one task,
/// dispatched from user commands, transport callbacks, and due reply timers.
async fn run_session(
    session: Session,
    endpoint: String,
    bus: Arc<EventBus>,
    mut commands: mpsc::Receiver<Command>,
    liveness: CancellationToken,
) {
    let (transport_tx, mut transport_rx) = mpsc::channel(64);
    let (reply_tx, mut reply_rx) = mpsc::channel::<String>(16);

    let mut conn = ConnectionManager::new(transport_tx);
    let mut conversation = Conversation::new(session.clone(), bus.clone());

    bus.publish(ChatEvent::SessionOpened(session));
    // Welcome must be in the log before any connection event is processed.
    conversation.initialize();
    conn.open(&endpoint);
    publish_state(&bus, &conn);

    loop {
        tokio::select! {
            _ = liveness.cancelled() => break,
            Some(command) = commands.recv() => match command {
                Command::Submit(text) => conversation.submit(&text, &mut conn),
                Command::Retry => {
                    conn.close();
                    conn.open(&endpoint);
                    publish_state(&bus, &conn);
                }
                Command::Snapshot(reply) => {
                    let _ = reply.send(ChatSnapshot {
                        session: conversation.session().clone(),
                        messages: conversation.snapshot(),
                        connection: conn.state(),
                    });
                }
            },
            Some(event) = transport_rx.recv() => {
                handle_transport_event(event, &bus, &mut conn, &mut conversation, &reply_tx, &liveness);
            }
            Some(ack_id) = reply_rx.recv() => conversation.scripted_reply(&ack_id),
        }
    }

    conn.close();
    bus.publish(ChatEvent::SessionClosed);
}

fn handle_transport_event(
    event: TransportEvent,
    bus: &EventBus,
    conn: &mut ConnectionManager,
    conversation: &mut Conversation,
    reply_tx: &mpsc::Sender<String>,
    liveness: &CancellationToken,
) {
    let before = conn.state();
    let Some(kind) = conn.apply(event) else {
        return;
    };
    if conn.state() != before {
        publish_state(bus, conn);
    }

    if let TransportEventKind::Frame(raw) = kind {
        if let InboundOutcome::Acknowledged { id } = conversation.on_inbound_frame(&raw) {
            schedule_reply(id, reply_tx.clone(), liveness.clone());
        }
    }
}

/// Deferred scripted reply, void-checked against the session liveness token
/// so it cannot fire into a torn-down session.
fn schedule_reply(ack_id: String, due: mpsc::Sender<String>, liveness: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = liveness.cancelled() => {}
            _ = tokio::time::sleep(SCRIPTED_REPLY_DELAY) => {
                let _ = due.send(ack_id).await;
            }
        }
    });
}

fn publish_state(bus: &EventBus, conn: &ConnectionManager) {
    let state = conn.state();
    bus.publish(ChatEvent::ConnectionChanged {
        state,
        status: state.status_line().to_string(),
    });
}
