use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

/// Public echo relay used outside local development.
pub const PUBLIC_RELAY_URL: &str = "wss://echo.websocket.events";

/// Relay served by the `unimarket` daemon during local development.
pub const LOCAL_RELAY_URL: &str = "ws://127.0.0.1:3001";

/// Pick the relay endpoint at runtime: the local dev relay when
/// `UNIMARKET_LOCAL_RELAY` is present in the environment, the public echo
/// relay otherwise. Deliberately not a CLI flag.
pub fn relay_endpoint() -> String {
    if std::env::var("UNIMARKET_LOCAL_RELAY").is_ok() {
        LOCAL_RELAY_URL.to_string()
    } else {
        PUBLIC_RELAY_URL.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Error,
}

impl ConnectionState {
    /// User-visible status indicator text.
    pub fn status_line(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "offline",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "connected",
            ConnectionState::Error => "connection lost, retry",
        }
    }

    /// The transition table. Frames never move the state; a close that
    /// follows an error keeps the loss signal visible, and a close that
    /// arrives before the socket ever opened counts as a failed connect so
    /// the host still offers a retry.
    fn on_event(self, event: &TransportEventKind) -> Self {
        use ConnectionState::*;
        use TransportEventKind::*;
        match (self, event) {
            (state, Frame(_)) => state,
            (Connecting, Opened) => Open,
            (Connecting | Open, Errored) => Error,
            (Open, Closed) => Idle,
            (Error | Connecting, Closed) => Error,
            (state, event) => {
                debug!(?state, ?event, "ignoring transport event");
                state
            }
        }
    }
}

#[derive(Debug)]
pub enum TransportEventKind {
    Opened,
    Frame(String),
    Errored,
    Closed,
}

/// A transport callback, tagged with the epoch of the connection that
/// produced it so events from a torn-down socket cannot touch a successor.
#[derive(Debug)]
pub struct TransportEvent {
    epoch: u64,
    pub kind: TransportEventKind,
}

struct Link {
    outbound: mpsc::Sender<String>,
    io: JoinHandle<()>,
}

/// Owns at most one live WebSocket connection for the current session and
/// the connection-state machine around it. Transport failures surface as
/// state transitions, never as errors to the caller; reconnecting is always
/// an explicit `close()` + `open()` by the owner.
pub struct ConnectionManager {
    state: ConnectionState,
    epoch: u64,
    events: mpsc::Sender<TransportEvent>,
    link: Option<Link>,
}

impl ConnectionManager {
    pub fn new(events: mpsc::Sender<TransportEvent>) -> Self {
        Self {
            state: ConnectionState::Idle,
            epoch: 0,
            events,
            link: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Spawn a connection attempt to `endpoint`. No-op while a connection is
    /// already connecting or open; the caller tears the old one down first.
    pub fn open(&mut self, endpoint: &str) {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Open
        ) {
            warn!(state = ?self.state, "open() ignored, a connection is already live");
            return;
        }

        self.epoch += 1;
        self.state = ConnectionState::Connecting;

        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let io = tokio::spawn(run_io(
            endpoint.to_string(),
            self.epoch,
            self.events.clone(),
            outbound_rx,
        ));
        self.link = Some(Link {
            outbound: outbound_tx,
            io,
        });
    }

    /// Hand a serialized frame to the writer. Outside the `Open` state this
    /// is a logged no-op; the UI already disables input there.
    pub fn send(&mut self, payload: String) {
        if self.state != ConnectionState::Open {
            warn!(state = ?self.state, "dropping outbound frame, connection is not open");
            return;
        }

        let delivered = self
            .link
            .as_ref()
            .is_some_and(|link| link.outbound.try_send(payload).is_ok());
        if !delivered {
            warn!("writer channel gone mid-session, marking connection lost");
            self.state = ConnectionState::Error;
        }
    }

    /// Tear down the live connection, if any, and return to `Idle`. Safe to
    /// call repeatedly and on an already-closed manager.
    pub fn close(&mut self) {
        if let Some(link) = self.link.take() {
            link.io.abort();
        }
        self.state = ConnectionState::Idle;
    }

    /// Apply a transport event to the state machine. Events from a previous
    /// connection epoch are discarded; for current events the kind is handed
    /// back so the owner can dispatch inbound frames.
    pub fn apply(&mut self, event: TransportEvent) -> Option<TransportEventKind> {
        if event.epoch != self.epoch {
            debug!(?event, "discarding event from a torn-down connection");
            return None;
        }
        self.state = self.state.on_event(&event.kind);
        Some(event.kind)
    }
}

/// I/O task for one connection attempt. Mirrors browser WebSocket callback
/// order: a failure emits `Errored` followed by `Closed`.
async fn run_io(
    endpoint: String,
    epoch: u64,
    events: mpsc::Sender<TransportEvent>,
    mut outbound: mpsc::Receiver<String>,
) {
    let emit = |kind: TransportEventKind| {
        let events = events.clone();
        async move {
            let _ = events.send(TransportEvent { epoch, kind }).await;
        }
    };

    let ws = match connect_async(endpoint.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(err) => {
            warn!(%endpoint, "websocket connect failed: {err}");
            emit(TransportEventKind::Errored).await;
            emit(TransportEventKind::Closed).await;
            return;
        }
    };
    emit(TransportEventKind::Opened).await;

    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            payload = outbound.recv() => match payload {
                Some(text) => {
                    if let Err(err) = sink.send(Message::Text(text.into())).await {
                        warn!("websocket send failed: {err}");
                        emit(TransportEventKind::Errored).await;
                        emit(TransportEventKind::Closed).await;
                        break;
                    }
                }
                // The manager dropped the link; it already moved to Idle.
                None => break,
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    emit(TransportEventKind::Frame(text.as_str().to_owned())).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    emit(TransportEventKind::Closed).await;
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!("websocket read failed: {err}");
                    emit(TransportEventKind::Errored).await;
                    emit(TransportEventKind::Closed).await;
                    break;
                }
            },
        }
    }
}

#[cfg(test)]
impl ConnectionManager {
    /// Install a fake open link without any I/O; returns the capture side of
    /// the writer channel.
    pub(crate) fn open_for_test(&mut self) -> mpsc::Receiver<String> {
        let (outbound, rx) = mpsc::channel(16);
        self.epoch += 1;
        self.state = ConnectionState::Open;
        self.link = Some(Link {
            outbound,
            io: tokio::spawn(std::future::pending()),
        });
        rx
    }

    pub(crate) fn force_state(&mut self, state: ConnectionState) {
        self.state = state;
    }

    pub(crate) fn event(&self, kind: TransportEventKind) -> TransportEvent {
        TransportEvent {
            epoch: self.epoch,
            kind,
        }
    }

    pub(crate) fn stale_event(&self, kind: TransportEventKind) -> TransportEvent {
        TransportEvent {
            epoch: self.epoch.wrapping_sub(1),
            kind,
        }
    }
}
