use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use unimarket::bus::{ChatEvent, EventBus};
use unimarket::catalog::{Catalog, Item};
use unimarket::chat::{DeliveryStatus, Participant, SenderRole};
use unimarket::connection::ConnectionState;
use unimarket::manager::ChatManager;
use unimarket::relay;

async fn start_relay() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(relay::serve(listener));
    format!("ws://{addr}/ws")
}

fn lamp() -> Item {
    Catalog::with_seed_items()
        .items()
        .iter()
        .find(|item| item.title.contains("Desk Lamp"))
        .unwrap()
        .clone()
}

/// Wait for the first event matching `pred`, skipping everything else.
async fn wait_for(
    rx: &mut broadcast::Receiver<ChatEvent>,
    pred: impl Fn(&ChatEvent) -> bool,
) -> ChatEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("bus stays open");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("expected event within 5s")
}

#[tokio::test]
async fn buyer_message_round_trips_through_the_relay() {
    let endpoint = start_relay().await;
    let bus = Arc::new(EventBus::new());
    let mut rx = bus.subscribe();
    let mut manager = ChatManager::with_endpoint(bus.clone(), endpoint);

    let session = manager.open_chat(&lamp(), Participant::new("Jamie Park"));
    assert_eq!(session.seller.name, "Emma Wilson");

    // The welcome is in the log before the connection is up.
    let welcome = wait_for(&mut rx, |e| matches!(e, ChatEvent::MessageAppended(_))).await;
    let ChatEvent::MessageAppended(welcome) = welcome else {
        unreachable!()
    };
    assert_eq!(welcome.sender, SenderRole::Seller);
    assert_eq!(welcome.status, DeliveryStatus::Delivered);
    assert!(welcome.content.contains("Emma Wilson"));
    assert!(welcome.content.contains("IKEA Desk Lamp - White"));
    assert!(welcome.content.contains("Jamie"));

    wait_for(&mut rx, |e| {
        matches!(
            e,
            ChatEvent::ConnectionChanged {
                state: ConnectionState::Open,
                ..
            }
        )
    })
    .await;

    manager.submit("Is this still available?").await;

    let appended = wait_for(&mut rx, |e| {
        matches!(e, ChatEvent::MessageAppended(m) if m.sender == SenderRole::Buyer)
    })
    .await;
    let ChatEvent::MessageAppended(pending) = appended else {
        unreachable!()
    };
    assert_eq!(pending.status, DeliveryStatus::Pending);

    // The relay echoes our frame back; the echo is the acknowledgment.
    let delivered = wait_for(&mut rx, |e| matches!(e, ChatEvent::MessageDelivered { .. })).await;
    let ChatEvent::MessageDelivered { id } = delivered else {
        unreachable!()
    };
    assert_eq!(id, pending.id);

    // The scripted seller reply follows after the fixed delay.
    let reply = wait_for(&mut rx, |e| {
        matches!(e, ChatEvent::MessageAppended(m) if m.sender == SenderRole::Seller)
    })
    .await;
    let ChatEvent::MessageAppended(reply) = reply else {
        unreachable!()
    };
    assert_eq!(reply.id, format!("{}-reply", pending.id));
    assert!(reply.content.contains("IKEA Desk Lamp - White"));
    assert!(reply.content.contains("Jamie"));

    let snapshot = manager.snapshot().await.expect("session is live");
    assert_eq!(snapshot.session.id, session.id);
    assert_eq!(snapshot.connection, ConnectionState::Open);
    assert_eq!(snapshot.messages.len(), 3);
    assert_eq!(snapshot.messages[1].status, DeliveryStatus::Delivered);

    manager.close_chat();
    wait_for(&mut rx, |e| matches!(e, ChatEvent::SessionClosed)).await;
    manager.close_chat();
}

#[tokio::test]
async fn closing_the_chat_cancels_the_pending_scripted_reply() {
    let endpoint = start_relay().await;
    let bus = Arc::new(EventBus::new());
    let mut rx = bus.subscribe();
    let mut manager = ChatManager::with_endpoint(bus.clone(), endpoint);

    manager.open_chat(&lamp(), Participant::new("Jamie Park"));
    wait_for(&mut rx, |e| {
        matches!(
            e,
            ChatEvent::ConnectionChanged {
                state: ConnectionState::Open,
                ..
            }
        )
    })
    .await;

    manager.submit("ping").await;
    wait_for(&mut rx, |e| matches!(e, ChatEvent::MessageDelivered { .. })).await;

    // Tear down before the 700ms reply timer fires.
    manager.close_chat();
    wait_for(&mut rx, |e| matches!(e, ChatEvent::SessionClosed)).await;

    // Nothing from the dead session may land after teardown.
    let late = tokio::time::timeout(Duration::from_millis(1200), async {
        loop {
            match rx.recv().await {
                Ok(ChatEvent::MessageAppended(m)) if m.sender == SenderRole::Seller => return m,
                Ok(_) => continue,
                Err(_) => std::future::pending::<()>().await,
            }
        }
    })
    .await;
    assert!(late.is_err(), "scripted reply fired into a closed session");
}

#[tokio::test]
async fn retry_reconnects_after_the_relay_drops() {
    let endpoint = start_relay().await;
    let bus = Arc::new(EventBus::new());
    let mut rx = bus.subscribe();
    let mut manager = ChatManager::with_endpoint(bus.clone(), endpoint);

    manager.open_chat(&lamp(), Participant::new("Jamie Park"));
    wait_for(&mut rx, |e| {
        matches!(
            e,
            ChatEvent::ConnectionChanged {
                state: ConnectionState::Open,
                ..
            }
        )
    })
    .await;

    // Reconnect is explicit and user-triggered, never automatic.
    manager.retry().await;
    wait_for(&mut rx, |e| {
        matches!(
            e,
            ChatEvent::ConnectionChanged {
                state: ConnectionState::Connecting,
                ..
            }
        )
    })
    .await;
    wait_for(&mut rx, |e| {
        matches!(
            e,
            ChatEvent::ConnectionChanged {
                state: ConnectionState::Open,
                ..
            }
        )
    })
    .await;

    // The log survives the reconnect.
    let snapshot = manager.snapshot().await.expect("session is live");
    assert_eq!(snapshot.messages.len(), 1);

    manager.close_chat();
}
