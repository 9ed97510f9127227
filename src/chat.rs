use crate::catalog::Item;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    Buyer,
    Seller,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
}

/// One entry in a session's message log. Immutable once created except for
/// `status`, which flips to `Delivered` when the relay echoes the id back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: SenderRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub status: DeliveryStatus,
}

impl ChatMessage {
    /// A buyer message starts out pending until the relay confirms it.
    pub fn buyer(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender: SenderRole::Buyer,
            content: content.into(),
            timestamp: Utc::now(),
            status: DeliveryStatus::Pending,
        }
    }

    /// Seller messages are synthesized locally, so they are born delivered.
    pub fn seller(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sender: SenderRole::Seller,
            content: content.into(),
            timestamp: Utc::now(),
            status: DeliveryStatus::Delivered,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender: SenderRole::System,
            content: content.into(),
            timestamp: Utc::now(),
            status: DeliveryStatus::Delivered,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub avatar: Option<String>,
}

impl Participant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            avatar: None,
        }
    }
}

/// One active chat about one listing. Exactly one session is open at a time;
/// opening a new one discards the prior session and its connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub item_id: String,
    pub item_title: String,
    pub seller: Participant,
    pub buyer: Participant,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(item: &Item, buyer: Participant) -> Self {
        Self {
            id: format!("ses_{}", Uuid::new_v4().simple()),
            item_id: item.id.clone(),
            item_title: item.title.clone(),
            seller: Participant {
                name: item.seller.name.clone(),
                avatar: Some(item.seller.avatar.clone()),
            },
            buyer,
            created_at: Utc::now(),
        }
    }

    pub fn buyer_first_name(&self) -> &str {
        self.buyer
            .name
            .trim()
            .split_whitespace()
            .next()
            .unwrap_or("there")
    }

    /// The seller greeting that seeds every fresh message log.
    pub fn welcome(&self) -> ChatMessage {
        ChatMessage::seller(
            Uuid::new_v4().to_string(),
            format!(
                "Hi {}! This is {}. Thanks for your interest in \"{}\".",
                self.buyer_first_name(),
                self.seller.name,
                self.item_title
            ),
        )
    }

    /// The scripted follow-up appended after a delivery acknowledgment.
    pub fn scripted_reply(&self, ack_id: &str) -> ChatMessage {
        ChatMessage::seller(
            format!("{ack_id}-reply"),
            format!(
                "Thanks for the message, {}! Let me know if you have any questions about \"{}\".",
                self.buyer_first_name(),
                self.item_title
            ),
        )
    }
}

/// Outbound wire frame. The relay echoes this back verbatim, which is how a
/// dumb echo channel doubles as a delivery acknowledgment: we recognize our
/// own `id` on the way back in.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundFrame<'a> {
    pub id: &'a str,
    pub sender: SenderRole,
    pub content: &'a str,
    pub timestamp: DateTime<Utc>,
    pub status: DeliveryStatus,
    pub buyer_name: &'a str,
    pub item_id: &'a str,
}

impl<'a> OutboundFrame<'a> {
    pub fn new(message: &'a ChatMessage, session: &'a Session) -> Self {
        Self {
            id: &message.id,
            sender: message.sender,
            content: &message.content,
            timestamp: message.timestamp,
            status: message.status,
            buyer_name: &session.buyer.name,
            item_id: &session.item_id,
        }
    }
}

/// Inbound acknowledgment: any JSON object carrying `id`. Every other field
/// is ignored by the protocol.
#[derive(Debug, Deserialize)]
pub struct AckFrame {
    pub id: String,
}
