//! Core types for Pairchat

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a user (server-assigned at signup)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Create a UserId from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parse from string representation
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Base of the placeholder identifier range.
///
/// Server identifiers are sequential integers starting from 1; placeholders
/// for unconfirmed sends are allocated from a counter starting here so the
/// two ranges never overlap.
pub const PLACEHOLDER_ID_BASE: i64 = 1 << 40;

static NEXT_PLACEHOLDER: AtomicI64 = AtomicI64::new(PLACEHOLDER_ID_BASE);

/// Unique identifier for a message.
///
/// Either a server-assigned integer or a locally generated placeholder for a
/// send that has not yet been confirmed. Placeholders are drawn from a range
/// disjoint from server identifiers (see [`PLACEHOLDER_ID_BASE`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl MessageId {
    /// Allocate the next placeholder identifier
    pub fn next_placeholder() -> Self {
        Self(NEXT_PLACEHOLDER.fetch_add(1, Ordering::Relaxed))
    }

    /// Whether this identifier is a local placeholder (unconfirmed send)
    pub fn is_placeholder(&self) -> bool {
        self.0 >= PLACEHOLDER_ID_BASE
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user profile visible in the user list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// The user's identifier
    pub id: UserId,
    /// Display name chosen at signup
    pub username: String,
}

/// A single chat message.
///
/// Exactly one of `sender_id`/`receiver_id` is the local user for every
/// message belonging to a conversation; the other is the remote user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned identifier, or a placeholder for unconfirmed sends
    pub id: MessageId,
    /// Message text
    pub content: String,
    /// Author of the message
    pub sender_id: UserId,
    /// Addressee of the message
    pub receiver_id: UserId,
    /// Creation time (server-assigned once confirmed; client-local while pending)
    #[serde(deserialize_with = "crate::wire::deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Whether this message is an unconfirmed optimistic send
    pub fn is_pending(&self) -> bool {
        self.id.is_placeholder()
    }

    /// Whether this message belongs to the conversation between `a` and `b`,
    /// in either direction.
    pub fn belongs_to(&self, a: UserId, b: UserId) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }
}

/// Insert payload for a new message; the server assigns id and created_at
#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    /// Author of the message
    pub sender_id: UserId,
    /// Addressee of the message
    pub receiver_id: UserId,
    /// Message text
    pub content: String,
}

/// The signed-in user as reported by the auth endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// The user's identifier
    pub id: UserId,
    /// Email address the account was created with
    pub email: Option<String>,
}

/// An authenticated session.
///
/// Held in memory for the process lifetime; token refresh is owned by the
/// backend service and is out of scope here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token for subsequent requests
    pub access_token: String,
    /// The signed-in user
    pub user: AuthUser,
}
