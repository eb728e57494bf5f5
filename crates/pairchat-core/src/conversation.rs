//! Conversation state for a two-party chat
//!
//! A [`Conversation`] owns the ordered message sequence between the local
//! user and one remote user. It knows nothing about the backend; the
//! reconciler drives it from history fetches, optimistic sends, and
//! realtime inserts.

use chrono::Utc;

use crate::types::{Message, MessageId, UserId};

/// The message history between exactly two identified parties.
///
/// Messages are kept in chronological order (ascending `created_at`, ties
/// broken by identifier ascending). No two entries ever share a
/// server-assigned identifier; entries with placeholder identifiers are
/// optimistic sends awaiting confirmation.
///
/// # Example
///
/// ```ignore
/// let mut convo = Conversation::new(local_id, remote_id);
/// convo.replace_all(history);
/// let pending = convo.push_pending("hello");
/// // ... send fails:
/// convo.remove_pending(pending.id);
/// ```
#[derive(Debug, Clone)]
pub struct Conversation {
    /// The local user's id
    local_user: UserId,
    /// The remote user's id
    remote_user: UserId,
    /// Messages in chronological order (oldest first)
    messages: Vec<Message>,
}

impl Conversation {
    /// Create a new empty conversation between two users.
    pub fn new(local_user: UserId, remote_user: UserId) -> Self {
        Self {
            local_user,
            remote_user,
            messages: Vec::new(),
        }
    }

    /// The local user's id.
    pub fn local_user(&self) -> UserId {
        self.local_user
    }

    /// The remote user's id.
    pub fn remote_user(&self) -> UserId {
        self.remote_user
    }

    /// Replace the entire sequence with freshly fetched history.
    ///
    /// Drops any pending entries; a reload is the one operation that may
    /// remove confirmed messages.
    pub fn replace_all(&mut self, mut history: Vec<Message>) {
        history.sort_by_key(|m| (m.created_at, m.id));
        self.messages = history;
    }

    /// Synthesize an optimistic entry for an outgoing send and append it.
    ///
    /// The entry carries a placeholder identifier and the current local
    /// timestamp, so it lands at the end of the sequence.
    pub fn push_pending(&mut self, content: &str) -> Message {
        let message = Message {
            id: MessageId::next_placeholder(),
            content: content.to_string(),
            sender_id: self.local_user,
            receiver_id: self.remote_user,
            created_at: Utc::now(),
        };
        self.messages.push(message.clone());
        message
    }

    /// Remove the pending entry with the given placeholder identifier.
    ///
    /// Returns the removed entry, or None if no such entry exists. Confirmed
    /// entries are never touched.
    pub fn remove_pending(&mut self, id: MessageId) -> Option<Message> {
        if !id.is_placeholder() {
            return None;
        }
        let pos = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(pos))
    }

    /// Remove every pending entry from the sequence.
    pub fn clear_pending(&mut self) {
        self.messages.retain(|m| !m.is_pending());
    }

    /// Insert a confirmed message in chronological order.
    ///
    /// Returns false (and leaves the sequence unchanged) if a message with
    /// the same identifier is already present.
    pub fn insert_confirmed(&mut self, message: Message) -> bool {
        if self.contains(message.id) {
            return false;
        }
        let key = (message.created_at, message.id);
        let pos = self
            .messages
            .iter()
            .position(|m| (m.created_at, m.id) > key)
            .unwrap_or(self.messages.len());
        self.messages.insert(pos, message);
        true
    }

    /// Whether a message with the given identifier is present.
    pub fn contains(&self, id: MessageId) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    /// All messages in chronological order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages, pending entries included.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the conversation has no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent message, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of pending entries currently visible.
    pub fn pending_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_pending()).count()
    }
}
