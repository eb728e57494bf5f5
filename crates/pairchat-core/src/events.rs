//! Event types emitted while a conversation is open
//!
//! Consumers subscribe via [`Reconciler::subscribe_events`] or
//! [`ConversationHandle::subscribe_events`] and receive one event per
//! observable change to the message sequence. Events carry everything a
//! caller needs to react without re-querying state; in particular
//! [`ChatEvent::SendFailed`] returns the unsent content so an input buffer
//! can be restored.
//!
//! [`Reconciler::subscribe_events`]: crate::reconciler::Reconciler::subscribe_events
//! [`ConversationHandle::subscribe_events`]: crate::engine::ConversationHandle::subscribe_events

use crate::types::Message;

/// Events emitted by an open conversation
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// An optimistic entry was appended for an outgoing send
    MessagePending {
        /// The pending entry (placeholder identifier, local timestamp)
        message: Message,
    },
    /// A confirmed message arrived over the realtime channel
    MessageConfirmed {
        /// The confirmed entry (server identifier and timestamp)
        message: Message,
    },
    /// A submission failed and its optimistic entry was rolled back
    SendFailed {
        /// The unsent content, for restoring the caller's input buffer
        content: String,
        /// Why the submission failed
        reason: String,
    },
    /// The sequence was replaced wholesale by a history load
    HistoryLoaded {
        /// Number of messages fetched
        count: usize,
    },
    /// The realtime subscription ended (conversation closed)
    SubscriptionClosed,
}

impl ChatEvent {
    /// The message associated with this event, if any
    pub fn message(&self) -> Option<&Message> {
        match self {
            ChatEvent::MessagePending { message } => Some(message),
            ChatEvent::MessageConfirmed { message } => Some(message),
            _ => None,
        }
    }
}
