//! Conversation reconciler
//!
//! Merges the three sources feeding a two-party conversation (the initial
//! history fetch, local optimistic sends, and remote realtime inserts)
//! into one duplicate-free, chronologically ordered view.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Reconciler                                                  │
//! │                                                              │
//! │  load_history ──► replace sequence wholesale                 │
//! │  send_message ──► append pending, submit async,              │
//! │                   roll back on failure                       │
//! │  on_remote_insert ─► filter by pair, clear pending,          │
//! │                      append if id unseen                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A message's visibility moves `absent → pending → confirmed`, or
//! `pending → absent` when its submission fails. Confirmed entries are never
//! removed short of a full history reload.
//!
//! All sequence mutation goes through one mutex-guarded [`Conversation`];
//! the lock is never held across an await, so the fetch, any number of
//! in-flight submissions, and realtime consumption can overlap freely.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::conversation::Conversation;
use crate::error::ChatResult;
use crate::events::ChatEvent;
use crate::types::{Message, NewMessage, UserId};
use crate::wire;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Reconciles one two-party conversation against the backend.
///
/// Owns the in-memory message sequence for the pair {local, remote}. The
/// sequence lives for the reconciler's lifetime only; the backend is the
/// source of truth and a reload replaces everything.
#[derive(Debug)]
pub struct Reconciler {
    backend: Arc<dyn Backend>,
    access_token: String,
    state: Mutex<Conversation>,
    event_tx: broadcast::Sender<ChatEvent>,
}

impl Reconciler {
    /// Create a reconciler for the conversation between `local` and `remote`.
    pub fn new(
        backend: Arc<dyn Backend>,
        access_token: impl Into<String>,
        local: UserId,
        remote: UserId,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            backend,
            access_token: access_token.into(),
            state: Mutex::new(Conversation::new(local, remote)),
            event_tx,
        }
    }

    /// The local user's id.
    pub fn local_user(&self) -> UserId {
        self.state.lock().unwrap().local_user()
    }

    /// The remote user's id.
    pub fn remote_user(&self) -> UserId {
        self.state.lock().unwrap().remote_user()
    }

    /// Fetch the full history for the pair and replace the sequence with it.
    ///
    /// Returns the number of messages loaded. Any pending entries are
    /// dropped; a reload is the one way a stuck pending entry goes away.
    pub async fn load_history(&self) -> ChatResult<usize> {
        let (local, remote) = {
            let state = self.state.lock().unwrap();
            (state.local_user(), state.remote_user())
        };

        let history = self
            .backend
            .fetch_conversation(&self.access_token, local, remote)
            .await?;
        let count = history.len();

        self.state.lock().unwrap().replace_all(history);
        info!(count, "Loaded conversation history");
        let _ = self.event_tx.send(ChatEvent::HistoryLoaded { count });
        Ok(count)
    }

    /// Optimistically append `content` and submit it in the background.
    ///
    /// The pending entry is visible immediately, before any network round
    /// trip. If the submission fails, exactly that entry is removed and a
    /// [`ChatEvent::SendFailed`] carries the content back for the caller's
    /// input buffer. If the submission succeeds, nothing further happens
    /// here: the confirmed row arrives through [`on_remote_insert`], which
    /// is what clears the placeholder. A submission that never resolves
    /// leaves its pending entry visible until the next reload; there is no
    /// timeout or retry.
    ///
    /// Empty content is a no-op.
    ///
    /// [`on_remote_insert`]: Reconciler::on_remote_insert
    pub fn send_message(self: &Arc<Self>, content: &str) {
        if content.is_empty() {
            debug!("Ignoring empty send");
            return;
        }

        let pending = {
            let mut state = self.state.lock().unwrap();
            state.push_pending(content)
        };
        let _ = self.event_tx.send(ChatEvent::MessagePending {
            message: pending.clone(),
        });

        let outgoing = NewMessage {
            sender_id: pending.sender_id,
            receiver_id: pending.receiver_id,
            content: pending.content.clone(),
        };

        let reconciler = self.clone();
        tokio::spawn(async move {
            match reconciler
                .backend
                .insert_message(&reconciler.access_token, &outgoing)
                .await
            {
                Ok(()) => {
                    debug!(placeholder = %pending.id, "Message submitted");
                }
                Err(e) => {
                    warn!(placeholder = %pending.id, error = %e, "Send failed; rolling back");
                    reconciler.state.lock().unwrap().remove_pending(pending.id);
                    let _ = reconciler.event_tx.send(ChatEvent::SendFailed {
                        content: outgoing.content,
                        reason: e.to_string(),
                    });
                }
            }
        });
    }

    /// Feed one realtime insert record into the conversation.
    ///
    /// Records are table-wide; anything whose sender/receiver pair is not
    /// {local, remote} in either order is ignored. A matching record first
    /// clears every pending entry, not just the one it confirms. This is
    /// the deduplication policy the client has always used: it trades
    /// precision for simplicity, and can momentarily hide an unrelated
    /// in-flight send until that send's own confirmation arrives. The
    /// record is then appended in chronological order unless its id is
    /// already present.
    ///
    /// Records that fail to decode are logged and dropped; the realtime
    /// channel is best-effort.
    pub fn on_remote_insert(&self, record: serde_json::Value) {
        let message = match wire::decode_message(record) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable realtime insert");
                return;
            }
        };

        let confirmed = {
            let mut state = self.state.lock().unwrap();
            if !message.belongs_to(state.local_user(), state.remote_user()) {
                debug!(id = %message.id, "Ignoring insert for another conversation");
                return;
            }
            state.clear_pending();
            state.insert_confirmed(message.clone())
        };

        if confirmed {
            debug!(id = %message.id, "Confirmed message");
            let _ = self
                .event_tx
                .send(ChatEvent::MessageConfirmed { message });
        }
    }

    /// Snapshot of the visible sequence, pending entries included.
    pub fn messages(&self) -> Vec<Message> {
        self.state.lock().unwrap().messages().to_vec()
    }

    /// Number of pending entries currently visible.
    pub fn pending_count(&self) -> usize {
        self.state.lock().unwrap().pending_count()
    }

    /// Subscribe to conversation events.
    ///
    /// Multiple subscribers can exist; events are broadcast to all.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_tx.subscribe()
    }

    pub(crate) fn emit(&self, event: ChatEvent) {
        let _ = self.event_tx.send(event);
    }
}
