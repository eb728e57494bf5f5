//! Backend capability for the hosted chat service
//!
//! The backend is an external collaborator: it owns persistence, auth, and
//! realtime fan-out. This module defines the capability the rest of the
//! crate is written against, so the engine and reconciler never touch a
//! global client handle and tests can substitute an in-memory fake.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  Backend (this trait)                                      │
//! │  - auth: sign_in / sign_up / sign_out                      │
//! │  - rows: list_profiles / fetch_conversation / insert       │
//! │  - realtime: subscribe_inserts → InsertSubscription        │
//! ├────────────────────────────────────────────────────────────┤
//! │  RestBackend (rest.rs + realtime.rs)                       │
//! │  - HTTP to the hosted service, websocket for inserts       │
//! └────────────────────────────────────────────────────────────┘
//! ```

mod realtime;
mod rest;

pub use realtime::RealtimeClient;
pub use rest::RestBackend;

use std::fmt::Debug;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::ChatResult;
use crate::types::{Message, NewMessage, Profile, Session, UserId};

/// Capability describing the hosted backend service.
///
/// All row-level operations carry the session's access token explicitly;
/// implementations hold no per-user state, so one backend instance serves
/// any number of sessions.
#[async_trait]
pub trait Backend: Send + Sync + Debug {
    /// Exchange credentials for a session.
    async fn sign_in(&self, email: &str, password: &str) -> ChatResult<Session>;

    /// Register a new account; the username travels as signup metadata and
    /// becomes the profile row.
    async fn sign_up(&self, email: &str, password: &str, username: &str) -> ChatResult<()>;

    /// Invalidate the session server-side.
    async fn sign_out(&self, access_token: &str) -> ChatResult<()>;

    /// Fetch every profile except `exclude` (the signed-in user).
    async fn list_profiles(&self, access_token: &str, exclude: UserId) -> ChatResult<Vec<Profile>>;

    /// Fetch all messages between `a` and `b` in either direction, ordered
    /// ascending by creation time.
    async fn fetch_conversation(
        &self,
        access_token: &str,
        a: UserId,
        b: UserId,
    ) -> ChatResult<Vec<Message>>;

    /// Insert a message row; the server assigns identifier and timestamp.
    async fn insert_message(&self, access_token: &str, message: &NewMessage) -> ChatResult<()>;

    /// Open the realtime channel for inserts into the messages table.
    ///
    /// The channel is table-wide, not pre-filtered by conversation; the
    /// subscriber filters client-side.
    async fn subscribe_inserts(&self, access_token: &str) -> ChatResult<InsertSubscription>;
}

type Closer = Box<dyn FnOnce() + Send>;

/// A live realtime subscription to message inserts.
///
/// Yields one raw record per row inserted into the messages table, in
/// delivery order, until closed. Dropping the subscription releases the
/// underlying channel, so teardown happens on every exit path.
pub struct InsertSubscription {
    rx: mpsc::Receiver<serde_json::Value>,
    closer: Option<Closer>,
}

impl InsertSubscription {
    /// Build a subscription from a record channel and a close action.
    pub fn new(rx: mpsc::Receiver<serde_json::Value>, closer: Closer) -> Self {
        Self {
            rx,
            closer: Some(closer),
        }
    }

    /// Receive the next inserted record.
    ///
    /// Returns None once the subscription is closed and drained.
    pub async fn recv(&mut self) -> Option<serde_json::Value> {
        self.rx.recv().await
    }

    /// Close the subscription explicitly.
    ///
    /// Idempotent; also invoked on drop.
    pub fn close(&mut self) {
        if let Some(closer) = self.closer.take() {
            debug!("Closing insert subscription");
            closer();
        }
        self.rx.close();
    }
}

impl Drop for InsertSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl Debug for InsertSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsertSubscription")
            .field("closed", &self.closer.is_none())
            .finish()
    }
}
