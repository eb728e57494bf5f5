//! Main ChatEngine - the primary entry point for Pairchat
//!
//! ChatEngine coordinates the backend capability, the signed-in session,
//! and conversation lifecycle:
//! - sign-in / sign-up / sign-out against the hosted auth endpoint
//! - profile listing for the user picker
//! - opening a conversation: history load, realtime subscription, and the
//!   listener task feeding the reconciler
//!
//! # Example
//!
//! ```ignore
//! use pairchat_core::{BackendConfig, ChatEngine};
//!
//! let config = BackendConfig::from_env()?;
//! let engine = ChatEngine::from_config(config);
//!
//! engine.sign_in("alice", "hunter2").await?;
//! let profiles = engine.list_profiles().await?;
//!
//! let chat = engine.open_conversation(profiles[0].id).await?;
//! chat.send("hello!");
//! for msg in chat.messages() {
//!     println!("{}: {}", msg.sender_id, msg.content);
//! }
//! chat.close();
//! ```

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{Backend, RestBackend};
use crate::config::BackendConfig;
use crate::error::{ChatError, ChatResult};
use crate::events::ChatEvent;
use crate::reconciler::Reconciler;
use crate::types::{Message, Profile, Session, UserId};

/// Accounts are keyed by email server-side; users type a bare username and
/// the client appends this domain, matching the signup convention.
const DEFAULT_EMAIL_DOMAIN: &str = "yourapp.com";

/// Main entry point for Pairchat.
///
/// Holds the signed-in session for the process lifetime (token refresh is
/// the service's concern, not ours) and opens conversations over the
/// injected backend capability.
#[derive(Debug)]
pub struct ChatEngine {
    backend: Arc<dyn Backend>,
    email_domain: String,
    session: Mutex<Option<Session>>,
}

impl ChatEngine {
    /// Create an engine over an explicit backend capability.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            email_domain: DEFAULT_EMAIL_DOMAIN.to_string(),
            session: Mutex::new(None),
        }
    }

    /// Create an engine talking to the hosted service described by `config`.
    pub fn from_config(config: BackendConfig) -> Self {
        let email_domain = config.email_domain.clone();
        Self {
            backend: Arc::new(RestBackend::new(config)),
            email_domain,
            session: Mutex::new(None),
        }
    }

    /// Override the synthetic email domain.
    pub fn with_email_domain(mut self, domain: impl Into<String>) -> Self {
        self.email_domain = domain.into();
        self
    }

    fn email_for(&self, username: &str) -> String {
        format!("{}@{}", username, self.email_domain)
    }

    /// Sign in with a username and password.
    ///
    /// The account email is synthesized as `<username>@<domain>`. The
    /// returned session is also stored on the engine for subsequent calls.
    pub async fn sign_in(&self, username: &str, password: &str) -> ChatResult<Session> {
        let email = self.email_for(username);
        let session = self.backend.sign_in(&email, password).await?;
        info!(user = %session.user.id, "Signed in");
        *self.session.lock().unwrap() = Some(session.clone());
        Ok(session)
    }

    /// Register a new account.
    ///
    /// The username travels as signup metadata and becomes the profile row.
    pub async fn sign_up(&self, username: &str, password: &str) -> ChatResult<()> {
        if username.is_empty() || password.is_empty() {
            return Err(ChatError::Auth(
                "username and password cannot be empty".to_string(),
            ));
        }
        let email = self.email_for(username);
        self.backend.sign_up(&email, password, username).await?;
        info!(username, "Signed up");
        Ok(())
    }

    /// Sign out.
    ///
    /// The server-side call is best-effort; the local session is cleared
    /// either way.
    pub async fn sign_out(&self) {
        let session = self.session.lock().unwrap().take();
        if let Some(session) = session {
            if let Err(e) = self.backend.sign_out(&session.access_token).await {
                warn!(error = %e, "Server-side sign-out failed");
            }
            info!(user = %session.user.id, "Signed out");
        }
    }

    /// The current session, if signed in.
    pub fn session(&self) -> Option<Session> {
        self.session.lock().unwrap().clone()
    }

    /// Adopt a previously obtained session (e.g. one persisted by a CLI).
    pub fn restore_session(&self, session: Session) {
        *self.session.lock().unwrap() = Some(session);
    }

    /// Whether a session is held.
    pub fn is_signed_in(&self) -> bool {
        self.session.lock().unwrap().is_some()
    }

    fn require_session(&self) -> ChatResult<Session> {
        self.session().ok_or(ChatError::NotSignedIn)
    }

    /// List every profile except the signed-in user's.
    pub async fn list_profiles(&self) -> ChatResult<Vec<Profile>> {
        let session = self.require_session()?;
        self.backend
            .list_profiles(&session.access_token, session.user.id)
            .await
    }

    /// Open the conversation with `remote`.
    ///
    /// Loads the full history, joins the realtime channel, and spawns the
    /// listener task that feeds inserts to the reconciler. Both the load
    /// and the subscription setup are recoverable failures: the caller gets
    /// the error and may simply try again.
    pub async fn open_conversation(&self, remote: UserId) -> ChatResult<ConversationHandle> {
        let session = self.require_session()?;
        let local = session.user.id;

        let reconciler = Arc::new(Reconciler::new(
            self.backend.clone(),
            session.access_token.clone(),
            local,
            remote,
        ));
        reconciler.load_history().await?;

        let mut subscription = self.backend.subscribe_inserts(&session.access_token).await?;
        info!(%local, %remote, "Conversation opened");

        let listener_reconciler = reconciler.clone();
        let listener = tokio::spawn(async move {
            while let Some(record) = subscription.recv().await {
                listener_reconciler.on_remote_insert(record);
            }
            debug!("Insert subscription drained");
            listener_reconciler.emit(ChatEvent::SubscriptionClosed);
        });

        Ok(ConversationHandle {
            reconciler,
            listener,
        })
    }
}

/// An open conversation view.
///
/// Wraps the reconciler plus the realtime listener task. The subscription
/// is released when the handle is closed or dropped, whichever comes first:
/// navigation away, an error path, or plain scope exit all tear it down.
#[derive(Debug)]
pub struct ConversationHandle {
    reconciler: Arc<Reconciler>,
    listener: JoinHandle<()>,
}

impl ConversationHandle {
    /// The remote user of this conversation.
    pub fn remote_user(&self) -> UserId {
        self.reconciler.remote_user()
    }

    /// Snapshot of the visible message sequence, pending entries included.
    pub fn messages(&self) -> Vec<Message> {
        self.reconciler.messages()
    }

    /// Number of pending entries currently visible.
    pub fn pending_count(&self) -> usize {
        self.reconciler.pending_count()
    }

    /// Optimistically send a message; see [`Reconciler::send_message`].
    pub fn send(&self, content: &str) {
        self.reconciler.send_message(content);
    }

    /// Re-fetch the history, replacing the sequence wholesale.
    pub async fn reload(&self) -> ChatResult<usize> {
        self.reconciler.load_history().await
    }

    /// Subscribe to conversation events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ChatEvent> {
        self.reconciler.subscribe_events()
    }

    /// Close the conversation, releasing the realtime subscription.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for ConversationHandle {
    fn drop(&mut self) {
        if !self.listener.is_finished() {
            self.listener.abort();
            self.reconciler.emit(ChatEvent::SubscriptionClosed);
            debug!(remote = %self.reconciler.remote_user(), "Conversation closed");
        }
    }
}
