//! In-memory backend fake for integration tests
//!
//! Implements the full backend capability against process-local state:
//! accounts, profile rows, message rows, and a realtime feed tests inject
//! into directly. Failure flags let a test script the next transport
//! outcome.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use tokio::sync::mpsc;

use pairchat_core::backend::{Backend, InsertSubscription};
use pairchat_core::{
    AuthUser, ChatError, ChatResult, Message, NewMessage, Profile, Session, UserId,
};

#[derive(Debug, Default)]
struct Inner {
    accounts: HashMap<String, (String, UserId)>,
    profiles: Vec<Profile>,
    history: Vec<Message>,
    inserted: Vec<NewMessage>,
    subscribers: Vec<mpsc::Sender<serde_json::Value>>,
    next_id: i64,
    fail_fetch: bool,
    fail_insert: bool,
    fail_insert_content: Option<String>,
    fail_subscribe: bool,
    auto_confirm: bool,
}

/// Scriptable in-memory stand-in for the hosted service.
#[derive(Debug)]
pub struct FakeBackend {
    inner: Mutex<Inner>,
}

#[allow(dead_code)]
impl FakeBackend {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                ..Inner::default()
            }),
        }
    }

    /// Register an account + profile directly, bypassing sign-up.
    pub fn add_user(&self, username: &str, email: &str, password: &str) -> UserId {
        let id = UserId(uuid::Uuid::new_v4());
        let mut inner = self.inner.lock().unwrap();
        inner
            .accounts
            .insert(email.to_string(), (password.to_string(), id));
        inner.profiles.push(Profile {
            id,
            username: username.to_string(),
        });
        id
    }

    /// Seed message rows, in the order given (the service orders on read;
    /// the fake deliberately does not, so callers can verify client-side
    /// ordering).
    pub fn set_history(&self, history: Vec<Message>) {
        self.inner.lock().unwrap().history = history;
    }

    /// Make every subsequent history fetch fail with a transport error.
    pub fn set_fail_fetch(&self, fail: bool) {
        self.inner.lock().unwrap().fail_fetch = fail;
    }

    /// Make every subsequent insert fail with a transport error.
    pub fn set_fail_insert(&self, fail: bool) {
        self.inner.lock().unwrap().fail_insert = fail;
    }

    /// Fail only inserts whose content matches, regardless of when the
    /// submission task gets scheduled.
    pub fn fail_insert_for(&self, content: &str) {
        self.inner.lock().unwrap().fail_insert_content = Some(content.to_string());
    }

    /// Make subscription setup fail.
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.inner.lock().unwrap().fail_subscribe = fail;
    }

    /// When set, an accepted insert immediately fans out its realtime
    /// record with a server-assigned id and timestamp, like the live
    /// service does.
    pub fn set_auto_confirm(&self, auto: bool) {
        self.inner.lock().unwrap().auto_confirm = auto;
    }

    /// Payloads accepted by `insert_message` so far.
    pub fn inserted(&self) -> Vec<NewMessage> {
        self.inner.lock().unwrap().inserted.clone()
    }

    /// Inject a raw realtime record to every live subscriber.
    pub fn push_insert_event(&self, record: serde_json::Value) {
        let subscribers = self.inner.lock().unwrap().subscribers.clone();
        for tx in subscribers {
            let _ = tx.try_send(record.clone());
        }
    }

    /// Number of subscriptions whose receiving end is still open.
    pub fn open_subscriptions(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .subscribers
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    fn record_for(message: &NewMessage, id: i64) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "content": message.content,
            "sender_id": message.sender_id,
            "receiver_id": message.receiver_id,
            "created_at": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        })
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn sign_in(&self, email: &str, password: &str) -> ChatResult<Session> {
        let inner = self.inner.lock().unwrap();
        match inner.accounts.get(email) {
            Some((stored, id)) if stored == password => Ok(Session {
                access_token: format!("token-{}", id),
                user: AuthUser {
                    id: *id,
                    email: Some(email.to_string()),
                },
            }),
            _ => Err(ChatError::Auth("invalid login credentials".to_string())),
        }
    }

    async fn sign_up(&self, email: &str, password: &str, username: &str) -> ChatResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.accounts.contains_key(email) {
            return Err(ChatError::Auth("user already registered".to_string()));
        }
        let id = UserId(uuid::Uuid::new_v4());
        inner
            .accounts
            .insert(email.to_string(), (password.to_string(), id));
        inner.profiles.push(Profile {
            id,
            username: username.to_string(),
        });
        Ok(())
    }

    async fn sign_out(&self, _access_token: &str) -> ChatResult<()> {
        Ok(())
    }

    async fn list_profiles(&self, _access_token: &str, exclude: UserId) -> ChatResult<Vec<Profile>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .profiles
            .iter()
            .filter(|p| p.id != exclude)
            .cloned()
            .collect())
    }

    async fn fetch_conversation(
        &self,
        _access_token: &str,
        a: UserId,
        b: UserId,
    ) -> ChatResult<Vec<Message>> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_fetch {
            return Err(ChatError::Fetch("connection refused".to_string()));
        }
        Ok(inner
            .history
            .iter()
            .filter(|m| m.belongs_to(a, b))
            .cloned()
            .collect())
    }

    async fn insert_message(&self, _access_token: &str, message: &NewMessage) -> ChatResult<()> {
        let (record, subscribers) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_insert
                || inner.fail_insert_content.as_deref() == Some(message.content.as_str())
            {
                return Err(ChatError::Send("connection refused".to_string()));
            }
            inner.inserted.push(message.clone());
            let id = inner.next_id;
            inner.next_id += 1;
            if inner.auto_confirm {
                (
                    Some(Self::record_for(message, id)),
                    inner.subscribers.clone(),
                )
            } else {
                (None, Vec::new())
            }
        };
        if let Some(record) = record {
            for tx in subscribers {
                let _ = tx.try_send(record.clone());
            }
        }
        Ok(())
    }

    async fn subscribe_inserts(&self, _access_token: &str) -> ChatResult<InsertSubscription> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_subscribe {
            return Err(ChatError::Subscribe("channel join refused".to_string()));
        }
        let (tx, rx) = mpsc::channel(64);
        inner.subscribers.push(tx);
        Ok(InsertSubscription::new(rx, Box::new(|| {})))
    }
}
