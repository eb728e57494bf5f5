//! HTTP implementation of the backend capability
//!
//! Speaks the hosted service's REST surface: password-grant auth, row reads
//! with PostgREST filter expressions, and row inserts. The realtime channel
//! lives in [`realtime`](super::realtime); this module wires it in for
//! [`Backend::subscribe_inserts`].

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use tracing::debug;
use url::Url;

use super::realtime::RealtimeClient;
use super::{Backend, InsertSubscription};
use crate::config::BackendConfig;
use crate::error::{ChatError, ChatResult};
use crate::types::{Message, NewMessage, Profile, Session, UserId};

/// REST + websocket client for the hosted backend.
#[derive(Debug, Clone)]
pub struct RestBackend {
    config: BackendConfig,
    http: reqwest::Client,
}

/// PostgREST filter selecting both directions of a two-party conversation.
fn conversation_filter(a: UserId, b: UserId) -> String {
    format!(
        "(and(sender_id.eq.{a},receiver_id.eq.{b}),and(sender_id.eq.{b},receiver_id.eq.{a}))",
        a = a,
        b = b
    )
}

impl RestBackend {
    /// Create a backend client for the configured project.
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> ChatResult<Url> {
        self.config
            .url
            .join(path)
            .map_err(|e| ChatError::Config(format!("invalid endpoint {}: {}", path, e)))
    }

    /// Read a response body, mapping transport failures with `transport`.
    async fn body(
        resp: reqwest::Response,
        transport: fn(String) -> ChatError,
    ) -> ChatResult<String> {
        let status = resp.status();
        let text = resp.text().await.map_err(|e| transport(e.to_string()))?;
        if !status.is_success() {
            return Err(transport(format!("{}: {}", status, text)));
        }
        Ok(text)
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn sign_in(&self, email: &str, password: &str) -> ChatResult<Session> {
        let url = self.endpoint("/auth/v1/token")?;
        let resp = self
            .http
            .post(url)
            .query(&[("grant_type", "password")])
            .header("apikey", &self.config.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| ChatError::Auth(e.to_string()))?;

        let text = Self::body(resp, ChatError::Auth).await?;
        serde_json::from_str(&text).map_err(|e| ChatError::Decode(e.to_string()))
    }

    async fn sign_up(&self, email: &str, password: &str, username: &str) -> ChatResult<()> {
        let url = self.endpoint("/auth/v1/signup")?;
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.config.api_key)
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "username": username },
            }))
            .send()
            .await
            .map_err(|e| ChatError::Auth(e.to_string()))?;

        Self::body(resp, ChatError::Auth).await?;
        Ok(())
    }

    async fn sign_out(&self, access_token: &str) -> ChatResult<()> {
        let url = self.endpoint("/auth/v1/logout")?;
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.config.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ChatError::Auth(e.to_string()))?;

        // 401 on logout means the token already expired; the session is gone
        // either way.
        if !resp.status().is_success() && resp.status() != StatusCode::UNAUTHORIZED {
            return Err(ChatError::Auth(format!("logout failed: {}", resp.status())));
        }
        Ok(())
    }

    async fn list_profiles(&self, access_token: &str, exclude: UserId) -> ChatResult<Vec<Profile>> {
        let url = self.endpoint("/rest/v1/profiles")?;
        let resp = self
            .http
            .get(url)
            .query(&[
                ("select", "id,username".to_string()),
                ("id", format!("neq.{}", exclude)),
            ])
            .header("apikey", &self.config.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ChatError::Fetch(e.to_string()))?;

        let text = Self::body(resp, ChatError::Fetch).await?;
        serde_json::from_str(&text).map_err(|e| ChatError::Decode(e.to_string()))
    }

    async fn fetch_conversation(
        &self,
        access_token: &str,
        a: UserId,
        b: UserId,
    ) -> ChatResult<Vec<Message>> {
        let url = self.endpoint("/rest/v1/messages")?;
        let resp = self
            .http
            .get(url)
            .query(&[
                ("select", "*".to_string()),
                ("or", conversation_filter(a, b)),
                ("order", "created_at.asc".to_string()),
            ])
            .header("apikey", &self.config.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ChatError::Fetch(e.to_string()))?;

        let text = Self::body(resp, ChatError::Fetch).await?;
        let messages: Vec<Message> =
            serde_json::from_str(&text).map_err(|e| ChatError::Decode(e.to_string()))?;
        debug!(count = messages.len(), "Fetched conversation history");
        Ok(messages)
    }

    async fn insert_message(&self, access_token: &str, message: &NewMessage) -> ChatResult<()> {
        let url = self.endpoint("/rest/v1/messages")?;
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.config.api_key)
            .header("Prefer", "return=minimal")
            .bearer_auth(access_token)
            .json(message)
            .send()
            .await
            .map_err(|e| ChatError::Send(e.to_string()))?;

        Self::body(resp, ChatError::Send).await?;
        Ok(())
    }

    async fn subscribe_inserts(&self, access_token: &str) -> ChatResult<InsertSubscription> {
        let url = self.config.realtime_url()?;
        RealtimeClient::connect(url, access_token).await
    }
}
