//! Backend endpoint configuration

use url::Url;

use crate::error::{ChatError, ChatResult};

/// Environment variable naming the backend project URL
pub const ENV_URL: &str = "PAIRCHAT_URL";
/// Environment variable naming the backend anon API key
pub const ENV_API_KEY: &str = "PAIRCHAT_API_KEY";
/// Environment variable overriding the synthetic email domain
pub const ENV_EMAIL_DOMAIN: &str = "PAIRCHAT_EMAIL_DOMAIN";

/// Accounts are keyed by email server-side, but users type a bare username;
/// the client synthesizes `<username>@<domain>` with this domain.
const DEFAULT_EMAIL_DOMAIN: &str = "yourapp.com";

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Project base URL (e.g. `https://abc.example.co`)
    pub url: Url,
    /// Anon/public API key sent with every request
    pub api_key: String,
    /// Domain for synthesizing account emails from usernames
    pub email_domain: String,
}

impl BackendConfig {
    /// Create a config from a base URL and API key.
    pub fn new(url: &str, api_key: impl Into<String>) -> ChatResult<Self> {
        let url = Url::parse(url).map_err(|e| ChatError::Config(format!("invalid url: {}", e)))?;
        if url.cannot_be_a_base() {
            return Err(ChatError::Config(format!("invalid url: {}", url)));
        }
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ChatError::Config("api key is empty".to_string()));
        }
        Ok(Self {
            url,
            api_key,
            email_domain: DEFAULT_EMAIL_DOMAIN.to_string(),
        })
    }

    /// Read configuration from the environment.
    pub fn from_env() -> ChatResult<Self> {
        let url = std::env::var(ENV_URL)
            .map_err(|_| ChatError::Config(format!("{} is not set", ENV_URL)))?;
        let api_key = std::env::var(ENV_API_KEY)
            .map_err(|_| ChatError::Config(format!("{} is not set", ENV_API_KEY)))?;
        let mut config = Self::new(&url, api_key)?;
        if let Ok(domain) = std::env::var(ENV_EMAIL_DOMAIN) {
            config.email_domain = domain;
        }
        Ok(config)
    }

    /// Override the synthetic email domain.
    pub fn with_email_domain(mut self, domain: impl Into<String>) -> Self {
        self.email_domain = domain.into();
        self
    }

    /// Synthesize the account email for a username.
    pub fn email_for(&self, username: &str) -> String {
        format!("{}@{}", username, self.email_domain)
    }

    /// The realtime websocket endpoint derived from the base URL.
    pub fn realtime_url(&self) -> ChatResult<Url> {
        let mut url = self.url.clone();
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(ChatError::Config(format!(
                    "cannot derive websocket scheme from {}",
                    other
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| ChatError::Config("cannot set websocket scheme".to_string()))?;
        url.set_path("/realtime/v1/websocket");
        url.query_pairs_mut()
            .append_pair("apikey", &self.api_key)
            .append_pair("vsn", "1.0.0");
        Ok(url)
    }
}
