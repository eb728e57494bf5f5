//! Error types for Pairchat

use thiserror::Error;

/// Main error type for Pairchat operations
///
/// Every variant is recoverable: errors are surfaced to the caller for
/// display and never terminate the process. No operation retries
/// automatically; the user re-opens the view or resends.
#[derive(Error, Debug)]
pub enum ChatError {
    /// History load failed (transport or authorization)
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Malformed payload or timestamp in a backend response
    #[error("Decode error: {0}")]
    Decode(String),

    /// Message submission failed
    #[error("Send error: {0}")]
    Send(String),

    /// Realtime channel setup failed
    #[error("Subscribe error: {0}")]
    Subscribe(String),

    /// Sign-in, sign-up, or sign-out failed
    #[error("Auth error: {0}")]
    Auth(String),

    /// Operation requires a signed-in session
    #[error("Not signed in")]
    NotSignedIn,

    /// Invalid backend configuration
    #[error("Config error: {0}")]
    Config(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using ChatError
pub type ChatResult<T> = Result<T, ChatError>;
