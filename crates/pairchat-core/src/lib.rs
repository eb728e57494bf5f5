//! Pairchat Core Library
//!
//! Client for a two-party direct-message chat backed by a hosted
//! backend-as-a-service. Persistence, authentication, and realtime delivery
//! belong to the service; this crate owns the client-side view, above all
//! the **conversation reconciler**, which merges history fetches, local
//! optimistic sends, and realtime inserts into one deduplicated,
//! chronologically ordered message sequence.
//!
//! ## Guarantees
//!
//! - A locally authored message is visible immediately (optimistic entry
//!   with a placeholder id) and never silently lost: a failed submission
//!   rolls the entry back and hands the content back for the input buffer.
//! - No two visible messages share a server-assigned id.
//! - The realtime channel is best-effort: undecodable events are dropped,
//!   and nothing retries automatically.
//!
//! ## Quick Start
//!
//! ```ignore
//! use pairchat_core::{BackendConfig, ChatEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = ChatEngine::from_config(BackendConfig::from_env()?);
//!     engine.sign_in("alice", "hunter2").await?;
//!
//!     for profile in engine.list_profiles().await? {
//!         println!("{}: {}", profile.id, profile.username);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod conversation;
pub mod engine;
pub mod error;
pub mod events;
pub mod reconciler;
pub mod types;
pub mod wire;

// Re-exports
pub use backend::{Backend, InsertSubscription, RealtimeClient, RestBackend};
pub use config::BackendConfig;
pub use conversation::Conversation;
pub use engine::{ChatEngine, ConversationHandle};
pub use error::{ChatError, ChatResult};
pub use events::ChatEvent;
pub use reconciler::Reconciler;
pub use types::*;
