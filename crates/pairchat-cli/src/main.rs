//! Pairchat CLI
//!
//! Thin wrapper around pairchat-core for command-line usage.
//!
//! ## Usage
//!
//! ```bash
//! # Create an account
//! pairchat signup alice
//!
//! # Sign in (session is saved under the data dir)
//! pairchat login alice
//!
//! # List other users
//! pairchat users
//!
//! # Chat with a user interactively
//! pairchat chat bob
//!
//! # Show the signed-in user
//! pairchat whoami
//!
//! # Sign out and forget the saved session
//! pairchat logout
//! ```
//!
//! The backend endpoint comes from `--url`/`--api-key` or the
//! `PAIRCHAT_URL`/`PAIRCHAT_API_KEY` environment variables.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tokio::sync::broadcast::error::RecvError;

use pairchat_core::{BackendConfig, ChatEngine, ChatEvent, Profile, Session, UserId};

/// Pairchat - two-party chat over a hosted backend
#[derive(Parser)]
#[command(name = "pairchat")]
#[command(version = "0.1.0")]
#[command(about = "Pairchat - two-party direct messages")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Data directory (default: ~/.pairchat)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Backend project URL (overrides PAIRCHAT_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Backend anon API key (overrides PAIRCHAT_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and save the session
    Login {
        /// Username (the account email is <username>@<domain>)
        username: String,
    },

    /// Create a new account
    Signup {
        /// Username to register
        username: String,
    },

    /// Sign out and forget the saved session
    Logout,

    /// List other users
    Users,

    /// Interactive chat with a user
    Chat {
        /// The other user's username (or id)
        username: String,
    },

    /// Show the signed-in user
    Whoami,
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

/// Get the default data directory (~/.pairchat)
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pairchat")
}

fn session_path(data_dir: &PathBuf) -> PathBuf {
    data_dir.join("session.json")
}

fn save_session(data_dir: &PathBuf, session: &Session) -> Result<()> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("cannot create {}", data_dir.display()))?;
    let json = serde_json::to_string_pretty(session)?;
    std::fs::write(session_path(data_dir), json)?;
    Ok(())
}

fn load_session(data_dir: &PathBuf) -> Result<Session> {
    let path = session_path(data_dir);
    let json = std::fs::read_to_string(&path)
        .map_err(|_| anyhow::anyhow!("Not signed in. Run `pairchat login <username>` first."))?;
    serde_json::from_str(&json).with_context(|| format!("corrupt session file {}", path.display()))
}

fn forget_session(data_dir: &PathBuf) {
    let _ = std::fs::remove_file(session_path(data_dir));
}

fn build_config(cli: &Cli) -> Result<BackendConfig> {
    match (&cli.url, &cli.api_key) {
        (Some(url), Some(api_key)) => Ok(BackendConfig::new(url, api_key.clone())?),
        _ => BackendConfig::from_env().map_err(|e| {
            anyhow::anyhow!("{} (pass --url/--api-key or set the environment variables)", e)
        }),
    }
}

async fn prompt_password(prompt: &str) -> Result<String> {
    use std::io::Write;
    print!("{}", prompt);
    std::io::stdout().flush()?;

    let reader = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = reader.lines();
    let line = lines
        .next_line()
        .await?
        .ok_or_else(|| anyhow::anyhow!("no password given"))?;
    Ok(line.trim_end().to_string())
}

/// Find a profile by username, falling back to an id match.
fn resolve_profile(profiles: &[Profile], needle: &str) -> Option<Profile> {
    profiles
        .iter()
        .find(|p| p.username == needle)
        .or_else(|| {
            UserId::parse(needle)
                .ok()
                .and_then(|id| profiles.iter().find(|p| p.id == id))
        })
        .cloned()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    let config = build_config(&cli)?;
    let engine = ChatEngine::from_config(config);

    match cli.command {
        Commands::Login { username } => {
            let password = prompt_password("Password: ").await?;
            let session = engine.sign_in(&username, &password).await?;
            save_session(&data_dir, &session)?;
            println!("Signed in as {} ({})", username, session.user.id);
        }

        Commands::Signup { username } => {
            let password = prompt_password("Password: ").await?;
            engine.sign_up(&username, &password).await?;
            println!("Account created. Run `pairchat login {}` to sign in.", username);
        }

        Commands::Logout => {
            if let Ok(session) = load_session(&data_dir) {
                engine.restore_session(session);
                engine.sign_out().await;
            }
            forget_session(&data_dir);
            println!("Signed out.");
        }

        Commands::Users => {
            engine.restore_session(load_session(&data_dir)?);
            let profiles = engine.list_profiles().await?;
            if profiles.is_empty() {
                println!("No other users yet.");
            }
            for profile in profiles {
                println!("{:20} {}", profile.username, profile.id);
            }
        }

        Commands::Whoami => {
            let session = load_session(&data_dir)?;
            println!("ID: {}", session.user.id);
            if let Some(email) = &session.user.email {
                println!("Email: {}", email);
            }
        }

        Commands::Chat { username } => {
            engine.restore_session(load_session(&data_dir)?);
            let me = engine.session().expect("session just restored").user.id;

            let profiles = engine.list_profiles().await?;
            let recipient = resolve_profile(&profiles, &username)
                .ok_or_else(|| anyhow::anyhow!("No user named '{}'", username))?;

            let chat = engine.open_conversation(recipient.id).await?;

            println!("Chat with {} (/quit to exit)", recipient.username);
            println!("{}", "─".repeat(50));
            for msg in chat.messages() {
                let sender = if msg.sender_id == me {
                    "You"
                } else {
                    recipient.username.as_str()
                };
                println!("{}: {}", sender, msg.content);
            }
            if !chat.messages().is_empty() {
                println!("{}", "─".repeat(50));
            }
            println!("Type a message and press Enter to send.");
            println!();

            let mut events = chat.subscribe_events();
            let reader = tokio::io::BufReader::new(tokio::io::stdin());
            let mut lines = reader.lines();

            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(ChatEvent::MessageConfirmed { message }) if message.sender_id != me => {
                            println!("{}: {}", recipient.username, message.content);
                        }
                        Ok(ChatEvent::MessagePending { message }) => {
                            println!("You: {}", message.content);
                        }
                        Ok(ChatEvent::SendFailed { content, reason }) => {
                            eprintln!("Failed to send: {} (unsent: {:?})", reason, content);
                        }
                        Ok(ChatEvent::SubscriptionClosed) => {
                            println!("Realtime channel closed.");
                            break;
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            eprintln!("Skipped {} events", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    },
                    line = lines.next_line() => match line {
                        Ok(Some(text)) => {
                            let text = text.trim();
                            if text == "/quit" {
                                break;
                            }
                            if !text.is_empty() {
                                chat.send(text);
                            }
                        }
                        Ok(None) => {
                            println!();
                            println!("Input closed, exiting...");
                            break;
                        }
                        Err(e) => {
                            eprintln!("Read error: {}", e);
                        }
                    }
                }
            }

            chat.close();
        }
    }

    Ok(())
}
