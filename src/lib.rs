//! FilterFox
//!
//! Rule-based Gmail triage. Each run selects messages with a Gmail search
//! query, classifies them from a handful of headers, and files them under
//! `<prefix>/<Category>` labels, archiving bulk categories out of the inbox.
//!
//! # Overview
//!
//! - **Classification**: ordered, first-match-wins header rules
//! - **Action planning**: category to label name and archive decision
//! - **Orchestration**: one sequential pass, preview or apply
//! - **Mailbox access**: Gmail API adapter with retry and timeouts
//! - **History**: bounded log of past runs
//!
//! # Example Usage
//!
//! ```no_run
//! use filterfox::{auth, client::ProductionGmailClient, config::Config, engine::run_filterfox};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("filterfox.toml".as_ref()).await?;
//!
//!     let hub = auth::initialize_gmail_hub(
//!         &config.gmail.credentials_path,
//!         &config.gmail.token_path,
//!     ).await?;
//!     let client = ProductionGmailClient::new(hub);
//!
//!     // dry_run defaults to true, so this only previews
//!     let result = run_filterfox(&client, &config.run, None).await?;
//!     println!("{} of {} messages classified", result.classified, result.found);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`actions`] - Category to action plan mapping
//! - [`auth`] - OAuth2 authentication and Gmail API initialization
//! - [`classifier`] - Header rules
//! - [`cli`] - Command-line interface and run reports
//! - [`client`] - Mailbox port and its Gmail implementation
//! - [`config`] - Configuration management
//! - [`engine`] - Run orchestration
//! - [`error`] - Error types and result aliases
//! - [`history`] - Run history persistence
//! - [`models`] - Core data structures

pub mod actions;
pub mod auth;
pub mod classifier;
pub mod cli;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod models;

// Re-export commonly used types for convenience
pub use error::{FilterFoxError, Result};

// Core data models
pub use models::{
    ActionPlan, Category, Classification, Header, MessageMetadata, MessageResult, PlannedAction,
    RunMode, RunResult, RunStats,
};

pub use actions::{plan_for_category, summarize_message};
pub use classifier::{classify_message, EmailClassifier};

// Mailbox port
pub use client::{MailboxClient, ProductionGmailClient};

pub use config::{Config, RunConfig};
pub use engine::{run_filterfox, LabelCache, ProgressCallback};
pub use history::{HistoryEntry, RunHistory};

// CLI types (for binary usage)
pub use cli::{Cli, Commands, ProgressReporter, Report};
