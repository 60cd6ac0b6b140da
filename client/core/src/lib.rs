//! furiabot Core - Headless Chat Client for the FURIA Agent Service
//!
//! This crate holds all client logic for furiabot, independent of any UI
//! framework: signing in, listing conversations, sending messages and
//! streaming the agent's replies. The terminal front-end is one surface
//! over it; tests drive it headless.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         UI Surface                            │
//! │            (furiabot-tui: ratatui / one-shot CLI)            │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ send_message / poll / state()
//! ┌──────────────────────────────┼───────────────────────────────┐
//! │                       FURIABOT CORE                           │
//! │  ┌───────────────────────────┴────────────────────────────┐  │
//! │  │                     ChatSession                         │  │
//! │  │  ┌────────────┐  ┌─────────────┐  ┌──────────────────┐ │  │
//! │  │  │ ChatState  │◄─│   stream    │◄─│   ChatBackend    │ │  │
//! │  │  │(reconciler)│  │(demux+reader)│ │  (HttpBackend)   │ │  │
//! │  │  └────────────┘  └─────────────┘  └────────┬─────────┘ │  │
//! │  └────────────────────────────────────────────┼───────────┘  │
//! │                                   TokenStore ─┘               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ChatSession`]: drives turns and list refreshes against a backend
//! - [`ChatState`]: everything the chat view shows
//! - [`HttpBackend`]: the agent service over HTTP, with token refresh
//! - [`StreamDemultiplexer`]: cuts the reply body into JSON records
//! - [`TokenStore`]: the signed-in user's tokens, persisted on disk
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use furiabot_core::{
//!     config::load_config, ChatSession, CredentialStore, HttpBackend, TokenStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let tokens = TokenStore::open(CredentialStore::new(&config.credentials_path))?;
//!     let backend = Arc::new(HttpBackend::from_config(&config, tokens)?);
//!     backend.login("user", "secret").await?;
//!
//!     let mut chat = ChatSession::new(backend, config.refetch_delay);
//!     chat.start_new_conversation()?;
//!     chat.run_turn("Quando é o próximo jogo da FURIA?").await?;
//!
//!     for message in chat.state().messages() {
//!         println!("{:?}: {}", message.role, message.content);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`api`]: backend trait and the HTTP implementation
//! - [`chat`]: the chat driver
//! - [`config`]: layered configuration (CLI, env, TOML, defaults)
//! - [`credentials`]: persisted tokens
//! - [`messages`]: timeline and tool-call types
//! - [`reconciler`]: conversation state transitions
//! - [`routes`]: screen routing and the sign-in guard
//! - [`sessions`]: session history model and view helpers
//! - [`stream`]: reply body framing and event classification
//!
//! # No TUI Dependencies
//!
//! This crate has no dependency on ratatui, crossterm, or any other UI
//! framework.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod chat;
pub mod config;
pub mod credentials;
pub mod messages;
pub mod reconciler;
pub mod routes;
pub mod sessions;
pub mod stream;

pub use api::{ApiError, ByteStream, ChatBackend, HttpBackend, StreamRequest};
pub use chat::{ChatError, ChatSession};
pub use config::{ClientConfig, ConfigError, ConfigOverrides, ConfigSource};
pub use credentials::{CredentialError, CredentialStore, Credentials, TokenPair, TokenStore};
pub use messages::{Message, MessageRole, ToolCall, ToolStatus};
pub use reconciler::{ChatState, Flow};
pub use routes::{guard, Route};
pub use sessions::{ConversationListItem, SessionData};
pub use stream::{EventKind, StreamDemultiplexer, StreamEvent, StreamUpdate};
