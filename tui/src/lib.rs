//! FuriaBot TUI - Terminal interface for the FURIA agent service
//!
//! A full-screen terminal client over `furiabot-core`: the same screens as
//! the web client (home, login, register, chat) drawn with ratatui.
//!
//! # Architecture
//!
//! - **App**: event loop, routing and the per-frame update
//! - **Screens**: one module per route, rendering borrowed state
//! - **Widgets**: bottom-anchored text block, pending-reply dots
//! - **Once**: single-turn mode that streams a reply to stdout

pub mod app;
pub mod cli;
pub mod format;
pub mod logging;
pub mod once;
pub mod screens;
pub mod theme;
pub mod widgets;

pub use app::App;
