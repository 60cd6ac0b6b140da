//! One-shot mode
//!
//! `--once <message>` sends a single message and writes the reply to
//! stdout as it streams, without taking over the terminal.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use furiabot_core::{ChatBackend, ChatSession, MessageRole};

/// Run one turn and write the reply to `out`
///
/// With `session_id` the message continues that conversation; otherwise
/// it starts a new one.
///
/// # Errors
///
/// Fails when the message cannot be sent, the reply fails mid-stream, or
/// `out` cannot be written.
pub async fn run_once<B, W>(
    backend: Arc<B>,
    refetch_delay: Duration,
    session_id: Option<&str>,
    message: &str,
    out: &mut W,
) -> Result<()>
where
    B: ChatBackend + 'static,
    W: Write,
{
    let mut chat = ChatSession::new(backend, refetch_delay);
    match session_id {
        Some(id) => chat.select_session(id)?,
        None => chat.start_new_conversation()?,
    }

    chat.send_message(message)
        .context("Failed to send message")?;

    let mut printed = 0;
    while chat.next_update().await {
        // A failed turn or the post-reply refetch rewrites the reply; only
        // streamed text is printed
        if !chat.state().is_streaming() {
            continue;
        }
        let Some(reply) = chat
            .state()
            .messages()
            .last()
            .filter(|m| m.role == MessageRole::Assistant && !m.is_placeholder())
        else {
            continue;
        };
        if let Some(delta) = reply.content.get(printed..) {
            out.write_all(delta.as_bytes())?;
            out.flush()?;
            printed = reply.content.len();
        }
    }

    if let Some(error) = chat.state().error() {
        bail!("Reply failed: {error}");
    }
    writeln!(out)?;

    if let Some(id) = chat.state().active_session_id() {
        tracing::info!(session_id = %id, "One-shot turn finished");
    }
    Ok(())
}
