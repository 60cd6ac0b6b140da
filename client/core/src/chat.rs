//! Chat Driver
//!
//! [`ChatSession`] connects a [`ChatBackend`] to a [`ChatState`]. Network
//! work runs on spawned tasks which only send results back over channels;
//! the session owner applies them in [`ChatSession::poll`] (or
//! [`ChatSession::next_update`]), so the state has exactly one writer.
//!
//! ```text
//!  send_message ──► stream_response ──► body ──► spawn_reader ──► StreamUpdate ─┐
//!                   (spawned)           (applied by poll)                       ├─► poll() ──► ChatState
//!  refresh_sessions / post-reply refetch ──► list_sessions ──► result ──────────┘
//! ```
//!
//! No method waits on the network: a backend that stalls before answering
//! leaves the turn streaming, never the caller blocked.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::api::{ApiError, ByteStream, ChatBackend};
use crate::reconciler::{ChatState, Flow};
use crate::sessions::SessionData;
use crate::stream::{spawn_reader, StreamUpdate};

/// Errors of chat operations
#[derive(Debug, Error)]
pub enum ChatError {
    /// A reply is still streaming
    #[error("a reply is still streaming")]
    TurnInProgress,

    /// No conversation is selected and creating mode is off
    #[error("no conversation selected")]
    NoActiveConversation,

    /// The backend call failed
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Result of a session-list fetch
struct ListResult {
    result: Result<SessionData, ApiError>,
    /// Fetched after a reply completed; adopts a captured session id
    after_turn: bool,
}

/// Shown when the reply request task went away without answering
const REQUEST_LOST: &str = "reply request ended without a response";

/// Reply in flight
enum Turn {
    /// Waiting for `stream_response` to answer
    Starting(oneshot::Receiver<Result<ByteStream, ApiError>>),
    /// Reading the reply body
    Reading(mpsc::Receiver<StreamUpdate>),
}

/// Next item taken off the update channels
enum Next {
    Started(Result<ByteStream, ApiError>),
    Stream(StreamUpdate),
    List(ListResult),
}

/// Drives conversations against a backend
pub struct ChatSession<B: ChatBackend + 'static> {
    state: ChatState,
    backend: Arc<B>,
    refetch_delay: Duration,
    turn: Option<Turn>,
    /// Task waiting on the last reply request
    request_task: Option<JoinHandle<()>>,
    /// Why the last reply request failed, kept for [`ChatSession::run_turn`]
    failed_start: Option<ApiError>,
    list_tx: mpsc::UnboundedSender<ListResult>,
    list_rx: mpsc::UnboundedReceiver<ListResult>,
    lists_in_flight: usize,
    requires_login: bool,
}

impl<B: ChatBackend + 'static> ChatSession<B> {
    /// Create a session with an empty state
    pub fn new(backend: Arc<B>, refetch_delay: Duration) -> Self {
        let (list_tx, list_rx) = mpsc::unbounded_channel();
        Self {
            state: ChatState::new(),
            backend,
            refetch_delay,
            turn: None,
            request_task: None,
            failed_start: None,
            list_tx,
            list_rx,
            lists_in_flight: 0,
            requires_login: false,
        }
    }

    /// Current view state
    #[must_use]
    pub fn state(&self) -> &ChatState {
        &self.state
    }

    /// Whether a backend call reported that the user must sign in again
    #[must_use]
    pub fn requires_login(&self) -> bool {
        self.requires_login
    }

    /// Whether a reply stream or a list fetch is outstanding
    #[must_use]
    pub fn has_pending_work(&self) -> bool {
        self.turn.is_some() || self.lists_in_flight > 0
    }

    /// Clear the view and start a new conversation
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::TurnInProgress`] while a reply is streaming.
    pub fn start_new_conversation(&mut self) -> Result<(), ChatError> {
        self.state.start_new_conversation()
    }

    /// Show an existing conversation
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::TurnInProgress`] while a reply is streaming.
    pub fn select_session(&mut self, session_id: &str) -> Result<(), ChatError> {
        self.state.select_session(session_id)
    }

    /// Fetch the conversation list in the background
    ///
    /// With `show_loading` the state reports a visible load until the
    /// result is applied.
    pub fn refresh_sessions(&mut self, show_loading: bool) {
        if show_loading {
            self.state.begin_load();
        }
        self.spawn_list_fetch(Duration::ZERO, false);
    }

    fn spawn_list_fetch(&mut self, delay: Duration, after_turn: bool) {
        self.lists_in_flight += 1;
        let backend = Arc::clone(&self.backend);
        let tx = self.list_tx.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let result = backend.list_sessions().await;
            // Receiver gone means the session was dropped
            let _ = tx.send(ListResult { result, after_turn });
        });
    }

    /// Send a message and start streaming the reply
    ///
    /// Returns as soon as the request is on its way; the reply, or the
    /// reason it failed, is applied by [`poll`](Self::poll). The turn counts
    /// as streaming from here on.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::TurnInProgress`] or
    /// [`ChatError::NoActiveConversation`] without touching the timeline.
    pub fn send_message(&mut self, content: &str) -> Result<(), ChatError> {
        let request = self.state.begin_turn(content)?;
        tracing::debug!(new_conversation = request.session_id.is_none(), "Sending message");

        self.failed_start = None;
        let backend = Arc::clone(&self.backend);
        let (tx, rx) = oneshot::channel();
        self.request_task = Some(tokio::spawn(async move {
            let result = backend.stream_response(request).await;
            // Receiver gone means the session was dropped
            let _ = tx.send(result);
        }));
        self.turn = Some(Turn::Starting(rx));
        Ok(())
    }

    /// Apply every queued update without waiting
    ///
    /// Returns `true` if anything changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;

        let started = match self.turn.as_mut() {
            Some(Turn::Starting(start)) => match start.try_recv() {
                Ok(result) => Some(Next::Started(result)),
                Err(oneshot::error::TryRecvError::Empty) => None,
                Err(oneshot::error::TryRecvError::Closed) => {
                    Some(Next::Stream(StreamUpdate::Failed(REQUEST_LOST.to_string())))
                }
            },
            _ => None,
        };
        if let Some(next) = started {
            changed = true;
            self.apply_next(next);
        }

        let mut updates = Vec::new();
        let mut disconnected = false;
        if let Some(Turn::Reading(reader)) = self.turn.as_mut() {
            loop {
                match reader.try_recv() {
                    Ok(update) => updates.push(update),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        disconnected = true;
                        break;
                    }
                }
            }
        }
        for update in updates {
            changed = true;
            if self.apply_stream_update(update) {
                break;
            }
        }
        if disconnected && matches!(self.turn, Some(Turn::Reading(_))) {
            changed = true;
            self.apply_stream_update(StreamUpdate::Ended);
        }

        while let Ok(list) = self.list_rx.try_recv() {
            changed = true;
            self.apply_list_result(list);
        }

        changed
    }

    /// Wait for the next update and apply it
    ///
    /// Returns `false` immediately when nothing is outstanding.
    pub async fn next_update(&mut self) -> bool {
        if !self.has_pending_work() {
            return false;
        }

        let next = match self.turn.as_mut() {
            Some(Turn::Starting(start)) => tokio::select! {
                result = start => match result {
                    Ok(result) => Next::Started(result),
                    Err(_) => Next::Stream(StreamUpdate::Failed(REQUEST_LOST.to_string())),
                },
                Some(list) = self.list_rx.recv() => Next::List(list),
            },
            Some(Turn::Reading(reader)) => tokio::select! {
                update = reader.recv() => Next::Stream(update.unwrap_or(StreamUpdate::Ended)),
                Some(list) = self.list_rx.recv() => Next::List(list),
            },
            None => match self.list_rx.recv().await {
                Some(list) => Next::List(list),
                None => return false,
            },
        };

        self.apply_next(next);
        true
    }

    /// Send a message and drive the turn until the follow-up list refetch
    /// has been applied
    ///
    /// # Errors
    ///
    /// Same as [`send_message`](Self::send_message), plus [`ChatError::Api`]
    /// when the reply request itself failed.
    pub async fn run_turn(&mut self, content: &str) -> Result<(), ChatError> {
        self.send_message(content)?;
        while self.next_update().await {}
        match self.failed_start.take() {
            Some(e) => Err(ChatError::Api(e)),
            None => Ok(()),
        }
    }

    fn apply_next(&mut self, next: Next) {
        match next {
            Next::Started(Ok(body)) => {
                tracing::debug!("Reply stream started");
                self.turn = Some(Turn::Reading(spawn_reader(body)));
            }
            Next::Started(Err(e)) => {
                tracing::warn!(error = %e, "Failed to start reply stream");
                self.turn = None;
                self.note_error(&e);
                self.state.fail_turn(&e.to_string());
                self.failed_start = Some(e);
            }
            Next::Stream(update) => {
                self.apply_stream_update(update);
            }
            Next::List(list) => self.apply_list_result(list),
        }
    }

    /// Apply one reader update; returns `true` when the turn ended
    fn apply_stream_update(&mut self, update: StreamUpdate) -> bool {
        match update {
            StreamUpdate::Event(event) => match self.state.apply_event(&event) {
                Flow::Continue => false,
                Flow::Completed => {
                    tracing::debug!("Run completed");
                    self.turn = None;
                    self.state.finish_turn();
                    self.spawn_list_fetch(self.refetch_delay, true);
                    true
                }
            },
            StreamUpdate::Failed(message) => {
                tracing::warn!(error = %message, "Reply stream failed");
                self.turn = None;
                self.state.fail_turn(&message);
                true
            }
            StreamUpdate::Ended => {
                tracing::debug!("Reply stream ended without completion");
                self.turn = None;
                self.state.finish_turn();
                true
            }
        }
    }

    fn apply_list_result(&mut self, list: ListResult) {
        self.lists_in_flight = self.lists_in_flight.saturating_sub(1);
        match list.result {
            Ok(data) => {
                self.state.apply_sessions(data);
                if list.after_turn {
                    self.state.adopt_pending_session();
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch conversations");
                self.note_error(&e);
                self.state.load_failed(e.to_string());
            }
        }
    }

    fn note_error(&mut self, error: &ApiError) {
        if error.requires_login() {
            self.requires_login = true;
        }
    }
}

impl<B: ChatBackend + 'static> Drop for ChatSession<B> {
    fn drop(&mut self) {
        // A reply request that never answers would otherwise outlive the view
        if let Some(task) = self.request_task.take() {
            task.abort();
        }
    }
}
