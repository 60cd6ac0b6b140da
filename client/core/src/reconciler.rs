//! Conversation State
//!
//! [`ChatState`] is the single owner of everything the chat view shows.
//! It is a plain state machine: stream events, session-list results and
//! user actions are applied to it one at a time by whoever owns it.
//!
//! # Turn lifecycle
//!
//! ```text
//! begin_turn ──► apply_event* ──► Flow::Completed ──► finish_turn ──► apply_sessions ──► adopt_pending_session
//!     │                │
//!     │                └─ transport error ──► fail_turn
//!     └─ pushes the user message and the "..." placeholder
//! ```
//!
//! # New conversations
//!
//! In creating mode there is no active session id. The backend reveals the
//! new id inside the stream; it is parked in `pending_session_id` (first
//! one wins) and only becomes the active id once the post-reply session
//! list has been applied, so the view never shows an id it cannot resolve.

use crate::api::StreamRequest;
use crate::chat::ChatError;
use crate::messages::{
    upsert_tool_call, Message, MessageRole, ToolCall, ToolStatus, PLACEHOLDER_CONTENT,
};
use crate::sessions::{
    conversation_list, extract_messages, extract_tool_calls, find_session, ConversationListItem,
    SessionData,
};
use crate::stream::{parse_tool_call, EventKind, StreamEvent};

/// Offset of the placeholder timestamp after the user message (seconds)
const PLACEHOLDER_OFFSET_SECS: f64 = 0.1;

/// Whether the current turn keeps consuming stream records
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading
    Continue,
    /// The run finished; stop reading
    Completed,
}

/// State of the chat view
#[derive(Clone, Debug, Default)]
pub struct ChatState {
    messages: Vec<Message>,
    tool_calls: Vec<ToolCall>,
    active_session_id: Option<String>,
    creating_new: bool,
    pending_session_id: Option<String>,
    streaming: bool,
    halted: bool,
    accumulator: String,
    error: Option<String>,
    loading: bool,
    load_error: Option<String>,
    session_data: Option<SessionData>,
    conversations: Vec<ConversationListItem>,
}

impl ChatState {
    /// Empty state, not in creating mode
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Message timeline
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Tool pills of the current turn
    #[must_use]
    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    /// Conversation being shown
    #[must_use]
    pub fn active_session_id(&self) -> Option<&str> {
        self.active_session_id.as_deref()
    }

    /// Whether the next message starts a new conversation
    #[must_use]
    pub fn is_creating_new(&self) -> bool {
        self.creating_new
    }

    /// Id of a new conversation seen in the stream but not yet adopted
    #[must_use]
    pub fn pending_session_id(&self) -> Option<&str> {
        self.pending_session_id.as_deref()
    }

    /// Whether a reply is streaming
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Error of the last turn
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether a visible session-list load is running
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Error of the last session-list load
    #[must_use]
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Last session list received
    #[must_use]
    pub fn session_data(&self) -> Option<&SessionData> {
        self.session_data.as_ref()
    }

    /// Sidebar entries, newest first
    #[must_use]
    pub fn conversations(&self) -> &[ConversationListItem] {
        &self.conversations
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Clear the view and enter creating mode
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::TurnInProgress`] while a reply is streaming.
    pub fn start_new_conversation(&mut self) -> Result<(), ChatError> {
        if self.streaming {
            return Err(ChatError::TurnInProgress);
        }
        self.active_session_id = None;
        self.pending_session_id = None;
        self.messages.clear();
        self.tool_calls.clear();
        self.creating_new = true;
        self.error = None;
        Ok(())
    }

    /// Show an existing conversation
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::TurnInProgress`] while a reply is streaming.
    pub fn select_session(&mut self, session_id: impl Into<String>) -> Result<(), ChatError> {
        if self.streaming {
            return Err(ChatError::TurnInProgress);
        }
        self.creating_new = false;
        self.active_session_id = Some(session_id.into());
        self.error = None;
        self.rederive();
        Ok(())
    }

    // =========================================================================
    // Turn
    // =========================================================================

    /// Start a turn: push the user message and the reply placeholder
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::TurnInProgress`] while a reply is streaming and
    /// [`ChatError::NoActiveConversation`] when no conversation is selected
    /// and creating mode is off.
    pub fn begin_turn(&mut self, content: &str) -> Result<StreamRequest, ChatError> {
        if self.streaming {
            return Err(ChatError::TurnInProgress);
        }
        let request = match (&self.active_session_id, self.creating_new) {
            (_, true) => StreamRequest::new_conversation(content),
            (Some(id), false) => StreamRequest::in_session(content, id.clone()),
            (None, false) => return Err(ChatError::NoActiveConversation),
        };

        let now = crate::messages::now_secs();
        self.messages.push(Message::at(MessageRole::User, content, now));
        self.messages.push(Message::at(
            MessageRole::Assistant,
            PLACEHOLDER_CONTENT,
            now + PLACEHOLDER_OFFSET_SECS,
        ));
        self.tool_calls.clear();
        self.accumulator.clear();
        if self.creating_new {
            self.pending_session_id = None;
        }
        self.streaming = true;
        self.halted = false;
        self.error = None;

        Ok(request)
    }

    /// Apply one stream record
    ///
    /// Records arriving after `RunCompleted`, or outside a turn, are
    /// ignored and report [`Flow::Completed`].
    pub fn apply_event(&mut self, event: &StreamEvent) -> Flow {
        if !self.streaming || self.halted {
            return Flow::Completed;
        }

        if self.creating_new && self.pending_session_id.is_none() {
            if let Some(id) = event.session_id.as_deref().filter(|id| !id.is_empty()) {
                tracing::debug!(session_id = %id, "Captured new session id");
                self.pending_session_id = Some(id.to_string());
            }
        }

        match event.kind() {
            EventKind::RunCompleted => {
                self.halted = true;
                return Flow::Completed;
            }
            kind if kind.is_passive() => {}
            EventKind::ToolCallStarted => {
                if let Some(name) = event.text().and_then(parse_tool_call) {
                    upsert_tool_call(&mut self.tool_calls, &name, ToolStatus::Running);
                }
            }
            EventKind::ToolCallCompleted => {
                if let Some(name) = event.text().and_then(parse_tool_call) {
                    if let Some(tool) = self.tool_calls.iter_mut().find(|t| t.name == name) {
                        tool.status = ToolStatus::Completed;
                    }
                }
            }
            _ => {
                if let Some(text) = event.text() {
                    self.append_reply(text, event.created_at);
                }
            }
        }

        Flow::Continue
    }

    fn append_reply(&mut self, delta: &str, created_at: Option<f64>) {
        self.accumulator.push_str(delta);
        if let Some(last) = self
            .messages
            .last_mut()
            .filter(|m| m.role == MessageRole::Assistant)
        {
            last.content.clone_from(&self.accumulator);
            if let Some(ts) = created_at {
                last.created_at = ts;
            }
        }
    }

    /// End the turn with an error shown in place of the reply
    pub fn fail_turn(&mut self, message: &str) {
        if let Some(last) = self
            .messages
            .last_mut()
            .filter(|m| m.role == MessageRole::Assistant)
        {
            last.content = format!("Error: {message}");
        }
        self.accumulator.clear();
        self.error = Some(message.to_string());
        self.streaming = false;
        self.halted = true;
    }

    /// End the turn normally
    pub fn finish_turn(&mut self) {
        self.streaming = false;
        self.halted = true;
    }

    // =========================================================================
    // Session list
    // =========================================================================

    /// Mark a visible session-list load as started
    pub fn begin_load(&mut self) {
        self.loading = true;
        self.load_error = None;
    }

    /// Record a failed session-list load
    pub fn load_failed(&mut self, message: impl Into<String>) {
        self.loading = false;
        self.load_error = Some(message.into());
    }

    /// Store a fresh session list and re-derive the view
    pub fn apply_sessions(&mut self, data: SessionData) {
        self.loading = false;
        self.load_error = None;
        self.session_data = Some(data);
        self.rederive();
    }

    /// Make the captured new-session id the active conversation
    ///
    /// Returns the adopted id, or `None` if nothing was captured.
    pub fn adopt_pending_session(&mut self) -> Option<String> {
        let id = self.pending_session_id.take()?;
        tracing::info!(session_id = %id, "Adopted new session");
        self.active_session_id = Some(id.clone());
        self.creating_new = false;
        self.rederive();
        Some(id)
    }

    /// Rebuild the conversation list and the view from the session list
    fn rederive(&mut self) {
        let Some(data) = self.session_data.as_ref() else {
            return;
        };
        self.conversations = conversation_list(data);

        // The timeline of a streaming turn belongs to the turn
        if self.streaming {
            return;
        }

        let target = match self.active_session_id.as_deref() {
            Some(id) if find_session(data, id).is_some() => Some(id.to_string()),
            Some(_) | None if self.creating_new => None,
            _ => self.conversations.first().map(|c| c.session_id.clone()),
        };

        match target.as_deref().and_then(|id| find_session(data, id)) {
            Some(session) => {
                self.messages = extract_messages(session);
                self.tool_calls = extract_tool_calls(session);
            }
            None => {
                self.messages.clear();
                self.tool_calls.clear();
            }
        }
        if !self.creating_new {
            self.active_session_id = target;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::{Run, RunMessage, Session, SessionMemory};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn session(id: &str, created_at: f64, texts: &[(&str, &str)]) -> Session {
        let messages = texts
            .iter()
            .enumerate()
            .map(|(i, (role, text))| RunMessage {
                role: (*role).to_string(),
                content: Some(json!(text)),
                created_at: created_at + i as f64,
                ..RunMessage::default()
            })
            .collect();
        Session {
            session_id: id.to_string(),
            created_at,
            memory: SessionMemory {
                runs: vec![Run {
                    messages,
                    ..Run::default()
                }],
            },
            ..Session::default()
        }
    }

    fn data(sessions: Vec<Session>) -> SessionData {
        SessionData { sessions }
    }

    fn contents(state: &ChatState) -> Vec<&str> {
        state.messages().iter().map(|m| m.content.as_str()).collect()
    }

    fn creating() -> ChatState {
        let mut state = ChatState::new();
        state.start_new_conversation().unwrap();
        state
    }

    // =========================================================================
    // Turn Tests
    // =========================================================================

    #[test]
    fn test_begin_turn_requires_conversation() {
        let mut state = ChatState::new();
        assert!(matches!(
            state.begin_turn("Oi"),
            Err(ChatError::NoActiveConversation)
        ));
        assert!(state.messages().is_empty());
    }

    #[test]
    fn test_begin_turn_pushes_user_and_placeholder() {
        let mut state = creating();
        let request = state.begin_turn("Oi").unwrap();

        assert_eq!(request, StreamRequest::new_conversation("Oi"));
        assert!(state.is_streaming());
        let messages = state.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert!(messages[1].is_placeholder());
        assert!(messages[1].created_at > messages[0].created_at);
    }

    #[test]
    fn test_begin_turn_in_existing_session() {
        let mut state = ChatState::new();
        state.apply_sessions(data(vec![session("s9", 1.0, &[("user", "a")])]));
        assert_eq!(state.active_session_id(), Some("s9"));

        let request = state.begin_turn("b").unwrap();
        assert_eq!(request, StreamRequest::in_session("b", "s9"));
    }

    #[test]
    fn test_second_send_rejected_while_streaming() {
        let mut state = creating();
        state.begin_turn("one").unwrap();
        assert!(matches!(
            state.begin_turn("two"),
            Err(ChatError::TurnInProgress)
        ));
        assert_eq!(state.messages().len(), 2);
    }

    #[test]
    fn test_content_accumulates() {
        let mut state = creating();
        state.begin_turn("Oi").unwrap();

        assert_eq!(state.apply_event(&StreamEvent::delta("Hel")), Flow::Continue);
        assert_eq!(state.apply_event(&StreamEvent::delta("lo")), Flow::Continue);

        assert_eq!(contents(&state), vec!["Oi", "Hello"]);
    }

    #[test]
    fn test_content_updates_timestamp() {
        let mut state = creating();
        state.begin_turn("Oi").unwrap();
        state.apply_event(&StreamEvent::tagged("RunResponse").with_content("x").with_created_at(42.0));
        assert_eq!(state.messages()[1].created_at, 42.0);
    }

    #[test]
    fn test_non_string_content_ignored() {
        let mut state = creating();
        state.begin_turn("Oi").unwrap();
        let mut event = StreamEvent::tagged("RunResponse");
        event.content = Some(json!({ "structured": true }));
        state.apply_event(&event);
        assert!(state.messages()[1].is_placeholder());
    }

    #[test]
    fn test_passive_events_do_nothing() {
        let mut state = creating();
        state.begin_turn("Oi").unwrap();
        for tag in ["RunStarted", "ReasoningStarted", "MemoryUpdated", "UpdatingMemory"] {
            let event = StreamEvent::tagged(tag).with_content("ignored");
            assert_eq!(state.apply_event(&event), Flow::Continue);
        }
        assert!(state.messages()[1].is_placeholder());
        assert!(state.tool_calls().is_empty());
    }

    #[test]
    fn test_search_tool_lifecycle() {
        let mut state = creating();
        state.begin_turn("Oi").unwrap();

        let call = "web_search_using_tavily(query=\"x\")";
        state.apply_event(&StreamEvent::tagged("ToolCallStarted").with_content(call));
        state.apply_event(&StreamEvent::tagged("ToolCallStarted").with_content(call));
        assert_eq!(
            state.tool_calls(),
            &[ToolCall::new("search", ToolStatus::Running)]
        );

        state.apply_event(&StreamEvent::tagged("ToolCallCompleted").with_content(call));
        assert_eq!(
            state.tool_calls(),
            &[ToolCall::new("search", ToolStatus::Completed)]
        );
    }

    #[test]
    fn test_completion_without_start_is_noop() {
        let mut state = creating();
        state.begin_turn("Oi").unwrap();
        state.apply_event(&StreamEvent::tagged("ToolCallCompleted").with_content("search(q)"));
        state.apply_event(&StreamEvent::tagged("ToolCallStarted").with_content("not a call"));
        assert!(state.tool_calls().is_empty());
    }

    #[test]
    fn test_run_completed_halts() {
        let mut state = creating();
        state.begin_turn("Oi").unwrap();

        state.apply_event(&StreamEvent::delta("done"));
        assert_eq!(
            state.apply_event(&StreamEvent::tagged("RunCompleted")),
            Flow::Completed
        );
        assert_eq!(
            state.apply_event(&StreamEvent::delta(" and more")),
            Flow::Completed
        );
        assert_eq!(contents(&state), vec!["Oi", "done"]);
    }

    #[test]
    fn test_fail_turn_replaces_partial_reply() {
        let mut state = creating();
        state.begin_turn("Oi").unwrap();
        state.apply_event(&StreamEvent::delta("partial"));

        state.fail_turn("connection reset");

        assert_eq!(contents(&state), vec!["Oi", "Error: connection reset"]);
        assert_eq!(state.error(), Some("connection reset"));
        assert!(!state.is_streaming());
    }

    // =========================================================================
    // Session Adoption Tests
    // =========================================================================

    #[test]
    fn test_first_session_id_wins() {
        let mut state = creating();
        state.begin_turn("Oi").unwrap();

        state.apply_event(&StreamEvent::tagged("RunStarted").with_session_id("s1"));
        state.apply_event(&StreamEvent::delta("x").with_session_id("s2"));

        assert_eq!(state.pending_session_id(), Some("s1"));
        assert_eq!(state.active_session_id(), None);
    }

    #[test]
    fn test_session_id_ignored_outside_creating_mode() {
        let mut state = ChatState::new();
        state.apply_sessions(data(vec![session("s9", 1.0, &[])]));
        state.begin_turn("Oi").unwrap();
        state.apply_event(&StreamEvent::delta("x").with_session_id("other"));
        assert_eq!(state.pending_session_id(), None);
        assert_eq!(state.active_session_id(), Some("s9"));
    }

    #[test]
    fn test_new_session_adopted_after_refetch() {
        let mut state = creating();
        state.apply_sessions(data(vec![session("old", 1.0, &[("user", "antes")])]));
        // Creating mode keeps the view empty
        assert_eq!(state.active_session_id(), None);
        assert!(state.messages().is_empty());

        state.begin_turn("Oi").unwrap();
        state.apply_event(&StreamEvent::tagged("RunStarted").with_session_id("s1"));
        state.apply_event(&StreamEvent::delta("Olá"));
        assert_eq!(state.apply_event(&StreamEvent::tagged("RunCompleted")), Flow::Completed);
        state.finish_turn();

        // No intermediate state shows the new id
        assert_eq!(state.active_session_id(), None);

        state.apply_sessions(data(vec![
            session("old", 1.0, &[("user", "antes")]),
            session("s1", 2.0, &[("user", "Oi"), ("assistant", "Olá")]),
        ]));
        assert_eq!(state.active_session_id(), None);

        assert_eq!(state.adopt_pending_session().as_deref(), Some("s1"));
        assert_eq!(state.active_session_id(), Some("s1"));
        assert!(!state.is_creating_new());
        assert_eq!(state.pending_session_id(), None);
        assert_eq!(contents(&state), vec!["Oi", "Olá"]);
    }

    #[test]
    fn test_adopt_without_capture() {
        let mut state = creating();
        assert_eq!(state.adopt_pending_session(), None);
        assert!(state.is_creating_new());
    }

    // =========================================================================
    // View Derivation Tests
    // =========================================================================

    #[test]
    fn test_initial_load_selects_most_recent() {
        let mut state = ChatState::new();
        state.apply_sessions(data(vec![
            session("a", 1.0, &[("user", "first")]),
            session("b", 5.0, &[("user", "latest")]),
        ]));

        assert_eq!(state.active_session_id(), Some("b"));
        assert_eq!(contents(&state), vec!["latest"]);
        let ids: Vec<_> = state.conversations().iter().map(|c| c.session_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_missing_active_session_falls_back() {
        let mut state = ChatState::new();
        state.apply_sessions(data(vec![session("a", 1.0, &[("user", "x")])]));
        state.select_session("gone").unwrap();
        assert_eq!(state.active_session_id(), Some("a"));

        state.apply_sessions(data(vec![]));
        assert_eq!(state.active_session_id(), None);
        assert!(state.messages().is_empty());
    }

    #[test]
    fn test_select_session_shows_its_messages() {
        let mut state = ChatState::new();
        state.apply_sessions(data(vec![
            session("a", 1.0, &[("user", "from a")]),
            session("b", 2.0, &[("user", "from b")]),
        ]));
        state.select_session("a").unwrap();
        assert_eq!(contents(&state), vec!["from a"]);
    }

    #[test]
    fn test_refresh_during_stream_keeps_timeline() {
        let mut state = creating();
        state.begin_turn("Oi").unwrap();
        state.apply_event(&StreamEvent::delta("Ol"));

        state.apply_sessions(data(vec![session("a", 1.0, &[("user", "x")])]));

        assert_eq!(contents(&state), vec!["Oi", "Ol"]);
        assert_eq!(state.conversations().len(), 1);
        assert!(matches!(
            state.select_session("a"),
            Err(ChatError::TurnInProgress)
        ));
    }

    #[test]
    fn test_load_error_lifecycle() {
        let mut state = ChatState::new();
        state.begin_load();
        assert!(state.is_loading());
        state.load_failed("boom");
        assert!(!state.is_loading());
        assert_eq!(state.load_error(), Some("boom"));
        state.apply_sessions(SessionData::default());
        assert_eq!(state.load_error(), None);
    }
}
