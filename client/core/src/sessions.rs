//! Session History
//!
//! Wire model of `GET /sessions` and the helpers that turn it into what the
//! chat surface shows: the conversation list, the message timeline of a
//! conversation and its tool pills.
//!
//! The backend stores far more per session than the client reads (agent
//! configuration, metrics, summaries). Unknown fields are ignored and every
//! field the client does read is optional on the wire.
//!
//! Only the latest run of a session is displayed; earlier runs are the
//! backend's history replay and would duplicate messages.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::messages::{display_tool_name, Message, MessageRole, ToolCall, ToolStatus};

/// Preview shown for a conversation with nothing displayable
pub const NO_MESSAGES: &str = "No messages";

/// Maximum preview length in characters before truncation
pub const PREVIEW_MAX_CHARS: usize = 50;

/// Contents that are agent scratch work rather than conversation
static TOOL_OUTPUT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^Step \d+:",
        r"(?i)^Title: .+\nReasoning:",
        r"(?i)^# .+\n\n### Summary",
        r"(?i)\nShare:\n\nComments\n",
        r"(?i)^Analyzing the search results",
        r"(?i)^Based on the search results",
        r"(?i)^Let me analyze",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Leading tool name of a run-level tool event
static RUN_TOOL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z0-9_]+)\(").ok());

/// Response of `GET /sessions`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    /// Every conversation of the signed-in user
    #[serde(default)]
    pub sessions: Vec<Session>,
}

/// One conversation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque conversation handle
    pub session_id: String,
    /// Owner
    #[serde(default)]
    pub user_id: Option<String>,
    /// Creation time (epoch seconds)
    #[serde(default)]
    pub created_at: f64,
    /// Last update (epoch seconds)
    #[serde(default)]
    pub updated_at: Option<f64>,
    /// Agent memory, holding the runs
    #[serde(default)]
    pub memory: SessionMemory,
    /// Agent that served the conversation
    #[serde(default)]
    pub agent_id: Option<String>,
}

/// Agent memory of a session
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMemory {
    /// Agent runs, oldest first
    #[serde(default)]
    pub runs: Vec<Run>,
}

/// One agent execution for a user turn
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Final run content
    #[serde(default)]
    pub content: Option<serde_json::Value>,
    /// Last event the run reported
    #[serde(default)]
    pub event: Option<String>,
    /// Session the run belongs to
    #[serde(default)]
    pub session_id: Option<String>,
    /// Start time (epoch seconds)
    #[serde(default)]
    pub created_at: Option<f64>,
    /// Full message history as seen by the agent
    #[serde(default)]
    pub messages: Vec<RunMessage>,
}

impl Run {
    /// Run content, if it is a string
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.content.as_ref().and_then(serde_json::Value::as_str)
    }
}

/// A message within a run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMessage {
    /// `user`, `assistant`, `system` or `tool`
    #[serde(default)]
    pub role: String,
    /// Message payload
    #[serde(default)]
    pub content: Option<serde_json::Value>,
    /// Creation time (epoch seconds)
    #[serde(default)]
    pub created_at: f64,
    /// Replayed from an earlier run
    #[serde(default)]
    pub from_history: Option<bool>,
    /// The agent stopped after a tool call
    #[serde(default)]
    pub stop_after_tool_call: Option<bool>,
    /// Tool invocations requested by this message
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallRef>>,
}

impl RunMessage {
    /// Message payload, if it is a non-empty string
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.content
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// A tool invocation attached to a run message
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRef {
    /// Invocation id
    #[serde(default)]
    pub id: Option<String>,
    /// Called function
    #[serde(default)]
    pub function: Option<ToolFunction>,
}

/// Function part of a [`ToolCallRef`]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolFunction {
    /// Backend tool name
    #[serde(default)]
    pub name: String,
    /// JSON-encoded arguments
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Sidebar entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationListItem {
    /// Conversation handle
    pub session_id: String,
    /// Preview of the last displayable message
    pub last_message: String,
    /// Creation time (epoch seconds)
    pub created_at: f64,
}

/// Whether `text` looks like tool output or a reasoning step
#[must_use]
pub fn is_tool_output(text: &str) -> bool {
    TOOL_OUTPUT_PATTERNS.iter().any(|p| p.is_match(text))
}

fn latest_run(session: &Session) -> Option<&Run> {
    session.memory.runs.last()
}

/// Preview of the last displayable message of a session
#[must_use]
pub fn last_message_preview(session: &Session) -> String {
    let last = latest_run(session).and_then(|run| {
        run.messages
            .iter()
            .filter(|m| m.role != "system")
            .filter_map(RunMessage::text)
            .filter(|text| !is_tool_output(text))
            .last()
    });

    match last {
        Some(text) if text.chars().count() > PREVIEW_MAX_CHARS => {
            let head: String = text.chars().take(PREVIEW_MAX_CHARS).collect();
            format!("{head}...")
        }
        Some(text) => text.to_string(),
        None => NO_MESSAGES.to_string(),
    }
}

/// Sidebar entries, newest first
#[must_use]
pub fn conversation_list(data: &SessionData) -> Vec<ConversationListItem> {
    let mut items: Vec<_> = data
        .sessions
        .iter()
        .map(|session| ConversationListItem {
            session_id: session.session_id.clone(),
            last_message: last_message_preview(session),
            created_at: session.created_at,
        })
        .collect();
    items.sort_by(|a, b| b.created_at.total_cmp(&a.created_at));
    items
}

/// Displayable messages of the latest run
///
/// Skips system messages, messages that request tool calls, empty or
/// non-string contents and tool output.
#[must_use]
pub fn extract_messages(session: &Session) -> Vec<Message> {
    let Some(run) = latest_run(session) else {
        return Vec::new();
    };

    run.messages
        .iter()
        .filter(|m| m.tool_calls.is_none())
        .filter_map(|m| {
            let role = MessageRole::from_wire(&m.role)?;
            if role == MessageRole::System {
                return None;
            }
            let text = m.text().filter(|t| !is_tool_output(t))?;
            Some(Message {
                content: text.to_string(),
                role,
                created_at: m.created_at,
                from_history: m.from_history,
                stop_after_tool_call: m.stop_after_tool_call,
            })
        })
        .collect()
}

/// Tool pills of the latest run
///
/// A run that ended on a tool event contributes that tool with the
/// matching status. Tools requested by messages are then marked completed
/// unless already running.
#[must_use]
pub fn extract_tool_calls(session: &Session) -> Vec<ToolCall> {
    let Some(run) = latest_run(session) else {
        return Vec::new();
    };

    let mut tools: Vec<ToolCall> = Vec::new();

    let run_status = match run.event.as_deref() {
        Some("ToolCallStarted") => Some(ToolStatus::Running),
        Some("ToolCallCompleted") => Some(ToolStatus::Completed),
        _ => None,
    };
    if let (Some(status), Some(pattern), Some(content)) =
        (run_status, RUN_TOOL_PATTERN.as_ref(), run.text())
    {
        if let Some(name) = pattern.captures(content).and_then(|c| c.get(1)) {
            tools.push(ToolCall::new(display_tool_name(name.as_str()), status));
        }
    }

    let requested = run
        .messages
        .iter()
        .filter_map(|m| m.tool_calls.as_ref())
        .flatten()
        .filter_map(|call| call.function.as_ref())
        .filter(|f| !f.name.is_empty());
    for function in requested {
        let name = display_tool_name(&function.name);
        match tools.iter_mut().find(|t| t.name == name) {
            Some(existing) if existing.status == ToolStatus::Running => {}
            Some(existing) => existing.status = ToolStatus::Completed,
            None => tools.push(ToolCall::new(name, ToolStatus::Completed)),
        }
    }

    tools
}

/// Look up a session by id
#[must_use]
pub fn find_session<'a>(data: &'a SessionData, session_id: &str) -> Option<&'a Session> {
    data.sessions.iter().find(|s| s.session_id == session_id)
}
