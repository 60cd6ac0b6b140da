//! Conversation Data Model
//!
//! The types a chat surface renders: the ordered message timeline and the
//! tool-call pills for the current turn.
//!
//! Timestamps are epoch seconds as `f64`, the unit the backend uses in both
//! the session history and the stream records.

use serde::{Deserialize, Serialize};

/// Placeholder content shown while the assistant reply is pending
pub const PLACEHOLDER_CONTENT: &str = "...";

/// Backend name of the web-search tool
pub const WEB_SEARCH_TOOL: &str = "web_search_using_tavily";

/// Display name of the web-search tool
pub const SEARCH_TOOL_ALIAS: &str = "search";

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User input
    User,
    /// Agent reply
    Assistant,
    /// System prompt (never displayed)
    System,
    /// Tool output (never displayed)
    Tool,
}

impl MessageRole {
    /// Parse a backend role string
    #[must_use]
    pub fn from_wire(role: &str) -> Option<Self> {
        match role {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            "tool" => Some(Self::Tool),
            _ => None,
        }
    }
}

/// A message in the conversation timeline
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message text
    pub content: String,
    /// Who sent this message
    pub role: MessageRole,
    /// When the message was created (epoch seconds)
    pub created_at: f64,
    /// Whether the backend replayed this message from history
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_history: Option<bool>,
    /// Whether the agent stopped after a tool call on this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_after_tool_call: Option<bool>,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self::at(role, content, now_secs())
    }

    /// Create a message with an explicit timestamp
    pub fn at(role: MessageRole, content: impl Into<String>, created_at: f64) -> Self {
        Self {
            content: content.into(),
            role,
            created_at,
            from_history: None,
            stop_after_tool_call: None,
        }
    }

    /// Whether this is the pending-reply placeholder
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.role == MessageRole::Assistant && self.content == PLACEHOLDER_CONTENT
    }
}

/// Lifecycle of a tool call within a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    /// The agent is executing the tool
    Running,
    /// The tool returned
    Completed,
}

/// A tool invocation reported by the agent
///
/// Keyed by `name`: a turn holds at most one entry per tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier (after display renaming)
    pub name: String,
    /// Current status
    pub status: ToolStatus,
    /// Call parameters (not populated by the stream)
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
    /// Call result (not populated by the stream)
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

impl ToolCall {
    /// Create a tool call entry with no parameters or result
    pub fn new(name: impl Into<String>, status: ToolStatus) -> Self {
        Self {
            name: name.into(),
            status,
            parameters: None,
            result: None,
        }
    }
}

/// Map a backend tool name to its display name
#[must_use]
pub fn display_tool_name(name: &str) -> &str {
    if name == WEB_SEARCH_TOOL {
        SEARCH_TOOL_ALIAS
    } else {
        name
    }
}

/// Insert a tool call or update the status of the existing entry
pub fn upsert_tool_call(tools: &mut Vec<ToolCall>, name: &str, status: ToolStatus) {
    match tools.iter_mut().find(|t| t.name == name) {
        Some(existing) => existing.status = status,
        None => tools.push(ToolCall::new(name, status)),
    }
}

/// Current time as epoch seconds
#[must_use]
pub fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
