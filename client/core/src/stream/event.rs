//! Stream Event Records
//!
//! One decoded record of the reply stream and its classification.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::messages::display_tool_name;

/// Call-signature pattern used in tool-call event contents, e.g. `search(query="x")`
static TOOL_CALL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z0-9_]+)\(.*\)$").ok());

/// A decoded stream record
///
/// Every field is optional; the backend attaches whichever ones apply to
/// the event. `content` stays opaque JSON because only string contents
/// carry reply text or tool-call signatures.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Event tag
    #[serde(default)]
    pub event: Option<String>,
    /// Event payload
    #[serde(default)]
    pub content: Option<serde_json::Value>,
    /// When the backend produced this record (epoch seconds)
    #[serde(default)]
    pub created_at: Option<f64>,
    /// Backend session the run belongs to
    #[serde(default)]
    pub session_id: Option<String>,
}

impl StreamEvent {
    /// Decode a record cut by the demultiplexer
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the record is not a valid object.
    pub fn parse(record: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(record)
    }

    /// Classify this record by its tag
    #[must_use]
    pub fn kind(&self) -> EventKind {
        EventKind::from_tag(self.event.as_deref())
    }

    /// The content, if it is a string
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.content.as_ref().and_then(serde_json::Value::as_str)
    }

    /// Build an untagged content delta
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            content: Some(serde_json::Value::String(text.into())),
            ..Self::default()
        }
    }

    /// Build a tagged record
    pub fn tagged(tag: impl Into<String>) -> Self {
        Self {
            event: Some(tag.into()),
            ..Self::default()
        }
    }

    /// Attach string content
    #[must_use]
    pub fn with_content(mut self, text: impl Into<String>) -> Self {
        self.content = Some(serde_json::Value::String(text.into()));
        self
    }

    /// Attach a session id
    #[must_use]
    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Attach a timestamp
    #[must_use]
    pub fn with_created_at(mut self, created_at: f64) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// Event taxonomy of the reply stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The agent run began
    RunStarted,
    /// The agent began a reasoning step
    ReasoningStarted,
    /// The agent memory was written
    MemoryUpdated,
    /// The agent memory is being written
    UpdatingMemory,
    /// A tool invocation began
    ToolCallStarted,
    /// A tool invocation returned
    ToolCallCompleted,
    /// The run finished; nothing after this belongs to the turn
    RunCompleted,
    /// Reply text: untagged records and tags outside the taxonomy
    /// (the backend tags its deltas `RunResponse`)
    Content,
}

impl EventKind {
    /// Classify a tag (exact, case-sensitive)
    #[must_use]
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("RunStarted") => Self::RunStarted,
            Some("ReasoningStarted") => Self::ReasoningStarted,
            Some("MemoryUpdated") => Self::MemoryUpdated,
            Some("UpdatingMemory") => Self::UpdatingMemory,
            Some("ToolCallStarted") => Self::ToolCallStarted,
            Some("ToolCallCompleted") => Self::ToolCallCompleted,
            Some("RunCompleted") => Self::RunCompleted,
            _ => Self::Content,
        }
    }

    /// Whether the event is lifecycle noise with no effect on the view
    #[must_use]
    pub fn is_passive(self) -> bool {
        matches!(
            self,
            Self::RunStarted | Self::ReasoningStarted | Self::MemoryUpdated | Self::UpdatingMemory
        )
    }
}

/// Extract the display name of the tool in a call signature
///
/// `web_search_using_tavily(query="FURIA")` yields `search`. Returns `None`
/// when the content is not a call signature.
#[must_use]
pub fn parse_tool_call(content: &str) -> Option<String> {
    let pattern = TOOL_CALL_PATTERN.as_ref()?;
    let name = pattern.captures(content)?.get(1)?.as_str();
    Some(display_tool_name(name).to_string())
}
