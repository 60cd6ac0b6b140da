//! Chat Backend Traits
//!
//! The chat driver talks to the agent service through [`ChatBackend`], so
//! the same turn logic runs against the HTTP backend and against scripted
//! backends in tests.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::credentials::CredentialError;
use crate::sessions::SessionData;

/// Reply body as a stream of chunks
pub type ByteStream = BoxStream<'static, Result<Bytes, ApiError>>;

/// Errors at the backend boundary
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection, TLS or body read failure
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("{detail} ({status})")]
    Status {
        /// HTTP status
        status: StatusCode,
        /// Backend `detail` message or status reason
        detail: String,
    },

    /// A streaming response carried no body
    #[error("response has no body")]
    MissingBody,

    /// The access token was rejected and could not be refreshed
    #[error("Session expired. Please log in again.")]
    SessionExpired,

    /// An authenticated call was made with no stored credentials
    #[error("not logged in")]
    NotAuthenticated,

    /// A response body did not have the expected shape
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Credentials could not be persisted
    #[error(transparent)]
    Credentials(#[from] CredentialError),
}

impl ApiError {
    /// Whether the user must sign in again
    #[must_use]
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::NotAuthenticated)
    }
}

/// Body of `POST /stream_response`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRequest {
    /// The user's message
    pub message: String,
    /// Conversation to continue; omitted to start a new one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl StreamRequest {
    /// Request that starts a new conversation
    pub fn new_conversation(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: None,
        }
    }

    /// Request that continues `session_id`
    pub fn in_session(message: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: Some(session_id.into()),
        }
    }
}

/// Agent service operations used by the chat driver
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Fetch every conversation of the signed-in user
    async fn list_sessions(&self) -> Result<SessionData, ApiError>;

    /// Send a message and get the reply body as a chunk stream
    ///
    /// Resolves once response headers arrive; a non-success status is an
    /// error, never a stream.
    async fn stream_response(&self, request: StreamRequest) -> Result<ByteStream, ApiError>;
}
