//! HTTP Backend
//!
//! Client for the agent service REST API.
//!
//! # Endpoints
//!
//! - `POST /token` - form-encoded sign-in, returns a token pair
//! - `POST /register` - JSON sign-up, returns a token pair
//! - `POST /refresh-token` - exchanges the refresh token for a new pair
//! - `GET /sessions` - conversation history (bearer)
//! - `POST /stream_response` - streamed agent reply (bearer)
//!
//! Authenticated calls attach `Authorization: Bearer <access token>` and
//! fail with [`ApiError::NotAuthenticated`] when none is stored. A
//! `401` triggers one refresh and one retry; when the refresh does not
//! succeed the stored credentials are cleared and the call fails with
//! [`ApiError::SessionExpired`].

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;

use super::traits::{ApiError, ByteStream, ChatBackend, StreamRequest};
use crate::config::ClientConfig;
use crate::credentials::{TokenPair, TokenStore};
use crate::sessions::SessionData;

/// Connection establishment timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct RegisterBody<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

/// Agent service client
#[derive(Clone)]
pub struct HttpBackend {
    /// Base URL without trailing slash
    base_url: String,
    /// Timeout for non-streaming calls
    request_timeout: Duration,
    /// HTTP client
    http_client: reqwest::Client,
    /// Shared credentials
    tokens: TokenStore,
}

impl HttpBackend {
    /// Create a backend for `base_url`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
        tokens: TokenStore,
    ) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout,
            http_client,
            tokens,
        })
    }

    /// Create from a loaded [`ClientConfig`]
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig, tokens: TokenStore) -> Result<Self, ApiError> {
        Self::new(config.api_url.clone(), config.request_timeout, tokens)
    }

    /// Shared credentials handle
    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Base URL of the service
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Sign in with username and password
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] carrying the backend `detail` when the
    /// credentials are rejected.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let response = self
            .http_client
            .post(self.url("token"))
            .timeout(self.request_timeout)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        let tokens = read_token_pair(response, "Login failed").await?;
        self.tokens.store_tokens(tokens, username)?;
        tracing::info!(username = %username, "Logged in");
        Ok(())
    }

    /// Create an account and sign in
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] carrying the backend `detail` when the
    /// registration is rejected.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), ApiError> {
        let response = self
            .http_client
            .post(self.url("register"))
            .timeout(self.request_timeout)
            .json(&RegisterBody {
                username,
                email,
                password,
            })
            .send()
            .await?;

        let tokens = read_token_pair(response, "Registration failed").await?;
        self.tokens.store_tokens(tokens, username)?;
        tracing::info!(username = %username, "Registered");
        Ok(())
    }

    /// Exchange the refresh token for a new pair
    ///
    /// Returns `false` when no refresh token is stored or the exchange
    /// fails for any reason.
    pub async fn refresh(&self) -> bool {
        let Some(refresh_token) = self.tokens.refresh_token() else {
            return false;
        };

        let result = async {
            let response = self
                .http_client
                .post(self.url("refresh-token"))
                .timeout(self.request_timeout)
                .json(&RefreshBody {
                    refresh_token: &refresh_token,
                })
                .send()
                .await?;
            let tokens = read_token_pair(response, "Token refresh failed").await?;
            self.tokens.replace_tokens(tokens)?;
            Ok::<(), ApiError>(())
        }
        .await;

        match result {
            Ok(()) => {
                tracing::debug!("Access token refreshed");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Error refreshing token");
                false
            }
        }
    }

    /// Forget the signed-in user
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials file cannot be removed.
    pub fn logout(&self) -> Result<(), ApiError> {
        self.tokens.clear()?;
        tracing::info!("Logged out");
        Ok(())
    }

    /// Send a bearer-authenticated request, refreshing once on `401`
    ///
    /// `build` is called once per attempt so the request can be replayed.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotAuthenticated`] without sending anything when
    /// no access token is stored, and [`ApiError::SessionExpired`] when the
    /// token was rejected and could not be refreshed; credentials are
    /// cleared in that case.
    pub async fn send_authorized<F>(&self, build: F) -> Result<Response, ApiError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder + Send + Sync,
    {
        let response = self.attempt(&build).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::debug!("Access token rejected, refreshing");
        if !self.refresh().await {
            if let Err(e) = self.logout() {
                tracing::warn!(error = %e, "Failed to clear credentials");
            }
            return Err(ApiError::SessionExpired);
        }

        self.attempt(&build).await
    }

    async fn attempt<F>(&self, build: &F) -> Result<Response, ApiError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder + Send + Sync,
    {
        let token = self
            .tokens
            .access_token()
            .ok_or(ApiError::NotAuthenticated)?;
        Ok(build(&self.http_client).bearer_auth(token).send().await?)
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn list_sessions(&self) -> Result<SessionData, ApiError> {
        let url = self.url("sessions");
        let timeout = self.request_timeout;
        let response = self
            .send_authorized(|client| client.get(&url).timeout(timeout))
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response, "Failed to fetch conversations").await);
        }

        response
            .json::<SessionData>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn stream_response(&self, request: StreamRequest) -> Result<ByteStream, ApiError> {
        let url = self.url("stream_response");
        let response = self
            .send_authorized(|client| client.post(&url).json(&request))
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response, "API error").await);
        }
        if response.content_length() == Some(0) {
            return Err(ApiError::MissingBody);
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ApiError::from))
            .boxed())
    }
}

/// Read a token pair from a sign-in style response
async fn read_token_pair(response: Response, fallback: &str) -> Result<TokenPair, ApiError> {
    if !response.status().is_success() {
        return Err(status_error(response, fallback).await);
    }
    response
        .json::<TokenPair>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

/// Turn a non-success response into [`ApiError::Status`]
///
/// Uses the backend's `detail` string when the body has one.
async fn status_error(response: Response, fallback: &str) -> ApiError {
    let status = response.status();
    let detail = response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|body| {
            body.get("detail")
                .and_then(serde_json::Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| fallback.to_string());
    ApiError::Status { status, detail }
}
