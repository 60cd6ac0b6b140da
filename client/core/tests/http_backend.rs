//! HTTP Backend Integration Tests
//!
//! Runs [`HttpBackend`] against a local axum server that mimics the agent
//! service: form sign-in, JSON sign-up, token refresh, bearer-protected
//! session list and a streamed reply body.
//!
//! The server accepts only access token `a2`. Signing in issues `a1`, so
//! every authenticated call first gets a `401` and has to go through the
//! refresh path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::time::timeout;

use furiabot_core::{
    credentials::CREDENTIALS_FILENAME, ApiError, ChatBackend, ChatSession, CredentialStore,
    Credentials, HttpBackend, StreamRequest, TokenStore,
};

const REPLY_BODY: &str = concat!(
    r#"{"event":"RunStarted","session_id":"s1"}"#,
    "\n",
    r#"{"event":"RunResponse","content":"Próximo jogo: ","session_id":"s1"}"#,
    r#"{"event":"RunResponse","content":"sábado","session_id":"s1"}"#,
    "\n",
    r#"{"event":"RunCompleted","session_id":"s1"}"#,
);

// ============================================================================
// Fake Agent Service
// ============================================================================

#[derive(Clone, Default)]
struct ServiceState {
    refresh_calls: Arc<AtomicUsize>,
    rejected_calls: Arc<AtomicUsize>,
    stream_bodies: Arc<parking_lot::Mutex<Vec<Value>>>,
}

fn tokens(access: &str, refresh: &str) -> Response {
    Json(json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "bearer"
    }))
    .into_response()
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn authorized(state: &ServiceState, headers: &HeaderMap) -> bool {
    let ok = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "Bearer a2");
    if !ok {
        state.rejected_calls.fetch_add(1, Ordering::SeqCst);
    }
    ok
}

async fn token_handler(Form(form): Form<HashMap<String, String>>) -> Response {
    match form.get("password").map(String::as_str) {
        Some("furia") => tokens("a1", "r1"),
        _ => detail(StatusCode::UNAUTHORIZED, "Incorrect username or password"),
    }
}

async fn register_handler(Json(body): Json<Value>) -> Response {
    if body["username"] == "taken" {
        return detail(StatusCode::BAD_REQUEST, "Username already registered");
    }
    if body["email"].as_str().is_none() {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "email required");
    }
    tokens("a1", "r1")
}

async fn refresh_handler(State(state): State<ServiceState>, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    if body["refresh_token"] == "r1" {
        tokens("a2", "r2")
    } else {
        detail(StatusCode::UNAUTHORIZED, "Invalid refresh token")
    }
}

async fn sessions_handler(State(state): State<ServiceState>, headers: HeaderMap) -> Response {
    if !authorized(&state, &headers) {
        return detail(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    }
    Json(json!({
        "sessions": [{
            "session_id": "s1",
            "created_at": 1_714_000_000,
            "memory": { "runs": [{
                "messages": [
                    { "role": "user", "content": "Quando joga a FURIA?", "created_at": 1_714_000_001 },
                    { "role": "assistant", "content": "Próximo jogo: sábado", "created_at": 1_714_000_002 }
                ]
            }]}
        }]
    }))
    .into_response()
}

async fn stream_handler(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&state, &headers) {
        return detail(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    }
    state.stream_bodies.lock().push(body);
    REPLY_BODY.into_response()
}

async fn spawn_service() -> (String, ServiceState) {
    let state = ServiceState::default();
    let app = Router::new()
        .route("/token", post(token_handler))
        .route("/register", post(register_handler))
        .route("/refresh-token", post(refresh_handler))
        .route("/sessions", get(sessions_handler))
        .route("/stream_response", post(stream_handler))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), state)
}

fn backend(base: &str, dir: &TempDir) -> HttpBackend {
    let store = CredentialStore::new(dir.path().join(CREDENTIALS_FILENAME));
    let tokens = TokenStore::open(store).unwrap();
    HttpBackend::new(base, Duration::from_secs(5), tokens).unwrap()
}

// ============================================================================
// Account Tests
// ============================================================================

#[tokio::test]
async fn test_login_persists_credentials() {
    let (base, _state) = spawn_service().await;
    let dir = TempDir::new().unwrap();
    let api = backend(&base, &dir);

    api.login("fallen", "furia").await.unwrap();

    assert!(api.tokens().is_authenticated());
    let persisted = CredentialStore::new(dir.path().join(CREDENTIALS_FILENAME))
        .load()
        .unwrap();
    assert_eq!(
        persisted,
        Credentials {
            access_token: Some("a1".to_string()),
            refresh_token: Some("r1".to_string()),
            username: Some("fallen".to_string()),
        }
    );
}

#[tokio::test]
async fn test_login_failure_carries_detail() {
    let (base, _state) = spawn_service().await;
    let dir = TempDir::new().unwrap();
    let api = backend(&base, &dir);

    let err = api.login("fallen", "wrong").await.unwrap_err();

    match err {
        ApiError::Status { status, detail } => {
            assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);
            assert_eq!(detail, "Incorrect username or password");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!api.tokens().is_authenticated());
}

#[tokio::test]
async fn test_register_signs_in() {
    let (base, _state) = spawn_service().await;
    let dir = TempDir::new().unwrap();
    let api = backend(&base, &dir);

    api.register("art", "art@furia.gg", "furia").await.unwrap();
    assert_eq!(api.tokens().username().as_deref(), Some("art"));

    let err = api.register("taken", "x@y.z", "pw").await.unwrap_err();
    assert!(err.to_string().starts_with("Username already registered"));
}

#[tokio::test]
async fn test_logout_clears_credentials() {
    let (base, _state) = spawn_service().await;
    let dir = TempDir::new().unwrap();
    let api = backend(&base, &dir);

    api.login("fallen", "furia").await.unwrap();
    api.logout().unwrap();

    assert!(!api.tokens().is_authenticated());
    assert!(!dir.path().join(CREDENTIALS_FILENAME).exists());
}

// ============================================================================
// Token Refresh Tests
// ============================================================================

#[tokio::test]
async fn test_unauthorized_call_refreshes_and_retries() {
    let (base, state) = spawn_service().await;
    let dir = TempDir::new().unwrap();
    let api = backend(&base, &dir);
    api.login("fallen", "furia").await.unwrap();

    let data = api.list_sessions().await.unwrap();

    assert_eq!(data.sessions.len(), 1);
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(state.rejected_calls.load(Ordering::SeqCst), 1);
    assert_eq!(api.tokens().access_token().as_deref(), Some("a2"));
    assert_eq!(api.tokens().username().as_deref(), Some("fallen"));

    // The refreshed token is reused without another refresh
    api.list_sessions().await.unwrap();
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_refresh_expires_session() {
    let (base, state) = spawn_service().await;
    let dir = TempDir::new().unwrap();
    let store = CredentialStore::new(dir.path().join(CREDENTIALS_FILENAME));
    let stale = Credentials {
        access_token: Some("stale".to_string()),
        refresh_token: Some("revoked".to_string()),
        username: Some("fallen".to_string()),
    };
    store.save(&stale).unwrap();
    let api = HttpBackend::new(&base, Duration::from_secs(5), TokenStore::open(store).unwrap())
        .unwrap();

    let err = api.list_sessions().await.unwrap_err();

    assert!(matches!(err, ApiError::SessionExpired));
    assert!(err.requires_login());
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);
    assert!(!api.tokens().is_authenticated());
    assert!(!dir.path().join(CREDENTIALS_FILENAME).exists());
}

#[tokio::test]
async fn test_signed_out_call_fails_without_request() {
    let (base, state) = spawn_service().await;
    let dir = TempDir::new().unwrap();
    let api = backend(&base, &dir);

    let err = api.list_sessions().await.unwrap_err();

    assert!(matches!(err, ApiError::NotAuthenticated));
    assert!(err.requires_login());
    assert_eq!(state.rejected_calls.load(Ordering::SeqCst), 0);
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Streaming Tests
// ============================================================================

#[tokio::test]
async fn test_stream_response_yields_body() {
    let (base, state) = spawn_service().await;
    let dir = TempDir::new().unwrap();
    let api = backend(&base, &dir);
    api.login("fallen", "furia").await.unwrap();

    let mut body = api
        .stream_response(StreamRequest::new_conversation("Quando joga a FURIA?"))
        .await
        .unwrap();
    let mut text = Vec::new();
    while let Some(chunk) = body.next().await {
        text.extend_from_slice(&chunk.unwrap());
    }

    assert_eq!(String::from_utf8(text).unwrap(), REPLY_BODY);
    assert_eq!(
        state.stream_bodies.lock().clone(),
        vec![json!({ "message": "Quando joga a FURIA?" })]
    );
}

#[tokio::test]
async fn test_full_turn_over_http() {
    let (base, state) = spawn_service().await;
    let dir = TempDir::new().unwrap();
    let api = Arc::new(backend(&base, &dir));
    api.login("fallen", "furia").await.unwrap();

    let mut chat = ChatSession::new(Arc::clone(&api), Duration::from_millis(10));
    chat.start_new_conversation().unwrap();
    timeout(Duration::from_secs(5), chat.run_turn("Quando joga a FURIA?"))
        .await
        .unwrap()
        .unwrap();

    let state_view = chat.state();
    assert_eq!(state_view.active_session_id(), Some("s1"));
    assert!(!state_view.is_creating_new());
    let contents: Vec<_> = state_view
        .messages()
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["Quando joga a FURIA?", "Próximo jogo: sábado"]);
    assert_eq!(state.stream_bodies.lock().len(), 1);
}
