//! Main Application
//!
//! The App struct manages the TUI lifecycle as a thin client over
//! `furiabot-core`:
//! - Event loop (keyboard, resize)
//! - Routing between screens, with the sign-in guard on every navigation
//! - A [`ChatSession`] for the chat screen, polled once per frame
//! - Sign-in requests on background tasks, reported back over a channel

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::{Frame, Terminal};
use tokio::sync::mpsc;

use furiabot_core::config::MAX_AUTO_REFRESH_INTERVAL;
use furiabot_core::{guard, ApiError, ChatSession, ClientConfig, HttpBackend, Route};

use crate::screens::auth::{self, FormAction, FormKind, FormState};
use crate::screens::chat::{self, ChatAction, ChatView};
use crate::screens::home::{self, HomeView};

/// Shown on the login form after the backend rejected a refresh
pub const SESSION_EXPIRED_NOTICE: &str = "Your session expired. Please log in again.";

/// Result of a background login or registration
struct AuthOutcome {
    kind: FormKind,
    result: Result<(), ApiError>,
}

/// Main application state
pub struct App {
    // === Core State ===
    /// Is the app still running?
    running: bool,
    /// Current screen
    route: Route,
    /// Animation clock
    started: Instant,

    // === Backend ===
    /// Loaded configuration
    config: ClientConfig,
    /// Agent service client, shared with background tasks
    api: Arc<HttpBackend>,
    /// Chat driver; replaced each time the chat screen is entered
    chat: ChatSession<HttpBackend>,
    /// Sign-in results from background tasks
    auth_tx: mpsc::UnboundedSender<AuthOutcome>,
    auth_rx: mpsc::UnboundedReceiver<AuthOutcome>,

    // === Screen State ===
    login: FormState,
    register: FormState,
    chat_view: ChatView,
    /// One-off message for the home screen
    notice: Option<String>,

    // === Timers ===
    /// When the chat screen next refreshes the conversation list
    next_refresh: Instant,
}

impl App {
    /// Create the app on the home screen
    #[must_use]
    pub fn new(config: ClientConfig, api: Arc<HttpBackend>) -> Self {
        let (auth_tx, auth_rx) = mpsc::unbounded_channel();
        let chat = ChatSession::new(Arc::clone(&api), config.refetch_delay);
        let next_refresh = refresh_deadline(Instant::now(), config.auto_refresh_interval);
        Self {
            running: true,
            route: Route::Home,
            started: Instant::now(),
            config,
            api,
            chat,
            auth_tx,
            auth_rx,
            login: FormState::login(),
            register: FormState::register(),
            chat_view: ChatView::default(),
            notice: None,
            next_refresh,
        }
    }

    /// Current screen
    #[must_use]
    pub fn route(&self) -> Route {
        self.route
    }

    /// Whether the event loop keeps going
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The chat driver of the chat screen
    #[must_use]
    pub fn chat(&self) -> &ChatSession<HttpBackend> {
        &self.chat
    }

    /// Main event loop
    ///
    /// # Errors
    ///
    /// Fails when the terminal cannot be drawn.
    pub async fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> anyhow::Result<()> {
        // ~30 FPS keeps the 300ms dots smooth
        let frame_duration = Duration::from_millis(33);
        let mut event_stream = EventStream::new();

        terminal.draw(|frame| self.draw(frame))?;

        while self.running {
            let frame_start = Instant::now();

            tokio::select! {
                biased;

                maybe_event = event_stream.next() => {
                    match maybe_event {
                        // Only handle Press events (not Release or Repeat)
                        Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                            self.handle_key(key);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => tracing::warn!(error = %e, "Terminal event error"),
                        None => self.running = false,
                    }
                }

                _ = tokio::time::sleep(Duration::from_millis(16)) => {}
            }

            self.update();
            terminal.draw(|frame| self.draw(frame))?;

            let elapsed = frame_start.elapsed();
            if elapsed < frame_duration {
                tokio::time::sleep(frame_duration - elapsed).await;
            }
        }

        Ok(())
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Go to a screen, subject to the sign-in guard
    pub fn navigate(&mut self, requested: Route) {
        let target = guard(requested, self.api.tokens().is_authenticated());
        if target != requested {
            tracing::debug!(?requested, ?target, "Route redirected");
        }
        if target == self.route {
            return;
        }
        tracing::debug!(from = ?self.route, to = ?target, "Navigate");
        self.route = target;
        if target == Route::Chat {
            self.enter_chat();
        }
    }

    /// Fresh chat screen: load the list and start a new conversation
    fn enter_chat(&mut self) {
        self.chat = ChatSession::new(Arc::clone(&self.api), self.config.refetch_delay);
        self.chat_view = ChatView::default();
        self.chat.refresh_sessions(true);
        if let Err(e) = self.chat.start_new_conversation() {
            tracing::warn!(error = %e, "Could not start a new conversation");
        }
        self.next_refresh = refresh_deadline(Instant::now(), self.config.auto_refresh_interval);
    }

    fn log_out(&mut self) {
        if let Err(e) = self.api.logout() {
            tracing::warn!(error = %e, "Failed to clear credentials");
        }
        self.navigate(Route::Home);
    }

    fn expire_session(&mut self) {
        tracing::info!("Session expired, returning to login");
        // The backend already dropped the rejected credentials
        self.login = FormState::login();
        self.login.set_error(SESSION_EXPIRED_NOTICE);
        self.navigate(Route::Login);
    }

    // =========================================================================
    // Input
    // =========================================================================

    /// Handle keyboard input
    ///
    /// Never waits on the network; requests run on background tasks.
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.running = false;
            return;
        }

        match self.route {
            Route::Home => self.handle_home_key(key),
            Route::Login => self.handle_form_key(FormKind::Login, key),
            Route::Register => self.handle_form_key(FormKind::Register, key),
            Route::Chat => {
                self.chat_view.status = None;
                let action = self.chat_view.handle_key(key, self.chat.state());
                self.handle_chat_action(action);
            }
        }
    }

    fn handle_home_key(&mut self, key: KeyEvent) {
        let authenticated = self.api.tokens().is_authenticated();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Enter if authenticated => {
                self.notice = None;
                self.navigate(Route::Chat);
            }
            KeyCode::Char('l') if authenticated => self.log_out(),
            KeyCode::Char('l') => {
                self.notice = None;
                self.navigate(Route::Login);
            }
            KeyCode::Char('r') if !authenticated => {
                self.notice = None;
                self.navigate(Route::Register);
            }
            _ => {}
        }
    }

    fn handle_form_key(&mut self, kind: FormKind, key: KeyEvent) {
        let form = self.form_mut(kind);
        match form.handle_key(key) {
            FormAction::None => {}
            FormAction::Submit => self.submit_form(kind),
            FormAction::Cancel => self.navigate(Route::Home),
            FormAction::Switch => self.navigate(match kind {
                FormKind::Login => Route::Register,
                FormKind::Register => Route::Login,
            }),
        }
    }

    fn form_mut(&mut self, kind: FormKind) -> &mut FormState {
        match kind {
            FormKind::Login => &mut self.login,
            FormKind::Register => &mut self.register,
        }
    }

    fn submit_form(&mut self, kind: FormKind) {
        let form = self.form_mut(kind);
        form.begin_submit();
        let username = form.username().to_string();
        let email = form.email().to_string();
        let password = form.password().to_string();

        let api = Arc::clone(&self.api);
        let tx = self.auth_tx.clone();
        tokio::spawn(async move {
            let result = match kind {
                FormKind::Login => api.login(&username, &password).await,
                FormKind::Register => api.register(&username, &email, &password).await,
            };
            // Receiver gone means the app is shutting down
            let _ = tx.send(AuthOutcome { kind, result });
        });
    }

    fn handle_chat_action(&mut self, action: ChatAction) {
        match action {
            ChatAction::None => {}
            ChatAction::Send(content) => {
                if let Err(e) = self.chat.send_message(&content) {
                    self.chat_view.input = content;
                    self.chat_view.status = Some(e.to_string());
                }
            }
            ChatAction::NewConversation => {
                if let Err(e) = self.chat.start_new_conversation() {
                    self.chat_view.status = Some(e.to_string());
                }
            }
            ChatAction::Select(session_id) => {
                if let Err(e) = self.chat.select_session(&session_id) {
                    self.chat_view.status = Some(e.to_string());
                }
            }
            ChatAction::Retry => self.chat.refresh_sessions(true),
            ChatAction::GoHome => self.navigate(Route::Home),
        }
    }

    // =========================================================================
    // Per-frame Update
    // =========================================================================

    /// Apply background results and run timers
    pub fn update(&mut self) {
        while let Ok(outcome) = self.auth_rx.try_recv() {
            self.apply_auth_outcome(outcome);
        }

        if self.route == Route::Chat {
            self.chat.poll();

            if self.chat.requires_login() {
                self.expire_session();
                return;
            }

            let now = Instant::now();
            if now >= self.next_refresh {
                tracing::debug!("Auto-refreshing conversations");
                self.chat.refresh_sessions(false);
                self.next_refresh = refresh_deadline(now, self.config.auto_refresh_interval);
            }
        }

        // Credentials can disappear underneath any private screen
        if !self.route.is_public() && !self.api.tokens().is_authenticated() {
            self.navigate(Route::Login);
        }
    }

    fn apply_auth_outcome(&mut self, outcome: AuthOutcome) {
        let AuthOutcome { kind, result } = outcome;
        match result {
            Ok(()) => {
                self.form_mut(kind).finish_submit(Ok(()));
                self.navigate(Route::Home);
            }
            Err(e) => {
                tracing::warn!(error = %e, ?kind, "Sign-in failed");
                self.form_mut(kind).finish_submit(Err(e.to_string()));
            }
        }
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Draw the current screen
    pub fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        match self.route {
            Route::Home => {
                let username = self.api.tokens().username();
                let view = HomeView {
                    authenticated: self.api.tokens().is_authenticated(),
                    username: username.as_deref(),
                    notice: self.notice.as_deref(),
                };
                home::render(frame, area, &view);
            }
            Route::Login => auth::render(frame, area, &self.login),
            Route::Register => auth::render(frame, area, &self.register),
            Route::Chat => chat::render(
                frame,
                area,
                self.chat.state(),
                &mut self.chat_view,
                self.started.elapsed(),
            ),
        }
    }
}

/// When the next periodic refresh is due
///
/// Falls back to the longest accepted interval when `interval` does not fit.
fn refresh_deadline(now: Instant, interval: Duration) -> Instant {
    now.checked_add(interval)
        .or_else(|| now.checked_add(MAX_AUTO_REFRESH_INTERVAL))
        .unwrap_or(now)
}
