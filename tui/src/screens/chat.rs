//! Chat screen
//!
//! Header, message timeline, tool pills and input, with the conversation
//! sidebar drawn over the left edge when open. Everything shown comes from
//! [`ChatState`]; [`ChatView`] only holds what the core does not know about
//! (the draft, the sidebar cursor, the scroll position).

use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, List, ListItem, Paragraph};
use ratatui::Frame;
use unicode_width::UnicodeWidthChar;

use furiabot_core::{ChatState, MessageRole, ToolStatus};

use super::{centered, hints};
use crate::format::{conversation_date, message_time};
use crate::theme;
use crate::widgets::{dots_frame, StyledLine, TextBlock, TextBlockState};

/// Rows moved per PageUp/PageDown
const SCROLL_STEP: usize = 5;

/// Sidebar width in columns
const SIDEBAR_WIDTH: u16 = 40;

/// Input box height, including its separator row
const INPUT_HEIGHT: u16 = 3;

/// Outcome of a key press on the chat screen
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatAction {
    /// Nothing for the app to do
    None,
    /// Send this message
    Send(String),
    /// Clear the view and start a new conversation
    NewConversation,
    /// Show this conversation
    Select(String),
    /// Retry the failed conversation list load
    Retry,
    /// Leave for the home screen
    GoHome,
}

/// Chat screen state the core does not track
#[derive(Debug, Default)]
pub struct ChatView {
    /// Message being typed
    pub input: String,
    /// Whether the conversation sidebar is open
    pub sidebar_visible: bool,
    /// Highlighted sidebar row
    pub sidebar_selected: usize,
    /// Timeline scroll position
    pub timeline: TextBlockState,
    /// Short note shown in the status row
    pub status: Option<String>,
}

/// Whether the screen is blocked on the first conversation list load
fn is_initial_load(state: &ChatState) -> bool {
    state.is_loading() && state.session_data().is_none()
}

/// Whether the first load failed and only a retry is offered
fn needs_retry(state: &ChatState) -> bool {
    state.load_error().is_some() && state.session_data().is_none()
}

impl ChatView {
    /// Open the sidebar with the active conversation highlighted
    pub fn open_sidebar(&mut self, state: &ChatState) {
        self.sidebar_visible = true;
        self.sidebar_selected = state
            .active_session_id()
            .and_then(|id| {
                state
                    .conversations()
                    .iter()
                    .position(|c| c.session_id == id)
            })
            .unwrap_or(0);
    }

    /// Handle a key press
    pub fn handle_key(&mut self, key: KeyEvent, state: &ChatState) -> ChatAction {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if needs_retry(state) {
            return match key.code {
                KeyCode::Char('r') if !ctrl => ChatAction::Retry,
                KeyCode::Esc | KeyCode::Home => ChatAction::GoHome,
                _ => ChatAction::None,
            };
        }
        if is_initial_load(state) {
            return match key.code {
                KeyCode::Esc | KeyCode::Home => ChatAction::GoHome,
                _ => ChatAction::None,
            };
        }

        match key.code {
            KeyCode::Char('b') if ctrl => {
                if self.sidebar_visible {
                    self.sidebar_visible = false;
                } else {
                    self.open_sidebar(state);
                }
                return ChatAction::None;
            }
            KeyCode::Char('n') if ctrl => {
                self.sidebar_visible = false;
                return ChatAction::NewConversation;
            }
            KeyCode::Home => return ChatAction::GoHome,
            _ => {}
        }

        if self.sidebar_visible {
            return self.handle_sidebar_key(key, state);
        }

        match key.code {
            KeyCode::Esc => ChatAction::GoHome,
            KeyCode::Enter => {
                let content = self.input.trim();
                if content.is_empty() || state.is_streaming() {
                    return ChatAction::None;
                }
                let content = content.to_string();
                self.input.clear();
                self.timeline.scroll_to_bottom();
                ChatAction::Send(content)
            }
            KeyCode::Backspace => {
                if !state.is_streaming() {
                    self.input.pop();
                }
                ChatAction::None
            }
            KeyCode::PageUp => {
                self.timeline.scroll_up(SCROLL_STEP);
                ChatAction::None
            }
            KeyCode::PageDown => {
                self.timeline.scroll_down(SCROLL_STEP);
                ChatAction::None
            }
            KeyCode::Char(c) if !ctrl && !state.is_streaming() => {
                self.input.push(c);
                ChatAction::None
            }
            _ => ChatAction::None,
        }
    }

    fn handle_sidebar_key(&mut self, key: KeyEvent, state: &ChatState) -> ChatAction {
        let count = state.conversations().len();
        match key.code {
            KeyCode::Esc => {
                self.sidebar_visible = false;
                ChatAction::None
            }
            KeyCode::Up => {
                self.sidebar_selected = self.sidebar_selected.saturating_sub(1);
                ChatAction::None
            }
            KeyCode::Down => {
                if self.sidebar_selected + 1 < count {
                    self.sidebar_selected += 1;
                }
                ChatAction::None
            }
            KeyCode::Enter => match state.conversations().get(self.sidebar_selected) {
                Some(item) => {
                    self.sidebar_visible = false;
                    self.timeline.scroll_to_bottom();
                    ChatAction::Select(item.session_id.clone())
                }
                None => ChatAction::None,
            },
            _ => ChatAction::None,
        }
    }
}

/// Timeline lines for the current messages
///
/// `elapsed` drives the pending-reply dots.
#[must_use]
pub fn timeline_lines(state: &ChatState, elapsed: Duration) -> Vec<StyledLine> {
    let mut lines = Vec::new();
    for message in state.messages() {
        let (name, name_style) = match message.role {
            MessageRole::User => ("You", Style::default().fg(theme::USER_TEXT)),
            MessageRole::Assistant => ("FuriaBot", Style::default().fg(theme::FURIA_GOLD)),
            MessageRole::Tool => ("Tool", theme::muted()),
            MessageRole::System => ("System", theme::muted()),
        };
        lines.push(StyledLine::new(
            format!("{name} · {}", message_time(message.created_at)),
            name_style.add_modifier(Modifier::BOLD),
        ));

        let body = if message.is_placeholder() {
            dots_frame(elapsed).to_string()
        } else {
            message.content.clone()
        };
        lines.push(StyledLine::new(body, Style::default().fg(theme::FURIA_WHITE)));
        lines.push(StyledLine::blank());
    }
    lines
}

/// Pill row for the current turn's tool calls
#[must_use]
pub fn tool_pills(state: &ChatState) -> Option<Line<'static>> {
    if state.tool_calls().is_empty() {
        return None;
    }
    let mut spans = Vec::new();
    for tool in state.tool_calls() {
        let (icon, style) = match tool.status {
            ToolStatus::Running => ("⟳", theme::key()),
            ToolStatus::Completed => ("✓", theme::muted()),
        };
        if !spans.is_empty() {
            spans.push(Span::raw(" "));
        }
        spans.push(Span::styled(format!("[{icon} {}]", tool.name), style));
    }
    Some(Line::from(spans))
}

/// Draw the chat screen
pub fn render(
    frame: &mut Frame,
    area: Rect,
    state: &ChatState,
    view: &mut ChatView,
    elapsed: Duration,
) {
    if is_initial_load(state) {
        let rect = centered(area, area.width, 1);
        frame.render_widget(
            Paragraph::new("Loading conversations...").alignment(Alignment::Center),
            rect,
        );
        return;
    }
    if needs_retry(state) {
        let message = format!("Error: {}", state.load_error().unwrap_or_default());
        let lines = vec![
            Line::styled(message, theme::error()),
            Line::from(""),
            hints(&[("r", "try again"), ("Esc", "home")]),
        ];
        let rect = centered(area, area.width, 3);
        frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), rect);
        return;
    }

    let pills = tool_pills(state);
    let [header, timeline, pill_row, input, status] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(1),
        Constraint::Length(u16::from(pills.is_some())),
        Constraint::Length(INPUT_HEIGHT),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(frame, header, state);

    let lines = timeline_lines(state, elapsed);
    let inner = Rect {
        x: timeline.x + 1,
        width: timeline.width.saturating_sub(2),
        ..timeline
    };
    frame.render_stateful_widget(TextBlock::new(&lines), inner, &mut view.timeline);

    if let Some(pills) = pills {
        frame.render_widget(Paragraph::new(pills), pill_row);
    }

    render_input(frame, input, state, view);
    render_status(frame, status, state, view);

    if view.sidebar_visible {
        render_sidebar(frame, area, state, view);
    }
}

fn render_header(frame: &mut Frame, area: Rect, state: &ChatState) {
    let subtitle = match state.active_session_id() {
        Some(id) => format!("Session ID: {id}"),
        None => "New conversation".to_string(),
    };
    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(theme::BORDER));
    let lines = vec![
        Line::styled("Conversation", theme::title()),
        Line::styled(subtitle, theme::muted()),
    ];
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_input(frame: &mut Frame, area: Rect, state: &ChatState, view: &ChatView) {
    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(theme::BORDER));
    let line = if state.is_streaming() {
        Line::styled("Waiting for reply...", theme::muted())
    } else if view.input.is_empty() {
        Line::from(vec![
            Span::styled("> ", theme::key()),
            Span::styled("Type your message...", theme::muted()),
        ])
    } else {
        let shown = tail_fitting(&view.input, area.width.saturating_sub(3) as usize);
        Line::from(vec![
            Span::styled("> ", theme::key()),
            Span::styled(format!("{shown}_"), Style::default().fg(theme::USER_TEXT)),
        ])
    };
    frame.render_widget(Paragraph::new(line).block(block), area);
}

/// The longest suffix of `text` that fits in `width` columns
fn tail_fitting(text: &str, width: usize) -> &str {
    let mut used = 0;
    let mut start = text.len();
    for (i, c) in text.char_indices().rev() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        start = i;
    }
    &text[start..]
}

fn render_status(frame: &mut Frame, area: Rect, state: &ChatState, view: &ChatView) {
    let line = if let Some(note) = view.status.as_deref() {
        Line::styled(note.to_string(), theme::error())
    } else if view.timeline.scroll_offset > 0 {
        hints(&[("PgDn", "back to latest"), ("Ctrl+B", "conversations"), ("Esc", "home")])
    } else if let Some(error) = state.load_error() {
        Line::styled(format!("Could not refresh conversations: {error}"), theme::error())
    } else {
        hints(&[
            ("Enter", "send"),
            ("Ctrl+B", "conversations"),
            ("Ctrl+N", "new"),
            ("PgUp", "scroll"),
            ("Esc", "home"),
        ])
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_sidebar(frame: &mut Frame, area: Rect, state: &ChatState, view: &ChatView) {
    let rect = Rect {
        width: SIDEBAR_WIDTH.min(area.width),
        ..area
    };
    let block = Block::default()
        .title(Line::styled(" Conversations ", theme::title()))
        .title_bottom(hints(&[("Ctrl+N", "new conversation")]))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme::BORDER));
    frame.render_widget(Clear, rect);

    if state.conversations().is_empty() {
        let inner = block.inner(rect);
        frame.render_widget(block, rect);
        frame.render_widget(
            Paragraph::new(Line::styled("No conversations yet", theme::muted()))
                .alignment(Alignment::Center),
            centered(inner, inner.width, 1),
        );
        return;
    }

    let active = state.active_session_id();
    let items: Vec<ListItem> = state
        .conversations()
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let marker = if active == Some(item.session_id.as_str()) {
                Span::styled("● ", theme::key())
            } else {
                Span::raw("  ")
            };
            let style = if i == view.sidebar_selected {
                Style::default().bg(theme::FURIA_SELECTED_BG)
            } else {
                Style::default()
            };
            ListItem::new(vec![
                Line::from(vec![
                    marker,
                    Span::styled(conversation_date(item.created_at), theme::muted()),
                ]),
                Line::from(format!("  {}", item.last_message)),
            ])
            .style(style)
        })
        .collect();

    frame.render_widget(List::new(items).block(block), rect);
}

#[cfg(test)]
mod tests {
    use super::*;
    use furiabot_core::{SessionData, StreamEvent};
    use pretty_assertions::assert_eq;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use serde_json::json;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn two_sessions() -> SessionData {
        serde_json::from_value(json!({
            "sessions": [
                {
                    "session_id": "old",
                    "created_at": 1_700_000_000,
                    "memory": { "runs": [{ "messages": [
                        { "role": "user", "content": "Old question", "created_at": 1_700_000_001 }
                    ]}]}
                },
                {
                    "session_id": "new",
                    "created_at": 1_714_000_000,
                    "memory": { "runs": [{ "messages": [
                        { "role": "user", "content": "Quem joga hoje?", "created_at": 1_714_000_001 },
                        { "role": "assistant", "content": "A FURIA joga às 15h.", "created_at": 1_714_000_002 }
                    ]}]}
                }
            ]
        }))
        .unwrap()
    }

    fn loaded_state() -> ChatState {
        let mut state = ChatState::new();
        state.apply_sessions(two_sessions());
        state
    }

    fn screen_text(state: &ChatState, view: &mut ChatView) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal
            .draw(|frame| render(frame, frame.area(), state, view, Duration::ZERO))
            .unwrap();
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_long_draft_shows_its_end() {
        assert_eq!(tail_fitting("abcdef", 3), "def");
        assert_eq!(tail_fitting("abc", 10), "abc");
        // Wide characters take two columns
        assert_eq!(tail_fitting("日本語", 5), "本語");
    }

    #[test]
    fn test_typing_and_enter_send_trimmed_draft() {
        let mut state = ChatState::new();
        state.start_new_conversation().unwrap();
        let mut view = ChatView::default();

        for c in "  Oi FURIA ".chars() {
            view.handle_key(press(KeyCode::Char(c)), &state);
        }
        let action = view.handle_key(press(KeyCode::Enter), &state);

        assert_eq!(action, ChatAction::Send("Oi FURIA".to_string()));
        assert!(view.input.is_empty());
    }

    #[test]
    fn test_blank_draft_is_not_sent() {
        let state = loaded_state();
        let mut view = ChatView::default();
        view.handle_key(press(KeyCode::Char(' ')), &state);
        assert_eq!(view.handle_key(press(KeyCode::Enter), &state), ChatAction::None);
    }

    #[test]
    fn test_input_disabled_while_streaming() {
        let mut state = ChatState::new();
        state.start_new_conversation().unwrap();
        state.begin_turn("first").unwrap();
        let mut view = ChatView::default();

        view.handle_key(press(KeyCode::Char('x')), &state);
        let action = view.handle_key(press(KeyCode::Enter), &state);

        assert_eq!(view.input, "");
        assert_eq!(action, ChatAction::None);
    }

    #[test]
    fn test_sidebar_navigation_selects_conversation() {
        let state = loaded_state();
        let mut view = ChatView::default();

        view.handle_key(ctrl('b'), &state);
        assert!(view.sidebar_visible);
        // The most recent conversation is active and listed first
        assert_eq!(view.sidebar_selected, 0);

        view.handle_key(press(KeyCode::Down), &state);
        view.handle_key(press(KeyCode::Down), &state);
        let action = view.handle_key(press(KeyCode::Enter), &state);

        assert_eq!(action, ChatAction::Select("old".to_string()));
        assert!(!view.sidebar_visible);
    }

    #[test]
    fn test_escape_closes_sidebar_before_going_home() {
        let state = loaded_state();
        let mut view = ChatView::default();
        view.handle_key(ctrl('b'), &state);

        assert_eq!(view.handle_key(press(KeyCode::Esc), &state), ChatAction::None);
        assert_eq!(view.handle_key(press(KeyCode::Esc), &state), ChatAction::GoHome);
    }

    #[test]
    fn test_new_conversation_shortcut() {
        let state = loaded_state();
        let mut view = ChatView::default();
        assert_eq!(view.handle_key(ctrl('n'), &state), ChatAction::NewConversation);
    }

    #[test]
    fn test_retry_only_after_failed_first_load() {
        let mut state = ChatState::new();
        state.begin_load();
        state.load_failed("Failed to fetch conversations (500)");
        let mut view = ChatView::default();

        assert_eq!(view.handle_key(press(KeyCode::Char('r')), &state), ChatAction::Retry);
        assert_eq!(view.input, "");

        let text = screen_text(&state, &mut view);
        assert!(text.contains("Error: Failed to fetch conversations (500)"));
    }

    #[test]
    fn test_loading_screen() {
        let mut state = ChatState::new();
        state.begin_load();
        let text = screen_text(&state, &mut ChatView::default());
        assert!(text.contains("Loading conversations..."));
    }

    #[test]
    fn test_renders_selected_conversation() {
        let state = loaded_state();
        let text = screen_text(&state, &mut ChatView::default());

        assert!(text.contains("Session ID: new"));
        assert!(text.contains("Quem joga hoje?"));
        assert!(text.contains("A FURIA joga às 15h."));
        assert!(text.contains(&message_time(1_714_000_002.0)));
    }

    #[test]
    fn test_pending_reply_and_tool_pills() {
        let mut state = ChatState::new();
        state.start_new_conversation().unwrap();
        state.begin_turn("Quem joga hoje?").unwrap();
        state.apply_event(
            &StreamEvent::tagged("ToolCallStarted")
                .with_content("web_search_using_tavily(query=\"furia\")")
                .with_session_id("s1"),
        );
        let mut view = ChatView::default();

        let text = screen_text(&state, &mut view);

        assert!(text.contains("New conversation"));
        assert!(text.contains("•.."));
        assert!(text.contains("[⟳ search]"));
        assert!(text.contains("Waiting for reply..."));
    }

    #[test]
    fn test_sidebar_lists_previews_and_dates() {
        let state = loaded_state();
        let mut view = ChatView::default();
        view.open_sidebar(&state);

        let text = screen_text(&state, &mut view);

        assert!(text.contains("Conversations"));
        assert!(text.contains("A FURIA joga às 15h."));
        assert!(text.contains(&conversation_date(1_700_000_000.0)));
    }
}
