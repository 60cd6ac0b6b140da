//! Login and registration forms

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph};
use ratatui::Frame;

use super::{centered, hints};
use crate::theme;

const FORM_WIDTH: u16 = 48;

/// Which form this is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormKind {
    /// Sign in with username and password
    Login,
    /// Create an account
    Register,
}

impl FormKind {
    fn title(self) -> &'static str {
        match self {
            Self::Login => "Log in",
            Self::Register => "Register",
        }
    }

    fn busy_label(self) -> &'static str {
        match self {
            Self::Login => "Logging in...",
            Self::Register => "Registering...",
        }
    }
}

/// Outcome of a key press on a form
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormAction {
    /// Nothing for the app to do
    None,
    /// All fields are filled in; submit them
    Submit,
    /// Leave the form
    Cancel,
    /// Go to the other form
    Switch,
}

#[derive(Debug)]
struct Field {
    label: &'static str,
    value: String,
    masked: bool,
}

impl Field {
    fn new(label: &'static str, masked: bool) -> Self {
        Self {
            label,
            value: String::new(),
            masked,
        }
    }
}

/// Editable state of a login or registration form
#[derive(Debug)]
pub struct FormState {
    kind: FormKind,
    fields: Vec<Field>,
    focus: usize,
    error: Option<String>,
    submitting: bool,
}

impl FormState {
    /// Empty login form
    #[must_use]
    pub fn login() -> Self {
        Self::with_fields(
            FormKind::Login,
            vec![Field::new("Username", false), Field::new("Password", true)],
        )
    }

    /// Empty registration form
    #[must_use]
    pub fn register() -> Self {
        Self::with_fields(
            FormKind::Register,
            vec![
                Field::new("Username", false),
                Field::new("Email", false),
                Field::new("Password", true),
            ],
        )
    }

    fn with_fields(kind: FormKind, fields: Vec<Field>) -> Self {
        Self {
            kind,
            fields,
            focus: 0,
            error: None,
            submitting: false,
        }
    }

    /// Which form this is
    #[must_use]
    pub fn kind(&self) -> FormKind {
        self.kind
    }

    fn field(&self, label: &str) -> &str {
        self.fields
            .iter()
            .find(|f| f.label == label)
            .map_or("", |f| f.value.as_str())
    }

    /// Entered username
    #[must_use]
    pub fn username(&self) -> &str {
        self.field("Username")
    }

    /// Entered email (registration only)
    #[must_use]
    pub fn email(&self) -> &str {
        self.field("Email")
    }

    /// Entered password
    #[must_use]
    pub fn password(&self) -> &str {
        self.field("Password")
    }

    /// Inline error, if any
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether a submit is in flight
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Mark the submit as started
    pub fn begin_submit(&mut self) {
        self.error = None;
        self.submitting = true;
    }

    /// Record the outcome of a submit
    pub fn finish_submit(&mut self, result: Result<(), String>) {
        self.submitting = false;
        match result {
            Ok(()) => *self = Self::with_fields(self.kind, self.take_empty_fields()),
            Err(message) => self.error = Some(message),
        }
    }

    fn take_empty_fields(&self) -> Vec<Field> {
        self.fields
            .iter()
            .map(|f| Field::new(f.label, f.masked))
            .collect()
    }

    /// Show a message above the fields
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// Handle a key press
    pub fn handle_key(&mut self, key: KeyEvent) -> FormAction {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match (key.code, self.kind) {
            (KeyCode::Esc, _) => return FormAction::Cancel,
            (KeyCode::Char('r'), FormKind::Login) | (KeyCode::Char('l'), FormKind::Register)
                if ctrl =>
            {
                return FormAction::Switch;
            }
            _ => {}
        }

        // Inputs are disabled while the request runs
        if self.submitting {
            return FormAction::None;
        }

        match key.code {
            KeyCode::Tab | KeyCode::Down => {
                self.focus = (self.focus + 1) % self.fields.len();
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
            }
            KeyCode::Enter => {
                if let Some(empty) = self.fields.iter().find(|f| f.value.trim().is_empty()) {
                    self.error = Some(format!("{} is required.", empty.label));
                    return FormAction::None;
                }
                return FormAction::Submit;
            }
            KeyCode::Backspace => {
                self.fields[self.focus].value.pop();
            }
            KeyCode::Char(c) if !ctrl => {
                self.fields[self.focus].value.push(c);
            }
            _ => {}
        }
        FormAction::None
    }
}

/// Draw a form
pub fn render(frame: &mut Frame, area: Rect, form: &FormState) {
    let mut lines = Vec::new();

    for (i, field) in form.fields.iter().enumerate() {
        let focused = i == form.focus;
        let label_style = if focused {
            theme::key()
        } else {
            theme::muted()
        };
        let shown = if field.masked {
            "•".repeat(field.value.chars().count())
        } else {
            field.value.clone()
        };
        let cursor = if focused && !form.submitting { "_" } else { "" };

        lines.push(Line::styled(field.label, label_style));
        lines.push(Line::from(vec![
            Span::styled(if focused { "> " } else { "  " }, theme::key()),
            Span::styled(format!("{shown}{cursor}"), Style::default().fg(theme::FURIA_WHITE)),
        ]));
        lines.push(Line::from(""));
    }

    if let Some(error) = form.error() {
        lines.push(Line::styled(error.to_string(), theme::error()));
        lines.push(Line::from(""));
    }

    if form.submitting {
        lines.push(Line::styled(form.kind.busy_label(), theme::muted()));
    } else {
        lines.push(hints(&[("Enter", form.kind.title()), ("Tab", "next field")]));
    }
    lines.push(match form.kind {
        FormKind::Login => hints(&[("Ctrl+R", "no account? register"), ("Esc", "back")]),
        FormKind::Register => hints(&[("Ctrl+L", "have an account? log in"), ("Esc", "back")]),
    });

    #[allow(clippy::cast_possible_truncation)]
    let height = lines.len() as u16 + 2;
    let rect = centered(area, FORM_WIDTH, height);
    let block = Block::default()
        .title(Line::styled(format!(" {} ", form.kind.title()), theme::title()))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme::BORDER));

    frame.render_widget(Clear, rect);
    frame.render_widget(Paragraph::new(lines).block(block), rect);
}
