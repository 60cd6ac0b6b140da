//! Theme and Colors
//!
//! FURIA's black-and-white look with a single gold accent.

use ratatui::style::{Color, Modifier, Style};

// ============================================================================
// Brand Palette
// ============================================================================

/// Accent used for the bot name, pills and focus markers
pub const FURIA_GOLD: Color = Color::Rgb(214, 175, 54);

/// Primary text
pub const FURIA_WHITE: Color = Color::Rgb(235, 235, 235);

/// Secondary text (timestamps, hints)
pub const FURIA_MUTED: Color = Color::Rgb(128, 128, 128);

/// Panel background for the selected sidebar entry
pub const FURIA_SELECTED_BG: Color = Color::Rgb(48, 48, 48);

// ============================================================================
// UI Colors
// ============================================================================

/// User message text
pub const USER_TEXT: Color = Color::Green;

/// Inline errors
pub const ERROR_TEXT: Color = Color::Rgb(255, 100, 100);

/// Borders and separators
pub const BORDER: Color = Color::DarkGray;

// ============================================================================
// Styles
// ============================================================================

/// Screen titles
#[must_use]
pub fn title() -> Style {
    Style::default().fg(FURIA_GOLD).add_modifier(Modifier::BOLD)
}

/// Hints and timestamps
#[must_use]
pub fn muted() -> Style {
    Style::default().fg(FURIA_MUTED)
}

/// Inline error messages
#[must_use]
pub fn error() -> Style {
    Style::default().fg(ERROR_TEXT)
}

/// Keybinding labels inside hint lines
#[must_use]
pub fn key() -> Style {
    Style::default().fg(FURIA_GOLD).add_modifier(Modifier::BOLD)
}
