//! Screens
//!
//! One module per route. Each exposes a `render` function over borrowed
//! state; the chat and form screens also own their key handling.

pub mod auth;
pub mod chat;
pub mod home;

use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::text::{Line, Span};

use crate::theme;

/// A `width` x `height` rect centered in `area`, clipped to it
#[must_use]
pub fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let [row] = Layout::vertical([Constraint::Length(height.min(area.height))])
        .flex(Flex::Center)
        .areas(area);
    let [cell] = Layout::horizontal([Constraint::Length(width.min(area.width))])
        .flex(Flex::Center)
        .areas(row);
    cell
}

/// A hint line such as `Enter send · Esc home`
#[must_use]
pub fn hints(pairs: &[(&str, &str)]) -> Line<'static> {
    let mut spans = Vec::with_capacity(pairs.len() * 3);
    for (i, (key, action)) in pairs.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" · ", theme::muted()));
        }
        spans.push(Span::styled((*key).to_string(), theme::key()));
        spans.push(Span::styled(format!(" {action}"), theme::muted()));
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_fits_inside_area() {
        let area = Rect::new(0, 0, 80, 24);
        let rect = centered(area, 40, 10);
        assert_eq!((rect.width, rect.height), (40, 10));
        assert_eq!((rect.x, rect.y), (20, 7));
    }

    #[test]
    fn test_centered_clips_to_small_area() {
        let rect = centered(Rect::new(0, 0, 20, 5), 40, 10);
        assert_eq!((rect.width, rect.height), (20, 5));
    }

    #[test]
    fn test_hints_joins_pairs() {
        let line = hints(&[("Enter", "send"), ("Esc", "home")]);
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "Enter send · Esc home");
    }
}
