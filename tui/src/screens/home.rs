//! Home screen

use ratatui::layout::{Alignment, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use super::{centered, hints};
use crate::theme;

/// What the home screen shows
pub struct HomeView<'a> {
    /// Whether the user is signed in
    pub authenticated: bool,
    /// Signed-in user name
    pub username: Option<&'a str>,
    /// One-off message, e.g. after a session expired
    pub notice: Option<&'a str>,
}

/// Draw the home screen
pub fn render(frame: &mut Frame, area: Rect, view: &HomeView) {
    let mut lines = vec![
        Line::styled("FURIA", theme::title()),
        Line::from(""),
        Line::styled("Welcome to FuriaBot", theme::title()),
        Line::from(""),
    ];

    if view.authenticated {
        lines.push(Line::from(vec![
            Span::raw("Hello, "),
            Span::styled(view.username.unwrap_or("fan").to_string(), theme::key()),
        ]));
        lines.push(Line::from(""));
        lines.push(hints(&[("Enter", "start chatting"), ("l", "log out"), ("q", "quit")]));
    } else {
        lines.push(Line::raw("Please log in or register to start chatting."));
        lines.push(Line::from(""));
        lines.push(hints(&[("l", "log in"), ("r", "register"), ("q", "quit")]));
    }

    if let Some(notice) = view.notice {
        lines.push(Line::from(""));
        lines.push(Line::styled(notice.to_string(), theme::error()));
    }

    #[allow(clippy::cast_possible_truncation)]
    let height = lines.len() as u16;
    let body = centered(area, area.width, height);
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), body);

    if area.height > height + 2 {
        let footer = Rect::new(area.x, area.bottom() - 1, area.width, 1);
        frame.render_widget(
            Paragraph::new(Line::styled(
                "© 2025 Furia Bot. All rights reserved.",
                theme::muted(),
            ))
            .alignment(Alignment::Center),
            footer,
        );
    }
}
