//! TextBlock Widget
//!
//! A borderless text region that wraps styled lines and stays pinned to the
//! bottom unless scrolled back.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::widgets::StatefulWidget;
use textwrap::wrap;

/// One logical line of text with a single style
#[derive(Clone, Debug, PartialEq)]
pub struct StyledLine {
    /// Line text; may contain newlines
    pub text: String,
    /// Style for every wrapped row of this line
    pub style: Style,
}

impl StyledLine {
    /// Create a styled line
    pub fn new(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    /// An empty spacer line
    #[must_use]
    pub fn blank() -> Self {
        Self::new(String::new(), Style::default())
    }
}

/// Scroll state for a text block
#[derive(Debug, Default)]
pub struct TextBlockState {
    /// Scroll offset (rows from bottom, 0 = latest)
    pub scroll_offset: usize,
    /// Total wrapped rows at the last render
    pub total_lines: usize,
}

impl TextBlockState {
    /// Scroll towards older content
    pub fn scroll_up(&mut self, rows: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(rows);
    }

    /// Scroll towards newer content
    pub fn scroll_down(&mut self, rows: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(rows);
    }

    /// Follow the latest content again
    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }
}

/// Wrap logical lines into rows of at most `width` columns
#[must_use]
pub fn wrap_lines(lines: &[StyledLine], width: usize) -> Vec<StyledLine> {
    let width = width.max(1);
    let mut rows = Vec::new();
    for line in lines {
        for part in line.text.split('\n') {
            if part.is_empty() {
                rows.push(StyledLine::new(String::new(), line.style));
                continue;
            }
            rows.extend(
                wrap(part, width)
                    .into_iter()
                    .map(|cow| StyledLine::new(cow.into_owned(), line.style)),
            );
        }
    }
    rows
}

/// A borderless, bottom-anchored text block
pub struct TextBlock<'a> {
    lines: &'a [StyledLine],
}

impl<'a> TextBlock<'a> {
    /// Create a block over the given lines
    #[must_use]
    pub fn new(lines: &'a [StyledLine]) -> Self {
        Self { lines }
    }
}

impl StatefulWidget for TextBlock<'_> {
    type State = TextBlockState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let height = area.height as usize;
        if height == 0 || area.width == 0 {
            return;
        }

        let rows = wrap_lines(self.lines, area.width as usize);
        state.total_lines = rows.len();

        let max_scroll = state.total_lines.saturating_sub(height);
        state.scroll_offset = state.scroll_offset.min(max_scroll);

        let visible_end = state.total_lines - state.scroll_offset;
        let visible_start = visible_end.saturating_sub(height);

        for (i, row) in rows[visible_start..visible_end].iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let y = area.y + i as u16;
            buf.set_stringn(area.x, y, &row.text, area.width as usize, row.style);
        }
    }
}
