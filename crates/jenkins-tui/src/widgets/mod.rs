//! Shared rendering helpers used by several tabs.

pub mod format;
pub mod input;
pub mod log;
pub mod selection;

pub use selection::Selection;

use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders};

use crate::theme;

/// Rounded panel with a title; the border lights up when focused.
pub fn panel(title: impl Into<String>, focused: bool) -> Block<'static> {
    Block::default()
        .title(Line::from(Span::styled(
            format!(" {} ", title.into()),
            theme::title_style(),
        )))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(if focused {
            theme::border_focused()
        } else {
            theme::border_default()
        })
}

/// `width` x `height` rect centered in `area`, clamped to it.
pub fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let [row] = Layout::vertical([Constraint::Length(height.min(area.height))])
        .flex(Flex::Center)
        .areas(area);
    let [rect] = Layout::horizontal([Constraint::Length(width.min(area.width))])
        .flex(Flex::Center)
        .areas(row);
    rect
}

/// Key hints rendered as `key description` pairs.
pub fn hint_line(hints: &[(&str, &str)]) -> Line<'static> {
    let mut spans = Vec::with_capacity(hints.len() * 2);
    for (key, desc) in hints {
        spans.push(Span::styled(format!(" {key} "), theme::key_hint_key()));
        spans.push(Span::styled(format!("{desc}  "), theme::key_hint()));
    }
    Line::from(spans)
}

/// Single dim line for empty or loading states.
pub fn placeholder(text: impl Into<String>) -> Line<'static> {
    Line::from(Span::styled(text.into(), Style::default().fg(theme::BORDER_GRAY)))
}
