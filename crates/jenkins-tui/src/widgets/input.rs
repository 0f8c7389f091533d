//! Single-line text input built on `tui-input`.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};
use tui_input::{Input, InputRequest};

use crate::theme;

/// Apply an editing key to `input`. Returns false for keys that are not
/// text editing (Enter, Esc, Tab, ...).
pub fn edit(input: &mut Input, key: KeyEvent) -> bool {
    let request = match key.code {
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            InputRequest::InsertChar(c)
        }
        KeyCode::Backspace => InputRequest::DeletePrevChar,
        KeyCode::Delete => InputRequest::DeleteNextChar,
        KeyCode::Left => InputRequest::GoToPrevChar,
        KeyCode::Right => InputRequest::GoToNextChar,
        KeyCode::Home => InputRequest::GoToStart,
        KeyCode::End => InputRequest::GoToEnd,
        _ => return false,
    };
    input.handle(request);
    true
}

/// Labelled, rounded input box with a block cursor when active. `masked`
/// replaces every character with a dot.
pub fn render_field(
    frame: &mut Frame,
    area: Rect,
    label: &str,
    input: &Input,
    active: bool,
    masked: bool,
) {
    let border = if active {
        theme::border_focused()
    } else {
        theme::border_default()
    };
    let block = Block::default()
        .title(Span::styled(
            format!(" {label} "),
            if active {
                theme::title_style()
            } else {
                theme::key_hint()
            },
        ))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(border);

    let text = if masked {
        "●".repeat(input.value().chars().count())
    } else {
        input.value().to_owned()
    };
    let mut spans = vec![Span::styled(text, Style::default().fg(theme::DIM_WHITE))];
    if active {
        spans.push(Span::styled(
            "█",
            Style::default()
                .fg(theme::ELECTRIC_PURPLE)
                .add_modifier(Modifier::SLOW_BLINK),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

/// One-line search prompt: `/query█`.
pub fn prompt_line(prefix: &str, input: &Input, editing: bool) -> Line<'static> {
    let mut spans = vec![
        Span::styled(prefix.to_owned(), theme::key_hint_key()),
        Span::styled(input.value().to_owned(), Style::default().fg(theme::ELECTRIC_YELLOW)),
    ];
    if editing {
        spans.push(Span::styled("█", Style::default().fg(theme::ELECTRIC_PURPLE)));
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn editing_keys() {
        let mut input = Input::default();
        for c in "main".chars() {
            assert!(edit(&mut input, key(KeyCode::Char(c))));
        }
        assert!(edit(&mut input, key(KeyCode::Backspace)));
        assert_eq!(input.value(), "mai");
        assert!(!edit(&mut input, key(KeyCode::Enter)));
        assert!(!edit(
            &mut input,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)
        ));
        assert_eq!(input.value(), "mai");
    }
}
