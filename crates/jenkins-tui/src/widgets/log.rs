//! Console and stage log rendering: line classification, numbering and
//! search highlighting.

use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

use crate::theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Error,
    Warning,
    Success,
    /// Pipeline or build-tool step marker.
    Stage,
    Plain,
}

/// Classify a log line by keyword, case-insensitively. Errors take
/// precedence over warnings, warnings over successes.
pub fn classify(line: &str) -> LineKind {
    let lower = line.to_ascii_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has(&["error", "failed", "exception"]) {
        LineKind::Error
    } else if has(&["warning", "warn"]) {
        LineKind::Warning
    } else if has(&["success", "passed"]) {
        LineKind::Success
    } else if line.starts_with("[Pipeline]") || line.starts_with("[INFO]") {
        LineKind::Stage
    } else {
        LineKind::Plain
    }
}

pub fn style_for(kind: LineKind) -> Style {
    match kind {
        LineKind::Error => Style::default().fg(theme::ERROR_RED),
        LineKind::Warning => Style::default().fg(theme::ELECTRIC_YELLOW),
        LineKind::Success => Style::default().fg(theme::SUCCESS_GREEN),
        LineKind::Stage => Style::default()
            .fg(theme::LIGHT_BLUE)
            .add_modifier(Modifier::BOLD),
        LineKind::Plain => Style::default().fg(theme::DIM_WHITE),
    }
}

/// Byte ranges of case-insensitive (ASCII) matches of `needle` in `line`.
pub fn match_ranges(line: &str, needle: &str) -> Vec<(usize, usize)> {
    if needle.is_empty() {
        return Vec::new();
    }
    let hay = line.to_ascii_lowercase();
    let needle = needle.to_ascii_lowercase();
    let mut ranges = Vec::new();
    let mut from = 0;
    while let Some(pos) = hay[from..].find(&needle) {
        let start = from + pos;
        let end = start + needle.len();
        ranges.push((start, end));
        from = end;
    }
    ranges
}

/// Number of lines of `text` containing `needle`.
pub fn matching_lines(text: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    text.lines()
        .filter(|l| !match_ranges(l, needle).is_empty())
        .count()
}

/// Render one numbered, classified line with search matches highlighted.
pub fn render_line(number: usize, width: usize, line: &str, needle: &str) -> Line<'static> {
    let base = style_for(classify(line));
    let mut spans = vec![Span::styled(
        format!("{number:>width$} │ "),
        theme::key_hint(),
    )];

    let mut cursor = 0;
    for (start, end) in match_ranges(line, needle) {
        if start > cursor {
            spans.push(Span::styled(line[cursor..start].to_owned(), base));
        }
        spans.push(Span::styled(line[start..end].to_owned(), theme::search_match()));
        cursor = end;
    }
    if cursor < line.len() {
        spans.push(Span::styled(line[cursor..].to_owned(), base));
    }
    Line::from(spans)
}

/// Lines `top..top + height` of `text`, numbered from 1.
pub fn render_window(text: &str, top: usize, height: usize, needle: &str) -> Vec<Line<'static>> {
    let total = text.lines().count();
    let width = total.max(1).to_string().len();
    text.lines()
        .enumerate()
        .skip(top)
        .take(height)
        .map(|(i, line)| render_line(i + 1, width, line, needle))
        .collect()
}
