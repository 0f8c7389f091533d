//! Neon palette and semantic styling: panels, tables, tabs and build status.

use ratatui::style::{Color, Modifier, Style};

// ── Core Palette ──────────────────────────────────────────────────────

pub const ELECTRIC_PURPLE: Color = Color::Rgb(225, 53, 255); // #e135ff
pub const NEON_CYAN: Color = Color::Rgb(128, 255, 234); // #80ffea
pub const CORAL: Color = Color::Rgb(255, 106, 193); // #ff6ac1
pub const ELECTRIC_YELLOW: Color = Color::Rgb(241, 250, 140); // #f1fa8c
pub const SUCCESS_GREEN: Color = Color::Rgb(80, 250, 123); // #50fa7b
pub const ERROR_RED: Color = Color::Rgb(255, 99, 99); // #ff6363

// ── Extended Palette ──────────────────────────────────────────────────

pub const DIM_WHITE: Color = Color::Rgb(189, 193, 207); // #bdc1cf
pub const BORDER_GRAY: Color = Color::Rgb(98, 114, 164); // #6272a4
pub const BG_HIGHLIGHT: Color = Color::Rgb(40, 42, 54); // #282a36
pub const LIGHT_BLUE: Color = Color::Rgb(139, 233, 253); // #8be9fd
pub const MUTED_GRAY: Color = Color::Rgb(128, 128, 140);

// ── Semantic Styles ───────────────────────────────────────────────────

/// Title text for blocks/panels.
pub fn title_style() -> Style {
    Style::default().fg(NEON_CYAN).add_modifier(Modifier::BOLD)
}

pub fn border_focused() -> Style {
    Style::default().fg(ELECTRIC_PURPLE)
}

pub fn border_default() -> Style {
    Style::default().fg(BORDER_GRAY)
}

/// Table header row.
pub fn table_header() -> Style {
    Style::default()
        .fg(NEON_CYAN)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
}

/// Normal table row text.
pub fn table_row() -> Style {
    Style::default().fg(DIM_WHITE)
}

/// Selected / highlighted table row.
pub fn table_selected() -> Style {
    Style::default()
        .fg(ELECTRIC_PURPLE)
        .bg(BG_HIGHLIGHT)
        .add_modifier(Modifier::BOLD)
}

pub fn tab_active() -> Style {
    Style::default()
        .fg(ELECTRIC_PURPLE)
        .add_modifier(Modifier::BOLD)
}

pub fn tab_inactive() -> Style {
    Style::default().fg(DIM_WHITE)
}

/// Key hint text (e.g., "q quit  ? help").
pub fn key_hint() -> Style {
    Style::default().fg(BORDER_GRAY)
}

/// Key hint key character.
pub fn key_hint_key() -> Style {
    Style::default().fg(NEON_CYAN).add_modifier(Modifier::BOLD)
}

pub fn error_text() -> Style {
    Style::default().fg(ERROR_RED).add_modifier(Modifier::BOLD)
}

/// Background of search matches inside logs.
pub fn search_match() -> Style {
    Style::default()
        .fg(Color::Black)
        .bg(ELECTRIC_YELLOW)
        .add_modifier(Modifier::BOLD)
}

// ── Build status ──────────────────────────────────────────────────────

/// Colour for a build or stage status string (`SUCCESS`, `FAILED`, ...).
pub fn status_color(status: &str) -> Color {
    match status {
        "SUCCESS" => SUCCESS_GREEN,
        "FAILURE" | "FAILED" => ERROR_RED,
        "UNSTABLE" => ELECTRIC_YELLOW,
        "ABORTED" | "NOT_BUILT" | "NOT_EXECUTED" | "SKIPPED" => MUTED_GRAY,
        "RUNNING" | "IN_PROGRESS" => NEON_CYAN,
        "PAUSED_PENDING_INPUT" | "QUEUED" => LIGHT_BLUE,
        _ => DIM_WHITE,
    }
}

pub fn status_style(status: &str) -> Style {
    Style::default().fg(status_color(status))
}

/// Single-glyph marker for a status.
pub fn status_icon(status: &str) -> &'static str {
    match status {
        "SUCCESS" => "✓",
        "FAILURE" | "FAILED" => "✗",
        "UNSTABLE" => "!",
        "ABORTED" => "■",
        "RUNNING" | "IN_PROGRESS" => "▶",
        "NOT_BUILT" | "NOT_EXECUTED" | "SKIPPED" => "-",
        _ => "?",
    }
}

/// Colour of a job's ball (`blue`, `red_anime`, ...).
pub fn job_color(color: &str) -> Color {
    match color.trim_end_matches("_anime") {
        "blue" => SUCCESS_GREEN,
        "red" => ERROR_RED,
        "yellow" => ELECTRIC_YELLOW,
        "aborted" | "disabled" | "grey" | "notbuilt" => MUTED_GRAY,
        _ => DIM_WHITE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_colors() {
        assert_eq!(status_color("SUCCESS"), SUCCESS_GREEN);
        assert_eq!(status_color("FAILURE"), ERROR_RED);
        assert_eq!(status_color("FAILED"), ERROR_RED);
        assert_eq!(status_color("UNSTABLE"), ELECTRIC_YELLOW);
        assert_eq!(status_color("ABORTED"), MUTED_GRAY);
        assert_eq!(status_color("RUNNING"), NEON_CYAN);
        assert_eq!(status_color("whatever"), DIM_WHITE);
    }

    #[test]
    fn animated_job_colors_match_base() {
        assert_eq!(job_color("red_anime"), job_color("red"));
        assert_eq!(job_color("blue"), SUCCESS_GREEN);
    }
}
