//! First-run setup wizard: server URL, username and API token.

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};
use tui_input::Input;

use jenkins_config::Profile;

use crate::action::Action;
use crate::command::Command;
use crate::component::Component;
use crate::theme;
use crate::widgets::{centered, hint_line, input};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetupField {
    #[default]
    Url,
    Username,
    Token,
    Submit,
}

impl SetupField {
    const ALL: [SetupField; 4] = [Self::Url, Self::Username, Self::Token, Self::Submit];

    fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

pub struct SetupWizard {
    url: Input,
    username: Input,
    token: Input,
    focus: SetupField,
    error: Option<String>,
    /// Tuning values carried over into the submitted profile.
    base: Profile,
}

impl SetupWizard {
    /// Start from `seed`, pre-filling whatever it already has (e.g. from
    /// command-line flags).
    pub fn new(seed: &Profile) -> Self {
        Self {
            url: Input::new(seed.base_url.clone()),
            username: Input::new(seed.username.clone()),
            token: Input::new(seed.api_token.clone()),
            focus: SetupField::default(),
            error: None,
            base: seed.clone(),
        }
    }

    pub fn focus(&self) -> SetupField {
        self.focus
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn field_mut(&mut self) -> Option<&mut Input> {
        match self.focus {
            SetupField::Url => Some(&mut self.url),
            SetupField::Username => Some(&mut self.username),
            SetupField::Token => Some(&mut self.token),
            SetupField::Submit => None,
        }
    }

    /// Validate the form; on success return the profile to persist.
    pub fn submit(&mut self) -> Option<Profile> {
        let url = self.url.value().trim().trim_end_matches('/');
        let username = self.username.value().trim();
        let token = self.token.value().trim();

        if url.is_empty() || username.is_empty() || token.is_empty() {
            self.error = Some("All fields are required".into());
            return None;
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            self.error = Some("URL must start with http:// or https://".into());
            return None;
        }

        let mut profile = Profile {
            base_url: url.to_owned(),
            username: username.to_owned(),
            api_token: token.to_owned(),
            ..self.base.clone()
        };
        if let Err(e) = profile.validate() {
            self.error = Some(e.to_string());
            return None;
        }
        self.error = None;
        Some(profile)
    }
}

impl Component for SetupWizard {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Command> {
        match key.code {
            KeyCode::Tab | KeyCode::Down => self.focus = self.focus.next(),
            KeyCode::BackTab | KeyCode::Up => self.focus = self.focus.prev(),
            KeyCode::Enter if self.focus == SetupField::Submit => {
                if let Some(profile) = self.submit() {
                    return Ok(Command::message(Action::SetupComplete(Box::new(profile))));
                }
            }
            KeyCode::Enter => self.focus = self.focus.next(),
            _ => {
                if let Some(field) = self.field_mut() {
                    if input::edit(field, key) {
                        self.error = None;
                    }
                }
            }
        }
        Ok(Command::none())
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let panel_area = centered(area, 64, 20);
        let block = Block::default()
            .title(Span::styled(" Jenkins TUI Setup ", theme::title_style()))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_focused());
        let inner = block.inner(panel_area);
        frame.render_widget(block, panel_area);

        let [intro, url, user, token, submit, error, hints] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Fill(1),
        ])
        .areas(inner.inner(ratatui::layout::Margin::new(2, 1)));

        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                "Connect to your Jenkins server with a user API token.",
                Style::default().fg(theme::DIM_WHITE),
            ))),
            intro,
        );
        input::render_field(frame, url, "Jenkins URL", &self.url, self.focus() == SetupField::Url, false);
        input::render_field(
            frame,
            user,
            "Username",
            &self.username,
            self.focus() == SetupField::Username,
            false,
        );
        input::render_field(
            frame,
            token,
            "API Token",
            &self.token,
            self.focus() == SetupField::Token,
            true,
        );

        let submit_style = if self.focus() == SetupField::Submit {
            Style::default()
                .fg(theme::BG_HIGHLIGHT)
                .bg(theme::ELECTRIC_PURPLE)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme::ELECTRIC_PURPLE)
        };
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled("  Connect  ", submit_style))).centered(),
            submit,
        );

        if let Some(err) = self.error() {
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(format!("✗ {err}"), theme::error_text())))
                    .centered(),
                error,
            );
        }

        frame.render_widget(
            Paragraph::new(hint_line(&[
                ("Tab", "next"),
                ("S-Tab", "prev"),
                ("Enter", "confirm"),
                ("Ctrl+C", "quit"),
            ])),
            hints,
        );
    }

    fn captures_input(&self) -> bool {
        true
    }

    fn id(&self) -> &str {
        "setup"
    }
}
