//! Component trait: the building block for the setup wizard and the tabs.

use color_eyre::eyre::Result;
use crossterm::event::KeyEvent;
use ratatui::{Frame, layout::Rect};

use crate::action::Action;
use crate::command::Command;

/// Every screen implements Component.
///
/// Components own their state and never touch the network directly: any
/// fetch is returned as a [`Command`] for the app loop to spawn, and its
/// result comes back through [`Component::update`].
pub trait Component: Send {
    /// Fetch (or re-fetch) the data for the current view. Called on first
    /// activation, on `r`, and on every auto-refresh tick.
    fn load(&mut self) -> Command {
        Command::none()
    }

    /// Whether [`Component::load`] has been issued at least once.
    fn loaded(&self) -> bool {
        true
    }

    /// Handle a keyboard event the app did not consume.
    fn handle_key_event(&mut self, _key: KeyEvent) -> Result<Command> {
        Ok(Command::none())
    }

    /// Apply a dispatched action, usually a fetch result addressed to this
    /// component.
    fn update(&mut self, _action: Action) -> Result<Command> {
        Ok(Command::none())
    }

    /// Advance animations.
    fn on_tick(&mut self) {}

    /// The terminal was resized.
    fn resize(&mut self, _width: u16, _height: u16) {}

    fn render(&self, frame: &mut Frame, area: Rect);

    /// True while a text prompt owns the keyboard, so global shortcuts
    /// like `q` must not fire.
    fn captures_input(&self) -> bool {
        false
    }

    /// Key hints for the status bar.
    fn hints(&self) -> Vec<(&'static str, &'static str)> {
        Vec::new()
    }

    fn set_focused(&mut self, _focused: bool) {}

    fn id(&self) -> &str;
}
