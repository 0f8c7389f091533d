//! Application core: connection state machine, tab routing, auto-refresh
//! and the event loop.
//!
//! ```text
//! Setup ──wizard done──▶ Loading ──check ok──▶ Ready
//!                          │  ▲
//!                  check fails │ r
//!                          ▼  │
//!                          Error
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph, Tabs, Wrap};
use throbber_widgets_tui::ThrobberState;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use jenkins_api::{Client, RootInfo};
use jenkins_config::{Config, ConfigStore, Profile};

use crate::action::{Action, Notification, NotificationLevel};
use crate::command::Command;
use crate::component::Component;
use crate::event::{Event, EventReader, RENDER_RATE, TICK_RATE};
use crate::refresh::RefreshScheduler;
use crate::screen::TabId;
use crate::setup::SetupWizard;
use crate::tabs::builds::BuildsTab;
use crate::tabs::dashboard::DashboardTab;
use crate::tabs::render_loading;
use crate::tabs::views::ViewsTab;
use crate::theme;
use crate::tui::Tui;
use crate::widgets::{centered, hint_line};

/// How long a toast stays on screen.
const NOTIFICATION_TTL: Duration = Duration::from_secs(3);

/// Why the app ended up in the Error state.
#[derive(Debug, Clone)]
pub enum Failure {
    Connect(Arc<jenkins_api::Error>),
    Persist(String),
}

impl Failure {
    fn is_auth(&self) -> bool {
        matches!(self, Self::Connect(e) if e.is_auth_failure())
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(e) => write!(f, "{e}"),
            Self::Persist(msg) => write!(f, "Could not save configuration: {msg}"),
        }
    }
}

/// A live connection and the tabs built on it.
pub struct Connected {
    client: Arc<Client>,
    root: RootInfo,
    tabs: HashMap<TabId, Box<dyn Component>>,
    active: TabId,
}

impl Connected {
    fn new(client: Arc<Client>, root: RootInfo, max_builds: usize) -> Self {
        let mut tabs: HashMap<TabId, Box<dyn Component>> = HashMap::new();
        tabs.insert(TabId::Dashboard, Box::new(DashboardTab::new(Arc::clone(&client))));
        tabs.insert(TabId::Views, Box::new(ViewsTab::new(Arc::clone(&client))));
        tabs.insert(TabId::Builds, Box::new(BuildsTab::new(Arc::clone(&client), max_builds)));
        if let Some(tab) = tabs.get_mut(&TabId::Dashboard) {
            tab.set_focused(true);
        }
        Self {
            client,
            root,
            tabs,
            active: TabId::Dashboard,
        }
    }

    fn active_tab(&self) -> Option<&dyn Component> {
        self.tabs.get(&self.active).map(AsRef::as_ref)
    }

    fn active_tab_mut(&mut self) -> Option<&mut Box<dyn Component>> {
        self.tabs.get_mut(&self.active)
    }

    fn server_name(&self) -> &str {
        self.root
            .node_description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| self.client.base_url())
    }
}

pub enum AppState {
    Setup(Box<SetupWizard>),
    Loading,
    Ready(Box<Connected>),
    Error(Failure),
}

impl AppState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Setup(_) => "setup",
            Self::Loading => "loading",
            Self::Ready(_) => "ready",
            Self::Error(_) => "error",
        }
    }
}

pub struct App {
    config: Config,
    store: Box<dyn ConfigStore>,
    state: AppState,
    running: bool,
    help_visible: bool,
    terminal_size: (u16, u16),
    refresh: RefreshScheduler,
    notification: Option<(Notification, Instant)>,
    throbber: ThrobberState,
    /// Messages dropped because the state could not use them.
    ignored_messages: usize,
    action_tx: mpsc::UnboundedSender<Action>,
    action_rx: mpsc::UnboundedReceiver<Action>,
}

impl App {
    /// A configured profile starts connecting right away; otherwise the
    /// setup wizard opens.
    pub fn new(config: Config, store: Box<dyn ConfigStore>) -> Self {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let state = if config.is_configured() {
            AppState::Loading
        } else {
            AppState::Setup(Box::new(SetupWizard::new(&config.profile)))
        };
        let refresh = RefreshScheduler::new(config.profile.refresh_interval(), true);
        Self {
            config,
            store,
            state,
            running: true,
            help_visible: false,
            terminal_size: (80, 24),
            refresh,
            notification: None,
            throbber: ThrobberState::default(),
            ignored_messages: 0,
            action_tx,
            action_rx,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn ignored_messages(&self) -> usize {
        self.ignored_messages
    }

    /// Work to start before the first event: the connection attempt when
    /// the app starts in Loading.
    pub fn init(&mut self) -> Command {
        match self.state {
            AppState::Loading => self.connect(),
            _ => Command::none(),
        }
    }

    /// Run the main event loop until quit.
    pub async fn run(&mut self) -> Result<()> {
        let mut tui = Tui::new()?;
        tui.enter()?;
        self.terminal_size = tui.size().unwrap_or((80, 24));
        self.init().spawn(&self.action_tx);

        let mut events = EventReader::new(TICK_RATE, RENDER_RATE);
        info!(state = self.state().name(), "event loop started");

        while self.is_running() {
            let Some(event) = events.next().await else {
                break;
            };

            match event {
                Event::Key(key) => {
                    let cmd = self.handle_key_event(key)?;
                    cmd.spawn(&self.action_tx);
                }
                Event::Resize(w, h) => self.action_tx.send(Action::Resize(w, h))?,
                Event::Tick => self.action_tx.send(Action::Tick)?,
                Event::Render => self.action_tx.send(Action::Render)?,
            }

            while let Ok(action) = self.action_rx.try_recv() {
                let render = matches!(action, Action::Render);
                let cmd = self.process_action(action)?;
                cmd.spawn(&self.action_tx);
                if render {
                    tui.draw(|frame| self.render(frame))?;
                }
            }
        }

        self.refresh.stop();
        events.stop();
        tui.exit();
        info!(ignored = self.ignored_messages(), "event loop ended");
        Ok(())
    }

    // ── Input ────────────────────────────────────────────────────────

    fn in_text_entry(&self) -> bool {
        match &self.state {
            AppState::Setup(_) => true,
            AppState::Ready(conn) => conn.active_tab().is_some_and(Component::captures_input),
            AppState::Loading | AppState::Error(_) => false,
        }
    }

    /// Global shortcut for `key`, if any.
    fn global_action(&self, key: KeyEvent) -> Option<Action> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            return Some(Action::Quit);
        }
        if self.in_text_entry() {
            return None;
        }
        if self.help_visible {
            return matches!(key.code, KeyCode::Esc | KeyCode::Char('?')).then_some(Action::ToggleHelp);
        }

        match (&self.state, key.code) {
            (_, KeyCode::Char('q')) => Some(Action::Quit),
            (AppState::Error(_), KeyCode::Char('r')) => Some(Action::Retry),
            (AppState::Ready(_), KeyCode::Char('r')) if ctrl => Some(Action::ToggleAutoRefresh),
            (AppState::Ready(_), KeyCode::Char('?')) => Some(Action::ToggleHelp),
            (AppState::Ready(conn), KeyCode::Tab) => Some(Action::SwitchTab(conn.active.next())),
            (AppState::Ready(conn), KeyCode::BackTab) => Some(Action::SwitchTab(conn.active.prev())),
            (AppState::Ready(_), KeyCode::Char(c @ '1'..='3')) => c
                .to_digit(10)
                .and_then(|d| u8::try_from(d).ok())
                .and_then(TabId::from_number)
                .map(Action::SwitchTab),
            _ => None,
        }
    }

    pub fn handle_key_event(&mut self, key: KeyEvent) -> Result<Command> {
        if let Some(action) = self.global_action(key) {
            return self.process_action(action);
        }
        if self.help_visible {
            return Ok(Command::none());
        }
        match &mut self.state {
            AppState::Setup(wizard) => wizard.handle_key_event(key),
            AppState::Ready(conn) => match conn.active_tab_mut() {
                Some(tab) => tab.handle_key_event(key),
                None => Ok(Command::none()),
            },
            AppState::Loading | AppState::Error(_) => Ok(Command::none()),
        }
    }

    // ── Actions ──────────────────────────────────────────────────────

    pub fn process_action(&mut self, action: Action) -> Result<Command> {
        match action {
            Action::Quit => {
                info!("quit requested");
                self.running = false;
                self.refresh.stop();
            }
            Action::Tick => self.on_tick(),
            Action::Render => {}
            Action::Resize(w, h) => {
                self.terminal_size = (w, h);
                if let AppState::Ready(conn) = &mut self.state {
                    for tab in conn.tabs.values_mut() {
                        tab.resize(w, h);
                    }
                }
            }
            Action::ToggleHelp => {
                if matches!(self.state, AppState::Ready(_)) {
                    self.help_visible = !self.help_visible;
                }
            }
            Action::ToggleAutoRefresh => {
                if matches!(self.state, AppState::Ready(_)) {
                    let on = self.refresh.toggle(self.action_tx.clone());
                    info!(enabled = on, "auto-refresh toggled");
                    self.notify(if on {
                        Notification::info(format!(
                            "Auto-refresh on ({}s)",
                            self.refresh.interval().as_secs()
                        ))
                    } else {
                        Notification::info("Auto-refresh off")
                    });
                }
            }
            Action::SwitchTab(id) => return Ok(self.switch_tab(id)),
            Action::Retry => {
                if matches!(self.state, AppState::Error(_)) {
                    info!("retrying connection");
                    self.state = AppState::Loading;
                    return Ok(self.connect());
                }
            }
            Action::Notify(n) => self.notify(n),
            Action::SetupComplete(profile) => return Ok(self.complete_setup(*profile)),
            Action::ClientReady(client, root) => return Ok(self.client_ready(client, *root)),
            Action::ClientFailed(err) => {
                if matches!(self.state, AppState::Loading) {
                    warn!(error = %err, "connection failed");
                    self.state = AppState::Error(Failure::Connect(err));
                } else {
                    self.ignore("ClientFailed");
                }
            }
            Action::AutoRefreshTick(generation) => return Ok(self.refresh_tick(generation)),
            tab_msg @ (Action::Dashboard(_) | Action::Views(_) | Action::Builds(_)) => {
                return self.route_to_tab(tab_msg);
            }
        }
        Ok(Command::none())
    }

    fn ignore(&mut self, what: &str) {
        self.ignored_messages += 1;
        warn!(message = what, state = self.state.name(), "message ignored in current state");
    }

    fn notify(&mut self, notification: Notification) {
        self.notification = Some((notification, Instant::now()));
    }

    fn on_tick(&mut self) {
        if self
            .notification
            .as_ref()
            .is_some_and(|(_, shown)| shown.elapsed() >= NOTIFICATION_TTL)
        {
            self.notification = None;
        }
        match &mut self.state {
            AppState::Loading => self.throbber.calc_next(),
            AppState::Ready(conn) => {
                for tab in conn.tabs.values_mut() {
                    tab.on_tick();
                }
            }
            AppState::Setup(_) | AppState::Error(_) => {}
        }
    }

    /// Build the client from the current profile and check the server.
    fn connect(&self) -> Command {
        let profile = self.config.profile.clone();
        info!(url = %profile.base_url, "connecting");
        Command::perform(async move {
            let client = match profile.to_session().and_then(Client::new) {
                Ok(client) => Arc::new(client),
                Err(e) => return Action::ClientFailed(Arc::new(e)),
            };
            match client.test_connection().await {
                Ok(root) => Action::ClientReady(client, Box::new(root)),
                Err(e) => Action::ClientFailed(Arc::new(e)),
            }
        })
    }

    fn complete_setup(&mut self, profile: Profile) -> Command {
        if !matches!(self.state, AppState::Setup(_)) {
            self.ignore("SetupComplete");
            return Command::none();
        }
        self.config.profile = profile;
        self.refresh = RefreshScheduler::new(self.config.profile.refresh_interval(), true);
        if let Err(e) = self.store.save(&self.config) {
            warn!(error = %e, "saving config failed");
            self.state = AppState::Error(Failure::Persist(e.to_string()));
            return Command::none();
        }
        info!("configuration saved");
        self.state = AppState::Loading;
        self.connect()
    }

    fn client_ready(&mut self, client: Arc<Client>, root: RootInfo) -> Command {
        if !matches!(self.state, AppState::Loading) {
            self.ignore("ClientReady");
            return Command::none();
        }
        info!(server = %client.base_url(), "connected");
        let mut conn = Connected::new(client, root, self.config.profile.max_builds_per_job);
        let (w, h) = self.terminal_size;
        for tab in conn.tabs.values_mut() {
            tab.resize(w, h);
        }
        let load = conn
            .active_tab_mut()
            .map_or_else(Command::none, |tab| tab.load());
        self.state = AppState::Ready(Box::new(conn));
        self.refresh.start(self.action_tx.clone());
        load
    }

    fn switch_tab(&mut self, id: TabId) -> Command {
        let AppState::Ready(conn) = &mut self.state else {
            return Command::none();
        };
        if conn.active == id {
            return Command::none();
        }
        debug!(from = %conn.active, to = %id, "switching tab");
        if let Some(tab) = conn.active_tab_mut() {
            tab.set_focused(false);
        }
        conn.active = id;
        match conn.active_tab_mut() {
            Some(tab) => {
                tab.set_focused(true);
                if tab.loaded() {
                    Command::none()
                } else {
                    debug!(tab = tab.id(), "first activation, loading");
                    tab.load()
                }
            }
            None => Command::none(),
        }
    }

    /// Dispatch the active tab's load and tell the scheduler when it has
    /// settled. Ticks from a stopped scheduler loop are dropped.
    fn refresh_tick(&mut self, generation: u64) -> Command {
        let Some(handle) = self.refresh.settle_handle(generation) else {
            debug!(generation, "stale refresh tick");
            return Command::none();
        };
        let load = match &mut self.state {
            AppState::Ready(conn) if self.refresh.is_enabled() => {
                conn.active_tab_mut().map(|tab| tab.load())
            }
            _ => None,
        };
        match load {
            Some(cmd) => cmd.on_settled(move || handle.settled()),
            None => {
                handle.settled();
                Command::none()
            }
        }
    }

    fn route_to_tab(&mut self, action: Action) -> Result<Command> {
        let Some(target) = action.target_tab() else {
            return Ok(Command::none());
        };
        if let AppState::Ready(conn) = &mut self.state {
            if let Some(tab) = conn.tabs.get_mut(&target) {
                return tab.update(action);
            }
        }
        self.ignore(target.label());
        Ok(Command::none())
    }

    // ── Rendering ────────────────────────────────────────────────────

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();
        match &self.state {
            AppState::Setup(wizard) => wizard.render(frame, area),
            AppState::Loading => self.render_connecting(frame, area),
            AppState::Error(failure) => self.render_error(frame, area, failure),
            AppState::Ready(conn) => self.render_ready(frame, area, conn),
        }

        if let Some((notif, _)) = &self.notification {
            render_notification(frame, area, notif);
        }
    }

    fn render_connecting(&self, frame: &mut Frame, area: Rect) {
        let rect = centered(area, 50, 1);
        render_loading(
            frame,
            rect,
            &format!("Connecting to {}...", self.config.profile.base_url),
            &self.throbber,
        );
    }

    #[allow(clippy::unused_self)]
    fn render_error(&self, frame: &mut Frame, area: Rect, failure: &Failure) {
        let rect = centered(area, 70, 9);
        let block = Block::default()
            .title(Span::styled(" Connection failed ", theme::error_text()))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme::ERROR_RED));
        let mut lines = vec![
            Line::default(),
            Line::from(Span::styled(failure.to_string(), Style::default().fg(theme::DIM_WHITE))),
            Line::default(),
        ];
        if failure.is_auth() {
            lines.push(Line::from(Span::styled(
                "Check the username and API token in the config file.",
                theme::key_hint(),
            )));
        }
        lines.push(hint_line(&[("r", "retry"), ("q", "quit")]));
        frame.render_widget(
            Paragraph::new(lines)
                .wrap(Wrap { trim: true })
                .centered()
                .block(block),
            rect,
        );
    }

    fn render_ready(&self, frame: &mut Frame, area: Rect, conn: &Connected) {
        let [header, content, tab_bar, status] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(area);

        self.render_header(frame, header, conn);
        if let Some(tab) = conn.active_tab() {
            tab.render(frame, content);
        }
        render_tab_bar(frame, tab_bar, conn.active);
        self.render_status_bar(frame, status, conn);

        if self.help_visible {
            render_help_overlay(frame, area);
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect, conn: &Connected) {
        let refresh = if self.refresh.is_enabled() {
            Span::styled(
                format!("● auto-refresh {}s", self.refresh.interval().as_secs()),
                Style::default().fg(theme::SUCCESS_GREEN),
            )
        } else {
            Span::styled("○ auto-refresh off", Style::default().fg(theme::BORDER_GRAY))
        };
        let line = Line::from(vec![
            Span::styled(
                " Jenkins ",
                Style::default()
                    .fg(theme::BG_HIGHLIGHT)
                    .bg(theme::ELECTRIC_PURPLE)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!(" {} ", conn.server_name()), theme::title_style()),
            Span::styled(format!("as {}  ", self.config.profile.username), theme::key_hint()),
            refresh,
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    #[allow(clippy::unused_self)]
    fn render_status_bar(&self, frame: &mut Frame, area: Rect, conn: &Connected) {
        let mut hints = conn.active_tab().map(Component::hints).unwrap_or_default();
        hints.extend([("Tab", "switch"), ("^R", "auto-refresh"), ("?", "help"), ("q", "quit")]);
        frame.render_widget(Paragraph::new(hint_line(&hints)), area);
    }
}

fn render_tab_bar(frame: &mut Frame, area: Rect, active: TabId) {
    let titles: Vec<Line> = TabId::ALL
        .iter()
        .map(|&id| {
            let style = if id == active {
                theme::tab_active()
            } else {
                theme::tab_inactive()
            };
            Line::from(Span::styled(format!(" {} {} ", id.number(), id.label()), style))
        })
        .collect();
    let selected = TabId::ALL.iter().position(|&t| t == active).unwrap_or(0);
    let tabs = Tabs::new(titles)
        .divider(Span::styled(" ", theme::key_hint()))
        .select(selected);
    frame.render_widget(tabs, area);
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let rect = centered(area, 60, 24);
    let section = |title: &str| {
        Line::from(Span::styled(
            title.to_owned(),
            Style::default().fg(theme::CORAL).add_modifier(Modifier::BOLD),
        ))
    };
    let row = |key: &str, desc: &str| {
        Line::from(vec![
            Span::styled(format!("  {key:<14}"), theme::key_hint_key()),
            Span::styled(desc.to_owned(), Style::default().fg(theme::DIM_WHITE)),
        ])
    };
    let lines = vec![
        section("Global"),
        row("1-3 / Tab", "switch tab"),
        row("Ctrl+R", "toggle auto-refresh"),
        row("?  / Esc", "toggle help"),
        row("q / Ctrl+C", "quit"),
        Line::default(),
        section("Lists"),
        row("j/k  ↑/↓", "move"),
        row("g/G", "top / bottom"),
        row("PgUp/PgDn", "page"),
        row("Enter / Esc", "open / back"),
        row("/", "filter or search"),
        row("r", "reload"),
        Line::default(),
        section("Builds"),
        row("n/p", "next / previous page"),
        row("l", "console log"),
        row("t", "trigger build"),
        row("f", "follow log"),
        row("n/N (log)", "next / previous match"),
    ];
    let block = Block::default()
        .title(Span::styled(" Help ", theme::title_style()))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(theme::border_focused());
    frame.render_widget(Clear, rect);
    frame.render_widget(Paragraph::new(lines).block(block), rect);
}

fn render_notification(frame: &mut Frame, area: Rect, notif: &Notification) {
    let msg_len = u16::try_from(notif.message.chars().count()).unwrap_or(u16::MAX);
    let width = msg_len.saturating_add(6).clamp(20, 60).min(area.width);
    let height = 3u16.min(area.height);
    let x = area.width.saturating_sub(width + 1);
    let y = area.height.saturating_sub(height + 2);
    let toast = Rect::new(area.x + x, area.y + y, width, height);

    let (color, icon) = match notif.level {
        NotificationLevel::Success => (theme::SUCCESS_GREEN, "✓"),
        NotificationLevel::Error => (theme::ERROR_RED, "✗"),
        NotificationLevel::Info => (theme::NEON_CYAN, "·"),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(color));
    let line = Line::from(vec![
        Span::styled(format!(" {icon} "), Style::default().fg(color)),
        Span::styled(notif.message.clone(), Style::default().fg(theme::DIM_WHITE)),
    ]);
    frame.render_widget(Clear, toast);
    frame.render_widget(Paragraph::new(line).block(block), toast);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use jenkins_config::ConfigError;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::tabs::dashboard::{DashboardMsg, FeedResult};
    use crate::tabs::offline_client;

    #[derive(Clone, Default)]
    struct MemoryStore {
        saved: Arc<Mutex<Vec<Config>>>,
        fail: bool,
    }

    impl ConfigStore for MemoryStore {
        fn save(&self, config: &Config) -> Result<(), ConfigError> {
            if self.fail {
                return Err(ConfigError::Io(std::io::Error::other("disk full")));
            }
            self.saved.lock().unwrap().push(config.clone());
            Ok(())
        }
    }

    fn configured() -> Config {
        Config {
            profile: Profile::new("http://127.0.0.1:9", "bob", "tok"),
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn ready_app() -> App {
        let mut app = App::new(configured(), Box::new(MemoryStore::default()));
        let _ = app
            .process_action(Action::ClientReady(offline_client(), Box::default()))
            .unwrap();
        app
    }

    fn active(app: &App) -> TabId {
        match app.state() {
            AppState::Ready(conn) => conn.active,
            other => panic!("expected ready, got {}", other.name()),
        }
    }

    #[test]
    fn unconfigured_starts_in_setup() {
        let mut app = App::new(Config::default(), Box::new(MemoryStore::default()));
        assert_eq!(app.state().name(), "setup");
        assert!(app.init().is_empty());
    }

    #[test]
    fn configured_starts_connecting() {
        let mut app = App::new(configured(), Box::new(MemoryStore::default()));
        assert_eq!(app.state().name(), "loading");
        assert_eq!(app.init().len(), 1);
    }

    #[test]
    fn setup_complete_persists_and_connects() {
        let store = MemoryStore::default();
        let saved = Arc::clone(&store.saved);
        let mut app = App::new(Config::default(), Box::new(store));

        let profile = Profile::new("https://ci.example.com", "alice", "t0k");
        let cmd = app
            .process_action(Action::SetupComplete(Box::new(profile.clone())))
            .unwrap();

        assert_eq!(app.state().name(), "loading");
        assert_eq!(cmd.len(), 1);
        let saved = saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].profile, profile);
    }

    #[test]
    fn failed_save_is_an_error() {
        let store = MemoryStore {
            fail: true,
            ..MemoryStore::default()
        };
        let mut app = App::new(Config::default(), Box::new(store));
        let cmd = app
            .process_action(Action::SetupComplete(Box::new(Profile::new(
                "https://ci", "alice", "t0k",
            ))))
            .unwrap();

        assert!(cmd.is_empty());
        let AppState::Error(failure) = app.state() else {
            panic!("expected error state");
        };
        assert!(matches!(failure, Failure::Persist(_)));
        assert!(failure.to_string().contains("disk full"));
    }

    #[test]
    fn failure_then_retry() {
        let mut app = App::new(configured(), Box::new(MemoryStore::default()));
        let _ = app
            .process_action(Action::ClientFailed(Arc::new(jenkins_api::Error::Authentication)))
            .unwrap();
        let AppState::Error(failure) = app.state() else {
            panic!("expected error state");
        };
        assert!(failure.is_auth());

        let cmd = app.handle_key_event(key(KeyCode::Char('r'))).unwrap();
        assert_eq!(app.state().name(), "loading");
        assert_eq!(cmd.len(), 1);
    }

    #[tokio::test]
    async fn client_ready_builds_tabs_and_loads_dashboard() {
        let mut app = App::new(configured(), Box::new(MemoryStore::default()));
        let cmd = app
            .process_action(Action::ClientReady(offline_client(), Box::default()))
            .unwrap();

        let AppState::Ready(conn) = app.state() else {
            panic!("expected ready");
        };
        assert_eq!(conn.tabs.len(), 3);
        assert_eq!(conn.active, TabId::Dashboard);
        assert_eq!(cmd.len(), 4);
        assert!(app.refresh.is_running());
    }

    #[tokio::test]
    async fn client_ready_outside_loading_is_ignored() {
        let mut app = ready_app();
        let cmd = app
            .process_action(Action::ClientReady(offline_client(), Box::default()))
            .unwrap();
        assert!(cmd.is_empty());
        assert_eq!(app.ignored_messages(), 1);
    }

    #[tokio::test]
    async fn switching_tabs_loads_each_once() {
        let mut app = ready_app();

        let cmd = app.handle_key_event(key(KeyCode::Char('2'))).unwrap();
        assert_eq!(active(&app), TabId::Views);
        assert_eq!(cmd.len(), 1);

        let _ = app.handle_key_event(key(KeyCode::Tab)).unwrap();
        assert_eq!(active(&app), TabId::Builds);

        let _ = app.handle_key_event(key(KeyCode::BackTab)).unwrap();
        assert_eq!(active(&app), TabId::Views);
        let cmd = app.process_action(Action::SwitchTab(TabId::Views)).unwrap();
        assert!(cmd.is_empty());

        let cmd = app.handle_key_event(key(KeyCode::Char('1'))).unwrap();
        assert_eq!(active(&app), TabId::Dashboard);
        assert!(cmd.is_empty());
    }

    #[test]
    fn tab_message_outside_ready_is_ignored() {
        let mut app = App::new(configured(), Box::new(MemoryStore::default()));
        let _ = app
            .process_action(Action::ClientFailed(Arc::new(jenkins_api::Error::RateLimit)))
            .unwrap();

        let late = Action::Dashboard(DashboardMsg {
            load: 1,
            result: FeedResult::Nodes(Ok(Vec::new())),
        });
        let cmd = app.process_action(late).unwrap();

        assert!(cmd.is_empty());
        assert_eq!(app.state().name(), "error");
        assert_eq!(app.ignored_messages(), 1);
    }

    #[test]
    fn quit_keys_depend_on_state() {
        let mut app = App::new(Config::default(), Box::new(MemoryStore::default()));
        let _ = app.handle_key_event(key(KeyCode::Char('q'))).unwrap();
        assert!(app.is_running(), "q is text in the setup wizard");

        let _ = app.handle_key_event(ctrl('c')).unwrap();
        assert!(!app.is_running());
    }

    #[tokio::test]
    async fn q_quits_when_ready() {
        let mut app = ready_app();
        let _ = app.handle_key_event(key(KeyCode::Char('q'))).unwrap();
        assert!(!app.is_running());
        assert!(!app.refresh.is_running());
    }

    #[tokio::test]
    async fn help_overlay_swallows_keys() {
        let mut app = ready_app();
        let _ = app.handle_key_event(key(KeyCode::Char('?'))).unwrap();
        assert!(app.help_visible);

        let _ = app.handle_key_event(key(KeyCode::Char('2'))).unwrap();
        assert_eq!(active(&app), TabId::Dashboard);

        let _ = app.handle_key_event(key(KeyCode::Esc)).unwrap();
        assert!(!app.help_visible);
    }

    #[tokio::test]
    async fn ctrl_r_toggles_auto_refresh() {
        let mut app = ready_app();
        assert!(app.refresh.is_enabled());

        let _ = app.handle_key_event(ctrl('r')).unwrap();
        assert!(!app.refresh.is_enabled());
        let (notif, _) = app.notification.as_ref().unwrap();
        assert_eq!(notif.message, "Auto-refresh off");

        let _ = app.handle_key_event(ctrl('r')).unwrap();
        assert!(app.refresh.is_enabled());
        assert!(app.refresh.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_tick_reloads_active_tab() {
        let mut app = ready_app();

        let tick = app.action_rx.recv().await.unwrap();
        let Action::AutoRefreshTick(generation) = tick else {
            panic!("expected refresh tick, got {tick:?}");
        };
        let cmd = app.process_action(Action::AutoRefreshTick(generation)).unwrap();
        assert_eq!(cmd.len(), 4);

        let stale = app
            .process_action(Action::AutoRefreshTick(generation + 100))
            .unwrap();
        assert!(stale.is_empty());
    }

    #[tokio::test]
    async fn connect_checks_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "mode": "NORMAL",
                "nodeDescription": "ci master",
                "numExecutors": 2,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = Config {
            profile: Profile::new(server.uri(), "bob", "tok"),
        };
        let mut app = App::new(config, Box::new(MemoryStore::default()));
        let actions = app.init().resolve().await;

        assert_eq!(actions.len(), 1);
        let Action::ClientReady(_, root) = &actions[0] else {
            panic!("expected ClientReady, got {:?}", actions[0]);
        };
        assert_eq!(root.node_description.as_deref(), Some("ci master"));
    }

    #[tokio::test]
    async fn connect_reports_bad_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/json"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let config = Config {
            profile: Profile::new(server.uri(), "bob", "wrong"),
        };
        let mut app = App::new(config, Box::new(MemoryStore::default()));
        let mut actions = app.init().resolve().await;

        let Some(Action::ClientFailed(err)) = actions.pop() else {
            panic!("expected ClientFailed");
        };
        assert!(err.is_auth_failure());
    }
}
