//! Dashboard tab: server-wide KPIs plus running builds, nodes, queue and
//! recent builds panels.
//!
//! A load fires four independent fetches. Each result is merged into its
//! own field as it arrives, so the final state does not depend on arrival
//! order and one failed fetch does not blank the others. Results carry the
//! load that issued them; one older than what a field already holds is
//! dropped.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Row, Table, TableState};
use throbber_widgets_tui::ThrobberState;
use tracing::{debug, warn};

use jenkins_api::models::{running_builds, sort_jobs_by_last_build};
use jenkins_api::{Client, Job, Node, Queue, RootInfo, RunningBuild};

use crate::action::{Action, ApiResult};
use crate::command::{Command, fetch};
use crate::component::Component;
use crate::tabs::{Failures, render_error, render_loading};
use crate::theme;
use crate::widgets::format::{format_duration, progress_bar, time_ago, truncate};
use crate::widgets::{Selection, panel, placeholder};

/// One fetch result, tagged with the load that issued it.
#[derive(Debug)]
pub struct DashboardMsg {
    pub load: u64,
    pub result: FeedResult,
}

#[derive(Debug)]
pub enum FeedResult {
    RootInfo(ApiResult<RootInfo>),
    Nodes(ApiResult<Vec<Node>>),
    Queue(ApiResult<Queue>),
    Jobs(ApiResult<Vec<Job>>),
}

impl FeedResult {
    fn feed(&self) -> Feed {
        match self {
            Self::RootInfo(_) => Feed::RootInfo,
            Self::Nodes(_) => Feed::Nodes,
            Self::Queue(_) => Feed::Queue,
            Self::Jobs(_) => Feed::Jobs,
        }
    }

    fn is_ok(&self) -> bool {
        match self {
            Self::RootInfo(result) => result.is_ok(),
            Self::Nodes(result) => result.is_ok(),
            Self::Queue(result) => result.is_ok(),
            Self::Jobs(result) => result.is_ok(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Feed {
    RootInfo,
    Nodes,
    Queue,
    Jobs,
}

impl Feed {
    const ALL: [Feed; 4] = [Self::RootInfo, Self::Nodes, Self::Queue, Self::Jobs];
}

const FETCHES_PER_LOAD: usize = Feed::ALL.len();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Panel {
    #[default]
    Running,
    Nodes,
    Queue,
    Recent,
}

impl Panel {
    const ALL: [Panel; 4] = [Self::Running, Self::Nodes, Self::Queue, Self::Recent];

    fn index(self) -> usize {
        self as usize
    }

    fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Last build of a job, flattened for the recent-builds panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentBuild {
    pub job_name: String,
    pub number: u32,
    pub result: String,
    pub color: String,
    pub timestamp: i64,
    pub duration: i64,
}

/// Jobs that have built at least once, newest build first. A job whose
/// last build has no result yet but is animating reports `RUNNING`.
pub fn recent_builds(jobs: &[Job]) -> Vec<RecentBuild> {
    let mut jobs: Vec<Job> = jobs.iter().filter(|j| j.last_build.is_some()).cloned().collect();
    sort_jobs_by_last_build(&mut jobs);
    jobs.into_iter()
        .filter_map(|job| {
            let build = job.last_build.as_ref()?;
            let result = match build.result.as_deref() {
                Some(r) if !r.is_empty() => r.to_owned(),
                _ if job.is_running() || build.building => "RUNNING".to_owned(),
                _ => "UNKNOWN".to_owned(),
            };
            Some(RecentBuild {
                number: build.number,
                timestamp: build.timestamp,
                duration: build.duration,
                result,
                job_name: job.name.clone(),
                color: job.color.clone(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Kpis {
    pub running: usize,
    pub queued: usize,
    pub blocked: usize,
    pub nodes_online: usize,
    pub nodes_total: usize,
    pub executors_busy: usize,
    pub executors_total: usize,
    pub failed: usize,
}

struct PanelTable<'a> {
    which: Panel,
    title: String,
    header: Row<'static>,
    rows: Vec<Row<'static>>,
    widths: &'a [Constraint],
}

pub struct DashboardTab {
    client: Arc<Client>,
    focused: bool,
    loaded: bool,
    pending: usize,
    root_info: Option<RootInfo>,
    nodes: Vec<Node>,
    running: Vec<RunningBuild>,
    queue: Option<Queue>,
    recent: Vec<RecentBuild>,
    /// Sequence number of the latest load.
    load_seq: u64,
    /// Load each feed's current value came from.
    applied: [u64; FETCHES_PER_LOAD],
    failures: Failures<Feed>,
    last_update: Option<DateTime<Local>>,
    panel: Panel,
    selections: [Selection; 4],
    throbber: ThrobberState,
}

impl DashboardTab {
    pub fn new(client: Arc<Client>) -> Self {
        Self {
            client,
            focused: false,
            loaded: false,
            pending: 0,
            root_info: None,
            nodes: Vec::new(),
            running: Vec::new(),
            queue: None,
            recent: Vec::new(),
            load_seq: 0,
            applied: [0; FETCHES_PER_LOAD],
            failures: Failures::default(),
            last_update: None,
            panel: Panel::default(),
            selections: [Selection::default(); 4],
            throbber: ThrobberState::default(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.pending > 0
    }

    pub fn kpis(&self) -> Kpis {
        let online: Vec<&Node> = self.nodes.iter().filter(|n| !n.offline).collect();
        Kpis {
            running: self.running.len(),
            queued: self.queue.as_ref().map_or(0, |q| q.items.len()),
            blocked: self.queue.as_ref().map_or(0, Queue::blocked_count),
            nodes_online: online.len(),
            nodes_total: self.nodes.len(),
            executors_busy: online.iter().map(|n| n.busy_executors()).sum(),
            executors_total: online.iter().map(|n| n.num_executors as usize).sum(),
            failed: self
                .recent
                .iter()
                .filter(|b| b.result == "FAILURE" || matches!(b.color.as_str(), "red" | "red_anime"))
                .count(),
        }
    }

    pub fn root_info(&self) -> Option<&RootInfo> {
        self.root_info.as_ref()
    }

    pub fn current_error(&self) -> Option<&Arc<jenkins_api::Error>> {
        self.failures.first(&Feed::ALL)
    }

    pub fn recent(&self) -> &[RecentBuild] {
        &self.recent
    }

    pub fn running(&self) -> &[RunningBuild] {
        &self.running
    }

    fn panel_len(&self, panel: Panel) -> usize {
        match panel {
            Panel::Running => self.running.len(),
            Panel::Nodes => self.nodes.len(),
            Panel::Queue => self.queue.as_ref().map_or(0, |q| q.items.len()),
            Panel::Recent => self.recent.len(),
        }
    }

    fn clamp_selections(&mut self) {
        for panel in Panel::ALL {
            let len = self.panel_len(panel);
            self.selections[panel.index()].clamp(len);
        }
    }

    fn apply(&mut self, msg: DashboardMsg) {
        self.pending = self.pending.saturating_sub(1);
        let DashboardMsg { load, result } = msg;
        let feed = result.feed();
        let newest = &mut self.applied[feed as usize];
        if load < *newest {
            debug!(?feed, load, newest = *newest, "dropping result of an earlier load");
            return;
        }
        *newest = load;
        if result.is_ok() {
            self.failures.clear(&feed);
        }
        match result {
            FeedResult::RootInfo(Ok(info)) => self.root_info = Some(info),
            FeedResult::Nodes(Ok(nodes)) => {
                self.running = running_builds(&nodes);
                self.nodes = nodes;
            }
            FeedResult::Queue(Ok(queue)) => self.queue = Some(queue),
            FeedResult::Jobs(Ok(jobs)) => self.recent = recent_builds(&jobs),
            FeedResult::RootInfo(Err(e))
            | FeedResult::Nodes(Err(e))
            | FeedResult::Queue(Err(e))
            | FeedResult::Jobs(Err(e)) => {
                warn!(?feed, error = %e, "dashboard fetch failed");
                self.failures.record(feed, e);
            }
        }
        self.last_update = Some(Local::now());
        self.clamp_selections();
    }

    // ── Rendering ────────────────────────────────────────────────────

    fn render_kpis(&self, frame: &mut Frame, area: Rect) {
        let k = self.kpis();
        let cards = [
            ("Running", k.running.to_string(), theme::NEON_CYAN),
            (
                "Queued",
                k.queued.to_string(),
                if k.blocked > 0 {
                    theme::ELECTRIC_YELLOW
                } else {
                    theme::DIM_WHITE
                },
            ),
            (
                "Nodes",
                format!("{}/{}", k.nodes_online, k.nodes_total),
                if k.nodes_online < k.nodes_total {
                    theme::ELECTRIC_YELLOW
                } else {
                    theme::SUCCESS_GREEN
                },
            ),
            (
                "Executors",
                format!("{}/{}", k.executors_busy, k.executors_total),
                theme::LIGHT_BLUE,
            ),
            (
                "Failed",
                k.failed.to_string(),
                if k.failed > 0 {
                    theme::ERROR_RED
                } else {
                    theme::SUCCESS_GREEN
                },
            ),
        ];
        let areas = Layout::horizontal([Constraint::Ratio(1, 5); 5]).split(area);
        for ((label, value, color), rect) in cards.into_iter().zip(areas.iter()) {
            let body = Paragraph::new(Line::from(Span::styled(
                value,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )))
            .centered()
            .block(panel(label, false));
            frame.render_widget(body, *rect);
        }
    }

    fn render_table(&self, frame: &mut Frame, area: Rect, table: PanelTable<'_>) {
        let PanelTable {
            which,
            title,
            header,
            rows,
            widths,
        } = table;
        let focused = self.focused && self.panel == which;
        let block = panel(title, focused);
        if rows.is_empty() {
            frame.render_widget(Paragraph::new(placeholder("  nothing here")).block(block), area);
            return;
        }
        let len = rows.len();
        let table = Table::new(rows, widths.to_vec())
            .header(header.style(theme::table_header()))
            .row_highlight_style(if focused {
                theme::table_selected()
            } else {
                Style::default()
            })
            .block(block);
        let mut state =
            TableState::default().with_selected(self.selections[which.index()].get(len));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn render_running(&self, frame: &mut Frame, area: Rect, now: DateTime<Utc>) {
        let now_ms = now.timestamp_millis();
        let rows = self
            .running
            .iter()
            .map(|b| {
                Row::new(vec![
                    truncate(&b.full_display_name, 40),
                    b.node_name.clone(),
                    format!("{} {:>3}%", progress_bar(b.progress(now_ms), 10), b.progress(now_ms)),
                    time_ago(b.timestamp, now),
                ])
                .style(theme::table_row())
            })
            .collect();
        self.render_table(
            frame,
            area,
            PanelTable {
                which: Panel::Running,
                title: format!("Running ({})", self.running().len()),
                header: Row::new(vec!["Build", "Node", "Progress", "Started"]),
                rows,
                widths: &[
                    Constraint::Fill(2),
                    Constraint::Fill(1),
                    Constraint::Length(15),
                    Constraint::Length(9),
                ],
            },
        );
    }

    fn render_nodes(&self, frame: &mut Frame, area: Rect) {
        let rows = self
            .nodes
            .iter()
            .map(|n| {
                let (state, color) = if n.offline {
                    ("offline", theme::ERROR_RED)
                } else if n.temporarily_offline {
                    ("paused", theme::ELECTRIC_YELLOW)
                } else {
                    ("online", theme::SUCCESS_GREEN)
                };
                let labels = n
                    .assigned_labels
                    .iter()
                    .map(|l| l.name.as_str())
                    .filter(|l| *l != n.display_name)
                    .collect::<Vec<_>>()
                    .join(" ");
                Row::new(vec![
                    Span::raw(n.display_name.clone()),
                    Span::styled(state, Style::default().fg(color)),
                    Span::raw(format!("{}/{}", n.busy_executors(), n.num_executors)),
                    Span::raw(truncate(&labels, 30)),
                ])
                .style(theme::table_row())
            })
            .collect();
        self.render_table(
            frame,
            area,
            PanelTable {
                which: Panel::Nodes,
                title: format!("Nodes ({})", self.nodes.len()),
                header: Row::new(vec!["Name", "State", "Busy", "Labels"]),
                rows,
                widths: &[
                    Constraint::Fill(1),
                    Constraint::Length(8),
                    Constraint::Length(6),
                    Constraint::Fill(1),
                ],
            },
        );
    }

    fn render_queue(&self, frame: &mut Frame, area: Rect, now: DateTime<Utc>) {
        let items = self.queue.as_ref().map_or(&[][..], |q| q.items.as_slice());
        let rows = items
            .iter()
            .map(|item| {
                let flag = if item.stuck {
                    Span::styled("stuck", Style::default().fg(theme::ERROR_RED))
                } else if item.blocked {
                    Span::styled("blocked", Style::default().fg(theme::ELECTRIC_YELLOW))
                } else {
                    Span::styled("waiting", Style::default().fg(theme::DIM_WHITE))
                };
                Row::new(vec![
                    Span::raw(item.task.name.clone()),
                    flag,
                    Span::raw(time_ago(item.in_queue_since, now)),
                    Span::raw(truncate(item.why.as_deref().unwrap_or(""), 50)),
                ])
                .style(theme::table_row())
            })
            .collect();
        self.render_table(
            frame,
            area,
            PanelTable {
                which: Panel::Queue,
                title: format!("Queue ({})", items.len()),
                header: Row::new(vec!["Job", "State", "Since", "Why"]),
                rows,
                widths: &[
                    Constraint::Fill(1),
                    Constraint::Length(8),
                    Constraint::Length(9),
                    Constraint::Fill(2),
                ],
            },
        );
    }

    fn render_recent(&self, frame: &mut Frame, area: Rect, now: DateTime<Utc>) {
        let rows = self
            .recent
            .iter()
            .map(|b| {
                Row::new(vec![
                    Span::styled(
                        format!("{} {}", theme::status_icon(&b.result), b.result),
                        theme::status_style(&b.result),
                    ),
                    Span::raw(b.job_name.clone()),
                    Span::raw(format!("#{}", b.number)),
                    Span::raw(format_duration(b.duration)),
                    Span::raw(time_ago(b.timestamp, now)),
                ])
                .style(theme::table_row())
            })
            .collect();
        self.render_table(
            frame,
            area,
            PanelTable {
                which: Panel::Recent,
                title: format!("Recent builds ({})", self.recent().len()),
                header: Row::new(vec!["Result", "Job", "Build", "Duration", "When"]),
                rows,
                widths: &[
                    Constraint::Length(11),
                    Constraint::Fill(1),
                    Constraint::Length(7),
                    Constraint::Length(8),
                    Constraint::Length(9),
                ],
            },
        );
    }
}

impl Component for DashboardTab {
    fn load(&mut self) -> Command {
        debug!(in_flight = self.pending, "loading dashboard");
        self.loaded = true;
        self.pending += FETCHES_PER_LOAD;
        self.load_seq += 1;
        let load = self.load_seq;

        let root = Arc::clone(&self.client);
        let nodes = Arc::clone(&self.client);
        let queue = Arc::clone(&self.client);
        let jobs = Arc::clone(&self.client);
        Command::batch([
            Command::perform(async move {
                let result = FeedResult::RootInfo(fetch(root.root_info()).await);
                Action::Dashboard(DashboardMsg { load, result })
            }),
            Command::perform(async move {
                let result = FeedResult::Nodes(fetch(nodes.nodes()).await);
                Action::Dashboard(DashboardMsg { load, result })
            }),
            Command::perform(async move {
                let result = FeedResult::Queue(fetch(queue.queue()).await);
                Action::Dashboard(DashboardMsg { load, result })
            }),
            Command::perform(async move {
                let result = FeedResult::Jobs(fetch(jobs.all_jobs()).await);
                Action::Dashboard(DashboardMsg { load, result })
            }),
        ])
    }

    fn loaded(&self) -> bool {
        self.loaded
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Command> {
        let len = self.panel_len(self.panel);
        let sel = &mut self.selections[self.panel.index()];
        match key.code {
            KeyCode::Char('l') | KeyCode::Right => self.panel = self.panel.next(),
            KeyCode::Char('h') | KeyCode::Left => self.panel = self.panel.prev(),
            KeyCode::Char('j') | KeyCode::Down => sel.down(len),
            KeyCode::Char('k') | KeyCode::Up => sel.up(),
            KeyCode::Char('g') | KeyCode::Home => sel.top(),
            KeyCode::Char('G') | KeyCode::End => sel.bottom(len),
            KeyCode::Char('r') => return Ok(self.load()),
            _ => {}
        }
        Ok(Command::none())
    }

    fn update(&mut self, action: Action) -> Result<Command> {
        if let Action::Dashboard(msg) = action {
            self.apply(msg);
        }
        Ok(Command::none())
    }

    fn on_tick(&mut self) {
        if self.is_loading() {
            self.throbber.calc_next();
        }
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let [status, kpis, body] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Fill(1),
        ])
        .areas(area);

        if let Some(err) = self.current_error() {
            render_error(frame, status, err);
        } else if self.is_loading() {
            render_loading(frame, status, "Refreshing...", &self.throbber);
        } else if let Some(at) = self.last_update {
            frame.render_widget(
                Paragraph::new(placeholder(format!(" updated {}", at.format("%H:%M:%S")))),
                status,
            );
        }

        self.render_kpis(frame, kpis);

        let now = Utc::now();
        let [top, bottom] =
            Layout::vertical([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(body);
        let [running, nodes] =
            Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(top);
        let [queue, recent] =
            Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)])
                .areas(bottom);
        self.render_running(frame, running, now);
        self.render_nodes(frame, nodes);
        self.render_queue(frame, queue, now);
        self.render_recent(frame, recent, now);
    }

    fn hints(&self) -> Vec<(&'static str, &'static str)> {
        vec![("h/l", "panel"), ("j/k", "move"), ("r", "refresh")]
    }

    fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    fn id(&self) -> &str {
        "dashboard"
    }
}
