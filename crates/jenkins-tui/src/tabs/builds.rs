//! Builds tab: jobs → builds → build detail with pipeline stages → logs.
//!
//! Every fetched payload is stored together with the selection that asked
//! for it, so the tab can keep moving while responses are in flight.

use std::sync::Arc;

use chrono::Utc;
use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Row, Table, TableState, Wrap};
use throbber_widgets_tui::ThrobberState;
use tracing::{debug, info, warn};
use tui_input::Input;

use jenkins_api::models::sort_builds_by_number;
use jenkins_api::{Build, BuildRef, Client, Job, JobDetail, PipelineRun, Stage};

use crate::action::{Action, ApiResult, Notification};
use crate::command::{Command, fetch};
use crate::component::Component;
use crate::tabs::{Failures, Keyed, keyed, matches_filter, render_error, render_loading};
use crate::theme;
use crate::widgets::format::{format_duration, local_time, progress_bar, time_ago, truncate};
use crate::widgets::log::{match_ranges, matching_lines, render_window};
use crate::widgets::{Selection, input, panel, placeholder};

/// Builds shown per page in the build list.
pub const BUILDS_PER_PAGE: usize = 20;
/// Byte cap for console logs.
pub const CONSOLE_LOG_MAX_BYTES: usize = 500_000;

/// Rows taken by chrome around the log viewport (header, tabs, status,
/// breadcrumbs, borders).
const LOG_CHROME_ROWS: u16 = 8;

/// A build's detail and, for pipelines, its stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildBundle {
    pub build: Build,
    pub pipeline: Option<PipelineRun>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogKey {
    Console {
        job: String,
        number: u32,
    },
    Stage {
        job: String,
        number: u32,
        stage_id: String,
    },
}

#[derive(Debug)]
pub enum BuildsMsg {
    Jobs(ApiResult<Vec<Job>>),
    JobDetail {
        job: String,
        result: ApiResult<Box<JobDetail>>,
    },
    BuildDetail {
        job: String,
        number: u32,
        result: ApiResult<Box<BuildBundle>>,
    },
    Log {
        key: LogKey,
        result: ApiResult<String>,
    },
    Triggered {
        job: String,
        result: ApiResult<()>,
    },
}

impl BuildsMsg {
    fn request(&self) -> Request {
        match self {
            Self::Jobs(_) => Request::Jobs,
            Self::JobDetail { job, .. } => Request::Job(job.clone()),
            Self::BuildDetail { job, number, .. } => Request::Build(job.clone(), *number),
            Self::Log { key, .. } => Request::Log(key.clone()),
            Self::Triggered { job, .. } => Request::Trigger(job.clone()),
        }
    }

    fn is_ok(&self) -> bool {
        match self {
            Self::Jobs(result) => result.is_ok(),
            Self::JobDetail { result, .. } => result.is_ok(),
            Self::BuildDetail { result, .. } => result.is_ok(),
            Self::Log { result, .. } => result.is_ok(),
            Self::Triggered { result, .. } => result.is_ok(),
        }
    }
}

/// What a fetch was for; failures are stored under it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Request {
    Jobs,
    Job(String),
    Build(String, u32),
    Log(LogKey),
    Trigger(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildsMode {
    #[default]
    JobList,
    BuildList,
    BuildDetail,
    StageLog,
    Log,
}

impl BuildsMode {
    fn is_log(self) -> bool {
        matches!(self, Self::StageLog | Self::Log)
    }
}

pub struct BuildsTab {
    client: Arc<Client>,
    max_builds: usize,
    focused: bool,
    loaded: bool,
    pending: usize,
    mode: BuildsMode,
    height: u16,

    jobs: Vec<Job>,
    job_sel: Selection,
    job_filter: String,
    job_search: Option<Input>,

    current_job: Option<String>,
    detail: Option<Keyed<String, JobDetail>>,
    build_sel: Selection,

    current_build: Option<(String, u32)>,
    build: Option<Keyed<(String, u32), BuildBundle>>,
    stage_sel: Selection,

    current_log: Option<LogKey>,
    /// Mode to return to when the log is closed.
    log_origin: BuildsMode,
    log: Option<Keyed<LogKey, String>>,
    log_scroll: usize,
    follow: bool,
    log_filter: String,
    log_search: Option<Input>,

    failures: Failures<Request>,
    throbber: ThrobberState,
}

impl BuildsTab {
    pub fn new(client: Arc<Client>, max_builds: usize) -> Self {
        Self {
            client,
            max_builds: max_builds.max(1),
            focused: false,
            loaded: false,
            pending: 0,
            mode: BuildsMode::default(),
            height: 24,
            jobs: Vec::new(),
            job_sel: Selection::default(),
            job_filter: String::new(),
            job_search: None,
            current_job: None,
            detail: None,
            build_sel: Selection::default(),
            current_build: None,
            build: None,
            stage_sel: Selection::default(),
            current_log: None,
            log_origin: BuildsMode::BuildDetail,
            log: None,
            log_scroll: 0,
            follow: false,
            log_filter: String::new(),
            log_search: None,
            failures: Failures::default(),
            throbber: ThrobberState::default(),
        }
    }

    pub fn mode(&self) -> BuildsMode {
        self.mode
    }

    pub fn is_following(&self) -> bool {
        self.follow
    }

    // ── Projections ──────────────────────────────────────────────────

    pub fn visible_jobs(&self) -> Vec<&Job> {
        let filter = self
            .job_search
            .as_ref()
            .map_or(self.job_filter.as_str(), Input::value);
        self.jobs
            .iter()
            .filter(|j| matches_filter(&j.name, filter))
            .collect()
    }

    pub fn current_detail(&self) -> Option<&JobDetail> {
        keyed(self.detail.as_ref(), self.current_job.as_ref())
    }

    /// Builds of the selected job, newest first.
    pub fn builds(&self) -> &[BuildRef] {
        self.current_detail()
            .map(|d| d.builds.as_slice())
            .unwrap_or_default()
    }

    pub fn page(&self) -> usize {
        self.build_sel.index() / BUILDS_PER_PAGE
    }

    pub fn page_count(&self) -> usize {
        self.builds().len().div_ceil(BUILDS_PER_PAGE).max(1)
    }

    /// Builds on the current page.
    pub fn page_builds(&self) -> &[BuildRef] {
        let builds = self.builds();
        let start = (self.page() * BUILDS_PER_PAGE).min(builds.len());
        let end = (start + BUILDS_PER_PAGE).min(builds.len());
        &builds[start..end]
    }

    pub fn current_bundle(&self) -> Option<&BuildBundle> {
        keyed(self.build.as_ref(), self.current_build.as_ref())
    }

    fn stages(&self) -> &[Stage] {
        self.current_bundle()
            .and_then(|b| b.pipeline.as_ref())
            .map(|p| p.stages.as_slice())
            .unwrap_or_default()
    }

    pub fn current_log_text(&self) -> Option<&str> {
        keyed(self.log.as_ref(), self.current_log.as_ref()).map(String::as_str)
    }

    /// Requests whose outcome is visible in the current mode.
    fn requests_on_screen(&self) -> Vec<Request> {
        let mut on_screen = Vec::new();
        match self.mode {
            BuildsMode::JobList => on_screen.push(Request::Jobs),
            BuildsMode::BuildList => on_screen.extend(self.current_job.clone().map(Request::Job)),
            BuildsMode::BuildDetail => on_screen.extend(
                self.current_build
                    .clone()
                    .map(|(job, number)| Request::Build(job, number)),
            ),
            BuildsMode::StageLog | BuildsMode::Log => {
                on_screen.extend(self.current_log.clone().map(Request::Log));
            }
        }
        if !self.mode.is_log() {
            on_screen.extend(self.selected_job_name().map(Request::Trigger));
        }
        on_screen
    }

    /// Failure of a request that is on screen, if any.
    pub fn current_error(&self) -> Option<&Arc<jenkins_api::Error>> {
        self.failures.first(&self.requests_on_screen())
    }

    fn log_height(&self) -> usize {
        usize::from(self.height.saturating_sub(LOG_CHROME_ROWS)).max(1)
    }

    fn log_lines(&self) -> usize {
        self.current_log_text().map_or(0, |t| t.lines().count())
    }

    /// First line shown in the log viewport.
    fn log_top(&self) -> usize {
        let max_top = self.log_lines().saturating_sub(self.log_height());
        if self.follow {
            max_top
        } else {
            self.log_scroll.min(max_top)
        }
    }

    fn list_page(&self) -> usize {
        usize::from(self.height / 3).max(1)
    }

    fn selected_job_name(&self) -> Option<String> {
        match self.mode {
            BuildsMode::JobList => {
                let jobs = self.visible_jobs();
                self.job_sel.get(jobs.len()).map(|i| jobs[i].name.clone())
            }
            _ => self.current_job.clone(),
        }
    }

    fn selected_build_number(&self) -> Option<u32> {
        match self.mode {
            BuildsMode::BuildList => {
                let builds = self.builds();
                self.build_sel.get(builds.len()).map(|i| builds[i].number)
            }
            BuildsMode::BuildDetail => self.current_build.as_ref().map(|(_, n)| *n),
            _ => None,
        }
    }

    // ── Fetches ──────────────────────────────────────────────────────

    fn fetch_jobs(&mut self) -> Command {
        self.failures.clear(&Request::Jobs);
        self.pending += 1;
        let client = Arc::clone(&self.client);
        Command::perform(async move { Action::Builds(BuildsMsg::Jobs(fetch(client.all_jobs()).await)) })
    }

    fn fetch_detail(&mut self, job: String) -> Command {
        self.failures.clear(&Request::Job(job.clone()));
        self.pending += 1;
        let client = Arc::clone(&self.client);
        Command::perform(async move {
            let result = fetch(client.job_with_stages(&job)).await.map(Box::new);
            Action::Builds(BuildsMsg::JobDetail { job, result })
        })
    }

    fn fetch_build(&mut self, job: String, number: u32) -> Command {
        self.failures.clear(&Request::Build(job.clone(), number));
        self.pending += 1;
        let client = Arc::clone(&self.client);
        Command::perform(async move {
            let result = fetch(async {
                let build = client.build(&job, number).await?;
                let pipeline = client.pipeline_run(&job, number).await;
                Ok::<_, jenkins_api::Error>(Box::new(BuildBundle { build, pipeline }))
            })
            .await;
            Action::Builds(BuildsMsg::BuildDetail {
                job,
                number,
                result,
            })
        })
    }

    fn fetch_log(&mut self, key: LogKey) -> Command {
        self.failures.clear(&Request::Log(key.clone()));
        self.pending += 1;
        let client = Arc::clone(&self.client);
        Command::perform(async move {
            let result = match &key {
                LogKey::Console { job, number } => {
                    fetch(client.build_log(job, *number, CONSOLE_LOG_MAX_BYTES)).await
                }
                LogKey::Stage {
                    job,
                    number,
                    stage_id,
                } => fetch(client.stage_log(job, *number, stage_id)).await,
            };
            Action::Builds(BuildsMsg::Log { key, result })
        })
    }

    fn trigger(&mut self, job: String) -> Command {
        info!(job = %job, "triggering build");
        self.failures.clear(&Request::Trigger(job.clone()));
        self.pending += 1;
        let client = Arc::clone(&self.client);
        Command::perform(async move {
            let result = fetch(client.trigger_build(&job)).await;
            Action::Builds(BuildsMsg::Triggered { job, result })
        })
    }

    /// Re-fetch the current level. `force` also re-fetches a log that is
    /// not being followed.
    fn reload(&mut self, force: bool) -> Command {
        match self.mode {
            BuildsMode::JobList => self.fetch_jobs(),
            BuildsMode::BuildList => match self.current_job.clone() {
                Some(job) => self.fetch_detail(job),
                None => Command::none(),
            },
            BuildsMode::BuildDetail => match self.current_build.clone() {
                Some((job, number)) => self.fetch_build(job, number),
                None => Command::none(),
            },
            BuildsMode::StageLog | BuildsMode::Log => match self.current_log.clone() {
                Some(key) if force || self.follow => self.fetch_log(key),
                _ => Command::none(),
            },
        }
    }

    // ── Navigation ───────────────────────────────────────────────────

    fn enter(&mut self) -> Command {
        match self.mode {
            BuildsMode::JobList => {
                let Some(job) = self.selected_job_name() else {
                    return Command::none();
                };
                debug!(job = %job, "opening build list");
                self.mode = BuildsMode::BuildList;
                self.current_job = Some(job.clone());
                self.build_sel = Selection::default();
                self.fetch_detail(job)
            }
            BuildsMode::BuildList => {
                let (Some(job), Some(number)) = (self.current_job.clone(), self.selected_build_number())
                else {
                    return Command::none();
                };
                debug!(job = %job, number, "opening build");
                self.mode = BuildsMode::BuildDetail;
                self.current_build = Some((job.clone(), number));
                self.stage_sel = Selection::default();
                self.fetch_build(job, number)
            }
            BuildsMode::BuildDetail => {
                let stages = self.stages();
                let Some(stage_id) = self.stage_sel.get(stages.len()).map(|i| stages[i].id.clone())
                else {
                    return Command::none();
                };
                let Some((job, number)) = self.current_build.clone() else {
                    return Command::none();
                };
                self.open_log(
                    BuildsMode::StageLog,
                    LogKey::Stage {
                        job,
                        number,
                        stage_id,
                    },
                )
            }
            BuildsMode::StageLog | BuildsMode::Log => Command::none(),
        }
    }

    fn open_console_log(&mut self) -> Command {
        let (Some(job), Some(number)) = (self.current_job.clone(), self.selected_build_number()) else {
            return Command::none();
        };
        self.open_log(BuildsMode::Log, LogKey::Console { job, number })
    }

    fn open_log(&mut self, mode: BuildsMode, key: LogKey) -> Command {
        debug!(?key, "opening log");
        self.log_origin = self.mode;
        self.mode = mode;
        self.current_log = Some(key.clone());
        self.log_scroll = 0;
        self.fetch_log(key)
    }

    fn back(&mut self) {
        match self.mode {
            BuildsMode::StageLog | BuildsMode::Log => {
                self.mode = self.log_origin;
                if let Some(key) = self.current_log.take() {
                    self.failures.clear(&Request::Log(key));
                }
                self.log = None;
                self.log_filter.clear();
                self.log_scroll = 0;
            }
            BuildsMode::BuildDetail => {
                self.mode = BuildsMode::BuildList;
                if let Some((job, number)) = self.current_build.take() {
                    self.failures.clear(&Request::Build(job, number));
                }
                self.build = None;
                self.stage_sel = Selection::default();
            }
            BuildsMode::BuildList => {
                self.mode = BuildsMode::JobList;
                if let Some(job) = self.current_job.take() {
                    self.failures.clear(&Request::Job(job));
                }
                self.detail = None;
                self.build_sel = Selection::default();
            }
            BuildsMode::JobList => self.job_filter.clear(),
        }
    }

    fn scroll_log(&mut self, delta: isize) {
        let top = self.log_top();
        self.follow = false;
        let max_top = self.log_lines().saturating_sub(self.log_height());
        self.log_scroll = top.saturating_add_signed(delta).min(max_top);
    }

    /// Move the viewport to the next (or previous) line matching the log
    /// filter.
    fn jump_to_match(&mut self, forward: bool) {
        let Some(text) = self.current_log_text() else {
            return;
        };
        if self.log_filter.is_empty() {
            return;
        }
        let top = self.log_top();
        let hits: Vec<usize> = text
            .lines()
            .enumerate()
            .filter(|(_, l)| !match_ranges(l, &self.log_filter).is_empty())
            .map(|(i, _)| i)
            .collect();
        let target = if forward {
            hits.iter().find(|&&i| i > top).or_else(|| hits.first())
        } else {
            hits.iter().rev().find(|&&i| i < top).or_else(|| hits.last())
        };
        if let Some(&line) = target {
            self.follow = false;
            let max_top = self.log_lines().saturating_sub(self.log_height());
            self.log_scroll = line.min(max_top);
        }
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) {
        if let Some(prompt) = self.log_search.as_mut() {
            match key.code {
                // Leaves the prompt but keeps what was typed.
                KeyCode::Esc => {
                    self.log_filter = prompt.value().to_owned();
                    self.log_search = None;
                }
                KeyCode::Enter => {
                    self.log_filter = prompt.value().to_owned();
                    self.log_search = None;
                    self.jump_to_match(true);
                }
                _ => {
                    input::edit(prompt, key);
                }
            }
        } else if let Some(prompt) = self.job_search.as_mut() {
            match key.code {
                KeyCode::Esc => {
                    self.job_search = None;
                    self.job_filter.clear();
                }
                KeyCode::Enter => {
                    self.job_filter = prompt.value().to_owned();
                    self.job_search = None;
                }
                _ => {
                    input::edit(prompt, key);
                }
            }
            let len = self.visible_jobs().len();
            self.job_sel.clamp(len);
        }
    }

    fn handle_log_key(&mut self, key: KeyEvent) -> Command {
        let page = isize::try_from(self.log_height()).unwrap_or(isize::MAX);
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.scroll_log(1),
            KeyCode::Char('k') | KeyCode::Up => self.scroll_log(-1),
            KeyCode::PageDown => self.scroll_log(page),
            KeyCode::PageUp => self.scroll_log(-page),
            KeyCode::Char('g') | KeyCode::Home => {
                self.follow = false;
                self.log_scroll = 0;
            }
            KeyCode::Char('G') | KeyCode::End => {
                self.follow = false;
                self.log_scroll = self.log_lines().saturating_sub(self.log_height());
            }
            KeyCode::Char('f') => self.follow = !self.follow,
            KeyCode::Char('n') => self.jump_to_match(true),
            KeyCode::Char('N') => self.jump_to_match(false),
            KeyCode::Char('/') => self.log_search = Some(Input::new(self.log_filter.clone())),
            KeyCode::Char('r') => return self.reload(true),
            KeyCode::Esc => self.back(),
            _ => {}
        }
        Command::none()
    }

    fn handle_list_key(&mut self, key: KeyEvent) -> Command {
        let page = self.list_page();
        match key.code {
            KeyCode::Enter => return self.enter(),
            KeyCode::Esc => self.back(),
            KeyCode::Char('r') => return self.reload(true),
            KeyCode::Char('t') => {
                if let Some(job) = self.selected_job_name() {
                    return self.trigger(job);
                }
            }
            KeyCode::Char('l') if matches!(self.mode, BuildsMode::BuildList | BuildsMode::BuildDetail) => {
                return self.open_console_log();
            }
            KeyCode::Char('/') if self.mode == BuildsMode::JobList => {
                self.job_search = Some(Input::new(self.job_filter.clone()));
            }
            KeyCode::Backspace if self.mode == BuildsMode::JobList => self.job_filter.clear(),
            KeyCode::Char('n') if self.mode == BuildsMode::BuildList => {
                let len = self.builds().len();
                if (self.page() + 1) * BUILDS_PER_PAGE < len {
                    self.build_sel.select((self.page() + 1) * BUILDS_PER_PAGE, len);
                }
            }
            KeyCode::Char('p') if self.mode == BuildsMode::BuildList => {
                let len = self.builds().len();
                let page = self.page().saturating_sub(1);
                self.build_sel.select(page * BUILDS_PER_PAGE, len);
            }
            code => {
                let (sel, len) = match self.mode {
                    BuildsMode::JobList => {
                        let len = self.visible_jobs().len();
                        (&mut self.job_sel, len)
                    }
                    BuildsMode::BuildList => {
                        let len = self.builds().len();
                        (&mut self.build_sel, len)
                    }
                    _ => {
                        let len = self.stages().len();
                        (&mut self.stage_sel, len)
                    }
                };
                match code {
                    KeyCode::Char('j') | KeyCode::Down => sel.down(len),
                    KeyCode::Char('k') | KeyCode::Up => sel.up(),
                    KeyCode::Char('g') | KeyCode::Home => sel.top(),
                    KeyCode::Char('G') | KeyCode::End => sel.bottom(len),
                    KeyCode::PageDown => sel.page_down(page, len),
                    KeyCode::PageUp => sel.page_up(page),
                    _ => {}
                }
            }
        }
        Command::none()
    }

    fn apply(&mut self, msg: BuildsMsg) -> Command {
        self.pending = self.pending.saturating_sub(1);
        let request = msg.request();
        if msg.is_ok() {
            self.failures.clear(&request);
        }
        match msg {
            BuildsMsg::Jobs(Ok(jobs)) => {
                self.jobs = jobs;
                self.jobs.sort_by_key(|j| j.name.to_lowercase());
                let len = self.visible_jobs().len();
                self.job_sel.clamp(len);
            }
            BuildsMsg::JobDetail {
                job,
                result: Ok(mut detail),
            } => {
                sort_builds_by_number(&mut detail.builds);
                detail.builds.truncate(self.max_builds);
                self.detail = Some(Keyed::new(job, *detail));
                let len = self.builds().len();
                self.build_sel.clamp(len);
            }
            BuildsMsg::BuildDetail {
                job,
                number,
                result: Ok(bundle),
            } => {
                self.build = Some(Keyed::new((job, number), *bundle));
                let len = self.stages().len();
                self.stage_sel.clamp(len);
            }
            BuildsMsg::Log {
                key,
                result: Ok(text),
            } => self.log = Some(Keyed::new(key, text)),
            BuildsMsg::Triggered { job, result: Ok(()) } => {
                let notify = Command::message(Action::Notify(Notification::success(format!(
                    "Build triggered for {job}"
                ))));
                let reload = if self.current_job.as_ref() == Some(&job)
                    && self.mode == BuildsMode::BuildList
                {
                    self.fetch_detail(job)
                } else {
                    Command::none()
                };
                return Command::batch([notify, reload]);
            }
            BuildsMsg::Triggered {
                job,
                result: Err(e),
            } => {
                warn!(job = %job, error = %e, "trigger failed");
                let notify = Command::message(Action::Notify(Notification::error(format!(
                    "Could not trigger {job}: {e}"
                ))));
                self.failures.record(request, e);
                return notify;
            }
            BuildsMsg::Jobs(Err(e))
            | BuildsMsg::JobDetail { result: Err(e), .. }
            | BuildsMsg::BuildDetail { result: Err(e), .. }
            | BuildsMsg::Log { result: Err(e), .. } => {
                warn!(?request, error = %e, "builds fetch failed");
                self.failures.record(request, e);
            }
        }
        Command::none()
    }

    // ── Rendering ────────────────────────────────────────────────────

    fn breadcrumb(&self) -> Line<'static> {
        let mut spans = vec![Span::styled("Builds", theme::title_style())];
        let mut push = |text: String| {
            spans.push(Span::styled(" › ", theme::key_hint()));
            spans.push(Span::styled(
                text,
                Style::default().fg(theme::DIM_WHITE).add_modifier(Modifier::BOLD),
            ));
        };
        if let Some(job) = &self.current_job {
            push(job.clone());
        }
        if let Some((_, number)) = &self.current_build {
            push(format!("#{number}"));
        }
        match &self.current_log {
            Some(LogKey::Console { .. }) => push("console".into()),
            Some(LogKey::Stage { stage_id, .. }) => {
                let name = self
                    .stages()
                    .iter()
                    .find(|s| &s.id == stage_id)
                    .map_or_else(|| stage_id.clone(), |s| s.name.clone());
                push(format!("stage {name}"));
            }
            None => {}
        }
        Line::from(spans)
    }

    fn render_jobs(&self, frame: &mut Frame, area: Rect) {
        let jobs = self.visible_jobs();
        let block = panel(format!("Jobs ({})", jobs.len()), self.focused);
        if jobs.is_empty() {
            let text = if self.pending > 0 { "  loading jobs..." } else { "  no jobs" };
            frame.render_widget(Paragraph::new(placeholder(text)).block(block), area);
            return;
        }
        let now = Utc::now();
        let rows: Vec<Row> = jobs
            .iter()
            .map(|job| {
                let last = job.last_build.as_ref();
                let status = last.map_or("-", BuildRef::status_text).to_owned();
                Row::new(vec![
                    Span::styled("●", Style::default().fg(theme::job_color(&job.color))),
                    Span::raw(job.name.clone()),
                    Span::raw(last.map_or_else(|| "-".into(), |b| format!("#{}", b.number))),
                    Span::styled(status.clone(), theme::status_style(&status)),
                    Span::raw(time_ago(job.last_build_timestamp(), now)),
                    Span::raw(
                        job.health_score()
                            .map_or_else(|| "-".into(), |s| format!("{s}%")),
                    ),
                ])
                .style(theme::table_row())
            })
            .collect();
        let table = Table::new(
            rows,
            [
                Constraint::Length(2),
                Constraint::Fill(1),
                Constraint::Length(7),
                Constraint::Length(10),
                Constraint::Length(9),
                Constraint::Length(6),
            ],
        )
        .header(
            Row::new(vec!["", "Job", "Last", "Result", "When", "Health"]).style(theme::table_header()),
        )
        .row_highlight_style(theme::table_selected())
        .block(block);
        let mut state = TableState::default().with_selected(self.job_sel.get(jobs.len()));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn render_builds(&self, frame: &mut Frame, area: Rect) {
        let job = self.current_job.as_deref().unwrap_or_default();
        if self.current_detail().is_none() {
            let block = panel(job.to_owned(), self.focused);
            frame.render_widget(Paragraph::new(placeholder("  loading builds...")).block(block), area);
            return;
        }
        let builds = self.page_builds();
        let title = format!(
            "{job}: {} builds (page {}/{})",
            self.builds().len(),
            self.page() + 1,
            self.page_count()
        );
        let now = Utc::now();
        let rows: Vec<Row> = builds
            .iter()
            .map(|b| {
                let status = b.status_text();
                let stages: Vec<Span> = b
                    .stages
                    .iter()
                    .map(|s| {
                        Span::styled(
                            format!("{} ", theme::status_icon(s.effective_status())),
                            theme::status_style(s.effective_status()),
                        )
                    })
                    .collect();
                Row::new(vec![
                    Line::from(format!("#{}", b.number)),
                    Line::from(Span::styled(
                        format!("{} {status}", theme::status_icon(status)),
                        theme::status_style(status),
                    )),
                    Line::from(time_ago(b.timestamp, now)),
                    Line::from(format_duration(b.duration)),
                    Line::from(stages),
                ])
                .style(theme::table_row())
            })
            .collect();
        let table = Table::new(
            rows,
            [
                Constraint::Length(8),
                Constraint::Length(12),
                Constraint::Length(9),
                Constraint::Length(9),
                Constraint::Fill(1),
            ],
        )
        .header(
            Row::new(vec!["Build", "Status", "Started", "Duration", "Stages"])
                .style(theme::table_header()),
        )
        .row_highlight_style(theme::table_selected())
        .block(panel(title, self.focused));
        let selected = self
            .build_sel
            .get(self.builds().len())
            .map(|i| i % BUILDS_PER_PAGE);
        let mut state = TableState::default().with_selected(selected);
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn render_build_detail(&self, frame: &mut Frame, area: Rect) {
        let title = self
            .current_build
            .as_ref()
            .map(|(job, n)| format!("{job} #{n}"))
            .unwrap_or_default();
        let Some(bundle) = self.current_bundle() else {
            let block = panel(title, self.focused);
            frame.render_widget(Paragraph::new(placeholder("  loading build...")).block(block), area);
            return;
        };
        let build = &bundle.build;
        let now_ms = Utc::now().timestamp_millis();
        let label = |text: &str| Span::styled(format!("{text:<12}"), theme::key_hint());

        let mut lines = vec![
            Line::from(vec![
                label("Status"),
                Span::styled(build.status_text().to_owned(), theme::status_style(build.status_text())),
            ]),
            Line::from(vec![label("Started"), Span::raw(local_time(build.timestamp))]),
            Line::from(vec![
                label("Duration"),
                Span::raw(if build.building {
                    format!(
                        "{}  {} {}%  (est. {})",
                        format_duration(now_ms - build.timestamp),
                        progress_bar(build.progress(now_ms), 20),
                        build.progress(now_ms),
                        format_duration(build.estimated_duration)
                    )
                } else {
                    format_duration(build.duration)
                }),
            ]),
        ];
        for cause in build.all_causes() {
            lines.push(Line::from(vec![label("Cause"), Span::raw(cause.short_description.clone())]));
        }
        if let Some(desc) = build.description.as_deref().filter(|d| !d.is_empty()) {
            lines.push(Line::from(vec![label("Description"), Span::raw(desc.to_owned())]));
        }
        if !build.artifacts.is_empty() {
            lines.push(Line::from(vec![
                label("Artifacts"),
                Span::raw(
                    build
                        .artifacts
                        .iter()
                        .map(|a| a.file_name.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                ),
            ]));
        }
        for item in build.change_sets.iter().flat_map(|c| c.items.iter()).take(5) {
            let commit = item.commit_id.as_deref().map_or("", |c| c.get(..8).unwrap_or(c));
            lines.push(Line::from(vec![
                label("Change"),
                Span::styled(format!("{commit} "), Style::default().fg(theme::LIGHT_BLUE)),
                Span::raw(format!("{} ({})", truncate(&item.msg, 60), item.author.full_name)),
            ]));
        }

        let stages = self.stages();
        let info_height = u16::try_from(lines.len() + 2).unwrap_or(u16::MAX);
        let [info, stage_area] = if stages.is_empty() {
            [area, Rect::default()]
        } else {
            Layout::vertical([Constraint::Length(info_height), Constraint::Fill(1)]).areas(area)
        };
        frame.render_widget(
            Paragraph::new(lines)
                .wrap(Wrap { trim: false })
                .block(panel(title, self.focused && stages.is_empty())),
            info,
        );
        if stages.is_empty() {
            return;
        }

        let rows: Vec<Row> = stages
            .iter()
            .map(|s| {
                let status = s.effective_status();
                Row::new(vec![
                    Span::styled(
                        format!("{} {status}", theme::status_icon(status)),
                        theme::status_style(status),
                    ),
                    Span::raw(s.name.clone()),
                    Span::raw(format_duration(s.duration_millis)),
                    Span::raw(s.exec_node.clone().unwrap_or_default()),
                ])
                .style(theme::table_row())
            })
            .collect();
        let pipeline_status = bundle
            .pipeline
            .as_ref()
            .map(|p| p.status.clone())
            .unwrap_or_default();
        let table = Table::new(
            rows,
            [
                Constraint::Length(16),
                Constraint::Fill(1),
                Constraint::Length(9),
                Constraint::Length(16),
            ],
        )
        .header(Row::new(vec!["Status", "Stage", "Duration", "Node"]).style(theme::table_header()))
        .row_highlight_style(theme::table_selected())
        .block(panel(
            format!("Stages ({}) {pipeline_status}", stages.len()),
            self.focused,
        ));
        let mut state = TableState::default().with_selected(self.stage_sel.get(stages.len()));
        frame.render_stateful_widget(table, stage_area, &mut state);
    }

    fn render_log(&self, frame: &mut Frame, area: Rect) {
        let title = match self.mode {
            BuildsMode::StageLog => "Stage log",
            _ => "Console",
        };
        let Some(text) = self.current_log_text() else {
            let block = panel(title, self.focused);
            frame.render_widget(Paragraph::new(placeholder("  loading log...")).block(block), area);
            return;
        };
        let needle = self
            .log_search
            .as_ref()
            .map_or(self.log_filter.as_str(), Input::value);
        let total = self.log_lines();
        let mut title = format!("{title} ({total} lines)");
        if self.is_following() {
            title.push_str(" [follow]");
        }
        if !needle.is_empty() {
            title.push_str(&format!(" [{} matching]", matching_lines(text, needle)));
        }
        let height = usize::from(area.height.saturating_sub(2));
        let top = self.log_top();
        let lines = render_window(text, top, height, needle);
        frame.render_widget(Paragraph::new(lines).block(panel(title, self.focused)), area);
    }
}

impl Component for BuildsTab {
    fn load(&mut self) -> Command {
        self.loaded = true;
        self.reload(false)
    }

    fn loaded(&self) -> bool {
        self.loaded
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Command> {
        if self.captures_input() {
            self.handle_prompt_key(key);
            return Ok(Command::none());
        }
        if self.mode.is_log() {
            return Ok(self.handle_log_key(key));
        }
        Ok(self.handle_list_key(key))
    }

    fn update(&mut self, action: Action) -> Result<Command> {
        match action {
            Action::Builds(msg) => Ok(self.apply(msg)),
            _ => Ok(Command::none()),
        }
    }

    fn on_tick(&mut self) {
        if self.pending > 0 {
            self.throbber.calc_next();
        }
    }

    fn resize(&mut self, _width: u16, height: u16) {
        self.height = height;
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let [crumbs, status, body] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Fill(1),
        ])
        .areas(area);

        frame.render_widget(Paragraph::new(self.breadcrumb()), crumbs);
        if let Some(prompt) = self.log_search.as_ref().or(self.job_search.as_ref()) {
            frame.render_widget(Paragraph::new(input::prompt_line("/", prompt, true)), status);
        } else if let Some(err) = self.current_error() {
            render_error(frame, status, err);
        } else if self.pending > 0 {
            render_loading(frame, status, "Loading...", &self.throbber);
        } else {
            let filter = if self.mode.is_log() { &self.log_filter } else { &self.job_filter };
            if !filter.is_empty() && (self.mode.is_log() || self.mode == BuildsMode::JobList) {
                let shown = Input::new(filter.clone());
                frame.render_widget(
                    Paragraph::new(input::prompt_line("filter: ", &shown, false)),
                    status,
                );
            }
        }

        match self.mode {
            BuildsMode::JobList => self.render_jobs(frame, body),
            BuildsMode::BuildList => self.render_builds(frame, body),
            BuildsMode::BuildDetail => self.render_build_detail(frame, body),
            BuildsMode::StageLog | BuildsMode::Log => self.render_log(frame, body),
        }
    }

    fn captures_input(&self) -> bool {
        self.log_search.is_some() || self.job_search.is_some()
    }

    fn hints(&self) -> Vec<(&'static str, &'static str)> {
        if self.captures_input() {
            return vec![("Enter", "apply"), ("Esc", "cancel")];
        }
        match self.mode {
            BuildsMode::JobList => vec![
                ("Enter", "builds"),
                ("t", "trigger"),
                ("/", "filter"),
                ("r", "refresh"),
            ],
            BuildsMode::BuildList => vec![
                ("Enter", "detail"),
                ("l", "log"),
                ("n/p", "page"),
                ("t", "trigger"),
                ("Esc", "back"),
            ],
            BuildsMode::BuildDetail => vec![
                ("Enter", "stage log"),
                ("l", "console"),
                ("t", "trigger"),
                ("Esc", "back"),
            ],
            BuildsMode::StageLog | BuildsMode::Log => vec![
                ("f", "follow"),
                ("/", "search"),
                ("n/N", "match"),
                ("g/G", "top/end"),
                ("Esc", "back"),
            ],
        }
    }

    fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    fn id(&self) -> &str {
        "builds"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use jenkins_api::Error;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::tabs::offline_client;

    fn press(tab: &mut BuildsTab, code: KeyCode) -> Command {
        tab.handle_key_event(KeyEvent::from(code)).unwrap()
    }

    fn deliver(tab: &mut BuildsTab, msg: BuildsMsg) -> Command {
        tab.update(Action::Builds(msg)).unwrap()
    }

    fn job(name: &str) -> Job {
        Job {
            name: name.into(),
            ..Job::default()
        }
    }

    fn detail(name: &str, numbers: impl IntoIterator<Item = u32>) -> Box<JobDetail> {
        Box::new(JobDetail {
            name: name.into(),
            builds: numbers
                .into_iter()
                .map(|number| BuildRef {
                    number,
                    ..BuildRef::default()
                })
                .collect(),
            ..JobDetail::default()
        })
    }

    fn bundle(number: u32, stages: &[(&str, &str)]) -> Box<BuildBundle> {
        Box::new(BuildBundle {
            build: Build {
                number,
                ..Build::default()
            },
            pipeline: (!stages.is_empty()).then(|| PipelineRun {
                stages: stages
                    .iter()
                    .map(|(id, name)| Stage {
                        id: (*id).into(),
                        name: (*name).into(),
                        ..Stage::default()
                    })
                    .collect(),
                ..PipelineRun::default()
            }),
        })
    }

    /// Tab in BuildList for `api` with builds 1..=45 delivered.
    fn build_list_tab() -> BuildsTab {
        let mut tab = BuildsTab::new(offline_client(), 200);
        let _ = tab.load();
        let _ = deliver(&mut tab, BuildsMsg::Jobs(Ok(vec![job("web"), job("api")])));
        let cmd = press(&mut tab, KeyCode::Enter);
        assert_eq!(cmd.len(), 1);
        let _ = deliver(
            &mut tab,
            BuildsMsg::JobDetail {
                job: "api".into(),
                result: Ok(detail("api", 1..=45)),
            },
        );
        tab
    }

    #[tokio::test]
    async fn jobs_sorted_and_builds_newest_first() {
        let tab = build_list_tab();
        let names: Vec<_> = tab.jobs.iter().map(|j| j.name.clone()).collect();
        assert_eq!(names, ["api", "web"]);
        assert_eq!(tab.mode(), BuildsMode::BuildList);
        assert_eq!(tab.builds()[0].number, 45);
        assert_eq!(tab.page_builds().len(), BUILDS_PER_PAGE);
        assert_eq!(tab.page_count(), 3);
    }

    #[tokio::test]
    async fn build_history_is_capped() {
        let mut tab = BuildsTab::new(offline_client(), 10);
        tab.current_job = Some("api".into());
        tab.mode = BuildsMode::BuildList;
        let _ = deliver(
            &mut tab,
            BuildsMsg::JobDetail {
                job: "api".into(),
                result: Ok(detail("api", 1..=30)),
            },
        );
        assert_eq!(tab.builds().len(), 10);
        assert_eq!(tab.builds()[9].number, 21);
    }

    #[tokio::test]
    async fn paging_with_n_and_p() {
        let mut tab = build_list_tab();
        let _ = press(&mut tab, KeyCode::Char('n'));
        assert_eq!(tab.page(), 1);
        assert_eq!(tab.page_builds()[0].number, 25);
        let _ = press(&mut tab, KeyCode::Char('n'));
        assert_eq!(tab.page(), 2);
        assert_eq!(tab.page_builds().len(), 5);
        let _ = press(&mut tab, KeyCode::Char('n'));
        assert_eq!(tab.page(), 2);
        let _ = press(&mut tab, KeyCode::Char('p'));
        let _ = press(&mut tab, KeyCode::Char('p'));
        let _ = press(&mut tab, KeyCode::Char('p'));
        assert_eq!(tab.page(), 0);
    }

    #[tokio::test]
    async fn build_detail_stage_log_and_back() {
        let mut tab = build_list_tab();
        let _ = press(&mut tab, KeyCode::Char('j'));
        let cmd = press(&mut tab, KeyCode::Enter);
        assert_eq!(cmd.len(), 1);
        assert_eq!(tab.mode(), BuildsMode::BuildDetail);
        assert_eq!(tab.current_build, Some(("api".into(), 44)));

        let _ = deliver(
            &mut tab,
            BuildsMsg::BuildDetail {
                job: "api".into(),
                number: 44,
                result: Ok(bundle(44, &[("6", "Checkout"), ("12", "Test")])),
            },
        );
        let _ = press(&mut tab, KeyCode::Char('j'));
        let cmd = press(&mut tab, KeyCode::Enter);
        assert_eq!(cmd.len(), 1);
        assert_eq!(tab.mode(), BuildsMode::StageLog);
        let key = LogKey::Stage {
            job: "api".into(),
            number: 44,
            stage_id: "12".into(),
        };
        assert_eq!(tab.current_log, Some(key.clone()));

        let _ = deliver(
            &mut tab,
            BuildsMsg::Log {
                key,
                result: Ok("[Pipeline] sh\nok\n".into()),
            },
        );
        assert_eq!(tab.current_log_text(), Some("[Pipeline] sh\nok\n"));

        let _ = press(&mut tab, KeyCode::Esc);
        assert_eq!(tab.mode(), BuildsMode::BuildDetail);
        assert!(tab.log.is_none());
        assert!(tab.current_bundle().is_some());

        let _ = press(&mut tab, KeyCode::Esc);
        assert_eq!(tab.mode(), BuildsMode::BuildList);
        assert!(tab.build.is_none());

        let _ = press(&mut tab, KeyCode::Esc);
        assert_eq!(tab.mode(), BuildsMode::JobList);
        assert!(tab.detail.is_none());
        assert!(tab.builds().is_empty());
    }

    #[tokio::test]
    async fn console_log_from_build_list_returns_there() {
        let mut tab = build_list_tab();
        let cmd = press(&mut tab, KeyCode::Char('l'));
        assert_eq!(cmd.len(), 1);
        assert_eq!(tab.mode(), BuildsMode::Log);
        assert_eq!(
            tab.current_log,
            Some(LogKey::Console {
                job: "api".into(),
                number: 45
            })
        );
        let _ = press(&mut tab, KeyCode::Esc);
        assert_eq!(tab.mode(), BuildsMode::BuildList);
    }

    #[tokio::test]
    async fn stale_build_detail_is_not_shown() {
        let mut tab = build_list_tab();
        let _ = press(&mut tab, KeyCode::Enter); // #45
        let _ = press(&mut tab, KeyCode::Esc);
        let _ = press(&mut tab, KeyCode::Char('j'));
        let _ = press(&mut tab, KeyCode::Enter); // #44

        let _ = deliver(
            &mut tab,
            BuildsMsg::BuildDetail {
                job: "api".into(),
                number: 45,
                result: Ok(bundle(45, &[])),
            },
        );
        assert!(tab.current_bundle().is_none());
    }

    #[tokio::test]
    async fn follow_sticks_to_bottom_and_refreshes() {
        let mut tab = build_list_tab();
        tab.resize(80, 18); // 10-line viewport
        let _ = press(&mut tab, KeyCode::Char('l'));
        let key = tab.current_log.clone().unwrap();
        let text: String = (1..=50).map(|i| format!("line {i}\n")).collect();
        let _ = deliver(&mut tab, BuildsMsg::Log { key, result: Ok(text) });

        assert_eq!(tab.log_top(), 0);
        assert!(tab.load().is_empty(), "unfollowed log is not refreshed");

        let _ = press(&mut tab, KeyCode::Char('f'));
        assert!(tab.is_following());
        assert_eq!(tab.log_top(), 40);
        assert_eq!(tab.load().len(), 1);

        let _ = press(&mut tab, KeyCode::Char('k'));
        assert!(!tab.is_following());
        assert_eq!(tab.log_top(), 39);
        let _ = press(&mut tab, KeyCode::Char('g'));
        assert_eq!(tab.log_top(), 0);
        let _ = press(&mut tab, KeyCode::PageDown);
        assert_eq!(tab.log_top(), 10);
    }

    #[tokio::test]
    async fn log_search_keeps_filter_and_jumps() {
        let mut tab = build_list_tab();
        tab.resize(80, 13); // 5-line viewport
        let _ = press(&mut tab, KeyCode::Char('l'));
        let key = tab.current_log.clone().unwrap();
        let text: String = (1..=30)
            .map(|i| if i == 20 { "ERROR boom\n".to_owned() } else { format!("line {i}\n") })
            .collect();
        let _ = deliver(&mut tab, BuildsMsg::Log { key, result: Ok(text) });

        let _ = press(&mut tab, KeyCode::Char('/'));
        assert!(tab.captures_input());
        for c in "boom".chars() {
            let _ = press(&mut tab, KeyCode::Char(c));
        }
        let _ = press(&mut tab, KeyCode::Enter);
        assert!(!tab.captures_input());
        assert_eq!(tab.log_filter, "boom");
        assert_eq!(tab.log_top(), 19);

        let _ = press(&mut tab, KeyCode::Char('/'));
        let _ = press(&mut tab, KeyCode::Esc);
        assert_eq!(tab.log_filter, "boom");
        assert_eq!(tab.mode(), BuildsMode::Log);
    }

    #[tokio::test]
    async fn job_filter_in_job_list() {
        let mut tab = BuildsTab::new(offline_client(), 200);
        let _ = deliver(
            &mut tab,
            BuildsMsg::Jobs(Ok(vec![job("deploy-prod"), job("build"), job("Deploy-Staging")])),
        );
        let _ = press(&mut tab, KeyCode::Char('/'));
        for c in "deploy".chars() {
            let _ = press(&mut tab, KeyCode::Char(c));
        }
        assert_eq!(tab.visible_jobs().len(), 2);
        let _ = press(&mut tab, KeyCode::Esc);
        assert_eq!(tab.visible_jobs().len(), 3);
    }

    #[tokio::test]
    async fn trigger_notifies_and_reloads_detail() {
        let mut tab = build_list_tab();
        let cmd = press(&mut tab, KeyCode::Char('t'));
        assert_eq!(cmd.len(), 1);

        let cmd = deliver(
            &mut tab,
            BuildsMsg::Triggered {
                job: "api".into(),
                result: Ok(()),
            },
        );
        assert_eq!(cmd.len(), 2);
        let actions = cmd.resolve().await;
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::Notify(n) if n.message == "Build triggered for api"
        )));
    }

    #[tokio::test]
    async fn trigger_failure_is_recorded() {
        let mut tab = build_list_tab();
        let cmd = deliver(
            &mut tab,
            BuildsMsg::Triggered {
                job: "api".into(),
                result: Err(Arc::new(Error::Authorization)),
            },
        );
        assert_eq!(cmd.len(), 1);
        assert!(tab.current_error().is_some());
    }

    #[tokio::test]
    async fn late_failure_for_a_left_job_is_not_shown() {
        let mut tab = build_list_tab();
        let _ = press(&mut tab, KeyCode::Esc);
        assert_eq!(tab.mode(), BuildsMode::JobList);
        let _ = press(&mut tab, KeyCode::Down);
        let _ = press(&mut tab, KeyCode::Enter);
        assert_eq!(tab.current_job.as_deref(), Some("web"));
        let _ = deliver(
            &mut tab,
            BuildsMsg::JobDetail {
                job: "web".into(),
                result: Ok(detail("web", 1..=3)),
            },
        );
        let _ = deliver(
            &mut tab,
            BuildsMsg::JobDetail {
                job: "api".into(),
                result: Err(Arc::new(Error::Timeout { timeout_secs: 30 })),
            },
        );

        assert!(tab.current_error().is_none());
        assert_eq!(tab.current_detail().map(|d| d.name.as_str()), Some("web"));
        assert_eq!(tab.builds().len(), 3);
    }

    #[tokio::test]
    async fn failure_for_the_open_job_clears_on_success() {
        let mut tab = build_list_tab();
        let _ = deliver(
            &mut tab,
            BuildsMsg::JobDetail {
                job: "api".into(),
                result: Err(Arc::new(Error::RateLimit)),
            },
        );
        assert!(matches!(
            tab.current_error().map(AsRef::as_ref),
            Some(Error::RateLimit)
        ));
        // the earlier detail stays on screen behind the error
        assert_eq!(tab.builds().len(), 45);

        let _ = deliver(
            &mut tab,
            BuildsMsg::JobDetail {
                job: "api".into(),
                result: Ok(detail("api", 1..=46)),
            },
        );
        assert!(tab.current_error().is_none());
    }
}
