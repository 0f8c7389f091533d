//! Views tab: browse Jenkins views, the jobs inside one, and a job's detail.

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
use tracing::{debug, warn};
use tui_input::Input;

use jenkins_api::models::sort_jobs_by_last_build;
use jenkins_api::{Client, Job, JobDetail, View};

use crate::action::{Action, ApiResult};
use crate::command::{Command, fetch};
use crate::component::Component;
use crate::tabs::{Failures, Keyed, keyed, matches_filter, render_error, render_loading};
use crate::theme;
use crate::widgets::format::{format_duration, time_ago};
use crate::widgets::{Selection, input, panel, placeholder};

#[derive(Debug)]
pub enum ViewsMsg {
    Views(ApiResult<Vec<View>>),
    Jobs {
        view: String,
        result: ApiResult<Vec<Job>>,
    },
    JobDetail {
        job: String,
        result: ApiResult<Box<JobDetail>>,
    },
}

impl ViewsMsg {
    fn request(&self) -> Request {
        match self {
            Self::Views(_) => Request::Views,
            Self::Jobs { view, .. } => Request::Jobs(view.clone()),
            Self::JobDetail { job, .. } => Request::Detail(job.clone()),
        }
    }

    fn is_ok(&self) -> bool {
        match self {
            Self::Views(result) => result.is_ok(),
            Self::Jobs { result, .. } => result.is_ok(),
            Self::JobDetail { result, .. } => result.is_ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Request {
    Views,
    Jobs(String),
    Detail(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewsMode {
    #[default]
    List,
    Jobs,
    JobDetail,
}

pub struct ViewsTab {
    client: Arc<Client>,
    focused: bool,
    loaded: bool,
    pending: usize,
    mode: ViewsMode,
    height: u16,

    views: Vec<View>,
    view_sel: Selection,
    current_view: Option<String>,

    jobs: Option<Keyed<String, Vec<Job>>>,
    job_sel: Selection,
    current_job: Option<String>,

    detail: Option<Keyed<String, JobDetail>>,

    filter: String,
    /// Present while the `/` prompt is open.
    search: Option<Input>,

    failures: Failures<Request>,
    throbber: ThrobberState,
}

impl ViewsTab {
    pub fn new(client: Arc<Client>) -> Self {
        Self {
            client,
            focused: false,
            loaded: false,
            pending: 0,
            mode: ViewsMode::default(),
            height: 24,
            views: Vec::new(),
            view_sel: Selection::default(),
            current_view: None,
            jobs: None,
            job_sel: Selection::default(),
            current_job: None,
            detail: None,
            filter: String::new(),
            search: None,
            failures: Failures::default(),
            throbber: ThrobberState::default(),
        }
    }

    pub fn mode(&self) -> ViewsMode {
        self.mode
    }

    /// Filter text in effect: the live prompt while typing, else the
    /// applied filter.
    fn active_filter(&self) -> &str {
        self.search.as_ref().map_or(self.filter.as_str(), Input::value)
    }

    pub fn visible_views(&self) -> Vec<&View> {
        let filter = self.active_filter();
        self.views
            .iter()
            .filter(|v| matches_filter(&v.name, filter))
            .collect()
    }

    /// Jobs of the selected view, if they have arrived.
    pub fn current_jobs(&self) -> Option<&Vec<Job>> {
        keyed(self.jobs.as_ref(), self.current_view.as_ref())
    }

    pub fn visible_jobs(&self) -> Vec<&Job> {
        let filter = self.active_filter();
        self.current_jobs()
            .map(|jobs| jobs.iter().filter(|j| matches_filter(&j.name, filter)).collect())
            .unwrap_or_default()
    }

    pub fn current_detail(&self) -> Option<&JobDetail> {
        keyed(self.detail.as_ref(), self.current_job.as_ref())
    }

    /// Failure of the fetch behind the current level, if any.
    pub fn current_error(&self) -> Option<&Arc<jenkins_api::Error>> {
        let request = match self.mode {
            ViewsMode::List => Some(Request::Views),
            ViewsMode::Jobs => self.current_view.clone().map(Request::Jobs),
            ViewsMode::JobDetail => self.current_job.clone().map(Request::Detail),
        };
        self.failures.first(&request)
    }

    fn page(&self) -> usize {
        usize::from(self.height / 3).max(1)
    }

    fn visible_len(&self) -> usize {
        match self.mode {
            ViewsMode::List => self.visible_views().len(),
            ViewsMode::Jobs => self.visible_jobs().len(),
            ViewsMode::JobDetail => 0,
        }
    }

    fn selection_mut(&mut self) -> Option<&mut Selection> {
        match self.mode {
            ViewsMode::List => Some(&mut self.view_sel),
            ViewsMode::Jobs => Some(&mut self.job_sel),
            ViewsMode::JobDetail => None,
        }
    }

    // ── Fetches ──────────────────────────────────────────────────────

    fn fetch_views(&mut self) -> Command {
        self.failures.clear(&Request::Views);
        self.pending += 1;
        let client = Arc::clone(&self.client);
        Command::perform(async move { Action::Views(ViewsMsg::Views(fetch(client.views()).await)) })
    }

    fn fetch_jobs(&mut self, view: String) -> Command {
        self.failures.clear(&Request::Jobs(view.clone()));
        self.pending += 1;
        let client = Arc::clone(&self.client);
        Command::perform(async move {
            let result = fetch(client.view_jobs(&view)).await;
            Action::Views(ViewsMsg::Jobs { view, result })
        })
    }

    fn fetch_detail(&mut self, job: String) -> Command {
        self.failures.clear(&Request::Detail(job.clone()));
        self.pending += 1;
        let client = Arc::clone(&self.client);
        Command::perform(async move {
            let result = fetch(client.job_with_stages(&job)).await.map(Box::new);
            Action::Views(ViewsMsg::JobDetail { job, result })
        })
    }

    /// Re-fetch whatever the current level shows.
    fn reload(&mut self) -> Command {
        match self.mode {
            ViewsMode::List => self.fetch_views(),
            ViewsMode::Jobs => match self.current_view.clone() {
                Some(view) => self.fetch_jobs(view),
                None => Command::none(),
            },
            ViewsMode::JobDetail => match self.current_job.clone() {
                Some(job) => self.fetch_detail(job),
                None => Command::none(),
            },
        }
    }

    // ── Navigation ───────────────────────────────────────────────────

    fn enter(&mut self) -> Command {
        match self.mode {
            ViewsMode::List => {
                let views = self.visible_views();
                let Some(view) = self.view_sel.get(views.len()).map(|i| views[i].name.clone()) else {
                    return Command::none();
                };
                debug!(view = %view, "opening view");
                self.mode = ViewsMode::Jobs;
                self.current_view = Some(view.clone());
                self.job_sel = Selection::default();
                self.filter.clear();
                self.fetch_jobs(view)
            }
            ViewsMode::Jobs => {
                let jobs = self.visible_jobs();
                let Some(job) = self.job_sel.get(jobs.len()).map(|i| jobs[i].name.clone()) else {
                    return Command::none();
                };
                debug!(job = %job, "opening job");
                self.mode = ViewsMode::JobDetail;
                self.current_job = Some(job.clone());
                self.filter.clear();
                self.fetch_detail(job)
            }
            ViewsMode::JobDetail => Command::none(),
        }
    }

    fn back(&mut self) {
        match self.mode {
            ViewsMode::JobDetail => {
                self.mode = ViewsMode::Jobs;
                self.detail = None;
                if let Some(job) = self.current_job.take() {
                    self.failures.clear(&Request::Detail(job));
                }
            }
            ViewsMode::Jobs => {
                self.mode = ViewsMode::List;
                self.jobs = None;
                if let Some(view) = self.current_view.take() {
                    self.failures.clear(&Request::Jobs(view));
                }
                self.job_sel = Selection::default();
                self.filter.clear();
            }
            ViewsMode::List => self.filter.clear(),
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        let Some(prompt) = self.search.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => {
                self.search = None;
                self.filter.clear();
            }
            KeyCode::Enter => {
                self.filter = prompt.value().to_owned();
                self.search = None;
            }
            _ => {
                input::edit(prompt, key);
            }
        }
        let len = self.visible_len();
        if let Some(sel) = self.selection_mut() {
            sel.clamp(len);
        }
    }

    fn apply(&mut self, msg: ViewsMsg) {
        self.pending = self.pending.saturating_sub(1);
        let request = msg.request();
        if msg.is_ok() {
            self.failures.clear(&request);
        }
        match msg {
            ViewsMsg::Views(Ok(views)) => {
                self.views = views;
                let len = self.visible_views().len();
                self.view_sel.clamp(len);
            }
            ViewsMsg::Jobs {
                view,
                result: Ok(mut jobs),
            } => {
                sort_jobs_by_last_build(&mut jobs);
                self.jobs = Some(Keyed::new(view, jobs));
                let len = self.visible_jobs().len();
                self.job_sel.clamp(len);
            }
            ViewsMsg::JobDetail {
                job,
                result: Ok(detail),
            } => self.detail = Some(Keyed::new(job, *detail)),
            ViewsMsg::Views(Err(e))
            | ViewsMsg::Jobs { result: Err(e), .. }
            | ViewsMsg::JobDetail { result: Err(e), .. } => {
                warn!(?request, error = %e, "views fetch failed");
                self.failures.record(request, e);
            }
        }
    }

    // ── Rendering ────────────────────────────────────────────────────

    fn render_views(&self, frame: &mut Frame, area: Rect) {
        let views = self.visible_views();
        let block = panel(format!("Views ({})", views.len()), self.focused);
        if views.is_empty() {
            let text = if self.pending > 0 { "  loading views..." } else { "  no views" };
            frame.render_widget(Paragraph::new(placeholder(text)).block(block), area);
            return;
        }
        let rows: Vec<Row> = views
            .iter()
            .map(|v| {
                Row::new(vec![v.name.clone(), v.job_count().to_string()]).style(theme::table_row())
            })
            .collect();
        let table = Table::new(rows, [Constraint::Fill(1), Constraint::Length(8)])
            .header(Row::new(vec!["View", "Jobs"]).style(theme::table_header()))
            .row_highlight_style(theme::table_selected())
            .block(block);
        let mut state = TableState::default().with_selected(self.view_sel.get(views.len()));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn render_jobs(&self, frame: &mut Frame, area: Rect) {
        let view = self.current_view.as_deref().unwrap_or_default();
        if self.current_jobs().is_none() {
            let block = panel(view.to_owned(), self.focused);
            frame.render_widget(Paragraph::new(placeholder("  loading jobs...")).block(block), area);
            return;
        }
        let jobs = self.visible_jobs();
        let block = panel(format!("{view} ({})", jobs.len()), self.focused);
        let now = Utc::now();
        let rows: Vec<Row> = jobs
            .iter()
            .map(|job| {
                let (number, result, when, duration) = match &job.last_build {
                    Some(b) => (
                        format!("#{}", b.number),
                        b.status_text().to_owned(),
                        time_ago(b.timestamp, now),
                        format_duration(b.duration),
                    ),
                    None => ("-".into(), "-".into(), "-".into(), "-".into()),
                };
                let health = job
                    .health_score()
                    .map_or_else(|| "-".to_owned(), |s| format!("{s}%"));
                Row::new(vec![
                    Span::styled("●", Style::default().fg(theme::job_color(&job.color))),
                    Span::raw(job.name.clone()),
                    Span::raw(number),
                    Span::styled(result.clone(), theme::status_style(&result)),
                    Span::raw(when),
                    Span::raw(duration),
                    Span::raw(health),
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
                Constraint::Length(8),
                Constraint::Length(6),
            ],
        )
        .header(
            Row::new(vec!["", "Job", "Last", "Result", "When", "Duration", "Health"])
                .style(theme::table_header()),
        )
        .row_highlight_style(theme::table_selected())
        .block(block);
        let mut state = TableState::default().with_selected(self.job_sel.get(jobs.len()));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn render_detail(&self, frame: &mut Frame, area: Rect) {
        let name = self.current_job.as_deref().unwrap_or_default();
        let block = panel(name.to_owned(), self.focused);
        let Some(detail) = self.current_detail() else {
            frame.render_widget(Paragraph::new(placeholder("  loading job...")).block(block), area);
            return;
        };

        let now = Utc::now();
        let label = |text: &str| Span::styled(format!("{text:<16}"), theme::key_hint());
        let build_line = |title: &str, build: Option<&jenkins_api::BuildRef>| match build {
            Some(b) => Line::from(vec![
                label(title),
                Span::raw(format!("#{} ", b.number)),
                Span::styled(b.status_text().to_owned(), theme::status_style(b.status_text())),
                Span::raw(format!("  {}", time_ago(b.timestamp, now))),
            ]),
            None => Line::from(vec![label(title), Span::raw("-")]),
        };

        let mut lines = vec![
            Line::from(vec![
                label("Status"),
                Span::styled(
                    if detail.is_running() { "building" } else { "idle" },
                    Style::default().fg(theme::job_color(&detail.color)),
                ),
                Span::raw(if detail.in_queue { "  (queued)" } else { "" }),
                Span::raw(if detail.buildable { "" } else { "  (disabled)" }),
            ]),
            build_line("Last build", detail.last_build.as_ref()),
            build_line("Last success", detail.last_successful_build.as_ref()),
            build_line("Last failure", detail.last_failed_build.as_ref()),
        ];
        for report in &detail.health_report {
            lines.push(Line::from(vec![
                label("Health"),
                Span::raw(format!("{}%  {}", report.score, report.description)),
            ]));
        }
        if let Some(desc) = detail.description.as_deref().filter(|d| !d.is_empty()) {
            lines.push(Line::from(vec![label("Description"), Span::raw(desc.to_owned())]));
        }
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            format!("Recent builds ({})", detail.builds.len()),
            theme::title_style(),
        )));
        for build in detail.builds.iter().take(usize::from(area.height)) {
            let mut spans = vec![
                Span::raw(format!("  #{:<6}", build.number)),
                Span::styled(
                    format!("{:<10}", build.status_text()),
                    theme::status_style(build.status_text()),
                ),
                Span::raw(format!("{:<10}", format_duration(build.duration))),
            ];
            for stage in &build.stages {
                let status = stage.effective_status();
                spans.push(Span::styled(
                    format!("{} {}  ", theme::status_icon(status), stage.name),
                    theme::status_style(status),
                ));
            }
            lines.push(Line::from(spans));
        }

        frame.render_widget(
            Paragraph::new(lines).wrap(Wrap { trim: false }).block(block),
            area,
        );
    }

    fn breadcrumb(&self) -> Line<'static> {
        let mut spans = vec![Span::styled("Views", theme::title_style())];
        for part in [&self.current_view, &self.current_job].into_iter().flatten() {
            spans.push(Span::styled(" › ", theme::key_hint()));
            spans.push(Span::styled(
                part.clone(),
                Style::default().fg(theme::DIM_WHITE).add_modifier(Modifier::BOLD),
            ));
        }
        Line::from(spans)
    }
}

impl Component for ViewsTab {
    fn load(&mut self) -> Command {
        self.loaded = true;
        self.reload()
    }

    fn loaded(&self) -> bool {
        self.loaded
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Command> {
        if self.search.is_some() {
            self.handle_search_key(key);
            return Ok(Command::none());
        }

        let len = self.visible_len();
        let page = self.page();
        match key.code {
            KeyCode::Enter => return Ok(self.enter()),
            KeyCode::Esc => self.back(),
            KeyCode::Backspace if !self.filter.is_empty() => self.filter.clear(),
            KeyCode::Char('/') if self.mode != ViewsMode::JobDetail => {
                self.search = Some(Input::new(self.filter.clone()));
            }
            KeyCode::Char('r') => return Ok(self.reload()),
            code => {
                if let Some(sel) = self.selection_mut() {
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
        }
        let len = self.visible_len();
        if let Some(sel) = self.selection_mut() {
            sel.clamp(len);
        }
        Ok(Command::none())
    }

    fn update(&mut self, action: Action) -> Result<Command> {
        if let Action::Views(msg) = action {
            self.apply(msg);
        }
        Ok(Command::none())
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
        if let Some(prompt) = &self.search {
            frame.render_widget(Paragraph::new(input::prompt_line("/", prompt, true)), status);
        } else if let Some(err) = self.current_error() {
            render_error(frame, status, err);
        } else if self.pending > 0 {
            render_loading(frame, status, "Loading...", &self.throbber);
        } else if !self.filter.is_empty() {
            let filter = Input::new(self.filter.clone());
            frame.render_widget(Paragraph::new(input::prompt_line("filter: ", &filter, false)), status);
        }

        match self.mode {
            ViewsMode::List => self.render_views(frame, body),
            ViewsMode::Jobs => self.render_jobs(frame, body),
            ViewsMode::JobDetail => self.render_detail(frame, body),
        }
    }

    fn captures_input(&self) -> bool {
        self.search.is_some()
    }

    fn hints(&self) -> Vec<(&'static str, &'static str)> {
        if self.search.is_some() {
            return vec![("Enter", "apply"), ("Esc", "clear")];
        }
        match self.mode {
            ViewsMode::List => vec![("Enter", "open"), ("/", "filter"), ("r", "refresh")],
            ViewsMode::Jobs => vec![
                ("Enter", "detail"),
                ("Esc", "back"),
                ("/", "filter"),
                ("r", "refresh"),
            ],
            ViewsMode::JobDetail => vec![("Esc", "back"), ("r", "refresh")],
        }
    }

    fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    fn id(&self) -> &str {
        "views"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use jenkins_api::Error;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::tabs::offline_client;

    fn press(tab: &mut ViewsTab, code: KeyCode) -> Command {
        tab.handle_key_event(KeyEvent::from(code)).unwrap()
    }

    fn type_text(tab: &mut ViewsTab, text: &str) {
        for c in text.chars() {
            let _ = press(tab, KeyCode::Char(c));
        }
    }

    fn view(name: &str) -> View {
        View {
            name: name.into(),
            ..View::default()
        }
    }

    fn job(name: &str) -> Job {
        Job {
            name: name.into(),
            ..Job::default()
        }
    }

    fn deliver(tab: &mut ViewsTab, msg: ViewsMsg) {
        let _ = tab.update(Action::Views(msg)).unwrap();
    }

    fn loaded_tab() -> ViewsTab {
        let mut tab = ViewsTab::new(offline_client());
        let _ = tab.load();
        deliver(
            &mut tab,
            ViewsMsg::Views(Ok(vec![view("All"), view("Release"), view("Nightly")])),
        );
        tab
    }

    #[tokio::test]
    async fn drill_down_and_back() {
        let mut tab = loaded_tab();
        let _ = press(&mut tab, KeyCode::Char('j'));
        let cmd = press(&mut tab, KeyCode::Enter);
        assert_eq!(cmd.len(), 1);
        assert_eq!(tab.mode(), ViewsMode::Jobs);
        assert_eq!(tab.current_view.as_deref(), Some("Release"));
        assert!(tab.current_jobs().is_none());

        deliver(
            &mut tab,
            ViewsMsg::Jobs {
                view: "Release".into(),
                result: Ok(vec![job("deploy"), job("tag")]),
            },
        );
        assert_eq!(tab.visible_jobs().len(), 2);

        let cmd = press(&mut tab, KeyCode::Enter);
        assert_eq!(cmd.len(), 1);
        assert_eq!(tab.mode(), ViewsMode::JobDetail);
        deliver(
            &mut tab,
            ViewsMsg::JobDetail {
                job: "deploy".into(),
                result: Ok(Box::new(JobDetail {
                    name: "deploy".into(),
                    ..JobDetail::default()
                })),
            },
        );
        assert_eq!(tab.current_detail().unwrap().name, "deploy");

        let _ = press(&mut tab, KeyCode::Esc);
        assert_eq!(tab.mode(), ViewsMode::Jobs);
        assert!(tab.detail.is_none());
        assert!(tab.current_job.is_none());

        let _ = press(&mut tab, KeyCode::Esc);
        assert_eq!(tab.mode(), ViewsMode::List);
        assert!(tab.jobs.is_none());
        assert!(tab.current_view.is_none());
    }

    #[tokio::test]
    async fn late_jobs_for_another_view_are_not_shown() {
        let mut tab = loaded_tab();
        let _ = press(&mut tab, KeyCode::Enter); // All
        let _ = press(&mut tab, KeyCode::Esc);
        let _ = press(&mut tab, KeyCode::Char('j'));
        let _ = press(&mut tab, KeyCode::Enter); // Release

        deliver(
            &mut tab,
            ViewsMsg::Jobs {
                view: "All".into(),
                result: Ok(vec![job("stale")]),
            },
        );
        assert!(tab.current_jobs().is_none());
        assert!(tab.visible_jobs().is_empty());

        deliver(
            &mut tab,
            ViewsMsg::Jobs {
                view: "Release".into(),
                result: Ok(vec![job("fresh")]),
            },
        );
        let names: Vec<_> = tab.visible_jobs().iter().map(|j| j.name.clone()).collect();
        assert_eq!(names, ["fresh"]);
    }

    #[tokio::test]
    async fn filter_prompt_live_apply_and_clear() {
        let mut tab = loaded_tab();
        let _ = press(&mut tab, KeyCode::Char('/'));
        assert!(tab.captures_input());
        type_text(&mut tab, "NIGHT");
        let names: Vec<_> = tab.visible_views().iter().map(|v| v.name.clone()).collect();
        assert_eq!(names, ["Nightly"]);

        let _ = press(&mut tab, KeyCode::Enter);
        assert!(!tab.captures_input());
        assert_eq!(tab.filter, "NIGHT");
        assert_eq!(tab.visible_views().len(), 1);

        let _ = press(&mut tab, KeyCode::Backspace);
        assert_eq!(tab.visible_views().len(), 3);

        let _ = press(&mut tab, KeyCode::Char('/'));
        type_text(&mut tab, "rel");
        let _ = press(&mut tab, KeyCode::Esc);
        assert!(tab.filter.is_empty());
        assert_eq!(tab.visible_views().len(), 3);
    }

    #[tokio::test]
    async fn typing_q_in_prompt_is_text() {
        let mut tab = loaded_tab();
        let _ = press(&mut tab, KeyCode::Char('/'));
        type_text(&mut tab, "q");
        assert_eq!(tab.search.as_ref().unwrap().value(), "q");
    }

    #[tokio::test]
    async fn reload_targets_current_level() {
        let mut tab = loaded_tab();
        assert_eq!(press(&mut tab, KeyCode::Char('r')).len(), 1);
        let _ = press(&mut tab, KeyCode::Enter);
        assert_eq!(tab.load().len(), 1);
        assert_eq!(tab.pending, 3);
    }

    #[tokio::test]
    async fn errors_are_recorded_and_cleared_on_reload() {
        let mut tab = loaded_tab();
        deliver(&mut tab, ViewsMsg::Views(Err(Arc::new(Error::Authorization))));
        assert!(tab.current_error().is_some());
        assert_eq!(tab.views.len(), 3);
        let _ = press(&mut tab, KeyCode::Char('r'));
        assert!(tab.current_error().is_none());
    }

    #[tokio::test]
    async fn late_failure_for_another_view_is_not_shown() {
        let mut tab = loaded_tab();
        let _ = press(&mut tab, KeyCode::Enter); // All
        let _ = press(&mut tab, KeyCode::Esc);
        let _ = press(&mut tab, KeyCode::Char('j'));
        let _ = press(&mut tab, KeyCode::Enter); // Release
        deliver(
            &mut tab,
            ViewsMsg::Jobs {
                view: "Release".into(),
                result: Ok(vec![job("deploy")]),
            },
        );
        deliver(
            &mut tab,
            ViewsMsg::Jobs {
                view: "All".into(),
                result: Err(Arc::new(Error::Timeout { timeout_secs: 30 })),
            },
        );
        assert!(tab.current_error().is_none());
        assert_eq!(tab.visible_jobs().len(), 1);

        deliver(
            &mut tab,
            ViewsMsg::Jobs {
                view: "Release".into(),
                result: Err(Arc::new(Error::RateLimit)),
            },
        );
        assert!(tab.current_error().is_some());
        let _ = press(&mut tab, KeyCode::Esc);
        assert!(tab.current_error().is_none());
    }

    #[tokio::test]
    async fn paging_moves_a_third_of_the_height() {
        let mut tab = ViewsTab::new(offline_client());
        tab.resize(80, 30);
        deliver(
            &mut tab,
            ViewsMsg::Views(Ok((0..40).map(|i| view(&format!("v{i}"))).collect())),
        );
        let _ = press(&mut tab, KeyCode::PageDown);
        assert_eq!(tab.view_sel.index(), 10);
        let _ = press(&mut tab, KeyCode::End);
        assert_eq!(tab.view_sel.index(), 39);
        let _ = press(&mut tab, KeyCode::PageUp);
        assert_eq!(tab.view_sel.index(), 29);
    }
}
