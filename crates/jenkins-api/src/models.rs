// Jenkins remote access API response types
//
// Every struct tolerates missing fields (`#[serde(default)]`) because the
// `tree=` selectors only return what was asked for, and fields Jenkins may
// send as `null` are `Option`s.

use serde::{Deserialize, Serialize};

// ── Root ────────────────────────────────────────────────────────────

/// Top-level server information from `/api/json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RootInfo {
    pub mode: String,
    pub node_description: Option<String>,
    pub node_name: String,
    pub num_executors: u32,
    pub description: Option<String>,
    pub use_crumbs: bool,
    pub use_security: bool,
}

// ── Views ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct View {
    pub name: String,
    pub url: String,
    /// Only names are requested; used for the job count.
    pub jobs: Vec<JobRef>,
}

impl View {
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobRef {
    pub name: String,
}

// ── Jobs ────────────────────────────────────────────────────────────

/// Job summary as listed by a view or the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Job {
    pub name: String,
    pub url: String,
    pub color: String,
    pub last_build: Option<BuildRef>,
    pub health_report: Vec<HealthReport>,
}

impl Job {
    /// A build is in progress (Jenkins animates the ball colour).
    pub fn is_running(&self) -> bool {
        is_animated_color(&self.color)
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self.color.as_str(), "disabled" | "disabled_anime")
    }

    /// Primary health score, or `None` if Jenkins reported none.
    pub fn health_score(&self) -> Option<i32> {
        self.health_report.first().map(|h| h.score)
    }

    /// Timestamp (ms) of the last build, `0` when the job never ran.
    pub fn last_build_timestamp(&self) -> i64 {
        self.last_build.as_ref().map_or(0, |b| b.timestamp)
    }
}

/// Full job detail from `/job/{name}/api/json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JobDetail {
    pub name: String,
    pub url: String,
    pub color: String,
    pub description: Option<String>,
    pub buildable: bool,
    pub in_queue: bool,
    pub last_build: Option<BuildRef>,
    pub last_successful_build: Option<BuildRef>,
    pub last_failed_build: Option<BuildRef>,
    pub health_report: Vec<HealthReport>,
    pub builds: Vec<BuildRef>,
}

impl JobDetail {
    pub fn is_running(&self) -> bool {
        is_animated_color(&self.color)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HealthReport {
    pub description: String,
    pub score: i32,
}

// ── Builds ──────────────────────────────────────────────────────────

/// Build summary embedded in job payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildRef {
    pub number: u32,
    pub result: Option<String>,
    pub timestamp: i64,
    pub duration: i64,
    pub url: String,
    pub building: bool,
    /// Filled client-side from the pipeline run, never sent by Jenkins here.
    pub stages: Vec<Stage>,
}

impl BuildRef {
    pub fn status_text(&self) -> &str {
        status_text(self.building, self.result.as_deref())
    }
}

/// Build detail from `/job/{name}/{number}/api/json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Build {
    pub number: u32,
    pub result: Option<String>,
    pub timestamp: i64,
    pub duration: i64,
    pub estimated_duration: i64,
    pub url: String,
    pub building: bool,
    pub display_name: String,
    pub description: Option<String>,
    pub executor: Option<Executor>,
    pub artifacts: Vec<Artifact>,
    pub change_sets: Vec<ChangeSet>,
    pub causes: Vec<BuildCause>,
    pub actions: Vec<BuildAction>,
}

impl Build {
    /// `RUNNING`, the result, or `UNKNOWN`.
    pub fn status_text(&self) -> &str {
        status_text(self.building, self.result.as_deref())
    }

    /// Causes listed at the top level or nested in actions.
    pub fn all_causes(&self) -> impl Iterator<Item = &BuildCause> {
        self.causes
            .iter()
            .chain(self.actions.iter().flat_map(|a| a.causes.iter()))
    }

    /// Estimated completion percentage of a running build, relative to
    /// `now_ms`. Finished builds report 100.
    pub fn progress(&self, now_ms: i64) -> u8 {
        if !self.building {
            return 100;
        }
        progress_percent(self.timestamp, self.estimated_duration, now_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildAction {
    pub causes: Vec<BuildCause>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildCause {
    pub short_description: String,
    pub user_name: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Artifact {
    pub file_name: String,
    pub relative_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeSet {
    pub items: Vec<ChangeItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangeItem {
    pub msg: String,
    pub author: Author,
    pub commit_id: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Author {
    pub full_name: String,
}

// ── Pipelines ───────────────────────────────────────────────────────

/// A pipeline run with its stages, from either the Workflow API or Blue
/// Ocean.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineRun {
    pub id: String,
    pub name: String,
    pub status: String,
    pub start_time_millis: i64,
    pub end_time_millis: i64,
    pub duration_millis: i64,
    pub stages: Vec<Stage>,
}

/// One pipeline stage. Accepts both Workflow API and Blue Ocean field names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Stage {
    pub id: String,
    #[serde(alias = "displayName")]
    pub name: String,
    pub status: String,
    pub result: Option<String>,
    pub state: Option<String>,
    pub start_time_millis: i64,
    #[serde(alias = "durationInMillis")]
    pub duration_millis: i64,
    pub exec_node: Option<String>,
}

impl Stage {
    /// Normalized status: Blue Ocean sends `state`/`result` instead of
    /// `status`.
    pub fn effective_status(&self) -> &str {
        if !self.status.is_empty() {
            return &self.status;
        }
        match (self.state.as_deref(), self.result.as_deref()) {
            (Some("RUNNING"), _) => "IN_PROGRESS",
            (_, Some(result)) if !result.is_empty() => result,
            (Some(state), _) => state,
            _ => "UNKNOWN",
        }
    }
}

/// Workflow API `wfapi/describe` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct WfApiRun {
    pub id: String,
    pub name: String,
    pub status: String,
    pub start_time_millis: i64,
    pub end_time_millis: i64,
    pub duration_millis: i64,
    pub stages: Vec<WfApiStage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct WfApiStage {
    pub id: String,
    pub name: String,
    pub exec_node: Option<String>,
    pub status: String,
    pub start_time_millis: i64,
    pub duration_millis: i64,
}

impl PipelineRun {
    pub(crate) fn from_wfapi(run: WfApiRun) -> Self {
        let stages = run
            .stages
            .into_iter()
            .map(|s| Stage {
                id: s.id,
                name: s.name,
                result: Some(s.status.clone()),
                status: s.status,
                state: None,
                start_time_millis: s.start_time_millis,
                duration_millis: s.duration_millis,
                exec_node: s.exec_node.filter(|n| !n.is_empty()),
            })
            .collect();
        Self {
            id: run.id,
            name: run.name,
            status: run.status,
            start_time_millis: run.start_time_millis,
            end_time_millis: run.end_time_millis,
            duration_millis: run.duration_millis,
            stages,
        }
    }
}

impl PipelineRun {
    /// Assemble a run from bare Blue Ocean stage nodes: stages are ordered by
    /// start time, the overall status is derived from them, and the time
    /// span runs from the first stage's start to the last stage's end.
    pub fn from_stages(id: String, mut stages: Vec<Stage>) -> Self {
        sort_stages_by_start_time(&mut stages);

        let mut status = String::new();
        for stage in &stages {
            match stage.effective_status() {
                "FAILED" | "FAILURE" => {
                    status = "FAILED".into();
                    break;
                }
                "RUNNING" | "IN_PROGRESS" => status = "RUNNING".into(),
                "UNSTABLE" if status != "RUNNING" => status = "UNSTABLE".into(),
                other if status.is_empty() => status = other.to_owned(),
                _ => {}
            }
        }

        let (start, end) = match (stages.first(), stages.last()) {
            (Some(first), Some(last)) => (
                first.start_time_millis,
                last.start_time_millis + last.duration_millis,
            ),
            _ => (0, 0),
        };

        Self {
            name: id.clone(),
            id,
            status,
            start_time_millis: start,
            end_time_millis: end,
            duration_millis: end - start,
            stages,
        }
    }
}

// ── Queue ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Queue {
    pub items: Vec<QueueItem>,
}

impl Queue {
    pub fn blocked_count(&self) -> usize {
        self.items.iter().filter(|i| i.blocked).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueItem {
    pub id: i64,
    pub task: TaskRef,
    pub why: Option<String>,
    pub in_queue_since: i64,
    pub buildable: bool,
    pub blocked: bool,
    pub stuck: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskRef {
    pub name: String,
    pub url: String,
}

// ── Nodes ───────────────────────────────────────────────────────────

/// A controller or agent from `/computer/api/json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Node {
    pub display_name: String,
    pub offline: bool,
    pub temporarily_offline: bool,
    pub num_executors: u32,
    pub executors: Vec<Executor>,
    pub assigned_labels: Vec<Label>,
    pub offline_cause_reason: Option<String>,
    pub idle: bool,
    pub monitor_data: serde_json::Map<String, serde_json::Value>,
}

impl Node {
    /// Executors currently running something.
    pub fn busy_executors(&self) -> usize {
        self.executors.iter().filter(|e| e.is_busy()).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Executor {
    pub current_executable: Option<ExecutableRef>,
    pub idle: bool,
    pub likely_stuck: bool,
    pub number: u32,
    pub progress: i32,
}

impl Executor {
    pub fn is_busy(&self) -> bool {
        self.current_executable
            .as_ref()
            .is_some_and(|e| !e.url.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutableRef {
    pub url: String,
    pub number: u32,
    pub display_name: String,
    pub full_display_name: String,
    pub timestamp: i64,
    pub estimated_duration: i64,
}

impl ExecutableRef {
    /// Estimated completion percentage relative to `now_ms`, clamped to
    /// `0..=100`.
    pub fn progress(&self, now_ms: i64) -> u8 {
        progress_percent(self.timestamp, self.estimated_duration, now_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Label {
    pub name: String,
}

/// A build currently occupying an executor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunningBuild {
    pub url: String,
    pub number: u32,
    pub node_name: String,
    pub full_display_name: String,
    pub timestamp: i64,
    pub estimated_duration: i64,
}

impl RunningBuild {
    pub fn progress(&self, now_ms: i64) -> u8 {
        progress_percent(self.timestamp, self.estimated_duration, now_ms)
    }
}

/// Collect the builds running on any executor of `nodes`.
pub fn running_builds(nodes: &[Node]) -> Vec<RunningBuild> {
    nodes
        .iter()
        .flat_map(|node| {
            node.executors
                .iter()
                .filter_map(|e| e.current_executable.as_ref())
                .filter(|exe| !exe.url.is_empty())
                .map(|exe| RunningBuild {
                    url: exe.url.clone(),
                    number: exe.number,
                    node_name: node.display_name.clone(),
                    full_display_name: exe.full_display_name.clone(),
                    timestamp: exe.timestamp,
                    estimated_duration: exe.estimated_duration,
                })
        })
        .collect()
}

// ── Crumb ───────────────────────────────────────────────────────────

/// `/crumbIssuer/api/json` payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CrumbResponse {
    pub crumb: String,
    pub crumb_request_field: String,
}

// ── Helpers ─────────────────────────────────────────────────────────

fn is_animated_color(color: &str) -> bool {
    matches!(
        color,
        "blue_anime"
            | "red_anime"
            | "yellow_anime"
            | "grey_anime"
            | "aborted_anime"
            | "notbuilt_anime"
    )
}

fn status_text(building: bool, result: Option<&str>) -> &str {
    if building {
        return "RUNNING";
    }
    match result {
        Some(r) if !r.is_empty() => r,
        _ => "UNKNOWN",
    }
}

fn progress_percent(started_ms: i64, estimated_ms: i64, now_ms: i64) -> u8 {
    if estimated_ms <= 0 || started_ms <= 0 {
        return 0;
    }
    let pct = ((now_ms - started_ms) * 100 / estimated_ms).clamp(0, 100);
    u8::try_from(pct).unwrap_or(100)
}

/// Most recently built first; jobs that never ran go last.
pub fn sort_jobs_by_last_build(jobs: &mut [Job]) {
    jobs.sort_by_key(|j| std::cmp::Reverse(j.last_build_timestamp()));
}

/// Highest build number first.
pub fn sort_builds_by_number(builds: &mut [BuildRef]) {
    builds.sort_by_key(|b| std::cmp::Reverse(b.number));
}

/// Earliest stage first.
pub fn sort_stages_by_start_time(stages: &mut [Stage]) {
    stages.sort_by_key(|s| s.start_time_millis);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn job_tolerates_null_last_build_and_missing_fields() {
        let job: Job = serde_json::from_value(json!({
            "name": "app",
            "color": "blue_anime",
            "lastBuild": null
        }))
        .unwrap();
        assert!(job.is_running());
        assert!(!job.is_disabled());
        assert_eq!(job.health_score(), None);
        assert_eq!(job.last_build_timestamp(), 0);
    }

    #[test]
    fn build_status_text() {
        let mut build: Build = serde_json::from_value(json!({
            "number": 7, "result": null, "building": true
        }))
        .unwrap();
        assert_eq!(build.status_text(), "RUNNING");
        build.building = false;
        assert_eq!(build.status_text(), "UNKNOWN");
        build.result = Some("SUCCESS".into());
        assert_eq!(build.status_text(), "SUCCESS");
    }

    #[test]
    fn causes_merge_top_level_and_actions() {
        let build: Build = serde_json::from_value(json!({
            "causes": [{"shortDescription": "Started by timer"}],
            "actions": [{}, {"causes": [{"shortDescription": "Started by user bob", "userId": "bob"}]}]
        }))
        .unwrap();
        let causes: Vec<_> = build.all_causes().map(|c| c.short_description.as_str()).collect();
        assert_eq!(causes, ["Started by timer", "Started by user bob"]);
    }

    #[test]
    fn progress_is_clamped() {
        let exe = ExecutableRef {
            timestamp: 1_000,
            estimated_duration: 1_000,
            ..ExecutableRef::default()
        };
        assert_eq!(exe.progress(1_500), 50);
        assert_eq!(exe.progress(9_000), 100);
        assert_eq!(exe.progress(500), 0);
        assert_eq!(ExecutableRef::default().progress(9_000), 0);
    }

    #[test]
    fn running_builds_come_from_busy_executors() {
        let nodes: Vec<Node> = serde_json::from_value(json!([
            {
                "displayName": "built-in",
                "executors": [
                    {"currentExecutable": {"url": "http://ci/job/a/3/", "number": 3}},
                    {"currentExecutable": null, "idle": true}
                ]
            },
            {"displayName": "agent-1", "executors": [{"currentExecutable": {"url": ""}}]}
        ]))
        .unwrap();

        assert_eq!(nodes[0].busy_executors(), 1);
        assert_eq!(nodes[1].busy_executors(), 0);
        let running = running_builds(&nodes);
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].node_name, "built-in");
        assert_eq!(running[0].number, 3);
    }

    #[test]
    fn sorting_helpers() {
        let mut builds = vec![
            BuildRef { number: 2, ..BuildRef::default() },
            BuildRef { number: 10, ..BuildRef::default() },
            BuildRef { number: 5, ..BuildRef::default() },
        ];
        sort_builds_by_number(&mut builds);
        let numbers: Vec<_> = builds.iter().map(|b| b.number).collect();
        assert_eq!(numbers, [10, 5, 2]);

        let mut jobs = vec![
            Job { name: "never".into(), ..Job::default() },
            Job {
                name: "new".into(),
                last_build: Some(BuildRef { timestamp: 200, ..BuildRef::default() }),
                ..Job::default()
            },
            Job {
                name: "old".into(),
                last_build: Some(BuildRef { timestamp: 100, ..BuildRef::default() }),
                ..Job::default()
            },
        ];
        sort_jobs_by_last_build(&mut jobs);
        let names: Vec<_> = jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, ["new", "old", "never"]);
    }

    #[test]
    fn blue_ocean_stages_derive_run_status_and_span() {
        let stages: Vec<Stage> = serde_json::from_value(json!([
            {"id": "9", "displayName": "Test", "result": "UNSTABLE", "state": "FINISHED",
             "startTimeMillis": 2_000, "durationInMillis": 500},
            {"id": "5", "displayName": "Build", "result": "SUCCESS", "state": "FINISHED",
             "startTimeMillis": 1_000, "durationInMillis": 800}
        ]))
        .unwrap();

        let run = PipelineRun::from_stages("42".into(), stages);
        assert_eq!(run.stages[0].name, "Build");
        assert_eq!(run.status, "UNSTABLE");
        assert_eq!(run.start_time_millis, 1_000);
        assert_eq!(run.end_time_millis, 2_500);
        assert_eq!(run.duration_millis, 1_500);
    }

    #[test]
    fn failed_stage_wins_over_running() {
        let stage = |status: &str| Stage { status: status.into(), ..Stage::default() };
        let run = PipelineRun::from_stages(
            "1".into(),
            vec![stage("IN_PROGRESS"), stage("FAILED"), stage("SUCCESS")],
        );
        assert_eq!(run.status, "FAILED");
    }

    #[test]
    fn wfapi_stage_result_mirrors_status() {
        let wf: WfApiRun = serde_json::from_value(json!({
            "id": "12", "name": "#12", "status": "SUCCESS",
            "stages": [{"id": "6", "name": "Checkout", "status": "SUCCESS", "execNode": ""}]
        }))
        .unwrap();
        let run = PipelineRun::from_wfapi(wf);
        assert_eq!(run.stages[0].result.as_deref(), Some("SUCCESS"));
        assert_eq!(run.stages[0].exec_node, None);
    }
}
