// Build, console log and pipeline endpoints.
//
// Pipeline data comes from the Workflow API (`wfapi`) first and from Blue
// Ocean when the plugin is missing or the call fails.

use reqwest::Method;
use tracing::debug;

use crate::client::Client;
use crate::error::Error;
use crate::models::{Build, PipelineRun, Stage, WfApiRun};
use crate::paths::{encode_job_path, encode_segment, tree_param};

/// Byte cap for stage logs.
pub const STAGE_LOG_MAX_BYTES: usize = 500_000;

fn build_path(job: &str, number: u32) -> String {
    format!("/job/{}/{number}", encode_job_path(job))
}

fn blue_ocean_run_path(job: &str, number: u32) -> String {
    format!(
        "/blue/rest/organizations/jenkins/pipelines/{}/runs/{number}",
        encode_job_path(job)
    )
}

impl Client {
    /// Build detail.
    ///
    /// `GET /job/{name}/{number}/api/json?tree=number,result,...`
    pub async fn build(&self, job: &str, number: u32) -> Result<Build, Error> {
        let path = format!(
            "{}/api/json?{}",
            build_path(job, number),
            tree_param(&[
                "number",
                "result",
                "timestamp",
                "duration",
                "estimatedDuration",
                "url",
                "building",
                "displayName",
                "description",
                "executor[currentExecutable[url]]",
                "artifacts[fileName,relativePath]",
                "changeSets[items[msg,author[fullName],commitId,timestamp]]",
                "causes[shortDescription,userName,userId]",
            ])
        );
        self.fetch_json(Method::GET, &path, None).await
    }

    /// Console output, truncated to `max_bytes`.
    ///
    /// `GET /job/{name}/{number}/consoleText`
    pub async fn build_log(&self, job: &str, number: u32, max_bytes: usize) -> Result<String, Error> {
        let path = format!("{}/consoleText", build_path(job, number));
        self.fetch_text(Method::GET, &path, max_bytes).await
    }

    /// Log of one pipeline stage.
    ///
    /// `GET /job/{name}/{number}/execution/node/{id}/wfapi/log`, falling back
    /// to the Blue Ocean node log.
    pub async fn stage_log(&self, job: &str, number: u32, stage_id: &str) -> Result<String, Error> {
        let node = encode_segment(stage_id);
        let wfapi = format!("{}/execution/node/{node}/wfapi/log", build_path(job, number));
        match self.fetch_text(Method::GET, &wfapi, STAGE_LOG_MAX_BYTES).await {
            Ok(log) => Ok(log),
            Err(e) => {
                debug!(error = %e, job, number, stage_id, "wfapi stage log failed, trying Blue Ocean");
                let blue = format!("{}/nodes/{node}/log/", blue_ocean_run_path(job, number));
                self.fetch_text(Method::GET, &blue, STAGE_LOG_MAX_BYTES).await
            }
        }
    }

    /// Pipeline run with stages, or `None` if neither the Workflow API nor
    /// Blue Ocean can describe this build (e.g. a freestyle job).
    pub async fn pipeline_run(&self, job: &str, number: u32) -> Option<PipelineRun> {
        let wfapi = format!("{}/wfapi/describe", build_path(job, number));
        match self.fetch_json::<WfApiRun>(Method::GET, &wfapi, None).await {
            Ok(run) => return Some(PipelineRun::from_wfapi(run)),
            Err(e) => debug!(error = %e, job, number, "wfapi describe failed, trying Blue Ocean"),
        }

        let blue = format!("{}/nodes/", blue_ocean_run_path(job, number));
        match self.fetch_json::<Vec<Stage>>(Method::GET, &blue, None).await {
            Ok(stages) => Some(PipelineRun::from_stages(number.to_string(), stages)),
            Err(e) => {
                debug!(error = %e, job, number, "no pipeline data for build");
                None
            }
        }
    }
}
