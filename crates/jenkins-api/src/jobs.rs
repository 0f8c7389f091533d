// View and job endpoints.
//
// Job names may be folder-nested (`team/app`); every path goes through
// `encode_job_path` so nested names become `/job/team/job/app`.

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::client::Client;
use crate::error::Error;
use crate::models::{Job, JobDetail, View};
use crate::paths::{encode_job_path, tree_param};

/// At most this many of a job's newest builds get pipeline stages attached.
pub const STAGE_ENRICH_LIMIT: usize = 10;

/// Job summary selector shared by the root and view listings.
const JOBS_TREE: &str = "jobs[name,url,color,lastBuild[number,result,timestamp,duration],healthReport[description,score]]";

#[derive(Deserialize)]
struct ViewList {
    #[serde(default)]
    views: Vec<View>,
}

#[derive(Deserialize)]
struct JobList {
    #[serde(default)]
    jobs: Vec<Job>,
}

impl Client {
    /// All views with their job names.
    ///
    /// `GET /api/json?tree=views[name,url,jobs[name]]`
    pub async fn views(&self) -> Result<Vec<View>, Error> {
        let path = format!("/api/json?{}", tree_param(&["views[name,url,jobs[name]]"]));
        let list: ViewList = self.fetch_json(Method::GET, &path, None).await?;
        Ok(list.views)
    }

    /// Jobs of one view.
    ///
    /// `GET /view/{view}/api/json?tree=jobs[...]`
    pub async fn view_jobs(&self, view: &str) -> Result<Vec<Job>, Error> {
        let path = format!(
            "/view/{}/api/json?{}",
            encode_job_path(view),
            tree_param(&[JOBS_TREE])
        );
        let list: JobList = self.fetch_json(Method::GET, &path, None).await?;
        Ok(list.jobs)
    }

    /// Every top-level job.
    ///
    /// `GET /api/json?tree=jobs[...]`
    pub async fn all_jobs(&self) -> Result<Vec<Job>, Error> {
        let path = format!("/api/json?{}", tree_param(&[JOBS_TREE]));
        let list: JobList = self.fetch_json(Method::GET, &path, None).await?;
        Ok(list.jobs)
    }

    /// Job detail with its build history.
    ///
    /// `GET /job/{name}/api/json?tree=name,url,...,builds[...]`
    pub async fn job(&self, name: &str) -> Result<JobDetail, Error> {
        let path = format!(
            "/job/{}/api/json?{}",
            encode_job_path(name),
            tree_param(&[
                "name",
                "url",
                "color",
                "description",
                "buildable",
                "inQueue",
                "lastBuild[number,result,timestamp,duration,url]",
                "lastSuccessfulBuild[number,timestamp]",
                "lastFailedBuild[number,timestamp]",
                "healthReport[description,score]",
                "builds[number,result,timestamp,duration,url]",
            ])
        );
        self.fetch_json(Method::GET, &path, None).await
    }

    /// Job detail whose newest builds carry their pipeline stages.
    ///
    /// Stage lookups run one after another and stop after
    /// [`STAGE_ENRICH_LIMIT`] builds; builds without a pipeline run keep an
    /// empty stage list.
    pub async fn job_with_stages(&self, name: &str) -> Result<JobDetail, Error> {
        let mut detail = self.job(name).await?;
        for build in detail.builds.iter_mut().take(STAGE_ENRICH_LIMIT) {
            if let Some(run) = self.pipeline_run(name, build.number).await {
                build.stages = run.stages;
            }
        }
        Ok(detail)
    }

    /// Queue a new build of a job.
    ///
    /// `POST /job/{name}/build`, answered with 201 (or 200 on old servers).
    pub async fn trigger_build(&self, name: &str) -> Result<(), Error> {
        let path = format!("/job/{}/build", encode_job_path(name));
        debug!(job = name, "triggering build");
        let resp = self.send(Method::POST, &path, None).await?;
        match resp.status() {
            StatusCode::CREATED | StatusCode::OK => Ok(()),
            other => Err(Error::Protocol {
                status: other.as_u16(),
                body: format!("unexpected status {} triggering build", other.as_u16()),
            }),
        }
    }
}
