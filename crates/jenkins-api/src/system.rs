// Server-level endpoints: root info, queue, nodes.

use std::time::Duration;

use reqwest::Method;
use serde::Deserialize;
use tracing::debug;

use crate::client::Client;
use crate::error::Error;
use crate::models::{Node, Queue, RootInfo, RunningBuild, running_builds};
use crate::paths::tree_param;

/// Deadline for the connection check.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct ComputerSet {
    #[serde(default)]
    computer: Vec<Node>,
}

impl Client {
    /// Basic server information.
    ///
    /// `GET /api/json?tree=mode,nodeDescription,...`
    pub async fn root_info(&self) -> Result<RootInfo, Error> {
        let path = format!(
            "/api/json?{}",
            tree_param(&[
                "mode",
                "nodeDescription",
                "nodeName",
                "numExecutors",
                "description",
                "useCrumbs",
                "useSecurity",
            ])
        );
        self.fetch_json(Method::GET, &path, None).await
    }

    /// Check connectivity and credentials with a short deadline.
    pub async fn test_connection(&self) -> Result<RootInfo, Error> {
        debug!(base_url = self.base_url(), "checking server");
        tokio::time::timeout(CONNECT_TIMEOUT, self.root_info())
            .await
            .map_err(|_| Error::Timeout {
                timeout_secs: CONNECT_TIMEOUT.as_secs(),
            })?
    }

    /// The build queue.
    ///
    /// `GET /queue/api/json?tree=items[...]`
    pub async fn queue(&self) -> Result<Queue, Error> {
        let path = format!(
            "/queue/api/json?{}",
            tree_param(&["items[id,task[name,url],why,inQueueSince,buildable,blocked,stuck]"])
        );
        self.fetch_json(Method::GET, &path, None).await
    }

    /// All nodes with their executors.
    ///
    /// `GET /computer/api/json?tree=computer[...]`
    pub async fn nodes(&self) -> Result<Vec<Node>, Error> {
        let path = format!(
            "/computer/api/json?{}",
            tree_param(&[
                "computer[displayName,offline,temporarilyOffline,numExecutors,\
                 executors[currentExecutable[url,number,displayName,fullDisplayName,timestamp,estimatedDuration],\
                 idle,likelyStuck,number,progress],assignedLabels[name],offlineCauseReason,idle,monitorData[*]]",
            ])
        );
        let set: ComputerSet = self.fetch_json(Method::GET, &path, None).await?;
        Ok(set.computer)
    }

    /// Builds currently occupying an executor, derived from [`Client::nodes`].
    pub async fn running_builds(&self) -> Result<Vec<RunningBuild>, Error> {
        let nodes = self.nodes().await?;
        Ok(running_builds(&nodes))
    }
}
