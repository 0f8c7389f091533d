// jenkins-api: Async Rust client for the Jenkins remote access API

pub mod builds;
pub mod client;
pub mod error;
pub mod jobs;
pub mod models;
pub mod paths;
pub mod rate_limit;
pub mod session;
pub mod system;
pub mod transport;

pub use builds::STAGE_LOG_MAX_BYTES;
pub use client::{Client, Crumb, CrumbState};
pub use error::Error;
pub use jobs::STAGE_ENRICH_LIMIT;
pub use models::{
    Artifact, Build, BuildCause, BuildRef, ChangeItem, Executor, HealthReport, Job, JobDetail,
    Node, PipelineRun, Queue, QueueItem, RootInfo, RunningBuild, Stage, View,
};
pub use rate_limit::RateLimiter;
pub use reqwest::Method;
pub use session::Session;
pub use system::CONNECT_TIMEOUT;
pub use transport::{TlsMode, TransportConfig};
