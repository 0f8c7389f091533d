//! `jenkins-tui`: terminal console for a Jenkins server.
//!
//! Three tabs (Dashboard, Views, Builds) over the Jenkins remote access API,
//! with a first-run setup wizard and optional auto-refresh.
//!
//! Logs go to a file (default under the user cache directory) so they never
//! corrupt the terminal.

mod action;
mod app;
mod command;
mod component;
mod event;
mod refresh;
mod screen;
mod setup;
mod tabs;
mod theme;
mod tui;
mod widgets;

use std::path::{Path, PathBuf};

use clap::Parser;
use color_eyre::eyre::Result;
use directories::ProjectDirs;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use jenkins_config::{Config, FileConfigStore};

use crate::app::App;

/// Terminal console for browsing and triggering Jenkins jobs.
#[derive(Parser, Debug)]
#[command(name = "jenkins-tui", version, about)]
struct Cli {
    /// Jenkins base URL (e.g. https://ci.example.com)
    #[arg(short = 'u', long, env = "JENKINS_URL")]
    url: Option<String>,

    /// Jenkins username
    #[arg(long, env = "JENKINS_USER")]
    username: Option<String>,

    /// API token for the user
    #[arg(short = 't', long, env = "JENKINS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(long)]
    insecure: bool,

    /// Config file path (defaults to the platform config directory)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Log file path (defaults to the platform cache directory)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Flags and env vars win over the config file.
    fn apply_overrides(&self, config: &mut Config) {
        let profile = &mut config.profile;
        if let Some(url) = &self.url {
            profile.base_url = url.trim_end_matches('/').to_owned();
        }
        if let Some(user) = &self.username {
            profile.username.clone_from(user);
        }
        if let Some(token) = &self.token {
            profile.api_token.clone_from(token);
        }
        if self.insecure {
            profile.insecure_skip_tls_verify = true;
        }
    }
}

fn default_log_file() -> PathBuf {
    ProjectDirs::from("", "", "jenkins-tui")
        .map_or_else(std::env::temp_dir, |dirs| dirs.cache_dir().to_path_buf())
        .join("jenkins-tui.log")
}

/// File-based tracing; stdout belongs to the terminal UI. The returned guard
/// must live until exit so buffered lines are flushed.
fn setup_tracing(log_file: &Path, verbose: u8) -> Result<WorkerGuard> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "jenkins_tui={level},jenkins_api={level},jenkins_config={level}"
        ))
    });

    let dir = log_file.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let name = log_file
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("jenkins-tui.log"));

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tui::install_hooks()?;

    let log_file = cli.log_file.clone().unwrap_or_else(default_log_file);
    let _log_guard = setup_tracing(&log_file, cli.verbose)?;

    let config_path = cli.config.clone().unwrap_or_else(jenkins_config::config_path);
    let mut config = jenkins_config::load_config(&config_path)?;
    cli.apply_overrides(&mut config);

    info!(
        config = %config_path.display(),
        configured = config.is_configured(),
        "starting jenkins-tui"
    );

    let store = FileConfigStore::new(config_path);
    App::new(config, Box::new(store)).run().await
}
