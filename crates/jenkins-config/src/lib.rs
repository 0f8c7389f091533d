//! Configuration for jenkins-tui.
//!
//! A single TOML profile (server URL, credentials, tuning knobs) layered
//! with `JENKINS_TUI_`-prefixed environment variables, plus the
//! translation into a [`jenkins_api::Session`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use jenkins_api::Session;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 15;
pub const DEFAULT_AUTO_REFRESH_SECONDS: u64 = 10;
/// Refresh intervals shorter than this fall back to the default.
pub const MIN_AUTO_REFRESH_SECONDS: u64 = 5;
pub const DEFAULT_MAX_BUILDS_PER_JOB: usize = 200;
pub const DEFAULT_MAX_LOG_BYTES: usize = 200_000;
pub const DEFAULT_RATE_LIMIT_RPS: u32 = 5;

const FILE_HEADER: &str = "# Jenkins TUI Configuration\n\n";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub profile: Profile,
}

impl Config {
    /// URL, username and token are all present.
    pub fn is_configured(&self) -> bool {
        self.profile.is_configured()
    }
}

/// Connection profile for one Jenkins server.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Profile {
    /// Server root, e.g. `https://jenkins.example.com`.
    pub base_url: String,
    pub username: String,
    /// API token (plaintext in the file).
    pub api_token: String,
    pub insecure_skip_tls_verify: bool,
    pub timeout_seconds: u64,
    pub auto_refresh_seconds: u64,
    pub max_builds_per_job: usize,
    pub max_log_bytes: usize,
    pub rate_limit_rps: u32,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            api_token: String::new(),
            insecure_skip_tls_verify: false,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            auto_refresh_seconds: DEFAULT_AUTO_REFRESH_SECONDS,
            max_builds_per_job: DEFAULT_MAX_BUILDS_PER_JOB,
            max_log_bytes: DEFAULT_MAX_LOG_BYTES,
            rate_limit_rps: DEFAULT_RATE_LIMIT_RPS,
        }
    }
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("api_token", &"[REDACTED]")
            .field("insecure_skip_tls_verify", &self.insecure_skip_tls_verify)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("auto_refresh_seconds", &self.auto_refresh_seconds)
            .field("rate_limit_rps", &self.rate_limit_rps)
            .finish_non_exhaustive()
    }
}

impl Profile {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            api_token: api_token.into(),
            ..Self::default()
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.username.is_empty() && !self.api_token.is_empty()
    }

    /// Check required fields and replace zero tuning values with defaults.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::Missing { field: "base_url" });
        }
        if self.username.is_empty() {
            return Err(ConfigError::Missing { field: "username" });
        }
        if self.api_token.is_empty() {
            return Err(ConfigError::Missing { field: "api_token" });
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Validation {
                field: "base_url".into(),
                reason: "must start with http:// or https://".into(),
            });
        }

        if self.timeout_seconds == 0 {
            self.timeout_seconds = DEFAULT_TIMEOUT_SECONDS;
        }
        if self.auto_refresh_seconds == 0 {
            self.auto_refresh_seconds = DEFAULT_AUTO_REFRESH_SECONDS;
        }
        if self.max_builds_per_job == 0 {
            self.max_builds_per_job = DEFAULT_MAX_BUILDS_PER_JOB;
        }
        if self.max_log_bytes == 0 {
            self.max_log_bytes = DEFAULT_MAX_LOG_BYTES;
        }
        if self.rate_limit_rps == 0 {
            self.rate_limit_rps = DEFAULT_RATE_LIMIT_RPS;
        }
        Ok(())
    }

    /// Auto-refresh period; anything under five seconds means the default.
    pub fn refresh_interval(&self) -> Duration {
        let secs = if self.auto_refresh_seconds < MIN_AUTO_REFRESH_SECONDS {
            DEFAULT_AUTO_REFRESH_SECONDS
        } else {
            self.auto_refresh_seconds
        };
        Duration::from_secs(secs)
    }

    /// Build the API session for this profile.
    pub fn to_session(&self) -> Result<Session, jenkins_api::Error> {
        let rps = if self.rate_limit_rps == 0 {
            DEFAULT_RATE_LIMIT_RPS
        } else {
            self.rate_limit_rps
        };
        Ok(Session::new(
            &self.base_url,
            self.username.clone(),
            SecretString::from(self.api_token.clone()),
        )?
        .with_timeout(Duration::from_secs(self.timeout_seconds))
        .with_requests_per_second(rps)
        .with_verify_tls(!self.insecure_skip_tls_verify))
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "jenkins-tui").map_or_else(
        || PathBuf::from(".jenkins-tui").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Loading & saving ────────────────────────────────────────────────

/// Load the config from `path` layered over defaults and under the
/// environment (`JENKINS_TUI_PROFILE__BASE_URL`, ...). A missing file is
/// not an error.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("JENKINS_TUI_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Serialize `cfg` to TOML at `path`, creating the parent directory.
pub fn save_config(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, format!("{FILE_HEADER}{toml_str}"))?;
    debug!(path = %path.display(), "config saved");
    Ok(())
}

// ── Persistence seam ────────────────────────────────────────────────

/// Where the app persists the profile entered in the setup wizard.
pub trait ConfigStore: Send {
    fn save(&self, config: &Config) -> Result<(), ConfigError>;
}

/// [`ConfigStore`] backed by a TOML file.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileConfigStore {
    fn save(&self, config: &Config) -> Result<(), ConfigError> {
        save_config(&self.path, config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let profile = Profile::default();
        assert_eq!(profile.timeout_seconds, 15);
        assert_eq!(profile.auto_refresh_seconds, 10);
        assert_eq!(profile.max_builds_per_job, 200);
        assert_eq!(profile.max_log_bytes, 200_000);
        assert_eq!(profile.rate_limit_rps, 5);
        assert!(!Config::default().is_configured());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.profile.timeout_seconds, 15);
        assert!(cfg.profile.base_url.is_empty());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[profile]\nbase_url = \"https://ci.example.com\"\nusername = \"bob\"\n\
             api_token = \"tok\"\nmax_builds_per_job = 100\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert!(cfg.is_configured());
        assert_eq!(cfg.profile.max_builds_per_job, 100);
        assert_eq!(cfg.profile.rate_limit_rps, 5);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.profile = Profile::new("https://ci.example.com", "bob", "tok");
        cfg.profile.insecure_skip_tls_verify = true;

        FileConfigStore::new(&path).save(&cfg).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# Jenkins TUI Configuration"));
        assert!(text.contains("[profile]"));

        assert_eq!(load_config(&path).unwrap(), cfg);
    }

    #[test]
    fn validate_requires_credentials() {
        let mut profile = Profile::new("https://ci", "", "tok");
        assert!(matches!(
            profile.validate(),
            Err(ConfigError::Missing { field: "username" })
        ));

        let mut profile = Profile::new("ci.example.com", "bob", "tok");
        assert!(matches!(
            profile.validate(),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn validate_fills_zero_values() {
        let mut profile = Profile::new("https://ci", "bob", "tok");
        profile.timeout_seconds = 0;
        profile.rate_limit_rps = 0;
        profile.validate().unwrap();
        assert_eq!(profile.timeout_seconds, 15);
        assert_eq!(profile.rate_limit_rps, 5);
    }

    #[test]
    fn short_refresh_interval_uses_default() {
        let mut profile = Profile::default();
        profile.auto_refresh_seconds = 2;
        assert_eq!(profile.refresh_interval(), Duration::from_secs(10));
        profile.auto_refresh_seconds = 30;
        assert_eq!(profile.refresh_interval(), Duration::from_secs(30));
    }

    #[test]
    fn to_session_applies_tuning() {
        let mut profile = Profile::new("https://ci.example.com/", "bob", "tok");
        profile.timeout_seconds = 20;
        profile.rate_limit_rps = 8;
        profile.insecure_skip_tls_verify = true;

        let session = profile.to_session().unwrap();
        assert_eq!(session.base_url(), "https://ci.example.com");
        assert_eq!(session.timeout(), Duration::from_secs(20));
        assert_eq!(session.requests_per_second(), 8);
        assert!(!session.verify_tls());
    }

    #[test]
    fn debug_redacts_token() {
        let profile = Profile::new("https://ci", "bob", "hunter2");
        assert!(!format!("{profile:?}").contains("hunter2"));
    }
}
