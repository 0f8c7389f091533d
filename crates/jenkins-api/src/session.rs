// Immutable connection parameters for one Jenkins server.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::error::Error;
use crate::transport::{TlsMode, TransportConfig};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default request rate.
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 5;

/// Base URL, credentials and request policy for a [`Client`](crate::Client).
///
/// Validated once in [`Session::new`]; the client owns it for its whole
/// lifetime and never mutates it.
#[derive(Debug, Clone)]
pub struct Session {
    base_url: String,
    username: String,
    token: SecretString,
    timeout: Duration,
    requests_per_second: u32,
    verify_tls: bool,
}

impl Session {
    /// Create a session with default timeout, rate and TLS verification.
    ///
    /// The base URL must be `http` or `https`; a trailing `/` is trimmed.
    pub fn new(
        base_url: &str,
        username: impl Into<String>,
        token: SecretString,
    ) -> Result<Self, Error> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(Error::Configuration {
                message: "base URL is required".into(),
            });
        }
        let parsed = Url::parse(trimmed)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Configuration {
                message: format!("unsupported URL scheme '{}'", parsed.scheme()),
            });
        }

        let username = username.into();
        if username.trim().is_empty() {
            return Err(Error::Configuration {
                message: "username is required".into(),
            });
        }
        if secrecy::ExposeSecret::expose_secret(&token).is_empty() {
            return Err(Error::Configuration {
                message: "API token is required".into(),
            });
        }

        Ok(Self {
            base_url: trimmed.to_owned(),
            username,
            token,
            timeout: DEFAULT_TIMEOUT,
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            verify_tls: true,
        })
    }

    /// Override the per-request timeout. Zero keeps the default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.timeout = timeout;
        }
        self
    }

    /// Override the request rate. Zero is rejected by [`Client::new`](crate::Client::new).
    pub fn with_requests_per_second(mut self, rps: u32) -> Self {
        self.requests_per_second = rps;
        self
    }

    /// Enable or disable TLS certificate verification.
    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn token(&self) -> &SecretString {
        &self.token
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn requests_per_second(&self) -> u32 {
        self.requests_per_second
    }

    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    /// Transport settings derived from this session.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: if self.verify_tls {
                TlsMode::Verify
            } else {
                TlsMode::DangerAcceptInvalid
            },
            timeout: self.timeout,
        }
    }
}
