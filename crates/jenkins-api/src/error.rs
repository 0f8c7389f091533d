use thiserror::Error;

/// Top-level error type for the `jenkins-api` crate.
///
/// Every failure a [`Client`](crate::Client) call can produce. The TUI keeps
/// the variant intact (wrapped in an `Arc`) so it can tell a bad token from a
/// flaky network when rendering inline errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Session ─────────────────────────────────────────────────────
    /// Missing or invalid session parameters.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Base URL or joined request path does not parse.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Authentication ──────────────────────────────────────────────
    /// The server answered 401: wrong username or API token.
    #[error("Authentication failed: check username and API token")]
    Authentication,

    /// The server answered 403 and crumb negotiation could not fix it.
    #[error("Access forbidden: check the user's permissions")]
    Authorization,

    // ── Response ────────────────────────────────────────────────────
    /// Unexpected non-2xx status, with a truncated body.
    #[error("Unexpected HTTP {status}: {body}")]
    Protocol { status: u16, body: String },

    /// Malformed response body, with the raw body for debugging.
    #[error("Decode error: {message}")]
    Decode { message: String, body: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport failure (connection refused, DNS, TLS, ...).
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request deadline exceeded.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Deadline exceeded while waiting for a rate-limit token.
    #[error("Rate limit: no request slot available before the deadline")]
    RateLimit,
}

impl Error {
    /// Returns `true` for credential or permission failures, which a
    /// refresh will not fix.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Authentication | Self::Authorization)
    }

    /// Returns `true` if a user-initiated refresh might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::RateLimit => true,
            Self::Protocol { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Classify a transport error, folding reqwest's own timeouts into
    /// [`Error::Timeout`].
    pub(crate) fn from_transport(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout { timeout_secs }
        } else {
            Self::Network(err)
        }
    }
}

/// Truncate a response body to at most `max` characters for error messages.
pub(crate) fn truncate_body(body: &str, max: usize) -> String {
    match body.char_indices().nth(max) {
        Some((idx, _)) => body[..idx].to_owned(),
        None => body.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_body_respects_char_boundaries() {
        assert_eq!(truncate_body("héllo", 2), "hé");
        assert_eq!(truncate_body("short", 200), "short");
    }

    #[test]
    fn auth_failures_are_not_transient() {
        assert!(Error::Authentication.is_auth_failure());
        assert!(!Error::Authorization.is_transient());
        assert!(Error::RateLimit.is_transient());
        assert!(
            Error::Protocol {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
    }
}
