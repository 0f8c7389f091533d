// Jenkins HTTP client
//
// Wraps `reqwest::Client` with basic auth, the shared rate limiter, status
// classification and the lazy crumb (CSRF) handshake. Endpoint methods live
// in sibling modules as inherent impls so this file only deals with
// transport mechanics.

use std::sync::{PoisonError, RwLock};

use reqwest::header::ACCEPT;
use reqwest::{Method, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, truncate_body};
use crate::models::CrumbResponse;
use crate::rate_limit::RateLimiter;
use crate::session::Session;

/// Crumb issuer endpoint.
const CRUMB_ISSUER_PATH: &str = "/crumbIssuer/api/json";

/// Error bodies are cut to this many characters.
const ERROR_BODY_LIMIT: usize = 200;

/// A CSRF crumb: the header name Jenkins expects and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crumb {
    pub field: String,
    pub value: String,
}

/// Negotiation state of the client's crumb.
///
/// `Untested` until the first mutating request is refused with 403; then
/// `Fetching` while the issuer is asked once, ending in `Valid` or
/// `Unavailable` for the rest of the client's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CrumbState {
    #[default]
    Untested,
    Fetching,
    Valid(Crumb),
    Unavailable,
}

/// Authenticated, rate-limited client for one Jenkins server.
///
/// Cheap to share behind an `Arc`: the crumb cache and the limiter are
/// internally synchronized, everything else is immutable.
pub struct Client {
    http: reqwest::Client,
    session: Session,
    limiter: RateLimiter,
    crumb: RwLock<CrumbState>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.session.base_url())
            .field("username", &self.session.username())
            .field("crumb", &self.crumb_state())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Build a client for `session`.
    pub fn new(session: Session) -> Result<Self, Error> {
        if session.requests_per_second() == 0 {
            return Err(Error::Configuration {
                message: "requests per second must be at least 1".into(),
            });
        }
        let http = session.transport().build_client()?;
        Ok(Self {
            http,
            limiter: RateLimiter::new(session.requests_per_second()),
            session,
            crumb: RwLock::new(CrumbState::Untested),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        self.session.base_url()
    }

    /// Snapshot of the crumb negotiation state.
    pub fn crumb_state(&self) -> CrumbState {
        self.crumb
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ── Public fetch primitives ──────────────────────────────────────

    /// Send a request and decode the JSON response body.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, Error> {
        let resp = self.send(method, path, body).await?;
        self.decode_json(resp).await
    }

    /// Send a request and return at most `max_bytes` of the body as text.
    ///
    /// The body is streamed and the connection dropped once the cap is hit,
    /// so multi-megabyte console logs never land in memory whole.
    pub async fn fetch_text(
        &self,
        method: Method,
        path: &str,
        max_bytes: usize,
    ) -> Result<String, Error> {
        let mut resp = self.send(method, path, None).await?;
        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(|e| self.transport_error(e))? {
            let remaining = max_bytes.saturating_sub(buf.len());
            if chunk.len() >= remaining {
                buf.extend_from_slice(&chunk[..remaining]);
                break;
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    // ── Request pipeline ─────────────────────────────────────────────

    /// Send a request, running crumb negotiation on a refused mutating
    /// request. Returns the response only if its status is 2xx.
    ///
    /// One deadline covers every exchange this makes: the first attempt,
    /// the crumb issuer call and the retry.
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, Error> {
        let url = self.url(path)?;
        let mutating = !matches!(method, Method::GET | Method::HEAD);
        let crumb = if mutating { self.cached_crumb() } else { None };
        let deadline = Instant::now() + self.session.timeout();

        let resp = self.attempt(&method, &url, body, crumb.as_ref(), deadline).await?;
        if !mutating || resp.status() != StatusCode::FORBIDDEN {
            return Self::check_status(resp).await;
        }

        if crumb.is_some() {
            warn!(%method, path, "request refused even with a crumb");
            return Err(Error::Authorization);
        }

        let Some(crumb) = self.negotiate_crumb(deadline).await else {
            return Err(Error::Authorization);
        };

        debug!(%method, path, "retrying with crumb");
        let retry = self.attempt(&method, &url, body, Some(&crumb), deadline).await?;
        if retry.status() == StatusCode::FORBIDDEN {
            warn!(%method, path, "retry with crumb refused");
            return Err(Error::Authorization);
        }
        Self::check_status(retry).await
    }

    /// One rate-limited HTTP exchange bounded by the caller's `deadline`,
    /// which covers both the wait for a token and the call itself.
    async fn attempt(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&serde_json::Value>,
        crumb: Option<&Crumb>,
        deadline: Instant,
    ) -> Result<Response, Error> {
        self.limiter.acquire(deadline).await?;

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(self.timeout_error());
        }

        debug!(%method, path = url.path(), crumb = crumb.is_some(), "sending request");

        let mut builder = self
            .http
            .request(method.clone(), url.clone())
            .basic_auth(
                self.session.username(),
                Some(self.session.token().expose_secret()),
            )
            .header(ACCEPT, "application/json")
            .timeout(remaining);
        if let Some(crumb) = crumb {
            builder = builder.header(crumb.field.as_str(), crumb.value.as_str());
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        builder.send().await.map_err(|e| self.transport_error(e))
    }

    /// Map non-2xx statuses onto the error taxonomy.
    async fn check_status(resp: Response) -> Result<Response, Error> {
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication);
        }

        if status == StatusCode::FORBIDDEN {
            return Err(Error::Authorization);
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Protocol {
                status: status.as_u16(),
                body: truncate_body(&body, ERROR_BODY_LIMIT),
            });
        }

        Ok(resp)
    }

    async fn decode_json<T: DeserializeOwned>(&self, resp: Response) -> Result<T, Error> {
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_str(&body).map_err(|e| Error::Decode {
            message: format!("{e} (body preview: {:?})", truncate_body(&body, ERROR_BODY_LIMIT)),
            body,
        })
    }

    // ── Crumb negotiation ────────────────────────────────────────────

    fn cached_crumb(&self) -> Option<Crumb> {
        match &*self.crumb.read().unwrap_or_else(PoisonError::into_inner) {
            CrumbState::Valid(crumb) => Some(crumb.clone()),
            _ => None,
        }
    }

    /// Obtain a crumb after a mutating request was refused without one.
    ///
    /// Only the first caller that finds the state `Untested` talks to the
    /// issuer. A crumb that became valid meanwhile is handed out as is;
    /// `Fetching` and `Unavailable` yield `None`.
    async fn negotiate_crumb(&self, deadline: Instant) -> Option<Crumb> {
        {
            let mut state = self.crumb.write().unwrap_or_else(PoisonError::into_inner);
            match &*state {
                CrumbState::Valid(crumb) => return Some(crumb.clone()),
                CrumbState::Fetching | CrumbState::Unavailable => return None,
                CrumbState::Untested => {}
            }
            *state = CrumbState::Fetching;
        }

        let mut pending = FetchingGuard {
            crumb: &self.crumb,
            armed: true,
        };
        let outcome = self.fetch_crumb(deadline).await;
        pending.armed = false;
        drop(pending);

        let mut state = self.crumb.write().unwrap_or_else(PoisonError::into_inner);
        match outcome {
            Ok(crumb) => {
                info!(field = %crumb.field, "crumb negotiated");
                *state = CrumbState::Valid(crumb.clone());
                Some(crumb)
            }
            Err(e) => {
                warn!(error = %e, "crumb issuer unavailable");
                *state = CrumbState::Unavailable;
                None
            }
        }
    }

    /// Single read-only call to the crumb issuer.
    async fn fetch_crumb(&self, deadline: Instant) -> Result<Crumb, Error> {
        let url = self.url(CRUMB_ISSUER_PATH)?;
        let resp = self.attempt(&Method::GET, &url, None, None, deadline).await?;
        let resp = Self::check_status(resp).await?;
        let issued: CrumbResponse = self.decode_json(resp).await?;
        if issued.crumb.is_empty() || issued.crumb_request_field.is_empty() {
            return Err(Error::Decode {
                message: "crumb issuer returned an empty crumb".into(),
                body: String::new(),
            });
        }
        Ok(Crumb {
            field: issued.crumb_request_field,
            value: issued.crumb,
        })
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// Join a request path (starting with `/`) onto the base URL.
    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(Url::parse(&format!("{}{path}", self.session.base_url()))?)
    }

    fn timeout_error(&self) -> Error {
        Error::Timeout {
            timeout_secs: self.session.timeout().as_secs(),
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        Error::from_transport(err, self.session.timeout().as_secs())
    }
}

/// A negotiation dropped mid-flight counts as failed: the issuer is never
/// asked twice, and the state must not stay `Fetching`.
struct FetchingGuard<'a> {
    crumb: &'a RwLock<CrumbState>,
    armed: bool,
}

impl Drop for FetchingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.crumb.write().unwrap_or_else(PoisonError::into_inner);
        if *state == CrumbState::Fetching {
            warn!("crumb negotiation abandoned");
            *state = CrumbState::Unavailable;
        }
    }
}
