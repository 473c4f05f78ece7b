// BigDB HTTP client
//
// Owns the authenticated reqwest session and turns path-level verbs into
// requests against the three API namespaces. Retry and timeout policy are
// applied here, in `send`, and every non-2xx answer is normalized into
// `Error::Http` before callers see it.

use std::sync::{Arc, Mutex, PoisonError};

use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tracing::{Instrument, Span, debug, trace, warn};
use url::Url;

use crate::error::Error;
use crate::fabric::Fabric;
use crate::path::PathNode;
use crate::predicate::Literal;
use crate::retry::{RetryPolicy, RetrySpec};
use crate::timeout::{Timeout, TimeoutSpec};
use crate::transport::TransportConfig;

pub const DATA_PREFIX: &str = "/api/v1/data/";
pub const RPC_PREFIX: &str = "/api/v1/rpc/";
pub const SCHEMA_PREFIX: &str = "/api/v1/schema/";

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_cookie";

/// Name of the top-level tree every path starts from.
pub const ROOT: &str = "controller";

/// How the current session was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// No authentication was performed.
    Anonymous,
    /// Username/password login; `close()` logs out.
    Interactive,
    /// Long-lived token; `close()` leaves it alone.
    Token,
    /// `close()` already ran.
    Closed,
}

/// Per-request knobs: query parameters and timeout override.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub params: Vec<(String, String)>,
    pub timeout: TimeoutSpec,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: impl Into<TimeoutSpec>) -> Self {
        self.timeout = timeout.into();
        self
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    description: Option<String>,
}

/// Client for a controller's BigDB REST API.
///
/// Created by [`connect`](crate::connect) (or [`BigDbClient::new`] for a
/// pre-authenticated session). Navigate with [`root`](Self::root) and the
/// returned [`PathNode`]s; the path-level verbs below are what those nodes
/// delegate to.
pub struct BigDbClient {
    http: reqwest::Client,
    base_url: Url,
    cookie_jar: Arc<Jar>,
    default_timeout: Timeout,
    retry: RetryPolicy,
    session: Mutex<SessionKind>,
    span: Span,
}

impl std::fmt::Debug for BigDbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigDbClient")
            .field("base_url", &self.base_url.as_str())
            .field("default_timeout", &self.default_timeout)
            .field("retry", &self.retry)
            .field("session", &self.session_kind())
            .finish_non_exhaustive()
    }
}

impl BigDbClient {
    /// Create an unauthenticated client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::from_parts(
            http,
            base_url,
            Arc::clone(&transport.cookie_jar),
            SessionKind::Anonymous,
        ))
    }

    pub(crate) fn from_parts(
        http: reqwest::Client,
        base_url: Url,
        cookie_jar: Arc<Jar>,
        session: SessionKind,
    ) -> Self {
        let span = tracing::info_span!("bigdb", url = %base_url);
        Self {
            http,
            base_url,
            cookie_jar,
            default_timeout: Timeout::Forever,
            retry: RetryPolicy::none(),
            session: Mutex::new(session),
            span,
        }
    }

    /// Set the timeout used when a request does not override it.
    pub fn with_timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.default_timeout = timeout.into();
        self
    }

    /// Install the retry policy for every request of this client.
    pub fn with_retries(mut self, retries: impl Into<RetrySpec>) -> Self {
        self.retry = retries.into().into_policy();
        self
    }

    /// Run this client's requests inside `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// The root of the tree (`controller`).
    pub fn root(&self) -> PathNode<'_> {
        PathNode::new(ROOT, self)
    }

    /// A node at an already-rendered path (e.g. `controller/core/switch`).
    pub fn node(&self, path: impl Into<String>) -> PathNode<'_> {
        PathNode::new(path, self)
    }

    /// Switch-fabric helpers built on top of the generic path API.
    pub fn fabric(&self) -> Fabric<'_> {
        Fabric::new(self)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn default_timeout(&self) -> Timeout {
        self.default_timeout
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn session_kind(&self) -> SessionKind {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The `Cookie` header the jar would send to the API path.
    pub fn cookie_header(&self) -> Option<String> {
        let url = self.base_url.join("/api/").ok()?;
        let cookies = self.cookie_jar.cookies(&url)?;
        cookies.to_str().ok().map(String::from)
    }

    /// The current session token, if the jar holds one.
    pub fn session_cookie(&self) -> Option<String> {
        let header = self.cookie_header()?;
        header.split(';').find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE).then(|| value.to_owned())
        })
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}{prefix}{path}`, with `?` and `#` inside predicates escaped so
    /// they stay part of the path.
    pub(crate) fn url(&self, prefix: &str, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/').replace('?', "%3F").replace('#', "%23");
        Url::parse(&format!("{base}{prefix}{path}")).map_err(Error::InvalidUrl)
    }

    // ── Path-level verbs ─────────────────────────────────────────────

    /// GET a data path and return its JSON document.
    pub async fn get(&self, path: &str, options: &RequestOptions) -> Result<Value, Error> {
        let url = self.url(DATA_PREFIX, path)?;
        let resp = self.send(Method::GET, url, None, options).await?;
        json_body(resp).await
    }

    pub async fn post(
        &self,
        path: &str,
        data: &(impl Serialize + ?Sized),
        options: &RequestOptions,
    ) -> Result<Option<Value>, Error> {
        self.mutate(Method::POST, path, Some(to_value(data)?), options)
            .await
    }

    pub async fn put(
        &self,
        path: &str,
        data: &(impl Serialize + ?Sized),
        options: &RequestOptions,
    ) -> Result<Option<Value>, Error> {
        self.mutate(Method::PUT, path, Some(to_value(data)?), options)
            .await
    }

    pub async fn patch(
        &self,
        path: &str,
        data: &(impl Serialize + ?Sized),
        options: &RequestOptions,
    ) -> Result<Option<Value>, Error> {
        self.mutate(Method::PATCH, path, Some(to_value(data)?), options)
            .await
    }

    pub async fn delete(
        &self,
        path: &str,
        options: &RequestOptions,
    ) -> Result<Option<Value>, Error> {
        self.mutate(Method::DELETE, path, None, options).await
    }

    /// Invoke an RPC.
    ///
    /// 204 yields `None`; 202 (accepted, async) yields the body only if it
    /// parses, and `None` otherwise.
    pub async fn rpc(
        &self,
        path: &str,
        data: Option<&Value>,
        options: &RequestOptions,
    ) -> Result<Option<Value>, Error> {
        let url = self.url(RPC_PREFIX, path)?;
        let resp = self.send(Method::POST, url, data.cloned(), options).await?;

        match resp.status() {
            StatusCode::NO_CONTENT => Ok(None),
            StatusCode::ACCEPTED => {
                let body = resp.text().await.unwrap_or_default();
                Ok(serde_json::from_str(&body).ok())
            }
            _ => optional_json_body(resp).await,
        }
    }

    /// Fetch the schema describing the subtree at `path`.
    pub async fn schema(&self, path: &str, options: &RequestOptions) -> Result<Value, Error> {
        let url = self.url(SCHEMA_PREFIX, path)?;
        let resp = self.send(Method::GET, url, None, options).await?;
        json_body(resp).await
    }

    /// End the session.
    ///
    /// Only username/password sessions are logged out, by deleting the
    /// server-side session entry for our cookie. Tokens are never revoked.
    /// Later calls are no-ops.
    pub async fn close(&self) -> Result<(), Error> {
        let previous = {
            let mut guard = self.session.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, SessionKind::Closed)
        };

        if previous != SessionKind::Interactive {
            debug!(session = ?previous, "close: nothing to log out");
            return Ok(());
        }

        let Some(token) = self.session_cookie() else {
            debug!("close: no session cookie present");
            return Ok(());
        };

        debug!("logging out");
        self.root()
            .child("core")
            .child("aaa")
            .child("session")
            .filter("auth-token=$t", [("t", Literal::from(token))])
            .delete()
            .await?;
        debug!("logout complete");
        Ok(())
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn mutate(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: &RequestOptions,
    ) -> Result<Option<Value>, Error> {
        let url = self.url(DATA_PREFIX, path)?;
        let resp = self.send(method, url, body, options).await?;
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        optional_json_body(resp).await
    }

    /// Issue a request under the client's retry policy and return the
    /// successful response.
    ///
    /// Each attempt gets the full resolved timeout. Connection failures and
    /// forcelisted statuses are retried while the policy allows; once it is
    /// exhausted the last outcome is returned (status errors normalized).
    pub(crate) async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
        options: &RequestOptions,
    ) -> Result<Response, Error> {
        let timeout = options.timeout.resolve(self.default_timeout);

        async {
            let mut retries = 0;
            loop {
                let mut builder = self.http.request(method.clone(), url.clone());
                if !options.params.is_empty() {
                    builder = builder.query(&options.params);
                }
                if let Some(ref body) = body {
                    builder = builder.json(body);
                }
                builder = timeout.apply(builder);

                debug!(%method, %url, attempt = retries + 1, ?timeout, "request");
                if let Some(ref body) = body {
                    trace!(%body, "request body");
                }

                match builder.send().await {
                    Ok(resp) => {
                        let status = resp.status();
                        debug!(%method, %url, %status, "response");
                        trace!(headers = ?resp.headers(), "response headers");

                        if self.retry.should_retry_status(&method, status, retries) {
                            retries += 1;
                            warn!(%method, %url, %status, retry = retries, "retrying on status");
                            tokio::time::sleep(self.retry.backoff(retries)).await;
                            continue;
                        }
                        return check_status(resp).await;
                    }
                    Err(e)
                        if (e.is_connect() || e.is_timeout())
                            && self.retry.should_retry_connection(&method, retries) =>
                    {
                        retries += 1;
                        warn!(%method, %url, error = %e, retry = retries, "retrying after transport error");
                        tokio::time::sleep(self.retry.backoff(retries)).await;
                    }
                    Err(e) => return Err(Error::Transport(e)),
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }
}

// ── Response helpers ─────────────────────────────────────────────────

/// Pass 2xx responses through; turn anything else into `Error::Http`,
/// carrying the server's `description` when the body has one.
pub(crate) async fn check_status(resp: Response) -> Result<Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let url = resp.url().to_string();
    let body = resp.text().await.unwrap_or_default();
    let description = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.description);

    debug!(%status, %url, ?description, "request failed");
    Err(Error::Http {
        status,
        url,
        description,
    })
}

async fn json_body(resp: Response) -> Result<Value, Error> {
    let body = resp.text().await.map_err(Error::Transport)?;
    parse_json(body)
}

/// Empty bodies are `None`; anything else must be JSON.
async fn optional_json_body(resp: Response) -> Result<Option<Value>, Error> {
    let body = resp.text().await.map_err(Error::Transport)?;
    if body.trim().is_empty() {
        return Ok(None);
    }
    parse_json(body).map(Some)
}

fn parse_json(body: String) -> Result<Value, Error> {
    serde_json::from_str(&body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body,
        }
    })
}

fn to_value(data: &(impl Serialize + ?Sized)) -> Result<Value, Error> {
    serde_json::to_value(data).map_err(Error::Serialization)
}
