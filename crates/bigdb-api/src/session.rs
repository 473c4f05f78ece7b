// Session establishment
//
// Resolves the controller's base URL, performs the login handshake that
// matches the controller's generation, and hands back a ready
// `BigDbClient`. Handshake requests run on the client default timeout and
// are never retried.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, SET_COOKIE};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{Instrument, Span, debug, warn};
use url::Url;

use crate::client::{BigDbClient, SESSION_COOKIE, SessionKind, check_status};
use crate::error::Error;
use crate::retry::RetrySpec;
use crate::timeout::Timeout;
use crate::transport::{TlsMode, TransportConfig};

/// Health-check budget per discovery candidate.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

const HEALTH_PATH: &str = "/api/v1/auth/healthy";
const MODERN_LOGIN_SCHEMA: &str = "/api/v2/schema/controller/root/core/aaa/session/login";
const MODERN_LOGIN: &str = "/api/v1/rpc/controller/core/aaa/session/login";
const LEGACY_LOGIN: &str = "/api/v1/auth/login";
const AUTH_CONTEXT: &str = "/api/v1/data/controller/core/aaa/auth-context";

/// Scheme/port pairs probed, in order, when the host has no scheme.
pub fn default_candidates() -> Vec<(String, u16)> {
    vec![("https".into(), 8443), ("http".into(), 8080)]
}

/// How to authenticate.
#[derive(Debug, Clone, Default)]
pub enum Credentials {
    /// Connect without logging in.
    #[default]
    None,
    /// Username/password login; the session is logged out on close.
    Password {
        username: String,
        password: SecretString,
    },
    /// Pre-issued session token; validated but never revoked.
    Token(SecretString),
}

/// Options for [`connect`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub credentials: Credentials,
    pub skip_auth: bool,
    pub tls: TlsMode,
    pub timeout: Timeout,
    pub retries: RetrySpec,
    pub headers: Vec<(String, String)>,
    pub span: Option<Span>,
    pub user_agent: Option<String>,
    pub candidates: Vec<(String, u16)>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            credentials: Credentials::None,
            skip_auth: false,
            tls: TlsMode::default(),
            timeout: Timeout::Forever,
            retries: RetrySpec::default(),
            headers: Vec::new(),
            span: None,
            user_agent: None,
            candidates: default_candidates(),
        }
    }
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Credentials::Password {
            username: username.into(),
            password: SecretString::from(password.into()),
        };
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.credentials = Credentials::Token(SecretString::from(token.into()));
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Connect without authenticating, even if credentials are set.
    pub fn skip_auth(mut self, skip: bool) -> Self {
        self.skip_auth = skip;
        self
    }

    pub fn tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    /// `true` checks certificates against the system store; `false` accepts
    /// anything.
    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.tls = if verify {
            TlsMode::System
        } else {
            TlsMode::DangerAcceptInvalid
        };
        self
    }

    /// Default timeout for every request of the resulting client.
    pub fn timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.timeout = timeout.into();
        self
    }

    pub fn retries(mut self, retries: impl Into<RetrySpec>) -> Self {
        self.retries = retries.into();
        self
    }

    /// Add a header sent with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn session_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Span the client's requests are recorded under.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Replace the scheme/port pairs probed during discovery.
    pub fn candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = (S, u16)>,
        S: Into<String>,
    {
        self.candidates = candidates
            .into_iter()
            .map(|(scheme, port)| (scheme.into(), port))
            .collect();
        self
    }
}

/// Progress of [`connect`], logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    UrlUnresolved,
    UrlResolved,
    Authenticating,
    Authenticated,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UrlUnresolved => "url-unresolved",
            Self::UrlResolved => "url-resolved",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

struct Tracker(SessionState);

impl Tracker {
    fn advance(&mut self, next: SessionState) {
        debug!(from = %self.0, to = %next, "session state");
        self.0 = next;
    }

    fn fail<T>(&mut self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(ref e) = result {
            warn!(state = %self.0, error = %e, "session setup failed");
            self.advance(SessionState::Failed);
        }
        result
    }
}

/// Connect to the controller at `host` and authenticate.
///
/// `host` is either a full base URL (`https://ctl:8443`), used as-is, or a
/// bare host name / address, in which case the HTTPS and HTTP API ports are
/// probed in turn.
pub async fn connect(host: &str, options: ConnectOptions) -> Result<BigDbClient, Error> {
    let span = options
        .span
        .clone()
        .unwrap_or_else(|| tracing::info_span!("bigdb", host = %host));

    establish(host, options, span.clone()).instrument(span).await
}

async fn establish(host: &str, options: ConnectOptions, span: Span) -> Result<BigDbClient, Error> {
    let mut state = Tracker(SessionState::UrlUnresolved);

    let jar = Arc::new(Jar::default());
    let mut transport = TransportConfig {
        tls: options.tls.clone(),
        cookie_jar: Arc::clone(&jar),
        headers: state.fail(header_map(&options.headers))?,
        connect_timeout: match options.timeout {
            Timeout::Split { connect, .. } => Some(connect),
            _ => None,
        },
        ..TransportConfig::default()
    };
    if let Some(ref ua) = options.user_agent {
        transport.user_agent.clone_from(ua);
    }
    let http = state.fail(transport.build_client())?;

    let base_url = state.fail(resolve_base_url(&transport, host, &options.candidates).await)?;
    state.advance(SessionState::UrlResolved);
    debug!(%base_url, "using base url");

    let handshake = Handshake {
        http: &http,
        jar: &jar,
        base_url: &base_url,
        timeout: options.timeout,
    };

    let kind = match (&options.credentials, options.skip_auth) {
        (_, true) | (Credentials::None, _) => {
            debug!("connecting without authentication");
            SessionKind::Anonymous
        }
        (Credentials::Token(token), false) => {
            state.advance(SessionState::Authenticating);
            state.fail(handshake.token(token).await)?;
            SessionKind::Token
        }
        (Credentials::Password { username, password }, false) => {
            state.advance(SessionState::Authenticating);
            state.fail(handshake.login(username, password).await)?;
            SessionKind::Interactive
        }
    };
    state.advance(SessionState::Authenticated);

    Ok(BigDbClient::from_parts(http, base_url, jar, kind)
        .with_timeout(options.timeout)
        .with_retries(options.retries)
        .with_span(span))
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, Error> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Header(format!("{name}: {e}")))?;
        let value =
            HeaderValue::from_str(value).map_err(|e| Error::Header(format!("{name}: {e}")))?;
        map.append(name, value);
    }
    Ok(map)
}

// ── Discovery ────────────────────────────────────────────────────────

/// `scheme://host:port`, bracketing bare IPv6 addresses.
fn candidate_url(scheme: &str, host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("{scheme}://[{host}]:{port}")
    } else {
        format!("{scheme}://{host}:{port}")
    }
}

/// Health checks run on their own client; a short connect budget must not
/// cut into the per-candidate health-check deadline.
fn discovery_transport(transport: &TransportConfig) -> TransportConfig {
    TransportConfig {
        connect_timeout: None,
        ..transport.clone()
    }
}

async fn resolve_base_url(
    transport: &TransportConfig,
    host: &str,
    candidates: &[(String, u16)],
) -> Result<Url, Error> {
    if host.starts_with("http://") || host.starts_with("https://") {
        return Ok(Url::parse(host.trim_end_matches('/'))?);
    }

    let http = discovery_transport(transport).build_client()?;

    for (scheme, port) in candidates {
        let base = candidate_url(scheme, host, *port);
        let probe = format!("{base}{HEALTH_PATH}");
        debug!(%probe, "probing");

        match http.get(&probe).timeout(PROBE_TIMEOUT).send().await {
            Ok(resp) if resp.status() == StatusCode::OK => return Ok(Url::parse(&base)?),
            Ok(resp) => warn!(%probe, status = %resp.status(), "health check refused"),
            Err(e) => warn!(%probe, error = %e, "health check failed"),
        }
    }

    Err(Error::NoService { host: host.into() })
}

// ── Authentication ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(rename = "session-cookie")]
    session_cookie: Option<String>,
}

struct Handshake<'a> {
    http: &'a reqwest::Client,
    jar: &'a Jar,
    base_url: &'a Url,
    timeout: Timeout,
}

impl Handshake<'_> {
    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, Error> {
        let url = self.url(path)?;
        debug!(%method, %url, "handshake request");
        Ok(self.timeout.apply(self.http.request(method, url)))
    }

    fn install_session_cookie(&self, value: &str) {
        self.jar
            .add_cookie_str(&format!("{SESSION_COOKIE}={value}; Path=/api"), self.base_url);
    }

    /// Install the token and check it against the auth context.
    async fn token(&self, token: &SecretString) -> Result<(), Error> {
        self.install_session_cookie(token.expose_secret());
        let resp = self.request(Method::GET, AUTH_CONTEXT)?.send().await?;
        check_status(resp).await?;
        debug!("token accepted");
        Ok(())
    }

    /// Log in with whichever endpoint the controller supports.
    async fn login(&self, username: &str, password: &SecretString) -> Result<(), Error> {
        let probe = self.request(Method::HEAD, MODERN_LOGIN_SCHEMA)?.send().await?;
        if probe.status() == StatusCode::OK {
            self.modern_login(username, password).await
        } else {
            debug!(status = %probe.status(), "modern login unavailable");
            self.legacy_login(username, password).await
        }
    }

    async fn modern_login(&self, username: &str, password: &SecretString) -> Result<(), Error> {
        debug!("logging in via session RPC");
        let body = json!({ "user": username, "password": password.expose_secret() });
        let resp = self
            .request(Method::POST, MODERN_LOGIN)?
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let text = resp.text().await?;
        let login: LoginResponse =
            serde_json::from_str(&text).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: text.clone(),
            })?;
        let cookie = login.session_cookie.ok_or(Error::MissingSessionCookie)?;

        self.install_session_cookie(&cookie);
        debug!("login successful");
        Ok(())
    }

    async fn legacy_login(&self, username: &str, password: &SecretString) -> Result<(), Error> {
        debug!("logging in via auth endpoint");
        let body = json!({ "user": username, "password": password.expose_secret() });
        let resp = self
            .request(Method::POST, LEGACY_LOGIN)?
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp).await?;

        // The auth service scopes its cookies to /auth; the data API lives
        // under /api.
        for header in resp.headers().get_all(SET_COOKIE) {
            let Ok(raw) = header.to_str() else {
                continue;
            };
            if let Some(rewritten) = rewrite_cookie_path(raw) {
                self.jar.add_cookie_str(&rewritten, self.base_url);
            }
        }
        debug!("login successful");
        Ok(())
    }
}

/// Re-scope a `Set-Cookie` value whose `Path` is `/auth` (or below it) to
/// `/api`. Other cookies yield `None`.
pub(crate) fn rewrite_cookie_path(set_cookie: &str) -> Option<String> {
    let mut found = false;
    let parts: Vec<String> = set_cookie
        .split(';')
        .map(|part| {
            let trimmed = part.trim();
            match trimmed.split_once('=') {
                Some((key, value)) if key.trim().eq_ignore_ascii_case("path") => {
                    let value = value.trim();
                    if value == "/auth" || value.starts_with("/auth/") {
                        found = true;
                        return "Path=/api".to_owned();
                    }
                    trimmed.to_owned()
                }
                _ => trimmed.to_owned(),
            }
        })
        .collect();

    found.then(|| parts.join("; "))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn auth_cookie_rescoped_to_api() {
        assert_eq!(
            rewrite_cookie_path("session_cookie=abc; Path=/auth; HttpOnly").as_deref(),
            Some("session_cookie=abc; Path=/api; HttpOnly")
        );
        assert_eq!(
            rewrite_cookie_path("session_cookie=abc; path=/auth/v1").as_deref(),
            Some("session_cookie=abc; Path=/api")
        );
    }

    #[test]
    fn other_cookies_left_alone() {
        assert_eq!(rewrite_cookie_path("x=1; Path=/"), None);
        assert_eq!(rewrite_cookie_path("x=1; Path=/authority"), None);
        assert_eq!(rewrite_cookie_path("x=1"), None);
    }

    #[test]
    fn ipv6_hosts_are_bracketed() {
        assert_eq!(candidate_url("https", "10.0.0.1", 8443), "https://10.0.0.1:8443");
        assert_eq!(candidate_url("http", "fd00::1", 8080), "http://[fd00::1]:8080");
        assert_eq!(candidate_url("http", "[fd00::1]", 8080), "http://[fd00::1]:8080");
    }

    #[test]
    fn invalid_header_rejected() {
        let err = header_map(&[("bad header".into(), "v".into())]).unwrap_err();
        assert!(matches!(err, Error::Header(_)));

        let map = header_map(&[("X-Forwarded-For".into(), "10.1.1.1".into())]).unwrap();
        assert_eq!(map["x-forwarded-for"], "10.1.1.1");
    }

    #[test]
    fn connect_options_defaults() {
        let opts = ConnectOptions::new();
        assert!(matches!(opts.credentials, Credentials::None));
        assert_eq!(opts.tls, TlsMode::DangerAcceptInvalid);
        assert_eq!(opts.timeout, Timeout::Forever);
        assert_eq!(opts.retries, RetrySpec::Count(0));
        assert_eq!(opts.candidates, default_candidates());
        assert_eq!(ConnectOptions::new().verify_tls(true).tls, TlsMode::System);
    }

    #[test]
    fn discovery_ignores_connect_budget() {
        let transport = TransportConfig {
            tls: TlsMode::System,
            user_agent: "bigdb-test".into(),
            connect_timeout: Some(Duration::from_millis(500)),
            ..TransportConfig::default()
        };
        let discovery = discovery_transport(&transport);
        assert_eq!(discovery.connect_timeout, None);
        assert_eq!(discovery.tls, TlsMode::System);
        assert_eq!(discovery.user_agent, "bigdb-test");
        assert!(Arc::ptr_eq(&discovery.cookie_jar, &transport.cookie_jar));
    }

    #[tokio::test]
    async fn explicit_scheme_used_verbatim() {
        let transport = TransportConfig::default();
        let url = resolve_base_url(&transport, "http://10.0.0.1:8080/", &default_candidates())
            .await
            .unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.1:8080/");
    }
}
