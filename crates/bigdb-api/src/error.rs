use reqwest::StatusCode;
use thiserror::Error;

/// Top-level error type for the `bigdb-api` crate.
///
/// Covers every failure mode of the client: discovery, authentication,
/// transport, HTTP status, and body decoding. Callers branch on the helper
/// predicates rather than matching variants where possible.
#[derive(Debug, Error)]
pub enum Error {
    // ── Discovery ───────────────────────────────────────────────────
    /// No scheme/port candidate answered the health check with HTTP 200.
    #[error("Could not find available BigDB service on {host}")]
    NoService { host: String },

    // ── Authentication ──────────────────────────────────────────────
    /// The login RPC succeeded but its body carried no `session-cookie`.
    #[error("Login response did not contain a session cookie")]
    MissingSessionCookie,

    // ── Transport ───────────────────────────────────────────────────
    /// Connection-level failure (refused, DNS, TLS handshake, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS configuration error (unreadable or invalid CA certificate).
    #[error("TLS error: {0}")]
    Tls(String),

    /// A session header name or value could not be encoded.
    #[error("Invalid header: {0}")]
    Header(String),

    // ── HTTP status ─────────────────────────────────────────────────
    /// The server answered with a 4xx/5xx status.
    ///
    /// `description` carries the `description` field of a JSON error body.
    #[error(
        "HTTP {status} for url {url}{}",
        .description.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
    )]
    Http {
        status: StatusCode,
        url: String,
        description: Option<String>,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A request payload could not be serialized to JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),
}

impl Error {
    /// The HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// Returns `true` for 401/403 answers (bad credentials, invalid token).
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self.status(),
            Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        )
    }

    /// Returns `true` if this is a connection-level error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::NoService { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// The server-provided error description, if any.
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Http { description, .. } => description.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_message_appends_description() {
        let err = Error::Http {
            status: StatusCode::UNAUTHORIZED,
            url: "http://127.0.0.1:8080/api/v1/data/controller".into(),
            description: Some("Authorization failed: No session found".into()),
        };
        assert_eq!(
            err.to_string(),
            "HTTP 401 Unauthorized for url http://127.0.0.1:8080/api/v1/data/controller: \
             Authorization failed: No session found"
        );
        assert!(err.is_auth_failure());
        assert!(!err.is_transient());
    }

    #[test]
    fn http_error_message_without_description() {
        let err = Error::Http {
            status: StatusCode::NOT_FOUND,
            url: "http://host/api/v1/schema/".into(),
            description: None,
        };
        assert_eq!(err.to_string(), "HTTP 404 Not Found for url http://host/api/v1/schema/");
        assert!(err.is_not_found());
        assert_eq!(err.description(), None);
    }

    #[test]
    fn no_service_is_transient() {
        let err = Error::NoService {
            host: "10.0.0.1".into(),
        };
        assert!(err.is_transient());
        assert_eq!(err.status(), None);
    }
}
