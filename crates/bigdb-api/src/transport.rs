// Shared transport configuration for building reqwest::Client instances.
//
// Discovery probes, the login handshake, and the finished client all run on
// one reqwest client built here, so they share TLS settings, session
// headers, and the cookie jar.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::HeaderMap;

use crate::error::Error;

/// TLS verification mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// Use the system certificate store.
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (controllers ship self-signed certs).
    #[default]
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub cookie_jar: Arc<Jar>,
    /// Extra headers sent with every request (e.g. `X-Forwarded-For`).
    pub headers: HeaderMap,
    pub user_agent: String,
    /// Client-wide connect budget, taken from a split default timeout.
    pub connect_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::default(),
            cookie_jar: Arc::new(Jar::default()),
            headers: HeaderMap::new(),
            user_agent: concat!("bigdb-rs/", env!("CARGO_PKG_VERSION")).into(),
            connect_timeout: None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    ///
    /// No client-wide request timeout is set: every request carries its own
    /// resolved deadline, and "wait forever" must stay expressible. Only the
    /// connect phase may be bounded here.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .default_headers(self.headers.clone())
            .cookie_provider(Arc::clone(&self.cookie_jar));

        if let Some(connect) = self.connect_timeout {
            builder = builder.connect_timeout(connect);
        }

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}
