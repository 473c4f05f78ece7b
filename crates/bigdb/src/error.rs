//! CLI error types with miette diagnostics.
//!
//! Maps `bigdb_api::Error` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use bigdb_api::Error as ApiError;
use bigdb_config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not find a BigDB service on {host}")]
    #[diagnostic(
        code(bigdb::no_service),
        help(
            "Neither https://{host}:8443 nor http://{host}:8080 answered the health check.\n\
             Pass a full URL with --host to skip discovery."
        )
    )]
    NoService { host: String },

    #[error("Could not connect to controller")]
    #[diagnostic(
        code(bigdb::connection_failed),
        help("Check that the controller is running and reachable. Use -vv to see requests.")
    )]
    ConnectionFailed {
        #[source]
        source: ApiError,
    },

    #[error("TLS setup failed: {message}")]
    #[diagnostic(
        code(bigdb::tls_error),
        help("Use --insecure (-k) to accept self-signed certificates, or fix ca_cert in your profile.")
    )]
    Tls { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed{}", .description.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    #[diagnostic(
        code(bigdb::auth_failed),
        help(
            "Verify the username/password or token.\n\
             Store a password with: bigdb config set-password --profile <name>"
        )
    )]
    AuthFailed { description: Option<String> },

    #[error("No password configured for profile '{profile}'")]
    #[diagnostic(
        code(bigdb::no_credentials),
        help("Set BIGDB_PASSWORD, pass --password, or run: bigdb config set-password")
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("Not found: {what}")]
    #[diagnostic(code(bigdb::not_found))]
    NotFound { what: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(bigdb::api_error))]
    Api(ApiError),

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(bigdb::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(bigdb::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: bigdb config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No controller configured")]
    #[diagnostic(
        code(bigdb::no_config),
        help(
            "Pass --host, or create a profile with: bigdb config init\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(bigdb::config))]
    Config(ConfigError),

    #[error("Keyring error: {0}")]
    #[diagnostic(code(bigdb::keyring))]
    Keyring(#[from] keyring::Error),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Operation '{action}' requires confirmation")]
    #[diagnostic(
        code(bigdb::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    #[error("Prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out")]
    #[diagnostic(
        code(bigdb::timeout),
        help("Increase --timeout or check controller responsiveness.")
    )]
    Timeout,

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(bigdb::json), help("Check the JSON body and try again."))]
    Json(#[from] serde_json::Error),

    #[error("Could not render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoService { .. } | Self::ConnectionFailed { .. } | Self::Tls { .. } => {
                exit_code::CONNECTION
            }
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::NonInteractiveRequiresYes { .. }
            | Self::ProfileNotFound { .. }
            | Self::NoConfig { .. }
            | Self::Json(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Library errors → CliError ────────────────────────────────────────

impl From<ApiError> for CliError {
    fn from(err: ApiError) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        if err.is_auth_failure() {
            return Self::AuthFailed {
                description: err.description().map(String::from),
            };
        }
        if err.is_not_found() {
            let what = match err {
                ApiError::Http {
                    url,
                    description: Some(d),
                    ..
                } => format!("{url} ({d})"),
                ApiError::Http { url, .. } => url,
                other => other.to_string(),
            };
            return Self::NotFound { what };
        }

        match err {
            ApiError::NoService { host } => Self::NoService { host },
            ApiError::Tls(message) => Self::Tls { message },
            ApiError::Transport(_) => Self::ConnectionFailed { source: err },
            other => Self::Api(other),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use bigdb_api::StatusCode;

    use super::*;

    fn http(status: u16, description: Option<&str>) -> ApiError {
        ApiError::Http {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            url: "http://ctl:8080/api/v1/data/controller/core".into(),
            description: description.map(String::from),
        }
    }

    #[test]
    fn api_errors_map_to_exit_codes() {
        assert_eq!(CliError::from(http(401, None)).exit_code(), exit_code::AUTH);
        assert_eq!(CliError::from(http(404, None)).exit_code(), exit_code::NOT_FOUND);
        assert_eq!(CliError::from(http(500, None)).exit_code(), exit_code::GENERAL);
        assert_eq!(
            CliError::from(ApiError::NoService { host: "ctl".into() }).exit_code(),
            exit_code::CONNECTION
        );
    }

    #[test]
    fn auth_failure_keeps_description() {
        let err = CliError::from(http(401, Some("bad password")));
        assert_eq!(err.to_string(), "Authentication failed: bad password");
    }

    #[test]
    fn config_errors_map_to_cli_errors() {
        let err = CliError::from(ConfigError::NoCredentials {
            profile: "lab".into(),
        });
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}
