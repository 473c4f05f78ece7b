//! Shared configuration for BigDB tools.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext), and
//! translation to `bigdb_api::ConnectOptions`. The CLI layers its flag
//! overrides on top.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bigdb_api::{ConnectOptions, Credentials, Method, RetryPolicy, RetrySpec, Timeout, TlsMode};
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Keyring service name for stored secrets.
pub const KEYRING_SERVICE: &str = "bigdb";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{0}' not found")]
    UnknownProfile(String),

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
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named controller profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// The named profile, or the default one when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::UnknownProfile(name.into()))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Accept self-signed controller certificates.
    #[serde(default = "default_insecure")]
    pub insecure: bool,

    /// Request timeout in seconds; absent waits forever.
    #[serde(default)]
    pub timeout: Option<f64>,

    #[serde(default)]
    pub retries: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            insecure: default_insecure(),
            timeout: None,
            retries: 0,
        }
    }
}

fn default_output() -> String {
    "json".into()
}
fn default_insecure() -> bool {
    true
}

/// A named controller profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Controller host or base URL (`10.0.0.5`, `https://ctl:8443`).
    pub host: String,

    pub username: Option<String>,

    /// Password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    /// Session token (plaintext, prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable holding the token.
    pub token_env: Option<String>,

    /// Override `defaults.insecure`.
    pub insecure: Option<bool>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Request (read) timeout in seconds.
    pub timeout: Option<f64>,

    /// Connect timeout in seconds; splits the budget when set.
    pub connect_timeout: Option<f64>,

    /// Bare retry count.
    pub retries: Option<u32>,

    /// Full retry policy; wins over `retries`.
    pub retry: Option<RetrySection>,

    /// Extra headers sent with every request.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RetrySection {
    pub total: u32,
    #[serde(default)]
    pub backoff_factor: f64,
    /// HTTP method names; absent keeps the idempotent defaults.
    pub allowed_methods: Option<Vec<String>>,
    #[serde(default)]
    pub status_forcelist: Vec<u16>,
}

impl RetrySection {
    pub fn to_policy(&self) -> Result<RetryPolicy, ConfigError> {
        let mut policy = RetryPolicy::new(self.total)
            .with_backoff_factor(self.backoff_factor)
            .with_status_forcelist(self.status_forcelist.iter().copied());

        if let Some(ref names) = self.allowed_methods {
            let methods = names
                .iter()
                .map(|name| {
                    Method::from_bytes(name.to_ascii_uppercase().as_bytes()).map_err(|_| {
                        ConfigError::Validation {
                            field: "retry.allowed_methods".into(),
                            reason: format!("not an HTTP method: {name}"),
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            policy = policy.with_allowed_methods(methods);
        }
        Ok(policy)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "bigdb", "bigdb").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("bigdb");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path`, with `BIGDB_`-prefixed env vars layered on top
/// (`BIGDB_DEFAULTS__OUTPUT=yaml`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("BIGDB_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Where secrets come from besides the profile itself.
pub trait SecretSource {
    fn env(&self, name: &str) -> Option<String>;
    fn keyring(&self, account: &str) -> Option<String>;
}

/// Process environment plus the system keyring.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSecrets;

impl SecretSource for SystemSecrets {
    fn env(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn keyring(&self, account: &str) -> Option<String> {
        keyring::Entry::new(KEYRING_SERVICE, account)
            .and_then(|entry| entry.get_password())
            .ok()
    }
}

fn lookup(
    source: &impl SecretSource,
    profile_env: Option<&str>,
    global_env: &str,
    account: &str,
    plaintext: Option<&str>,
) -> Option<SecretString> {
    profile_env
        .and_then(|name| source.env(name))
        .or_else(|| source.env(global_env))
        .or_else(|| source.keyring(account))
        .or_else(|| plaintext.map(String::from))
        .map(SecretString::from)
}

/// Resolve credentials with the system environment and keyring.
pub fn resolve_credentials(profile: &Profile, profile_name: &str) -> Result<Credentials, ConfigError> {
    resolve_credentials_from(profile, profile_name, &SystemSecrets)
}

/// Resolve credentials: a token wins, then username + password; neither
/// means an anonymous session.
///
/// Each secret is looked up in order: the profile's `*_env` variable,
/// `BIGDB_TOKEN` / `BIGDB_PASSWORD`, the keyring entry
/// `<profile>/token|password`, and finally the plaintext profile field.
pub fn resolve_credentials_from(
    profile: &Profile,
    profile_name: &str,
    source: &impl SecretSource,
) -> Result<Credentials, ConfigError> {
    if let Some(token) = lookup(
        source,
        profile.token_env.as_deref(),
        "BIGDB_TOKEN",
        &format!("{profile_name}/token"),
        profile.token.as_deref(),
    ) {
        return Ok(Credentials::Token(token));
    }

    let Some(username) = profile
        .username
        .clone()
        .or_else(|| source.env("BIGDB_USERNAME"))
    else {
        return Ok(Credentials::None);
    };

    let password = lookup(
        source,
        profile.password_env.as_deref(),
        "BIGDB_PASSWORD",
        &format!("{profile_name}/password"),
        profile.password.as_deref(),
    )
    .ok_or_else(|| ConfigError::NoCredentials {
        profile: profile_name.into(),
    })?;

    Ok(Credentials::Password { username, password })
}

fn secs(field: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: e.to_string(),
    })
}

/// The timeout a profile asks for; `None` fields fall back to `defaults`.
pub fn profile_timeout(profile: &Profile, defaults: &Defaults) -> Result<Timeout, ConfigError> {
    let read = profile.timeout.or(defaults.timeout);
    match (profile.connect_timeout, read) {
        (Some(connect), Some(read)) => Ok(Timeout::Split {
            connect: secs("connect_timeout", connect)?,
            read: secs("timeout", read)?,
        }),
        (Some(connect), None) => Ok(Timeout::connect_only(secs("connect_timeout", connect)?)),
        (None, Some(read)) => Ok(Timeout::After(secs("timeout", read)?)),
        (None, None) => Ok(Timeout::Forever),
    }
}

/// Build `(host, ConnectOptions)` from a profile, no CLI overrides.
pub fn profile_to_connect_options(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<(String, ConnectOptions), ConfigError> {
    profile_to_connect_options_from(profile, profile_name, defaults, &SystemSecrets)
}

pub fn profile_to_connect_options_from(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    source: &impl SecretSource,
) -> Result<(String, ConnectOptions), ConfigError> {
    let host = profile.host.trim();
    if host.is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: format!("profile '{profile_name}' has no host"),
        });
    }

    let tls = if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else if profile.insecure.unwrap_or(defaults.insecure) {
        TlsMode::DangerAcceptInvalid
    } else {
        TlsMode::System
    };

    let retries = match profile.retry {
        Some(ref section) => RetrySpec::Policy(section.to_policy()?),
        None => RetrySpec::Count(profile.retries.unwrap_or(defaults.retries)),
    };

    let options = ConnectOptions::new()
        .credentials(resolve_credentials_from(profile, profile_name, source)?)
        .tls(tls)
        .timeout(profile_timeout(profile, defaults)?)
        .retries(retries)
        .session_headers(profile.headers.clone());

    Ok((host.to_owned(), options))
}
