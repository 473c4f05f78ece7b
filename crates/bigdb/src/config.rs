//! CLI-side configuration: flag overrides layered over `bigdb-config`
//! profiles, producing the `(host, ConnectOptions)` pair `connect` needs.

use std::io::IsTerminal;
use std::time::Duration;

use bigdb_api::{ConnectOptions, Credentials, RetrySpec, Timeout, TlsMode};
use bigdb_config::{Config, Profile};
use secrecy::SecretString;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

pub use bigdb_config::{config_path, load_config_or_default};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Output format: flag, then `defaults.output`, then JSON.
pub fn output_format(global: &GlobalOpts, config: &Config) -> OutputFormat {
    global.output.unwrap_or(match config.defaults.output.as_str() {
        "table" => OutputFormat::Table,
        "json-compact" => OutputFormat::JsonCompact,
        "yaml" => OutputFormat::Yaml,
        _ => OutputFormat::Json,
    })
}

fn secs(field: &str, value: f64) -> Result<Duration, CliError> {
    Duration::try_from_secs_f64(value).map_err(|e| CliError::Validation {
        field: field.into(),
        reason: e.to_string(),
    })
}

/// Build the connection for this invocation.
///
/// With a matching profile, flags override its fields. Without one,
/// `--host` is required and everything else comes from flags.
pub fn resolve_connection(
    global: &GlobalOpts,
    config: &Config,
) -> Result<(String, ConnectOptions), CliError> {
    let profile_name = active_profile_name(global, config);

    let (host, mut options) = match config.profiles.get(&profile_name) {
        Some(profile) => {
            let profile = Profile {
                host: global.host.clone().unwrap_or_else(|| profile.host.clone()),
                ..profile.clone()
            };
            bigdb_config::profile_to_connect_options(&profile, &profile_name, &config.defaults)?
        }
        None => {
            if global.profile.is_some() {
                let mut names: Vec<&str> = config.profiles.keys().map(String::as_str).collect();
                names.sort_unstable();
                return Err(CliError::ProfileNotFound {
                    name: profile_name,
                    available: if names.is_empty() {
                        "(none)".into()
                    } else {
                        names.join(", ")
                    },
                });
            }
            let host = global.host.clone().ok_or_else(|| CliError::NoConfig {
                path: config_path().display().to_string(),
            })?;
            let timeout = bigdb_config::profile_timeout(&Profile::default(), &config.defaults)?;
            let options = ConnectOptions::new()
                .verify_tls(!config.defaults.insecure)
                .retries(config.defaults.retries)
                .timeout(timeout);
            (host, options)
        }
    };

    if let Some(creds) = flag_credentials(global, &profile_name)? {
        options = options.credentials(creds);
    }
    if global.no_auth {
        options = options.skip_auth(true);
    }
    if global.insecure {
        options = options.tls(TlsMode::DangerAcceptInvalid);
    }
    if let Some(retries) = global.retries {
        options = options.retries(RetrySpec::Count(retries));
    }
    options = match (global.connect_timeout, global.timeout) {
        (Some(connect), Some(read)) => options.timeout(Timeout::Split {
            connect: secs("--connect-timeout", connect)?,
            read: secs("--timeout", read)?,
        }),
        (None, Some(read)) => options.timeout(secs("--timeout", read)?),
        (Some(connect), None) => {
            options.timeout(Timeout::connect_only(secs("--connect-timeout", connect)?))
        }
        (None, None) => options,
    };

    Ok((host, options))
}

/// Credentials given on the command line, if any.
///
/// A username without a password prompts when stdin is a terminal.
fn flag_credentials(
    global: &GlobalOpts,
    profile_name: &str,
) -> Result<Option<Credentials>, CliError> {
    if let Some(ref token) = global.token {
        return Ok(Some(Credentials::Token(SecretString::from(token.clone()))));
    }

    let Some(ref username) = global.user else {
        return Ok(None);
    };

    let password = match global.password {
        Some(ref pw) => pw.clone(),
        None if std::io::stdin().is_terminal() => {
            rpassword::prompt_password(format!("Password for {username}: "))?
        }
        None => {
            return Err(CliError::NoCredentials {
                profile: profile_name.into(),
            });
        }
    };

    Ok(Some(Credentials::Password {
        username: username.clone(),
        password: SecretString::from(password),
    }))
}
