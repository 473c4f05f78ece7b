//! Config subcommand handlers.

use dialoguer::{Input, Select};
use serde_json::Value;

use bigdb_config::{Config, KEYRING_SERVICE, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

// ── Helpers ─────────────────────────────────────────────────────────

fn store_secret(profile_name: &str, kind: &str, secret: &str) -> Result<(), CliError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/{kind}"))?
        .set_password(secret)?;
    Ok(())
}

fn read_secret(prompt: &str, field: &str) -> Result<String, CliError> {
    let secret = rpassword::prompt_password(prompt)?;
    if secret.is_empty() {
        return Err(CliError::Validation {
            field: field.into(),
            reason: "value cannot be empty".into(),
        });
    }
    Ok(secret)
}

/// Ask whether a secret goes to the keyring; returns the plaintext to
/// write into the config file otherwise.
fn keyring_or_plaintext(
    profile_name: &str,
    kind: &str,
    secret: String,
) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt(format!("Where to store the {kind}?"))
        .items(choices)
        .default(0)
        .interact()?;

    if selection == 0 {
        store_secret(profile_name, kind, &secret)?;
        eprintln!("   {kind} stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(secret))
    }
}

/// The config as JSON with plaintext secrets masked.
fn redacted(cfg: &Config) -> Result<Value, CliError> {
    let mut value = serde_json::to_value(cfg)?;
    if let Some(profiles) = value.get_mut("profiles").and_then(Value::as_object_mut) {
        for profile in profiles.values_mut().filter_map(Value::as_object_mut) {
            for key in ["password", "token"] {
                if let Some(secret) = profile.get_mut(key).filter(|v| v.is_string()) {
                    *secret = Value::String(REDACTED.into());
                }
            }
        }
    }
    Ok(value)
}

fn init(cfg: &mut Config) -> Result<String, CliError> {
    eprintln!("bigdb configuration wizard");
    eprintln!("   Config path: {}\n", config::config_path().display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()?;

    let host: String = Input::new()
        .with_prompt("Controller host or URL")
        .interact_text()?;

    let auth_choices = &["Username/Password", "Session token", "No authentication"];
    let auth = Select::new()
        .with_prompt("Authentication method")
        .items(auth_choices)
        .default(0)
        .interact()?;

    let mut profile = Profile {
        host,
        ..Profile::default()
    };

    match auth {
        0 => {
            let user: String = Input::new()
                .with_prompt("Username")
                .default("admin".into())
                .interact_text()?;
            let pass = read_secret("Password: ", "password")?;
            profile.username = Some(user);
            profile.password = keyring_or_plaintext(&profile_name, "password", pass)?;
        }
        1 => {
            let token = read_secret("Token: ", "token")?;
            profile.token = keyring_or_plaintext(&profile_name, "token", token)?;
        }
        _ => {}
    }

    cfg.profiles.insert(profile_name.clone(), profile);
    if cfg.profiles.len() == 1 {
        cfg.default_profile = Some(profile_name.clone());
    }
    Ok(profile_name)
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let format = match config::output_format(global, &cfg) {
                OutputFormat::Table => OutputFormat::Json,
                other => other,
            };
            let out = output::render_value(format, &redacted(&cfg)?)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Init => {
            let mut cfg = config::load_config_or_default();
            let profile_name = init(&mut cfg)?;
            let path = bigdb_config::save_config(&cfg)?;

            eprintln!("\nConfiguration written to {}", path.display());
            eprintln!("  Profile: {profile_name}");
            eprintln!("\n  Test it: bigdb --profile {profile_name} get core/version");
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: bigdb config init");
                return Ok(());
            }
            let mut names: Vec<&String> = cfg.profiles.keys().collect();
            names.sort();
            for name in names {
                let marker = if name == default { " *" } else { "" };
                println!("{name}\t{}{marker}", cfg.profiles[name].host);
            }
            Ok(())
        }

        ConfigCommand::SetPassword { token } => {
            let cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            if !cfg.profiles.contains_key(&profile_name) {
                let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
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

            let (kind, prompt) = if token {
                ("token", "Token: ")
            } else {
                ("password", "Password: ")
            };
            let secret = read_secret(prompt, kind)?;
            store_secret(&profile_name, kind, &secret)?;

            eprintln!("{kind} stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn show_masks_plaintext_secrets() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "lab".into(),
            Profile {
                host: "10.0.0.5".into(),
                username: Some("admin".into()),
                password: Some("hunter2".into()),
                token_env: Some("LAB_TOKEN".into()),
                ..Profile::default()
            },
        );
        let value = redacted(&cfg).unwrap();
        let lab = &value["profiles"]["lab"];
        assert_eq!(lab["password"], REDACTED);
        assert_eq!(lab["username"], "admin");
        assert_eq!(lab["token_env"], "LAB_TOKEN");
        assert!(lab["token"].is_null());
    }
}
