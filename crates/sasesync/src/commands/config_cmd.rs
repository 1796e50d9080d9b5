//! `sasesync config` -- inspect and manage the config file.

use serde::Serialize;
use tabled::Tabled;

use sasesync_config::{
    Config, Profile, TenantProfile, config_path, load_config_from, load_config_or_default,
    save_config,
};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, ProfileSide};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize, Tabled)]
struct ProfileRow {
    #[tabled(rename = "PROFILE")]
    name: String,
    #[tabled(rename = "SOURCE")]
    source: String,
    #[tabled(rename = "DESTINATION")]
    destination: String,
    #[tabled(rename = "DEFAULT")]
    default: String,
}

fn empty_profile() -> Profile {
    let tenant = || TenantProfile {
        url: String::new(),
        tenant: String::new(),
        api_key: None,
        api_key_env: None,
        ca_cert: None,
        insecure: None,
        timeout: None,
    };
    Profile {
        source: tenant(),
        destination: tenant(),
        snapshot_dir: None,
    }
}

fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    match global.config {
        Some(ref path) => Ok(load_config_from(path)?),
        None => Ok(load_config_or_default()),
    }
}

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let mut cfg = load(global)?;
            for profile in cfg.profiles.values_mut() {
                for tenant in [&mut profile.source, &mut profile.destination] {
                    if tenant.api_key.is_some() {
                        tenant.api_key = Some("***".into());
                    }
                }
            }
            let text = toml::to_string_pretty(&cfg).map_err(sasesync_config::ConfigError::from)?;
            output::print_output(text.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Set {
            ref key,
            ref value,
            side,
        } => {
            let mut cfg = load(global)?;
            let profile_name = global
                .profile
                .clone()
                .or_else(|| cfg.default_profile.clone())
                .unwrap_or_else(|| "default".into());

            let profile = cfg
                .profiles
                .entry(profile_name.clone())
                .or_insert_with(empty_profile);
            let tenant = match side {
                ProfileSide::Source => &mut profile.source,
                ProfileSide::Destination => &mut profile.destination,
            };

            let value = value.clone();
            match key.as_str() {
                "url" => tenant.url = value,
                "tenant" => tenant.tenant = value,
                "api_key" | "api-key" => tenant.api_key = Some(value),
                "api_key_env" | "api-key-env" => tenant.api_key_env = Some(value),
                "ca_cert" | "ca-cert" => tenant.ca_cert = Some(value.into()),
                "insecure" => {
                    tenant.insecure = Some(value.parse().map_err(|_| CliError::Validation {
                        field: "insecure".into(),
                        reason: "must be 'true' or 'false'".into(),
                    })?);
                }
                "timeout" => {
                    tenant.timeout = Some(value.parse().map_err(|_| CliError::Validation {
                        field: "timeout".into(),
                        reason: "must be a number (seconds)".into(),
                    })?);
                }
                other => {
                    return Err(CliError::Validation {
                        field: other.into(),
                        reason: format!(
                            "unknown config key '{other}'. Valid keys: url, tenant, \
                             api_key, api_key_env, ca_cert, insecure, timeout"
                        ),
                    });
                }
            }

            save_config(&cfg)?;
            if !global.quiet {
                eprintln!("set {key} on profile '{profile_name}'");
            }
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = load(global)?;
            let default = cfg.default_profile.as_deref().unwrap_or("");
            let mut views: Vec<ProfileRow> = cfg
                .profiles
                .iter()
                .map(|(name, profile)| ProfileRow {
                    name: name.clone(),
                    source: profile.source.tenant.clone(),
                    destination: profile.destination.tenant.clone(),
                    default: if name == default { "*" } else { "" }.into(),
                })
                .collect();
            views.sort_by(|a, b| a.name.cmp(&b.name));

            let rendered = output::render_list(
                &global.output,
                &views,
                |v| ProfileRow {
                    name: v.name.clone(),
                    source: v.source.clone(),
                    destination: v.destination.clone(),
                    default: v.default.clone(),
                },
                |v| v.name.clone(),
            );
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        ConfigCommand::Use { ref name } => {
            let mut cfg = load(global)?;
            if !cfg.profiles.contains_key(name) {
                let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
                available.sort_unstable();
                return Err(CliError::ProfileNotFound {
                    name: name.clone(),
                    available: if available.is_empty() {
                        "(none)".into()
                    } else {
                        available.join(", ")
                    },
                });
            }
            cfg.default_profile = Some(name.clone());
            save_config(&cfg)?;
            output::print_output(&format!("default profile set to '{name}'"), global.quiet);
            Ok(())
        }
    }
}
