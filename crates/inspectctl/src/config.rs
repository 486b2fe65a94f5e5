//! Flag-aware configuration: profile lookup and CLI overrides on top of
//! `inspect_config`.

use std::io::IsTerminal;
use std::time::Duration;

use secrecy::SecretString;

use inspect_config::{self as config, Config};
use inspect_core::{Credentials, NodeConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

const DEFAULT_USERNAME: &str = "admin";

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

fn default_timeout(global: &GlobalOpts, cfg: &Config) -> Result<Duration, CliError> {
    match global.timeout {
        Some(ref t) => Ok(**t),
        None => Ok(config::parse_duration("defaults.timeout", &cfg.defaults.timeout)?),
    }
}

/// Build a `NodeConfig` from the config file, profile, and CLI overrides.
pub fn build_node_config(global: &GlobalOpts) -> Result<NodeConfig, CliError> {
    let cfg = config::load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);
    let timeout = default_timeout(global, &cfg)?;

    if let Some(profile) = cfg.profiles.get(&profile_name) {
        let mut node = config::profile_to_node_config(profile, &profile_name, timeout)?;
        apply_overrides(&mut node, global);
        if global.timeout.is_some() {
            node.timeout = timeout;
        }
        return Ok(node);
    }

    // An explicitly named profile must exist.
    if global.profile.is_some() {
        let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
        available.sort_unstable();
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: if available.is_empty() {
                "(none)".into()
            } else {
                available.join(", ")
            },
        });
    }

    // No profile -- build from flags / env vars alone.
    let host = global.host.clone().ok_or_else(|| CliError::NoConfig {
        path: config::config_path().display().to_string(),
    })?;

    let mut node = NodeConfig {
        host,
        credentials: Credentials {
            username: global
                .username
                .clone()
                .unwrap_or_else(|| DEFAULT_USERNAME.into()),
            password: password_from_env_or_prompt(&profile_name)?,
        },
        timeout,
        ..NodeConfig::default()
    };
    apply_overrides(&mut node, global);
    Ok(node)
}

fn apply_overrides(node: &mut NodeConfig, global: &GlobalOpts) {
    if let Some(ref host) = global.host {
        node.host.clone_from(host);
    }
    if let Some(port) = global.port {
        node.system_port = port;
    }
    if let Some(index) = global.node {
        node.node = index;
    }
    if let Some(ref user) = global.username {
        node.credentials.username.clone_from(user);
    }
}

fn password_from_env_or_prompt(profile_name: &str) -> Result<SecretString, CliError> {
    if let Ok(pw) = std::env::var("INSPECT_PASSWORD") {
        return Ok(SecretString::from(pw));
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NoCredentials {
            profile: profile_name.into(),
        });
    }
    let pw = rpassword::prompt_password("Node password: ")?;
    Ok(SecretString::from(pw))
}
