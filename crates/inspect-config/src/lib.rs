//! Configuration for inspectctl.
//!
//! TOML profiles (one per node), credential resolution (env + keyring +
//! plaintext), and translation to `inspect_core::NodeConfig`. The CLI
//! layers its flag overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use inspect_core::{
    Credentials, DeviceProfile, FirmwareVersion, ImageExchange, NodeConfig, WaitTimeouts,
};

/// Keyring service name; entries are keyed `{profile}/password`.
const KEYRING_SERVICE: &str = "inspectctl";
/// Env var consulted for the password when a profile names none.
const PASSWORD_ENV: &str = "INSPECT_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

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
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named node profiles.
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
    /// Look up `name`, falling back to the default profile.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, p)| (k.as_str(), p))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Per-request timeout, humantime syntax ("30s").
    #[serde(default = "default_timeout")]
    pub timeout: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> String {
    "30s".into()
}

/// One node.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Station host name or address.
    pub host: String,

    /// Station port; the node serves on `system_port + node`.
    #[serde(default = "default_system_port")]
    pub system_port: u16,

    #[serde(default = "default_node")]
    pub node: u16,

    pub username: Option<String>,

    /// Password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    /// Override the request timeout ("45s").
    pub timeout: Option<String>,

    /// Replaces the derived event-stream URL.
    pub event_stream_url: Option<String>,

    /// Directory watched by a local simulator. Unset uploads images.
    pub simulator_image_dir: Option<PathBuf>,

    /// Where to write the compiled grading-standard table.
    pub standards_path: Option<PathBuf>,

    /// `/api/{root}` path segment for other device families.
    pub api_root: Option<String>,

    /// Newest simulator firmware needing the image-prefix workaround.
    pub simulator_prefix_gate: Option<String>,

    pub repeat_capacity: Option<usize>,

    #[serde(default)]
    pub waits: WaitOverrides,
}

fn default_system_port() -> u16 {
    8080
}
fn default_node() -> u16 {
    1
}

/// Per-profile overrides for the controller's waits, humantime syntax.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct WaitOverrides {
    pub edit: Option<String>,
    pub label_begin: Option<String>,
    pub detect: Option<String>,
    pub run: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "inspectctl", "inspectctl").map_or_else(
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
    p.push("inspectctl");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path`, layered over defaults and under `INSPECT_*`
/// environment variables (`__` separates nesting levels).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("INSPECT_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve login credentials for a profile: env var, then the system
/// keyring, then plaintext in the file.
pub fn resolve_credentials(profile: &Profile, profile_name: &str) -> Result<Credentials, ConfigError> {
    let username = profile
        .username
        .clone()
        .or_else(|| std::env::var("INSPECT_USERNAME").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    // 1. Env var
    let env_name = profile.password_env.as_deref().unwrap_or(PASSWORD_ENV);
    if let Ok(pw) = std::env::var(env_name) {
        return Ok(Credentials {
            username,
            password: SecretString::from(pw),
        });
    }

    // 2. Keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password")) {
        if let Ok(pw) = entry.get_password() {
            return Ok(Credentials {
                username,
                password: SecretString::from(pw),
            });
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(Credentials {
            username,
            password: SecretString::from(pw.clone()),
        });
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
        .and_then(|entry| entry.set_password(password))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

// ── Translation to NodeConfig ───────────────────────────────────────

/// Parse a humantime duration, naming `field` on failure.
pub fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("{value:?}: {e}"),
    })
}

fn override_duration(
    field: &str,
    value: Option<&str>,
    fallback: Duration,
) -> Result<Duration, ConfigError> {
    value.map_or(Ok(fallback), |v| parse_duration(field, v))
}

fn resolve_waits(overrides: &WaitOverrides) -> Result<WaitTimeouts, ConfigError> {
    let base = WaitTimeouts::default();
    Ok(WaitTimeouts {
        edit: override_duration("waits.edit", overrides.edit.as_deref(), base.edit)?,
        label_begin: override_duration(
            "waits.label_begin",
            overrides.label_begin.as_deref(),
            base.label_begin,
        )?,
        detect: override_duration("waits.detect", overrides.detect.as_deref(), base.detect)?,
        run: override_duration("waits.run", overrides.run.as_deref(), base.run)?,
    })
}

fn resolve_device_profile(profile: &Profile) -> Result<DeviceProfile, ConfigError> {
    let mut device = DeviceProfile {
        waits: resolve_waits(&profile.waits)?,
        ..DeviceProfile::default()
    };
    if let Some(ref root) = profile.api_root {
        device.api_root.clone_from(root);
    }
    if let Some(ref gate) = profile.simulator_prefix_gate {
        device.simulator_prefix_gate =
            gate.parse::<FirmwareVersion>()
                .map_err(|e| ConfigError::Validation {
                    field: "simulator_prefix_gate".into(),
                    reason: e.to_string(),
                })?;
    }
    if let Some(capacity) = profile.repeat_capacity {
        device.repeat_capacity = capacity;
    }
    Ok(device)
}

/// Build a `NodeConfig` from a profile. `default_timeout` applies when the
/// profile sets none.
pub fn profile_to_node_config(
    profile: &Profile,
    profile_name: &str,
    default_timeout: Duration,
) -> Result<NodeConfig, ConfigError> {
    if profile.host.is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "must not be empty".into(),
        });
    }

    let event_stream_url = profile
        .event_stream_url
        .as_deref()
        .map(|raw| {
            raw.parse::<url::Url>().map_err(|_| ConfigError::Validation {
                field: "event_stream_url".into(),
                reason: format!("invalid URL: {raw}"),
            })
        })
        .transpose()?;

    let image_exchange = profile
        .simulator_image_dir
        .clone()
        .map_or(ImageExchange::Remote, ImageExchange::Directory);

    Ok(NodeConfig {
        host: profile.host.clone(),
        system_port: profile.system_port,
        node: profile.node,
        credentials: resolve_credentials(profile, profile_name)?,
        timeout: override_duration("timeout", profile.timeout.as_deref(), default_timeout)?,
        image_exchange,
        event_stream_url,
        standards_path: profile.standards_path.clone(),
        profile: resolve_device_profile(profile)?,
    })
}
