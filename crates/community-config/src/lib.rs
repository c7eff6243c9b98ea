//! Configuration for the Community sync tools.
//!
//! TOML file + `COMMUNITY_*` environment, session token resolution
//! (env + keyring + plaintext), and translation to
//! `community_core::SyncConfig` / `Session`.

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

use community_core::{ResourceKind, Session, SyncConfig, TlsVerification};

const KEYRING_SERVICE: &str = "community";
const KEYRING_USER: &str = "token";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// API base URL (e.g., "http://localhost:8069").
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Skip TLS verification.
    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Poll period for every resource, in milliseconds. 0 = fetch once.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Per-kind overrides, e.g. `reviews = 30000`.
    #[serde(default)]
    pub intervals: HashMap<String, u64>,

    /// Author name shown on optimistic proposals and reviews.
    pub display_name: Option<String>,

    /// Session token (plaintext, prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable holding the session token.
    pub token_env: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_secs: default_timeout(),
            insecure: false,
            ca_cert: None,
            poll_interval_ms: default_poll_interval(),
            intervals: HashMap::new(),
            display_name: None,
            token: None,
            token_env: None,
        }
    }
}

fn default_api_url() -> String {
    "http://localhost:8069".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    5000
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "community", "community").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("community");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Loading / saving ────────────────────────────────────────────────

/// Load config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path` (missing file is fine) + `COMMUNITY_*` env vars.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("COMMUNITY_").ignore(&["config"]));

    let config: Config = figment.extract()?;
    Ok(config)
}

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

// ── Token resolution ────────────────────────────────────────────────

/// Resolve the session token: `token_env` variable, then system keyring,
/// then plaintext config. `None` means anonymous.
pub fn resolve_token(cfg: &Config) -> Option<SecretString> {
    // 1. Configured env var
    if let Some(ref env_name) = cfg.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    cfg.token.clone().map(SecretString::from)
}

/// Store the session token in the system keyring.
pub fn store_token(token: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)?;
    entry.set_password(token)?;
    Ok(())
}

// ── Translation to core types ───────────────────────────────────────

/// Build a `SyncConfig` from the loaded config.
pub fn to_sync_config(cfg: &Config) -> Result<SyncConfig, ConfigError> {
    url::Url::parse(&cfg.api_url).map_err(|e| ConfigError::Validation {
        field: "api_url".into(),
        reason: format!("{e}: {}", cfg.api_url),
    })?;

    let tls = if cfg.insecure {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = cfg.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let mut intervals = HashMap::new();
    for (name, millis) in &cfg.intervals {
        let kind: ResourceKind = name.parse().map_err(|_| ConfigError::Validation {
            field: format!("intervals.{name}"),
            reason: "expected one of service, employees, proposals, reviews".into(),
        })?;
        intervals.insert(kind, Duration::from_millis(*millis));
    }

    Ok(SyncConfig {
        api_url: cfg.api_url.clone(),
        tls,
        timeout: Duration::from_secs(cfg.timeout_secs),
        poll_interval: Duration::from_millis(cfg.poll_interval_ms),
        intervals,
    })
}

/// Build the session, resolving the token.
pub fn to_session(cfg: &Config) -> Session {
    Session::new(resolve_token(cfg), cfg.display_name.clone())
}
