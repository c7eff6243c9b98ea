//! Effective configuration: the config crate's file + env layers with
//! CLI flag overrides on top.

use std::time::Duration;

use secrecy::SecretString;

use community_config::Config;
use community_core::{Session, SyncConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use community_config::{config_path, resolve_token, store_token};

/// Load the config file named by `--config`, or the default one.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = global.config.clone().unwrap_or_else(config_path);
    Ok(community_config::load_config_from(&path)?)
}

/// Build the engine's `SyncConfig`, applying flag overrides.
pub fn sync_config(
    cfg: &Config,
    global: &GlobalOpts,
    interval_ms: Option<u64>,
) -> Result<SyncConfig, CliError> {
    let mut cfg = cfg.clone();
    if let Some(ref url) = global.api_url {
        cfg.api_url.clone_from(url);
    }
    if let Some(timeout) = global.timeout {
        cfg.timeout_secs = timeout;
    }

    let mut sync = community_config::to_sync_config(&cfg)?;
    if global.insecure {
        sync.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(ms) = interval_ms {
        sync.poll_interval = Duration::from_millis(ms);
        sync.intervals.clear();
    }
    Ok(sync)
}

/// Session from `--token` / `--display-name`, falling back to the
/// config crate's resolution chain.
pub fn session(cfg: &Config, global: &GlobalOpts) -> Session {
    let token = global
        .token
        .clone()
        .map(SecretString::from)
        .or_else(|| resolve_token(cfg));
    let display_name = global
        .display_name
        .clone()
        .or_else(|| cfg.display_name.clone());
    Session::new(token, display_name)
}
