//! Command dispatch and shared helpers.

pub mod actions;
pub mod config_cmd;
pub mod view;

use std::time::Duration;

use community_core::{CacheEntry, EntityId, EntryStream, HttpSource, PageView, SyncEngine};

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    match cmd {
        Command::Show(args) => view::show(args, &cfg, global).await,
        Command::Watch(args) => view::watch(args, &cfg, global).await,
        Command::Unlink(args) => actions::unlink(args, &cfg, global).await,
        Command::Follow(args) => actions::set_following(args, true, &cfg, global).await,
        Command::Unfollow(args) => actions::set_following(args, false, &cfg, global).await,
        Command::Propose(args) => actions::propose(args, &cfg, global).await,
        Command::Review(args) => actions::review(args, &cfg, global).await,
        // Handled before a backend is configured.
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

pub(crate) fn parse_service(raw: &str) -> Result<EntityId, CliError> {
    raw.parse().map_err(|_| CliError::Validation {
        field: "service".into(),
        reason: format!("expected a numeric id, got '{raw}'"),
    })
}

pub(crate) fn connect(
    cfg: &community_config::Config,
    global: &GlobalOpts,
    interval_ms: Option<u64>,
) -> Result<SyncEngine, CliError> {
    let sync = config::sync_config(cfg, global, interval_ms)?;
    let session = config::session(cfg, global);
    Ok(SyncEngine::connect(sync, session)?)
}

/// Upper bound for one request/response round trip.
pub(crate) fn round_trip(engine: &SyncEngine) -> Duration {
    engine.config().timeout + Duration::from_secs(1)
}

/// Wait until every kind of the view has data or has failed once.
pub(crate) async fn settle(
    view: &PageView<HttpSource>,
    timeout: Duration,
) -> Result<Vec<CacheEntry>, CliError> {
    let mut streams: Vec<EntryStream> = view
        .kinds()
        .iter()
        .filter_map(|kind| view.subscribe(*kind))
        .collect();

    let wait = async {
        for stream in &mut streams {
            loop {
                let entry = stream.latest();
                if entry.is_loaded() || entry.is_stale() {
                    break;
                }
                if stream.changed().await.is_none() {
                    break;
                }
            }
        }
    };
    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| CliError::Timeout {
            what: "the first response".into(),
        })?;

    Ok(streams.iter().map(EntryStream::latest).collect())
}
