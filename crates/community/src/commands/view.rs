//! `show` and `watch`: read-only page views.

use futures_util::StreamExt;
use futures_util::stream::select_all;

use community_config::Config;
use community_core::{CoreError, EntryStream, Page};

use super::{connect, parse_service, round_trip, settle};
use crate::cli::{GlobalOpts, ShowArgs, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn show(args: ShowArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let entity = parse_service(&args.service)?;
    // Fetch once; no periodic polling for a one-shot read.
    let engine = connect(cfg, global, Some(0))?;
    let mut view = engine.page(Page::from(args.page));
    view.view(entity)?;

    let entries = settle(&view, round_trip(&engine)).await?;
    view.leave();
    engine.shutdown();

    if entries.iter().all(|entry| !entry.is_loaded()) {
        if let Some(error) = entries.iter().find_map(|e| e.health.last_error.clone()) {
            return Err(CoreError::Fetch(error).into());
        }
    }

    let rendered =
        output::render_entries(global.output, &entries, output::should_color(global.color))?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

pub async fn watch(args: WatchArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let entity = parse_service(&args.service)?;
    let engine = connect(cfg, global, args.interval_ms)?;
    let mut view = engine.page(Page::from(args.page));
    view.view(entity)?;

    let streams: Vec<EntryStream> = view
        .kinds()
        .iter()
        .filter_map(|kind| view.subscribe(*kind))
        .collect();
    let mut changes = select_all(streams.into_iter().map(EntryStream::into_stream));
    let color = output::should_color(global.color);
    let mut printed = 0_usize;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
            next = changes.next() => {
                let Some(entry) = next else { break };
                // Nothing to show until the first attempt settles.
                if !entry.is_loaded() && !entry.is_stale() {
                    continue;
                }
                let rendered = output::render_entries(global.output, &[entry], color)?;
                output::print_output(&rendered, global.quiet);
                printed += 1;
                if args.updates.is_some_and(|limit| printed >= limit) {
                    break;
                }
            }
        }
    }

    view.leave();
    engine.shutdown();
    Ok(())
}
