use anyhow::Result;
use std::time::Duration;

use rentcal_core::store::SourceStore;

use crate::config::Config;
use crate::scheduler::{self, SyncGate};
use crate::state::AppState;
use crate::sync::sync_source;

pub async fn run(config: Config, source_id: Option<String>, force: bool) -> Result<()> {
    let state = AppState::new(config)?;

    match source_id {
        Some(id) => run_single(&state, &id).await,
        None => run_batch(&state, force).await,
    }
}

async fn run_single(state: &AppState, id: &str) -> Result<()> {
    let source = state
        .store
        .get_source(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Source not found: {}", id))?;

    // Same overlap guard as the batch path: don't interleave with a
    // running batch over the same store.
    if !state.gate.try_acquire(Duration::ZERO) {
        anyhow::bail!("Another sync is already running");
    }
    let stats = sync_source(
        state.fetcher.as_ref(),
        state.store.as_ref(),
        &source,
        &state.config,
    )
    .await;
    state.gate.release();

    match &stats.error {
        None => println!(
            "{}: {} events, {} created, {} updated, {} deleted, {} vanished",
            source.id, stats.total, stats.created, stats.updated, stats.deleted, stats.vanished
        ),
        Some(error) => println!("{}: sync failed: {}", source.id, error),
    }

    Ok(())
}

async fn run_batch(state: &AppState, force: bool) -> Result<()> {
    let summary = match scheduler::run_now(state, force).await? {
        Some(summary) => summary,
        None => anyhow::bail!("Another sync is already running"),
    };

    println!(
        "Synced {} sources ({} failed)",
        summary.sources, summary.failed
    );
    if summary.stats.has_changes() {
        println!(
            "  {} created, {} updated, {} deleted, {} vanished",
            summary.stats.created,
            summary.stats.updated,
            summary.stats.deleted,
            summary.stats.vanished
        );
    } else {
        println!("  No changes");
    }

    Ok(())
}
