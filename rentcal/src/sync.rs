//! Per-source sync orchestration: fetch → parse → reconcile.
//!
//! Failures are values here, not exceptions: whatever goes wrong while
//! syncing one source is folded into that source's statistics and status
//! record, and the caller always gets a `SyncStats` back. One bad feed
//! must never abort its siblings.

use chrono::Utc;
use tracing::{info, warn};

use rentcal_core::ics::parse_feed;
use rentcal_core::reconcile::reconcile;
use rentcal_core::store::{BookingStore, SourceStore};
use rentcal_core::{FeedSource, SyncResult, SyncStats};

use crate::config::Config;
use crate::fetch::FeedFetcher;

/// Sync one source and write its status record back.
///
/// This is the only place that mutates a source's `last_*` fields.
pub async fn sync_source<S>(
    fetcher: &dyn FeedFetcher,
    store: &S,
    source: &FeedSource,
    config: &Config,
) -> SyncStats
where
    S: SourceStore + BookingStore,
{
    let stats = match run(fetcher, store, source, config).await {
        Ok(stats) => stats,
        Err(e) => SyncStats::failed(e.to_string()),
    };

    let now = Utc::now();
    let mut updated = source.clone();
    match &stats.error {
        None => updated.mark_success(now, stats.clone()),
        Some(error) => updated.mark_error(now, error.clone(), stats.clone()),
    }
    if let Err(e) = store.update_status(&updated).await {
        warn!(source = %source.id, error = %e, "failed to persist sync status");
    }

    if stats.success {
        info!(
            source = %source.id,
            name = %source.name,
            total = stats.total,
            created = stats.created,
            updated = stats.updated,
            deleted = stats.deleted,
            vanished = stats.vanished,
            skipped = stats.skipped,
            "source sync finished"
        );
    } else {
        warn!(
            source = %source.id,
            error = stats.error.as_deref().unwrap_or("unknown"),
            "source sync failed"
        );
    }

    stats
}

async fn run<S>(
    fetcher: &dyn FeedFetcher,
    store: &S,
    source: &FeedSource,
    config: &Config,
) -> SyncResult<SyncStats>
where
    S: SourceStore + BookingStore,
{
    let raw = fetcher.fetch(&source.url).await?;
    let outcome = parse_feed(&raw, &source.id)?;

    let threshold = source.vanish_threshold.unwrap_or(config.vanish_threshold);
    let mut stats = reconcile(store, source, &outcome.events, threshold).await?;
    stats.skipped = outcome.skipped;
    Ok(stats)
}
