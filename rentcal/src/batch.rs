//! Batch sync across all enabled sources.

use chrono::Utc;
use tracing::info;

use rentcal_core::store::{BookingStore, SourceStore};
use rentcal_core::{BatchSummary, SyncError, SyncResult};

use crate::config::Config;
use crate::fetch::FeedFetcher;
use crate::sync::sync_source;

/// Run one batch over every enabled source.
///
/// Individual source failures are counted, never propagated; the batch
/// completes even if every source fails. The only error that escapes is
/// failing to enumerate sources at all.
pub async fn sync_all<S>(
    fetcher: &dyn FeedFetcher,
    store: &S,
    config: &Config,
    force: bool,
) -> SyncResult<BatchSummary>
where
    S: SourceStore + BookingStore,
{
    let sources = store
        .list_enabled()
        .await
        .map_err(|e| SyncError::Enumeration(e.to_string()))?;

    let now = Utc::now();
    let mut summary = BatchSummary::default();

    for source in &sources {
        if !force && !source.due(now) {
            continue;
        }
        let stats = sync_source(fetcher, store, source, config).await;
        summary.absorb(&stats);
    }

    info!(
        sources = summary.sources,
        failed = summary.failed,
        created = summary.stats.created,
        updated = summary.stats.updated,
        deleted = summary.stats.deleted,
        vanished = summary.stats.vanished,
        "sync batch finished"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rentcal_core::store::MemoryStore;
    use rentcal_core::FeedSource;
    use std::collections::HashMap;

    /// Fetcher with one canned response per URL; unknown URLs time out.
    struct MapFetcher {
        feeds: HashMap<String, String>,
    }

    #[async_trait]
    impl FeedFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> SyncResult<String> {
            self.feeds
                .get(url)
                .cloned()
                .ok_or(SyncError::Timeout(30))
        }
    }

    fn feed(events: &[(&str, &str, &str)]) -> String {
        let mut out = String::from("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n");
        for (uid, start, end) in events {
            out.push_str(&format!(
                "BEGIN:VEVENT\r\nUID:{uid}\r\nDTSTART;VALUE=DATE:{start}\r\nDTEND;VALUE=DATE:{end}\r\nSUMMARY:Reserved\r\nEND:VEVENT\r\n"
            ));
        }
        out.push_str("END:VCALENDAR\r\n");
        out
    }

    #[tokio::test]
    async fn test_failing_source_does_not_abort_siblings() {
        let store = MemoryStore::new();
        store
            .upsert_source(FeedSource::new("a", "u1", "A", "https://dead.example/cal.ics"))
            .await
            .unwrap();
        store
            .upsert_source(FeedSource::new("b", "u2", "B", "https://live.example/cal.ics"))
            .await
            .unwrap();

        let fetcher = MapFetcher {
            feeds: HashMap::from([(
                "https://live.example/cal.ics".to_string(),
                feed(&[("UID1", "20250601", "20250605")]),
            )]),
        };

        let summary = sync_all(&fetcher, &store, &Config::default(), false)
            .await
            .unwrap();

        assert_eq!(summary.sources, 2);
        assert_eq!(summary.failed, 1, "exactly the dead source fails");
        assert_eq!(summary.stats.created, 1, "the healthy source still syncs");
        assert_eq!(store.active_bookings("b").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_all_sources_failing_still_completes() {
        let store = MemoryStore::new();
        store
            .upsert_source(FeedSource::new("a", "u1", "A", "https://dead.example/a.ics"))
            .await
            .unwrap();
        store
            .upsert_source(FeedSource::new("b", "u1", "B", "https://dead.example/b.ics"))
            .await
            .unwrap();

        let fetcher = MapFetcher {
            feeds: HashMap::new(),
        };
        let summary = sync_all(&fetcher, &store, &Config::default(), false)
            .await
            .unwrap();

        assert_eq!(summary.failed, 2);
        assert!(!summary.stats.has_changes());
    }

    #[tokio::test]
    async fn test_disabled_sources_are_skipped() {
        let store = MemoryStore::new();
        let mut disabled = FeedSource::new("off", "u1", "Off", "https://live.example/cal.ics");
        disabled.enabled = false;
        store.upsert_source(disabled).await.unwrap();

        let fetcher = MapFetcher {
            feeds: HashMap::from([(
                "https://live.example/cal.ics".to_string(),
                feed(&[("UID1", "20250601", "20250605")]),
            )]),
        };

        let summary = sync_all(&fetcher, &store, &Config::default(), false)
            .await
            .unwrap();
        assert_eq!(summary.sources, 0);
    }

    #[tokio::test]
    async fn test_recently_synced_source_is_skipped_unless_forced() {
        let store = MemoryStore::new();
        let mut source = FeedSource::new("a", "u1", "A", "https://live.example/cal.ics");
        source.sync_interval_secs = Some(3600);
        source.last_synced_at = Some(Utc::now());
        store.upsert_source(source).await.unwrap();

        let fetcher = MapFetcher {
            feeds: HashMap::from([(
                "https://live.example/cal.ics".to_string(),
                feed(&[("UID1", "20250601", "20250605")]),
            )]),
        };

        let summary = sync_all(&fetcher, &store, &Config::default(), false)
            .await
            .unwrap();
        assert_eq!(summary.sources, 0, "within its interval, the source rests");

        let summary = sync_all(&fetcher, &store, &Config::default(), true)
            .await
            .unwrap();
        assert_eq!(summary.sources, 1, "force bypasses per-source intervals");
    }
}
