//! In-memory store.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::booking::Booking;
use crate::error::SyncResult;
use crate::reconcile::ReconcilePlan;
use crate::source::FeedSource;
use crate::store::{apply_plan, BookingCounts, BookingStore, SourceStore, StoreState};
use crate::unit::Unit;

/// Volatile store backed by a `RwLock`. State is lost on drop; used by
/// tests and available behind the same contract as `JsonStore`.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

#[async_trait]
impl SourceStore for MemoryStore {
    async fn list_units(&self) -> SyncResult<Vec<Unit>> {
        Ok(self.state.read().await.units.clone())
    }

    async fn upsert_unit(&self, unit: Unit) -> SyncResult<()> {
        self.state.write().await.upsert_unit(unit);
        Ok(())
    }

    async fn list_sources(&self) -> SyncResult<Vec<FeedSource>> {
        Ok(self.state.read().await.sources.clone())
    }

    async fn list_enabled(&self) -> SyncResult<Vec<FeedSource>> {
        let state = self.state.read().await;
        Ok(state.sources.iter().filter(|s| s.enabled).cloned().collect())
    }

    async fn get_source(&self, id: &str) -> SyncResult<Option<FeedSource>> {
        let state = self.state.read().await;
        Ok(state.sources.iter().find(|s| s.id == id).cloned())
    }

    async fn upsert_source(&self, source: FeedSource) -> SyncResult<()> {
        self.state.write().await.upsert_source(source);
        Ok(())
    }

    async fn set_enabled(&self, id: &str, enabled: bool) -> SyncResult<()> {
        let mut state = self.state.write().await;
        state.source_mut(id)?.enabled = enabled;
        Ok(())
    }

    async fn update_status(&self, source: &FeedSource) -> SyncResult<()> {
        self.state.write().await.update_status(source)
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn active_bookings(&self, source_id: &str) -> SyncResult<Vec<Booking>> {
        let state = self.state.read().await;
        Ok(state
            .bookings
            .get(source_id)
            .map(|rows| rows.iter().filter(|b| b.is_active()).cloned().collect())
            .unwrap_or_default())
    }

    async fn all_bookings(&self, source_id: &str) -> SyncResult<Vec<Booking>> {
        let state = self.state.read().await;
        Ok(state.bookings.get(source_id).cloned().unwrap_or_default())
    }

    async fn bookings_for_unit(&self, unit_id: &str) -> SyncResult<Vec<Booking>> {
        let state = self.state.read().await;
        let mut rows: Vec<Booking> = state
            .bookings
            .values()
            .flatten()
            .filter(|b| b.unit_id == unit_id && b.is_active())
            .cloned()
            .collect();
        rows.sort_by_key(|b| b.check_in);
        Ok(rows)
    }

    async fn counts(&self, source_id: &str) -> SyncResult<BookingCounts> {
        Ok(self.state.read().await.counts(source_id))
    }

    async fn apply(&self, source: &FeedSource, plan: &ReconcilePlan) -> SyncResult<()> {
        let mut state = self.state.write().await;
        let rows = state.bookings.entry(source.id.clone()).or_default();
        apply_plan(rows, source, plan, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ParsedEvent;
    use chrono::NaiveDate;

    fn event(uid: &str) -> ParsedEvent {
        ParsedEvent {
            uid: uid.to_string(),
            start: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 6, 5).unwrap(),
            summary: "Reserved".to_string(),
        }
    }

    #[tokio::test]
    async fn test_apply_create_then_vanish_keeps_tombstone_queryable() {
        let store = MemoryStore::new();
        let source = FeedSource::new("s1", "u1", "Seaview", "https://example.com/cal.ics");

        let mut plan = ReconcilePlan::default();
        plan.create.push(event("a"));
        store.apply(&source, &plan).await.unwrap();

        let active = store.active_bookings("s1").await.unwrap();
        assert_eq!(active.len(), 1);

        let mut plan = ReconcilePlan::default();
        plan.vanish.push(active[0].id);
        store.apply(&source, &plan).await.unwrap();

        assert!(store.active_bookings("s1").await.unwrap().is_empty());
        let all = store.all_bookings("s1").await.unwrap();
        assert_eq!(all.len(), 1, "tombstoned rows stay queryable for audit");
        assert!(all[0].deleted_at.is_some());

        let counts = store.counts("s1").await.unwrap();
        assert_eq!(counts.active, 0);
        assert_eq!(counts.tombstoned, 1);
    }

    #[tokio::test]
    async fn test_apply_rejects_duplicate_active_uid_without_partial_state() {
        let store = MemoryStore::new();
        let source = FeedSource::new("s1", "u1", "Seaview", "https://example.com/cal.ics");

        let mut plan = ReconcilePlan::default();
        plan.create.push(event("dup"));
        store.apply(&source, &plan).await.unwrap();

        let mut bad = ReconcilePlan::default();
        bad.create.push(event("fresh"));
        bad.create.push(event("dup"));
        let result = store.apply(&source, &bad).await;

        assert!(result.is_err());
        let all = store.all_bookings("s1").await.unwrap();
        assert_eq!(all.len(), 1, "a rejected plan must not leave partial state");
    }

    #[tokio::test]
    async fn test_update_status_only_touches_sync_fields() {
        let store = MemoryStore::new();
        let source = FeedSource::new("s1", "u1", "Seaview", "https://example.com/cal.ics");
        store.upsert_source(source.clone()).await.unwrap();

        let mut after_run = source.clone();
        after_run.name = "Renamed elsewhere".to_string();
        after_run.mark_error(Utc::now(), "boom", crate::stats::SyncStats::failed("boom"));
        store.update_status(&after_run).await.unwrap();

        let stored = store.get_source("s1").await.unwrap().unwrap();
        assert_eq!(stored.name, "Seaview", "operator fields are not overwritten");
        assert_eq!(stored.last_status, crate::source::SyncStatus::Error);
        assert_eq!(stored.last_error.as_deref(), Some("boom"));
    }
}
