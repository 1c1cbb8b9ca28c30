//! Persistence contracts and bundled store implementations.
//!
//! The sync engine consumes persistence through the `SourceStore` and
//! `BookingStore` traits; everything behind them is swappable. Two
//! implementations ship with the crate: `MemoryStore` (tests,
//! single-process experiments) and `JsonStore` (JSON documents on disk
//! with atomic writes).

mod json;
mod memory;

pub use json::JsonStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::booking::Booking;
use crate::error::{SyncError, SyncResult};
use crate::reconcile::ReconcilePlan;
use crate::source::FeedSource;
use crate::unit::Unit;

/// Active/tombstoned booking counts for one source.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BookingCounts {
    pub active: usize,
    pub tombstoned: usize,
}

/// Units and feed sources.
#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn list_units(&self) -> SyncResult<Vec<Unit>>;
    async fn upsert_unit(&self, unit: Unit) -> SyncResult<()>;

    /// All sources, enabled or not, in insertion order.
    async fn list_sources(&self) -> SyncResult<Vec<FeedSource>>;
    /// All enabled sources (the coordinator's enumeration query).
    async fn list_enabled(&self) -> SyncResult<Vec<FeedSource>>;
    async fn get_source(&self, id: &str) -> SyncResult<Option<FeedSource>>;
    async fn upsert_source(&self, source: FeedSource) -> SyncResult<()>;
    async fn set_enabled(&self, id: &str, enabled: bool) -> SyncResult<()>;

    /// Write back a source's last-sync status fields after a run. Only the
    /// orchestrator calls this; operator-owned fields are left untouched.
    async fn update_status(&self, source: &FeedSource) -> SyncResult<()>;
}

/// Bookings, scoped by source.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Non-tombstoned bookings for one source.
    async fn active_bookings(&self, source_id: &str) -> SyncResult<Vec<Booking>>;
    /// Every booking for one source, tombstones included (audit).
    async fn all_bookings(&self, source_id: &str) -> SyncResult<Vec<Booking>>;
    /// Active bookings across all of a unit's sources.
    async fn bookings_for_unit(&self, unit_id: &str) -> SyncResult<Vec<Booking>>;
    async fn counts(&self, source_id: &str) -> SyncResult<BookingCounts>;

    /// Apply a reconcile plan as a single atomic unit: either every change
    /// in the plan commits, or none do.
    async fn apply(&self, source: &FeedSource, plan: &ReconcilePlan) -> SyncResult<()>;
}

/// Apply a plan to one source's booking rows.
///
/// Validates the whole plan before mutating anything, so an error leaves
/// the rows untouched. This is what makes `apply` all-or-nothing for the
/// bundled stores.
pub(crate) fn apply_plan(
    bookings: &mut Vec<Booking>,
    source: &FeedSource,
    plan: &ReconcilePlan,
    now: DateTime<Utc>,
) -> SyncResult<()> {
    for event in &plan.create {
        if bookings.iter().any(|b| b.is_active() && b.uid == event.uid) {
            return Err(SyncError::Reconcile(format!(
                "active booking already exists for uid {} in source {}",
                event.uid, source.id
            )));
        }
    }

    let index_by_id: HashMap<Uuid, usize> = bookings
        .iter()
        .enumerate()
        .map(|(i, b)| (b.id, i))
        .collect();

    let referenced = plan
        .update
        .iter()
        .map(|(id, _)| id)
        .chain(&plan.seen)
        .chain(&plan.missed)
        .chain(&plan.vanish);
    for id in referenced {
        if !index_by_id.contains_key(id) {
            return Err(SyncError::Reconcile(format!(
                "plan references unknown booking {id} in source {}",
                source.id
            )));
        }
    }

    for (id, event) in &plan.update {
        bookings[index_by_id[id]].apply_event(event, now);
    }
    for id in &plan.seen {
        bookings[index_by_id[id]].touch(now);
    }
    for id in &plan.missed {
        bookings[index_by_id[id]].record_miss();
    }
    for id in &plan.vanish {
        bookings[index_by_id[id]].tombstone(now);
    }
    for event in &plan.create {
        bookings.push(Booking::from_event(source, event, now));
    }

    Ok(())
}

/// Shared in-memory representation used by both bundled stores.
#[derive(Debug, Default, Clone)]
pub(crate) struct StoreState {
    pub units: Vec<Unit>,
    pub sources: Vec<FeedSource>,
    pub bookings: HashMap<String, Vec<Booking>>,
}

impl StoreState {
    pub fn upsert_unit(&mut self, unit: Unit) {
        match self.units.iter_mut().find(|u| u.id == unit.id) {
            Some(existing) => *existing = unit,
            None => self.units.push(unit),
        }
    }

    pub fn upsert_source(&mut self, source: FeedSource) {
        match self.sources.iter_mut().find(|s| s.id == source.id) {
            Some(existing) => *existing = source,
            None => self.sources.push(source),
        }
    }

    pub fn source_mut(&mut self, id: &str) -> SyncResult<&mut FeedSource> {
        self.sources
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| SyncError::SourceNotFound(id.to_string()))
    }

    /// Copy the last-sync fields from `from` onto the stored row.
    pub fn update_status(&mut self, from: &FeedSource) -> SyncResult<()> {
        let stored = self.source_mut(&from.id)?;
        stored.last_synced_at = from.last_synced_at;
        stored.last_status = from.last_status;
        stored.last_error = from.last_error.clone();
        stored.last_stats = from.last_stats.clone();
        Ok(())
    }

    pub fn counts(&self, source_id: &str) -> BookingCounts {
        let mut counts = BookingCounts::default();
        if let Some(rows) = self.bookings.get(source_id) {
            for booking in rows {
                if booking.is_active() {
                    counts.active += 1;
                } else {
                    counts.tombstoned += 1;
                }
            }
        }
        counts
    }
}
