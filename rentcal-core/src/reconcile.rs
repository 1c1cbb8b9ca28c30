//! Reconciliation of parsed feed events against stored bookings.
//!
//! Split in two: `ReconcilePlan::compute` is a pure diff over one source's
//! events and active bookings, and `reconcile` applies the plan through
//! the booking store as a single atomic unit and reports statistics.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::booking::Booking;
use crate::error::SyncResult;
use crate::event::ParsedEvent;
use crate::source::FeedSource;
use crate::stats::SyncStats;
use crate::store::BookingStore;

/// The set of changes one sync run wants to apply for a single source.
#[derive(Debug, Default)]
pub struct ReconcilePlan {
    /// Unseen uids: create a booking.
    pub create: Vec<ParsedEvent>,
    /// Known uids with changed dates/summary: overwrite in place.
    pub update: Vec<(Uuid, ParsedEvent)>,
    /// Known uids, unchanged: refresh last-seen, reset the miss counter.
    pub seen: Vec<Uuid>,
    /// Absent uids still below the vanish threshold: record one more miss.
    pub missed: Vec<Uuid>,
    /// Absent uids whose miss count crosses the threshold: tombstone.
    pub vanish: Vec<Uuid>,
}

impl ReconcilePlan {
    /// Diff parsed events against the source's active bookings.
    ///
    /// `vanish_threshold` is the number of consecutive misses after which
    /// an absent booking is tombstoned; 1 tombstones on the first miss.
    pub fn compute(
        events: &[ParsedEvent],
        active: &[Booking],
        vanish_threshold: u32,
    ) -> ReconcilePlan {
        let threshold = vanish_threshold.max(1);
        let by_uid: HashMap<&str, &Booking> =
            active.iter().map(|b| (b.uid.as_str(), b)).collect();

        let mut plan = ReconcilePlan::default();
        let mut present: HashSet<&str> = HashSet::new();

        for event in events {
            present.insert(event.uid.as_str());
            match by_uid.get(event.uid.as_str()) {
                None => plan.create.push(event.clone()),
                Some(booking) if booking.differs_from(event) => {
                    plan.update.push((booking.id, event.clone()));
                }
                Some(booking) => plan.seen.push(booking.id),
            }
        }

        for booking in active {
            if present.contains(booking.uid.as_str()) {
                continue;
            }
            // One more consecutive miss; tombstone only once the threshold
            // is crossed, to tolerate transient feed truncation.
            if booking.miss_count + 1 >= threshold {
                plan.vanish.push(booking.id);
            } else {
                plan.missed.push(booking.id);
            }
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.update.is_empty()
            && self.missed.is_empty()
            && self.vanish.is_empty()
    }

    /// Statistics for a run that applied this plan over `total` events.
    pub fn stats(&self, total: usize) -> SyncStats {
        let mut stats = SyncStats::ok(total);
        stats.created = self.create.len();
        stats.updated = self.update.len();
        stats.deleted = self.vanish.len();
        stats.vanished = self.missed.len();
        stats
    }
}

/// Diff `events` against the store and apply the resulting plan
/// atomically. A run with no changes is success with all-zero deltas.
pub async fn reconcile<S: BookingStore + ?Sized>(
    store: &S,
    source: &FeedSource,
    events: &[ParsedEvent],
    vanish_threshold: u32,
) -> SyncResult<SyncStats> {
    let active = store.active_bookings(&source.id).await?;
    let plan = ReconcilePlan::compute(events, &active, vanish_threshold);
    store.apply(source, &plan).await?;
    Ok(plan.stats(events.len()))
}
