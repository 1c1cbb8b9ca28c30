//! Booking records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::ParsedEvent;
use crate::source::FeedSource;

/// A reservation synced from an external feed.
///
/// Invariant: for a given (source, uid) pair, at most one non-tombstoned
/// booking exists. Sync never physically deletes rows; a booking that
/// disappears from its feed is tombstoned via `deleted_at` once its
/// consecutive miss count crosses the vanish threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub unit_id: String,
    pub source_id: String,
    /// External identifier from the upstream feed.
    pub uid: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub summary: String,

    /// Consecutive sync runs in which this booking's uid was absent.
    #[serde(default)]
    pub miss_count: u32,
    /// Tombstone. Set once, never cleared; a reappearing uid gets a fresh row.
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,

    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Create a booking from a parsed event, denormalizing the unit
    /// reference from the owning source.
    pub fn from_event(source: &FeedSource, event: &ParsedEvent, now: DateTime<Utc>) -> Self {
        Booking {
            id: Uuid::new_v4(),
            unit_id: source.unit_id.clone(),
            source_id: source.id.clone(),
            uid: event.uid.clone(),
            check_in: event.start,
            check_out: event.end,
            summary: event.summary.clone(),
            miss_count: 0,
            deleted_at: None,
            last_seen_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Whether the stored dates/summary differ from the feed's current data.
    pub fn differs_from(&self, event: &ParsedEvent) -> bool {
        self.check_in != event.start
            || self.check_out != event.end
            || self.summary != event.summary
    }

    /// Overwrite dates/metadata from an amended feed event, preserving the
    /// booking's identity.
    pub fn apply_event(&mut self, event: &ParsedEvent, now: DateTime<Utc>) {
        self.check_in = event.start;
        self.check_out = event.end;
        self.summary = event.summary.clone();
        self.miss_count = 0;
        self.last_seen_at = now;
        self.updated_at = now;
    }

    /// Record that the booking appeared in the current run unchanged.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.miss_count = 0;
        self.last_seen_at = now;
    }

    /// Record one more consecutive miss.
    pub fn record_miss(&mut self) {
        self.miss_count += 1;
    }

    /// Tombstone the booking. The row stays queryable for audit.
    pub fn tombstone(&mut self, now: DateTime<Utc>) {
        self.miss_count += 1;
        self.deleted_at = Some(now);
        self.updated_at = now;
    }
}
