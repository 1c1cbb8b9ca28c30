//! Parsed feed events.
//!
//! A `ParsedEvent` is the parser's output for one reservation in an
//! upstream feed. It is ephemeral: produced per sync run, diffed against
//! stored bookings, never persisted itself.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One reservation as it appears in an upstream feed.
///
/// Dates are calendar dates (check-in / check-out); time-of-day from the
/// feed is discarded because bookings are date-ranged, not time-ranged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedEvent {
    /// External identifier, unique per source. Either the feed's UID or a
    /// deterministic fallback derived from the event's content.
    pub uid: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub summary: String,
}

impl ParsedEvent {
    /// Number of nights covered by the reservation (check-out exclusive).
    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}
