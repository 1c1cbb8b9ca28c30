//! Sync run statistics.

use serde::{Deserialize, Serialize};

/// Statistics for one source's sync run.
///
/// `deleted` counts bookings tombstoned this run; `vanished` counts
/// bookings that missed this run but are still below the vanish
/// threshold. The two are disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Events in the parsed feed (after duplicate collapsing).
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub vanished: usize,
    /// Events rejected individually during parsing (e.g. inverted ranges).
    pub skipped: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncStats {
    /// A successful run over `total` events; deltas filled in by the caller.
    pub fn ok(total: usize) -> Self {
        SyncStats {
            total,
            success: true,
            ..Default::default()
        }
    }

    /// A failed run. All deltas zero, error captured.
    pub fn failed(error: impl Into<String>) -> Self {
        SyncStats {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn has_changes(&self) -> bool {
        self.created > 0 || self.updated > 0 || self.deleted > 0 || self.vanished > 0
    }

    /// Accumulate another run's counters (error/success flags untouched).
    pub fn add(&mut self, other: &SyncStats) {
        self.total += other.total;
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.vanished += other.vanished;
        self.skipped += other.skipped;
    }
}

/// Aggregate of one batch across all enabled sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Sources the batch attempted.
    pub sources: usize,
    /// Sources whose run failed.
    pub failed: usize,
    /// Summed per-key deltas across all sources.
    pub stats: SyncStats,
}

impl BatchSummary {
    pub fn absorb(&mut self, stats: &SyncStats) {
        self.sources += 1;
        if !stats.success {
            self.failed += 1;
        }
        self.stats.add(stats);
    }
}
