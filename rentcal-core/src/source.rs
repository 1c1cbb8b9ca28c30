//! Configured feed sources.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::stats::SyncStats;

/// Outcome of a source's most recent sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Never,
    Success,
    Error,
}

/// One configured external calendar feed, tied to a unit.
///
/// Created and edited by an operator; the `last_*` fields are written only
/// by the sync orchestrator after each run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSource {
    /// Operator-chosen slug, e.g. "seaview-airbnb".
    pub id: String,
    pub unit_id: String,
    pub name: String,
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Minimum age before this source is re-synced within a batch, in
    /// seconds. None means the source syncs on every batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_interval_secs: Option<u64>,
    /// Per-source override of the global vanish threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vanish_threshold: Option<u32>,

    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_stats: Option<SyncStats>,
}

fn default_enabled() -> bool {
    true
}

impl FeedSource {
    pub fn new(
        id: impl Into<String>,
        unit_id: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        FeedSource {
            id: id.into(),
            unit_id: unit_id.into(),
            name: name.into(),
            url: url.into(),
            enabled: true,
            sync_interval_secs: None,
            vanish_threshold: None,
            last_synced_at: None,
            last_status: SyncStatus::Never,
            last_error: None,
            last_stats: None,
        }
    }

    /// Whether the source is due for a sync at `now`. Sources without an
    /// interval are always due; a forced run bypasses this entirely.
    pub fn due(&self, now: DateTime<Utc>) -> bool {
        match (self.sync_interval_secs, self.last_synced_at) {
            (Some(interval), Some(last)) => now - last >= Duration::seconds(interval as i64),
            _ => true,
        }
    }

    pub fn mark_success(&mut self, now: DateTime<Utc>, stats: SyncStats) {
        self.last_synced_at = Some(now);
        self.last_status = SyncStatus::Success;
        self.last_error = None;
        self.last_stats = Some(stats);
    }

    pub fn mark_error(&mut self, now: DateTime<Utc>, error: impl Into<String>, stats: SyncStats) {
        self.last_synced_at = Some(now);
        self.last_status = SyncStatus::Error;
        self.last_error = Some(error.into());
        self.last_stats = Some(stats);
    }
}
