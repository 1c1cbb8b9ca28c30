//! JSON-file-backed store.
//!
//! Layout under the data directory:
//!
//! ```text
//! units.json
//! sources.json
//! bookings/<source_id>.json
//! ```
//!
//! Every write goes through a temp file + rename, so a crash mid-write
//! never leaves a torn document. Mutations hold the store's write lock
//! across the file write, which serializes concurrent reconciliation of
//! the same source.

use async_trait::async_trait;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::booking::Booking;
use crate::error::{SyncError, SyncResult};
use crate::reconcile::ReconcilePlan;
use crate::source::FeedSource;
use crate::store::{apply_plan, BookingCounts, BookingStore, SourceStore, StoreState};
use crate::unit::Unit;

const UNITS_FILE: &str = "units.json";
const SOURCES_FILE: &str = "sources.json";
const BOOKINGS_DIR: &str = "bookings";

pub struct JsonStore {
    dir: PathBuf,
    state: RwLock<StoreState>,
}

impl JsonStore {
    /// Open (and if necessary create) a store at `dir`, loading all
    /// existing documents into memory.
    pub fn open(dir: impl Into<PathBuf>) -> SyncResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(dir.join(BOOKINGS_DIR))?;

        let mut state = StoreState::default();
        state.units = read_document(&dir.join(UNITS_FILE))?.unwrap_or_default();
        state.sources = read_document(&dir.join(SOURCES_FILE))?.unwrap_or_default();

        for entry in fs::read_dir(dir.join(BOOKINGS_DIR))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let source_id = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => stem.to_string(),
                None => continue,
            };
            let rows: Vec<Booking> = read_document(&path)?.unwrap_or_default();
            state.bookings.insert(source_id, rows);
        }

        Ok(JsonStore {
            dir,
            state: RwLock::new(state),
        })
    }

    fn units_path(&self) -> PathBuf {
        self.dir.join(UNITS_FILE)
    }

    fn sources_path(&self) -> PathBuf {
        self.dir.join(SOURCES_FILE)
    }

    fn bookings_path(&self, source_id: &str) -> PathBuf {
        self.dir.join(BOOKINGS_DIR).join(format!("{source_id}.json"))
    }
}

fn read_document<T: serde::de::DeserializeOwned>(path: &Path) -> SyncResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    let value = serde_json::from_str(&contents).map_err(|e| {
        SyncError::Serialization(format!("{}: {e}", path.display()))
    })?;
    Ok(Some(value))
}

/// Write via temp file + rename (atomic on the same filesystem).
fn write_document<T: serde::Serialize>(path: &Path, value: &T) -> SyncResult<()> {
    let contents = serde_json::to_string_pretty(value)
        .map_err(|e| SyncError::Serialization(e.to_string()))?;
    let temp = path.with_extension("json.tmp");
    fs::write(&temp, contents)?;
    fs::rename(&temp, path)?;
    Ok(())
}

#[async_trait]
impl SourceStore for JsonStore {
    async fn list_units(&self) -> SyncResult<Vec<Unit>> {
        Ok(self.state.read().await.units.clone())
    }

    async fn upsert_unit(&self, unit: Unit) -> SyncResult<()> {
        let mut state = self.state.write().await;
        state.upsert_unit(unit);
        write_document(&self.units_path(), &state.units)
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
        let mut state = self.state.write().await;
        state.upsert_source(source);
        write_document(&self.sources_path(), &state.sources)
    }

    async fn set_enabled(&self, id: &str, enabled: bool) -> SyncResult<()> {
        let mut state = self.state.write().await;
        state.source_mut(id)?.enabled = enabled;
        write_document(&self.sources_path(), &state.sources)
    }

    async fn update_status(&self, source: &FeedSource) -> SyncResult<()> {
        let mut state = self.state.write().await;
        state.update_status(source)?;
        write_document(&self.sources_path(), &state.sources)
    }
}

#[async_trait]
impl BookingStore for JsonStore {
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

        // Mutate a copy, persist it, then commit to memory. A failed
        // file write leaves both disk and memory on the prior state.
        let mut next = state.bookings.get(&source.id).cloned().unwrap_or_default();
        apply_plan(&mut next, source, plan, Utc::now())?;
        write_document(&self.bookings_path(&source.id), &next)?;
        state.bookings.insert(source.id.clone(), next);
        Ok(())
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
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let source = FeedSource::new("s1", "u1", "Seaview", "https://example.com/cal.ics");

        {
            let store = JsonStore::open(dir.path()).unwrap();
            store.upsert_unit(Unit::new("u1", "Seaview Flat")).await.unwrap();
            store.upsert_source(source.clone()).await.unwrap();

            let mut plan = ReconcilePlan::default();
            plan.create.push(event("a"));
            store.apply(&source, &plan).await.unwrap();
        }

        let reopened = JsonStore::open(dir.path()).unwrap();
        assert_eq!(reopened.list_units().await.unwrap().len(), 1);
        assert_eq!(reopened.list_sources().await.unwrap().len(), 1);

        let active = reopened.active_bookings("s1").await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].uid, "a");
    }

    #[tokio::test]
    async fn test_tombstones_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let source = FeedSource::new("s1", "u1", "Seaview", "https://example.com/cal.ics");

        {
            let store = JsonStore::open(dir.path()).unwrap();
            store.upsert_source(source.clone()).await.unwrap();

            let mut plan = ReconcilePlan::default();
            plan.create.push(event("gone"));
            store.apply(&source, &plan).await.unwrap();

            let id = store.active_bookings("s1").await.unwrap()[0].id;
            let mut plan = ReconcilePlan::default();
            plan.vanish.push(id);
            store.apply(&source, &plan).await.unwrap();
        }

        let reopened = JsonStore::open(dir.path()).unwrap();
        assert!(reopened.active_bookings("s1").await.unwrap().is_empty());
        let all = reopened.all_bookings("s1").await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].deleted_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_data_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("data").join("rentcal");
        let store = JsonStore::open(&nested).unwrap();
        assert!(store.list_sources().await.unwrap().is_empty());
        assert!(nested.join("bookings").is_dir());
    }
}
