//! Sync inspection and manual trigger endpoints.
//!
//! This is the operator's read-only window into the sync subsystem; end
//! users never see sync failures.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use rentcal_core::store::{BookingCounts, BookingStore, SourceStore};
use rentcal_core::{BatchSummary, FeedSource, SyncStats, SyncStatus};

use crate::routes::AppError;
use crate::scheduler;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sync/sources", get(list_sources))
        .route("/sync/sources/{id}", get(get_source))
        .route("/sync/run", post(run_sync))
}

/// Source sync status returned by API
#[derive(Serialize)]
pub struct SourceInfo {
    pub id: String,
    pub unit_id: String,
    pub name: String,
    pub url: String,
    pub enabled: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_status: SyncStatus,
    pub last_error: Option<String>,
    pub last_stats: Option<SyncStats>,
    pub bookings: BookingCounts,
}

impl SourceInfo {
    fn new(source: FeedSource, bookings: BookingCounts) -> Self {
        SourceInfo {
            id: source.id,
            unit_id: source.unit_id,
            name: source.name,
            url: source.url,
            enabled: source.enabled,
            last_synced_at: source.last_synced_at,
            last_status: source.last_status,
            last_error: source.last_error,
            last_stats: source.last_stats,
            bookings,
        }
    }
}

/// GET /sync/sources - All sources with status and booking counts
async fn list_sources(State(state): State<AppState>) -> Result<Json<Vec<SourceInfo>>, AppError> {
    let sources = state.store.list_sources().await?;

    let mut out = Vec::with_capacity(sources.len());
    for source in sources {
        let counts = state.store.counts(&source.id).await?;
        out.push(SourceInfo::new(source, counts));
    }

    Ok(Json(out))
}

/// GET /sync/sources/:id - One source's status
async fn get_source(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SourceInfo>, AppError> {
    let source = state
        .store
        .get_source(&id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Source not found: {}", id))?;

    let counts = state.store.counts(&source.id).await?;
    Ok(Json(SourceInfo::new(source, counts)))
}

/// Response body for POST /sync/run
#[derive(Serialize)]
pub struct RunResponse {
    pub started: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<BatchSummary>,
}

/// POST /sync/run - Run a batch now, unless one is already in flight
async fn run_sync(State(state): State<AppState>) -> Result<Json<RunResponse>, AppError> {
    match scheduler::run_now(&state, true).await? {
        Some(summary) => Ok(Json(RunResponse {
            started: true,
            summary: Some(summary),
        })),
        None => Ok(Json(RunResponse {
            started: false,
            summary: None,
        })),
    }
}
