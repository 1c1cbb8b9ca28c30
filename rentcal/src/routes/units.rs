//! Unit and booking read endpoints.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use rentcal_core::store::{BookingStore, SourceStore};
use rentcal_core::Booking;

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/units", get(list_units))
        .route("/units/{id}/bookings", get(list_bookings))
}

/// Unit info returned by API
#[derive(Serialize)]
pub struct UnitInfo {
    pub id: String,
    pub name: String,
    pub active_bookings: usize,
}

/// GET /units - List all units with their active booking counts
async fn list_units(State(state): State<AppState>) -> Result<Json<Vec<UnitInfo>>, AppError> {
    let units = state.store.list_units().await?;

    let mut out = Vec::with_capacity(units.len());
    for unit in units {
        let bookings = state.store.bookings_for_unit(&unit.id).await?;
        out.push(UnitInfo {
            id: unit.id,
            name: unit.name,
            active_bookings: bookings.len(),
        });
    }

    Ok(Json(out))
}

/// GET /units/:id/bookings - Active bookings for a unit, tombstones excluded
async fn list_bookings(
    State(state): State<AppState>,
    Path(unit_id): Path<String>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let known = state
        .store
        .list_units()
        .await?
        .into_iter()
        .any(|u| u.id == unit_id);
    if !known {
        return Err(anyhow::anyhow!("Unit not found: {}", unit_id).into());
    }

    let bookings = state.store.bookings_for_unit(&unit_id).await?;
    Ok(Json(bookings))
}
