//! HTTP surface: booking reads, sync inspection, request-driven trigger.

use anyhow::Result;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::routes;
use crate::scheduler;
use crate::state::AppState;

pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Only the public booking reads evaluate the sync trigger; the
    // /sync admin surface stays out of the trigger path.
    let public = routes::units::router()
        .layer(middleware::from_fn_with_state(state.clone(), trigger_sync));

    let app = Router::new()
        .merge(public)
        .merge(routes::sync::router())
        .with_state(state)
        .layer(cors);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!(%addr, "rentcal listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Opportunistic sync trigger, evaluated on qualifying requests.
/// Fire-and-forget: the response to the triggering request is untouched.
async fn trigger_sync(State(state): State<AppState>, request: Request, next: Next) -> Response {
    scheduler::maybe_trigger(&state);
    next.run(request).await
}
