pub mod riders;
pub mod rides;
pub mod ws;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::models::ride::RideStatus;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(rides::router())
        .merge(riders::router())
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    rides: usize,
    riders: usize,
    active_rooms: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        rides: state.rides.len(),
        riders: state.directory.count(),
        active_rooms: state.broadcaster.room_count(),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RideCounts {
    total: usize,
    pending: usize,
    accepted: usize,
    ongoing: usize,
    completed: usize,
    cancelled: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    rides: RideCounts,
    riders_total: usize,
    riders_online: usize,
    revenue_total: f64,
}

/// Dashboard roll-up: ride counts by status, rider availability, and
/// revenue over completed rides.
async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let mut counts = RideCounts {
        total: 0,
        pending: 0,
        accepted: 0,
        ongoing: 0,
        completed: 0,
        cancelled: 0,
    };
    let mut revenue_total = 0.0;

    for entry in state.rides.iter() {
        counts.total += 1;
        match entry.status {
            RideStatus::Pending => counts.pending += 1,
            RideStatus::Accepted => counts.accepted += 1,
            RideStatus::Ongoing => counts.ongoing += 1,
            RideStatus::Completed => {
                counts.completed += 1;
                revenue_total += entry.fare.total_fare;
            }
            RideStatus::Cancelled => counts.cancelled += 1,
        }
    }

    Json(StatsResponse {
        rides: counts,
        riders_total: state.directory.count(),
        riders_online: state.directory.online_count(),
        revenue_total,
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state
        .metrics
        .active_rooms
        .set(state.broadcaster.room_count() as i64);
    state
        .metrics
        .online_riders
        .set(state.directory.online_count() as i64);

    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
