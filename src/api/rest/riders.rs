use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::ride::GeoPoint;
use crate::models::rider::RiderEntry;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/riders", post(register_rider).get(list_riders))
        .route("/riders/:id", get(get_rider))
        .route("/riders/:id/online", patch(set_online))
        .route("/riders/:id/location", patch(update_location))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRiderRequest {
    pub name: String,
    pub bike_number: String,
}

async fn register_rider(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRiderRequest>,
) -> Result<Json<RiderEntry>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }

    let entry = state.directory.register(payload.name, payload.bike_number);
    Ok(Json(entry))
}

async fn list_riders(State(state): State<Arc<AppState>>) -> Json<Vec<RiderEntry>> {
    Json(state.directory.list())
}

async fn get_rider(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RiderEntry>, AppError> {
    let entry = state
        .directory
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("rider {id} not found")))?;
    Ok(Json(entry))
}

#[derive(Deserialize)]
pub struct SetOnlineRequest {
    pub online: bool,
}

async fn set_online(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetOnlineRequest>,
) -> Result<Json<RiderEntry>, AppError> {
    let entry = state.directory.set_online(id, payload.online)?;
    Ok(Json(entry))
}

/// Heartbeat position report while the rider is between rides.
/// Last-write-wins; no sequencing beyond arrival order.
#[derive(Deserialize)]
pub struct HeartbeatRequest {
    pub lat: f64,
    pub lng: f64,
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<HeartbeatRequest>,
) -> Result<Json<RiderEntry>, AppError> {
    let point = GeoPoint {
        lat: payload.lat,
        lng: payload.lng,
    };
    if !point.lat.is_finite()
        || !point.lng.is_finite()
        || !(-90.0..=90.0).contains(&point.lat)
        || !(-180.0..=180.0).contains(&point.lng)
    {
        return Err(AppError::Validation("invalid coordinates".to_string()));
    }

    let entry = state.directory.update_position(id, point)?;
    Ok(Json(entry))
}
