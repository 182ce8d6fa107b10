use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use chrono::Local;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::assignment::{self, AssignmentOutcome};
use crate::engine::lifecycle;
use crate::error::AppError;
use crate::fare;
use crate::models::actor::Role;
use crate::models::ride::{
    CustomerContact, GeoPoint, Place, RatingSubject, Ride, RideStatus,
};
use crate::notify;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rides", post(book_ride).get(list_rides))
        .route("/rides/pending", get(list_pending))
        .route("/rides/:id", get(get_ride))
        .route("/rides/:id/accept", post(accept_ride))
        .route("/rides/:id/start", post(start_ride))
        .route("/rides/:id/complete", post(complete_ride))
        .route("/rides/:id/cancel", post(cancel_ride))
        .route("/rides/:id/location", post(update_rider_location))
        .route("/rides/:id/rating", post(rate_ride))
}

fn validate_point(label: &str, point: &GeoPoint) -> Result<(), AppError> {
    let in_range = point.lat.is_finite()
        && point.lng.is_finite()
        && (-90.0..=90.0).contains(&point.lat)
        && (-180.0..=180.0).contains(&point.lng);

    if in_range {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "invalid {label} coordinates"
        )))
    }
}

#[derive(Deserialize)]
pub struct BookRideRequest {
    pub customer: CustomerContact,
    pub pickup: Place,
    pub dropoff: Place,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRideResponse {
    #[serde(flatten)]
    pub ride: Ride,
    pub auto_assigned: bool,
    pub assignment_message: String,
}

/// Book a ride: quote the fare, create the pending record, announce it,
/// then make the single auto-assignment attempt. A booking that finds no
/// rider still succeeds; the ride waits in the pending queue.
async fn book_ride(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BookRideRequest>,
) -> Result<Json<BookRideResponse>, AppError> {
    validate_point("pickup", &payload.pickup.point)?;
    validate_point("dropoff", &payload.dropoff.point)?;

    let quote = fare::quote(
        &state.fare,
        &payload.pickup.point,
        &payload.dropoff.point,
        Local::now().time(),
    );

    let ride = Ride::new(
        payload.customer,
        payload.pickup,
        payload.dropoff,
        quote.distance_km,
        quote.fare,
    );
    state.rides.insert(ride.id, ride.clone());
    state
        .metrics
        .rides_total
        .with_label_values(&["pending"])
        .inc();

    notify::ride_booked(state.notifier.as_ref(), &ride);
    state.broadcaster.publish_new_ride(&ride);
    state
        .metrics
        .ride_events_total
        .with_label_values(&["newRide"])
        .inc();

    let (auto_assigned, assignment_message) = match assignment::auto_assign(&state, ride.id)? {
        AssignmentOutcome::Assigned { distance_km, .. } => {
            (true, format!("Rider assigned ({distance_km:.2} km away)"))
        }
        AssignmentOutcome::NoRidersAvailable => (false, "No riders available".to_string()),
    };

    let ride = state
        .rides
        .get(&ride.id)
        .map(|r| r.value().clone())
        .ok_or_else(|| AppError::Internal("booked ride vanished".to_string()))?;

    Ok(Json(BookRideResponse {
        ride,
        auto_assigned,
        assignment_message,
    }))
}

async fn list_rides(State(state): State<Arc<AppState>>) -> Json<Vec<Ride>> {
    let mut rides: Vec<Ride> = state.rides.iter().map(|e| e.value().clone()).collect();
    rides.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(rides)
}

/// The claimable queue riders browse; newest first.
async fn list_pending(State(state): State<Arc<AppState>>) -> Json<Vec<Ride>> {
    let mut rides: Vec<Ride> = state
        .rides
        .iter()
        .filter(|e| e.status == RideStatus::Pending)
        .map(|e| e.value().clone())
        .collect();
    rides.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(rides)
}

async fn get_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    let ride = state
        .rides
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("ride {id} not found")))?;

    Ok(Json(ride.value().clone()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptRideRequest {
    pub rider_id: Uuid,
}

async fn accept_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AcceptRideRequest>,
) -> Result<Json<Ride>, AppError> {
    let ride = lifecycle::accept(&state, id, payload.rider_id)?;
    Ok(Json(ride))
}

#[derive(Deserialize)]
pub struct StartRideRequest {
    pub passcode: String,
}

async fn start_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StartRideRequest>,
) -> Result<Json<Ride>, AppError> {
    let ride = lifecycle::start(&state, id, &payload.passcode)?;
    Ok(Json(ride))
}

async fn complete_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    let ride = lifecycle::complete(&state, id)?;
    Ok(Json(ride))
}

#[derive(Deserialize)]
pub struct CancelRideRequest {
    pub role: Role,
}

async fn cancel_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelRideRequest>,
) -> Result<Json<Ride>, AppError> {
    let ride = lifecycle::cancel(&state, id, payload.role)?;
    Ok(Json(ride))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLocationRequest {
    pub rider_id: Uuid,
    pub lat: f64,
    pub lng: f64,
}

async fn update_rider_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Ride>, AppError> {
    let point = GeoPoint {
        lat: payload.lat,
        lng: payload.lng,
    };
    validate_point("rider", &point)?;

    let ride = lifecycle::record_position(&state, id, payload.rider_id, point)?;
    Ok(Json(ride))
}

#[derive(Deserialize)]
pub struct RateRideRequest {
    pub subject: RatingSubject,
    pub score: f64,
    pub review: Option<String>,
}

async fn rate_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RateRideRequest>,
) -> Result<Json<Ride>, AppError> {
    let ride = lifecycle::rate(&state, id, payload.subject, payload.score, payload.review)?;
    Ok(Json(ride))
}
