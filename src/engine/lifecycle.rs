//! Ride status transitions. Every guard checks the current status and
//! writes the new one inside the ride entry's exclusive map lock, so two
//! racing requests cannot both observe the precondition. Broadcasts and
//! notifications happen after the lock is released and are best-effort;
//! they never roll the transition back.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::actor::Role;
use crate::models::ride::{
    GeoPoint, RatingEntry, RatingSubject, Ride, RideStatus, TrackedPosition,
};
use crate::notify;
use crate::state::AppState;

/// Claim a pending ride for a rider. This is the one compare-and-swap in
/// the system: of any number of concurrent accepts, exactly one finds the
/// ride still pending; the rest surface `AlreadyAssigned`.
pub fn accept(state: &AppState, ride_id: Uuid, rider_id: Uuid) -> Result<Ride, AppError> {
    let rider = state
        .directory
        .get(rider_id)
        .ok_or_else(|| AppError::NotFound(format!("rider {rider_id} not found")))?;
    if !rider.is_online {
        return Err(AppError::Validation(format!(
            "rider {rider_id} is offline"
        )));
    }

    let updated = {
        let mut ride = state
            .rides
            .get_mut(&ride_id)
            .ok_or_else(|| AppError::NotFound(format!("ride {ride_id} not found")))?;

        match ride.status {
            RideStatus::Pending => {
                ride.status = RideStatus::Accepted;
                ride.rider_id = Some(rider_id);
                ride.updated_at = Utc::now();
                ride.clone()
            }
            RideStatus::Accepted | RideStatus::Ongoing | RideStatus::Completed => {
                return Err(AppError::AlreadyAssigned);
            }
            RideStatus::Cancelled => {
                return Err(AppError::InvalidTransition {
                    from: ride.status,
                    event: "accept",
                });
            }
        }
    };

    info!(ride_id = %ride_id, rider_id = %rider_id, "ride accepted");
    after_transition(state, &updated);
    Ok(updated)
}

/// Begin the trip. The rider reads the customer's one-time passcode in
/// person; a mismatch leaves the ride accepted.
pub fn start(state: &AppState, ride_id: Uuid, passcode: &str) -> Result<Ride, AppError> {
    let updated = {
        let mut ride = state
            .rides
            .get_mut(&ride_id)
            .ok_or_else(|| AppError::NotFound(format!("ride {ride_id} not found")))?;

        if ride.status != RideStatus::Accepted {
            return Err(AppError::InvalidTransition {
                from: ride.status,
                event: "start",
            });
        }
        if ride.passcode != passcode {
            return Err(AppError::Validation("incorrect passcode".to_string()));
        }

        ride.status = RideStatus::Ongoing;
        ride.passcode_verified = true;
        ride.updated_at = Utc::now();
        ride.clone()
    };

    info!(ride_id = %ride_id, "ride started");
    after_transition(state, &updated);
    Ok(updated)
}

/// Finish the trip and credit the rider with the full fare.
pub fn complete(state: &AppState, ride_id: Uuid) -> Result<Ride, AppError> {
    let updated = {
        let mut ride = state
            .rides
            .get_mut(&ride_id)
            .ok_or_else(|| AppError::NotFound(format!("ride {ride_id} not found")))?;

        if ride.status != RideStatus::Ongoing {
            return Err(AppError::InvalidTransition {
                from: ride.status,
                event: "complete",
            });
        }

        ride.status = RideStatus::Completed;
        ride.updated_at = Utc::now();
        ride.clone()
    };

    if let Some(rider_id) = updated.rider_id {
        state
            .directory
            .credit_completion(rider_id, updated.fare.total_fare);
    }

    info!(ride_id = %ride_id, fare = updated.fare.total_fare, "ride completed");
    after_transition(state, &updated);
    Ok(updated)
}

/// Cancel from any non-terminal state, subject to who is asking.
pub fn cancel(state: &AppState, ride_id: Uuid, role: Role) -> Result<Ride, AppError> {
    let updated = {
        let mut ride = state
            .rides
            .get_mut(&ride_id)
            .ok_or_else(|| AppError::NotFound(format!("ride {ride_id} not found")))?;

        if ride.status.is_terminal() {
            return Err(AppError::InvalidTransition {
                from: ride.status,
                event: "cancel",
            });
        }
        if !role.may_cancel(ride.status) {
            return Err(AppError::Forbidden(format!(
                "{role:?} may not cancel a {} ride",
                ride.status
            )));
        }

        ride.status = RideStatus::Cancelled;
        ride.updated_at = Utc::now();
        ride.clone()
    };

    info!(ride_id = %ride_id, ?role, "ride cancelled");
    after_transition(state, &updated);
    Ok(updated)
}

/// Apply a position sample from the assigned rider. Accepted from the
/// `accepted` status onward, so customers can watch the rider approach
/// the pickup before the trip starts. Samples are advisory telemetry
/// (last-write-wins, no sequencing) and go to the ride's room only.
pub fn record_position(
    state: &AppState,
    ride_id: Uuid,
    rider_id: Uuid,
    point: GeoPoint,
) -> Result<Ride, AppError> {
    let sample = TrackedPosition {
        point,
        updated_at: Utc::now(),
    };

    let updated = {
        let mut ride = state
            .rides
            .get_mut(&ride_id)
            .ok_or_else(|| AppError::NotFound(format!("ride {ride_id} not found")))?;

        if !matches!(ride.status, RideStatus::Accepted | RideStatus::Ongoing) {
            return Err(AppError::InvalidState(format!(
                "position updates are not accepted for a {} ride",
                ride.status
            )));
        }
        if ride.rider_id != Some(rider_id) {
            return Err(AppError::Forbidden(
                "only the assigned rider may report position".to_string(),
            ));
        }

        ride.rider_location = Some(sample);
        ride.updated_at = sample.updated_at;
        ride.clone()
    };

    if let Err(err) = state.directory.update_position(rider_id, point) {
        warn!(rider_id = %rider_id, error = %err, "directory position update failed");
    }

    state
        .broadcaster
        .publish_position(ride_id, sample.point, sample.updated_at);
    state
        .metrics
        .ride_events_total
        .with_label_values(&["riderLocationUpdate"])
        .inc();

    Ok(updated)
}

/// Record a rating for one side of a completed ride. Rating the rider
/// folds the score into the directory's running average.
pub fn rate(
    state: &AppState,
    ride_id: Uuid,
    subject: RatingSubject,
    score: f64,
    review: Option<String>,
) -> Result<Ride, AppError> {
    if !(0.0..=5.0).contains(&score) {
        return Err(AppError::Validation(
            "rating must be between 0 and 5".to_string(),
        ));
    }

    let updated = {
        let mut ride = state
            .rides
            .get_mut(&ride_id)
            .ok_or_else(|| AppError::NotFound(format!("ride {ride_id} not found")))?;

        if ride.status != RideStatus::Completed {
            return Err(AppError::InvalidState(
                "can only rate completed rides".to_string(),
            ));
        }

        let slot = match subject {
            RatingSubject::Rider => &mut ride.ratings.by_customer,
            RatingSubject::Customer => &mut ride.ratings.by_rider,
        };
        if slot.is_some() {
            return Err(AppError::Validation(format!(
                "{subject:?} rating already recorded"
            )));
        }
        *slot = Some(RatingEntry { score, review });
        ride.updated_at = Utc::now();
        ride.clone()
    };

    if subject == RatingSubject::Rider {
        if let Some(rider_id) = updated.rider_id {
            let stats = state.directory.record_rating(rider_id, score)?;
            info!(rider_id = %rider_id, average = stats.average, count = stats.count, "rider rating updated");
        }
    }

    Ok(updated)
}

/// Common tail of every transition: count it, fan it out, tell the
/// customer. Downstream failure here is logged inside the collaborators
/// and never reaches the caller.
fn after_transition(state: &AppState, ride: &Ride) {
    state
        .metrics
        .rides_total
        .with_label_values(&[&ride.status.to_string()])
        .inc();
    state.broadcaster.publish_ride_update(ride);
    state
        .metrics
        .ride_events_total
        .with_label_values(&["rideUpdate"])
        .inc();
    notify::ride_status_changed(state.notifier.as_ref(), ride);
}
