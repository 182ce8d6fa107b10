use std::time::Instant;

use tracing::info;
use uuid::Uuid;

use crate::directory::OnlineRider;
use crate::engine::lifecycle;
use crate::error::AppError;
use crate::geo::haversine_km;
use crate::models::ride::GeoPoint;
use crate::state::AppState;

/// Riders without a position fix rank behind everyone with one, but stay
/// assignable as a last resort.
pub const NO_FIX_DISTANCE_KM: f64 = 999.0;

/// One row of an assignment attempt; computed per attempt, never stored.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub rider_id: Uuid,
    pub distance_km: f64,
    pub rating: f64,
}

#[derive(Debug, Clone)]
pub enum AssignmentOutcome {
    Assigned { rider_id: Uuid, distance_km: f64 },
    NoRidersAvailable,
}

/// Order the online snapshot by distance to the pickup, nearest first;
/// equal distances fall back to the better-rated rider.
pub fn rank(online: Vec<OnlineRider>, pickup: &GeoPoint) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = online
        .into_iter()
        .map(|rider| Candidate {
            distance_km: rider
                .position
                .map(|point| haversine_km(&point, pickup))
                .unwrap_or(NO_FIX_DISTANCE_KM),
            rider_id: rider.id,
            rating: rider.rating,
        })
        .collect();

    candidates.sort_by(|a, b| {
        a.distance_km
            .total_cmp(&b.distance_km)
            .then(b.rating.total_cmp(&a.rating))
    });
    candidates
}

/// Single-shot nearest-rider selection at booking time. Zero online
/// riders is a business outcome, not an error: the ride stays pending in
/// the queue for manual claims, and no retry is scheduled. On success the
/// winner goes through the same accept guard as a manual claim.
pub fn auto_assign(state: &AppState, ride_id: Uuid) -> Result<AssignmentOutcome, AppError> {
    let pickup = {
        let ride = state
            .rides
            .get(&ride_id)
            .ok_or_else(|| AppError::NotFound(format!("ride {ride_id} not found")))?;
        ride.pickup.point
    };

    let start = Instant::now();
    let candidates = rank(state.directory.list_online(), &pickup);

    let Some(best) = candidates.first() else {
        state.metrics.observe_assignment("no_riders", start.elapsed().as_secs_f64());
        info!(ride_id = %ride_id, "no riders available; ride left pending");
        return Ok(AssignmentOutcome::NoRidersAvailable);
    };

    match lifecycle::accept(state, ride_id, best.rider_id) {
        Ok(_) => {
            state.metrics.observe_assignment("success", start.elapsed().as_secs_f64());
            info!(
                ride_id = %ride_id,
                rider_id = %best.rider_id,
                distance_km = best.distance_km,
                "rider auto-assigned"
            );
            Ok(AssignmentOutcome::Assigned {
                rider_id: best.rider_id,
                distance_km: best.distance_km,
            })
        }
        Err(err) => {
            state.metrics.observe_assignment("error", start.elapsed().as_secs_f64());
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rider(seed: u128, position: Option<GeoPoint>, rating: f64) -> OnlineRider {
        OnlineRider {
            id: Uuid::from_u128(seed),
            position,
            rating,
        }
    }

    fn pickup() -> GeoPoint {
        GeoPoint {
            lat: 12.9716,
            lng: 77.5946,
        }
    }

    #[test]
    fn nearest_rider_wins_regardless_of_rating() {
        // ~2.0 km and ~0.5 km north of the pickup.
        let far = rider(
            1,
            Some(GeoPoint {
                lat: 12.9716 + 0.018,
                lng: 77.5946,
            }),
            4.0,
        );
        let near = rider(
            2,
            Some(GeoPoint {
                lat: 12.9716 + 0.0045,
                lng: 77.5946,
            }),
            3.0,
        );

        let ranked = rank(vec![far, near], &pickup());

        assert_eq!(ranked[0].rider_id, Uuid::from_u128(2));
        assert!(ranked[0].distance_km < ranked[1].distance_km);
    }

    #[test]
    fn equal_distance_breaks_tie_on_rating() {
        // Same offset north and south: identical rounded distance.
        let lower = rider(
            1,
            Some(GeoPoint {
                lat: 12.9716 + 0.009,
                lng: 77.5946,
            }),
            4.5,
        );
        let higher = rider(
            2,
            Some(GeoPoint {
                lat: 12.9716 - 0.009,
                lng: 77.5946,
            }),
            4.8,
        );

        let ranked = rank(vec![lower, higher], &pickup());

        assert_eq!(ranked[0].distance_km, ranked[1].distance_km);
        assert_eq!(ranked[0].rider_id, Uuid::from_u128(2));
    }

    #[test]
    fn missing_position_ranks_last_but_stays_assignable() {
        let located = rider(
            1,
            Some(GeoPoint {
                lat: 13.1,
                lng: 77.7,
            }),
            2.0,
        );
        let no_fix = rider(2, None, 5.0);

        let ranked = rank(vec![no_fix.clone(), located], &pickup());

        assert_eq!(ranked[0].rider_id, Uuid::from_u128(1));
        assert_eq!(ranked[1].distance_km, NO_FIX_DISTANCE_KM);

        let only = rank(vec![no_fix], &pickup());
        assert_eq!(only[0].rider_id, Uuid::from_u128(2));
    }

    #[test]
    fn empty_snapshot_ranks_nobody() {
        assert!(rank(Vec::new(), &pickup()).is_empty());
    }
}
