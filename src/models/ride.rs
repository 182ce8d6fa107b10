use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A named location; serializes flat as `{address, lat, lng}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub address: String,
    #[serde(flatten)]
    pub point: GeoPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerContact {
    pub name: String,
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Pending,
    Accepted,
    Ongoing,
    Completed,
    Cancelled,
}

impl RideStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }
}

impl std::fmt::Display for RideStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RideStatus::Pending => "pending",
            RideStatus::Accepted => "accepted",
            RideStatus::Ongoing => "ongoing",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FareBreakdown {
    pub base_fare: f64,
    pub distance_fare: f64,
    pub peak_charge: f64,
    pub total_fare: f64,
}

/// Last position reported by the assigned rider for this ride.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedPosition {
    #[serde(flatten)]
    pub point: GeoPoint,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingEntry {
    pub score: f64,
    pub review: Option<String>,
}

/// Two-sided ratings: the customer rates the rider and vice versa,
/// each at most once, only after completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideRatings {
    pub by_customer: Option<RatingEntry>,
    pub by_rider: Option<RatingEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingSubject {
    /// The rider is being rated; feeds the directory's running average.
    Rider,
    Customer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    pub id: Uuid,
    pub customer: CustomerContact,
    pub pickup: Place,
    pub dropoff: Place,
    pub distance_km: f64,
    pub fare: FareBreakdown,
    pub rider_id: Option<Uuid>,
    pub status: RideStatus,
    pub passcode: String,
    pub passcode_verified: bool,
    pub rider_location: Option<TrackedPosition>,
    pub ratings: RideRatings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ride {
    pub fn new(
        customer: CustomerContact,
        pickup: Place,
        dropoff: Place,
        distance_km: f64,
        fare: FareBreakdown,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer,
            pickup,
            dropoff,
            distance_km,
            fare,
            rider_id: None,
            status: RideStatus::Pending,
            passcode: generate_passcode(),
            passcode_verified: false,
            rider_location: None,
            ratings: RideRatings::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One-time 4-digit code, shared with the customer at booking and
/// checked in person when the ride starts.
fn generate_passcode() -> String {
    rand::thread_rng().gen_range(1000..10000u32).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passcode_is_four_digits() {
        for _ in 0..100 {
            let code = generate_passcode();
            assert_eq!(code.len(), 4);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn new_ride_is_pending_and_unassigned() {
        let ride = Ride::new(
            CustomerContact {
                name: "Asha".to_string(),
                phone: "9876543210".to_string(),
                email: "asha@example.com".to_string(),
            },
            Place {
                address: "MG Road".to_string(),
                point: GeoPoint {
                    lat: 12.9716,
                    lng: 77.5946,
                },
            },
            Place {
                address: "Koramangala".to_string(),
                point: GeoPoint {
                    lat: 12.9352,
                    lng: 77.6245,
                },
            },
            5.2,
            FareBreakdown {
                base_fare: 20.0,
                distance_fare: 52.0,
                peak_charge: 0.0,
                total_fare: 72.0,
            },
        );

        assert_eq!(ride.status, RideStatus::Pending);
        assert!(ride.rider_id.is_none());
        assert!(ride.rider_location.is_none());
        assert!(!ride.passcode_verified);
    }
}
