use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ride::TrackedPosition;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingStats {
    pub average: f64,
    pub count: u32,
}

impl Default for RatingStats {
    fn default() -> Self {
        Self {
            average: 0.0,
            count: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Earnings {
    pub today: f64,
    pub this_week: f64,
    pub this_month: f64,
    pub total: f64,
}

impl Earnings {
    pub fn credit(&mut self, amount: f64) {
        self.today += amount;
        self.this_week += amount;
        self.this_month += amount;
        self.total += amount;
    }
}

/// Directory entry: the source of truth for a rider's availability and
/// last reported position outside of an active ride.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiderEntry {
    pub id: Uuid,
    pub name: String,
    pub bike_number: String,
    pub is_online: bool,
    pub position: Option<TrackedPosition>,
    pub rating: RatingStats,
    pub completed_rides: u64,
    pub earnings: Earnings,
    pub updated_at: DateTime<Utc>,
}

impl RiderEntry {
    pub fn new(name: String, bike_number: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            bike_number,
            is_online: false,
            position: None,
            rating: RatingStats::default(),
            completed_rides: 0,
            earnings: Earnings::default(),
            updated_at: Utc::now(),
        }
    }
}
