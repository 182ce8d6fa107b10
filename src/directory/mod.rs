use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::ride::{GeoPoint, TrackedPosition};
use crate::models::rider::{RatingStats, RiderEntry};

/// Snapshot row handed to the assignment policy. Position may be absent
/// when a rider has never reported a fix.
#[derive(Debug, Clone)]
pub struct OnlineRider {
    pub id: Uuid,
    pub position: Option<GeoPoint>,
    pub rating: f64,
}

/// Authoritative registry of rider availability and last-known position.
/// Position and online-flag writes are last-write-wins telemetry; only
/// rating and earnings updates carry business meaning.
pub struct RiderDirectory {
    entries: DashMap<Uuid, RiderEntry>,
}

impl RiderDirectory {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn register(&self, name: String, bike_number: String) -> RiderEntry {
        let entry = RiderEntry::new(name, bike_number);
        self.entries.insert(entry.id, entry.clone());
        entry
    }

    pub fn get(&self, rider_id: Uuid) -> Option<RiderEntry> {
        self.entries.get(&rider_id).map(|e| e.value().clone())
    }

    pub fn list(&self) -> Vec<RiderEntry> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_online(&self, rider_id: Uuid) -> bool {
        self.entries
            .get(&rider_id)
            .map(|e| e.is_online)
            .unwrap_or(false)
    }

    pub fn set_online(&self, rider_id: Uuid, online: bool) -> Result<RiderEntry, AppError> {
        let mut entry = self
            .entries
            .get_mut(&rider_id)
            .ok_or_else(|| AppError::NotFound(format!("rider {rider_id} not found")))?;

        entry.is_online = online;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    pub fn update_position(&self, rider_id: Uuid, point: GeoPoint) -> Result<RiderEntry, AppError> {
        let mut entry = self
            .entries
            .get_mut(&rider_id)
            .ok_or_else(|| AppError::NotFound(format!("rider {rider_id} not found")))?;

        entry.position = Some(TrackedPosition {
            point,
            updated_at: Utc::now(),
        });
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    /// Point-in-time snapshot for one assignment attempt; never cached.
    pub fn list_online(&self) -> Vec<OnlineRider> {
        self.entries
            .iter()
            .filter(|e| e.is_online)
            .map(|e| OnlineRider {
                id: e.id,
                position: e.position.map(|p| p.point),
                rating: e.rating.average,
            })
            .collect()
    }

    pub fn online_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_online).count()
    }

    pub fn credit_completion(&self, rider_id: Uuid, fare_total: f64) {
        if let Some(mut entry) = self.entries.get_mut(&rider_id) {
            entry.completed_rides += 1;
            entry.earnings.credit(fare_total);
            entry.updated_at = Utc::now();
        }
    }

    /// Running mean over all ratings ever received, kept to one decimal.
    pub fn record_rating(&self, rider_id: Uuid, score: f64) -> Result<RatingStats, AppError> {
        let mut entry = self
            .entries
            .get_mut(&rider_id)
            .ok_or_else(|| AppError::NotFound(format!("rider {rider_id} not found")))?;

        let old = entry.rating;
        let count = old.count + 1;
        let average = (old.average * old.count as f64 + score) / count as f64;
        entry.rating = RatingStats {
            average: (average * 10.0).round() / 10.0,
            count,
        };
        entry.updated_at = Utc::now();
        Ok(entry.rating)
    }
}

impl Default for RiderDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_rider_is_not_found() {
        let directory = RiderDirectory::new();
        let err = directory.set_online(Uuid::new_v4(), true).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn list_online_excludes_offline_riders() {
        let directory = RiderDirectory::new();
        let a = directory.register("Ravi".to_string(), "KA-01-1234".to_string());
        let _b = directory.register("Sana".to_string(), "KA-02-9999".to_string());

        directory.set_online(a.id, true).unwrap();

        let online = directory.list_online();
        assert_eq!(online.len(), 1);
        assert_eq!(online[0].id, a.id);
        assert!(online[0].position.is_none());
    }

    #[test]
    fn rating_is_a_running_mean_rounded_to_one_decimal() {
        let directory = RiderDirectory::new();
        let rider = directory.register("Ravi".to_string(), "KA-01-1234".to_string());

        let stats = directory.record_rating(rider.id, 4.0).unwrap();
        assert_eq!(stats.average, 4.0);
        assert_eq!(stats.count, 1);

        let stats = directory.record_rating(rider.id, 5.0).unwrap();
        assert_eq!(stats.average, 4.5);
        assert_eq!(stats.count, 2);

        let stats = directory.record_rating(rider.id, 3.0).unwrap();
        assert_eq!(stats.average, 4.0);
        assert_eq!(stats.count, 3);
    }

    #[test]
    fn rating_average_stays_in_range() {
        let directory = RiderDirectory::new();
        let rider = directory.register("Ravi".to_string(), "KA-01-1234".to_string());

        for score in [0.0, 5.0, 5.0, 0.0, 2.5] {
            let stats = directory.record_rating(rider.id, score).unwrap();
            assert!((0.0..=5.0).contains(&stats.average));
        }
        assert_eq!(directory.get(rider.id).unwrap().rating.count, 5);
    }

    #[test]
    fn completion_credits_every_earnings_window() {
        let directory = RiderDirectory::new();
        let rider = directory.register("Sana".to_string(), "KA-02-9999".to_string());

        directory.credit_completion(rider.id, 72.0);
        directory.credit_completion(rider.id, 28.0);

        let entry = directory.get(rider.id).unwrap();
        assert_eq!(entry.completed_rides, 2);
        assert_eq!(entry.earnings.today, 100.0);
        assert_eq!(entry.earnings.this_week, 100.0);
        assert_eq!(entry.earnings.this_month, 100.0);
        assert_eq!(entry.earnings.total, 100.0);
    }
}
