use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::models::ride::{GeoPoint, Ride};

/// Everything observers can see. `newRide` and `rideUpdate` travel on the
/// global feeds; `rideUpdate` and `riderLocationUpdate` also reach the
/// ride's room. Location samples never hit a global feed, keeping fan-out
/// proportional to the ride's audience instead of total ride volume.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum RideEvent {
    NewRide(Box<Ride>),
    RideUpdate(Box<Ride>),
    #[serde(rename_all = "camelCase")]
    RiderLocationUpdate {
        ride_id: Uuid,
        location: GeoPoint,
        timestamp: DateTime<Utc>,
    },
}

/// Process-wide event hub. Constructed once in `main` (or per test) and
/// handed to whoever publishes; there is no ambient singleton to
/// initialize or forget to initialize.
///
/// Delivery is at-most-once and best-effort: bounded buffers, no replay.
/// A subscriber that joins a room late sees only what is emitted after
/// joining; within one room each subscriber sees events in emission order.
pub struct Broadcaster {
    buffer: usize,
    new_rides: broadcast::Sender<RideEvent>,
    ride_updates: broadcast::Sender<RideEvent>,
    rooms: DashMap<Uuid, broadcast::Sender<RideEvent>>,
}

impl Broadcaster {
    pub fn new(buffer: usize) -> Self {
        let (new_rides, _) = broadcast::channel(buffer);
        let (ride_updates, _) = broadcast::channel(buffer);

        Self {
            buffer,
            new_rides,
            ride_updates,
            rooms: DashMap::new(),
        }
    }

    /// Global feed: one event per booking, for riders browsing the queue.
    pub fn subscribe_new_rides(&self) -> broadcast::Receiver<RideEvent> {
        self.new_rides.subscribe()
    }

    /// Global feed: every state transition, for open dashboards.
    pub fn subscribe_ride_updates(&self) -> broadcast::Receiver<RideEvent> {
        self.ride_updates.subscribe()
    }

    /// Join a ride's room. The room is created on first join and lives
    /// until the ride reaches a terminal status.
    pub fn join(&self, ride_id: Uuid) -> broadcast::Receiver<RideEvent> {
        self.rooms
            .entry(ride_id)
            .or_insert_with(|| broadcast::channel(self.buffer).0)
            .subscribe()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn publish_new_ride(&self, ride: &Ride) {
        let delivered = self
            .new_rides
            .send(RideEvent::NewRide(Box::new(ride.clone())))
            .unwrap_or(0);
        debug!(ride_id = %ride.id, delivered, "newRide published");
    }

    /// Fan a transition out to the global feed and, if anyone opened one,
    /// the ride's room. A terminal status tears the room down afterwards;
    /// subscribers drain what was already sent and then their stream ends.
    pub fn publish_ride_update(&self, ride: &Ride) {
        let event = RideEvent::RideUpdate(Box::new(ride.clone()));

        let _ = self.ride_updates.send(event.clone());
        if let Some(room) = self.rooms.get(&ride.id) {
            let _ = room.send(event);
        }

        if ride.status.is_terminal() {
            self.rooms.remove(&ride.id);
            debug!(ride_id = %ride.id, status = %ride.status, "room closed");
        }
    }

    /// Room-only. No room means nobody is watching; the sample is dropped
    /// without error, matching the at-most-once contract.
    pub fn publish_position(&self, ride_id: Uuid, location: GeoPoint, timestamp: DateTime<Utc>) {
        if let Some(room) = self.rooms.get(&ride_id) {
            let _ = room.send(RideEvent::RiderLocationUpdate {
                ride_id,
                location,
                timestamp,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::ride::{
        CustomerContact, FareBreakdown, Place, Ride, RideStatus,
    };

    fn test_ride() -> Ride {
        Ride::new(
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
        )
    }

    #[tokio::test]
    async fn room_delivers_positions_in_emission_order() {
        let broadcaster = Broadcaster::new(16);
        let ride = test_ride();
        let mut rx = broadcaster.join(ride.id);

        let a = GeoPoint {
            lat: 12.97,
            lng: 77.60,
        };
        let b = GeoPoint {
            lat: 12.96,
            lng: 77.61,
        };
        broadcaster.publish_position(ride.id, a, Utc::now());
        broadcaster.publish_position(ride.id, b, Utc::now());

        match rx.recv().await.unwrap() {
            RideEvent::RiderLocationUpdate { location, .. } => assert_eq!(location.lat, a.lat),
            other => panic!("unexpected event: {other:?}"),
        }
        match rx.recv().await.unwrap() {
            RideEvent::RiderLocationUpdate { location, .. } => assert_eq!(location.lat, b.lat),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn late_joiner_sees_only_later_events() {
        let broadcaster = Broadcaster::new(16);
        let ride = test_ride();

        // Nobody is in the room yet, so this sample is dropped.
        let early = GeoPoint {
            lat: 1.0,
            lng: 1.0,
        };
        broadcaster.publish_position(ride.id, early, Utc::now());

        let mut rx = broadcaster.join(ride.id);
        let late = GeoPoint {
            lat: 2.0,
            lng: 2.0,
        };
        broadcaster.publish_position(ride.id, late, Utc::now());

        match rx.recv().await.unwrap() {
            RideEvent::RiderLocationUpdate { location, .. } => assert_eq!(location.lat, 2.0),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn location_updates_stay_off_the_global_feeds() {
        let broadcaster = Broadcaster::new(16);
        let ride = test_ride();
        let _room = broadcaster.join(ride.id);
        let mut updates = broadcaster.subscribe_ride_updates();
        let mut new_rides = broadcaster.subscribe_new_rides();

        broadcaster.publish_position(
            ride.id,
            GeoPoint {
                lat: 1.0,
                lng: 1.0,
            },
            Utc::now(),
        );
        broadcaster.publish_ride_update(&ride);

        // The first thing each global feed sees is the update, not the sample.
        match updates.recv().await.unwrap() {
            RideEvent::RideUpdate(_) => {}
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(new_rides.try_recv().is_err());
    }

    #[tokio::test]
    async fn terminal_update_closes_the_room() {
        let broadcaster = Broadcaster::new(16);
        let mut ride = test_ride();
        let mut rx = broadcaster.join(ride.id);
        assert_eq!(broadcaster.room_count(), 1);

        ride.status = RideStatus::Cancelled;
        broadcaster.publish_ride_update(&ride);

        assert_eq!(broadcaster.room_count(), 0);
        // The final update is still drained before the stream ends.
        match rx.recv().await.unwrap() {
            RideEvent::RideUpdate(r) => assert_eq!(r.status, RideStatus::Cancelled),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[test]
    fn events_serialize_with_wire_names() {
        let ride = test_ride();
        let json =
            serde_json::to_value(RideEvent::NewRide(Box::new(ride.clone()))).unwrap();
        assert_eq!(json["event"], "newRide");

        let json = serde_json::to_value(RideEvent::RiderLocationUpdate {
            ride_id: ride.id,
            location: GeoPoint {
                lat: 1.0,
                lng: 2.0,
            },
            timestamp: Utc::now(),
        })
        .unwrap();
        assert_eq!(json["event"], "riderLocationUpdate");
        assert_eq!(json["data"]["rideId"], ride.id.to_string());
    }
}
