use serde_json::Value;
use tracing::info;

use crate::models::ride::Ride;

/// Outbound customer notifications (email in production) are an external
/// collaborator. Fire-and-forget: implementations must not fail the ride
/// operation that triggered them.
pub trait Notifier: Send + Sync {
    fn notify(&self, email: &str, event: &str, payload: Value);
}

/// Default implementation: structured log lines where the real system
/// hands off to a mail transport.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, email: &str, event: &str, payload: Value) {
        info!(to = email, event, %payload, "notification dispatched");
    }
}

/// Short reference shown to customers instead of the full uuid.
pub fn short_ref(ride: &Ride) -> String {
    let id = ride.id.simple().to_string();
    id[id.len() - 6..].to_string()
}

/// Status-change notification, shared by every lifecycle operation.
/// Any transport failure is the implementation's problem, never ours.
pub fn ride_status_changed(notifier: &dyn Notifier, ride: &Ride) {
    notifier.notify(
        &ride.customer.email,
        "rideStatus",
        serde_json::json!({
            "rideRef": short_ref(ride),
            "status": ride.status,
            "fare": ride.fare.total_fare,
        }),
    );
}

pub fn ride_booked(notifier: &dyn Notifier, ride: &Ride) {
    notifier.notify(
        &ride.customer.email,
        "rideBooked",
        serde_json::json!({
            "rideRef": short_ref(ride),
            "passcode": ride.passcode,
            "pickup": ride.pickup.address,
            "drop": ride.dropoff.address,
            "fare": ride.fare.total_fare,
        }),
    );
}
