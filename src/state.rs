use dashmap::DashMap;
use uuid::Uuid;

use crate::directory::RiderDirectory;
use crate::fare::FareConfig;
use crate::models::ride::Ride;
use crate::notify::{LogNotifier, Notifier};
use crate::observability::metrics::Metrics;
use crate::realtime::Broadcaster;

pub struct AppState {
    pub rides: DashMap<Uuid, Ride>,
    pub directory: RiderDirectory,
    pub broadcaster: Broadcaster,
    pub notifier: Box<dyn Notifier>,
    pub fare: FareConfig,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(fare: FareConfig, event_buffer_size: usize) -> Self {
        Self::with_notifier(fare, event_buffer_size, Box::new(LogNotifier))
    }

    pub fn with_notifier(
        fare: FareConfig,
        event_buffer_size: usize,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            rides: DashMap::new(),
            directory: RiderDirectory::new(),
            broadcaster: Broadcaster::new(event_buffer_size),
            notifier,
            fare,
            metrics: Metrics::new(),
        }
    }
}
