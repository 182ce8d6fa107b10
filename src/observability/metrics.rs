use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub rides_total: IntCounterVec,
    pub assignments_total: IntCounterVec,
    pub assignment_latency_seconds: HistogramVec,
    pub ride_events_total: IntCounterVec,
    pub active_rooms: IntGauge,
    pub online_riders: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let rides_total = IntCounterVec::new(
            Opts::new("rides_total", "Ride records by status reached"),
            &["status"],
        )
        .expect("valid rides_total metric");

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Auto-assignment attempts by outcome"),
            &["outcome"],
        )
        .expect("valid assignments_total metric");

        let assignment_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "assignment_latency_seconds",
                "Latency of auto-assignment in seconds",
            ),
            &["outcome"],
        )
        .expect("valid assignment_latency_seconds metric");

        let ride_events_total = IntCounterVec::new(
            Opts::new("ride_events_total", "Broadcast events by type"),
            &["event"],
        )
        .expect("valid ride_events_total metric");

        let active_rooms = IntGauge::new("active_rooms", "Open per-ride rooms")
            .expect("valid active_rooms metric");

        let online_riders = IntGauge::new("online_riders", "Riders currently online")
            .expect("valid online_riders metric");

        registry
            .register(Box::new(rides_total.clone()))
            .expect("register rides_total");
        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(assignment_latency_seconds.clone()))
            .expect("register assignment_latency_seconds");
        registry
            .register(Box::new(ride_events_total.clone()))
            .expect("register ride_events_total");
        registry
            .register(Box::new(active_rooms.clone()))
            .expect("register active_rooms");
        registry
            .register(Box::new(online_riders.clone()))
            .expect("register online_riders");

        Self {
            registry,
            rides_total,
            assignments_total,
            assignment_latency_seconds,
            ride_events_total,
            active_rooms,
            online_riders,
        }
    }

    pub fn observe_assignment(&self, outcome: &str, elapsed_seconds: f64) {
        self.assignments_total.with_label_values(&[outcome]).inc();
        self.assignment_latency_seconds
            .with_label_values(&[outcome])
            .observe(elapsed_seconds);
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
