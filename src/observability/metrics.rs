use prometheus::{Encoder, GaugeVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub locations_published_total: IntCounterVec,
    pub poll_cycles_total: IntCounterVec,
    pub stale_samples_discarded_total: IntCounter,
    pub active_tracking_sessions: IntGauge,
    pub eta_minutes: GaugeVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let locations_published_total = IntCounterVec::new(
            Opts::new(
                "locations_published_total",
                "Location samples published by transport and outcome",
            ),
            &["transport", "outcome"],
        )
        .expect("valid locations_published_total metric");

        let poll_cycles_total = IntCounterVec::new(
            Opts::new("poll_cycles_total", "Tracking poll cycles by outcome"),
            &["outcome"],
        )
        .expect("valid poll_cycles_total metric");

        let stale_samples_discarded_total = IntCounter::new(
            "stale_samples_discarded_total",
            "Samples rejected because a newer one was already held",
        )
        .expect("valid stale_samples_discarded_total metric");

        let active_tracking_sessions = IntGauge::new(
            "active_tracking_sessions",
            "Currently running tracking poll loops",
        )
        .expect("valid active_tracking_sessions metric");

        let eta_minutes = GaugeVec::new(
            Opts::new("eta_minutes", "Latest ETA estimate per delivery"),
            &["delivery_id"],
        )
        .expect("valid eta_minutes metric");

        registry
            .register(Box::new(locations_published_total.clone()))
            .expect("register locations_published_total");
        registry
            .register(Box::new(poll_cycles_total.clone()))
            .expect("register poll_cycles_total");
        registry
            .register(Box::new(stale_samples_discarded_total.clone()))
            .expect("register stale_samples_discarded_total");
        registry
            .register(Box::new(active_tracking_sessions.clone()))
            .expect("register active_tracking_sessions");
        registry
            .register(Box::new(eta_minutes.clone()))
            .expect("register eta_minutes");

        Self {
            registry,
            locations_published_total,
            poll_cycles_total,
            stale_samples_discarded_total,
            active_tracking_sessions,
            eta_minutes,
        }
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
