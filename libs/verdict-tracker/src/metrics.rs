// Per-tracker Prometheus metrics

use prometheus::{IntCounter, IntGauge, Registry};

#[derive(Clone)]
pub struct TrackerMetrics {
    pub polls: IntCounter,
    pub fetch_errors: IntCounter,
    pub sessions_started: IntCounter,
    pub sessions_released: IntCounter,
    pub sessions_active: IntGauge,
    pub stale_discarded: IntCounter,
}

impl TrackerMetrics {
    /// Unregistered metrics; call `register` to expose them
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            polls: IntCounter::new("verdict_polls_total", "Status checks issued")?,
            fetch_errors: IntCounter::new(
                "verdict_fetch_errors_total",
                "Status checks that failed transiently",
            )?,
            sessions_started: IntCounter::new(
                "verdict_sessions_started_total",
                "Polling sessions started",
            )?,
            sessions_released: IntCounter::new(
                "verdict_sessions_released_total",
                "Polling session timers released",
            )?,
            sessions_active: IntGauge::new("verdict_sessions_active", "Live polling sessions")?,
            stale_discarded: IntCounter::new(
                "verdict_stale_results_discarded_total",
                "Fetched results dropped because their session was gone",
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.polls.clone()))?;
        registry.register(Box::new(self.fetch_errors.clone()))?;
        registry.register(Box::new(self.sessions_started.clone()))?;
        registry.register(Box::new(self.sessions_released.clone()))?;
        registry.register(Box::new(self.sessions_active.clone()))?;
        registry.register(Box::new(self.stale_discarded.clone()))?;
        Ok(())
    }
}
