//! Prometheus metrics for the webhook pipeline.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

const DURATION_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.0, 5.0, 10.0];

const PAYLOAD_SIZE_BUCKETS: &[f64] = &[
    1_024.0,
    10_240.0,
    102_400.0,
    1_048_576.0,
    5_242_880.0,
    10_485_760.0,
];

/// Webhook pipeline metrics registered on an owned registry
///
/// Owning the registry lets several routers live in one process, which the
/// tests rely on.
#[derive(Debug, Clone)]
pub struct WebhookMetrics {
    registry: Registry,

    pub events_received: IntCounterVec,
    pub events_accepted: IntCounterVec,
    pub events_rejected: IntCounterVec,
    pub events_failed: IntCounterVec,
    pub sessions_created: IntCounterVec,
    pub duplicates_detected: IntCounter,

    pub processing_duration: HistogramVec,
    pub payload_size: HistogramVec,

    pub deduplication_cache_size: IntGauge,
    pub installation_cache_size: IntGauge,
}

impl WebhookMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let events_received = IntCounterVec::new(
            Opts::new(
                "webhook_events_received_total",
                "Webhook deliveries received, by event type",
            ),
            &["event_type"],
        )?;
        let events_accepted = IntCounterVec::new(
            Opts::new(
                "webhook_events_accepted_total",
                "Webhook deliveries with a valid signature, by event type",
            ),
            &["event_type"],
        )?;
        let events_rejected = IntCounterVec::new(
            Opts::new(
                "webhook_events_rejected_total",
                "Webhook deliveries rejected before processing, by reason",
            ),
            &["reason"],
        )?;
        let events_failed = IntCounterVec::new(
            Opts::new(
                "webhook_events_failed_total",
                "Webhook deliveries that failed during processing",
            ),
            &["event_type", "reason"],
        )?;
        let sessions_created = IntCounterVec::new(
            Opts::new(
                "webhook_sessions_created_total",
                "Agentic sessions created from webhooks",
            ),
            &["event_type", "trigger_reason"],
        )?;
        let duplicates_detected = IntCounter::new(
            "webhook_duplicates_detected_total",
            "Redelivered webhooks dropped by the deduplication cache",
        )?;
        let processing_duration = HistogramVec::new(
            HistogramOpts::new(
                "webhook_processing_duration_seconds",
                "End-to-end webhook processing time",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["event_type"],
        )?;
        let payload_size = HistogramVec::new(
            HistogramOpts::new("webhook_payload_size_bytes", "Webhook payload size in bytes")
                .buckets(PAYLOAD_SIZE_BUCKETS.to_vec()),
            &["event_type"],
        )?;
        let deduplication_cache_size = IntGauge::new(
            "webhook_deduplication_cache_size",
            "Delivery ids held by the deduplication cache",
        )?;
        let installation_cache_size = IntGauge::new(
            "webhook_installation_cache_size",
            "Repositories held by the installation cache",
        )?;

        registry.register(Box::new(events_received.clone()))?;
        registry.register(Box::new(events_accepted.clone()))?;
        registry.register(Box::new(events_rejected.clone()))?;
        registry.register(Box::new(events_failed.clone()))?;
        registry.register(Box::new(sessions_created.clone()))?;
        registry.register(Box::new(duplicates_detected.clone()))?;
        registry.register(Box::new(processing_duration.clone()))?;
        registry.register(Box::new(payload_size.clone()))?;
        registry.register(Box::new(deduplication_cache_size.clone()))?;
        registry.register(Box::new(installation_cache_size.clone()))?;

        Ok(Self {
            registry,
            events_received,
            events_accepted,
            events_rejected,
            events_failed,
            sessions_created,
            duplicates_detected,
            processing_duration,
            payload_size,
            deduplication_cache_size,
            installation_cache_size,
        })
    }

    /// Add process CPU, memory and file descriptor metrics.
    #[cfg(target_os = "linux")]
    pub fn with_process_metrics(self) -> Result<Self, prometheus::Error> {
        self.registry
            .register(Box::new(prometheus::process_collector::ProcessCollector::for_self()))?;
        Ok(self)
    }

    #[cfg(not(target_os = "linux"))]
    pub fn with_process_metrics(self) -> Result<Self, prometheus::Error> {
        Ok(self)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_received(&self, event_type: &str) {
        self.events_received.with_label_values(&[event_type]).inc();
    }

    pub fn record_accepted(&self, event_type: &str) {
        self.events_accepted.with_label_values(&[event_type]).inc();
    }

    pub fn record_rejected(&self, reason: &str) {
        self.events_rejected.with_label_values(&[reason]).inc();
    }

    pub fn record_failed(&self, event_type: &str, reason: &str) {
        self.events_failed
            .with_label_values(&[event_type, reason])
            .inc();
    }

    pub fn record_session_created(&self, event_type: &str, trigger_reason: &str) {
        self.sessions_created
            .with_label_values(&[event_type, trigger_reason])
            .inc();
    }

    pub fn record_duplicate(&self) {
        self.duplicates_detected.inc();
    }

    pub fn observe_duration(&self, event_type: &str, elapsed: Duration) {
        self.processing_duration
            .with_label_values(&[event_type])
            .observe(elapsed.as_secs_f64());
    }

    pub fn observe_payload_size(&self, event_type: &str, bytes: usize) {
        self.payload_size
            .with_label_values(&[event_type])
            .observe(bytes as f64);
    }

    pub fn set_cache_sizes(&self, deduplication: usize, installation: usize) {
        self.deduplication_cache_size
            .set(i64::try_from(deduplication).unwrap_or(i64::MAX));
        self.installation_cache_size
            .set(i64::try_from(installation).unwrap_or(i64::MAX));
    }

    /// Render every registered metric in the Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
