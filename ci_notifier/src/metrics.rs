//! Prometheus metrics for notifier observability.

use std::net::SocketAddr;

use metrics::counter;

/// Initialize metrics exporter (Prometheus).
pub fn init_metrics(addr: SocketAddr) {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    if let Err(e) = builder.install() {
        tracing::warn!("Failed to install Prometheus exporter: {}", e);
    }
}

/// Record a build event received from Pub/Sub.
pub fn event_received() {
    counter!("notifier_events_received_total").increment(1);
}

/// Record an event dropped by the notification filter.
pub fn event_skipped(reason: &str) {
    counter!("notifier_events_skipped_total", "reason" => reason.to_string()).increment(1);
}

/// Record a notification accepted by the delivery sink.
pub fn notification_delivered() {
    counter!("notifier_notifications_delivered_total").increment(1);
}

/// Record a handled failure (malformed payload, enrichment, delivery, deadline).
pub fn failure(kind: &str) {
    counter!("notifier_failures_total", "kind" => kind.to_string()).increment(1);
}

/// Record a resolved test-suite outcome.
pub fn suite_probed(outcome: &str) {
    counter!("notifier_suite_probes_total", "outcome" => outcome.to_string()).increment(1);
}
