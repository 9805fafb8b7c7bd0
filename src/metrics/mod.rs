// SPDX-License-Identifier: MIT
//! Simple in-process counters exposed as `GET /api/v1/metrics` in Prometheus
//! text format. No external library needed — all counters are `AtomicU64`
//! incremented inline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// In-process counters shared across all connections and background loops.
#[derive(Debug)]
pub struct DaemonMetrics {
    /// Total WebSocket connections accepted since start.
    pub ws_connections_total: AtomicU64,
    /// Total events delivered over a live socket since start.
    pub events_delivered_total: AtomicU64,
    /// Total notifications persisted for offline receivers since start.
    pub notifications_created_total: AtomicU64,
    /// Total chat messages appended to the live buffer since start.
    pub messages_buffered_total: AtomicU64,
    /// Total failed publishes to the summary queue since start.
    pub summary_publish_failures_total: AtomicU64,
    /// Total summary tasks fully processed by the worker since start.
    pub summary_tasks_processed_total: AtomicU64,
    /// Process start time — used to calculate uptime in the metrics response.
    pub started_at: Instant,
}

impl Default for DaemonMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DaemonMetrics {
    pub fn new() -> Self {
        Self {
            ws_connections_total: AtomicU64::new(0),
            events_delivered_total: AtomicU64::new(0),
            notifications_created_total: AtomicU64::new(0),
            messages_buffered_total: AtomicU64::new(0),
            summary_publish_failures_total: AtomicU64::new(0),
            summary_tasks_processed_total: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn inc_ws_connections(&self) {
        self.ws_connections_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_events_delivered(&self) {
        self.events_delivered_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_notifications_created(&self) {
        self.notifications_created_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_messages_buffered(&self) {
        self.messages_buffered_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_summary_publish_failures(&self) {
        self.summary_publish_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_summary_tasks_processed(&self) {
        self.summary_tasks_processed_total
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Render counters in Prometheus text format.
    ///
    /// The online-user count is passed in because it requires the registry
    /// lock (not stored here).
    pub fn render_prometheus(&self, online_users: u64) -> String {
        let uptime = self.started_at.elapsed().as_secs();
        let mut out = String::with_capacity(1024);
        let mut counter = |name: &str, help: &str, value: u64| {
            out.push_str(&format!(
                "# HELP thesisd_{name} {help}\n# TYPE thesisd_{name} counter\nthesisd_{name} {value}\n"
            ));
        };
        counter(
            "ws_connections_total",
            "WebSocket connections accepted",
            self.ws_connections_total.load(Ordering::Relaxed),
        );
        counter(
            "events_delivered_total",
            "Events delivered over live sockets",
            self.events_delivered_total.load(Ordering::Relaxed),
        );
        counter(
            "notifications_created_total",
            "Notifications persisted for offline receivers",
            self.notifications_created_total.load(Ordering::Relaxed),
        );
        counter(
            "messages_buffered_total",
            "Chat messages appended to the live buffer",
            self.messages_buffered_total.load(Ordering::Relaxed),
        );
        counter(
            "summary_publish_failures_total",
            "Failed publishes to the summary queue",
            self.summary_publish_failures_total.load(Ordering::Relaxed),
        );
        counter(
            "summary_tasks_processed_total",
            "Summary tasks fully processed by the worker",
            self.summary_tasks_processed_total.load(Ordering::Relaxed),
        );
        out.push_str(&format!(
            "# HELP thesisd_online_users Users with at least one open socket\n# TYPE thesisd_online_users gauge\nthesisd_online_users {online_users}\n"
        ));
        out.push_str(&format!(
            "# HELP thesisd_uptime_seconds Seconds since process start\n# TYPE thesisd_uptime_seconds gauge\nthesisd_uptime_seconds {uptime}\n"
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_appear_in_render() {
        let m = DaemonMetrics::new();
        m.inc_summary_publish_failures();
        m.inc_summary_publish_failures();
        let text = m.render_prometheus(3);
        assert!(text.contains("thesisd_summary_publish_failures_total 2"));
        assert!(text.contains("thesisd_online_users 3"));
        assert!(text.contains("# TYPE thesisd_events_delivered_total counter"));
    }
}
