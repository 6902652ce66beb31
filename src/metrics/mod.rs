//! In-process metrics for check-in stations
//!
//! Counters, gauges and bucketed histograms keyed by dotted names, exported
//! as JSON or Prometheus text.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::domain::ScanOutcome;

/// Metric registry shared by the scan session and the CLI
pub struct MetricsRegistry {
    counters: RwLock<BTreeMap<String, Arc<AtomicU64>>>,
    gauges: RwLock<BTreeMap<String, Arc<AtomicU64>>>,
    histograms: RwLock<BTreeMap<String, Arc<Histogram>>>,
    start_time: Instant,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(BTreeMap::new()),
            gauges: RwLock::new(BTreeMap::new()),
            histograms: RwLock::new(BTreeMap::new()),
            start_time: Instant::now(),
        }
    }

    pub async fn inc_counter(&self, name: &str) {
        self.add_counter(name, 1).await;
    }

    pub async fn add_counter(&self, name: &str, value: u64) {
        if let Some(counter) = self.counters.read().await.get(name) {
            counter.fetch_add(value, Ordering::Relaxed);
            return;
        }

        let mut counters = self.counters.write().await;
        counters
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .fetch_add(value, Ordering::Relaxed);
    }

    pub async fn set_gauge(&self, name: &str, value: u64) {
        if let Some(gauge) = self.gauges.read().await.get(name) {
            gauge.store(value, Ordering::Relaxed);
            return;
        }

        let mut gauges = self.gauges.write().await;
        gauges.insert(name.to_string(), Arc::new(AtomicU64::new(value)));
    }

    pub async fn get_counter(&self, name: &str) -> u64 {
        self.counters
            .read()
            .await
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub async fn get_gauge(&self, name: &str) -> u64 {
        self.gauges
            .read()
            .await
            .get(name)
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Record a histogram observation (seconds)
    pub async fn observe_histogram(&self, name: &str, value: f64) {
        if let Some(histogram) = self.histograms.read().await.get(name) {
            histogram.observe(value);
            return;
        }

        let mut histograms = self.histograms.write().await;
        histograms
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Histogram::default()))
            .observe(value);
    }

    /// Count one finished scan attempt and its processing time
    pub async fn record_scan(&self, outcome: &ScanOutcome, elapsed: Duration) {
        self.inc_counter(metric_names::SCANS_PROCESSED).await;
        self.inc_counter(&metric_names::outcome_counter(outcome.kind()))
            .await;
        self.observe_histogram(metric_names::SCAN_LATENCY, elapsed.as_secs_f64())
            .await;
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub async fn to_json(&self) -> serde_json::Value {
        let counters: BTreeMap<String, u64> = self
            .counters
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();

        let gauges: BTreeMap<String, u64> = self
            .gauges
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();

        let histograms: BTreeMap<String, serde_json::Value> = self
            .histograms
            .read()
            .await
            .iter()
            .map(|(k, h)| (k.clone(), h.to_json()))
            .collect();

        serde_json::json!({
            "uptime_seconds": self.uptime_seconds(),
            "counters": counters,
            "gauges": gauges,
            "histograms": histograms,
        })
    }

    /// Prometheus text exposition
    pub async fn to_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP checkin_uptime_seconds Time since station start\n");
        output.push_str("# TYPE checkin_uptime_seconds gauge\n");
        output.push_str(&format!(
            "checkin_uptime_seconds {}\n\n",
            self.uptime_seconds()
        ));

        for (name, counter) in self.counters.read().await.iter() {
            let name = prometheus_name(name);
            output.push_str(&format!("# TYPE {name} counter\n"));
            output.push_str(&format!("{name} {}\n", counter.load(Ordering::Relaxed)));
        }

        for (name, gauge) in self.gauges.read().await.iter() {
            let name = prometheus_name(name);
            output.push_str(&format!("# TYPE {name} gauge\n"));
            output.push_str(&format!("{name} {}\n", gauge.load(Ordering::Relaxed)));
        }

        for (name, histogram) in self.histograms.read().await.iter() {
            output.push_str(&histogram.to_prometheus(name));
        }

        output
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn prometheus_name(name: &str) -> String {
    name.replace(['.', '-'], "_")
}

/// Fixed-bucket histogram; the sum is kept in microseconds
pub struct Histogram {
    buckets: Vec<f64>,
    counts: Vec<AtomicU64>,
    sum_micros: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(buckets: Vec<f64>) -> Self {
        let counts = buckets.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            counts,
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, value: f64) {
        self.sum_micros
            .fetch_add((value * 1_000_000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        if let Some(i) = self.buckets.iter().position(|bound| value <= *bound) {
            self.counts[i].fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn sum_seconds(&self) -> f64 {
        self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }

    pub fn to_json(&self) -> serde_json::Value {
        let counts: Vec<u64> = self
            .counts
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect();

        serde_json::json!({
            "buckets": self.buckets,
            "counts": counts,
            "sum": self.sum_seconds(),
            "count": self.count(),
        })
    }

    pub fn to_prometheus(&self, name: &str) -> String {
        let name = prometheus_name(name);
        let mut output = format!("# TYPE {name} histogram\n");

        let mut cumulative = 0u64;
        for (bound, count) in self.buckets.iter().zip(&self.counts) {
            cumulative += count.load(Ordering::Relaxed);
            output.push_str(&format!("{name}_bucket{{le=\"{bound}\"}} {cumulative}\n"));
        }
        output.push_str(&format!("{name}_bucket{{le=\"+Inf\"}} {}\n", self.count()));
        output.push_str(&format!("{name}_sum {}\n", self.sum_seconds()));
        output.push_str(&format!("{name}_count {}\n", self.count()));

        output
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // Store round-trips dominate scan latency
        Self::new(vec![
            0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
        ])
    }
}

pub mod metric_names {
    pub const SCANS_PROCESSED: &str = "checkin.scans.processed";
    pub const SCANS_IGNORED: &str = "checkin.scans.ignored";
    pub const DEVICE_ERRORS: &str = "checkin.device.errors";
    pub const SCAN_LATENCY: &str = "checkin.scans.latency_seconds";
    pub const CAMERA_ON: &str = "checkin.camera.on";

    pub const SEARCHES: &str = "checkin.search.queries";
    pub const TOGGLES: &str = "checkin.admin.toggles";

    /// Per-outcome counter, e.g. `checkin.scans.outcome.success`
    pub fn outcome_counter(kind: &str) -> String {
        format!("checkin.scans.outcome.{kind}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counter() {
        let registry = MetricsRegistry::new();

        registry.inc_counter("test.counter").await;
        registry.inc_counter("test.counter").await;
        registry.add_counter("test.counter", 5).await;

        assert_eq!(registry.get_counter("test.counter").await, 7);
        assert_eq!(registry.get_counter("missing").await, 0);
    }

    #[tokio::test]
    async fn test_gauge() {
        let registry = MetricsRegistry::new();

        registry.set_gauge(metric_names::CAMERA_ON, 1).await;
        registry.set_gauge(metric_names::CAMERA_ON, 0).await;
        assert_eq!(registry.get_gauge(metric_names::CAMERA_ON).await, 0);
    }

    #[tokio::test]
    async fn test_record_scan() {
        let registry = MetricsRegistry::new();

        registry
            .record_scan(&ScanOutcome::NotFound, Duration::from_millis(20))
            .await;
        registry
            .record_scan(&ScanOutcome::InvalidPayload, Duration::from_millis(1))
            .await;

        assert_eq!(registry.get_counter(metric_names::SCANS_PROCESSED).await, 2);
        assert_eq!(
            registry
                .get_counter(&metric_names::outcome_counter("not_found"))
                .await,
            1
        );

        let json = registry.to_json().await;
        let latency = &json["histograms"][metric_names::SCAN_LATENCY];
        assert_eq!(latency["count"].as_u64(), Some(2));
    }

    #[tokio::test]
    async fn test_prometheus_format() {
        let registry = MetricsRegistry::new();

        registry.inc_counter(metric_names::SCANS_IGNORED).await;
        registry.set_gauge(metric_names::CAMERA_ON, 1).await;
        registry.observe_histogram("test.latency", 0.02).await;

        let text = registry.to_prometheus().await;
        assert!(text.contains("checkin_scans_ignored 1"));
        assert!(text.contains("checkin_camera_on 1"));
        assert!(text.contains("test_latency_bucket{le=\"0.025\"} 1"));
        assert!(text.contains("test_latency_count 1"));
    }

    #[tokio::test]
    async fn test_histogram_in_json() {
        let registry = MetricsRegistry::new();
        registry.observe_histogram("test.op", 0.002).await;

        let json = registry.to_json().await;
        assert_eq!(json["histograms"]["test.op"]["count"].as_u64(), Some(1));
    }
}
