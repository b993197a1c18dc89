//! Observability for the sizing engine
//!
//! Provides:
//! - Prometheus run metrics (capacity queries, plans, safety breaches)
//! - Structured logging of plan events with tracing
//!
//! There is no scrape endpoint; the CLI can dump the text exposition to a
//! file for a textfile collector.

use crate::models::ClusterCapacity;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for the capacity query (in seconds)
const QUERY_LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PortalMetricsInner> = OnceLock::new();

struct PortalMetricsInner {
    capacity_queries: IntCounterVec,
    capacity_query_latency_seconds: Histogram,
    cluster_nodes: IntGauge,
    plans_generated: IntCounter,
    profile_rejections: IntCounter,
    safety_breaches: IntCounter,
}

impl PortalMetricsInner {
    fn new() -> Self {
        Self {
            capacity_queries: register_int_counter_vec!(
                "portal_capacity_queries_total",
                "Cluster capacity queries by source and outcome",
                &["source", "status"]
            )
            .expect("Failed to register capacity_queries_total"),

            capacity_query_latency_seconds: register_histogram!(
                "portal_capacity_query_latency_seconds",
                "Time spent querying the cluster for allocatable capacity",
                QUERY_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register capacity_query_latency_seconds"),

            cluster_nodes: register_int_gauge!(
                "portal_cluster_nodes",
                "Node count of the last capacity snapshot"
            )
            .expect("Failed to register cluster_nodes"),

            plans_generated: register_int_counter!(
                "portal_plans_generated_total",
                "Deployment plans generated"
            )
            .expect("Failed to register plans_generated_total"),

            profile_rejections: register_int_counter!(
                "portal_profile_rejections_total",
                "Application profiles rejected by validation"
            )
            .expect("Failed to register profile_rejections_total"),

            safety_breaches: register_int_counter!(
                "portal_safety_breaches_total",
                "Plans whose worst-case footprint exceeds the cluster safety threshold"
            )
            .expect("Failed to register safety_breaches_total"),
        }
    }
}

/// Handle to the global run metrics. Clones share the same metrics.
#[derive(Clone)]
pub struct PortalMetrics {
    _private: (),
}

impl Default for PortalMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PortalMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PortalMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PortalMetricsInner {
        GLOBAL_METRICS.get_or_init(PortalMetricsInner::new)
    }

    /// Count a capacity query outcome (`live`, `degraded` or `invalid`)
    pub fn inc_capacity_query(&self, source: &str, status: &str) {
        self.inner()
            .capacity_queries
            .with_label_values(&[source, status])
            .inc();
    }

    pub fn capacity_query_count(&self, source: &str, status: &str) -> u64 {
        self.inner()
            .capacity_queries
            .with_label_values(&[source, status])
            .get()
    }

    pub fn observe_capacity_query_latency(&self, duration_secs: f64) {
        self.inner()
            .capacity_query_latency_seconds
            .observe(duration_secs);
    }

    pub fn set_cluster_nodes(&self, count: u64) {
        self.inner()
            .cluster_nodes
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    pub fn inc_plans_generated(&self) {
        self.inner().plans_generated.inc();
    }

    pub fn inc_profile_rejections(&self) {
        self.inner().profile_rejections.inc();
    }

    pub fn inc_safety_breaches(&self) {
        self.inner().safety_breaches.inc();
    }

    /// Encode every registered metric in the Prometheus text format
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Structured logger for plan events of one application
#[derive(Clone)]
pub struct PlanLogger {
    app_name: String,
}

impl PlanLogger {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    /// Log the capacity the plan was sized against
    pub fn log_capacity(&self, capacity: &ClusterCapacity, degraded_reason: Option<&str>) {
        match degraded_reason {
            Some(reason) => warn!(
                event = "capacity_degraded",
                app = %self.app_name,
                avg_cpu_millis = capacity.avg_cpu_millis,
                avg_memory_mib = capacity.avg_memory_mib,
                node_count = capacity.node_count,
                reason = %reason,
                "Sizing against fallback capacity"
            ),
            None => info!(
                event = "capacity_live",
                app = %self.app_name,
                avg_cpu_millis = capacity.avg_cpu_millis,
                avg_memory_mib = capacity.avg_memory_mib,
                node_count = capacity.node_count,
                "Sizing against live cluster capacity"
            ),
        }
    }

    /// Log a generated plan's key numbers
    pub fn log_plan_generated(
        &self,
        namespace: &str,
        tier: &str,
        cpu_request_millis: u64,
        cpu_limit_millis: u64,
        memory_request_mib: u64,
        memory_limit_mib: u64,
        min_replicas: u32,
        max_replicas: u32,
    ) {
        info!(
            event = "plan_generated",
            app = %self.app_name,
            namespace = %namespace,
            tier = %tier,
            cpu_request_millis = cpu_request_millis,
            cpu_limit_millis = cpu_limit_millis,
            memory_request_mib = memory_request_mib,
            memory_limit_mib = memory_limit_mib,
            min_replicas = min_replicas,
            max_replicas = max_replicas,
            "Generated deployment plan"
        );
    }

    /// Log a rejected profile
    pub fn log_profile_rejected(&self, reason: &str) {
        warn!(
            event = "profile_rejected",
            app = %self.app_name,
            reason = %reason,
            "Application profile rejected"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portal_metrics_encode() {
        let metrics = PortalMetrics::new();
        metrics.inc_capacity_query("kubectl", "live");
        metrics.observe_capacity_query_latency(0.12);
        metrics.set_cluster_nodes(3);
        metrics.inc_plans_generated();

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("portal_capacity_queries_total"));
        assert!(text.contains("portal_plans_generated_total"));
    }

    #[test]
    fn test_plan_logger_creation() {
        let logger = PlanLogger::new("checkout");
        assert_eq!(logger.app_name, "checkout");
    }
}
