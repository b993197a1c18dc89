//! Cluster capacity snapshots
//!
//! A node source reports each node's allocatable CPU and memory as raw
//! quantity strings. The provider parses them, averages them per node and
//! reports whether the figure is live or a degraded fallback.

mod kubectl;
mod quantity;


pub use kubectl::{parse_node_list, KubectlNodeSource};
pub use quantity::{parse_cpu_millis, parse_memory_mib, QuantityError};

use crate::models::ClusterCapacity;
use crate::observability::PortalMetrics;
use crate::policy::PolicyConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CapacityError {
    #[error("cluster query failed: {0}")]
    Query(String),

    #[error("cluster query timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed node list: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cluster reported no nodes")]
    NoNodes,

    #[error("invalid capacity format on node '{node}': {source}")]
    InvalidFormat {
        node: String,
        #[source]
        source: QuantityError,
    },
}

impl CapacityError {
    /// Whether the cluster answered but with values that cannot be parsed
    pub fn is_invalid_format(&self) -> bool {
        matches!(self, CapacityError::InvalidFormat { .. })
    }
}

/// Allocatable resources of one node, as reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAllocatable {
    pub name: String,
    pub cpu: String,
    pub memory: String,
}

impl NodeAllocatable {
    pub fn new(name: impl Into<String>, cpu: impl Into<String>, memory: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cpu: cpu.into(),
            memory: memory.into(),
        }
    }
}

/// Trait for anything that can list node allocatable resources
#[async_trait]
pub trait NodeCapacitySource: Send + Sync {
    /// List allocatable CPU and memory for every node
    async fn allocatable(&self) -> Result<Vec<NodeAllocatable>, CapacityError>;

    /// Short description used in logs
    fn describe(&self) -> String;
}

/// Fixed node list, for offline use and tests
#[derive(Debug, Clone, Default)]
pub struct StaticNodeSource {
    nodes: Vec<NodeAllocatable>,
}

impl StaticNodeSource {
    pub fn new(nodes: Vec<NodeAllocatable>) -> Self {
        Self { nodes }
    }
}

#[async_trait]
impl NodeCapacitySource for StaticNodeSource {
    async fn allocatable(&self) -> Result<Vec<NodeAllocatable>, CapacityError> {
        Ok(self.nodes.clone())
    }

    fn describe(&self) -> String {
        format!("static ({} nodes)", self.nodes.len())
    }
}

/// Whether a snapshot reflects the real cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CapacityStatus {
    Live,
    Degraded { reason: String },
}

/// Capacity observed at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacitySnapshot {
    pub capacity: ClusterCapacity,
    pub status: CapacityStatus,
    pub observed_at: DateTime<Utc>,
}

impl CapacitySnapshot {
    pub fn live(capacity: ClusterCapacity) -> Self {
        Self {
            capacity,
            status: CapacityStatus::Live,
            observed_at: Utc::now(),
        }
    }

    pub fn degraded(capacity: ClusterCapacity, reason: impl Into<String>) -> Self {
        Self {
            capacity,
            status: CapacityStatus::Degraded {
                reason: reason.into(),
            },
            observed_at: Utc::now(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.status, CapacityStatus::Degraded { .. })
    }

    pub fn degraded_reason(&self) -> Option<&str> {
        match &self.status {
            CapacityStatus::Live => None,
            CapacityStatus::Degraded { reason } => Some(reason),
        }
    }
}

/// Sum every node's allocatable resources and average them per node
pub fn aggregate(nodes: &[NodeAllocatable]) -> Result<ClusterCapacity, CapacityError> {
    if nodes.is_empty() {
        return Err(CapacityError::NoNodes);
    }

    let mut total_cpu: u64 = 0;
    let mut total_mem: u64 = 0;
    for node in nodes {
        let invalid = |source: QuantityError| CapacityError::InvalidFormat {
            node: node.name.clone(),
            source,
        };
        let cpu = parse_cpu_millis(&node.cpu).map_err(invalid)?;
        let mem = parse_memory_mib(&node.memory).map_err(invalid)?;
        debug!(node = %node.name, cpu_millis = cpu, memory_mib = mem, "Parsed node allocatable");
        total_cpu = total_cpu.saturating_add(cpu);
        total_mem = total_mem.saturating_add(mem);
    }

    let node_count = nodes.len() as u64;
    Ok(ClusterCapacity {
        avg_cpu_millis: total_cpu / node_count,
        avg_memory_mib: total_mem / node_count,
        node_count,
    })
}

/// Takes capacity snapshots from a node source with a bounded query time
pub struct CapacityProvider {
    source: Arc<dyn NodeCapacitySource>,
    timeout: Duration,
    fallback: ClusterCapacity,
    metrics: PortalMetrics,
}

impl CapacityProvider {
    pub fn new(source: Arc<dyn NodeCapacitySource>) -> Self {
        let policy = PolicyConfig::default();
        Self::from_policy(source, &policy)
    }

    /// Use the timeout and fallback capacity from a policy
    pub fn from_policy(source: Arc<dyn NodeCapacitySource>, policy: &PolicyConfig) -> Self {
        Self {
            source,
            timeout: policy.capacity_query_timeout(),
            fallback: policy.fallback_capacity,
            metrics: PortalMetrics::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn fallback(&self) -> ClusterCapacity {
        self.fallback
    }

    /// Query the source under the timeout and aggregate the result
    async fn query(&self) -> Result<ClusterCapacity, CapacityError> {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.timeout, self.source.allocatable()).await {
            Ok(result) => result,
            Err(_) => Err(CapacityError::Timeout(self.timeout)),
        };
        self.metrics
            .observe_capacity_query_latency(started.elapsed().as_secs_f64());

        result.and_then(|nodes| aggregate(&nodes))
    }

    /// Take a snapshot.
    ///
    /// Query failures yield the fallback capacity marked degraded.
    /// Values the cluster reports but that cannot be parsed are an error.
    pub async fn snapshot(&self) -> Result<CapacitySnapshot, CapacityError> {
        let source = self.source.describe();
        match self.query().await {
            Ok(capacity) => Ok(self.live(&source, capacity)),
            Err(err) if err.is_invalid_format() => {
                warn!(source = %source, error = %err, "Cluster reported unparseable capacity");
                self.metrics.inc_capacity_query(&source, "invalid");
                Err(err)
            }
            Err(err) => Ok(self.degraded(&source, &err)),
        }
    }

    /// Take a snapshot, substituting the fallback capacity on any failure
    pub async fn snapshot_or_fallback(&self) -> CapacitySnapshot {
        let source = self.source.describe();
        match self.query().await {
            Ok(capacity) => self.live(&source, capacity),
            Err(err) => self.degraded(&source, &err),
        }
    }

    fn live(&self, source: &str, capacity: ClusterCapacity) -> CapacitySnapshot {
        info!(
            source = %source,
            avg_cpu_millis = capacity.avg_cpu_millis,
            avg_memory_mib = capacity.avg_memory_mib,
            node_count = capacity.node_count,
            "Cluster capacity snapshot taken"
        );
        self.metrics.inc_capacity_query(source, "live");
        self.metrics.set_cluster_nodes(capacity.node_count);
        CapacitySnapshot::live(capacity)
    }

    fn degraded(&self, source: &str, err: &CapacityError) -> CapacitySnapshot {
        warn!(
            source = %source,
            error = %err,
            avg_cpu_millis = self.fallback.avg_cpu_millis,
            avg_memory_mib = self.fallback.avg_memory_mib,
            node_count = self.fallback.node_count,
            "Cluster capacity unavailable, using fallback"
        );
        self.metrics.inc_capacity_query(source, "degraded");
        self.metrics.set_cluster_nodes(self.fallback.node_count);
        CapacitySnapshot::degraded(self.fallback, err.to_string())
    }
}
