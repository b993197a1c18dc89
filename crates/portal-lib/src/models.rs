//! Core data models for the sizing engine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Deployment context that selects safety margins and resource multipliers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Production,
    Development,
}

impl Tier {
    /// Short name used on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Production => "prod",
            Tier::Development => "dev",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prod" | "production" => Ok(Tier::Production),
            "dev" | "development" => Ok(Tier::Development),
            other => Err(format!("unknown tier '{}', expected prod or dev", other)),
        }
    }
}

/// Application runtime, used to pick probe timings and environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppLanguage {
    #[default]
    Java,
    Go,
    Python,
    Dotnet,
}

impl AppLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppLanguage::Java => "java",
            AppLanguage::Go => "go",
            AppLanguage::Python => "python",
            AppLanguage::Dotnet => "dotnet",
        }
    }
}

impl fmt::Display for AppLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "java" => Ok(AppLanguage::Java),
            "go" => Ok(AppLanguage::Go),
            "python" => Ok(AppLanguage::Python),
            "dotnet" => Ok(AppLanguage::Dotnet),
            other => Err(format!(
                "unknown language '{}', expected java, go, python or dotnet",
                other
            )),
        }
    }
}

/// Average allocatable capacity of one cluster node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterCapacity {
    /// Average allocatable CPU per node in millicores
    pub avg_cpu_millis: u64,
    /// Average allocatable memory per node in MiB
    pub avg_memory_mib: u64,
    /// Number of nodes the averages were taken over (at least 1)
    pub node_count: u64,
}

impl ClusterCapacity {
    /// Capacity substituted when the cluster cannot be queried
    pub const FALLBACK: ClusterCapacity = ClusterCapacity {
        avg_cpu_millis: 8000,
        avg_memory_mib: 16000,
        node_count: 1,
    };

    /// Total allocatable CPU across the cluster in millicores
    pub fn total_cpu_millis(&self) -> u64 {
        self.avg_cpu_millis.saturating_mul(self.node_count)
    }
}

impl Default for ClusterCapacity {
    fn default() -> Self {
        Self::FALLBACK
    }
}

/// Per-instance resource requests and limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub cpu_request_millis: u64,
    pub cpu_limit_millis: u64,
    pub memory_request_mib: u64,
    pub memory_limit_mib: u64,
}

impl ResourceSpec {
    pub fn cpu_request_quantity(&self) -> String {
        format!("{}m", self.cpu_request_millis)
    }

    pub fn cpu_limit_quantity(&self) -> String {
        format!("{}m", self.cpu_limit_millis)
    }

    pub fn memory_request_quantity(&self) -> String {
        format!("{}Mi", self.memory_request_mib)
    }

    pub fn memory_limit_quantity(&self) -> String {
        format!("{}Mi", self.memory_limit_mib)
    }
}

/// A single autoscaler trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalingMetric {
    /// Scale on average CPU utilization (percent of request)
    CpuUtilization { average_utilization: u32 },
    /// Scale on a per-pod custom metric averaged over all pods
    PodsAverageValue {
        metric_name: String,
        average_value: u64,
    },
}

/// Horizontal scaling bounds and triggers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoscalingSpec {
    pub min_replicas: u32,
    pub max_replicas: u32,
    /// Triggers in evaluation order; the autoscaler acts on whichever fires first
    pub metrics: Vec<ScalingMetric>,
}

/// Worst-case footprint advisory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyReport {
    pub app_name: String,
    pub max_replicas: u32,
    /// Projected CPU demand at max scale in millicores
    pub projected_cpu_millis: f64,
    /// Cluster-wide CPU threshold in millicores
    pub threshold_cpu_millis: f64,
    pub breach: bool,
}
