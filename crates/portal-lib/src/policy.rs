//! Tuning constants for sizing, scaling and safety checks
//!
//! Every number the engine multiplies or compares against lives here so the
//! arithmetic can be traced and overridden without touching the algorithms.

use crate::models::ClusterCapacity;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Requests per second one instance is assumed to absorb
pub const DEFAULT_RPS_PER_INSTANCE: u64 = 200;

/// Replica floor kept for high availability regardless of load
pub const DEFAULT_MIN_REPLICAS_FLOOR: u32 = 3;

/// Headroom multiplier from min to max replicas
pub const DEFAULT_BURST_FACTOR: u32 = 2;

/// CPU utilization target (percent) for the resource metric
pub const DEFAULT_CPU_TARGET_UTILIZATION: u32 = 70;

/// Name of the per-pod throughput metric exposed by the application
pub const DEFAULT_THROUGHPUT_METRIC: &str = "http_requests_per_second";

/// Per-pod average throughput target for the custom metric.
///
/// Deliberately higher than [`DEFAULT_RPS_PER_INSTANCE`]: CPU utilization is
/// the primary trigger and this one acts as a backstop.
pub const DEFAULT_THROUGHPUT_TARGET_RPS: u64 = 1000;

/// Fraction of total cluster CPU one application may claim at max scale
pub const DEFAULT_SAFETY_FRACTION: f64 = 0.8;

/// Production CPU limit as a multiple of the request
pub const DEFAULT_PRODUCTION_CPU_LIMIT_FACTOR: u64 = 2;

/// Divisor applied to development requests
pub const DEFAULT_DEVELOPMENT_REQUEST_DIVISOR: u64 = 2;

/// Upper bound on the cluster capacity query
pub const DEFAULT_CAPACITY_QUERY_TIMEOUT_SECS: u64 = 10;

/// Prefix for environment overrides, e.g. `PORTAL_SAFETY_FRACTION=0.7`.
/// Nested keys use `__`: `PORTAL_FALLBACK_CAPACITY__NODE_COUNT=3`.
pub const ENV_PREFIX: &str = "PORTAL";

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to load policy configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid policy: {0}")]
    Invalid(String),
}

/// Sizing and scaling policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub rps_per_instance: u64,
    pub min_replicas_floor: u32,
    pub burst_factor: u32,
    pub cpu_target_utilization: u32,
    pub throughput_metric_name: String,
    pub throughput_target_rps: u64,
    pub safety_fraction: f64,
    pub production_cpu_limit_factor: u64,
    pub development_request_divisor: u64,
    pub fallback_capacity: ClusterCapacity,
    pub capacity_query_timeout_secs: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            rps_per_instance: DEFAULT_RPS_PER_INSTANCE,
            min_replicas_floor: DEFAULT_MIN_REPLICAS_FLOOR,
            burst_factor: DEFAULT_BURST_FACTOR,
            cpu_target_utilization: DEFAULT_CPU_TARGET_UTILIZATION,
            throughput_metric_name: DEFAULT_THROUGHPUT_METRIC.to_string(),
            throughput_target_rps: DEFAULT_THROUGHPUT_TARGET_RPS,
            safety_fraction: DEFAULT_SAFETY_FRACTION,
            production_cpu_limit_factor: DEFAULT_PRODUCTION_CPU_LIMIT_FACTOR,
            development_request_divisor: DEFAULT_DEVELOPMENT_REQUEST_DIVISOR,
            fallback_capacity: ClusterCapacity::FALLBACK,
            capacity_query_timeout_secs: DEFAULT_CAPACITY_QUERY_TIMEOUT_SECS,
        }
    }
}

impl PolicyConfig {
    /// Load the policy from an optional file layered under `PORTAL_*`
    /// environment variables. Missing keys keep their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, PolicyError> {
        Self::load_with_env(path, Self::environment())
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn load_with_env(path: Option<&Path>, env: config::Environment) -> Result<Self, PolicyError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder.add_source(env).build()?;

        let policy: PolicyConfig = config.try_deserialize()?;
        policy.validate()?;
        Ok(policy)
    }

    /// Reject values that would break the scaling invariants
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.rps_per_instance == 0 {
            return Err(PolicyError::Invalid("rps_per_instance must be > 0".into()));
        }
        if self.min_replicas_floor == 0 {
            return Err(PolicyError::Invalid("min_replicas_floor must be > 0".into()));
        }
        if self.burst_factor == 0 {
            return Err(PolicyError::Invalid("burst_factor must be > 0".into()));
        }
        if self.cpu_target_utilization == 0 || self.cpu_target_utilization > 100 {
            return Err(PolicyError::Invalid(
                "cpu_target_utilization must be within 1..=100".into(),
            ));
        }
        if self.throughput_metric_name.trim().is_empty() {
            return Err(PolicyError::Invalid(
                "throughput_metric_name must not be empty".into(),
            ));
        }
        if !(self.safety_fraction > 0.0 && self.safety_fraction <= 1.0) {
            return Err(PolicyError::Invalid(format!(
                "safety_fraction must be within (0, 1], got {}",
                self.safety_fraction
            )));
        }
        if self.production_cpu_limit_factor == 0 || self.development_request_divisor == 0 {
            return Err(PolicyError::Invalid(
                "tier multipliers must be > 0".into(),
            ));
        }
        if self.fallback_capacity.node_count == 0 {
            return Err(PolicyError::Invalid(
                "fallback_capacity.node_count must be >= 1".into(),
            ));
        }
        Ok(())
    }

    pub fn capacity_query_timeout(&self) -> Duration {
        Duration::from_secs(self.capacity_query_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let policy = PolicyConfig::default();
        assert!(policy.validate().is_ok());
        assert_eq!(policy.rps_per_instance, 200);
        assert_eq!(policy.throughput_target_rps, 1000);
        assert_eq!(policy.fallback_capacity, ClusterCapacity::FALLBACK);
        assert_eq!(policy.capacity_query_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "safety_fraction = 0.5").unwrap();
        writeln!(file, "rps_per_instance = 250").unwrap();

        let policy = PolicyConfig::load(Some(file.path())).unwrap();
        assert_eq!(policy.safety_fraction, 0.5);
        assert_eq!(policy.rps_per_instance, 250);
        assert_eq!(policy.min_replicas_floor, DEFAULT_MIN_REPLICAS_FLOOR);
        assert_eq!(policy.throughput_metric_name, DEFAULT_THROUGHPUT_METRIC);
    }

    #[test]
    fn test_load_rejects_invalid_fraction() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "safety_fraction = 1.5").unwrap();

        let err = PolicyConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, PolicyError::Invalid(_)));
    }

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PolicyConfig::environment().source(Some(map))
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "safety_fraction = 0.5").unwrap();
        writeln!(file, "burst_factor = 4").unwrap();

        let policy = PolicyConfig::load_with_env(
            Some(file.path()),
            env(&[
                ("PORTAL_SAFETY_FRACTION", "0.7"),
                ("PORTAL_FALLBACK_CAPACITY__NODE_COUNT", "3"),
            ]),
        )
        .unwrap();
        assert_eq!(policy.safety_fraction, 0.7);
        assert_eq!(policy.burst_factor, 4);
        assert_eq!(policy.fallback_capacity.node_count, 3);
        assert_eq!(policy.fallback_capacity.avg_cpu_millis, 8000);
    }

    #[test]
    fn test_env_ignores_other_prefixes() {
        let policy =
            PolicyConfig::load_with_env(None, env(&[("OTHER_SAFETY_FRACTION", "0.1")])).unwrap();
        assert_eq!(policy.safety_fraction, DEFAULT_SAFETY_FRACTION);
    }

    #[test]
    fn test_load_partial_fallback_capacity() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[fallback_capacity]").unwrap();
        writeln!(file, "node_count = 2").unwrap();

        let policy = PolicyConfig::load_with_env(Some(file.path()), env(&[])).unwrap();
        assert_eq!(
            policy.fallback_capacity,
            ClusterCapacity {
                node_count: 2,
                ..ClusterCapacity::FALLBACK
            }
        );
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = PolicyConfig::load(Some(Path::new("/nonexistent/policy.toml"))).unwrap_err();
        assert!(matches!(err, PolicyError::Load(_)));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let policy = PolicyConfig {
            rps_per_instance: 0,
            ..Default::default()
        };
        assert!(policy.validate().is_err());

        let policy = PolicyConfig {
            burst_factor: 0,
            ..Default::default()
        };
        assert!(policy.validate().is_err());

        let policy = PolicyConfig {
            fallback_capacity: ClusterCapacity {
                node_count: 0,
                ..ClusterCapacity::FALLBACK
            },
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }
}
