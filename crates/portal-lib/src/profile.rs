//! Application profile and its validation

use crate::models::{AppLanguage, Tier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub const DEFAULT_NAMESPACE: &str = "perf-test";
pub const DEFAULT_IMAGE_REPO: &str = "my-docker-reg/app";
pub const DEFAULT_LATENCY_SLA_MS: u32 = 200;
pub const DEFAULT_CPU_PERCENT: f64 = 0.10;
pub const DEFAULT_MEM_PERCENT: f64 = 0.15;
pub const DEFAULT_METRICS_PATH: &str = "/metrics";
pub const DEFAULT_METRICS_PORT: u16 = 9898;
pub const DEFAULT_SERVICE_PORT: u16 = 80;
pub const DEFAULT_CONTAINER_PORT: u16 = 9898;
pub const DEFAULT_INGRESS_HOST: &str = "api.example.com";

/// Value of the `tier` label on every generated object
pub const TIER_LABEL: &str = "high-throughput";

/// Value of the `managed-by` label on every generated object
pub const MANAGED_BY: &str = "performance-portal";

/// Kubernetes object names are DNS-1123 labels
const MAX_NAME_LEN: usize = 63;

#[derive(Debug, Error, PartialEq)]
pub enum ProfileError {
    #[error("invalid {field}: {reason}")]
    InvalidName { field: &'static str, reason: String },

    #[error("peak request rate must be greater than 0")]
    NonPositiveRps,

    #[error("target latency must be greater than 0 ms")]
    NonPositiveLatency,

    #[error("{field} must be within (0, 1], got {value}")]
    FractionOutOfRange { field: &'static str, value: f64 },

    #[error("{field} must be a non-zero port")]
    InvalidPort { field: &'static str },

    #[error("metrics path must start with '/', got '{0}'")]
    InvalidMetricsPath(String),
}

/// Declarative description of the application to size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppProfile {
    pub name: String,
    pub namespace: String,
    pub image_repo: String,
    pub tier: Tier,
    pub language: AppLanguage,
    /// Expected peak requests per second
    pub peak_rps: u64,
    /// Target p99 latency; advisory only
    pub latency_sla_ms: u32,
    /// Fraction of average node CPU one instance consumes
    pub cpu_percent: f64,
    /// Fraction of average node memory one instance consumes
    pub mem_percent: f64,
    pub monitoring_enabled: bool,
    pub metrics_path: String,
    pub metrics_port: u16,
    pub service_port: u16,
    pub container_port: u16,
    pub ingress_host: String,
}

impl AppProfile {
    /// Profile with every field except name and rate at its default
    pub fn new(name: impl Into<String>, peak_rps: u64) -> Self {
        Self {
            name: name.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            image_repo: DEFAULT_IMAGE_REPO.to_string(),
            tier: Tier::default(),
            language: AppLanguage::default(),
            peak_rps,
            latency_sla_ms: DEFAULT_LATENCY_SLA_MS,
            cpu_percent: DEFAULT_CPU_PERCENT,
            mem_percent: DEFAULT_MEM_PERCENT,
            monitoring_enabled: true,
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
            metrics_port: DEFAULT_METRICS_PORT,
            service_port: DEFAULT_SERVICE_PORT,
            container_port: DEFAULT_CONTAINER_PORT,
            ingress_host: DEFAULT_INGRESS_HOST.to_string(),
        }
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_language(mut self, language: AppLanguage) -> Self {
        self.language = language;
        self
    }

    pub fn with_footprint(mut self, cpu_percent: f64, mem_percent: f64) -> Self {
        self.cpu_percent = cpu_percent;
        self.mem_percent = mem_percent;
        self
    }

    /// Check every precondition the sizing engine relies on
    pub fn validate(&self) -> Result<(), ProfileError> {
        validate_dns_label("name", &self.name)?;
        validate_dns_label("namespace", &self.namespace)?;

        if self.peak_rps == 0 {
            return Err(ProfileError::NonPositiveRps);
        }
        if self.latency_sla_ms == 0 {
            return Err(ProfileError::NonPositiveLatency);
        }
        validate_fraction("cpu_percent", self.cpu_percent)?;
        validate_fraction("mem_percent", self.mem_percent)?;

        if self.metrics_port == 0 {
            return Err(ProfileError::InvalidPort { field: "metrics_port" });
        }
        if self.service_port == 0 {
            return Err(ProfileError::InvalidPort { field: "service_port" });
        }
        if self.container_port == 0 {
            return Err(ProfileError::InvalidPort { field: "container_port" });
        }
        if !self.metrics_path.starts_with('/') {
            return Err(ProfileError::InvalidMetricsPath(self.metrics_path.clone()));
        }
        Ok(())
    }

    /// Labels stamped on every generated object
    pub fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("app".to_string(), self.name.clone()),
            ("tier".to_string(), TIER_LABEL.to_string()),
            ("managed-by".to_string(), MANAGED_BY.to_string()),
        ])
    }

    /// Prometheus scrape annotations; empty when monitoring is disabled
    pub fn monitoring_annotations(&self) -> BTreeMap<String, String> {
        if !self.monitoring_enabled {
            return BTreeMap::new();
        }
        BTreeMap::from([
            ("prometheus.io/scrape".to_string(), "true".to_string()),
            ("prometheus.io/path".to_string(), self.metrics_path.clone()),
            ("prometheus.io/port".to_string(), self.metrics_port.to_string()),
            ("performance-tier".to_string(), TIER_LABEL.to_string()),
        ])
    }
}

fn validate_fraction(field: &'static str, value: f64) -> Result<(), ProfileError> {
    // NaN fails both comparisons
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ProfileError::FractionOutOfRange { field, value })
    }
}

fn validate_dns_label(field: &'static str, value: &str) -> Result<(), ProfileError> {
    let invalid = |reason: &str| ProfileError::InvalidName {
        field,
        reason: reason.to_string(),
    };

    if value.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if value.len() > MAX_NAME_LEN {
        return Err(invalid("must be at most 63 characters"));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid(
            "must contain only lowercase letters, digits and '-'",
        ));
    }
    if value.starts_with('-') || value.ends_with('-') {
        return Err(invalid("must start and end with an alphanumeric character"));
    }
    Ok(())
}
