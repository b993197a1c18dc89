//! Tier and language dependent runtime defaults

use crate::models::{AppLanguage, ResourceSpec, Tier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// JVM heap as a fraction of container memory
const JVM_HEAP_FRACTION: f64 = 0.75;

/// How a Service routes external traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExternalTrafficPolicy {
    /// Keep traffic on the receiving node, preserving the client source IP
    Local,
    Cluster,
}

impl ExternalTrafficPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExternalTrafficPolicy::Local => "Local",
            ExternalTrafficPolicy::Cluster => "Cluster",
        }
    }
}

/// Settings that differ between tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSettings {
    pub termination_grace_period_secs: u32,
    pub network_timeout_secs: u32,
    pub external_traffic_policy: ExternalTrafficPolicy,
}

impl TierSettings {
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Production => Self {
                termination_grace_period_secs: 60,
                network_timeout_secs: 60,
                external_traffic_policy: ExternalTrafficPolicy::Local,
            },
            Tier::Development => Self {
                termination_grace_period_secs: 30,
                network_timeout_secs: 30,
                external_traffic_policy: ExternalTrafficPolicy::Cluster,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupProbe {
    pub failure_threshold: u32,
    pub period_seconds: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthProbe {
    pub initial_delay_seconds: u32,
    pub period_seconds: u32,
}

/// Probe timings sized to how long a runtime takes to boot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSettings {
    pub startup: StartupProbe,
    pub readiness: HealthProbe,
    pub liveness: HealthProbe,
}

/// Probe timings for slow-starting JVMs: 150s startup window
const JAVA_PROBES: ProbeSettings = ProbeSettings {
    startup: StartupProbe {
        failure_threshold: 30,
        period_seconds: 5,
    },
    readiness: HealthProbe {
        initial_delay_seconds: 0,
        period_seconds: 10,
    },
    liveness: HealthProbe {
        initial_delay_seconds: 0,
        period_seconds: 20,
    },
};

/// Default row for runtimes that start in seconds
const DEFAULT_PROBES: ProbeSettings = ProbeSettings {
    startup: StartupProbe {
        failure_threshold: 5,
        period_seconds: 5,
    },
    readiness: HealthProbe {
        initial_delay_seconds: 2,
        period_seconds: 5,
    },
    liveness: HealthProbe {
        initial_delay_seconds: 5,
        period_seconds: 10,
    },
};

impl ProbeSettings {
    pub fn for_language(language: AppLanguage) -> Self {
        match language {
            AppLanguage::Java => JAVA_PROBES,
            AppLanguage::Go | AppLanguage::Python | AppLanguage::Dotnet => DEFAULT_PROBES,
        }
    }
}

/// JVM options pinning heap to the container's memory request and limit
pub fn java_opts(resources: &ResourceSpec) -> String {
    let initial_heap = (resources.memory_request_mib as f64 * JVM_HEAP_FRACTION).floor() as u64;
    let max_heap = (resources.memory_limit_mib as f64 * JVM_HEAP_FRACTION).floor() as u64;

    format!(
        "-Xms{}m -Xmx{}m -XX:+UseContainerSupport -XX:MaxRAMPercentage=75.0 -XshowSettings:vm",
        initial_heap, max_heap
    )
}

/// Container environment tuned for the application runtime
pub fn container_env(language: AppLanguage, resources: &ResourceSpec) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    match language {
        AppLanguage::Java => {
            env.insert("JAVA_OPTS".to_string(), java_opts(resources));
        }
        AppLanguage::Dotnet => {
            env.insert("DOTNET_gcServer".to_string(), "1".to_string());
        }
        AppLanguage::Python => {
            env.insert("PYTHONUNBUFFERED".to_string(), "1".to_string());
        }
        AppLanguage::Go => {}
    }
    env
}
