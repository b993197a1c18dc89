//! Worst-case footprint check against cluster capacity
//!
//! Advisory only: a breach is reported and logged, never returned as an error.

use crate::models::{AutoscalingSpec, ClusterCapacity, SafetyReport};
use crate::policy::PolicyConfig;
use crate::profile::AppProfile;
use tracing::warn;

/// Project CPU demand at max scale and compare it to the cluster threshold
pub fn validate(
    profile: &AppProfile,
    capacity: &ClusterCapacity,
    autoscaling: &AutoscalingSpec,
    policy: &PolicyConfig,
) -> SafetyReport {
    let avg_cpu = capacity.avg_cpu_millis as f64;
    let projected = avg_cpu * profile.cpu_percent * f64::from(autoscaling.max_replicas);
    let threshold = avg_cpu * capacity.node_count as f64 * policy.safety_fraction;

    let report = SafetyReport {
        app_name: profile.name.clone(),
        max_replicas: autoscaling.max_replicas,
        projected_cpu_millis: projected,
        threshold_cpu_millis: threshold,
        // equality is not a breach
        breach: projected > threshold,
    };

    if report.breach {
        warn!(
            event = "safety_breach",
            app = %report.app_name,
            max_replicas = report.max_replicas,
            projected_cpu_millis = report.projected_cpu_millis,
            threshold_cpu_millis = report.threshold_cpu_millis,
            "{}",
            report.warning_message()
        );
    }

    report
}

impl SafetyReport {
    /// Human-readable advisory for console output, in whole millicores
    pub fn warning_message(&self) -> String {
        format!(
            "Deployment '{}' is too large! At max scale ({} pods), it needs {}m. Cluster safety limit is only {}m.",
            self.app_name,
            self.max_replicas,
            self.projected_cpu_millis.floor(),
            self.threshold_cpu_millis.floor()
        )
    }
}
