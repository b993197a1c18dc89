//! Horizontal scaling policy
//!
//! Replica bounds depend on expected throughput only. A shrinking cluster
//! changes instance footprint, not replica counts.

use crate::models::{AutoscalingSpec, ScalingMetric};
use crate::policy::PolicyConfig;
use crate::profile::AppProfile;

/// Build replica bounds and triggers for `profile`
pub fn build_policy(profile: &AppProfile, policy: &PolicyConfig) -> AutoscalingSpec {
    let by_load = u32::try_from(profile.peak_rps / policy.rps_per_instance).unwrap_or(u32::MAX);
    let min_replicas = by_load.max(policy.min_replicas_floor);
    let max_replicas = min_replicas.saturating_mul(policy.burst_factor);

    AutoscalingSpec {
        min_replicas,
        max_replicas,
        metrics: vec![
            ScalingMetric::CpuUtilization {
                average_utilization: policy.cpu_target_utilization,
            },
            ScalingMetric::PodsAverageValue {
                metric_name: policy.throughput_metric_name.clone(),
                average_value: policy.throughput_target_rps,
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(rps: u64) -> (u32, u32) {
        let spec = build_policy(&AppProfile::new("api", rps), &PolicyConfig::default());
        (spec.min_replicas, spec.max_replicas)
    }

    #[test]
    fn test_replica_bounds() {
        assert_eq!(bounds(100), (3, 6));
        assert_eq!(bounds(500), (3, 6));
        assert_eq!(bounds(700), (3, 6));
        assert_eq!(bounds(1000), (5, 10));
        assert_eq!(bounds(1999), (9, 18));
    }

    #[test]
    fn test_bounds_invariants() {
        for rps in (1..20_000).step_by(37) {
            let (min, max) = bounds(rps);
            assert!(min >= 3);
            assert_eq!(max, 2 * min);
            assert_eq!(min, std::cmp::max(3, (rps / 200) as u32));
        }
    }

    #[test]
    fn test_metrics_order_and_targets() {
        let spec = build_policy(&AppProfile::new("api", 100), &PolicyConfig::default());
        assert_eq!(
            spec.metrics,
            vec![
                ScalingMetric::CpuUtilization {
                    average_utilization: 70
                },
                ScalingMetric::PodsAverageValue {
                    metric_name: "http_requests_per_second".into(),
                    average_value: 1000,
                },
            ]
        );
    }

    #[test]
    fn test_huge_rate_saturates() {
        let spec = build_policy(&AppProfile::new("api", u64::MAX), &PolicyConfig::default());
        assert_eq!(spec.min_replicas, u32::MAX);
        assert_eq!(spec.max_replicas, u32::MAX);
    }

    #[test]
    fn test_policy_overrides() {
        let policy = PolicyConfig {
            rps_per_instance: 100,
            min_replicas_floor: 2,
            burst_factor: 3,
            ..Default::default()
        };
        let spec = build_policy(&AppProfile::new("api", 450), &policy);
        assert_eq!(spec.min_replicas, 4);
        assert_eq!(spec.max_replicas, 12);
    }
}
