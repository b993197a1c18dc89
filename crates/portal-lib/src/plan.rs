//! Deployment plan: every derived value the manifest renderer consumes
//!
//! The profile is validated before any arithmetic runs. After that every
//! step is a total function; the safety check only advises.

use crate::autoscaling::build_policy;
use crate::capacity::CapacitySnapshot;
use crate::models::{AutoscalingSpec, ResourceSpec, SafetyReport};
use crate::observability::{PlanLogger, PortalMetrics};
use crate::policy::{PolicyConfig, PolicyError};
use crate::profile::{AppProfile, ProfileError};
use crate::runtime::{container_env, ExternalTrafficPolicy, ProbeSettings, TierSettings};
use crate::safety;
use crate::sizing::size;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// Service and ingress settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    pub metrics_path: String,
    pub service_port: u16,
    pub container_port: u16,
    pub ingress_host: String,
    pub timeout_secs: u32,
    pub external_traffic_policy: ExternalTrafficPolicy,
}

/// Initial rollout settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSettings {
    /// Matches the autoscaler minimum so the first rollout does not flap
    pub replicas: u32,
    pub termination_grace_period_secs: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentPlan {
    pub profile: AppProfile,
    pub capacity: CapacitySnapshot,
    pub resources: ResourceSpec,
    pub autoscaling: AutoscalingSpec,
    pub safety: SafetyReport,
    pub labels: BTreeMap<String, String>,
    pub monitoring_annotations: BTreeMap<String, String>,
    pub network: NetworkSettings,
    pub deployment: DeploymentSettings,
    pub probes: ProbeSettings,
    pub container_env: BTreeMap<String, String>,
}

impl DeploymentPlan {
    /// Validate `profile` and derive the full plan against `snapshot`
    pub fn build(
        profile: AppProfile,
        snapshot: CapacitySnapshot,
        policy: &PolicyConfig,
    ) -> Result<Self, PlanError> {
        let logger = PlanLogger::new(&profile.name);
        let metrics = PortalMetrics::new();

        if let Err(err) = profile.validate() {
            logger.log_profile_rejected(&err.to_string());
            metrics.inc_profile_rejections();
            return Err(err.into());
        }
        policy.validate()?;

        logger.log_capacity(&snapshot.capacity, snapshot.degraded_reason());

        let capacity = snapshot.capacity;
        let resources = size(&profile, &capacity, policy);
        let autoscaling = build_policy(&profile, policy);
        let safety = safety::validate(&profile, &capacity, &autoscaling, policy);
        if safety.breach {
            metrics.inc_safety_breaches();
        }

        let tier = TierSettings::for_tier(profile.tier);
        let network = NetworkSettings {
            metrics_path: profile.metrics_path.clone(),
            service_port: profile.service_port,
            container_port: profile.container_port,
            ingress_host: profile.ingress_host.clone(),
            timeout_secs: tier.network_timeout_secs,
            external_traffic_policy: tier.external_traffic_policy,
        };
        let deployment = DeploymentSettings {
            replicas: autoscaling.min_replicas,
            termination_grace_period_secs: tier.termination_grace_period_secs,
        };

        logger.log_plan_generated(
            &profile.namespace,
            profile.tier.as_str(),
            resources.cpu_request_millis,
            resources.cpu_limit_millis,
            resources.memory_request_mib,
            resources.memory_limit_mib,
            autoscaling.min_replicas,
            autoscaling.max_replicas,
        );
        metrics.inc_plans_generated();

        Ok(Self {
            labels: profile.labels(),
            monitoring_annotations: profile.monitoring_annotations(),
            probes: ProbeSettings::for_language(profile.language),
            container_env: container_env(profile.language, &resources),
            profile,
            capacity: snapshot,
            resources,
            autoscaling,
            safety,
            network,
            deployment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppLanguage, ClusterCapacity, Tier};

    fn live() -> CapacitySnapshot {
        CapacitySnapshot::live(ClusterCapacity::FALLBACK)
    }

    #[test]
    fn test_end_to_end_production() {
        let profile = AppProfile::new("checkout", 500);
        let plan = DeploymentPlan::build(profile, live(), &PolicyConfig::default()).unwrap();

        assert_eq!(
            plan.resources,
            ResourceSpec {
                cpu_request_millis: 800,
                cpu_limit_millis: 1600,
                memory_request_mib: 2400,
                memory_limit_mib: 2400,
            }
        );
        assert_eq!(plan.autoscaling.min_replicas, 3);
        assert_eq!(plan.autoscaling.max_replicas, 6);
        assert_eq!(plan.safety.projected_cpu_millis, 4800.0);
        assert_eq!(plan.safety.threshold_cpu_millis, 6400.0);
        assert!(!plan.safety.breach);

        assert_eq!(plan.deployment.replicas, 3);
        assert_eq!(plan.deployment.termination_grace_period_secs, 60);
        assert_eq!(plan.network.timeout_secs, 60);
        assert_eq!(plan.network.external_traffic_policy, ExternalTrafficPolicy::Local);
        assert_eq!(
            plan.container_env.get("JAVA_OPTS").map(String::as_str),
            Some("-Xms1800m -Xmx1800m -XX:+UseContainerSupport -XX:MaxRAMPercentage=75.0 -XshowSettings:vm")
        );
    }

    #[test]
    fn test_development_plan() {
        let profile = AppProfile::new("checkout", 500)
            .with_tier(Tier::Development)
            .with_language(AppLanguage::Go);
        let plan = DeploymentPlan::build(profile, live(), &PolicyConfig::default()).unwrap();

        assert_eq!(plan.resources.memory_request_mib, 1200);
        assert_eq!(plan.resources.memory_limit_mib, 2400);
        assert_eq!(plan.deployment.termination_grace_period_secs, 30);
        assert_eq!(plan.network.external_traffic_policy, ExternalTrafficPolicy::Cluster);
        assert!(plan.container_env.is_empty());
    }

    #[test]
    fn test_invalid_profile_rejected_before_sizing() {
        let profile = AppProfile::new("checkout", 0);
        let err = DeploymentPlan::build(profile, live(), &PolicyConfig::default()).unwrap_err();
        assert!(matches!(err, PlanError::Profile(ProfileError::NonPositiveRps)));
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let policy = PolicyConfig {
            development_request_divisor: 0,
            ..Default::default()
        };
        let err = DeploymentPlan::build(AppProfile::new("checkout", 100), live(), &policy).unwrap_err();
        assert!(matches!(err, PlanError::Policy(_)));
    }

    #[test]
    fn test_breach_does_not_block() {
        let profile = AppProfile::new("checkout", 10_000).with_footprint(0.5, 0.15);
        let plan = DeploymentPlan::build(profile, live(), &PolicyConfig::default()).unwrap();
        assert!(plan.safety.breach);
        assert_eq!(plan.autoscaling.max_replicas, 100);
    }

    #[test]
    fn test_degraded_snapshot_carried_through() {
        let snapshot = CapacitySnapshot::degraded(ClusterCapacity::FALLBACK, "unreachable");
        let plan = DeploymentPlan::build(AppProfile::new("checkout", 100), snapshot, &PolicyConfig::default())
            .unwrap();
        assert!(plan.capacity.is_degraded());
        assert_eq!(plan.capacity.degraded_reason(), Some("unreachable"));
    }

    #[test]
    fn test_replica_bounds_ignore_capacity() {
        let small = CapacitySnapshot::live(ClusterCapacity {
            avg_cpu_millis: 2000,
            avg_memory_mib: 4000,
            node_count: 1,
        });
        let large = CapacitySnapshot::live(ClusterCapacity {
            avg_cpu_millis: 64000,
            avg_memory_mib: 256000,
            node_count: 50,
        });
        let policy = PolicyConfig::default();
        let a = DeploymentPlan::build(AppProfile::new("api", 1000), small, &policy).unwrap();
        let b = DeploymentPlan::build(AppProfile::new("api", 1000), large, &policy).unwrap();

        assert_eq!(a.autoscaling, b.autoscaling);
        assert_ne!(a.resources, b.resources);
    }
}
