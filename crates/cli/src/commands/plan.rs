//! Plan command: show derived sizing, scaling and safety without writing files

use anyhow::Result;
use portal_lib::{AppProfile, CapacityProvider, DeploymentPlan, PolicyConfig};
use tabled::Tabled;

use super::take_snapshot;
use crate::output::{
    color_status, format_cpu, format_cpu_f64, format_mib, print_info, print_output, print_warning,
    OutputFormat,
};

/// Row for the plan table
#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "App")]
    app: String,
    #[tabled(rename = "Tier")]
    tier: String,
    #[tabled(rename = "CPU Req")]
    cpu_request: String,
    #[tabled(rename = "CPU Lim")]
    cpu_limit: String,
    #[tabled(rename = "Mem Req")]
    memory_request: String,
    #[tabled(rename = "Mem Lim")]
    memory_limit: String,
    #[tabled(rename = "Replicas")]
    replicas: String,
    #[tabled(rename = "Peak CPU")]
    projected_cpu: String,
    #[tabled(rename = "Threshold")]
    threshold_cpu: String,
    #[tabled(rename = "Safety")]
    safety: String,
}

impl From<&DeploymentPlan> for PlanRow {
    fn from(plan: &DeploymentPlan) -> Self {
        Self {
            app: format!("{}/{}", plan.profile.namespace, plan.profile.name),
            tier: plan.profile.tier.to_string(),
            cpu_request: format_cpu(plan.resources.cpu_request_millis),
            cpu_limit: format_cpu(plan.resources.cpu_limit_millis),
            memory_request: format_mib(plan.resources.memory_request_mib),
            memory_limit: format_mib(plan.resources.memory_limit_mib),
            replicas: format!("{}-{}", plan.autoscaling.min_replicas, plan.autoscaling.max_replicas),
            projected_cpu: format_cpu_f64(plan.safety.projected_cpu_millis),
            threshold_cpu: format_cpu_f64(plan.safety.threshold_cpu_millis),
            safety: if plan.safety.breach {
                color_status("breach")
            } else {
                color_status("ok")
            },
        }
    }
}

/// Build and print the deployment plan for `profile`
pub async fn show_plan(
    provider: &CapacityProvider,
    policy: &PolicyConfig,
    profile: AppProfile,
    strict: bool,
    format: OutputFormat,
) -> Result<()> {
    let snapshot = take_snapshot(provider, strict).await?;
    let plan = DeploymentPlan::build(profile, snapshot, policy)?;

    print_output(&plan, || vec![PlanRow::from(&plan)], format)?;
    if let OutputFormat::Json = format {
        return Ok(());
    }

    print_info(&format!(
        "Cluster: {} nodes, avg {} CPU / {} memory",
        plan.capacity.capacity.node_count,
        format_cpu(plan.capacity.capacity.avg_cpu_millis),
        format_mib(plan.capacity.capacity.avg_memory_mib),
    ));

    if let Some(reason) = plan.capacity.degraded_reason() {
        print_warning(&format!("Sized against fallback capacity: {}", reason));
    }
    if plan.safety.breach {
        print_warning(&plan.safety.warning_message());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_lib::{CapacitySnapshot, ClusterCapacity};

    #[test]
    fn test_plan_row() {
        let snapshot = CapacitySnapshot::live(ClusterCapacity::FALLBACK);
        let plan =
            DeploymentPlan::build(AppProfile::new("checkout", 500), snapshot, &PolicyConfig::default())
                .unwrap();

        let row = PlanRow::from(&plan);
        assert_eq!(row.app, "perf-test/checkout");
        assert_eq!(row.cpu_request, "800m");
        assert_eq!(row.cpu_limit, "1.6");
        assert_eq!(row.replicas, "3-6");
        assert_eq!(row.projected_cpu, "4800m");
        assert_eq!(row.threshold_cpu, "6400m");
    }
}
