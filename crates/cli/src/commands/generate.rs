//! Generate command: write manifests and dashboard for an application

use anyhow::{Context, Result};
use portal_lib::{AppProfile, CapacityProvider, DeploymentPlan, PolicyConfig};
use std::path::{Path, PathBuf};
use tracing::info;

use super::take_snapshot;
use crate::output::{print_success, print_warning};
use crate::render::{dashboard, manifests};

/// Paths of the files written for one application
#[derive(Debug)]
pub struct GeneratedFiles {
    pub manifest: PathBuf,
    pub dashboard: PathBuf,
}

/// Render the plan's manifests and dashboard into `output_dir`
pub fn write_outputs(plan: &DeploymentPlan, output_dir: &Path) -> Result<GeneratedFiles> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let name = &plan.profile.name;
    let manifest = output_dir.join(format!("{}-combined.yaml", name));
    let yaml = manifests::combined_manifest(plan)?;
    std::fs::write(&manifest, yaml)
        .with_context(|| format!("Failed to write {}", manifest.display()))?;

    let dashboard = output_dir.join(format!("{}-dashboard.json", name));
    let json = dashboard::dashboard_json(&plan.profile)?;
    std::fs::write(&dashboard, json)
        .with_context(|| format!("Failed to write {}", dashboard.display()))?;

    info!(
        event = "files_written",
        app = %name,
        manifest = %manifest.display(),
        dashboard = %dashboard.display(),
        "Generated deployment files"
    );

    Ok(GeneratedFiles { manifest, dashboard })
}

/// Build the plan for `profile` and write its files
pub async fn generate(
    provider: &CapacityProvider,
    policy: &PolicyConfig,
    profile: AppProfile,
    output_dir: &Path,
    strict: bool,
) -> Result<()> {
    let snapshot = take_snapshot(provider, strict).await?;
    let plan = DeploymentPlan::build(profile, snapshot, policy)?;

    if let Some(reason) = plan.capacity.degraded_reason() {
        print_warning(&format!("Sized against fallback capacity: {}", reason));
    }
    if plan.safety.breach {
        print_warning(&plan.safety.warning_message());
    }

    let files = write_outputs(&plan, output_dir)?;
    print_success(&format!("Successfully generated: {}", files.manifest.display()));
    print_success(&format!("Dashboard generated: {}", files.dashboard.display()));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_lib::{CapacitySnapshot, ClusterCapacity, StaticNodeSource};
    use std::sync::Arc;

    fn plan(profile: AppProfile) -> DeploymentPlan {
        let snapshot = CapacitySnapshot::live(ClusterCapacity::FALLBACK);
        DeploymentPlan::build(profile, snapshot, &PolicyConfig::default()).unwrap()
    }

    #[test]
    fn test_write_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("output");

        let files = write_outputs(&plan(AppProfile::new("checkout", 500)), &output_dir).unwrap();
        assert_eq!(files.manifest, output_dir.join("checkout-combined.yaml"));
        assert_eq!(files.dashboard, output_dir.join("checkout-dashboard.json"));

        let yaml = std::fs::read_to_string(&files.manifest).unwrap();
        assert!(yaml.contains("kind: Deployment"));
        assert!(yaml.contains("kind: ServiceMonitor"));

        let json = std::fs::read_to_string(&files.dashboard).unwrap();
        assert!(json.contains("App: checkout - Performance"));
    }

    #[tokio::test]
    async fn test_generate_with_breach_still_writes() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CapacityProvider::new(Arc::new(StaticNodeSource::default()));
        let profile = AppProfile::new("bulk", 20000).with_footprint(0.5, 0.15);

        generate(&provider, &PolicyConfig::default(), profile, dir.path(), false)
            .await
            .unwrap();

        assert!(dir.path().join("bulk-combined.yaml").exists());
        assert!(dir.path().join("bulk-dashboard.json").exists());
    }

    #[tokio::test]
    async fn test_generate_rejects_invalid_profile() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CapacityProvider::new(Arc::new(StaticNodeSource::default()));

        let result = generate(
            &provider,
            &PolicyConfig::default(),
            AppProfile::new("Not_A_Label", 500),
            dir.path(),
            false,
        )
        .await;

        assert!(result.is_err());
        assert!(!dir.path().join("Not_A_Label-combined.yaml").exists());
    }
}
