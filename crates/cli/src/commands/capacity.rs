//! Cluster capacity command

use anyhow::Result;
use portal_lib::{CapacityProvider, CapacitySnapshot, CapacityStatus};
use tabled::Tabled;

use super::take_snapshot;
use crate::output::{color_status, format_cpu, format_mib, print_output, print_warning, OutputFormat};

/// Row for the capacity table
#[derive(Tabled)]
struct CapacityRow {
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Nodes")]
    nodes: u64,
    #[tabled(rename = "Avg CPU")]
    avg_cpu: String,
    #[tabled(rename = "Avg Memory")]
    avg_memory: String,
    #[tabled(rename = "Total CPU")]
    total_cpu: String,
    #[tabled(rename = "Observed")]
    observed_at: String,
}

/// Show the cluster capacity snapshot
pub async fn show_capacity(provider: &CapacityProvider, strict: bool, format: OutputFormat) -> Result<()> {
    let snapshot = take_snapshot(provider, strict).await?;

    print_output(&snapshot, || vec![CapacityRow::from(&snapshot)], format)?;

    if let (OutputFormat::Table, Some(reason)) = (format, snapshot.degraded_reason()) {
        print_warning(&format!("Using fallback capacity: {}", reason));
    }

    Ok(())
}

impl From<&CapacitySnapshot> for CapacityRow {
    fn from(snapshot: &CapacitySnapshot) -> Self {
            let status = match &snapshot.status {
            CapacityStatus::Live => "live",
            CapacityStatus::Degraded { .. } => "degraded",
        };
        Self {
            status: color_status(status),
            nodes: snapshot.capacity.node_count,
            avg_cpu: format_cpu(snapshot.capacity.avg_cpu_millis),
            avg_memory: format_mib(snapshot.capacity.avg_memory_mib),
            total_cpu: format_cpu(snapshot.capacity.total_cpu_millis()),
            observed_at: snapshot.observed_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        }
    }
}
