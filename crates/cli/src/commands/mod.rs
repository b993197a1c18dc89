//! Subcommand implementations

pub mod capacity;
pub mod generate;
pub mod plan;

use anyhow::{Context, Result};
use portal_lib::{CapacityProvider, CapacitySnapshot};

/// Take a capacity snapshot, failing on unparseable capacity when `strict`
pub(crate) async fn take_snapshot(provider: &CapacityProvider, strict: bool) -> Result<CapacitySnapshot> {
    if strict {
        provider
            .snapshot()
            .await
            .context("Cluster capacity could not be determined")
    } else {
        Ok(provider.snapshot_or_fallback().await)
    }
}
