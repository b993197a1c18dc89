//! Capacity-aware sizing engine for the performance portal
//!
//! This crate provides:
//! - Cluster capacity snapshots with explicit degraded/invalid results
//! - Per-instance resource sizing by tier
//! - Autoscaling bounds and triggers from expected throughput
//! - A worst-case footprint safety advisory
//! - Tier and language runtime defaults
//! - Run metrics and structured logging

pub mod autoscaling;
pub mod capacity;
pub mod models;
pub mod observability;
pub mod plan;
pub mod policy;
pub mod profile;
pub mod runtime;
pub mod safety;
pub mod sizing;

pub use autoscaling::build_policy;
pub use capacity::{
    CapacityError, CapacityProvider, CapacitySnapshot, CapacityStatus, KubectlNodeSource,
    NodeAllocatable, NodeCapacitySource, StaticNodeSource,
};
pub use models::*;
pub use observability::{PlanLogger, PortalMetrics};
pub use plan::{DeploymentPlan, DeploymentSettings, NetworkSettings, PlanError};
pub use policy::{PolicyConfig, PolicyError};
pub use profile::{AppProfile, ProfileError};
pub use sizing::size;
