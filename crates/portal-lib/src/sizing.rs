//! Per-instance resource sizing
//!
//! Requests are a fraction of the average node so an instance fits on any
//! node. Memory limits never exceed the computed base: a limit above the
//! request invites eviction surprises under node pressure.

use crate::models::{ClusterCapacity, ResourceSpec, Tier};
use crate::policy::PolicyConfig;
use crate::profile::AppProfile;

/// Base request before tier adjustment: `floor(avg * fraction)`
fn base_request(avg: u64, fraction: f64) -> u64 {
    (avg as f64 * fraction).floor() as u64
}

/// Derive requests and limits for one instance of `profile`
pub fn size(profile: &AppProfile, capacity: &ClusterCapacity, policy: &PolicyConfig) -> ResourceSpec {
    let base_cpu = base_request(capacity.avg_cpu_millis, profile.cpu_percent);
    let base_mem = base_request(capacity.avg_memory_mib, profile.mem_percent);

    match profile.tier {
        Tier::Production => ResourceSpec {
            cpu_request_millis: base_cpu,
            cpu_limit_millis: base_cpu.saturating_mul(policy.production_cpu_limit_factor),
            memory_request_mib: base_mem,
            memory_limit_mib: base_mem,
        },
        // Smaller floor, same memory ceiling as production's request, so
        // test loads do not get OOM-killed.
        Tier::Development => ResourceSpec {
            cpu_request_millis: base_cpu / policy.development_request_divisor,
            cpu_limit_millis: base_cpu,
            memory_request_mib: base_mem / policy.development_request_divisor,
            memory_limit_mib: base_mem,
        },
    }
}
