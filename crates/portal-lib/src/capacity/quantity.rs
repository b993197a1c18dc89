//! Parsing of Kubernetes allocatable quantities
//!
//! Only the forms nodes actually report are accepted:
//! - CPU: whole cores (`"4"`) or millicores (`"3500m"`)
//! - memory: `Ki`, `Mi`, `Gi` suffixes or raw bytes

use thiserror::Error;

const KIB_PER_MIB: u64 = 1024;
const MIB_PER_GIB: u64 = 1024;
const BYTES_PER_MIB: u64 = 1024 * 1024;
const MILLIS_PER_CORE: u64 = 1000;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {resource} quantity '{value}'")]
pub struct QuantityError {
    pub resource: &'static str,
    pub value: String,
}

impl QuantityError {
    fn cpu(value: &str) -> Self {
        Self {
            resource: "cpu",
            value: value.to_string(),
        }
    }

    fn memory(value: &str) -> Self {
        Self {
            resource: "memory",
            value: value.to_string(),
        }
    }
}

/// Strip surrounding whitespace and quote characters
fn clean(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '"' || c == '\'').trim()
}

fn parse_u64(digits: &str) -> Option<u64> {
    // u64::from_str accepts a leading '+', quantities never carry one
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Parse an allocatable CPU value into millicores
pub fn parse_cpu_millis(raw: &str) -> Result<u64, QuantityError> {
    let value = clean(raw);

    if let Some(millis) = value.strip_suffix('m') {
        return parse_u64(millis).ok_or_else(|| QuantityError::cpu(raw));
    }

    parse_u64(value)
        .and_then(|cores| cores.checked_mul(MILLIS_PER_CORE))
        .ok_or_else(|| QuantityError::cpu(raw))
}

/// Parse an allocatable memory value into MiB, rounding down
pub fn parse_memory_mib(raw: &str) -> Result<u64, QuantityError> {
    let value = clean(raw);

    let mib = if let Some(kib) = value.strip_suffix("Ki") {
        parse_u64(kib).map(|v| v / KIB_PER_MIB)
    } else if let Some(mib) = value.strip_suffix("Mi") {
        parse_u64(mib)
    } else if let Some(gib) = value.strip_suffix("Gi") {
        parse_u64(gib).and_then(|v| v.checked_mul(MIB_PER_GIB))
    } else {
        parse_u64(value).map(|bytes| bytes / BYTES_PER_MIB)
    };

    mib.ok_or_else(|| QuantityError::memory(raw))
}
