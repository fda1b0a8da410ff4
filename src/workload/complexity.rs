//! Per-request complexity lookup.
//!
//! The `config` query parameter carries `name1:value1,name2:value2,...`. The
//! first entry naming this node with a non-negative integer value wins; bad
//! entries are logged and skipped.

use tracing::warn;

/// Resolves the workload intensity for one node identity.
#[derive(Debug, Clone)]
pub struct ComplexityResolver {
    identity: String,
    default_intensity: u64,
}

impl ComplexityResolver {
    pub fn new<S: Into<String>>(identity: S, default_intensity: u64) -> Self {
        Self {
            identity: identity.into(),
            default_intensity,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn default_intensity(&self) -> u64 {
        self.default_intensity
    }

    pub fn resolve(&self, raw_config: &str) -> u64 {
        resolve(raw_config, &self.identity, self.default_intensity)
    }
}

/// Resolve the intensity for `local_service_id` from a raw complexity config.
pub fn resolve(raw_config: &str, local_service_id: &str, default_intensity: u64) -> u64 {
    if raw_config.is_empty() {
        return default_intensity;
    }

    for entry in raw_config.split(',') {
        let (name, value) = split_entry(entry);
        if name != local_service_id {
            continue;
        }

        match value.parse::<i64>() {
            Ok(intensity) if intensity >= 0 => return intensity as u64,
            Ok(intensity) => {
                warn!(entry = %entry, intensity, "Negative complexity value, skipping");
            }
            Err(e) => {
                warn!(entry = %entry, error = %e, "Invalid complexity numeric value, skipping");
            }
        }
    }

    default_intensity
}

/// Split an entry on its first `:`. An entry without a separator yields an
/// empty value.
fn split_entry(entry: &str) -> (&str, &str) {
    match entry.split_once(':') {
        Some((name, value)) => (name, value),
        None => {
            if !entry.is_empty() {
                warn!(entry = %entry, "Invalid complexity argument, missing ':'");
            }
            (entry, "")
        }
    }
}
