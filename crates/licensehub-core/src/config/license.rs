//! License issuance policy configuration.

use serde::{Deserialize, Serialize};

/// Policy knobs for license issuance and lifecycle handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseConfig {
    /// Default license validity in days when the authorization carries
    /// neither a duration nor a latest expiry date.
    #[serde(default = "default_validity_days")]
    pub default_validity_days: i64,
    /// How old a binding request may be before it is rejected as stale,
    /// in hours.
    #[serde(default = "default_freshness_hours")]
    pub binding_freshness_hours: i64,
    /// Maximum number of binding requests accepted in one activation batch.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Window for the "expiring soon" dashboard counter, in days.
    #[serde(default = "default_expiring_soon_days")]
    pub expiring_soon_days: i64,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            default_validity_days: default_validity_days(),
            binding_freshness_hours: default_freshness_hours(),
            max_batch_size: default_max_batch_size(),
            expiring_soon_days: default_expiring_soon_days(),
        }
    }
}

fn default_validity_days() -> i64 {
    365
}

fn default_freshness_hours() -> i64 {
    24
}

fn default_max_batch_size() -> usize {
    100
}

fn default_expiring_soon_days() -> i64 {
    30
}
