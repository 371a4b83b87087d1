//! Binding request artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A device's request to activate a seat, produced on the device and
/// uploaded inside an envelope.
///
/// Field order is the canonical wire order; do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingRequest {
    /// Device hostname (display only; must be non-empty).
    pub hostname: String,
    /// Hardware-derived fingerprint (32 or 64 hex characters).
    pub machine_fingerprint: String,
    /// When the device produced the request; stale requests are rejected.
    pub request_time: DateTime<Utc>,
}

impl BindingRequest {
    /// How long since the device produced this request.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.request_time
    }
}
