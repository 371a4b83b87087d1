//! Unbind proof artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Context recorded alongside an unbind proof.
///
/// Field order is the canonical wire order; do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbindMetadata {
    /// When the device produced the proof.
    pub unbind_time: DateTime<Utc>,
    /// Device hostname at unbind time.
    pub hostname: String,
    /// Client software version that produced the proof.
    pub client_version: String,
    /// Free-form reason given by the device holder.
    pub unbind_reason: String,
}

/// The artifact authorizing release of one specific license.
///
/// `unbind_proof` is the signature over the literal colon-delimited string
/// `license_key:machine_fingerprint:unbind_time:hostname`, produced with
/// the ephemeral private key shipped inside the original [`IssuedLicense`].
///
/// [`IssuedLicense`]: crate::artifact::IssuedLicense
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbindProof {
    /// Key of the license being released.
    pub license_key: String,
    /// Fingerprint of the machine being released.
    pub machine_fingerprint: String,
    /// Unbind context.
    pub unbind_metadata: UnbindMetadata,
    /// Standard-base64 signature over the colon-delimited signable.
    pub unbind_proof: String,
}
