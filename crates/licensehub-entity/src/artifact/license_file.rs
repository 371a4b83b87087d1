//! Issued license artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// License type issued for every activation. Carried for device display
/// and future tiering.
pub const LICENSE_TYPE_FULL: &str = "FULL";

/// The signed payload of an issued license.
///
/// This struct is signed as the exact byte sequence of its canonical JSON
/// encoding; field order is the canonical wire order; do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseData {
    /// Content-derived unique key (hex SHA-256).
    pub license_key: String,
    /// Machine fingerprint the license is bound to.
    pub machine_fingerprint: String,
    /// Device hostname.
    pub hostname: String,
    /// When the license was issued.
    pub issued_at: DateTime<Utc>,
    /// When the license expires (checked by the device against its clock).
    pub expires_at: DateTime<Utc>,
    /// License tier.
    pub license_type: String,
    /// PKCS#8 PEM private half of the per-license unbind keypair.
    ///
    /// The artifact itself is the capability to later release this
    /// license; the server retains only the public half.
    pub unbind_private_key: String,
}

/// The license artifact returned to the device: signed payload plus the
/// server's signature over its canonical encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedLicense {
    /// The signed payload.
    pub license_data: LicenseData,
    /// Standard-base64 RSASSA-PKCS1-v1_5/SHA-256 signature.
    pub signature: String,
}
