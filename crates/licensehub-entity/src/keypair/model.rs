//! Server keypair entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use licensehub_core::types::KeypairId;

/// A server RSA keypair row.
///
/// Exactly one row is active at a time; prior keypairs are retained so
/// that licenses signed before a rotation remain verifiable. The private
/// half is never serialized outward.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ServerKeypair {
    /// Unique keypair identifier.
    pub id: KeypairId,
    /// PKCS#8 PEM private key.
    #[serde(skip_serializing)]
    pub private_key_pem: String,
    /// SPKI PEM public key.
    pub public_key_pem: String,
    /// Whether this is the keypair new envelopes must target.
    pub is_active: bool,
    /// When the keypair was generated.
    pub created_at: DateTime<Utc>,
}
