//! License entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use licensehub_core::types::{AuthorizationId, LicenseId};

/// Lifecycle status of a license.
///
/// `Released` and `Revoked` are terminal; rows are retained for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum LicenseStatus {
    /// The license is bound to its machine and consumes a seat.
    Active,
    /// The device holder released the license (client-initiated).
    Released,
    /// An administrator revoked the license.
    Revoked,
}

/// A persisted record of one device activation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct License {
    /// Unique license identifier.
    pub id: LicenseId,
    /// The authorization that owns this license.
    pub authorization_id: AuthorizationId,
    /// Content-derived unique key (hex SHA-256).
    pub license_key: String,
    /// Machine fingerprint this license is bound to.
    pub machine_fingerprint: String,
    /// Device hostname, for display only.
    pub hostname: String,
    /// PEM public half of the per-license unbind keypair.
    pub unbind_public_key: String,
    /// When the license artifact was issued.
    pub issued_at: DateTime<Utc>,
    /// When the license expires (device-checked).
    pub expires_at: DateTime<Utc>,
    /// When the device activation was recorded.
    pub activated_at: DateTime<Utc>,
    /// When the license left the active state, if it has.
    pub unbound_at: Option<DateTime<Utc>>,
    /// Current status.
    pub status: LicenseStatus,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last modified.
    pub updated_at: DateTime<Utc>,
}

impl License {
    /// Whether the license is active and not yet past its expiry.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == LicenseStatus::Active && now < self.expires_at
    }

    /// Whether the license has passed its expiry date.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether a release or revocation may be applied.
    pub fn can_unbind(&self) -> bool {
        self.status == LicenseStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn license(status: LicenseStatus, expires_in: Duration) -> License {
        let now = Utc::now();
        License {
            id: LicenseId::new(),
            authorization_id: AuthorizationId::new(),
            license_key: "00".repeat(32),
            machine_fingerprint: "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4".into(),
            hostname: "WS-01".into(),
            unbind_public_key: String::new(),
            issued_at: now,
            expires_at: now + expires_in,
            activated_at: now,
            unbound_at: None,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn active_license_within_expiry_is_active() {
        let lic = license(LicenseStatus::Active, Duration::days(30));
        assert!(lic.is_active(Utc::now()));
        assert!(lic.can_unbind());
    }

    #[test]
    fn expired_license_is_not_active() {
        let lic = license(LicenseStatus::Active, Duration::days(-1));
        let now = Utc::now();
        assert!(!lic.is_active(now));
        assert!(lic.is_expired(now));
    }

    #[test]
    fn terminal_states_cannot_unbind() {
        assert!(!license(LicenseStatus::Released, Duration::days(30)).can_unbind());
        assert!(!license(LicenseStatus::Revoked, Duration::days(30)).can_unbind());
    }
}
