//! Authorization entity model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use licensehub_core::types::AuthorizationId;

/// Lifecycle status of an authorization.
///
/// Authorizations are never physically deleted; `Disabled` is the terminal
/// state. A disabled authorization refuses new seat acquisitions but still
/// accepts seat releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    /// The authorization may acquire and release seats.
    Enabled,
    /// New acquisitions are refused; releases still apply.
    Disabled,
}

/// A customer-scoped record granting a fixed number of activation seats.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Authorization {
    /// Unique authorization identifier.
    pub id: AuthorizationId,
    /// Display name of the customer holding this authorization.
    pub customer_name: String,
    /// Opaque authorization code, 20 uppercase alphanumerics grouped 4-4-4-4-4.
    pub authorization_code: String,
    /// Maximum number of concurrently active seats.
    pub max_seats: i32,
    /// Number of seats currently consumed by active licenses.
    pub used_seats: i32,
    /// Optional license validity in years from activation.
    pub duration_years: Option<i32>,
    /// Optional hard upper bound on license expiry.
    pub latest_expiry_date: Option<DateTime<Utc>>,
    /// Current status.
    pub status: AuthorizationStatus,
    /// When the authorization was created.
    pub created_at: DateTime<Utc>,
    /// When the authorization was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Authorization {
    /// Whether this authorization may acquire new seats.
    pub fn is_enabled(&self) -> bool {
        self.status == AuthorizationStatus::Enabled
    }

    /// Number of seats still available for acquisition.
    pub fn available_seats(&self) -> i32 {
        self.max_seats - self.used_seats
    }

    /// Whether `required` more seats can be acquired.
    pub fn has_available_seats(&self, required: i32) -> bool {
        self.available_seats() >= required
    }

    /// Compute the expiry date for a license issued now.
    ///
    /// Takes the earlier of `now + duration_years` and `latest_expiry_date`
    /// when both are set, whichever is defined when only one is set, and
    /// `now + default_validity_days` when neither is. Years convert at
    /// exactly 365 days.
    pub fn license_expiry_from(
        &self,
        now: DateTime<Utc>,
        default_validity_days: i64,
    ) -> DateTime<Utc> {
        let duration_expiry = self
            .duration_years
            .map(|years| now + Duration::days(365 * i64::from(years)));

        match (duration_expiry, self.latest_expiry_date) {
            (Some(from_duration), Some(latest)) => from_duration.min(latest),
            (Some(from_duration), None) => from_duration,
            (None, Some(latest)) => latest,
            (None, None) => now + Duration::days(default_validity_days),
        }
    }
}

/// Fields for creating a new authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuthorization {
    /// Customer display name.
    pub customer_name: String,
    /// Explicit authorization code; generated when absent.
    pub authorization_code: Option<String>,
    /// Maximum seats granted (must be positive).
    pub max_seats: i32,
    /// Optional license validity in years.
    pub duration_years: Option<i32>,
    /// Optional hard expiry bound.
    pub latest_expiry_date: Option<DateTime<Utc>>,
}

/// Partial update applied to an existing authorization.
///
/// `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizationUpdate {
    /// New customer name.
    pub customer_name: Option<String>,
    /// New seat ceiling; a decrease below `used_seats` is rejected.
    pub max_seats: Option<i32>,
    /// New validity duration in years.
    pub duration_years: Option<i32>,
    /// New hard expiry bound.
    pub latest_expiry_date: Option<DateTime<Utc>>,
    /// New status.
    pub status: Option<AuthorizationStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authorization(
        duration_years: Option<i32>,
        latest_expiry_date: Option<DateTime<Utc>>,
    ) -> Authorization {
        let now = Utc::now();
        Authorization {
            id: AuthorizationId::new(),
            customer_name: "Acme".into(),
            authorization_code: "AAAA-BBBB-CCCC-DDDD-EEEE".into(),
            max_seats: 5,
            used_seats: 2,
            duration_years,
            latest_expiry_date,
            status: AuthorizationStatus::Enabled,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn available_seats_subtracts_used() {
        let auth = authorization(None, None);
        assert_eq!(auth.available_seats(), 3);
        assert!(auth.has_available_seats(3));
        assert!(!auth.has_available_seats(4));
    }

    #[test]
    fn expiry_uses_duration_when_only_duration_set() {
        let now = Utc::now();
        let auth = authorization(Some(2), None);
        assert_eq!(
            auth.license_expiry_from(now, 365),
            now + Duration::days(730)
        );
    }

    #[test]
    fn expiry_takes_earlier_of_duration_and_latest() {
        let now = Utc::now();
        let latest = now + Duration::days(100);
        let auth = authorization(Some(1), Some(latest));
        assert_eq!(auth.license_expiry_from(now, 365), latest);

        let distant = now + Duration::days(5000);
        let auth = authorization(Some(1), Some(distant));
        assert_eq!(
            auth.license_expiry_from(now, 365),
            now + Duration::days(365)
        );
    }

    #[test]
    fn expiry_falls_back_to_default_policy() {
        let now = Utc::now();
        let auth = authorization(None, None);
        assert_eq!(
            auth.license_expiry_from(now, 365),
            now + Duration::days(365)
        );
    }
}
