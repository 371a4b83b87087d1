//! Dashboard statistics.
//!
//! A closed record rather than an open name→value bundle; new fields are
//! added here explicitly when the dashboard grows.

use std::sync::Arc;

use chrono::{Duration, NaiveTime, Utc};
use serde::Serialize;

use licensehub_core::config::LicenseConfig;
use licensehub_core::result::AppResult;
use licensehub_database::{AuthorizationStore, LicenseStore};
use licensehub_entity::authorization::AuthorizationStatus;
use licensehub_entity::event::EventRecord;

use crate::journal::{EventJournal, RECENT_EVENTS_LIMIT};

/// Aggregate numbers shown on the operator dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    /// All authorizations, any status.
    pub total_authorizations: u64,
    /// Enabled authorizations.
    pub active_authorizations: u64,
    /// Seats granted across enabled authorizations.
    pub total_seats: i64,
    /// Seats consumed across enabled authorizations.
    pub used_seats: i64,
    /// Active licenses across the registry.
    pub active_devices: u64,
    /// Authorizations created since local midnight UTC.
    pub today_new_authorizations: u64,
    /// Devices activated since local midnight UTC.
    pub today_new_devices: u64,
    /// Active licenses expiring within the configured window.
    pub expiring_within_30d_licenses: u64,
    /// Distinct customer names on enabled authorizations.
    pub active_customers: u64,
    /// Latest journal records, newest-first.
    pub recent_events: Vec<EventRecord>,
}

/// Computes [`DashboardStats`] from the stores.
#[derive(Clone)]
pub struct StatsService {
    authorizations: Arc<dyn AuthorizationStore>,
    licenses: Arc<dyn LicenseStore>,
    journal: Arc<EventJournal>,
    config: LicenseConfig,
}

impl StatsService {
    /// Wire the service onto its stores.
    pub fn new(
        authorizations: Arc<dyn AuthorizationStore>,
        licenses: Arc<dyn LicenseStore>,
        journal: Arc<EventJournal>,
        config: LicenseConfig,
    ) -> Self {
        Self {
            authorizations,
            licenses,
            journal,
            config,
        }
    }

    /// Compute a dashboard snapshot.
    pub async fn dashboard(&self) -> AppResult<DashboardStats> {
        let now = Utc::now();
        let today = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let expiry_cutoff = now + Duration::days(self.config.expiring_soon_days);

        let seat_totals = self.authorizations.seat_totals().await?;

        Ok(DashboardStats {
            total_authorizations: self.authorizations.count(None).await?,
            active_authorizations: self
                .authorizations
                .count(Some(AuthorizationStatus::Enabled))
                .await?,
            total_seats: seat_totals.total_seats,
            used_seats: seat_totals.used_seats,
            active_devices: self.licenses.count_active().await?,
            today_new_authorizations: self.authorizations.count_created_since(today).await?,
            today_new_devices: self.licenses.count_activated_since(today).await?,
            expiring_within_30d_licenses: self
                .licenses
                .count_active_expiring_before(expiry_cutoff)
                .await?,
            active_customers: self.authorizations.count_distinct_customers().await?,
            recent_events: self.journal.recent(RECENT_EVENTS_LIMIT).await?,
        })
    }
}
