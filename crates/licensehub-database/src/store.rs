//! Store traits for the four persisted tables.
//!
//! Two implementations exist for each trait: PostgreSQL ([`crate::postgres`])
//! for production and in-memory ([`crate::memory`]) for single-node
//! development and tests. Both honor the same transactional contracts:
//! the conditional seat update, the partial-unique active fingerprint,
//! and atomic keypair activation.
//!
//! Stores surface the narrowest error kind they can decide locally
//! (`DuplicateCode`, `DuplicateActiveMachine`, `LicenseNotFound`,
//! `LicenseNotActive`); everything else is `StoreUnavailable`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use licensehub_core::result::AppResult;
use licensehub_core::types::{AuthorizationId, LicenseId, PageRequest, PageResponse};
use licensehub_entity::authorization::{Authorization, AuthorizationStatus};
use licensehub_entity::event::{EventKind, EventRecord, NewEvent};
use licensehub_entity::keypair::ServerKeypair;
use licensehub_entity::license::License;

/// Aggregate seat counters across enabled authorizations.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeatTotals {
    /// Sum of `max_seats`.
    pub total_seats: i64,
    /// Sum of `used_seats`.
    pub used_seats: i64,
}

/// Store for authorization rows and their seat counters.
#[async_trait]
pub trait AuthorizationStore: Send + Sync + 'static {
    /// Insert a fully built row. Fails `DuplicateCode` when the
    /// authorization code already exists.
    async fn insert(&self, auth: &Authorization) -> AppResult<Authorization>;

    /// Find by primary key.
    async fn find_by_id(&self, id: AuthorizationId) -> AppResult<Option<Authorization>>;

    /// Find by authorization code.
    async fn find_by_code(&self, code: &str) -> AppResult<Option<Authorization>>;

    /// Persist modified non-counter fields of an existing row.
    async fn update_fields(&self, auth: &Authorization) -> AppResult<Authorization>;

    /// Atomically increment `used_seats` by `count`, guarded by
    /// `used_seats + count <= max_seats`.
    ///
    /// Returns `false` when the guard fails (the caller decides this is
    /// `InsufficientSeats`).
    async fn acquire_seats(&self, id: AuthorizationId, count: i32) -> AppResult<bool>;

    /// Atomically decrement `used_seats` by `count`, floored at zero.
    async fn release_seats(&self, id: AuthorizationId, count: i32) -> AppResult<()>;

    /// List rows newest-first with optional customer-name/code substring
    /// search and status filter.
    async fn list(
        &self,
        page: &PageRequest,
        search: Option<&str>,
        status: Option<AuthorizationStatus>,
    ) -> AppResult<PageResponse<Authorization>>;

    /// Count rows, optionally filtered by status.
    async fn count(&self, status: Option<AuthorizationStatus>) -> AppResult<u64>;

    /// Seat counters summed over enabled authorizations.
    async fn seat_totals(&self) -> AppResult<SeatTotals>;

    /// Count rows created at or after `since`.
    async fn count_created_since(&self, since: DateTime<Utc>) -> AppResult<u64>;

    /// Count distinct customer names on enabled authorizations.
    async fn count_distinct_customers(&self) -> AppResult<u64>;
}

/// Store for license rows.
#[async_trait]
pub trait LicenseStore: Send + Sync + 'static {
    /// Insert an active row. Fails `DuplicateActiveMachine` when an active
    /// row with the same fingerprint exists; the check happens inside the
    /// insertion transaction.
    async fn insert_active(&self, license: &License) -> AppResult<License>;

    /// Find by primary key.
    async fn find_by_id(&self, id: LicenseId) -> AppResult<Option<License>>;

    /// The active license bound to `fingerprint`, if any.
    async fn find_active_by_fingerprint(&self, fingerprint: &str) -> AppResult<Option<License>>;

    /// Find by the `(license_key, machine_fingerprint)` pair.
    async fn find_by_key_and_fingerprint(
        &self,
        license_key: &str,
        fingerprint: &str,
    ) -> AppResult<Option<License>>;

    /// Transition an active license to `released`, setting `unbound_at`.
    ///
    /// Fails `LicenseNotFound` / `LicenseNotActive`.
    async fn transition_to_released(
        &self,
        id: LicenseId,
        unbound_at: DateTime<Utc>,
    ) -> AppResult<License>;

    /// Transition an active license to `revoked`, setting `unbound_at`.
    ///
    /// Fails `LicenseNotFound` / `LicenseNotActive`.
    async fn transition_to_revoked(
        &self,
        id: LicenseId,
        unbound_at: DateTime<Utc>,
    ) -> AppResult<License>;

    /// In one transaction: release the old license and insert the new
    /// active one. Fails `LicenseNotFound` / `LicenseNotActive` for the
    /// old row and `DuplicateActiveMachine` for the new fingerprint;
    /// either failure leaves both rows untouched.
    async fn transfer(
        &self,
        old_id: LicenseId,
        unbound_at: DateTime<Utc>,
        new_license: &License,
    ) -> AppResult<License>;

    /// Delete a row outright. Compensating action for a failed activation
    /// batch only.
    async fn delete(&self, id: LicenseId) -> AppResult<()>;

    /// All licenses owned by an authorization, newest-first.
    async fn list_by_authorization(&self, auth_id: AuthorizationId) -> AppResult<Vec<License>>;

    /// Count active licenses owned by an authorization.
    async fn count_active_by_authorization(&self, auth_id: AuthorizationId) -> AppResult<u64>;

    /// Count active licenses across the registry.
    async fn count_active(&self) -> AppResult<u64>;

    /// Count licenses activated at or after `since`.
    async fn count_activated_since(&self, since: DateTime<Utc>) -> AppResult<u64>;

    /// Count active licenses expiring before `cutoff`.
    async fn count_active_expiring_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;
}

/// Store for server keypairs.
#[async_trait]
pub trait KeypairStore: Send + Sync + 'static {
    /// The currently active keypair, if one exists.
    async fn find_active(&self) -> AppResult<Option<ServerKeypair>>;

    /// Atomically deactivate the prior active keypair and insert a new
    /// active one. Readers observe either the old or the new active row,
    /// never both and never neither.
    async fn activate_new(
        &self,
        private_key_pem: &str,
        public_key_pem: &str,
    ) -> AppResult<ServerKeypair>;

    /// All keypairs newest-first. Retained forever so old signatures stay
    /// verifiable.
    async fn list(&self) -> AppResult<Vec<ServerKeypair>>;
}

/// Append-only store for journal events.
#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// Append one record.
    async fn append(&self, event: &NewEvent) -> AppResult<EventRecord>;

    /// The most recent `limit` records, newest-first.
    async fn recent(&self, limit: u64) -> AppResult<Vec<EventRecord>>;

    /// List records newest-first with an optional kind filter.
    async fn list(
        &self,
        page: &PageRequest,
        kind: Option<EventKind>,
    ) -> AppResult<PageResponse<EventRecord>>;
}
