//! Authorization ledger: code lifecycle and seat accounting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use licensehub_core::error::{AppError, ErrorKind};
use licensehub_core::result::AppResult;
use licensehub_core::types::{AuthorizationId, PageRequest, PageResponse};
use licensehub_database::AuthorizationStore;
use licensehub_entity::authorization::{
    Authorization, AuthorizationStatus, AuthorizationUpdate, NewAuthorization,
};
use licensehub_entity::event::{Actor, EventKind, NewEvent};

use crate::journal::EventJournal;

/// Process-local counter mixed into generated codes so that two codes
/// generated in the same nanosecond window still differ.
static CODE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// How many times creation retries after a store-detected code collision.
const CODE_GENERATION_ATTEMPTS: u32 = 3;

/// Generate a 20-character authorization code grouped 4-4-4-4-4.
///
/// Combines 12 hex characters of a random UUID, 4 of the process-local
/// counter, and 4 of the low bits of a nanosecond timestamp. Global
/// uniqueness is still enforced by the store inside the creation
/// transaction; this only makes collisions vanishingly unlikely.
fn generate_authorization_code() -> String {
    let counter = CODE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64;
    let uuid_hex = Uuid::new_v4().simple().to_string().to_uppercase();

    let raw = format!(
        "{}{:04X}{:04X}",
        &uuid_hex[..12],
        counter & 0xFFFF,
        nanos & 0xFFFF
    );
    format!(
        "{}-{}-{}-{}-{}",
        &raw[0..4],
        &raw[4..8],
        &raw[8..12],
        &raw[12..16],
        &raw[16..20]
    )
}

/// Authorization records, seat counters, and expiry policy.
#[derive(Clone)]
pub struct AuthorizationLedger {
    store: Arc<dyn AuthorizationStore>,
    journal: Arc<EventJournal>,
}

impl AuthorizationLedger {
    /// Create a ledger on the given store.
    pub fn new(store: Arc<dyn AuthorizationStore>, journal: Arc<EventJournal>) -> Self {
        Self { store, journal }
    }

    /// Create an authorization, generating a code when none is supplied.
    ///
    /// Generated codes retry on a store-detected collision; an explicit
    /// code that collides fails `DuplicateCode` immediately.
    pub async fn create(&self, actor: Actor, req: NewAuthorization) -> AppResult<Authorization> {
        if req.customer_name.trim().is_empty() {
            return Err(AppError::validation("customer_name must not be empty"));
        }
        if req.max_seats < 1 {
            return Err(AppError::validation("max_seats must be at least 1"));
        }
        if matches!(req.duration_years, Some(years) if years < 1) {
            return Err(AppError::validation("duration_years must be at least 1"));
        }

        let explicit_code = req.authorization_code.clone();
        let mut attempts_left = if explicit_code.is_some() {
            1
        } else {
            CODE_GENERATION_ATTEMPTS
        };

        loop {
            let code = explicit_code
                .clone()
                .unwrap_or_else(generate_authorization_code);
            let now = Utc::now();
            let auth = Authorization {
                id: AuthorizationId::new(),
                customer_name: req.customer_name.clone(),
                authorization_code: code,
                max_seats: req.max_seats,
                used_seats: 0,
                duration_years: req.duration_years,
                latest_expiry_date: req.latest_expiry_date,
                status: AuthorizationStatus::Enabled,
                created_at: now,
                updated_at: now,
            };

            match self.store.insert(&auth).await {
                Ok(created) => {
                    info!(
                        authorization_code = %created.authorization_code,
                        customer = %created.customer_name,
                        max_seats = created.max_seats,
                        "Created authorization"
                    );
                    self.journal
                        .record(NewEvent::on_authorization(
                            EventKind::AuthorizationCreated,
                            actor,
                            created.id,
                            serde_json::json!({
                                "authorization_code": created.authorization_code,
                                "customer_name": created.customer_name,
                                "max_seats": created.max_seats,
                            }),
                        ))
                        .await;
                    return Ok(created);
                }
                Err(e) if e.kind == ErrorKind::DuplicateCode && attempts_left > 1 => {
                    warn!("Generated authorization code collided, retrying");
                    attempts_left -= 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetch by id.
    pub async fn get(&self, id: AuthorizationId) -> AppResult<Authorization> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::invalid_auth_code(format!("authorization {id} does not exist")))
    }

    /// Fetch by code without checking status (admin/read paths).
    pub async fn get_by_code(&self, code: &str) -> AppResult<Authorization> {
        self.store
            .find_by_code(code)
            .await?
            .ok_or_else(|| AppError::invalid_auth_code("authorization code does not exist"))
    }

    /// Fetch by code for use in a lifecycle flow: the authorization must
    /// exist and be enabled.
    pub async fn validate_for_use(&self, code: &str) -> AppResult<Authorization> {
        let auth = self.get_by_code(code).await?;
        if !auth.is_enabled() {
            return Err(AppError::authorization_disabled(format!(
                "authorization {} is disabled",
                auth.authorization_code
            )));
        }
        Ok(auth)
    }

    /// Apply a partial update. A `max_seats` decrease below `used_seats`
    /// is rejected.
    pub async fn update(
        &self,
        actor: Actor,
        id: AuthorizationId,
        update: AuthorizationUpdate,
    ) -> AppResult<Authorization> {
        let mut auth = self.get(id).await?;

        if let Some(name) = &update.customer_name {
            if name.trim().is_empty() {
                return Err(AppError::validation("customer_name must not be empty"));
            }
            auth.customer_name = name.clone();
        }
        if let Some(max_seats) = update.max_seats {
            if max_seats < auth.used_seats {
                return Err(AppError::validation(format!(
                    "max_seats {} cannot drop below used_seats {}",
                    max_seats, auth.used_seats
                )));
            }
            auth.max_seats = max_seats;
        }
        if let Some(years) = update.duration_years {
            auth.duration_years = Some(years);
        }
        if let Some(latest) = update.latest_expiry_date {
            auth.latest_expiry_date = Some(latest);
        }
        if let Some(status) = update.status {
            auth.status = status;
        }

        let updated = self.store.update_fields(&auth).await?;
        self.journal
            .record(NewEvent::on_authorization(
                EventKind::AuthorizationUpdated,
                actor,
                updated.id,
                serde_json::to_value(&update).unwrap_or_default(),
            ))
            .await;
        Ok(updated)
    }

    /// List with optional search and status filter.
    pub async fn list(
        &self,
        page: &PageRequest,
        search: Option<&str>,
        status: Option<AuthorizationStatus>,
    ) -> AppResult<PageResponse<Authorization>> {
        self.store.list(page, search, status).await
    }

    /// Acquire `count` seats in a single atomic increment.
    pub async fn acquire_seats(
        &self,
        actor: Actor,
        auth: &Authorization,
        count: i32,
    ) -> AppResult<()> {
        if !self.store.acquire_seats(auth.id, count).await? {
            return Err(AppError::insufficient_seats(format!(
                "authorization {} cannot take {count} more seat(s)",
                auth.authorization_code
            )));
        }
        self.journal
            .record(NewEvent::on_authorization(
                EventKind::SeatsAcquired,
                actor,
                auth.id,
                serde_json::json!({ "count": count }),
            ))
            .await;
        Ok(())
    }

    /// Release `count` seats, floored at zero.
    pub async fn release_seats(
        &self,
        actor: Actor,
        auth_id: AuthorizationId,
        count: i32,
    ) -> AppResult<()> {
        self.store.release_seats(auth_id, count).await?;
        self.journal
            .record(NewEvent::on_authorization(
                EventKind::SeatsReleased,
                actor,
                auth_id,
                serde_json::json!({ "count": count }),
            ))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use licensehub_database::memory::{MemoryAuthorizationStore, MemoryEventStore};

    fn ledger() -> AuthorizationLedger {
        let journal = Arc::new(EventJournal::new(Arc::new(MemoryEventStore::new())));
        AuthorizationLedger::new(Arc::new(MemoryAuthorizationStore::new()), journal)
    }

    fn new_auth(max_seats: i32) -> NewAuthorization {
        NewAuthorization {
            customer_name: "Acme".into(),
            authorization_code: None,
            max_seats,
            duration_years: Some(1),
            latest_expiry_date: None,
        }
    }

    #[test]
    fn generated_codes_have_wire_format() {
        let code = generate_authorization_code();
        assert_eq!(code.len(), 24);
        let groups: Vec<&str> = code.split('-').collect();
        assert_eq!(groups.len(), 5);
        for group in groups {
            assert_eq!(group.len(), 4);
            assert!(group
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn generated_codes_are_distinct() {
        use std::collections::HashSet;
        let mut seen = HashSet::new();
        for _ in 0..100_000 {
            assert!(seen.insert(generate_authorization_code()));
        }
    }

    #[tokio::test]
    async fn create_generates_code_when_absent() {
        let ledger = ledger();
        let auth = ledger.create(Actor::System, new_auth(3)).await.unwrap();
        assert_eq!(auth.authorization_code.split('-').count(), 5);
        assert_eq!(auth.used_seats, 0);
        assert_eq!(auth.status, AuthorizationStatus::Enabled);
    }

    #[tokio::test]
    async fn explicit_duplicate_code_fails() {
        let ledger = ledger();
        let mut req = new_auth(3);
        req.authorization_code = Some("AAAA-BBBB-CCCC-DDDD-EEEE".into());
        ledger.create(Actor::System, req.clone()).await.unwrap();

        let err = ledger.create(Actor::System, req).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateCode);
    }

    #[tokio::test]
    async fn validate_for_use_rejects_disabled() {
        let ledger = ledger();
        let auth = ledger.create(Actor::System, new_auth(3)).await.unwrap();
        ledger
            .update(
                Actor::System,
                auth.id,
                AuthorizationUpdate {
                    status: Some(AuthorizationStatus::Disabled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = ledger
            .validate_for_use(&auth.authorization_code)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::AuthorizationDisabled);
    }

    #[tokio::test]
    async fn unknown_code_fails_invalid_auth_code() {
        let ledger = ledger();
        let err = ledger
            .validate_for_use("ZZZZ-ZZZZ-ZZZZ-ZZZZ-ZZZZ")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidAuthCode);
    }

    #[tokio::test]
    async fn max_seats_cannot_drop_below_used() {
        let ledger = ledger();
        let auth = ledger.create(Actor::System, new_auth(5)).await.unwrap();
        ledger
            .acquire_seats(Actor::System, &auth, 3)
            .await
            .unwrap();

        let err = ledger
            .update(
                Actor::System,
                auth.id,
                AuthorizationUpdate {
                    max_seats: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        // Raising is always allowed.
        let updated = ledger
            .update(
                Actor::System,
                auth.id,
                AuthorizationUpdate {
                    max_seats: Some(10),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.max_seats, 10);
    }

    #[tokio::test]
    async fn acquire_past_ceiling_fails() {
        let ledger = ledger();
        let auth = ledger.create(Actor::System, new_auth(2)).await.unwrap();
        ledger
            .acquire_seats(Actor::System, &auth, 2)
            .await
            .unwrap();

        let err = ledger
            .acquire_seats(Actor::System, &auth, 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InsufficientSeats);
    }
}
