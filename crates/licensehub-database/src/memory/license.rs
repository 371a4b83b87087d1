//! In-memory license store using a Tokio mutex.
//!
//! The partial-unique discipline on active fingerprints is checked inside
//! the mutex-held insert, mirroring what the PostgreSQL partial unique
//! index enforces inside the insertion transaction.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use licensehub_core::error::AppError;
use licensehub_core::result::AppResult;
use licensehub_core::types::{AuthorizationId, LicenseId};
use licensehub_entity::license::{License, LicenseStatus};

use crate::store::LicenseStore;

/// In-memory license store.
#[derive(Debug, Clone, Default)]
pub struct MemoryLicenseStore {
    state: Arc<Mutex<HashMap<LicenseId, License>>>,
}

impl MemoryLicenseStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn active_fingerprint_taken(state: &HashMap<LicenseId, License>, fingerprint: &str) -> bool {
    state
        .values()
        .any(|l| l.status == LicenseStatus::Active && l.machine_fingerprint == fingerprint)
}

fn transition(
    state: &mut HashMap<LicenseId, License>,
    id: LicenseId,
    to: LicenseStatus,
    unbound_at: DateTime<Utc>,
) -> AppResult<License> {
    let row = state
        .get_mut(&id)
        .ok_or_else(|| AppError::license_not_found(format!("license {id} does not exist")))?;
    if row.status != LicenseStatus::Active {
        return Err(AppError::license_not_active(format!(
            "license {id} is {:?}, not active",
            row.status
        )));
    }
    row.status = to;
    row.unbound_at = Some(unbound_at);
    row.updated_at = Utc::now();
    Ok(row.clone())
}

#[async_trait]
impl LicenseStore for MemoryLicenseStore {
    async fn insert_active(&self, license: &License) -> AppResult<License> {
        let mut state = self.state.lock().await;
        if active_fingerprint_taken(&state, &license.machine_fingerprint) {
            return Err(AppError::duplicate_active_machine(format!(
                "machine {} already holds an active license",
                license.machine_fingerprint
            )));
        }
        state.insert(license.id, license.clone());
        Ok(license.clone())
    }

    async fn find_by_id(&self, id: LicenseId) -> AppResult<Option<License>> {
        Ok(self.state.lock().await.get(&id).cloned())
    }

    async fn find_active_by_fingerprint(&self, fingerprint: &str) -> AppResult<Option<License>> {
        Ok(self
            .state
            .lock()
            .await
            .values()
            .find(|l| l.status == LicenseStatus::Active && l.machine_fingerprint == fingerprint)
            .cloned())
    }

    async fn find_by_key_and_fingerprint(
        &self,
        license_key: &str,
        fingerprint: &str,
    ) -> AppResult<Option<License>> {
        Ok(self
            .state
            .lock()
            .await
            .values()
            .find(|l| l.license_key == license_key && l.machine_fingerprint == fingerprint)
            .cloned())
    }

    async fn transition_to_released(
        &self,
        id: LicenseId,
        unbound_at: DateTime<Utc>,
    ) -> AppResult<License> {
        let mut state = self.state.lock().await;
        transition(&mut state, id, LicenseStatus::Released, unbound_at)
    }

    async fn transition_to_revoked(
        &self,
        id: LicenseId,
        unbound_at: DateTime<Utc>,
    ) -> AppResult<License> {
        let mut state = self.state.lock().await;
        transition(&mut state, id, LicenseStatus::Revoked, unbound_at)
    }

    async fn transfer(
        &self,
        old_id: LicenseId,
        unbound_at: DateTime<Utc>,
        new_license: &License,
    ) -> AppResult<License> {
        let mut state = self.state.lock().await;

        // Validate both halves before mutating anything.
        match state.get(&old_id) {
            None => {
                return Err(AppError::license_not_found(format!(
                    "license {old_id} does not exist"
                )))
            }
            Some(old) if old.status != LicenseStatus::Active => {
                return Err(AppError::license_not_active(format!(
                    "license {old_id} is {:?}, not active",
                    old.status
                )))
            }
            Some(_) => {}
        }

        let taken_by_other = state.values().any(|l| {
            l.id != old_id
                && l.status == LicenseStatus::Active
                && l.machine_fingerprint == new_license.machine_fingerprint
        });
        if taken_by_other {
            return Err(AppError::duplicate_active_machine(format!(
                "machine {} already holds an active license",
                new_license.machine_fingerprint
            )));
        }

        transition(&mut state, old_id, LicenseStatus::Released, unbound_at)?;
        state.insert(new_license.id, new_license.clone());
        Ok(new_license.clone())
    }

    async fn delete(&self, id: LicenseId) -> AppResult<()> {
        self.state.lock().await.remove(&id);
        Ok(())
    }

    async fn list_by_authorization(&self, auth_id: AuthorizationId) -> AppResult<Vec<License>> {
        let state = self.state.lock().await;
        let mut licenses: Vec<License> = state
            .values()
            .filter(|l| l.authorization_id == auth_id)
            .cloned()
            .collect();
        licenses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(licenses)
    }

    async fn count_active_by_authorization(&self, auth_id: AuthorizationId) -> AppResult<u64> {
        let state = self.state.lock().await;
        Ok(state
            .values()
            .filter(|l| l.authorization_id == auth_id && l.status == LicenseStatus::Active)
            .count() as u64)
    }

    async fn count_active(&self) -> AppResult<u64> {
        let state = self.state.lock().await;
        Ok(state
            .values()
            .filter(|l| l.status == LicenseStatus::Active)
            .count() as u64)
    }

    async fn count_activated_since(&self, since: DateTime<Utc>) -> AppResult<u64> {
        let state = self.state.lock().await;
        Ok(state.values().filter(|l| l.activated_at >= since).count() as u64)
    }

    async fn count_active_expiring_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let state = self.state.lock().await;
        Ok(state
            .values()
            .filter(|l| l.status == LicenseStatus::Active && l.expires_at < cutoff)
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use licensehub_core::ErrorKind;

    fn license(fingerprint: &str) -> License {
        let now = Utc::now();
        License {
            id: LicenseId::new(),
            authorization_id: AuthorizationId::new(),
            license_key: format!("key-{}", LicenseId::new()),
            machine_fingerprint: fingerprint.into(),
            hostname: "WS-01".into(),
            unbind_public_key: String::new(),
            issued_at: now,
            expires_at: now + Duration::days(365),
            activated_at: now,
            unbound_at: None,
            status: LicenseStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    const FP_A: &str = "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4";
    const FP_B: &str = "b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4e5";

    #[tokio::test]
    async fn second_active_insert_for_same_machine_fails() {
        let store = MemoryLicenseStore::new();
        store.insert_active(&license(FP_A)).await.unwrap();
        let err = store.insert_active(&license(FP_A)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateActiveMachine);
    }

    #[tokio::test]
    async fn released_machine_can_activate_again() {
        let store = MemoryLicenseStore::new();
        let old = store.insert_active(&license(FP_A)).await.unwrap();
        store
            .transition_to_released(old.id, Utc::now())
            .await
            .unwrap();
        store.insert_active(&license(FP_A)).await.unwrap();
    }

    #[tokio::test]
    async fn transition_is_single_shot() {
        let store = MemoryLicenseStore::new();
        let lic = store.insert_active(&license(FP_A)).await.unwrap();
        store
            .transition_to_revoked(lic.id, Utc::now())
            .await
            .unwrap();
        let err = store
            .transition_to_revoked(lic.id, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::LicenseNotActive);
    }

    #[tokio::test]
    async fn transfer_releases_old_and_activates_new() {
        let store = MemoryLicenseStore::new();
        let old = store.insert_active(&license(FP_A)).await.unwrap();
        let new = store
            .transfer(old.id, Utc::now(), &license(FP_B))
            .await
            .unwrap();

        let old = store.find_by_id(old.id).await.unwrap().unwrap();
        assert_eq!(old.status, LicenseStatus::Released);
        assert!(old.unbound_at.is_some());
        assert_eq!(new.status, LicenseStatus::Active);
        assert_eq!(store.count_active().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn transfer_to_occupied_machine_leaves_old_active() {
        let store = MemoryLicenseStore::new();
        let old = store.insert_active(&license(FP_A)).await.unwrap();
        store.insert_active(&license(FP_B)).await.unwrap();

        let err = store
            .transfer(old.id, Utc::now(), &license(FP_B))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateActiveMachine);

        let old = store.find_by_id(old.id).await.unwrap().unwrap();
        assert_eq!(old.status, LicenseStatus::Active);
    }
}
