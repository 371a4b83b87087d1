//! PostgreSQL license store.
//!
//! The at-most-one-active-per-machine invariant is enforced by the partial
//! unique index `licenses_active_fingerprint_idx`; unique violations on
//! insert surface as `DuplicateActiveMachine` from within the insertion
//! transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use licensehub_core::error::{AppError, ErrorKind};
use licensehub_core::result::AppResult;
use licensehub_core::types::{AuthorizationId, LicenseId};
use licensehub_entity::license::{License, LicenseStatus};

use crate::store::LicenseStore;

/// License store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgLicenseStore {
    pool: PgPool,
}

impl PgLicenseStore {
    /// Create a new store on the shared pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve whether a failed conditional transition means not-found or
    /// not-active.
    async fn transition_failure(&self, id: LicenseId) -> AppError {
        match self.find_by_id(id).await {
            Ok(Some(license)) => AppError::license_not_active(format!(
                "license {id} is {:?}, not active",
                license.status
            )),
            Ok(None) => AppError::license_not_found(format!("license {id} does not exist")),
            Err(e) => e,
        }
    }

    async fn transition(
        &self,
        id: LicenseId,
        to: LicenseStatus,
        unbound_at: DateTime<Utc>,
    ) -> AppResult<License> {
        let updated = sqlx::query_as::<_, License>(
            "UPDATE licenses SET status = $2, unbound_at = $3, updated_at = NOW() \
             WHERE id = $1 AND status = 'active' RETURNING *",
        )
        .bind(id)
        .bind(to)
        .bind(unbound_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("Failed to transition license", e))?;

        match updated {
            Some(license) => Ok(license),
            None => Err(self.transition_failure(id).await),
        }
    }
}

fn store_error(context: &str, err: sqlx::Error) -> AppError {
    AppError::with_source(ErrorKind::StoreUnavailable, context.to_string(), err)
}

fn insert_error(fingerprint: &str, err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::duplicate_active_machine(format!(
                "machine {fingerprint} already holds an active license"
            ))
        }
        _ => store_error("Failed to insert license", err),
    }
}

/// Bind and run the license INSERT on any executor.
async fn insert_license(
    tx: &mut Transaction<'_, Postgres>,
    license: &License,
) -> Result<License, sqlx::Error> {
    sqlx::query_as::<_, License>(
        "INSERT INTO licenses \
         (id, authorization_id, license_key, machine_fingerprint, hostname, unbind_public_key, \
          issued_at, expires_at, activated_at, unbound_at, status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING *",
    )
    .bind(license.id)
    .bind(license.authorization_id)
    .bind(&license.license_key)
    .bind(&license.machine_fingerprint)
    .bind(&license.hostname)
    .bind(&license.unbind_public_key)
    .bind(license.issued_at)
    .bind(license.expires_at)
    .bind(license.activated_at)
    .bind(license.unbound_at)
    .bind(license.status)
    .bind(license.created_at)
    .bind(license.updated_at)
    .fetch_one(&mut **tx)
    .await
}

#[async_trait]
impl LicenseStore for PgLicenseStore {
    async fn insert_active(&self, license: &License) -> AppResult<License> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("Failed to open transaction", e))?;

        let inserted = insert_license(&mut tx, license)
            .await
            .map_err(|e| insert_error(&license.machine_fingerprint, e))?;

        tx.commit()
            .await
            .map_err(|e| store_error("Failed to commit license insert", e))?;
        Ok(inserted)
    }

    async fn find_by_id(&self, id: LicenseId) -> AppResult<Option<License>> {
        sqlx::query_as::<_, License>("SELECT * FROM licenses WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("Failed to find license", e))
    }

    async fn find_active_by_fingerprint(&self, fingerprint: &str) -> AppResult<Option<License>> {
        sqlx::query_as::<_, License>(
            "SELECT * FROM licenses WHERE machine_fingerprint = $1 AND status = 'active'",
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("Failed to find active license by fingerprint", e))
    }

    async fn find_by_key_and_fingerprint(
        &self,
        license_key: &str,
        fingerprint: &str,
    ) -> AppResult<Option<License>> {
        sqlx::query_as::<_, License>(
            "SELECT * FROM licenses WHERE license_key = $1 AND machine_fingerprint = $2",
        )
        .bind(license_key)
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("Failed to find license by key", e))
    }

    async fn transition_to_released(
        &self,
        id: LicenseId,
        unbound_at: DateTime<Utc>,
    ) -> AppResult<License> {
        self.transition(id, LicenseStatus::Released, unbound_at).await
    }

    async fn transition_to_revoked(
        &self,
        id: LicenseId,
        unbound_at: DateTime<Utc>,
    ) -> AppResult<License> {
        self.transition(id, LicenseStatus::Revoked, unbound_at).await
    }

    async fn transfer(
        &self,
        old_id: LicenseId,
        unbound_at: DateTime<Utc>,
        new_license: &License,
    ) -> AppResult<License> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("Failed to open transaction", e))?;

        let released = sqlx::query_as::<_, License>(
            "UPDATE licenses SET status = 'released', unbound_at = $2, updated_at = NOW() \
             WHERE id = $1 AND status = 'active' RETURNING *",
        )
        .bind(old_id)
        .bind(unbound_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| store_error("Failed to release old license", e))?;

        if released.is_none() {
            tx.rollback()
                .await
                .map_err(|e| store_error("Failed to roll back transfer", e))?;
            return Err(self.transition_failure(old_id).await);
        }

        let inserted = match insert_license(&mut tx, new_license).await {
            Ok(license) => license,
            Err(e) => {
                let mapped = insert_error(&new_license.machine_fingerprint, e);
                tx.rollback()
                    .await
                    .map_err(|e| store_error("Failed to roll back transfer", e))?;
                return Err(mapped);
            }
        };

        tx.commit()
            .await
            .map_err(|e| store_error("Failed to commit transfer", e))?;
        Ok(inserted)
    }

    async fn delete(&self, id: LicenseId) -> AppResult<()> {
        sqlx::query("DELETE FROM licenses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("Failed to delete license", e))?;
        Ok(())
    }

    async fn list_by_authorization(&self, auth_id: AuthorizationId) -> AppResult<Vec<License>> {
        sqlx::query_as::<_, License>(
            "SELECT * FROM licenses WHERE authorization_id = $1 ORDER BY created_at DESC",
        )
        .bind(auth_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("Failed to list licenses", e))
    }

    async fn count_active_by_authorization(&self, auth_id: AuthorizationId) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM licenses WHERE authorization_id = $1 AND status = 'active'",
        )
        .bind(auth_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_error("Failed to count active licenses", e))?;
        Ok(count as u64)
    }

    async fn count_active(&self) -> AppResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM licenses WHERE status = 'active'")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| store_error("Failed to count active licenses", e))?;
        Ok(count as u64)
    }

    async fn count_activated_since(&self, since: DateTime<Utc>) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM licenses WHERE activated_at >= $1")
            .bind(since)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error("Failed to count new devices", e))?;
        Ok(count as u64)
    }

    async fn count_active_expiring_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM licenses WHERE status = 'active' AND expires_at < $1",
        )
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_error("Failed to count expiring licenses", e))?;
        Ok(count as u64)
    }
}
