//! PostgreSQL keypair store.

use async_trait::async_trait;
use sqlx::PgPool;

use licensehub_core::error::{AppError, ErrorKind};
use licensehub_core::result::AppResult;
use licensehub_core::types::KeypairId;
use licensehub_entity::keypair::ServerKeypair;

use crate::store::KeypairStore;

/// Keypair store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgKeypairStore {
    pool: PgPool,
}

impl PgKeypairStore {
    /// Create a new store on the shared pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn store_error(context: &str, err: sqlx::Error) -> AppError {
    AppError::with_source(ErrorKind::StoreUnavailable, context.to_string(), err)
}

#[async_trait]
impl KeypairStore for PgKeypairStore {
    async fn find_active(&self) -> AppResult<Option<ServerKeypair>> {
        sqlx::query_as::<_, ServerKeypair>("SELECT * FROM keypairs WHERE is_active = TRUE")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("Failed to find active keypair", e))
    }

    async fn activate_new(
        &self,
        private_key_pem: &str,
        public_key_pem: &str,
    ) -> AppResult<ServerKeypair> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("Failed to open transaction", e))?;

        sqlx::query("UPDATE keypairs SET is_active = FALSE WHERE is_active = TRUE")
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("Failed to deactivate prior keypair", e))?;

        let inserted = sqlx::query_as::<_, ServerKeypair>(
            "INSERT INTO keypairs (id, private_key_pem, public_key_pem, is_active, created_at) \
             VALUES ($1, $2, $3, TRUE, NOW()) RETURNING *",
        )
        .bind(KeypairId::new())
        .bind(private_key_pem)
        .bind(public_key_pem)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| store_error("Failed to insert keypair", e))?;

        tx.commit()
            .await
            .map_err(|e| store_error("Failed to commit keypair activation", e))?;
        Ok(inserted)
    }

    async fn list(&self) -> AppResult<Vec<ServerKeypair>> {
        sqlx::query_as::<_, ServerKeypair>("SELECT * FROM keypairs ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("Failed to list keypairs", e))
    }
}
