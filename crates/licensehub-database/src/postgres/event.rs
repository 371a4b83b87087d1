//! PostgreSQL event store.

use async_trait::async_trait;
use sqlx::PgPool;

use licensehub_core::error::{AppError, ErrorKind};
use licensehub_core::result::AppResult;
use licensehub_core::types::{EventId, PageRequest, PageResponse};
use licensehub_entity::event::{EventKind, EventRecord, NewEvent};

use crate::store::EventStore;

/// Event store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Create a new store on the shared pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn store_error(context: &str, err: sqlx::Error) -> AppError {
    AppError::with_source(ErrorKind::StoreUnavailable, context.to_string(), err)
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn append(&self, event: &NewEvent) -> AppResult<EventRecord> {
        sqlx::query_as::<_, EventRecord>(
            "INSERT INTO events (id, kind, actor, target_type, target_id, details, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW()) RETURNING *",
        )
        .bind(EventId::new())
        .bind(event.kind)
        .bind(event.actor.to_string())
        .bind(&event.target_type)
        .bind(&event.target_id)
        .bind(&event.details)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_error("Failed to append event", e))
    }

    async fn recent(&self, limit: u64) -> AppResult<Vec<EventRecord>> {
        sqlx::query_as::<_, EventRecord>(
            "SELECT * FROM events ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("Failed to fetch recent events", e))
    }

    async fn list(
        &self,
        page: &PageRequest,
        kind: Option<EventKind>,
    ) -> AppResult<PageResponse<EventRecord>> {
        let (total, items): (i64, Vec<EventRecord>) = match kind {
            Some(k) => {
                let total = sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE kind = $1")
                    .bind(k)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| store_error("Failed to count events", e))?;
                let items = sqlx::query_as::<_, EventRecord>(
                    "SELECT * FROM events WHERE kind = $1 ORDER BY created_at DESC \
                     LIMIT $2 OFFSET $3",
                )
                .bind(k)
                .bind(page.limit() as i64)
                .bind(page.offset() as i64)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| store_error("Failed to list events", e))?;
                (total, items)
            }
            None => {
                let total = sqlx::query_scalar("SELECT COUNT(*) FROM events")
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| store_error("Failed to count events", e))?;
                let items = sqlx::query_as::<_, EventRecord>(
                    "SELECT * FROM events ORDER BY created_at DESC LIMIT $1 OFFSET $2",
                )
                .bind(page.limit() as i64)
                .bind(page.offset() as i64)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| store_error("Failed to list events", e))?;
                (total, items)
            }
        };

        Ok(PageResponse::new(
            items,
            page.page,
            page.page_size,
            total as u64,
        ))
    }
}
