//! PostgreSQL authorization store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use licensehub_core::error::{AppError, ErrorKind};
use licensehub_core::result::AppResult;
use licensehub_core::types::{AuthorizationId, PageRequest, PageResponse};
use licensehub_entity::authorization::{Authorization, AuthorizationStatus};

use crate::store::{AuthorizationStore, SeatTotals};

/// Authorization store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgAuthorizationStore {
    pool: PgPool,
}

impl PgAuthorizationStore {
    /// Create a new store on the shared pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn store_error(context: &str, err: sqlx::Error) -> AppError {
    AppError::with_source(ErrorKind::StoreUnavailable, context.to_string(), err)
}

#[async_trait]
impl AuthorizationStore for PgAuthorizationStore {
    async fn insert(&self, auth: &Authorization) -> AppResult<Authorization> {
        sqlx::query_as::<_, Authorization>(
            "INSERT INTO authorizations \
             (id, customer_name, authorization_code, max_seats, used_seats, duration_years, \
              latest_expiry_date, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
        )
        .bind(auth.id)
        .bind(&auth.customer_name)
        .bind(&auth.authorization_code)
        .bind(auth.max_seats)
        .bind(auth.used_seats)
        .bind(auth.duration_years)
        .bind(auth.latest_expiry_date)
        .bind(auth.status)
        .bind(auth.created_at)
        .bind(auth.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::duplicate_code(
                format!("authorization code {} already exists", auth.authorization_code),
            ),
            _ => store_error("Failed to insert authorization", e),
        })
    }

    async fn find_by_id(&self, id: AuthorizationId) -> AppResult<Option<Authorization>> {
        sqlx::query_as::<_, Authorization>("SELECT * FROM authorizations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("Failed to find authorization", e))
    }

    async fn find_by_code(&self, code: &str) -> AppResult<Option<Authorization>> {
        sqlx::query_as::<_, Authorization>(
            "SELECT * FROM authorizations WHERE authorization_code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("Failed to find authorization by code", e))
    }

    async fn update_fields(&self, auth: &Authorization) -> AppResult<Authorization> {
        sqlx::query_as::<_, Authorization>(
            "UPDATE authorizations SET customer_name = $2, max_seats = $3, duration_years = $4, \
             latest_expiry_date = $5, status = $6, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(auth.id)
        .bind(&auth.customer_name)
        .bind(auth.max_seats)
        .bind(auth.duration_years)
        .bind(auth.latest_expiry_date)
        .bind(auth.status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_error("Failed to update authorization", e))
    }

    async fn acquire_seats(&self, id: AuthorizationId, count: i32) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE authorizations SET used_seats = used_seats + $2, updated_at = NOW() \
             WHERE id = $1 AND used_seats + $2 <= max_seats",
        )
        .bind(id)
        .bind(count)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("Failed to acquire seats", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_seats(&self, id: AuthorizationId, count: i32) -> AppResult<()> {
        sqlx::query(
            "UPDATE authorizations SET \
             used_seats = CASE WHEN used_seats - $2 < 0 THEN 0 ELSE used_seats - $2 END, \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(count)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("Failed to release seats", e))?;
        Ok(())
    }

    async fn list(
        &self,
        page: &PageRequest,
        search: Option<&str>,
        status: Option<AuthorizationStatus>,
    ) -> AppResult<PageResponse<Authorization>> {
        let mut conditions = Vec::new();
        let mut param_idx = 1u32;

        if search.is_some() {
            conditions.push(format!(
                "(customer_name ILIKE ${param_idx} OR authorization_code ILIKE ${param_idx})"
            ));
            param_idx += 1;
        }
        if status.is_some() {
            conditions.push(format!("status = ${param_idx}"));
            param_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM authorizations {where_clause}");
        let select_sql = format!(
            "SELECT * FROM authorizations {where_clause} ORDER BY created_at DESC \
             LIMIT ${param_idx} OFFSET ${}",
            param_idx + 1
        );

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        let mut select_query = sqlx::query_as::<_, Authorization>(&select_sql);

        if let Some(term) = search {
            let pattern = format!("%{term}%");
            count_query = count_query.bind(pattern.clone());
            select_query = select_query.bind(pattern);
        }
        if let Some(st) = status {
            count_query = count_query.bind(st);
            select_query = select_query.bind(st);
        }

        let total = count_query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error("Failed to count authorizations", e))?;

        let items = select_query
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("Failed to list authorizations", e))?;

        Ok(PageResponse::new(
            items,
            page.page,
            page.page_size,
            total as u64,
        ))
    }

    async fn count(&self, status: Option<AuthorizationStatus>) -> AppResult<u64> {
        let count: i64 = match status {
            Some(st) => sqlx::query_scalar("SELECT COUNT(*) FROM authorizations WHERE status = $1")
                .bind(st)
                .fetch_one(&self.pool)
                .await,
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM authorizations")
                    .fetch_one(&self.pool)
                    .await
            }
        }
        .map_err(|e| store_error("Failed to count authorizations", e))?;
        Ok(count as u64)
    }

    async fn seat_totals(&self) -> AppResult<SeatTotals> {
        let (total_seats, used_seats): (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(max_seats), 0), COALESCE(SUM(used_seats), 0) \
             FROM authorizations WHERE status = 'enabled'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_error("Failed to sum seat counters", e))?;
        Ok(SeatTotals {
            total_seats,
            used_seats,
        })
    }

    async fn count_created_since(&self, since: DateTime<Utc>) -> AppResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM authorizations WHERE created_at >= $1")
                .bind(since)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| store_error("Failed to count new authorizations", e))?;
        Ok(count as u64)
    }

    async fn count_distinct_customers(&self) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT customer_name) FROM authorizations WHERE status = 'enabled'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_error("Failed to count customers", e))?;
        Ok(count as u64)
    }
}
