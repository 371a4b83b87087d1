//! In-memory authorization store using a Tokio mutex.
//!
//! Suitable for single-node development and tests. The mutex-held
//! sections provide the same atomicity the PostgreSQL implementation
//! gets from row-level conditional updates.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use licensehub_core::error::AppError;
use licensehub_core::result::AppResult;
use licensehub_core::types::{AuthorizationId, PageRequest, PageResponse};
use licensehub_entity::authorization::{Authorization, AuthorizationStatus};

use crate::store::{AuthorizationStore, SeatTotals};

/// In-memory authorization store.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuthorizationStore {
    state: Arc<Mutex<HashMap<AuthorizationId, Authorization>>>,
}

impl MemoryAuthorizationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthorizationStore for MemoryAuthorizationStore {
    async fn insert(&self, auth: &Authorization) -> AppResult<Authorization> {
        let mut state = self.state.lock().await;
        if state
            .values()
            .any(|a| a.authorization_code == auth.authorization_code)
        {
            return Err(AppError::duplicate_code(format!(
                "authorization code {} already exists",
                auth.authorization_code
            )));
        }
        state.insert(auth.id, auth.clone());
        Ok(auth.clone())
    }

    async fn find_by_id(&self, id: AuthorizationId) -> AppResult<Option<Authorization>> {
        Ok(self.state.lock().await.get(&id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> AppResult<Option<Authorization>> {
        Ok(self
            .state
            .lock()
            .await
            .values()
            .find(|a| a.authorization_code == code)
            .cloned())
    }

    async fn update_fields(&self, auth: &Authorization) -> AppResult<Authorization> {
        let mut state = self.state.lock().await;
        let row = state
            .get_mut(&auth.id)
            .ok_or_else(|| AppError::invalid_auth_code(format!("authorization {} not found", auth.id)))?;
        row.customer_name = auth.customer_name.clone();
        row.max_seats = auth.max_seats;
        row.duration_years = auth.duration_years;
        row.latest_expiry_date = auth.latest_expiry_date;
        row.status = auth.status;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn acquire_seats(&self, id: AuthorizationId, count: i32) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let row = match state.get_mut(&id) {
            Some(row) => row,
            None => return Ok(false),
        };
        if row.used_seats + count > row.max_seats {
            return Ok(false);
        }
        row.used_seats += count;
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn release_seats(&self, id: AuthorizationId, count: i32) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(row) = state.get_mut(&id) {
            row.used_seats = (row.used_seats - count).max(0);
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list(
        &self,
        page: &PageRequest,
        search: Option<&str>,
        status: Option<AuthorizationStatus>,
    ) -> AppResult<PageResponse<Authorization>> {
        let state = self.state.lock().await;
        let needle = search.map(str::to_lowercase);
        let mut matching: Vec<Authorization> = state
            .values()
            .filter(|a| {
                needle.as_deref().map_or(true, |term| {
                    a.customer_name.to_lowercase().contains(term)
                        || a.authorization_code.to_lowercase().contains(term)
                }) && status.map_or(true, |st| a.status == st)
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok(PageResponse::new(items, page.page, page.page_size, total))
    }

    async fn count(&self, status: Option<AuthorizationStatus>) -> AppResult<u64> {
        let state = self.state.lock().await;
        Ok(state
            .values()
            .filter(|a| status.map_or(true, |st| a.status == st))
            .count() as u64)
    }

    async fn seat_totals(&self) -> AppResult<SeatTotals> {
        let state = self.state.lock().await;
        let mut totals = SeatTotals::default();
        for auth in state.values().filter(|a| a.is_enabled()) {
            totals.total_seats += i64::from(auth.max_seats);
            totals.used_seats += i64::from(auth.used_seats);
        }
        Ok(totals)
    }

    async fn count_created_since(&self, since: DateTime<Utc>) -> AppResult<u64> {
        let state = self.state.lock().await;
        Ok(state.values().filter(|a| a.created_at >= since).count() as u64)
    }

    async fn count_distinct_customers(&self) -> AppResult<u64> {
        let state = self.state.lock().await;
        let customers: HashSet<&str> = state
            .values()
            .filter(|a| a.is_enabled())
            .map(|a| a.customer_name.as_str())
            .collect();
        Ok(customers.len() as u64)
    }
}
