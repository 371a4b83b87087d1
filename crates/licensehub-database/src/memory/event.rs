//! In-memory event store using a Tokio mutex.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use licensehub_core::result::AppResult;
use licensehub_core::types::{EventId, PageRequest, PageResponse};
use licensehub_entity::event::{EventKind, EventRecord, NewEvent};

use crate::store::EventStore;

/// In-memory append-only event store.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventStore {
    state: Arc<Mutex<Vec<EventRecord>>>,
}

impl MemoryEventStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn append(&self, event: &NewEvent) -> AppResult<EventRecord> {
        let record = EventRecord {
            id: EventId::new(),
            kind: event.kind,
            actor: event.actor.to_string(),
            target_type: event.target_type.clone(),
            target_id: event.target_id.clone(),
            details: event.details.clone(),
            created_at: Utc::now(),
        };
        self.state.lock().await.push(record.clone());
        Ok(record)
    }

    async fn recent(&self, limit: u64) -> AppResult<Vec<EventRecord>> {
        let state = self.state.lock().await;
        Ok(state.iter().rev().take(limit as usize).cloned().collect())
    }

    async fn list(
        &self,
        page: &PageRequest,
        kind: Option<EventKind>,
    ) -> AppResult<PageResponse<EventRecord>> {
        let state = self.state.lock().await;
        let matching: Vec<EventRecord> = state
            .iter()
            .rev()
            .filter(|e| kind.map_or(true, |k| e.kind == k))
            .cloned()
            .collect();

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok(PageResponse::new(items, page.page, page.page_size, total))
    }
}
