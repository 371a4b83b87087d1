//! Lifecycle event journal.
//!
//! The journal is called synchronously within each logical operation, but
//! an append failure is non-fatal: the business transaction has already
//! committed, so the failure is logged and swallowed rather than rolled
//! back.

use std::sync::Arc;

use tracing::warn;

use licensehub_core::result::AppResult;
use licensehub_core::types::{PageRequest, PageResponse};
use licensehub_database::EventStore;
use licensehub_entity::event::{EventKind, EventRecord, NewEvent};

/// How many records the dashboard's recent-activity pane shows.
pub const RECENT_EVENTS_LIMIT: u64 = 20;

/// Append-only journal of lifecycle events.
#[derive(Clone)]
pub struct EventJournal {
    store: Arc<dyn EventStore>,
}

impl EventJournal {
    /// Create a journal on the given store.
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Append a record. Failures are logged, never propagated.
    pub async fn record(&self, event: NewEvent) {
        if let Err(e) = self.store.append(&event).await {
            warn!(
                error = %e,
                kind = ?event.kind,
                target = %event.target_id,
                "Failed to append journal event"
            );
        }
    }

    /// The most recent records, newest-first.
    pub async fn recent(&self, limit: u64) -> AppResult<Vec<EventRecord>> {
        self.store.recent(limit).await
    }

    /// List records with an optional kind filter.
    pub async fn list(
        &self,
        page: &PageRequest,
        kind: Option<EventKind>,
    ) -> AppResult<PageResponse<EventRecord>> {
        self.store.list(page, kind).await
    }
}
