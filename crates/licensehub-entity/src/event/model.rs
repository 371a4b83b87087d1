//! Lifecycle event journal entities.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use licensehub_core::types::EventId;

/// The kinds of lifecycle events the journal records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum EventKind {
    /// An authorization was created.
    AuthorizationCreated,
    /// An authorization's fields were modified.
    AuthorizationUpdated,
    /// Seats were consumed by an activation batch.
    SeatsAcquired,
    /// Seats were returned to an authorization.
    SeatsReleased,
    /// A license artifact was issued to a device.
    LicenseIssued,
    /// A license was released by its holder.
    LicenseReleased,
    /// A license was revoked by an administrator.
    LicenseRevoked,
    /// A license moved from one machine to another.
    LicenseTransferred,
    /// The server keypair was rotated.
    KeypairRotated,
}

/// Who caused a journal event.
///
/// Events keep only a weak back-reference to the acting administrator;
/// resolving it to an admin record is a query, not an ownership edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// An administrator, by id.
    Admin(Uuid),
    /// A customer, identified by authorization code.
    Customer(String),
    /// The system itself (first-use key generation, reconciliation).
    System,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin(id) => write!(f, "admin:{id}"),
            Self::Customer(code) => write!(f, "customer:{code}"),
            Self::System => write!(f, "system"),
        }
    }
}

/// An immutable, append-only journal record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EventRecord {
    /// Unique event identifier.
    pub id: EventId,
    /// What happened.
    pub kind: EventKind,
    /// Who caused it (`admin:<uuid>`, `customer:<code>`, or `system`).
    pub actor: String,
    /// The type of target (`authorization`, `license`, `keypair`).
    pub target_type: String,
    /// The target identifier.
    pub target_id: String,
    /// Structured event details (JSON).
    pub details: serde_json::Value,
    /// When the event occurred.
    pub created_at: DateTime<Utc>,
}

/// Data required to append a journal record.
#[derive(Debug, Clone)]
pub struct NewEvent {
    /// What happened.
    pub kind: EventKind,
    /// Who caused it.
    pub actor: Actor,
    /// Target resource type.
    pub target_type: String,
    /// Target resource identifier.
    pub target_id: String,
    /// Structured details.
    pub details: serde_json::Value,
}

impl NewEvent {
    /// Create an event targeting an authorization.
    pub fn on_authorization(
        kind: EventKind,
        actor: Actor,
        authorization_id: impl fmt::Display,
        details: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            actor,
            target_type: "authorization".to_string(),
            target_id: authorization_id.to_string(),
            details,
        }
    }

    /// Create an event targeting a license.
    pub fn on_license(
        kind: EventKind,
        actor: Actor,
        license_id: impl fmt::Display,
        details: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            actor,
            target_type: "license".to_string(),
            target_id: license_id.to_string(),
            details,
        }
    }

    /// Create an event targeting a server keypair.
    pub fn on_keypair(
        kind: EventKind,
        actor: Actor,
        keypair_id: impl fmt::Display,
        details: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            actor,
            target_type: "keypair".to_string(),
            target_id: keypair_id.to_string(),
            details,
        }
    }
}
