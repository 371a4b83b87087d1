//! # licensehub-service
//!
//! Business services for LicenseHub: the server keystore, the
//! authorization ledger, the license lifecycle engine (activate,
//! transfer, revoke), the event journal, and dashboard statistics.
//!
//! Services are transport-agnostic; an embedding binary wires them onto
//! store implementations from `licensehub-database` and exposes whatever
//! RPC surface it needs.

pub mod authorization;
pub mod journal;
pub mod keystore;
pub mod license;
pub mod stats;

pub use authorization::AuthorizationLedger;
pub use journal::EventJournal;
pub use keystore::KeyStore;
pub use license::LifecycleEngine;
pub use stats::{DashboardStats, StatsService};
