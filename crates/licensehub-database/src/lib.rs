//! # licensehub-database
//!
//! Store traits for the LicenseHub tables plus two implementations:
//! PostgreSQL (production) and in-memory (single-node development and
//! tests). The PostgreSQL side also owns pool bootstrap and embedded
//! schema migrations.

pub mod memory;
pub mod postgres;
pub mod store;

pub use postgres::{PgDatabase, PgStores};
pub use store::{AuthorizationStore, EventStore, KeypairStore, LicenseStore, SeatTotals};
