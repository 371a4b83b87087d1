//! Lifecycle event journal entities.

pub mod model;

pub use model::{Actor, EventKind, EventRecord, NewEvent};
