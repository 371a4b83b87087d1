//! PostgreSQL store implementations and pool bootstrap.

pub mod authorization;
pub mod event;
pub mod keypair;
pub mod license;
pub mod pool;

pub use authorization::PgAuthorizationStore;
pub use event::PgEventStore;
pub use keypair::PgKeypairStore;
pub use license::PgLicenseStore;
pub use pool::{PgDatabase, PgStores};
