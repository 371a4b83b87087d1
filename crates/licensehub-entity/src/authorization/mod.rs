//! Authorization domain entities.

pub mod model;

pub use model::{Authorization, AuthorizationStatus, AuthorizationUpdate, NewAuthorization};
