//! Server keypair entities.

pub mod model;

pub use model::ServerKeypair;
