//! # licensehub-core
//!
//! Core crate for LicenseHub. Contains configuration schemas, typed
//! identifiers, the machine-fingerprint value type, pagination types,
//! and the unified error system.
//!
//! This crate has **no** internal dependencies on other LicenseHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::{AppError, ErrorClass, ErrorKind};
pub use result::AppResult;
