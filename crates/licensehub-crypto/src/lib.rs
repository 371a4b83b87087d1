//! # licensehub-crypto
//!
//! Cryptographic primitives for LicenseHub: RSA keypair management with
//! PEM serialization, RSASSA-PKCS1-v1_5/SHA-256 signatures, the hybrid
//! encryption envelope (RSA-OAEP key wrap + AES-256-GCM payload), and the
//! canonical artifact codec.
//!
//! Nothing in this crate suspends; CPU-heavy operations (key generation)
//! are expected to run on a blocking thread when called from async code.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod keys;

pub use error::{CryptoError, CryptoResult};
pub use keys::{RsaKeyPair, RSA_KEY_BITS};
