//! Errors from the cryptographic layer.
//!
//! Each envelope failure mode is a distinct variant; callers decide which
//! application error kind applies (inbound unwrap failures are malformed
//! input, outbound wrap failures are internal).

use thiserror::Error;

/// Errors produced by envelope, key, and codec operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The envelope was not valid standard base64.
    #[error("envelope is not valid base64: {0}")]
    MalformedBase64(#[from] base64::DecodeError),

    /// The envelope length header or body was shorter than declared.
    #[error("envelope truncated: {0}")]
    TruncatedEnvelope(&'static str),

    /// The RSA-wrapped symmetric key did not decrypt.
    #[error("failed to unwrap symmetric key")]
    KeyUnwrap(#[source] rsa::Error),

    /// The unwrapped symmetric key had the wrong length.
    #[error("unwrapped symmetric key has invalid length {0}")]
    InvalidKeyLength(usize),

    /// The AES-GCM payload failed authentication.
    #[error("payload authentication failed")]
    PayloadOpen,

    /// The AES-GCM payload could not be sealed.
    #[error("payload encryption failed")]
    PayloadSeal,

    /// RSA encryption of the symmetric key failed.
    #[error("failed to wrap symmetric key")]
    KeyWrap(#[source] rsa::Error),

    /// RSA keypair generation failed.
    #[error("keypair generation failed")]
    KeyGeneration(#[source] rsa::Error),

    /// A PEM key could not be encoded or decoded.
    #[error("invalid PEM key material: {0}")]
    InvalidPem(String),

    /// A signature could not be produced.
    #[error("signing failed")]
    Signing(#[source] rsa::Error),

    /// A signature failed verification.
    #[error("signature verification failed")]
    BadSignature(#[source] rsa::Error),

    /// A signature was not valid standard base64.
    #[error("signature is not valid base64")]
    MalformedSignature(#[source] base64::DecodeError),

    /// Artifact JSON could not be encoded or decoded.
    #[error("artifact encoding error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// A specialized `Result` for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
