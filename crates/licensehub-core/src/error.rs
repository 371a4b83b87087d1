//! Unified application error types for LicenseHub.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator. Every error carries the narrowest
//! applicable [`ErrorKind`]; kinds are never coalesced on the way up.

use std::fmt;

use thiserror::Error;

/// Client-visible error classes, grouped by who can fix the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorClass {
    /// The caller sent something malformed and must fix the input.
    InputMalformed,
    /// The authorization is missing, disabled, or owned by someone else.
    AuthorizationState,
    /// A resource precondition failed; retry with different inputs.
    ResourceState,
    /// A signature or proof did not verify; the caller cannot fix this.
    Trust,
    /// Server-side failure; retryable by the transport layer.
    Internal,
}

/// Fine-grained error kinds used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// An envelope could not be decoded or decrypted.
    BadEnvelope,
    /// A binding request failed validation (fingerprint, hostname, freshness).
    BadBindingRequest,
    /// An unbind proof artifact could not be parsed.
    BadUnbindProof,
    /// The authorization code does not exist.
    InvalidAuthCode,
    /// The authorization exists but is disabled.
    AuthorizationDisabled,
    /// The referenced license belongs to a different authorization.
    AuthorizationMismatch,
    /// An authorization code collided with an existing one.
    DuplicateCode,
    /// Not enough free seats on the authorization.
    InsufficientSeats,
    /// An active license already exists for the machine fingerprint.
    DuplicateActiveMachine,
    /// The referenced license does not exist.
    LicenseNotFound,
    /// The license exists but is not in the active state.
    LicenseNotActive,
    /// A server signature failed verification.
    InvalidSignature,
    /// The unbind proof signature failed verification.
    InvalidUnbindProof,
    /// The backing store failed or timed out.
    StoreUnavailable,
    /// The server keypair could not be loaded or generated.
    KeyStoreUnavailable,
    /// A cryptographic operation failed internally.
    CryptoFailure,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// Administrative input failed validation.
    Validation,
}

impl ErrorKind {
    /// The client-visible class this kind belongs to.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::BadEnvelope
            | Self::BadBindingRequest
            | Self::BadUnbindProof
            | Self::Validation => ErrorClass::InputMalformed,
            Self::InvalidAuthCode | Self::AuthorizationDisabled | Self::AuthorizationMismatch => {
                ErrorClass::AuthorizationState
            }
            Self::DuplicateCode
            | Self::InsufficientSeats
            | Self::DuplicateActiveMachine
            | Self::LicenseNotFound
            | Self::LicenseNotActive => ErrorClass::ResourceState,
            Self::InvalidSignature | Self::InvalidUnbindProof => ErrorClass::Trust,
            Self::StoreUnavailable
            | Self::KeyStoreUnavailable
            | Self::CryptoFailure
            | Self::Configuration
            | Self::Serialization => ErrorClass::Internal,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadEnvelope => write!(f, "BAD_ENVELOPE"),
            Self::BadBindingRequest => write!(f, "BAD_BINDING_REQUEST"),
            Self::BadUnbindProof => write!(f, "BAD_UNBIND_PROOF"),
            Self::InvalidAuthCode => write!(f, "INVALID_AUTH_CODE"),
            Self::AuthorizationDisabled => write!(f, "AUTHORIZATION_DISABLED"),
            Self::AuthorizationMismatch => write!(f, "AUTHORIZATION_MISMATCH"),
            Self::DuplicateCode => write!(f, "DUPLICATE_CODE"),
            Self::InsufficientSeats => write!(f, "INSUFFICIENT_SEATS"),
            Self::DuplicateActiveMachine => write!(f, "DUPLICATE_ACTIVE_MACHINE"),
            Self::LicenseNotFound => write!(f, "LICENSE_NOT_FOUND"),
            Self::LicenseNotActive => write!(f, "LICENSE_NOT_ACTIVE"),
            Self::InvalidSignature => write!(f, "INVALID_SIGNATURE"),
            Self::InvalidUnbindProof => write!(f, "INVALID_UNBIND_PROOF"),
            Self::StoreUnavailable => write!(f, "STORE_UNAVAILABLE"),
            Self::KeyStoreUnavailable => write!(f, "KEY_STORE_UNAVAILABLE"),
            Self::CryptoFailure => write!(f, "CRYPTO_FAILURE"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Validation => write!(f, "VALIDATION"),
        }
    }
}

/// The unified application error used throughout LicenseHub.
///
/// All crate-specific errors are mapped into `AppError` using `From` impls
/// or explicit `.map_err()` calls. This provides a single error type for
/// the entire application boundary.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether the transport layer may retry the request as-is.
    ///
    /// Only internal errors are retryable; everything else is terminal
    /// for the request.
    pub fn is_retryable(&self) -> bool {
        self.kind.class() == ErrorClass::Internal
    }

    /// Create a bad-envelope error.
    pub fn bad_envelope(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadEnvelope, message)
    }

    /// Create a bad-binding-request error.
    pub fn bad_binding_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadBindingRequest, message)
    }

    /// Create a bad-unbind-proof error.
    pub fn bad_unbind_proof(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadUnbindProof, message)
    }

    /// Create an invalid-auth-code error.
    pub fn invalid_auth_code(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidAuthCode, message)
    }

    /// Create an authorization-disabled error.
    pub fn authorization_disabled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthorizationDisabled, message)
    }

    /// Create an authorization-mismatch error.
    pub fn authorization_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthorizationMismatch, message)
    }

    /// Create a duplicate-code error.
    pub fn duplicate_code(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateCode, message)
    }

    /// Create an insufficient-seats error.
    pub fn insufficient_seats(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InsufficientSeats, message)
    }

    /// Create a duplicate-active-machine error.
    pub fn duplicate_active_machine(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateActiveMachine, message)
    }

    /// Create a license-not-found error.
    pub fn license_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LicenseNotFound, message)
    }

    /// Create a license-not-active error.
    pub fn license_not_active(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LicenseNotActive, message)
    }

    /// Create an invalid-signature error.
    pub fn invalid_signature(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidSignature, message)
    }

    /// Create an invalid-unbind-proof error.
    pub fn invalid_unbind_proof(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidUnbindProof, message)
    }

    /// Create a store-unavailable error.
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StoreUnavailable, message)
    }

    /// Create a keystore-unavailable error.
    pub fn keystore_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::KeyStoreUnavailable, message)
    }

    /// Create a crypto-failure error.
    pub fn crypto_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CryptoFailure, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_expected_classes() {
        assert_eq!(ErrorKind::BadEnvelope.class(), ErrorClass::InputMalformed);
        assert_eq!(
            ErrorKind::AuthorizationDisabled.class(),
            ErrorClass::AuthorizationState
        );
        assert_eq!(
            ErrorKind::DuplicateActiveMachine.class(),
            ErrorClass::ResourceState
        );
        assert_eq!(ErrorKind::InvalidUnbindProof.class(), ErrorClass::Trust);
        assert_eq!(ErrorKind::StoreUnavailable.class(), ErrorClass::Internal);
    }

    #[test]
    fn only_internal_errors_are_retryable() {
        assert!(AppError::store_unavailable("timeout").is_retryable());
        assert!(AppError::keystore_unavailable("no key").is_retryable());
        assert!(!AppError::insufficient_seats("full").is_retryable());
        assert!(!AppError::invalid_unbind_proof("bad sig").is_retryable());
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = AppError::duplicate_active_machine("machine already active");
        assert_eq!(
            err.to_string(),
            "DUPLICATE_ACTIVE_MACHINE: machine already active"
        );
    }
}
