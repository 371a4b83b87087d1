//! Machine fingerprint value type.
//!
//! Devices identify themselves with a hardware-derived hex digest: either a
//! 32-character MD5 form or a 64-character SHA-256 form. The core treats the
//! value as opaque beyond this shape check.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A validated, lowercase machine fingerprint (32 or 64 hex characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MachineFingerprint(String);

impl MachineFingerprint {
    /// Validate and normalize a raw fingerprint string.
    ///
    /// Accepts 32-hex (MD5) and 64-hex (SHA-256) forms, case-insensitive;
    /// the stored value is lowercased. Any other shape is rejected.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let normalized = raw.to_ascii_lowercase();
        let valid =
            matches!(normalized.len(), 32 | 64) && normalized.bytes().all(|b| b.is_ascii_hexdigit());
        if !valid {
            return Err(AppError::bad_binding_request(format!(
                "invalid machine fingerprint: expected 32 or 64 hex characters, got {} characters",
                raw.len()
            )));
        }
        Ok(Self(normalized))
    }

    /// Return the fingerprint as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the fingerprint, returning the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for MachineFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for MachineFingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_md5_form() {
        let fp = MachineFingerprint::parse("a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4").unwrap();
        assert_eq!(fp.as_str().len(), 32);
    }

    #[test]
    fn accepts_sha256_form_and_lowercases() {
        let raw = "A1B2C3D4E5F6A1B2C3D4E5F6A1B2C3D4A1B2C3D4E5F6A1B2C3D4E5F6A1B2C3D4";
        let fp = MachineFingerprint::parse(raw).unwrap();
        assert_eq!(fp.as_str(), raw.to_ascii_lowercase());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(MachineFingerprint::parse("abc123").is_err());
        assert!(MachineFingerprint::parse("").is_err());
        assert!(MachineFingerprint::parse(&"a".repeat(48)).is_err());
    }

    #[test]
    fn rejects_non_hex_characters() {
        assert!(MachineFingerprint::parse(&"g".repeat(32)).is_err());
        assert!(MachineFingerprint::parse(&"z".repeat(64)).is_err());
    }
}
