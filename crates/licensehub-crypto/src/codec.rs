//! Canonical artifact codec.
//!
//! The canonical encoding of an artifact is the serde_json encoding of its
//! struct, keys in declaration order, timestamps RFC 3339 UTC. Signatures
//! cover those exact bytes, so the verify path always re-canonicalizes
//! (parse, then re-encode) rather than trusting incoming byte layout.
//!
//! The unbind proof signs a different shape: the literal colon-delimited
//! string `license_key:machine_fingerprint:unbind_time:hostname` with no
//! JSON and no quoting.

use chrono::{DateTime, SecondsFormat, Utc};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::de::DeserializeOwned;
use serde::Serialize;

use licensehub_entity::artifact::{IssuedLicense, LicenseData, UnbindProof};

use crate::envelope;
use crate::error::CryptoResult;
use crate::keys;

/// Canonical RFC 3339 rendering used in signables.
pub fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Encode an artifact in canonical form.
pub fn canonical_json<T: Serialize>(artifact: &T) -> CryptoResult<Vec<u8>> {
    Ok(serde_json::to_vec(artifact)?)
}

/// Parse an artifact from its JSON bytes.
pub fn parse_artifact<T: DeserializeOwned>(bytes: &[u8]) -> CryptoResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Sign license data over its canonical encoding.
pub fn sign_license_data(private: &RsaPrivateKey, data: &LicenseData) -> CryptoResult<String> {
    keys::sign(private, &canonical_json(data)?)
}

/// Verify an issued license against the server public key.
///
/// The payload is re-canonicalized before verification so that any
/// re-encoding a transport applied does not change the outcome.
pub fn verify_license_data(public: &RsaPublicKey, artifact: &IssuedLicense) -> CryptoResult<()> {
    keys::verify(
        public,
        &canonical_json(&artifact.license_data)?,
        &artifact.signature,
    )
}

/// Build the colon-delimited unbind signable.
pub fn unbind_signable(
    license_key: &str,
    machine_fingerprint: &str,
    unbind_time: DateTime<Utc>,
    hostname: &str,
) -> String {
    format!(
        "{license_key}:{machine_fingerprint}:{}:{hostname}",
        rfc3339(unbind_time)
    )
}

/// Sign an unbind proof with the license's ephemeral private key.
///
/// This is the device-side operation; the server only verifies.
pub fn sign_unbind_proof(
    unbind_private: &RsaPrivateKey,
    license_key: &str,
    machine_fingerprint: &str,
    unbind_time: DateTime<Utc>,
    hostname: &str,
) -> CryptoResult<String> {
    let signable = unbind_signable(license_key, machine_fingerprint, unbind_time, hostname);
    keys::sign(unbind_private, signable.as_bytes())
}

/// Verify an unbind proof against the stored ephemeral public key.
pub fn verify_unbind_proof(unbind_public_pem: &str, proof: &UnbindProof) -> CryptoResult<()> {
    let public = keys::public_key_from_pem(unbind_public_pem)?;
    let signable = unbind_signable(
        &proof.license_key,
        &proof.machine_fingerprint,
        proof.unbind_metadata.unbind_time,
        &proof.unbind_metadata.hostname,
    );
    keys::verify(&public, signable.as_bytes(), &proof.unbind_proof)
}

/// Canonically encode an artifact and wrap it with a random AES key.
pub fn seal_artifact<T: Serialize>(public: &RsaPublicKey, artifact: &T) -> CryptoResult<String> {
    envelope::wrap(public, &canonical_json(artifact)?)
}

/// Canonically encode an artifact and wrap it with a caller-supplied key.
pub fn seal_artifact_with_key<T: Serialize>(
    public: &RsaPublicKey,
    artifact: &T,
    aes_key: &[u8; 32],
) -> CryptoResult<String> {
    envelope::wrap_with_key(public, &canonical_json(artifact)?, aes_key)
}

/// Unwrap an envelope with the server private key and parse the artifact.
pub fn open_artifact<T: DeserializeOwned>(
    private: &RsaPrivateKey,
    envelope_b64: &str,
) -> CryptoResult<T> {
    parse_artifact(&envelope::unwrap(private, envelope_b64)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::RsaKeyPair;
    use chrono::TimeZone;
    use licensehub_entity::artifact::{BindingRequest, LICENSE_TYPE_FULL};

    const TEST_KEY_BITS: usize = 1024;

    fn sample_license_data(unbind_private_key: String) -> LicenseData {
        LicenseData {
            license_key: "ab".repeat(32),
            machine_fingerprint: "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4".into(),
            hostname: "WS-01".into(),
            issued_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            expires_at: Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap(),
            license_type: LICENSE_TYPE_FULL.into(),
            unbind_private_key,
        }
    }

    #[test]
    fn canonical_encoding_preserves_field_order() {
        let data = sample_license_data("pem".into());
        let json = String::from_utf8(canonical_json(&data).unwrap()).unwrap();
        let license_key_pos = json.find("license_key").unwrap();
        let fingerprint_pos = json.find("machine_fingerprint").unwrap();
        let issued_pos = json.find("issued_at").unwrap();
        let unbind_pos = json.find("unbind_private_key").unwrap();
        assert!(license_key_pos < fingerprint_pos);
        assert!(fingerprint_pos < issued_pos);
        assert!(issued_pos < unbind_pos);
    }

    #[test]
    fn canonical_roundtrip_is_identity() {
        let data = sample_license_data("pem".into());
        let bytes = canonical_json(&data).unwrap();
        let parsed: LicenseData = parse_artifact(&bytes).unwrap();
        assert_eq!(parsed, data);
        assert_eq!(canonical_json(&parsed).unwrap(), bytes);
    }

    #[test]
    fn signed_license_verifies_after_reencoding() {
        let server = RsaKeyPair::generate(TEST_KEY_BITS).unwrap();
        let data = sample_license_data("pem".into());
        let signature = sign_license_data(server.private_key(), &data).unwrap();
        let artifact = IssuedLicense {
            license_data: data,
            signature,
        };

        // Simulate a transport re-encoding the artifact.
        let rewritten: IssuedLicense =
            serde_json::from_slice(&serde_json::to_vec(&artifact).unwrap()).unwrap();
        verify_license_data(server.public_key(), &rewritten).unwrap();
    }

    #[test]
    fn tampered_license_fails_verification() {
        let server = RsaKeyPair::generate(TEST_KEY_BITS).unwrap();
        let data = sample_license_data("pem".into());
        let signature = sign_license_data(server.private_key(), &data).unwrap();
        let mut artifact = IssuedLicense {
            license_data: data,
            signature,
        };
        artifact.license_data.hostname = "EVIL-01".into();
        assert!(verify_license_data(server.public_key(), &artifact).is_err());
    }

    #[test]
    fn unbind_signable_is_colon_delimited_rfc3339() {
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap();
        let signable = unbind_signable("key", "fp", ts, "WS-01");
        assert_eq!(signable, "key:fp:2025-06-01T08:30:00Z:WS-01");
    }

    #[test]
    fn unbind_proof_roundtrip() {
        use licensehub_entity::artifact::UnbindMetadata;

        let ephemeral = RsaKeyPair::generate(TEST_KEY_BITS).unwrap();
        let ts = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
        let proof_sig =
            sign_unbind_proof(ephemeral.private_key(), "key", "fp", ts, "WS-01").unwrap();

        let proof = UnbindProof {
            license_key: "key".into(),
            machine_fingerprint: "fp".into(),
            unbind_metadata: UnbindMetadata {
                unbind_time: ts,
                hostname: "WS-01".into(),
                client_version: "1.4.2".into(),
                unbind_reason: "hardware upgrade".into(),
            },
            unbind_proof: proof_sig,
        };

        verify_unbind_proof(&ephemeral.public_key_pem().unwrap(), &proof).unwrap();

        let forged = RsaKeyPair::generate(TEST_KEY_BITS).unwrap();
        assert!(verify_unbind_proof(&forged.public_key_pem().unwrap(), &proof).is_err());
    }

    #[test]
    fn sealed_artifact_opens_to_equal_value() {
        let server = RsaKeyPair::generate(TEST_KEY_BITS).unwrap();
        let request = BindingRequest {
            hostname: "WS-01".into(),
            machine_fingerprint: "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4".into(),
            request_time: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        };
        let sealed = seal_artifact(server.public_key(), &request).unwrap();
        let opened: BindingRequest = open_artifact(server.private_key(), &sealed).unwrap();
        assert_eq!(opened, request);
    }
}
