//! Hybrid encryption envelope.
//!
//! On-the-wire format, base64-encoded:
//!
//! ```text
//! uint32_be(N) ‖ rsa_oaep_sha256(aes_key) ‖ nonce(12) ‖ aes_256_gcm(plaintext)
//! ```
//!
//! where `N` is the byte length of the RSA-OAEP ciphertext and the AES key
//! is always 32 bytes. The random-key variant serves the server→device
//! direction; the client-key variant lets a device re-derive the key from
//! its own fingerprint and open the payload without the server's private
//! key, while the RSA-wrapped copy keeps the blob server-recoverable.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, CryptoResult};

/// Domain-separation context for client key derivation. Version-locked to
/// deployed devices; changing it orphans every issued license.
pub const CLIENT_KEY_CONTEXT: &str = "LicenseCenter:AES:";

/// AES-256 key length in bytes.
const AES_KEY_LEN: usize = 32;
/// AES-GCM nonce length in bytes, prepended to the ciphertext.
const NONCE_LEN: usize = 12;
/// Length of the big-endian key-length header.
const HEADER_LEN: usize = 4;

/// Derive the deterministic client AES key for a machine fingerprint.
pub fn derive_client_key(machine_fingerprint: &str) -> [u8; AES_KEY_LEN] {
    let digest = Sha256::digest(format!("{CLIENT_KEY_CONTEXT}{machine_fingerprint}").as_bytes());
    digest.into()
}

/// Wrap `plaintext` for `public_key` with a freshly random AES key.
pub fn wrap(public_key: &RsaPublicKey, plaintext: &[u8]) -> CryptoResult<String> {
    let mut aes_key = [0u8; AES_KEY_LEN];
    OsRng.fill_bytes(&mut aes_key);
    wrap_with_key(public_key, plaintext, &aes_key)
}

/// Wrap `plaintext` for `public_key` with a caller-supplied AES key.
///
/// Used in the device→server direction (the device derives the key from
/// its fingerprint) and for issued licenses (the server reuses the
/// device's derived key so the device can open the artifact offline).
pub fn wrap_with_key(
    public_key: &RsaPublicKey,
    plaintext: &[u8],
    aes_key: &[u8; AES_KEY_LEN],
) -> CryptoResult<String> {
    let sealed = aes_gcm_seal(aes_key, plaintext)?;

    let wrapped_key = public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), aes_key)
        .map_err(CryptoError::KeyWrap)?;

    let mut envelope = Vec::with_capacity(HEADER_LEN + wrapped_key.len() + sealed.len());
    envelope.extend_from_slice(&(wrapped_key.len() as u32).to_be_bytes());
    envelope.extend_from_slice(&wrapped_key);
    envelope.extend_from_slice(&sealed);

    Ok(STANDARD.encode(envelope))
}

/// Unwrap an envelope with the server's private key.
pub fn unwrap(private_key: &RsaPrivateKey, envelope_b64: &str) -> CryptoResult<Vec<u8>> {
    let envelope = STANDARD.decode(envelope_b64)?;
    let (wrapped_key, sealed) = split_envelope(&envelope)?;

    let aes_key = private_key
        .decrypt(Oaep::new::<Sha256>(), wrapped_key)
        .map_err(CryptoError::KeyUnwrap)?;
    if aes_key.len() != AES_KEY_LEN {
        return Err(CryptoError::InvalidKeyLength(aes_key.len()));
    }

    let mut key = [0u8; AES_KEY_LEN];
    key.copy_from_slice(&aes_key);
    aes_gcm_open(&key, sealed)
}

/// Unwrap an envelope with a known AES key, skipping the RSA-wrapped copy.
///
/// This is the device-side path: the device reconstructs the key from its
/// fingerprint and never holds the server's private key.
pub fn unwrap_with_key(aes_key: &[u8; AES_KEY_LEN], envelope_b64: &str) -> CryptoResult<Vec<u8>> {
    let envelope = STANDARD.decode(envelope_b64)?;
    let (_, sealed) = split_envelope(&envelope)?;
    aes_gcm_open(aes_key, sealed)
}

/// Split a decoded envelope into its RSA-wrapped key and sealed payload.
fn split_envelope(envelope: &[u8]) -> CryptoResult<(&[u8], &[u8])> {
    if envelope.len() < HEADER_LEN {
        return Err(CryptoError::TruncatedEnvelope("missing length header"));
    }
    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&envelope[..HEADER_LEN]);
    let key_len = u32::from_be_bytes(header) as usize;
    let body = &envelope[HEADER_LEN..];
    if body.len() < key_len {
        return Err(CryptoError::TruncatedEnvelope("wrapped key incomplete"));
    }
    Ok((&body[..key_len], &body[key_len..]))
}

/// Seal with AES-256-GCM: random 12-byte nonce prepended to ct-with-tag.
fn aes_gcm_seal(key: &[u8; AES_KEY_LEN], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::PayloadSeal)?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open a sealed AES-256-GCM payload (nonce-prefixed).
fn aes_gcm_open(key: &[u8; AES_KEY_LEN], sealed: &[u8]) -> CryptoResult<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(CryptoError::TruncatedEnvelope("payload shorter than nonce"));
    }
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CryptoError::PayloadOpen)
}
