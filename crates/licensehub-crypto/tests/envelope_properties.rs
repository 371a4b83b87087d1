//! Property-based tests for the hybrid envelope and artifact codec.
//!
//! These verify the round-trip laws over arbitrary payloads. A single
//! RSA keypair is shared across cases; generating one per case would
//! dominate the run time.

use std::sync::OnceLock;

use proptest::prelude::*;

use licensehub_crypto::{codec, envelope, keys, RsaKeyPair};

const TEST_KEY_BITS: usize = 1024;

fn shared_keypair() -> &'static RsaKeyPair {
    static PAIR: OnceLock<RsaKeyPair> = OnceLock::new();
    PAIR.get_or_init(|| RsaKeyPair::generate(TEST_KEY_BITS).expect("keypair generation"))
}

/// Strategy for payloads of assorted sizes, including empty.
fn payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..2048)
}

/// Strategy for fingerprint-shaped hex strings.
fn fingerprint() -> impl Strategy<Value = String> {
    "[0-9a-f]{32}"
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        ..ProptestConfig::default()
    })]

    /// Random-key envelopes always open back to the plaintext.
    #[test]
    fn wrap_unwrap_roundtrip(data in payload()) {
        let pair = shared_keypair();
        let sealed = envelope::wrap(pair.public_key(), &data).unwrap();
        prop_assert_eq!(envelope::unwrap(pair.private_key(), &sealed).unwrap(), data);
    }

    /// Client-key envelopes open via both the server key and the derived key.
    #[test]
    fn wrap_with_key_roundtrip_both_paths(data in payload(), fp in fingerprint()) {
        let pair = shared_keypair();
        let key = envelope::derive_client_key(&fp);
        let sealed = envelope::wrap_with_key(pair.public_key(), &data, &key).unwrap();
        prop_assert_eq!(envelope::unwrap(pair.private_key(), &sealed).unwrap(), data.clone());
        prop_assert_eq!(envelope::unwrap_with_key(&key, &sealed).unwrap(), data);
    }

    /// Signatures verify over arbitrary data and fail on any bit flip.
    #[test]
    fn sign_verify_with_mutation(data in prop::collection::vec(any::<u8>(), 1..512), flip in 0usize..512) {
        let pair = shared_keypair();
        let sig = keys::sign(pair.private_key(), &data).unwrap();
        keys::verify(pair.public_key(), &data, &sig).unwrap();

        let mut mutated = data.clone();
        let idx = flip % mutated.len();
        mutated[idx] ^= 0x01;
        prop_assert!(keys::verify(pair.public_key(), &mutated, &sig).is_err());
    }

    /// The unbind signable never verifies under a different field tuple.
    #[test]
    fn unbind_proof_binds_all_fields(hostname in "[A-Z][A-Z0-9-]{1,12}", other in "[a-z][a-z0-9]{1,12}") {
        prop_assume!(hostname.to_lowercase() != other);
        let pair = shared_keypair();
        let now = chrono::Utc::now();
        let sig = codec::sign_unbind_proof(pair.private_key(), "lk", "fp", now, &hostname).unwrap();

        let good = codec::unbind_signable("lk", "fp", now, &hostname);
        keys::verify(pair.public_key(), good.as_bytes(), &sig).unwrap();

        let bad = codec::unbind_signable("lk", "fp", now, &other);
        prop_assert!(keys::verify(pair.public_key(), bad.as_bytes(), &sig).is_err());
    }
}
