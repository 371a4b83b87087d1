//! Shared test helpers: a fully wired engine on in-memory stores, plus
//! device-side artifact construction (binding envelopes, license opening,
//! unbind proofs).

use std::sync::Arc;

use chrono::Utc;

use licensehub_core::config::LicenseConfig;
use licensehub_core::types::AuthorizationId;
use licensehub_crypto::{codec, envelope, RsaKeyPair};
use licensehub_database::memory::{
    MemoryAuthorizationStore, MemoryEventStore, MemoryKeypairStore, MemoryLicenseStore,
};
use licensehub_entity::artifact::{BindingRequest, IssuedLicense, UnbindMetadata, UnbindProof};
use licensehub_entity::authorization::{Authorization, NewAuthorization};
use licensehub_entity::event::Actor;
use licensehub_service::{
    AuthorizationLedger, EventJournal, KeyStore, LifecycleEngine, StatsService,
};

pub const FP_WS01: &str = "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4";
pub const FP_WS02: &str = "b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4e5";
pub const FP_WS03: &str = "c3d4e5f6a1b2c3d4e5f6a1b2c3d4e5f6";

/// A fully wired engine over in-memory stores.
pub struct TestHarness {
    pub engine: LifecycleEngine,
    pub ledger: Arc<AuthorizationLedger>,
    pub keystore: Arc<KeyStore>,
    pub journal: Arc<EventJournal>,
    pub stats: StatsService,
    pub licenses: Arc<MemoryLicenseStore>,
}

impl TestHarness {
    pub fn new() -> Self {
        let authorizations = Arc::new(MemoryAuthorizationStore::new());
        let licenses = Arc::new(MemoryLicenseStore::new());
        let keypairs = Arc::new(MemoryKeypairStore::new());
        let events = Arc::new(MemoryEventStore::new());

        let journal = Arc::new(EventJournal::new(events));
        let ledger = Arc::new(AuthorizationLedger::new(
            authorizations.clone(),
            journal.clone(),
        ));
        let keystore = Arc::new(KeyStore::new(keypairs, journal.clone()));
        let config = LicenseConfig::default();
        let engine = LifecycleEngine::new(
            licenses.clone(),
            ledger.clone(),
            keystore.clone(),
            journal.clone(),
            config.clone(),
        );
        let stats = StatsService::new(
            authorizations.clone(),
            licenses.clone(),
            journal.clone(),
            config,
        );

        Self {
            engine,
            ledger,
            keystore,
            journal,
            stats,
            licenses,
        }
    }

    /// Create an enabled authorization for `customer`.
    pub async fn create_authorization(
        &self,
        customer: &str,
        max_seats: i32,
        duration_years: Option<i32>,
    ) -> Authorization {
        self.ledger
            .create(
                Actor::System,
                NewAuthorization {
                    customer_name: customer.into(),
                    authorization_code: None,
                    max_seats,
                    duration_years,
                    latest_expiry_date: None,
                },
            )
            .await
            .expect("create authorization")
    }

    /// The server keypair, generating on first use.
    pub async fn server_keypair(&self) -> RsaKeyPair {
        self.keystore.current_keypair().await.expect("server keypair")
    }

    /// Current seat counter for an authorization.
    pub async fn used_seats(&self, id: AuthorizationId) -> i32 {
        self.ledger.get(id).await.expect("authorization").used_seats
    }
}

/// Build a device's binding-request envelope, sealed with the client key
/// derived from its fingerprint (device→server direction).
pub fn binding_envelope(server: &RsaKeyPair, fingerprint: &str, hostname: &str) -> String {
    let request = BindingRequest {
        hostname: hostname.into(),
        machine_fingerprint: fingerprint.into(),
        request_time: Utc::now(),
    };
    let client_key = envelope::derive_client_key(fingerprint);
    codec::seal_artifact_with_key(server.public_key(), &request, &client_key)
        .expect("seal binding request")
}

/// Open an issued-license envelope the way a device does: with the key
/// derived from its own fingerprint, never the server's private key.
pub fn open_issued_license(sealed: &str, fingerprint: &str) -> IssuedLicense {
    let client_key = envelope::derive_client_key(fingerprint);
    let bytes = envelope::unwrap_with_key(&client_key, sealed).expect("open license envelope");
    codec::parse_artifact(&bytes).expect("parse issued license")
}

/// Build an unbind-proof envelope for a previously issued license, signed
/// with the ephemeral private key shipped inside that license.
pub fn unbind_envelope(server: &RsaKeyPair, issued: &IssuedLicense, reason: &str) -> String {
    let data = &issued.license_data;
    let ephemeral =
        RsaKeyPair::from_private_pem(&data.unbind_private_key).expect("embedded unbind key");
    let unbind_time = Utc::now();
    let signature = codec::sign_unbind_proof(
        ephemeral.private_key(),
        &data.license_key,
        &data.machine_fingerprint,
        unbind_time,
        &data.hostname,
    )
    .expect("sign unbind proof");

    let proof = UnbindProof {
        license_key: data.license_key.clone(),
        machine_fingerprint: data.machine_fingerprint.clone(),
        unbind_metadata: UnbindMetadata {
            unbind_time,
            hostname: data.hostname.clone(),
            client_version: "1.4.2".into(),
            unbind_reason: reason.into(),
        },
        unbind_proof: signature,
    };

    let client_key = envelope::derive_client_key(&data.machine_fingerprint);
    codec::seal_artifact_with_key(server.public_key(), &proof, &client_key)
        .expect("seal unbind proof")
}
