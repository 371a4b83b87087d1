//! License lifecycle engine: batch activation, transfer, revocation.
//!
//! Flow ordering is deliberate. Activation checks every fingerprint for an
//! existing active license *before* inserting anything, inserts all rows,
//! and only then acquires seats in a single atomic increment; a seat
//! failure compensates by deleting the rows it just inserted. Transfer is
//! seat-neutral (one released, one activated) and folds both row changes
//! into one store transaction. Revocation releases its seat *after* the
//! status transition commits, so a concurrent retry short-circuits on the
//! no-longer-active license instead of double-releasing.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use licensehub_core::config::LicenseConfig;
use licensehub_core::error::{AppError, ErrorKind};
use licensehub_core::result::AppResult;
use licensehub_core::types::{LicenseId, MachineFingerprint};
use licensehub_crypto::{codec, envelope, CryptoError, RsaKeyPair, RSA_KEY_BITS};
use licensehub_database::LicenseStore;
use licensehub_entity::artifact::{
    BindingRequest, IssuedLicense, LicenseData, UnbindProof, LICENSE_TYPE_FULL,
};
use licensehub_entity::authorization::Authorization;
use licensehub_entity::event::{Actor, EventKind, NewEvent};
use licensehub_entity::license::{License, LicenseStatus};

use crate::authorization::AuthorizationLedger;
use crate::journal::EventJournal;
use crate::keystore::KeyStore;

/// A binding request that passed validation.
#[derive(Debug, Clone)]
struct ValidBinding {
    hostname: String,
    fingerprint: MachineFingerprint,
}

/// Top-level coordinator for the license lifecycle.
#[derive(Clone)]
pub struct LifecycleEngine {
    licenses: Arc<dyn LicenseStore>,
    ledger: Arc<AuthorizationLedger>,
    keystore: Arc<KeyStore>,
    journal: Arc<EventJournal>,
    config: LicenseConfig,
}

impl LifecycleEngine {
    /// Wire the engine onto its collaborators.
    pub fn new(
        licenses: Arc<dyn LicenseStore>,
        ledger: Arc<AuthorizationLedger>,
        keystore: Arc<KeyStore>,
        journal: Arc<EventJournal>,
        config: LicenseConfig,
    ) -> Self {
        Self {
            licenses,
            ledger,
            keystore,
            journal,
            config,
        }
    }

    /// Activate a batch of devices against one authorization.
    ///
    /// Takes binding-request envelopes and returns issued-license
    /// envelopes in input order, each sealed with the client key derived
    /// from its device's fingerprint. The batch is all-or-nothing: any
    /// invalid request, duplicate machine, or seat shortfall fails the
    /// whole call with no licenses issued.
    pub async fn activate(
        &self,
        auth_code: &str,
        binding_envelopes: &[String],
    ) -> AppResult<Vec<String>> {
        if binding_envelopes.is_empty() {
            return Err(AppError::bad_binding_request(
                "activation batch must contain at least one binding request",
            ));
        }
        if binding_envelopes.len() > self.config.max_batch_size {
            return Err(AppError::bad_binding_request(format!(
                "activation batch of {} exceeds the limit of {}",
                binding_envelopes.len(),
                self.config.max_batch_size
            )));
        }

        let actor = Actor::Customer(auth_code.to_string());
        let keypair = self.keystore.current_keypair().await?;
        let now = Utc::now();

        let mut bindings = Vec::with_capacity(binding_envelopes.len());
        for (index, sealed) in binding_envelopes.iter().enumerate() {
            let request = self.open_binding(&keypair, sealed, index)?;
            bindings.push(self.validate_binding(&request, now, index)?);
        }

        let auth = self.ledger.validate_for_use(auth_code).await?;

        // Duplicate machines fail the whole batch before anything is
        // inserted, so no seats are wasted on a rejected batch.
        let mut batch_fingerprints = HashSet::new();
        for binding in &bindings {
            if !batch_fingerprints.insert(binding.fingerprint.as_str().to_string()) {
                return Err(AppError::duplicate_active_machine(format!(
                    "machine {} appears twice in the batch",
                    binding.fingerprint
                )));
            }
        }
        for binding in &bindings {
            if self
                .licenses
                .find_active_by_fingerprint(binding.fingerprint.as_str())
                .await?
                .is_some()
            {
                return Err(AppError::duplicate_active_machine(format!(
                    "machine {} already holds an active license",
                    binding.fingerprint
                )));
            }
        }

        let mut issued: Vec<(License, IssuedLicense)> = Vec::with_capacity(bindings.len());
        let mut inserted_ids: Vec<LicenseId> = Vec::with_capacity(bindings.len());
        for binding in &bindings {
            let (row, artifact) = match self.build_license(&keypair, &auth, binding, None).await {
                Ok(built) => built,
                Err(e) => {
                    self.compensate(&inserted_ids, &e).await;
                    return Err(e);
                }
            };
            match self.licenses.insert_active(&row).await {
                Ok(inserted) => {
                    inserted_ids.push(inserted.id);
                    issued.push((inserted, artifact));
                }
                Err(e) => {
                    self.compensate(&inserted_ids, &e).await;
                    return Err(e);
                }
            }
        }

        // Seats are the final mutating step; the inserts above are the
        // only state a failure here has to compensate.
        if let Err(e) = self
            .ledger
            .acquire_seats(actor.clone(), &auth, bindings.len() as i32)
            .await
        {
            self.compensate(&inserted_ids, &e).await;
            return Err(e);
        }

        let mut sealed_licenses = Vec::with_capacity(issued.len());
        for (row, artifact) in &issued {
            let client_key = envelope::derive_client_key(&row.machine_fingerprint);
            let sealed =
                codec::seal_artifact_with_key(keypair.public_key(), artifact, &client_key)
                    .map_err(crypto_failure)?;
            sealed_licenses.push(sealed);
        }

        for (row, _) in &issued {
            info!(
                license_key = %row.license_key,
                machine_fingerprint = %row.machine_fingerprint,
                authorization_code = %auth.authorization_code,
                "Issued license"
            );
            self.journal
                .record(NewEvent::on_license(
                    EventKind::LicenseIssued,
                    actor.clone(),
                    row.id,
                    serde_json::json!({
                        "license_key": row.license_key,
                        "machine_fingerprint": row.machine_fingerprint,
                        "hostname": row.hostname,
                        "expires_at": row.expires_at,
                    }),
                ))
                .await;
        }

        Ok(sealed_licenses)
    }

    /// Move a license from its current machine to a replacement.
    ///
    /// The caller presents an unbind proof signed with the ephemeral key
    /// shipped in the original license, plus a binding request for the new
    /// machine. The new license inherits the old one's expiry; the seat
    /// count does not move.
    pub async fn transfer(
        &self,
        auth_code: &str,
        unbind_envelope: &str,
        binding_envelope: &str,
    ) -> AppResult<String> {
        let actor = Actor::Customer(auth_code.to_string());
        let keypair = self.keystore.current_keypair().await?;
        let now = Utc::now();

        let proof: UnbindProof = {
            let plaintext = envelope::unwrap(keypair.private_key(), unbind_envelope)
                .map_err(|e| bad_envelope("unbind proof", e))?;
            codec::parse_artifact(&plaintext).map_err(|e| {
                AppError::with_source(
                    ErrorKind::BadUnbindProof,
                    "failed to parse unbind proof",
                    e,
                )
            })?
        };

        let auth = self.ledger.validate_for_use(auth_code).await?;

        let old = self
            .licenses
            .find_by_key_and_fingerprint(&proof.license_key, &proof.machine_fingerprint)
            .await?
            .ok_or_else(|| {
                AppError::license_not_found("no license matches the unbind proof")
            })?;
        if old.status != LicenseStatus::Active {
            return Err(AppError::license_not_active(format!(
                "license {} is no longer active",
                old.license_key
            )));
        }
        if old.authorization_id != auth.id {
            return Err(AppError::authorization_mismatch(
                "the unbind proof refers to a license owned by a different authorization",
            ));
        }

        codec::verify_unbind_proof(&old.unbind_public_key, &proof).map_err(|e| match e {
            CryptoError::InvalidPem(_) => crypto_failure(e),
            _ => AppError::with_source(
                ErrorKind::InvalidUnbindProof,
                "unbind proof signature did not verify",
                e,
            ),
        })?;

        // The new binding request is examined only once the unbind side
        // is fully established, so a trust or ownership failure is what a
        // compound-failure request reports.
        let binding_request = self.open_binding(&keypair, binding_envelope, 0)?;
        let binding = self.validate_binding(&binding_request, now, 0)?;

        if self
            .licenses
            .find_active_by_fingerprint(binding.fingerprint.as_str())
            .await?
            .is_some()
        {
            return Err(AppError::duplicate_active_machine(format!(
                "machine {} already holds an active license",
                binding.fingerprint
            )));
        }

        // The replacement inherits the remaining validity of the old
        // license rather than re-consulting the expiry policy.
        let (row, artifact) = self
            .build_license(&keypair, &auth, &binding, Some(old.expires_at))
            .await?;
        let new = self.licenses.transfer(old.id, now, &row).await?;

        info!(
            old_license_key = %old.license_key,
            new_license_key = %new.license_key,
            old_machine = %old.machine_fingerprint,
            new_machine = %new.machine_fingerprint,
            "Transferred license"
        );
        self.journal
            .record(NewEvent::on_license(
                EventKind::LicenseReleased,
                actor.clone(),
                old.id,
                serde_json::json!({
                    "license_key": old.license_key,
                    "machine_fingerprint": old.machine_fingerprint,
                    "unbind_reason": proof.unbind_metadata.unbind_reason,
                    "client_version": proof.unbind_metadata.client_version,
                }),
            ))
            .await;
        self.journal
            .record(NewEvent::on_license(
                EventKind::LicenseTransferred,
                actor,
                new.id,
                serde_json::json!({
                    "old_license_id": old.id,
                    "old_machine_fingerprint": old.machine_fingerprint,
                    "new_machine_fingerprint": new.machine_fingerprint,
                    "expires_at": new.expires_at,
                }),
            ))
            .await;

        let client_key = envelope::derive_client_key(&new.machine_fingerprint);
        codec::seal_artifact_with_key(keypair.public_key(), &artifact, &client_key)
            .map_err(crypto_failure)
    }

    /// Administratively revoke an active license and free its seat.
    ///
    /// The seat release runs after the status transition commits; a
    /// concurrent second call sees a non-active license and
    /// short-circuits, so the seat cannot be released twice.
    pub async fn revoke(
        &self,
        actor: Actor,
        license_id: LicenseId,
        reason: &str,
    ) -> AppResult<License> {
        let revoked = self
            .licenses
            .transition_to_revoked(license_id, Utc::now())
            .await?;

        self.ledger
            .release_seats(actor.clone(), revoked.authorization_id, 1)
            .await?;

        info!(
            license_key = %revoked.license_key,
            machine_fingerprint = %revoked.machine_fingerprint,
            reason,
            "Revoked license"
        );
        self.journal
            .record(NewEvent::on_license(
                EventKind::LicenseRevoked,
                actor,
                revoked.id,
                serde_json::json!({
                    "license_key": revoked.license_key,
                    "machine_fingerprint": revoked.machine_fingerprint,
                    "reason": reason,
                }),
            ))
            .await;

        Ok(revoked)
    }

    /// All licenses held under an authorization code, newest-first.
    pub async fn licenses_for(&self, auth_code: &str) -> AppResult<Vec<License>> {
        let auth = self.ledger.get_by_code(auth_code).await?;
        self.licenses.list_by_authorization(auth.id).await
    }

    /// Unwrap and parse one binding-request envelope.
    fn open_binding(
        &self,
        keypair: &RsaKeyPair,
        sealed: &str,
        index: usize,
    ) -> AppResult<BindingRequest> {
        let plaintext = envelope::unwrap(keypair.private_key(), sealed)
            .map_err(|e| bad_envelope("binding request", e))?;
        codec::parse_artifact(&plaintext).map_err(|e| {
            AppError::with_source(
                ErrorKind::BadBindingRequest,
                format!("failed to parse binding request #{}", index + 1),
                e,
            )
        })
    }

    /// Validate fingerprint shape, hostname, and freshness.
    fn validate_binding(
        &self,
        request: &BindingRequest,
        now: DateTime<Utc>,
        index: usize,
    ) -> AppResult<ValidBinding> {
        let fingerprint = MachineFingerprint::parse(&request.machine_fingerprint)?;
        if request.hostname.trim().is_empty() {
            return Err(AppError::bad_binding_request(format!(
                "binding request #{} has an empty hostname",
                index + 1
            )));
        }
        if request.age(now) > Duration::hours(self.config.binding_freshness_hours) {
            return Err(AppError::bad_binding_request(format!(
                "binding request #{} is older than {} hours",
                index + 1,
                self.config.binding_freshness_hours
            )));
        }
        Ok(ValidBinding {
            hostname: request.hostname.clone(),
            fingerprint,
        })
    }

    /// Build a license row and its signed artifact, generating the
    /// per-license ephemeral unbind keypair. Does not touch the store.
    async fn build_license(
        &self,
        keypair: &RsaKeyPair,
        auth: &Authorization,
        binding: &ValidBinding,
        inherit_expiry: Option<DateTime<Utc>>,
    ) -> AppResult<(License, IssuedLicense)> {
        // Freshly generated per license, never reused; the private half
        // exists only inside the signed artifact.
        let unbind_pair = tokio::task::spawn_blocking(|| RsaKeyPair::generate(RSA_KEY_BITS))
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::CryptoFailure,
                    "Unbind keypair generation task failed",
                    e,
                )
            })?
            .map_err(crypto_failure)?;

        let now = Utc::now();
        let expires_at = inherit_expiry
            .unwrap_or_else(|| auth.license_expiry_from(now, self.config.default_validity_days));
        let license_key = generate_license_key(binding.fingerprint.as_str(), now);

        let license_data = LicenseData {
            license_key: license_key.clone(),
            machine_fingerprint: binding.fingerprint.as_str().to_string(),
            hostname: binding.hostname.clone(),
            issued_at: now,
            expires_at,
            license_type: LICENSE_TYPE_FULL.to_string(),
            unbind_private_key: unbind_pair.private_key_pem().map_err(crypto_failure)?,
        };
        let signature =
            codec::sign_license_data(keypair.private_key(), &license_data).map_err(crypto_failure)?;

        let row = License {
            id: LicenseId::new(),
            authorization_id: auth.id,
            license_key,
            machine_fingerprint: binding.fingerprint.as_str().to_string(),
            hostname: binding.hostname.clone(),
            unbind_public_key: unbind_pair.public_key_pem().map_err(crypto_failure)?,
            issued_at: now,
            expires_at,
            activated_at: now,
            unbound_at: None,
            status: LicenseStatus::Active,
            created_at: now,
            updated_at: now,
        };

        Ok((
            row,
            IssuedLicense {
                license_data,
                signature,
            },
        ))
    }

    /// Compensate for a failed batch by deleting the rows it inserted.
    ///
    /// Store timeouts do not compensate: the partial state is left for
    /// operator inspection rather than deleted over a flaky connection.
    /// The deletes themselves are best-effort and never block the error
    /// being returned.
    async fn compensate(&self, ids: &[LicenseId], cause: &AppError) {
        if cause.kind == ErrorKind::StoreUnavailable {
            warn!(
                inserted = ids.len(),
                "Store unavailable mid-batch; leaving partial state for inspection"
            );
            return;
        }
        for id in ids {
            if let Err(e) = self.licenses.delete(*id).await {
                warn!(license_id = %id, error = %e, "Failed to roll back inserted license");
            }
        }
    }
}

/// Content-derived license key: hex SHA-256 over fingerprint, issue time,
/// and a random nonce.
fn generate_license_key(fingerprint: &str, issued_at: DateTime<Utc>) -> String {
    let material = format!(
        "{fingerprint}:{}:{}",
        codec::rfc3339(issued_at),
        Uuid::new_v4()
    );
    hex::encode(Sha256::digest(material.as_bytes()))
}

fn bad_envelope(what: &str, err: CryptoError) -> AppError {
    AppError::with_source(
        ErrorKind::BadEnvelope,
        format!("failed to open {what} envelope"),
        err,
    )
}

fn crypto_failure(err: CryptoError) -> AppError {
    AppError::with_source(ErrorKind::CryptoFailure, "cryptographic operation failed", err)
}
