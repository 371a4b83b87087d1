//! Server keypair management.
//!
//! The keystore holds the long-lived RSA keypair used to decrypt inbound
//! envelopes and sign outbound license data. First-use generation and
//! rotation are serialized by a process-local write lock on top of the
//! store's atomic activate-new transaction; readers observe either the
//! pre-rotation or post-rotation active keypair, never a partial state.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use licensehub_core::error::{AppError, ErrorKind};
use licensehub_core::result::AppResult;
use licensehub_crypto::{CryptoError, RsaKeyPair, RSA_KEY_BITS};
use licensehub_database::KeypairStore;
use licensehub_entity::event::{Actor, EventKind as JournalEventKind, NewEvent};
use licensehub_entity::keypair::ServerKeypair;

use crate::journal::EventJournal;

/// Process-wide server keypair service.
#[derive(Clone)]
pub struct KeyStore {
    store: Arc<dyn KeypairStore>,
    journal: Arc<EventJournal>,
    write_lock: Arc<Mutex<()>>,
}

impl KeyStore {
    /// Create a keystore on the given store.
    pub fn new(store: Arc<dyn KeypairStore>, journal: Arc<EventJournal>) -> Self {
        Self {
            store,
            journal,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The active keypair, generating and persisting one atomically when
    /// the store is empty.
    pub async fn current_keypair(&self) -> AppResult<RsaKeyPair> {
        if let Some(row) = self.store.find_active().await? {
            return parse_stored(&row);
        }
        self.ensure_generated().await
    }

    /// The active public key in SPKI PEM form.
    ///
    /// Fails only if the store is empty and generation fails.
    pub async fn public_key_pem(&self) -> AppResult<String> {
        if let Some(row) = self.store.find_active().await? {
            return Ok(row.public_key_pem);
        }
        let pair = self.ensure_generated().await?;
        pair.public_key_pem().map_err(keystore_error)
    }

    /// Generate a new keypair and mark it active, deactivating the prior
    /// one. Prior keypairs are retained so old signatures stay verifiable;
    /// new envelopes must target the new public key.
    pub async fn rotate(&self, actor: Actor) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        self.generate_and_activate(actor, "rotation").await?;
        Ok(())
    }

    /// All keypairs, newest-first.
    pub async fn list_keys(&self) -> AppResult<Vec<ServerKeypair>> {
        self.store.list().await
    }

    /// First-use generation path: take the write lock, re-check, generate.
    async fn ensure_generated(&self) -> AppResult<RsaKeyPair> {
        let _guard = self.write_lock.lock().await;
        // Another task may have generated while we waited on the lock.
        if let Some(row) = self.store.find_active().await? {
            return parse_stored(&row);
        }
        self.generate_and_activate(Actor::System, "initial").await
    }

    /// Caller must hold `write_lock`.
    async fn generate_and_activate(
        &self,
        actor: Actor,
        reason: &'static str,
    ) -> AppResult<RsaKeyPair> {
        let pair = tokio::task::spawn_blocking(|| RsaKeyPair::generate(RSA_KEY_BITS))
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::KeyStoreUnavailable,
                    "Keypair generation task failed",
                    e,
                )
            })?
            .map_err(keystore_error)?;

        let private_pem = pair.private_key_pem().map_err(keystore_error)?;
        let public_pem = pair.public_key_pem().map_err(keystore_error)?;
        let row = self.store.activate_new(&private_pem, &public_pem).await?;

        info!(keypair_id = %row.id, reason, "Activated new server keypair");
        self.journal
            .record(NewEvent::on_keypair(
                JournalEventKind::KeypairRotated,
                actor,
                row.id,
                serde_json::json!({ "reason": reason }),
            ))
            .await;

        Ok(pair)
    }
}

fn parse_stored(row: &ServerKeypair) -> AppResult<RsaKeyPair> {
    RsaKeyPair::from_private_pem(&row.private_key_pem).map_err(keystore_error)
}

fn keystore_error(err: CryptoError) -> AppError {
    AppError::with_source(
        ErrorKind::KeyStoreUnavailable,
        "Server keypair unavailable",
        err,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use licensehub_database::memory::{MemoryEventStore, MemoryKeypairStore};

    fn keystore() -> (KeyStore, Arc<MemoryKeypairStore>) {
        let store = Arc::new(MemoryKeypairStore::new());
        let journal = Arc::new(EventJournal::new(Arc::new(MemoryEventStore::new())));
        (KeyStore::new(store.clone(), journal), store)
    }

    #[tokio::test]
    async fn first_use_generates_and_persists() {
        let (keystore, store) = keystore();
        let pair = keystore.current_keypair().await.unwrap();

        let active = store.find_active().await.unwrap().unwrap();
        assert!(active.is_active);
        let reloaded = RsaKeyPair::from_private_pem(&active.private_key_pem).unwrap();
        assert_eq!(reloaded.public_key(), pair.public_key());
    }

    #[tokio::test]
    async fn second_read_returns_same_keypair() {
        let (keystore, _) = keystore();
        let first = keystore.current_keypair().await.unwrap();
        let second = keystore.current_keypair().await.unwrap();
        assert_eq!(first.public_key(), second.public_key());
    }

    #[tokio::test]
    async fn rotation_retains_prior_keypair() {
        let (keystore, _) = keystore();
        let before = keystore.public_key_pem().await.unwrap();

        keystore.rotate(Actor::System).await.unwrap();
        let after = keystore.public_key_pem().await.unwrap();
        assert_ne!(before, after);

        let keys = keystore.list_keys().await.unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys.iter().filter(|k| k.is_active).count(), 1);
        assert!(keys.iter().any(|k| k.public_key_pem == before));
    }
}
