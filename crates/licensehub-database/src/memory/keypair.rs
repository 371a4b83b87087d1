//! In-memory keypair store using a Tokio mutex.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use licensehub_core::result::AppResult;
use licensehub_core::types::KeypairId;
use licensehub_entity::keypair::ServerKeypair;

use crate::store::KeypairStore;

/// In-memory keypair store.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeypairStore {
    state: Arc<Mutex<Vec<ServerKeypair>>>,
}

impl MemoryKeypairStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeypairStore for MemoryKeypairStore {
    async fn find_active(&self) -> AppResult<Option<ServerKeypair>> {
        let state = self.state.lock().await;
        Ok(state.iter().find(|k| k.is_active).cloned())
    }

    async fn activate_new(
        &self,
        private_key_pem: &str,
        public_key_pem: &str,
    ) -> AppResult<ServerKeypair> {
        let mut state = self.state.lock().await;
        for keypair in state.iter_mut() {
            keypair.is_active = false;
        }
        let keypair = ServerKeypair {
            id: KeypairId::new(),
            private_key_pem: private_key_pem.to_string(),
            public_key_pem: public_key_pem.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        state.push(keypair.clone());
        Ok(keypair)
    }

    async fn list(&self) -> AppResult<Vec<ServerKeypair>> {
        let state = self.state.lock().await;
        let mut keypairs = state.clone();
        keypairs.reverse();
        Ok(keypairs)
    }
}
