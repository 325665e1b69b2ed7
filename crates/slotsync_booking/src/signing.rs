//! Shared secret for provider webhook signatures.
//!
//! The same key is sent to the provider when a subscription is registered and
//! used to verify every inbound delivery. After a rotation the previous key keeps
//! verifying until it is retired, so deliveries signed just before the switch
//! still pass.

use rand::RngCore;
use slotsync_config::env_vars;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Default)]
struct SigningKeys {
    active: Option<String>,
    previous: Option<String>,
}

pub struct SigningSecretManager {
    keys: RwLock<SigningKeys>,
}

impl SigningSecretManager {
    pub fn new(active: Option<String>) -> Self {
        Self {
            keys: RwLock::new(SigningKeys {
                active: active.filter(|k| !k.trim().is_empty()),
                previous: None,
            }),
        }
    }

    /// Loads the active key from the secret store.
    pub fn from_env() -> Self {
        let active = env_vars::get_secret_env_var(env_vars::WEBHOOK_SIGNING_KEY);
        if active.is_none() {
            info!("No webhook signing key configured; deliveries fail verification until one is provisioned");
        }
        Self::new(active)
    }

    /// A fresh random 32-byte key, hex encoded.
    pub fn generate() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    pub async fn active(&self) -> Option<String> {
        self.keys.read().await.active.clone()
    }

    /// Makes `key` active; the old active key stays valid for verification.
    pub async fn rotate(&self, key: String) {
        let mut keys = self.keys.write().await;
        keys.previous = keys.active.replace(key);
        info!("Webhook signing key rotated");
    }

    /// Ends the grace period of the key replaced by the last rotation.
    pub async fn retire_previous(&self) {
        if self.keys.write().await.previous.take().is_some() {
            info!("Previous webhook signing key retired");
        }
    }

    /// Every key an inbound signature may have been produced with, newest first.
    pub async fn verification_keys(&self) -> Vec<String> {
        let keys = self.keys.read().await;
        keys.active.iter().chain(keys.previous.iter()).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_32_random_bytes() {
        let a = SigningSecretManager::generate();
        let b = SigningSecretManager::generate();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn rotation_keeps_previous_key_until_retired() {
        let manager = SigningSecretManager::new(Some("old".to_string()));
        manager.rotate("new".to_string()).await;

        assert_eq!(manager.active().await.as_deref(), Some("new"));
        assert_eq!(manager.verification_keys().await, vec!["new", "old"]);

        manager.retire_previous().await;
        assert_eq!(manager.verification_keys().await, vec!["new"]);
    }

    #[tokio::test]
    async fn blank_key_counts_as_missing() {
        let manager = SigningSecretManager::new(Some("  ".to_string()));
        assert!(manager.verification_keys().await.is_empty());
    }
}
