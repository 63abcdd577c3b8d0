//! User-supplied provider credentials: encrypted storage, verification,
//! and revocation.
//!
//! Credentials are AES-256-GCM encrypted at rest and scoped strictly to the
//! owning user. Error messages and logs reference a credential only by its
//! fingerprint; the secret value never appears in either. The selector
//! re-reads the catalog and this store on every request, so a revocation is
//! visible immediately without cache invalidation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rand::RngCore;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::CatalogStore;
use crate::models::{Provider, TierPolicy, UserTier};

/// Credential subsystem failures. Variants never carry the secret value.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CredentialError {
    #[error("tier {0} may not supply credentials")]
    NotPermitted(UserTier),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("provider {0} is not owned by the requesting user")]
    NotOwner(String),

    #[error("credential not found")]
    NotFound,

    #[error("credential store error: {0}")]
    Storage(String),

    #[error("credential cipher error")]
    Crypto,

    #[error("provider probe failed: {0}")]
    Probe(String),
}

/// Verification lifecycle of a stored credential
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    Unverified,
    Verified,
    Failed,
}

/// A stored, encrypted user credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCredential {
    pub id: Uuid,
    pub user_id: String,
    pub provider_id: String,
    /// base64(nonce || ciphertext || tag)
    pub ciphertext: String,
    /// Short hash of the secret, safe to log
    pub fingerprint: String,
    pub status: CredentialStatus,
    pub created_at: DateTime<Utc>,
}

/// Ciphertext persistence interface
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn put(&self, credential: UserCredential) -> Result<(), CredentialError>;
    async fn get(&self, id: Uuid) -> Result<Option<UserCredential>, CredentialError>;
    async fn delete(&self, id: Uuid) -> Result<(), CredentialError>;
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<UserCredential>, CredentialError>;
}

/// In-memory credential store for development and tests
pub struct InMemoryCredentialStore {
    credentials: RwLock<HashMap<Uuid, UserCredential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self {
            credentials: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn put(&self, credential: UserCredential) -> Result<(), CredentialError> {
        self.credentials
            .write()
            .await
            .insert(credential.id, credential);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<UserCredential>, CredentialError> {
        Ok(self.credentials.read().await.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<(), CredentialError> {
        self.credentials.write().await.remove(&id);
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<UserCredential>, CredentialError> {
        Ok(self
            .credentials
            .read()
            .await
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// Lightweight capability check against a provider, used by `verify`.
/// Implementations must not spend against the user's model budget.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn probe(&self, provider: &Provider, secret: &str) -> Result<bool, CredentialError>;
}

/// Probes the provider's model-listing endpoint, a cheap metadata call
pub struct HttpCapabilityProbe {
    client: reqwest::Client,
}

impl HttpCapabilityProbe {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpCapabilityProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialVerifier for HttpCapabilityProbe {
    async fn probe(&self, provider: &Provider, secret: &str) -> Result<bool, CredentialError> {
        let url = format!("{}/models", provider.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .bearer_auth(secret)
            .send()
            .await
            .map_err(|e| CredentialError::Probe(e.without_url().to_string()))?;
        Ok(response.status().is_success())
    }
}

/// AES-256-GCM envelope for credential values
pub struct CredentialCipher {
    key: LessSafeKey,
}

impl CredentialCipher {
    pub fn new(key_bytes: [u8; 32]) -> Result<Self, CredentialError> {
        let unbound =
            UnboundKey::new(&AES_256_GCM, &key_bytes).map_err(|_| CredentialError::Crypto)?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
        })
    }

    /// Key from `MODEL_SWAPPER_CRED_KEY` (base64, 32 bytes) or, outside any
    /// configured deployment, a process-local random key
    pub fn from_env() -> Result<Self, CredentialError> {
        if let Ok(encoded) = std::env::var("MODEL_SWAPPER_CRED_KEY") {
            let bytes = BASE64
                .decode(encoded.as_bytes())
                .map_err(|_| CredentialError::Crypto)?;
            let key: [u8; 32] = bytes.try_into().map_err(|_| CredentialError::Crypto)?;
            return Self::new(key);
        }
        warn!("MODEL_SWAPPER_CRED_KEY not set, using a process-local credential key");
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Self::new(key)
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CredentialError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| CredentialError::Crypto)?;

        let mut envelope = nonce_bytes.to_vec();
        envelope.extend_from_slice(&in_out);
        Ok(BASE64.encode(envelope))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CredentialError> {
        let envelope = BASE64
            .decode(encoded.as_bytes())
            .map_err(|_| CredentialError::Crypto)?;
        if envelope.len() <= NONCE_LEN {
            return Err(CredentialError::Crypto);
        }
        let nonce = Nonce::try_assume_unique_for_key(&envelope[..NONCE_LEN])
            .map_err(|_| CredentialError::Crypto)?;
        let mut in_out = envelope[NONCE_LEN..].to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| CredentialError::Crypto)?;
        String::from_utf8(plaintext.to_vec()).map_err(|_| CredentialError::Crypto)
    }
}

fn fingerprint(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
}

/// Store, verify, and revoke user-supplied provider credentials
pub struct CredentialManager {
    store: Arc<dyn CredentialStore>,
    catalog: Arc<dyn CatalogStore>,
    verifier: Arc<dyn CredentialVerifier>,
    cipher: CredentialCipher,
}

impl CredentialManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        catalog: Arc<dyn CatalogStore>,
        verifier: Arc<dyn CredentialVerifier>,
        cipher: CredentialCipher,
    ) -> Self {
        Self {
            store,
            catalog,
            verifier,
            cipher,
        }
    }

    /// Encrypt and store a credential for a permitted tier. The provider
    /// must exist and, when user-owned, belong to the requesting user.
    pub async fn store(
        &self,
        user_id: &str,
        tier: UserTier,
        provider_id: &str,
        secret: &str,
    ) -> Result<Uuid, CredentialError> {
        if !TierPolicy::for_tier(tier).allows_user_credentials {
            return Err(CredentialError::NotPermitted(tier));
        }
        let provider = self
            .catalog
            .get_provider(provider_id)
            .await
            .map_err(|e| CredentialError::Storage(e.to_string()))?
            .ok_or_else(|| CredentialError::UnknownProvider(provider_id.to_string()))?;
        if let Some(owner) = provider.scope.owner() {
            if owner != user_id {
                return Err(CredentialError::NotOwner(provider_id.to_string()));
            }
        }

        let credential = UserCredential {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            provider_id: provider_id.to_string(),
            ciphertext: self.cipher.encrypt(secret)?,
            fingerprint: fingerprint(secret),
            status: CredentialStatus::Unverified,
            created_at: Utc::now(),
        };
        let id = credential.id;
        info!(
            user = user_id,
            provider = provider_id,
            fingerprint = %credential.fingerprint,
            "credential stored"
        );
        self.store.put(credential).await?;
        Ok(id)
    }

    /// Probe the provider with the decrypted credential and persist the
    /// resulting status
    pub async fn verify(&self, credential_id: Uuid) -> Result<bool, CredentialError> {
        let mut credential = self
            .store
            .get(credential_id)
            .await?
            .ok_or(CredentialError::NotFound)?;
        let provider = self
            .catalog
            .get_provider(&credential.provider_id)
            .await
            .map_err(|e| CredentialError::Storage(e.to_string()))?
            .ok_or_else(|| CredentialError::UnknownProvider(credential.provider_id.clone()))?;

        let secret = self.cipher.decrypt(&credential.ciphertext)?;
        let ok = self.verifier.probe(&provider, &secret).await?;
        credential.status = if ok {
            CredentialStatus::Verified
        } else {
            CredentialStatus::Failed
        };
        info!(
            credential = %credential_id,
            fingerprint = %credential.fingerprint,
            verified = ok,
            "credential verification completed"
        );
        self.store.put(credential).await?;
        Ok(ok)
    }

    /// Delete immediately. Selection never caches credentials, so the
    /// removal takes effect on the next request.
    pub async fn revoke(&self, credential_id: Uuid) -> Result<(), CredentialError> {
        self.store.delete(credential_id).await?;
        info!(credential = %credential_id, "credential revoked");
        Ok(())
    }

    pub async fn list_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<UserCredential>, CredentialError> {
        self.store.list_for_user(user_id).await
    }

    /// Decrypt a credential for the external AI caller
    pub async fn reveal(&self, credential_id: Uuid) -> Result<String, CredentialError> {
        let credential = self
            .store
            .get(credential_id)
            .await?
            .ok_or(CredentialError::NotFound)?;
        self.cipher.decrypt(&credential.ciphertext)
    }
}
