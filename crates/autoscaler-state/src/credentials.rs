//! Metrics-ingestion credentials.
//!
//! Each app holds at most one live credential. Generated credentials are
//! random UUIDs; only a salted SHA-256 hash of the password is persisted,
//! so the plaintext is returned exactly once, from `create`.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StateError;
use crate::store::{StateStore, epoch_secs};
use crate::types::{Credential, CredentialRecord};

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("username and password are both required")]
    Incomplete,

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

/// Issues and revokes per-app credentials.
#[async_trait]
pub trait CredentialManager: Send + Sync {
    /// Store a credential for the app, replacing any existing one. When
    /// `supplied` is `None` both username and password are generated.
    async fn create(
        &self,
        app_id: &str,
        supplied: Option<Credential>,
    ) -> Result<Credential, CredentialError>;

    /// Revoke the app's credential. Revoking an absent credential succeeds.
    async fn delete(&self, app_id: &str) -> Result<(), CredentialError>;

    /// Check a presented credential against the stored one.
    async fn validate(&self, app_id: &str, presented: &Credential)
    -> Result<bool, CredentialError>;
}

/// `CredentialManager` backed by the state store.
#[derive(Clone)]
pub struct StoredCredentials {
    store: StateStore,
}

impl StoredCredentials {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl CredentialManager for StoredCredentials {
    async fn create(
        &self,
        app_id: &str,
        supplied: Option<Credential>,
    ) -> Result<Credential, CredentialError> {
        let credential = match supplied {
            Some(c) if c.is_complete() => c,
            Some(_) => return Err(CredentialError::Incomplete),
            None => Credential {
                username: Uuid::new_v4().to_string(),
                password: Uuid::new_v4().to_string(),
            },
        };

        let salt = Uuid::new_v4().simple().to_string();
        let record = CredentialRecord {
            app_id: app_id.to_string(),
            username: credential.username.clone(),
            password_hash: hash_password(&salt, &credential.password),
            salt,
            updated_at: epoch_secs(),
        };
        self.store
            .blocking(move |store| store.put_credential(&record))
            .await?;
        info!(%app_id, "credential stored");
        Ok(credential)
    }

    async fn delete(&self, app_id: &str) -> Result<(), CredentialError> {
        let owned = app_id.to_string();
        let existed = self
            .store
            .blocking(move |store| store.delete_credential(&owned))
            .await?;
        debug!(%app_id, existed, "credential deleted");
        Ok(())
    }

    async fn validate(
        &self,
        app_id: &str,
        presented: &Credential,
    ) -> Result<bool, CredentialError> {
        let owned = app_id.to_string();
        let Some(record) = self
            .store
            .blocking(move |store| store.get_credential(&owned))
            .await?
        else {
            return Ok(false);
        };
        Ok(record.username == presented.username
            && record.password_hash == hash_password(&record.salt, &presented.password))
    }
}
