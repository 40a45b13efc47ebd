//! Persistence of encrypted wallets
//!
//! The keyring itself never touches storage. Callers keep the encrypted
//! mnemonic in any [`SecretStore`] (OS keychain, browser storage, a file) and
//! hand it back on unlock. [`WalletStore`] layers named wallets on top.

use crate::envelope::{EncryptedEnvelope, EnvelopeError};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Errors from storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored wallet is corrupt: {0}")]
    Corrupt(#[from] EnvelopeError),

    #[error("Wallet not found: {0}")]
    NotFound(String),

    #[error("Invalid wallet name: {0:?}")]
    InvalidName(String),
}

/// Byte-oriented key/value storage for secrets
pub trait SecretStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    /// Remove `key`; removing a missing key is not an error
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// In-process store, mostly for tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))
    }
}

impl SecretStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

impl<S: SecretStore + ?Sized> SecretStore for &S {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }
}

/// Named encrypted wallets in a [`SecretStore`], under `wallet/<name>`
#[derive(Debug)]
pub struct WalletStore<S> {
    backend: S,
}

impl<S: SecretStore> WalletStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn save(&self, name: &str, envelope: &EncryptedEnvelope) -> Result<(), StoreError> {
        let key = wallet_key(name)?;
        self.backend.set(&key, envelope.to_json()?.as_bytes())?;
        log::info!("saved wallet {:?}", name);
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<EncryptedEnvelope, StoreError> {
        let key = wallet_key(name)?;
        let raw = self
            .backend
            .get(&key)?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        let json = String::from_utf8(raw)
            .map_err(|_| EnvelopeError::InvalidFormat("stored wallet is not UTF-8".into()))?;
        Ok(EncryptedEnvelope::from_json(&json)?)
    }

    pub fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.backend.get(&wallet_key(name)?)?.is_some())
    }

    pub fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.backend.delete(&wallet_key(name)?)?;
        log::info!("deleted wallet {:?}", name);
        Ok(())
    }
}

fn wallet_key(name: &str) -> Result<String, StoreError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if !valid {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(format!("wallet/{}", name))
}
