//! In-process keychain.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{KEYCHAIN_COMPONENT, KeyStore};
use crate::error::CryptoError;
use crate::lifecycle::{InitGate, LifecycleState};

#[derive(Debug)]
struct Inner {
    gate: InitGate,
    entries: RwLock<HashMap<String, String>>,
}

/// Keychain held entirely in memory. Clones share the same entries.
#[derive(Debug, Clone)]
pub struct MemoryKeyStore {
    inner: Arc<Inner>,
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                gate: InitGate::new(KEYCHAIN_COMPONENT),
                entries: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.gate.state()
    }

    /// Number of stored entries, regardless of initialization.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        self.inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyStore for MemoryKeyStore {
    async fn init(&self) -> Result<(), CryptoError> {
        self.inner.gate.initialize(|| async { Ok(()) }).await
    }

    async fn has(&self, tag: &str) -> Result<bool, CryptoError> {
        self.inner.gate.ensure_ready()?;
        Ok(self.read().contains_key(tag))
    }

    async fn get(&self, tag: &str) -> Result<String, CryptoError> {
        self.inner.gate.ensure_ready()?;
        self.read()
            .get(tag)
            .cloned()
            .ok_or_else(|| CryptoError::not_found(tag))
    }

    async fn set(&self, tag: &str, material: &str) -> Result<(), CryptoError> {
        self.inner.gate.ensure_ready()?;
        self.write().insert(tag.to_string(), material.to_string());
        Ok(())
    }

    async fn delete(&self, tag: &str) -> Result<(), CryptoError> {
        self.inner.gate.ensure_ready()?;
        self.write().remove(tag);
        Ok(())
    }
}
