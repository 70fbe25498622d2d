//! Recording test double for the keychain.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Notify;

use super::{KeyStore, MemoryKeyStore};
use crate::error::CryptoError;

/// A mutating call observed by [`RecordingKeyStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeychainCall {
    Set { tag: String, material: String },
    Delete { tag: String },
}

/// In-memory keychain that counts `init` calls and records every `set` and
/// `delete`. Initialization can be made to fail or held pending.
#[derive(Debug, Default)]
pub struct RecordingKeyStore {
    inner: MemoryKeyStore,
    init_calls: AtomicUsize,
    failing_inits: AtomicUsize,
    init_hold: Mutex<Option<Arc<Notify>>>,
    calls: Mutex<Vec<KeychainCall>>,
}

impl RecordingKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls to `init` fail with `StoreUnavailable`.
    pub fn fail_next_inits(&self, count: usize) {
        self.failing_inits.store(count, Ordering::SeqCst);
    }

    /// Hold the next `init` until the returned handle is notified.
    pub fn hold_init(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self
            .init_hold
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&notify));
        notify
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<KeychainCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The backing store, for lookups that should not be recorded.
    pub const fn inner(&self) -> &MemoryKeyStore {
        &self.inner
    }

    fn record(&self, call: KeychainCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    fn take_failure(&self) -> bool {
        self.failing_inits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl KeyStore for RecordingKeyStore {
    async fn init(&self) -> Result<(), CryptoError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        let hold = self
            .init_hold
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(notify) = hold {
            notify.notified().await;
        }
        if self.take_failure() {
            return Err(CryptoError::StoreUnavailable(
                "injected init failure".to_string(),
            ));
        }
        self.inner.init().await
    }

    async fn has(&self, tag: &str) -> Result<bool, CryptoError> {
        self.inner.has(tag).await
    }

    async fn get(&self, tag: &str) -> Result<String, CryptoError> {
        self.inner.get(tag).await
    }

    async fn set(&self, tag: &str, material: &str) -> Result<(), CryptoError> {
        self.record(KeychainCall::Set {
            tag: tag.to_string(),
            material: material.to_string(),
        });
        self.inner.set(tag, material).await
    }

    async fn delete(&self, tag: &str) -> Result<(), CryptoError> {
        self.record(KeychainCall::Delete {
            tag: tag.to_string(),
        });
        self.inner.delete(tag).await
    }
}
