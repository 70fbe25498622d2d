//! Keychain: persisted mapping from tags to key material.
//!
//! `KeyStore` is the capability set the key manager consumes. Each backend
//! carries its own initialization gate; every operation other than `init`
//! fails with `NotInitialized { component: "keychain" }` until `init` has
//! succeeded. Deleting an absent tag is a successful no-op everywhere.

use std::future::Future;

use crate::error::CryptoError;

mod file;
mod memory;
#[cfg(any(test, feature = "test-utils"))]
mod recording;
mod sqlite;

pub use file::FileKeyStore;
pub use memory::MemoryKeyStore;
#[cfg(any(test, feature = "test-utils"))]
pub use recording::{KeychainCall, RecordingKeyStore};
pub use sqlite::SqliteKeyStore;

/// Component name reported by keychain `NotInitialized` errors.
pub const KEYCHAIN_COMPONENT: &str = "keychain";

/// Storage contract for tag -> key material.
pub trait KeyStore: Send + Sync {
    /// Prepare the underlying storage. Idempotent.
    fn init(&self) -> impl Future<Output = Result<(), CryptoError>> + Send;

    fn has(&self, tag: &str) -> impl Future<Output = Result<bool, CryptoError>> + Send;

    /// Fetch the material stored under `tag`, or `NotFound`.
    fn get(&self, tag: &str) -> impl Future<Output = Result<String, CryptoError>> + Send;

    /// Insert or overwrite the material stored under `tag`.
    fn set(
        &self,
        tag: &str,
        material: &str,
    ) -> impl Future<Output = Result<(), CryptoError>> + Send;

    /// Remove `tag` if present.
    fn delete(&self, tag: &str) -> impl Future<Output = Result<(), CryptoError>> + Send;
}
