//! `RelayKey` key-material lifecycle
//!
//! Generates and stores symmetric keys for the encrypted session protocol,
//! derives the topics those keys are addressed by, and refuses every key
//! operation until the manager has been initialized.
//!
//! ## Pieces
//!
//! - **Keychain**: `KeyStore` trait over tag -> hex material, with memory,
//!   JSON-file and `SQLite` backends
//! - **Topic**: SHA-256 of the raw key bytes, lowercase hex
//! - **Lifecycle**: `Uninitialized -> Initializing -> Ready`, with
//!   overlapping `init` calls coalesced onto one attempt
//! - **Key manager**: `set_sym_key` / `delete_sym_key`, X25519 keypairs and
//!   ECDH + HKDF-SHA256 shared keys

pub mod error;
pub mod keychain;
pub mod lifecycle;
pub mod manager;
pub mod topic;

pub use error::CryptoError;
#[cfg(any(test, feature = "test-utils"))]
pub use keychain::{KeychainCall, RecordingKeyStore};
pub use keychain::{FileKeyStore, KeyStore, MemoryKeyStore, SqliteKeyStore};
pub use lifecycle::{InitGate, LifecycleState};
pub use manager::KeyManager;
pub use topic::{generate_random_bytes32, hash_bytes, hash_key};
