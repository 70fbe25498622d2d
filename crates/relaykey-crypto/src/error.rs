//! Crypto error types.

use relaykey_core::db::DatabaseError;

/// Errors from key-material operations.
///
/// `Clone` so a single initialization outcome can be handed to every caller
/// that waited on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("{component} was not initialized")]
    NotInitialized { component: &'static str },

    #[error("No matching key. keychain: {tag}")]
    NotFound { tag: String },

    #[error("Key store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),
}

impl CryptoError {
    pub(crate) fn not_found(tag: &str) -> Self {
        Self::NotFound {
            tag: tag.to_string(),
        }
    }
}

impl From<std::io::Error> for CryptoError {
    fn from(e: std::io::Error) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}

impl From<DatabaseError> for CryptoError {
    fn from(e: DatabaseError) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}

impl From<sqlx::Error> for CryptoError {
    fn from(e: sqlx::Error) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}
