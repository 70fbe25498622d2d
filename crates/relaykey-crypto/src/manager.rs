//! Key manager: lifecycle gate, topic derivation and the public key
//! operations consumed by the encryption layer.
//!
//! Every operation other than [`KeyManager::init`] requires the manager to
//! be `Ready` and fails fast with `NotInitialized { component: "crypto" }`
//! otherwise; nothing is queued behind initialization.

use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::Sha256;
use tracing::{debug, info};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::keychain::KeyStore;
use crate::lifecycle::{InitGate, LifecycleState};
use crate::topic::{SYM_KEY_LENGTH, decode_material, hash_key};

/// Component name reported by manager `NotInitialized` errors.
pub const CRYPTO_COMPONENT: &str = "crypto";

/// X25519 key length in bytes.
const X25519_KEY_LENGTH: usize = 32;

/// Owns a keychain and gates every key operation on initialization.
#[derive(Debug)]
pub struct KeyManager<S> {
    keychain: S,
    gate: InitGate,
}

impl<S: KeyStore> KeyManager<S> {
    /// Bind a manager to its keychain. The manager starts `Uninitialized`.
    pub const fn new(keychain: S) -> Self {
        Self {
            keychain,
            gate: InitGate::new(CRYPTO_COMPONENT),
        }
    }

    /// Initialize the keychain exactly once.
    ///
    /// Overlapping calls share the in-flight attempt. After a failure the
    /// manager is `Uninitialized` again and the next call retries.
    pub async fn init(&self) -> Result<(), CryptoError> {
        self.gate
            .initialize(|| async {
                self.keychain.init().await?;
                info!("Key manager ready");
                Ok(())
            })
            .await
    }

    pub fn state(&self) -> LifecycleState {
        self.gate.state()
    }

    pub fn is_initialized(&self) -> bool {
        self.gate.is_ready()
    }

    pub const fn keychain(&self) -> &S {
        &self.keychain
    }

    /// Whether any material is stored under `tag`.
    pub async fn has_keys(&self, tag: &str) -> Result<bool, CryptoError> {
        self.gate.ensure_ready()?;
        self.keychain.has(tag).await
    }

    /// Store symmetric key material and return the topic it is stored under.
    ///
    /// Without `override_topic` the topic is [`hash_key`] of the material,
    /// which must then be hex. With an override the material is stored
    /// as-is under the override and no derivation happens.
    pub async fn set_sym_key(
        &self,
        sym_key: &str,
        override_topic: Option<&str>,
    ) -> Result<String, CryptoError> {
        self.gate.ensure_ready()?;
        let topic = match override_topic {
            Some(topic) => topic.to_string(),
            None => hash_key(sym_key)?,
        };
        self.keychain.set(&topic, sym_key).await?;
        debug!(
            topic = %topic,
            derived = override_topic.is_none(),
            "Symmetric key stored"
        );
        Ok(topic)
    }

    /// Delete the symmetric key stored under `topic`. Deleting an unknown
    /// topic succeeds.
    pub async fn delete_sym_key(&self, topic: &str) -> Result<(), CryptoError> {
        self.gate.ensure_ready()?;
        self.keychain.delete(topic).await?;
        debug!(topic, "Symmetric key deleted");
        Ok(())
    }

    /// Generate an X25519 keypair, store the private key under the hex
    /// public key and return the public key.
    pub async fn generate_key_pair(&self) -> Result<String, CryptoError> {
        self.gate.ensure_ready()?;
        let (public_key, private_key) = {
            let secret = StaticSecret::random_from_rng(OsRng);
            let public = PublicKey::from(&secret);
            let secret_bytes = Zeroizing::new(secret.to_bytes());
            (
                hex::encode(public.as_bytes()),
                Zeroizing::new(hex::encode(&secret_bytes[..])),
            )
        };
        self.keychain.set(&public_key, &private_key).await?;
        debug!(public_key = %public_key, "Key pair generated");
        Ok(public_key)
    }

    /// Derive a symmetric key shared with `peer_public_key` and store it.
    ///
    /// Loads the private key held under `self_public_key`, runs X25519 ECDH
    /// and expands the shared secret with HKDF-SHA256. Both peers arrive at
    /// the same key, and therefore the same derived topic.
    pub async fn generate_shared_key(
        &self,
        self_public_key: &str,
        peer_public_key: &str,
        override_topic: Option<&str>,
    ) -> Result<String, CryptoError> {
        self.gate.ensure_ready()?;
        let private_key = Zeroizing::new(self.keychain.get(self_public_key).await?);
        let sym_key = {
            let secret = StaticSecret::from(decode_key(&private_key)?);
            let peer = PublicKey::from(decode_key(peer_public_key)?);
            let shared = secret.diffie_hellman(&peer);
            derive_sym_key(shared.as_bytes())?
        };
        self.set_sym_key(&sym_key, override_topic).await
    }

    /// Delete the private key stored under `public_key`.
    pub async fn delete_key_pair(&self, public_key: &str) -> Result<(), CryptoError> {
        self.gate.ensure_ready()?;
        self.keychain.delete(public_key).await?;
        debug!(public_key, "Key pair deleted");
        Ok(())
    }
}

/// Decode a hex X25519 key into a fixed-size array.
fn decode_key(hex_key: &str) -> Result<[u8; X25519_KEY_LENGTH], CryptoError> {
    let bytes = decode_material(hex_key)?;
    <[u8; X25519_KEY_LENGTH]>::try_from(bytes.as_slice()).map_err(|_| {
        CryptoError::InvalidKeyLength {
            expected: X25519_KEY_LENGTH,
            actual: bytes.len(),
        }
    })
}

/// Expand an ECDH shared secret into hex symmetric key material.
fn derive_sym_key(shared_secret: &[u8; 32]) -> Result<Zeroizing<String>, CryptoError> {
    let hk = Hkdf::<Sha256>::new(None, shared_secret);
    let mut key = Zeroizing::new([0u8; SYM_KEY_LENGTH]);
    hk.expand(&[], &mut key[..])
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
    Ok(Zeroizing::new(hex::encode(&key[..])))
}
