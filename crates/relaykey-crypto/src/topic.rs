//! Topic derivation.
//!
//! A topic is the SHA-256 of the raw symmetric key bytes, lowercase hex.
//! Peers that independently derive the same key land on the same topic
//! without exchanging anything else.

use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Length in bytes of freshly generated symmetric key material.
pub const SYM_KEY_LENGTH: usize = 32;

/// Length in hex characters of a derived topic.
pub const TOPIC_LENGTH: usize = 64;

/// Derive the topic for hex-encoded key material.
pub fn hash_key(material_hex: &str) -> Result<String, CryptoError> {
    let bytes = decode_material(material_hex)?;
    Ok(hash_bytes(&bytes))
}

/// Derive the topic for raw key bytes.
pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Fresh 32-byte key material from the OS RNG, hex-encoded.
pub fn generate_random_bytes32() -> String {
    let mut bytes = Zeroizing::new([0u8; SYM_KEY_LENGTH]);
    OsRng.fill_bytes(&mut bytes[..]);
    hex::encode(&bytes[..])
}

/// Decode hex key material into a buffer that is wiped on drop.
pub(crate) fn decode_material(material_hex: &str) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    hex::decode(material_hex)
        .map(Zeroizing::new)
        .map_err(|e| CryptoError::InvalidKeyMaterial(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn known_vector_for_zero_key() {
        let material = "00".repeat(32);
        assert_eq!(
            hash_key(&material).unwrap(),
            "66687aadf862bd776c8fc18b8e9f8e20089714856ee233b3902a591d0d5f2925"
        );
    }

    #[test]
    fn empty_material_hashes_to_empty_digest() {
        assert_eq!(
            hash_key("").unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn hash_is_over_bytes_not_text() {
        let material = generate_random_bytes32();
        let upper = material.to_uppercase();
        assert_eq!(hash_key(&material).unwrap(), hash_key(&upper).unwrap());
        assert_ne!(hash_key(&material).unwrap(), hash_bytes(material.as_bytes()));
    }

    #[test]
    fn topic_is_fixed_length_lowercase_hex() {
        let topic = hash_key(&generate_random_bytes32()).unwrap();
        assert_eq!(topic.len(), TOPIC_LENGTH);
        assert!(topic.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
    }

    #[test]
    fn non_hex_material_is_rejected() {
        assert!(matches!(
            hash_key("not hex at all"),
            Err(CryptoError::InvalidKeyMaterial(_))
        ));
        assert!(matches!(
            hash_key("abc"),
            Err(CryptoError::InvalidKeyMaterial(_))
        ));
    }

    #[test]
    fn generated_material_is_32_bytes_and_unique() {
        let a = generate_random_bytes32();
        let b = generate_random_bytes32();
        assert_eq!(hex::decode(&a).unwrap().len(), SYM_KEY_LENGTH);
        assert_ne!(a, b);
    }
}
