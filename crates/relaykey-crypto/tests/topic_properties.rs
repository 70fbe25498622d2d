#![allow(clippy::unwrap_used)]

//! Property tests for topic derivation and the set/delete contract.

use proptest::prelude::*;
use relaykey_crypto::{
    CryptoError, KeyManager, KeyStore, MemoryKeyStore, RecordingKeyStore, hash_bytes, hash_key,
};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn prop_derived_topic_is_hash_of_material(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let material = hex::encode(&bytes);
        let stored = runtime().block_on(async {
            let manager = KeyManager::new(MemoryKeyStore::new());
            manager.init().await.unwrap();
            let topic = manager.set_sym_key(&material, None).await.unwrap();
            let stored = manager.keychain().get(&topic).await.unwrap();
            (topic, stored)
        });

        prop_assert_eq!(&stored.0, &hash_bytes(&bytes));
        prop_assert_eq!(&stored.0, &hash_key(&material).unwrap());
        prop_assert_eq!(stored.1, material);
    }

    #[test]
    fn prop_override_bypasses_derivation(
        material in "[ -~]{0,48}",
        topic in "[a-z0-9:-]{1,40}",
    ) {
        let (returned, stored) = runtime().block_on(async {
            let manager = KeyManager::new(MemoryKeyStore::new());
            manager.init().await.unwrap();
            let returned = manager.set_sym_key(&material, Some(&topic)).await.unwrap();
            let stored = manager.keychain().get(&returned).await.unwrap();
            (returned, stored)
        });

        prop_assert_eq!(returned, topic);
        prop_assert_eq!(stored, material);
    }

    #[test]
    fn prop_delete_then_lookup_is_not_found(bytes in prop::collection::vec(any::<u8>(), 1..64)) {
        let material = hex::encode(&bytes);
        let (topic, lookup) = runtime().block_on(async {
            let manager = KeyManager::new(MemoryKeyStore::new());
            manager.init().await.unwrap();
            let topic = manager.set_sym_key(&material, None).await.unwrap();
            manager.delete_sym_key(&topic).await.unwrap();
            let lookup = manager.keychain().get(&topic).await;
            (topic, lookup)
        });

        prop_assert_eq!(lookup, Err(CryptoError::NotFound { tag: topic }));
    }

    #[test]
    fn prop_uninitialized_manager_rejects_everything(
        material in "[0-9a-f]{0,64}",
        topic in "[a-z]{1,16}",
    ) {
        let (set, delete, has) = runtime().block_on(async {
            let manager = KeyManager::new(MemoryKeyStore::new());
            (
                manager.set_sym_key(&material, None).await,
                manager.delete_sym_key(&topic).await,
                manager.has_keys(&topic).await,
            )
        });

        let expected = CryptoError::NotInitialized { component: "crypto" };
        prop_assert_eq!(set, Err(expected.clone()));
        prop_assert_eq!(delete, Err(expected.clone()));
        prop_assert_eq!(has, Err(expected));
    }

    #[test]
    fn prop_repeated_init_hits_keychain_once(calls in 1usize..8) {
        let init_calls = runtime().block_on(async {
            let manager = KeyManager::new(RecordingKeyStore::new());
            for _ in 0..calls {
                manager.init().await.unwrap();
            }
            assert!(manager.is_initialized());
            assert!(manager.keychain().inner().has("probe").await.is_ok());
            manager.keychain().init_calls()
        });
        prop_assert_eq!(init_calls, 1);
    }
}
