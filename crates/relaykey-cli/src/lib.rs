//! `RelayKey` CLI Library
//!
//! Operator commands over the keychain: store and inspect symmetric keys,
//! generate X25519 keypairs and derive shared keys.

pub mod keys_cmd;
