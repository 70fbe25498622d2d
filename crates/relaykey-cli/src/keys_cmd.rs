//! Keychain subcommands.
//!
//! Every command brings the key manager up first, so a keychain that cannot
//! be opened is reported before anything is read or written.

use std::fmt::Write as _;

use anyhow::{Context, Result, bail};
use tracing::debug;

use relaykey_core::StoreBackend;
use relaykey_core::config::KeychainConfig;
use relaykey_crypto::{
    FileKeyStore, KeyManager, KeyStore, MemoryKeyStore, SqliteKeyStore, generate_random_bytes32,
};

/// Keychain subcommands.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum KeyCommand {
    /// Generate fresh 32-byte key material and store it under its topic.
    Generate,

    /// Store symmetric key material and print its topic.
    Set {
        /// Hex-encoded key material
        material: String,

        /// Store under this topic instead of the derived one
        #[arg(long)]
        topic: Option<String>,
    },

    /// Print the material stored under a topic.
    Get { topic: String },

    /// Print whether anything is stored under a tag.
    Has { tag: String },

    /// Delete a symmetric key.
    Delete { topic: String },

    /// Generate an X25519 keypair and print its public key.
    Keypair,

    /// Derive a symmetric key shared with a peer and print its topic.
    Shared {
        /// Our public key, whose private half is in the keychain
        self_public: String,

        /// The peer's public key
        peer_public: String,

        /// Store under this topic instead of the derived one
        #[arg(long)]
        topic: Option<String>,
    },

    /// Delete the private key held under a public key.
    DeleteKeypair { public: String },
}

/// Open the configured keychain, initialize a manager over it and run
/// `command`. Returns what the command prints.
pub async fn execute(keychain: &KeychainConfig, command: KeyCommand) -> Result<String> {
    match keychain.backend {
        StoreBackend::Memory => run(&KeyManager::new(MemoryKeyStore::new()), command).await,
        StoreBackend::File => {
            let path = keychain
                .resolved_path()
                .context("Cannot determine keychain file location")?;
            debug!(path = %path.display(), "Using file keychain");
            run(&KeyManager::new(FileKeyStore::new(path)), command).await
        }
        StoreBackend::Sqlite => {
            let path = keychain
                .resolved_path()
                .context("Cannot determine keychain database location")?;
            debug!(path = %path.display(), "Using SQLite keychain");
            run(&KeyManager::new(SqliteKeyStore::new(path)), command).await
        }
    }
}

/// Run `command` against `manager`, initializing it first.
pub async fn run<S: KeyStore>(manager: &KeyManager<S>, command: KeyCommand) -> Result<String> {
    manager
        .init()
        .await
        .context("Failed to initialize key manager")?;

    let mut out = String::new();
    match command {
        KeyCommand::Generate => {
            let material = generate_random_bytes32();
            let topic = manager.set_sym_key(&material, None).await?;
            writeln!(out, "material: {material}")?;
            writeln!(out, "topic:    {topic}")?;
        }
        KeyCommand::Set { material, topic } => {
            let topic = manager.set_sym_key(&material, topic.as_deref()).await?;
            writeln!(out, "{topic}")?;
        }
        KeyCommand::Get { topic } => {
            let material = manager.keychain().get(&topic).await?;
            writeln!(out, "{material}")?;
        }
        KeyCommand::Has { tag } => {
            writeln!(out, "{}", manager.has_keys(&tag).await?)?;
        }
        KeyCommand::Delete { topic } => {
            manager.delete_sym_key(&topic).await?;
        }
        KeyCommand::Keypair => {
            writeln!(out, "{}", manager.generate_key_pair().await?)?;
        }
        KeyCommand::Shared {
            self_public,
            peer_public,
            topic,
        } => {
            if self_public == peer_public {
                bail!("Own and peer public keys must differ");
            }
            let topic = manager
                .generate_shared_key(&self_public, &peer_public, topic.as_deref())
                .await?;
            writeln!(out, "{topic}")?;
        }
        KeyCommand::DeleteKeypair { public } => {
            manager.delete_key_pair(&public).await?;
        }
    }
    Ok(out)
}
