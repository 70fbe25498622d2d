//! `RelayKey` Core Library
//!
//! Shared functionality for `RelayKey` components:
//! - Configuration resolution and hierarchy
//! - Tracing initialisation
//! - `SQLite` pool helpers for the database-backed keychain
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod tracing_init;

pub use config::{Config, StoreBackend};
pub use error::{Error, Result};
