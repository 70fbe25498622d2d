//! Errors raised while resolving configuration.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A settings file or override could not be read or understood.
    #[error("Configuration error: {0}")]
    Config(String),
}
