//! Error type for the vault session layer.

use std::path::PathBuf;

use thiserror::Error;
use weave_graph::LoadError;
use weave_io::IoError;

/// Failures surfaced by the store, session, settings and disk projector.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Reading, writing or watching files failed.
    #[error(transparent)]
    Io(#[from] IoError),

    /// Vault could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Settings file could not be written or encoded.
    #[error("settings error at {path}: {message}")]
    Settings {
        /// Settings file involved.
        path: PathBuf,
        /// Underlying cause.
        message: String,
    },

    /// Watch session could not be started or joined.
    #[error("watch error: {0}")]
    Watch(String),

    /// Operation needs an active vault.
    #[error("no vault is being watched")]
    NotWatching,
}

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::System(err))
    }
}
