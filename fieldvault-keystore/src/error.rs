//! Error types for the key registry.

use crate::types::{KeyId, KeyStatus};

pub type Result<T, E = KeystoreError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum KeystoreError {
    /// The RSA primitive, PEM encoding or wrapping failed while creating a key.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("no active key")]
    NoActiveKey,

    #[error("key not found: {0}")]
    KeyNotFound(KeyId),

    /// Wrapped blob is corrupted or the master secret does not match.
    #[error("failed to unwrap private key {0}")]
    KeyUnwrap(KeyId),

    #[error("key revoked: {0}")]
    KeyRevoked(KeyId),

    #[error("invalid transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: KeyId,
        from: KeyStatus,
        to: KeyStatus,
    },

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for KeystoreError {
    fn from(e: rusqlite::Error) -> Self {
        KeystoreError::Storage(e.to_string())
    }
}
