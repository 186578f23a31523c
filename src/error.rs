//! Error taxonomy for field encryption.

use fieldvault_envelope::{DecryptionError, EncodingError};
use fieldvault_keystore::{KeyId, KeystoreError};

pub type Result<T, E = FieldError> = std::result::Result<T, E>;

/// Reason attached to every cryptographic decrypt failure. Tampering, a wrong
/// key and corrupted bytes all surface with this exact text.
pub(crate) const REJECTED: &str = "ciphertext rejected";

#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    /// Symmetric key material is absent or not exactly 16 bytes.
    #[error("invalid symmetric key configuration: {0}")]
    InvalidKeyConfiguration(&'static str),

    #[error("no active key")]
    NoActiveKey,

    #[error("key not found: {0}")]
    KeyNotFound(KeyId),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("failed to unwrap private key {0}")]
    KeyUnwrap(KeyId),

    #[error("key revoked: {0}")]
    KeyRevoked(KeyId),

    #[error("encryption failed: {0}")]
    Encryption(&'static str),

    /// Only structural problems carry a specific reason; cryptographic
    /// failures always use the same one.
    #[error("decryption failed: {0}")]
    Decryption(&'static str),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("key registry error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<KeystoreError> for FieldError {
    fn from(e: KeystoreError) -> Self {
        match e {
            KeystoreError::KeyGeneration(msg) => FieldError::KeyGeneration(msg),
            KeystoreError::NoActiveKey => FieldError::NoActiveKey,
            KeystoreError::KeyNotFound(id) => FieldError::KeyNotFound(id),
            KeystoreError::KeyUnwrap(id) => FieldError::KeyUnwrap(id),
            KeystoreError::KeyRevoked(id) => FieldError::KeyRevoked(id),
            e @ KeystoreError::InvalidTransition { .. } => FieldError::Storage(e.to_string()),
            KeystoreError::Storage(msg) => FieldError::Storage(msg),
        }
    }
}

impl From<DecryptionError> for FieldError {
    fn from(_: DecryptionError) -> Self {
        FieldError::Decryption(REJECTED)
    }
}

impl From<EncodingError> for FieldError {
    fn from(_: EncodingError) -> Self {
        FieldError::Encryption("primitive rejected input")
    }
}

impl FieldError {
    /// Short machine-readable kind, used in logs and migration reports.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldError::InvalidKeyConfiguration(_) => "invalid_key_configuration",
            FieldError::NoActiveKey => "no_active_key",
            FieldError::KeyNotFound(_) => "key_not_found",
            FieldError::KeyGeneration(_) => "key_generation",
            FieldError::KeyUnwrap(_) => "key_unwrap",
            FieldError::KeyRevoked(_) => "key_revoked",
            FieldError::Encryption(_) => "encryption",
            FieldError::Decryption(_) => "decryption",
            FieldError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            FieldError::Storage(_) => "storage",
            FieldError::Config(_) => "config",
        }
    }
}
