//! Unified error types for the primitive layer.

use core::fmt;

/// Any failure on an open/decrypt path.
///
/// Deliberately carries no detail: malformed input, a wrong key and a failed
/// authentication tag are indistinguishable to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptionError;

impl fmt::Display for DecryptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decryption failed")
    }
}

impl std::error::Error for DecryptionError {}

/// Any failure on a seal/encrypt/keygen path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingError;

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "encoding error")
    }
}

impl std::error::Error for EncodingError {}

/// Normalize encode errors into decrypt errors (oracle discipline).
impl From<EncodingError> for DecryptionError {
    fn from(_: EncodingError) -> Self {
        DecryptionError
    }
}
