//! Field ciphers: one per algorithm tag.
//!
//! Every cipher takes and returns UTF-8 strings. The asymmetric and hybrid
//! ciphers resolve key material through the [`KeyRegistry`]; the symmetric one
//! holds its static key directly.

mod asymmetric;
mod hybrid;
mod symmetric;

pub use asymmetric::AsymmetricCipher;
pub use hybrid::HybridCipher;
pub use symmetric::SymmetricCipher;

use std::fmt;
use std::sync::Arc;

use fieldvault_envelope::{PublicKey, SecretKey};
use fieldvault_keystore::{CryptoKey, KeyId, KeyRegistry};

use crate::algorithm::Algorithm;
use crate::error::{FieldError, Result, REJECTED};

const TRACING_TARGET: &str = "fieldvault::cipher";

/// What a write stores: the payload plus the row's tag and key identifier.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedValue {
    pub payload: String,
    pub algorithm: Algorithm,
    pub key_ref: String,
}

impl fmt::Debug for EncryptedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedValue")
            .field("payload_len", &self.payload.len())
            .field("algorithm", &self.algorithm)
            .field("key_ref", &self.key_ref)
            .finish()
    }
}

pub trait FieldCipher: Send + Sync {
    fn algorithm(&self) -> Algorithm;

    fn encrypt(&self, plaintext: &str) -> Result<EncryptedValue>;

    fn decrypt(&self, payload: &str) -> Result<String>;

    /// Non-failing variant for display paths: any error becomes `None`.
    fn decrypt_or_none(&self, payload: &str) -> Option<String> {
        match self.decrypt(payload) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    algorithm = %self.algorithm(),
                    kind = e.kind(),
                    "decrypt failed, returning none"
                );
                None
            }
        }
    }
}

/// The active key record with its parsed public key.
pub(crate) fn active_public_key(registry: &KeyRegistry) -> Result<(CryptoKey, PublicKey)> {
    let key = registry.get_active_key()?;
    let pk = registry.public_key(&key)?;
    Ok((key, pk))
}

/// Resolve a historical key id to its unwrapped private key.
pub(crate) fn resolve_secret(registry: &KeyRegistry, id: KeyId) -> Result<Arc<SecretKey>> {
    let key = registry.get_key_by_id(id)?;
    Ok(registry.unwrap_private_key(&key)?)
}

pub(crate) fn into_utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| FieldError::Decryption(REJECTED))
}
