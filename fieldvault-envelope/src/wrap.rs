//! Master-secret key wrapping.
//!
//! Private key PEMs are persisted only in wrapped form:
//!
//!   wrapped = base64( nonce[12] || tag[16] || aes256gcm_ct[N] )
//!
//! The AAD binds the blob to this purpose so a wrapped key cannot be
//! replayed as a field payload sealed under the same secret.

use core::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::aead::{self, AES256_KEY_BYTES, NONCE_BYTES, TAG_BYTES};
use crate::error::{DecryptionError, EncodingError};

/// Domain label authenticated with every wrapped blob.
pub const WRAP_AAD: &[u8] = b"fieldvault-wrap-v1";

/// The 256-bit secret that protects private key material at rest.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret {
    bytes: [u8; AES256_KEY_BYTES],
}

impl MasterSecret {
    /// Construct from exactly 32 raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EncodingError> {
        let bytes: [u8; AES256_KEY_BYTES] = bytes.try_into().map_err(|_| EncodingError)?;
        Ok(Self { bytes })
    }

    /// Construct from base64 text (standard alphabet, padded).
    pub fn from_base64(encoded: &str) -> Result<Self, EncodingError> {
        let raw = Zeroizing::new(STANDARD.decode(encoded.trim()).map_err(|_| EncodingError)?);
        Self::from_bytes(&raw)
    }

    /// Random secret, for tests and first-time provisioning.
    pub fn generate() -> Result<Self, EncodingError> {
        let mut bytes = [0u8; AES256_KEY_BYTES];
        getrandom::getrandom(&mut bytes).map_err(|_| EncodingError)?;
        Ok(Self { bytes })
    }

    pub(crate) fn as_bytes(&self) -> &[u8; AES256_KEY_BYTES] {
        &self.bytes
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterSecret")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Wrap `secret` under the master secret.
pub fn wrap(master: &MasterSecret, secret: &[u8]) -> Result<String, EncodingError> {
    let sealed = aead::seal_aes256(master.as_bytes(), secret, WRAP_AAD)?;

    let mut out = Vec::with_capacity(NONCE_BYTES + TAG_BYTES + sealed.ciphertext.len());
    out.extend_from_slice(&sealed.nonce);
    out.extend_from_slice(&sealed.tag);
    out.extend_from_slice(&sealed.ciphertext);
    Ok(STANDARD.encode(out))
}

/// Unwrap a blob produced by [`wrap`]. The result zeroizes on drop.
pub fn unwrap(master: &MasterSecret, wrapped: &str) -> Result<Zeroizing<Vec<u8>>, DecryptionError> {
    let raw = STANDARD.decode(wrapped.trim()).map_err(|_| DecryptionError)?;
    if raw.len() < NONCE_BYTES + TAG_BYTES {
        return Err(DecryptionError);
    }

    let (nonce, rest) = raw.split_at(NONCE_BYTES);
    let (tag, ciphertext) = rest.split_at(TAG_BYTES);
    let nonce: &[u8; NONCE_BYTES] = nonce.try_into().map_err(|_| DecryptionError)?;
    let tag: &[u8; TAG_BYTES] = tag.try_into().map_err(|_| DecryptionError)?;

    aead::open_aes256(master.as_bytes(), nonce, tag, ciphertext, WRAP_AAD).map(Zeroizing::new)
}
