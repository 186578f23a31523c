//! AES-128-GCM under a static configured key.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use zeroize::Zeroizing;

use fieldvault_envelope::aead::{self, AES128_KEY_BYTES};

use super::{into_utf8, EncryptedValue, FieldCipher};
use crate::algorithm::{aes_key_ref, Algorithm};
use crate::error::{FieldError, Result};
use crate::payload::SymmetricPayload;

/// Optional prefix accepted on configured key strings.
const BASE64_PREFIX: &str = "base64:";

pub struct SymmetricCipher {
    key: Zeroizing<[u8; AES128_KEY_BYTES]>,
    key_ref: String,
}

impl SymmetricCipher {
    /// Build from raw key bytes. Anything but exactly 16 bytes is refused.
    pub fn new(key: &[u8]) -> Result<Self> {
        let key: [u8; AES128_KEY_BYTES] = key
            .try_into()
            .map_err(|_| FieldError::InvalidKeyConfiguration("key must be exactly 16 bytes"))?;
        Ok(Self {
            key_ref: aes_key_ref(&key),
            key: Zeroizing::new(key),
        })
    }

    /// Build from configured text: base64, optionally `base64:`-prefixed.
    pub fn from_config(value: &str) -> Result<Self> {
        let value = value.trim();
        let encoded = value.strip_prefix(BASE64_PREFIX).unwrap_or(value);
        if encoded.is_empty() {
            return Err(FieldError::InvalidKeyConfiguration("key is empty"));
        }
        let raw = Zeroizing::new(
            STANDARD
                .decode(encoded)
                .map_err(|_| FieldError::InvalidKeyConfiguration("key is not valid base64"))?,
        );
        Self::new(&raw)
    }

    /// `aes128:<12 hex chars>`, stable for a given key.
    pub fn key_ref(&self) -> &str {
        &self.key_ref
    }

    pub fn encrypt_payload(&self, plaintext: &str) -> Result<SymmetricPayload> {
        let sealed = aead::seal_aes128(&self.key, plaintext.as_bytes(), b"")
            .map_err(|_| FieldError::Encryption("AEAD seal failed"))?;
        Ok(sealed.into())
    }

    pub fn decrypt_payload(&self, payload: &SymmetricPayload) -> Result<String> {
        let bytes = aead::open_aes128(
            &self.key,
            &payload.nonce,
            &payload.tag,
            &payload.ciphertext,
            b"",
        )?;
        into_utf8(bytes)
    }
}

impl FieldCipher for SymmetricCipher {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Aes
    }

    fn encrypt(&self, plaintext: &str) -> Result<EncryptedValue> {
        Ok(EncryptedValue {
            payload: self.encrypt_payload(plaintext)?.encode(),
            algorithm: Algorithm::Aes,
            key_ref: self.key_ref.clone(),
        })
    }

    fn decrypt(&self, payload: &str) -> Result<String> {
        self.decrypt_payload(&SymmetricPayload::decode(payload)?)
    }
}

impl fmt::Debug for SymmetricCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricCipher")
            .field("key", &"[REDACTED]")
            .field("key_ref", &self.key_ref)
            .finish()
    }
}
