//! RSA-OAEP directly under the active registry key.
//!
//! Only short values fit: the plaintext is bounded by the modulus size minus
//! the OAEP overhead (190 bytes for RSA-2048).

use std::sync::Arc;

use fieldvault_envelope::oaep;
use fieldvault_keystore::KeyRegistry;

use super::{active_public_key, into_utf8, resolve_secret, EncryptedValue, FieldCipher};
use crate::algorithm::{rsa_key_ref, Algorithm};
use crate::error::{FieldError, Result};
use crate::payload::RsaPayload;

#[derive(Clone, Debug)]
pub struct AsymmetricCipher {
    registry: Arc<KeyRegistry>,
}

impl AsymmetricCipher {
    pub fn new(registry: Arc<KeyRegistry>) -> Self {
        Self { registry }
    }

    pub fn decrypt_payload(&self, payload: &RsaPayload) -> Result<String> {
        let sk = resolve_secret(&self.registry, payload.key_id())?;
        let ct = payload.ciphertext()?;
        let pt = oaep::decrypt(&sk, &ct)?;
        into_utf8(pt.to_vec())
    }
}

impl FieldCipher for AsymmetricCipher {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Rsa
    }

    fn encrypt(&self, plaintext: &str) -> Result<EncryptedValue> {
        let (key, pk) = active_public_key(&self.registry)?;
        if plaintext.len() > pk.max_message_len() {
            return Err(FieldError::Encryption(
                "plaintext exceeds the RSA-OAEP message bound",
            ));
        }
        let ct = oaep::encrypt(&pk, plaintext.as_bytes())?;
        let bits = pk.bits();
        Ok(EncryptedValue {
            payload: RsaPayload::new(bits, key.id, &ct).encode()?,
            algorithm: Algorithm::Rsa,
            key_ref: rsa_key_ref(bits, key.id),
        })
    }

    fn decrypt(&self, payload: &str) -> Result<String> {
        self.decrypt_payload(&RsaPayload::decode(payload)?)
    }
}
