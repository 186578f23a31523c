//! Envelope: a fresh AES-128-GCM key per value, wrapped by RSA-OAEP.
//!
//! Encrypt:
//!   1. active key from the registry
//!   2. ephemeral 128-bit key + fresh 96-bit nonce
//!   3. AES-128-GCM over the value
//!   4. OAEP-wrap the ephemeral key
//!   5. bundle {v, alg, rsa_key_id, ek, iv, tag, ct}

use std::sync::Arc;

use zeroize::Zeroizing;

use fieldvault_envelope::aead::{self, AES128_KEY_BYTES};
use fieldvault_envelope::oaep;
use fieldvault_keystore::KeyRegistry;

use super::{active_public_key, into_utf8, resolve_secret, EncryptedValue, FieldCipher};
use crate::algorithm::{hybrid_key_ref, Algorithm};
use crate::error::{FieldError, Result, REJECTED};
use crate::payload::HybridPayload;

#[derive(Clone, Debug)]
pub struct HybridCipher {
    registry: Arc<KeyRegistry>,
}

impl HybridCipher {
    pub fn new(registry: Arc<KeyRegistry>) -> Self {
        Self { registry }
    }

    pub fn decrypt_payload(&self, payload: &HybridPayload) -> Result<String> {
        let sk = resolve_secret(&self.registry, payload.key_id())?;

        let wrapped = payload.wrapped_key()?;
        let nonce = payload.nonce()?;
        let tag = payload.tag()?;
        let ct = payload.ciphertext()?;

        let recovered = oaep::decrypt(&sk, &wrapped)?;
        let data_key: Zeroizing<[u8; AES128_KEY_BYTES]> = Zeroizing::new(
            recovered
                .as_slice()
                .try_into()
                .map_err(|_| FieldError::Decryption(REJECTED))?,
        );

        let pt = aead::open_aes128(&data_key, &nonce, &tag, &ct, b"")?;
        into_utf8(pt)
    }
}

impl FieldCipher for HybridCipher {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Hybrid
    }

    fn encrypt(&self, plaintext: &str) -> Result<EncryptedValue> {
        let (key, pk) = active_public_key(&self.registry)?;

        let data_key = aead::generate_key128()?;
        let body = aead::seal_aes128(&data_key, plaintext.as_bytes(), b"")?;
        let wrapped = oaep::encrypt(&pk, data_key.as_slice())?;

        let bits = pk.bits();
        Ok(EncryptedValue {
            payload: HybridPayload::new(bits, key.id, &wrapped, &body).encode()?,
            algorithm: Algorithm::Hybrid,
            key_ref: hybrid_key_ref(bits, key.id),
        })
    }

    fn decrypt(&self, payload: &str) -> Result<String> {
        self.decrypt_payload(&HybridPayload::decode(payload)?)
    }
}
