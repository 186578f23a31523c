//! Payload formats (v1)
//!
//! Symmetric:
//!   base64( nonce[12] || tag[16] || ct[N] )
//!
//! Asymmetric (JSON):
//!   {"v":1,"alg":"RSA-2048-OAEP","rsa_key_id":7,"ct":"<b64>"}
//!
//! Hybrid (JSON, each binary field base64 on its own):
//!   {"v":1,"alg":"HYBRID-RSA2048-OAEP-AES128-GCM","rsa_key_id":7,
//!    "ek":"<b64>","iv":"<b64>","tag":"<b64>","ct":"<b64>"}
//!
//! Symmetric decode failures all report the same reason. Structured payloads
//! name the structural problem (missing field, bad version) but never anything
//! learned from key material.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use fieldvault_envelope::aead::{NONCE_BYTES, TAG_BYTES};
use fieldvault_envelope::Sealed;
use fieldvault_keystore::KeyId;

use crate::algorithm::Algorithm;
use crate::error::{FieldError, Result, REJECTED};

/// Version written into every structured payload.
pub const PAYLOAD_VERSION: u32 = 1;

/// Minimum decoded symmetric payload: nonce + tag, empty ciphertext.
pub const SYMMETRIC_MIN_BYTES: usize = NONCE_BYTES + TAG_BYTES; // 28

/// `RSA-2048-OAEP` for a 2048-bit key.
pub fn rsa_alg_name(bits: usize) -> String {
    format!("RSA-{bits}-OAEP")
}

/// `HYBRID-RSA2048-OAEP-AES128-GCM` for a 2048-bit key.
pub fn hybrid_alg_name(bits: usize) -> String {
    format!("HYBRID-RSA{bits}-OAEP-AES128-GCM")
}

fn malformed(reason: &'static str) -> FieldError {
    FieldError::Decryption(reason)
}

fn b64_field(value: &str, reason: &'static str) -> Result<Vec<u8>> {
    STANDARD.decode(value).map_err(|_| malformed(reason))
}

fn require<T>(value: Option<T>, reason: &'static str) -> Result<T> {
    value.ok_or_else(|| malformed(reason))
}

fn check_version(v: u32) -> Result<()> {
    if v != PAYLOAD_VERSION {
        return Err(malformed("unsupported payload version"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Symmetric
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymmetricPayload {
    pub nonce: [u8; NONCE_BYTES],
    pub tag: [u8; TAG_BYTES],
    pub ciphertext: Vec<u8>,
}

impl From<Sealed> for SymmetricPayload {
    fn from(s: Sealed) -> Self {
        Self {
            nonce: s.nonce,
            tag: s.tag,
            ciphertext: s.ciphertext,
        }
    }
}

impl SymmetricPayload {
    pub fn encode(&self) -> String {
        let mut out = Vec::with_capacity(SYMMETRIC_MIN_BYTES + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.tag);
        out.extend_from_slice(&self.ciphertext);
        STANDARD.encode(out)
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let raw = STANDARD
            .decode(encoded.trim())
            .map_err(|_| malformed(REJECTED))?;
        if raw.len() < SYMMETRIC_MIN_BYTES {
            return Err(malformed(REJECTED));
        }

        let (nonce, rest) = raw.split_at(NONCE_BYTES);
        let (tag, ciphertext) = rest.split_at(TAG_BYTES);
        Ok(Self {
            nonce: nonce.try_into().map_err(|_| malformed(REJECTED))?,
            tag: tag.try_into().map_err(|_| malformed(REJECTED))?,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

// ---------------------------------------------------------------------------
// Asymmetric
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RsaPayload {
    pub v: u32,
    pub alg: String,
    pub rsa_key_id: i64,
    /// base64 OAEP ciphertext.
    pub ct: String,
}

#[derive(Deserialize)]
struct RawRsaPayload {
    v: Option<u32>,
    alg: Option<String>,
    rsa_key_id: Option<i64>,
    ct: Option<String>,
}

impl RsaPayload {
    pub fn new(bits: usize, key_id: KeyId, ciphertext: &[u8]) -> Self {
        Self {
            v: PAYLOAD_VERSION,
            alg: rsa_alg_name(bits),
            rsa_key_id: key_id.get(),
            ct: STANDARD.encode(ciphertext),
        }
    }

    pub fn key_id(&self) -> KeyId {
        KeyId::new(self.rsa_key_id)
    }

    pub fn ciphertext(&self) -> Result<Vec<u8>> {
        b64_field(&self.ct, "invalid base64 in `ct`")
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|_| FieldError::Encryption("payload serialization failed"))
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let raw: RawRsaPayload =
            serde_json::from_str(encoded).map_err(|_| malformed("malformed payload"))?;
        let payload = Self {
            v: require(raw.v, "missing field `v`")?,
            alg: require(raw.alg, "missing field `alg`")?,
            rsa_key_id: require(raw.rsa_key_id, "missing field `rsa_key_id`")?,
            ct: require(raw.ct, "missing field `ct`")?,
        };
        check_version(payload.v)?;
        if !(payload.alg.starts_with("RSA-") && payload.alg.ends_with("-OAEP")) {
            return Err(malformed("algorithm mismatch"));
        }
        Ok(payload)
    }
}

// ---------------------------------------------------------------------------
// Hybrid
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HybridPayload {
    pub v: u32,
    pub alg: String,
    pub rsa_key_id: i64,
    /// base64 OAEP-wrapped ephemeral AES key.
    pub ek: String,
    /// base64 nonce.
    pub iv: String,
    /// base64 GCM tag.
    pub tag: String,
    /// base64 body ciphertext.
    pub ct: String,
}

#[derive(Deserialize)]
struct RawHybridPayload {
    v: Option<u32>,
    alg: Option<String>,
    rsa_key_id: Option<i64>,
    ek: Option<String>,
    iv: Option<String>,
    tag: Option<String>,
    ct: Option<String>,
}

impl HybridPayload {
    pub fn new(bits: usize, key_id: KeyId, wrapped_key: &[u8], body: &Sealed) -> Self {
        Self {
            v: PAYLOAD_VERSION,
            alg: hybrid_alg_name(bits),
            rsa_key_id: key_id.get(),
            ek: STANDARD.encode(wrapped_key),
            iv: STANDARD.encode(body.nonce),
            tag: STANDARD.encode(body.tag),
            ct: STANDARD.encode(&body.ciphertext),
        }
    }

    pub fn key_id(&self) -> KeyId {
        KeyId::new(self.rsa_key_id)
    }

    pub fn wrapped_key(&self) -> Result<Vec<u8>> {
        b64_field(&self.ek, "invalid base64 in `ek`")
    }

    pub fn nonce(&self) -> Result<[u8; NONCE_BYTES]> {
        b64_field(&self.iv, "invalid base64 in `iv`")?
            .try_into()
            .map_err(|_| malformed("invalid `iv` length"))
    }

    pub fn tag(&self) -> Result<[u8; TAG_BYTES]> {
        b64_field(&self.tag, "invalid base64 in `tag`")?
            .try_into()
            .map_err(|_| malformed("invalid `tag` length"))
    }

    pub fn ciphertext(&self) -> Result<Vec<u8>> {
        b64_field(&self.ct, "invalid base64 in `ct`")
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|_| FieldError::Encryption("payload serialization failed"))
    }

    /// Parse and check that every field is present, reporting the first missing one.
    pub fn decode(encoded: &str) -> Result<Self> {
        let raw: RawHybridPayload =
            serde_json::from_str(encoded).map_err(|_| malformed("malformed payload"))?;
        let payload = Self {
            v: require(raw.v, "missing field `v`")?,
            alg: require(raw.alg, "missing field `alg`")?,
            rsa_key_id: require(raw.rsa_key_id, "missing field `rsa_key_id`")?,
            ek: require(raw.ek, "missing field `ek`")?,
            iv: require(raw.iv, "missing field `iv`")?,
            tag: require(raw.tag, "missing field `tag`")?,
            ct: require(raw.ct, "missing field `ct`")?,
        };
        check_version(payload.v)?;
        if !payload.alg.starts_with("HYBRID-") {
            return Err(malformed("algorithm mismatch"));
        }
        Ok(payload)
    }
}

// ---------------------------------------------------------------------------
// Tagged payload
// ---------------------------------------------------------------------------

/// A parsed stored value, one variant per cipher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    Symmetric(SymmetricPayload),
    Asymmetric(RsaPayload),
    Hybrid(HybridPayload),
}

impl Payload {
    pub fn parse(algorithm: Algorithm, encoded: &str) -> Result<Self> {
        Ok(match algorithm {
            Algorithm::Aes => Payload::Symmetric(SymmetricPayload::decode(encoded)?),
            Algorithm::Rsa => Payload::Asymmetric(RsaPayload::decode(encoded)?),
            Algorithm::Hybrid => Payload::Hybrid(HybridPayload::decode(encoded)?),
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Payload::Symmetric(_) => Algorithm::Aes,
            Payload::Asymmetric(_) => Algorithm::Rsa,
            Payload::Hybrid(_) => Algorithm::Hybrid,
        }
    }

    /// Registry key referenced by the payload, if any.
    pub fn key_id(&self) -> Option<KeyId> {
        match self {
            Payload::Symmetric(_) => None,
            Payload::Asymmetric(p) => Some(p.key_id()),
            Payload::Hybrid(p) => Some(p.key_id()),
        }
    }
}
