//! Algorithm tags and the key identifier strings persisted beside each field.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use fieldvault_keystore::KeyId;

use crate::error::FieldError;

/// Which cipher produced (or will produce) a stored value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Algorithm {
    /// AES-128-GCM under the configured static key.
    #[default]
    Aes,
    /// RSA-OAEP directly under the active registry key.
    Rsa,
    /// Ephemeral AES-128-GCM key wrapped by RSA-OAEP.
    Hybrid,
}

impl Algorithm {
    /// The tag stored in the row's algorithm column.
    pub fn tag(&self) -> &'static str {
        match self {
            Algorithm::Aes => "AES",
            Algorithm::Rsa => "RSA",
            Algorithm::Hybrid => "HYBRID",
        }
    }

    /// Resolve a persisted tag. Untagged rows predate tagging and are AES.
    pub fn from_stored_tag(tag: Option<&str>) -> Result<Self, FieldError> {
        match tag.map(str::trim) {
            None | Some("") => Ok(Algorithm::Aes),
            Some(tag) => tag.parse(),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Algorithm {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AES" => Ok(Algorithm::Aes),
            "RSA" => Ok(Algorithm::Rsa),
            "HYBRID" => Ok(Algorithm::Hybrid),
            _ => Err(FieldError::UnsupportedAlgorithm(s.to_owned())),
        }
    }
}

/// Number of hex characters of the key digest kept in an AES key ref.
pub const AES_KEY_REF_HEX_CHARS: usize = 12;

/// `aes128:` followed by the first 12 hex chars of SHA-256(key).
pub fn aes_key_ref(key: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(key));
    format!("aes128:{}", &digest[..AES_KEY_REF_HEX_CHARS])
}

/// `rsa2048:<id>` for a 2048-bit key.
pub fn rsa_key_ref(bits: usize, id: KeyId) -> String {
    format!("rsa{bits}:{id}")
}

/// `hybrid:rsa2048:<id>` for a 2048-bit key.
pub fn hybrid_key_ref(bits: usize, id: KeyId) -> String {
    format!("hybrid:{}", rsa_key_ref(bits, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_roundtrip_and_reject_unknown() {
        for alg in [Algorithm::Aes, Algorithm::Rsa, Algorithm::Hybrid] {
            assert_eq!(alg.tag().parse::<Algorithm>().unwrap(), alg);
        }
        assert_eq!("hybrid".parse::<Algorithm>().unwrap(), Algorithm::Hybrid);
        assert!(matches!(
            "DES".parse::<Algorithm>(),
            Err(FieldError::UnsupportedAlgorithm(tag)) if tag == "DES"
        ));
    }

    #[test]
    fn untagged_rows_are_aes() {
        assert_eq!(Algorithm::from_stored_tag(None).unwrap(), Algorithm::Aes);
        assert_eq!(Algorithm::from_stored_tag(Some(" ")).unwrap(), Algorithm::Aes);
        assert!(Algorithm::from_stored_tag(Some("3DES")).is_err());
    }

    #[test]
    fn key_refs() {
        let r = aes_key_ref(&[0u8; 16]);
        assert!(r.starts_with("aes128:"));
        assert_eq!(r.len(), "aes128:".len() + 12);
        assert_eq!(r, aes_key_ref(&[0u8; 16]));
        assert_ne!(r, aes_key_ref(&[1u8; 16]));

        assert_eq!(rsa_key_ref(2048, KeyId::new(7)), "rsa2048:7");
        assert_eq!(hybrid_key_ref(2048, KeyId::new(7)), "hybrid:rsa2048:7");
    }

    #[test]
    fn serde_uses_tags() {
        assert_eq!(serde_json::to_string(&Algorithm::Hybrid).unwrap(), "\"HYBRID\"");
    }
}
