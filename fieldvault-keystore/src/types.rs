//! Core types: KeyId, KeyStatus, CryptoKey, NewKey.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Key identifiers
// ---------------------------------------------------------------------------

/// Surrogate registry id. Assigned by the storage backend, positive and monotonic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(i64);

impl KeyId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for KeyId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Key lifecycle state machine
// ---------------------------------------------------------------------------

/// Key lifecycle status.
///
/// ```text
/// ACTIVE → ROTATED
///   │         │
///   └──→ REVOKED ←┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    /// The single key used for new writes. Can encrypt and decrypt.
    Active,
    /// Superseded by a newer key. Still decrypts historical payloads.
    Rotated,
    /// Withdrawn. Can neither encrypt nor decrypt.
    Revoked,
}

impl KeyStatus {
    pub fn can_encrypt(&self) -> bool {
        matches!(self, KeyStatus::Active)
    }

    pub fn can_decrypt(&self) -> bool {
        matches!(self, KeyStatus::Active | KeyStatus::Rotated)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> &[KeyStatus] {
        match self {
            KeyStatus::Active => &[KeyStatus::Rotated, KeyStatus::Revoked],
            KeyStatus::Rotated => &[KeyStatus::Revoked],
            KeyStatus::Revoked => &[],
        }
    }

    pub fn can_transition_to(&self, target: KeyStatus) -> bool {
        self.valid_transitions().contains(&target)
    }

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStatus::Active => "active",
            KeyStatus::Rotated => "rotated",
            KeyStatus::Revoked => "revoked",
        }
    }
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(KeyStatus::Active),
            "rotated" => Ok(KeyStatus::Rotated),
            "revoked" => Ok(KeyStatus::Revoked),
            other => Err(format!("unknown key status: {other}")),
        }
    }
}

/// Algorithm label stored on each record, e.g. `RSA-2048`.
pub fn rsa_algorithm_name(bits: usize) -> String {
    format!("RSA-{bits}")
}

// ---------------------------------------------------------------------------
// Key record
// ---------------------------------------------------------------------------

/// A registry record for one RSA keypair.
///
/// The private key is only ever held here in wrapped form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoKey {
    pub id: KeyId,
    /// Human-readable name.
    pub name: String,
    /// Algorithm label, e.g. `RSA-2048`.
    pub algorithm: String,
    /// SPKI PEM, stored in clear.
    pub public_key_pem: String,
    /// PKCS#8 PEM wrapped under the master secret.
    pub wrapped_private_key: String,
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revocation_reason: Option<String>,
}

impl CryptoKey {
    /// Modulus size parsed back out of the algorithm label.
    pub fn bits(&self) -> Option<usize> {
        self.algorithm.strip_prefix("RSA-")?.parse().ok()
    }
}

/// A key about to be inserted. The backend assigns the id.
#[derive(Clone, Debug)]
pub struct NewKey {
    pub name: String,
    pub algorithm: String,
    pub public_key_pem: String,
    pub wrapped_private_key: String,
    pub created_at: DateTime<Utc>,
}

impl NewKey {
    pub(crate) fn into_active(self, id: KeyId) -> CryptoKey {
        CryptoKey {
            id,
            name: self.name,
            algorithm: self.algorithm,
            public_key_pem: self.public_key_pem,
            wrapped_private_key: self.wrapped_private_key,
            status: KeyStatus::Active,
            created_at: self.created_at,
            updated_at: self.created_at,
            rotated_at: None,
            revoked_at: None,
            revocation_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions() {
        assert!(KeyStatus::Active.can_transition_to(KeyStatus::Rotated));
        assert!(KeyStatus::Rotated.can_transition_to(KeyStatus::Revoked));
        assert!(!KeyStatus::Rotated.can_transition_to(KeyStatus::Active));
        assert!(!KeyStatus::Revoked.can_decrypt());
        assert!(KeyStatus::Rotated.can_decrypt());
        assert!(!KeyStatus::Rotated.can_encrypt());
    }

    #[test]
    fn status_string_form() {
        for s in [KeyStatus::Active, KeyStatus::Rotated, KeyStatus::Revoked] {
            assert_eq!(s.as_str().parse::<KeyStatus>().unwrap(), s);
        }
        assert!("expired".parse::<KeyStatus>().is_err());
    }

    #[test]
    fn bits_from_algorithm() {
        let key = NewKey {
            name: "k".into(),
            algorithm: rsa_algorithm_name(2048),
            public_key_pem: String::new(),
            wrapped_private_key: String::new(),
            created_at: Utc::now(),
        }
        .into_active(KeyId::new(1));
        assert_eq!(key.bits(), Some(2048));
    }
}
