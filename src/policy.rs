//! Runtime field policy: storage mode per field group and the write algorithm.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use crate::algorithm::Algorithm;
use crate::error::FieldError;

/// How a field group treats its plaintext mirror column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Plaintext and ciphertext coexist. Reads prefer a non-empty mirror.
    #[default]
    Transition,
    /// The mirror is never written and never read.
    CipherOnly,
}

impl StorageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMode::Transition => "transition",
            StorageMode::CipherOnly => "cipher_only",
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageMode {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transition" => Ok(StorageMode::Transition),
            "cipher_only" => Ok(StorageMode::CipherOnly),
            other => Err(FieldError::Config(format!("unknown storage mode: {other}"))),
        }
    }
}

/// Groups of sensitive columns that migrate independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldGroup {
    /// Salary figures, payroll amounts.
    Salary,
    /// National ids, bank accounts and other personal data.
    Pii,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPolicy {
    pub salary_mode: StorageMode,
    pub pii_mode: StorageMode,
    /// Cipher used for new writes.
    pub write_algorithm: Algorithm,
}

impl FieldPolicy {
    pub fn mode_for(&self, group: FieldGroup) -> StorageMode {
        match group {
            FieldGroup::Salary => self.salary_mode,
            FieldGroup::Pii => self.pii_mode,
        }
    }

    pub fn with_mode(mut self, group: FieldGroup, mode: StorageMode) -> Self {
        match group {
            FieldGroup::Salary => self.salary_mode = mode,
            FieldGroup::Pii => self.pii_mode = mode,
        }
        self
    }

    pub fn with_write_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.write_algorithm = algorithm;
        self
    }
}

/// Shared, swappable policy. Read on every router call.
#[derive(Clone, Debug, Default)]
pub struct PolicyHandle {
    inner: Arc<RwLock<FieldPolicy>>,
}

impl PolicyHandle {
    pub fn new(policy: FieldPolicy) -> Self {
        Self {
            inner: Arc::new(RwLock::new(policy)),
        }
    }

    /// Current snapshot. A poisoned lock still yields the last written policy.
    pub fn get(&self) -> FieldPolicy {
        match self.inner.read() {
            Ok(policy) => *policy,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set(&self, policy: FieldPolicy) {
        match self.inner.write() {
            Ok(mut current) => *current = policy,
            Err(poisoned) => *poisoned.into_inner() = policy,
        }
        tracing::info!(
            target: "fieldvault::policy",
            salary_mode = %policy.salary_mode,
            pii_mode = %policy.pii_mode,
            write_algorithm = %policy.write_algorithm,
            "field policy updated"
        );
    }

    /// Apply a change to the current policy.
    pub fn update(&self, f: impl FnOnce(FieldPolicy) -> FieldPolicy) {
        self.set(f(self.get()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_transition_and_aes() {
        let policy = FieldPolicy::default();
        assert_eq!(policy.mode_for(FieldGroup::Salary), StorageMode::Transition);
        assert_eq!(policy.mode_for(FieldGroup::Pii), StorageMode::Transition);
        assert_eq!(policy.write_algorithm, Algorithm::Aes);
    }

    #[test]
    fn mode_parsing_is_strict() {
        assert_eq!("cipher_only".parse::<StorageMode>().unwrap(), StorageMode::CipherOnly);
        assert_eq!(" TRANSITION ".parse::<StorageMode>().unwrap(), StorageMode::Transition);
        assert!(matches!(
            "plaintext".parse::<StorageMode>(),
            Err(FieldError::Config(_))
        ));
    }

    #[test]
    fn handle_shares_updates() {
        let handle = PolicyHandle::default();
        let clone = handle.clone();
        clone.update(|p| {
            p.with_mode(FieldGroup::Pii, StorageMode::CipherOnly)
                .with_write_algorithm(Algorithm::Hybrid)
        });
        let seen = handle.get();
        assert_eq!(seen.mode_for(FieldGroup::Pii), StorageMode::CipherOnly);
        assert_eq!(seen.mode_for(FieldGroup::Salary), StorageMode::Transition);
        assert_eq!(seen.write_algorithm, Algorithm::Hybrid);
    }

    #[test]
    fn policy_serde_shape() {
        let policy = FieldPolicy::default().with_write_algorithm(Algorithm::Rsa);
        let json = serde_json::to_value(policy).unwrap();
        assert_eq!(json["salary_mode"], "transition");
        assert_eq!(json["write_algorithm"], "RSA");
    }
}
