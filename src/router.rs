//! Algorithm router and read-mode controller.
//!
//! Writes go to the cipher named by the current policy. Reads dispatch on the
//! algorithm tag stored with the row and honour the field group's storage mode:
//!
//! ```text
//!                  mirror non-empty     mirror empty
//! TRANSITION       return mirror        decrypt ciphertext (absent -> None)
//! CIPHER_ONLY      decrypt ciphertext   decrypt ciphertext (absent -> None)
//! ```
//!
//! Policy is read from the [`PolicyHandle`] on every call.

use std::sync::Arc;

use fieldvault_keystore::KeyRegistry;

use crate::algorithm::{hybrid_key_ref, rsa_key_ref, Algorithm};
use crate::cipher::{AsymmetricCipher, EncryptedValue, FieldCipher, HybridCipher, SymmetricCipher};
use crate::error::{FieldError, Result};
use crate::payload::Payload;
use crate::policy::{FieldGroup, PolicyHandle, StorageMode};

const TRACING_TARGET: &str = "fieldvault::router";

#[derive(Debug)]
pub struct FieldRouter {
    policy: PolicyHandle,
    symmetric: Option<SymmetricCipher>,
    registry: Option<Arc<KeyRegistry>>,
    asymmetric: Option<AsymmetricCipher>,
    hybrid: Option<HybridCipher>,
}

#[derive(Debug)]
pub struct FieldRouterBuilder {
    policy: PolicyHandle,
    symmetric: Option<SymmetricCipher>,
    registry: Option<Arc<KeyRegistry>>,
}

impl FieldRouterBuilder {
    /// Static AES key. Without one, AES reads and writes fail with
    /// `InvalidKeyConfiguration`.
    pub fn symmetric(mut self, cipher: SymmetricCipher) -> Self {
        self.symmetric = Some(cipher);
        self
    }

    /// Key registry backing the RSA and HYBRID ciphers.
    pub fn registry(mut self, registry: Arc<KeyRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> FieldRouter {
        FieldRouter {
            policy: self.policy,
            symmetric: self.symmetric,
            asymmetric: self.registry.clone().map(AsymmetricCipher::new),
            hybrid: self.registry.clone().map(HybridCipher::new),
            registry: self.registry,
        }
    }
}

impl FieldRouter {
    pub fn builder(policy: PolicyHandle) -> FieldRouterBuilder {
        FieldRouterBuilder {
            policy,
            symmetric: None,
            registry: None,
        }
    }

    pub fn policy(&self) -> &PolicyHandle {
        &self.policy
    }

    pub fn registry(&self) -> Option<&Arc<KeyRegistry>> {
        self.registry.as_ref()
    }

    pub fn storage_mode(&self, group: FieldGroup) -> StorageMode {
        self.policy.get().mode_for(group)
    }

    pub fn write_algorithm(&self) -> Algorithm {
        self.policy.get().write_algorithm
    }

    // -----------------------------------------------------------------------
    // Cipher lookup
    // -----------------------------------------------------------------------

    fn symmetric(&self) -> Result<&SymmetricCipher> {
        self.symmetric
            .as_ref()
            .ok_or(FieldError::InvalidKeyConfiguration("no symmetric key configured"))
    }

    fn asymmetric(&self) -> Result<&AsymmetricCipher> {
        self.asymmetric
            .as_ref()
            .ok_or_else(|| FieldError::Config("key registry not configured".into()))
    }

    fn hybrid(&self) -> Result<&HybridCipher> {
        self.hybrid
            .as_ref()
            .ok_or_else(|| FieldError::Config("key registry not configured".into()))
    }

    pub fn cipher(&self, algorithm: Algorithm) -> Result<&dyn FieldCipher> {
        let cipher: &dyn FieldCipher = match algorithm {
            Algorithm::Aes => self.symmetric()?,
            Algorithm::Rsa => self.asymmetric()?,
            Algorithm::Hybrid => self.hybrid()?,
        };
        Ok(cipher)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Encrypt with the policy's current write algorithm.
    pub fn encrypt_for_write(&self, plaintext: &str) -> Result<EncryptedValue> {
        self.encrypt_with(self.write_algorithm(), plaintext)
    }

    pub fn encrypt_with(&self, algorithm: Algorithm, plaintext: &str) -> Result<EncryptedValue> {
        let value = self.cipher(algorithm)?.encrypt(plaintext)?;
        tracing::debug!(
            target: TRACING_TARGET,
            algorithm = %value.algorithm,
            key_ref = %value.key_ref,
            "encrypted field value"
        );
        Ok(value)
    }

    /// Key identifier a write would record right now, without encrypting.
    pub fn current_key_ref(&self) -> Result<String> {
        match self.write_algorithm() {
            Algorithm::Aes => Ok(self.symmetric()?.key_ref().to_owned()),
            alg => {
                let registry = self
                    .registry
                    .as_ref()
                    .ok_or_else(|| FieldError::Config("key registry not configured".into()))?;
                let key = registry.get_active_key()?;
                let bits = registry.public_key(&key)?.bits();
                Ok(if alg == Algorithm::Rsa {
                    rsa_key_ref(bits, key.id)
                } else {
                    hybrid_key_ref(bits, key.id)
                })
            }
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Decrypt a stored value. A missing tag means AES; an unknown one is
    /// `UnsupportedAlgorithm`. Every cipher error propagates unchanged.
    pub fn decrypt_strict(&self, tag: Option<&str>, payload: &str) -> Result<String> {
        let algorithm = Algorithm::from_stored_tag(tag)?;
        match Payload::parse(algorithm, payload)? {
            Payload::Symmetric(p) => self.symmetric()?.decrypt_payload(&p),
            Payload::Asymmetric(p) => self.asymmetric()?.decrypt_payload(&p),
            Payload::Hybrid(p) => self.hybrid()?.decrypt_payload(&p),
        }
    }

    /// [`decrypt_strict`](Self::decrypt_strict) with every error turned into `None`.
    pub fn decrypt_safe(&self, tag: Option<&str>, payload: &str) -> Option<String> {
        self.decrypt_strict(tag, payload)
            .map_err(|e| log_swallowed(&e, tag))
            .ok()
    }

    /// Resolve a field according to its group's storage mode.
    ///
    /// Returns `Ok(None)` when there is nothing to read. Decrypt failures
    /// propagate.
    pub fn read_value(
        &self,
        group: FieldGroup,
        ciphertext: Option<&str>,
        mirror: Option<&str>,
        tag: Option<&str>,
    ) -> Result<Option<String>> {
        let ciphertext = ciphertext.filter(|c| !c.is_empty());

        if self.storage_mode(group) == StorageMode::Transition {
            if let Some(mirror) = mirror.filter(|m| !m.is_empty()) {
                return Ok(Some(mirror.to_owned()));
            }
        }

        ciphertext
            .map(|payload| self.decrypt_strict(tag, payload))
            .transpose()
    }

    /// [`read_value`](Self::read_value) for display paths: any error becomes `None`.
    pub fn read_value_safe(
        &self,
        group: FieldGroup,
        ciphertext: Option<&str>,
        mirror: Option<&str>,
        tag: Option<&str>,
    ) -> Option<String> {
        self.read_value(group, ciphertext, mirror, tag)
            .unwrap_or_else(|e| {
                log_swallowed(&e, tag);
                None
            })
    }
}

fn log_swallowed(e: &FieldError, tag: Option<&str>) {
    tracing::warn!(
        target: TRACING_TARGET,
        kind = e.kind(),
        algorithm = tag.unwrap_or("AES"),
        "field decrypt failed, returning none"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::aes_key_ref;
    use crate::policy::FieldPolicy;

    fn aes_router(policy: FieldPolicy) -> FieldRouter {
        FieldRouter::builder(PolicyHandle::new(policy))
            .symmetric(SymmetricCipher::new(&[5u8; 16]).unwrap())
            .build()
    }

    #[test]
    fn transition_prefers_mirror() {
        let router = aes_router(FieldPolicy::default());
        let stale = router.encrypt_for_write("old").unwrap();
        let v = router
            .read_value(FieldGroup::Salary, Some(&stale.payload), Some("new"), Some("AES"))
            .unwrap();
        assert_eq!(v.as_deref(), Some("new"));

        // A mirror that would fail to decrypt is still returned without touching crypto.
        let v = router
            .read_value(FieldGroup::Salary, Some("garbage"), Some("new"), Some("DES"))
            .unwrap();
        assert_eq!(v.as_deref(), Some("new"));
    }

    #[test]
    fn transition_falls_back_to_ciphertext() {
        let router = aes_router(FieldPolicy::default());
        let enc = router.encrypt_for_write("4200000").unwrap();
        let v = router
            .read_value(FieldGroup::Pii, Some(&enc.payload), Some(""), None)
            .unwrap();
        assert_eq!(v.as_deref(), Some("4200000"));
    }

    #[test]
    fn cipher_only_ignores_mirror() {
        let policy = FieldPolicy::default().with_mode(FieldGroup::Salary, StorageMode::CipherOnly);
        let router = aes_router(policy);
        let enc = router.encrypt_for_write("real").unwrap();
        let v = router
            .read_value(FieldGroup::Salary, Some(&enc.payload), Some("stale"), Some("AES"))
            .unwrap();
        assert_eq!(v.as_deref(), Some("real"));

        // Other group still in transition.
        let v = router
            .read_value(FieldGroup::Pii, Some(&enc.payload), Some("stale"), Some("AES"))
            .unwrap();
        assert_eq!(v.as_deref(), Some("stale"));
    }

    #[test]
    fn absent_everything_is_none() {
        for mode in [StorageMode::Transition, StorageMode::CipherOnly] {
            let router = aes_router(FieldPolicy::default().with_mode(FieldGroup::Pii, mode));
            assert_eq!(router.read_value(FieldGroup::Pii, None, None, None).unwrap(), None);
            assert_eq!(
                router.read_value(FieldGroup::Pii, Some(""), Some(""), Some("HYBRID")).unwrap(),
                None
            );
        }
    }

    #[test]
    fn unknown_tag_strict_vs_safe() {
        let router = aes_router(FieldPolicy::default());
        let enc = router.encrypt_for_write("x").unwrap();
        assert!(matches!(
            router.decrypt_strict(Some("DES"), &enc.payload),
            Err(FieldError::UnsupportedAlgorithm(_))
        ));
        assert_eq!(router.decrypt_safe(Some("DES"), &enc.payload), None);
        assert_eq!(
            router.read_value_safe(FieldGroup::Salary, Some(&enc.payload), None, Some("DES")),
            None
        );
    }

    #[test]
    fn missing_ciphers_are_reported() {
        let router = FieldRouter::builder(PolicyHandle::default()).build();
        assert!(matches!(
            router.encrypt_for_write("x"),
            Err(FieldError::InvalidKeyConfiguration(_))
        ));
        assert!(matches!(
            router.encrypt_with(Algorithm::Hybrid, "x"),
            Err(FieldError::Config(_))
        ));
    }

    #[test]
    fn policy_is_read_per_call() {
        let router = aes_router(FieldPolicy::default());
        let enc = router.encrypt_for_write("v").unwrap();
        assert_eq!(
            router
                .read_value(FieldGroup::Pii, Some(&enc.payload), Some("m"), None)
                .unwrap()
                .as_deref(),
            Some("m")
        );
        router
            .policy()
            .update(|p| p.with_mode(FieldGroup::Pii, StorageMode::CipherOnly));
        assert_eq!(
            router
                .read_value(FieldGroup::Pii, Some(&enc.payload), Some("m"), None)
                .unwrap()
                .as_deref(),
            Some("v")
        );
    }

    #[test]
    fn aes_key_ref_matches_cipher() {
        let router = aes_router(FieldPolicy::default());
        let enc = router.encrypt_for_write("v").unwrap();
        assert_eq!(enc.key_ref, router.current_key_ref().unwrap());
        assert_eq!(enc.key_ref, aes_key_ref(&[5u8; 16]));
        assert_eq!(enc.algorithm, Algorithm::Aes);
    }
}
