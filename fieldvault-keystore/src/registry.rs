//! Key registry: generation, rotation, lookup and private key unwrapping.

use crate::audit::{AuditAction, AuditEvent, AuditSink, TracingAuditSink};
use crate::cache::KeyCache;
use crate::error::{KeystoreError, Result};
use crate::storage::{InMemoryBackend, StorageBackend};
use crate::types::{rsa_algorithm_name, CryptoKey, KeyId, KeyStatus, NewKey};

use chrono::Utc;
use fieldvault_envelope::{oaep, wrap, MasterSecret, PublicKey, SecretKey};
use std::sync::Arc;

const TRACING_TARGET: &str = "fieldvault_keystore::registry";

/// Owns the set of RSA keypairs and enforces the single-active-key rule.
///
/// Private keys are persisted only wrapped under the master secret. Unwrapped
/// keys live in the registry's own [`KeyCache`] and nowhere else.
pub struct KeyRegistry {
    storage: Arc<dyn StorageBackend>,
    audit: Arc<dyn AuditSink>,
    master: MasterSecret,
    cache: KeyCache,
    actor: String,
}

impl KeyRegistry {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        audit: Arc<dyn AuditSink>,
        master: MasterSecret,
    ) -> Self {
        Self {
            storage,
            audit,
            master,
            cache: KeyCache::new(),
            actor: "system".into(),
        }
    }

    /// Name recorded as the actor on every audit event from this registry.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    fn record(&self, event: AuditEvent) {
        self.audit.record(event.with_actor(self.actor.as_str()));
    }

    /// Ephemeral registry with in-memory storage and tracing audit.
    pub fn in_memory(master: MasterSecret) -> Self {
        Self::new(
            Arc::new(InMemoryBackend::new()),
            Arc::new(TracingAuditSink),
            master,
        )
    }

    // -----------------------------------------------------------------------
    // Generation / rotation
    // -----------------------------------------------------------------------

    /// Generate a keypair and make it the active key.
    ///
    /// Every previously active key becomes `rotated` in the same storage unit
    /// that inserts the new one.
    pub fn generate_keypair(&self, name: &str, algorithm: &str, bits: usize) -> Result<CryptoKey> {
        if !algorithm.eq_ignore_ascii_case("RSA") {
            return Err(KeystoreError::KeyGeneration(format!(
                "unsupported algorithm: {algorithm}"
            )));
        }

        let (pk, sk) = oaep::keygen(bits)
            .map_err(|_| KeystoreError::KeyGeneration(format!("RSA-{bits} keygen failed")))?;
        let public_key_pem = pk
            .to_pem()
            .map_err(|_| KeystoreError::KeyGeneration("public key encoding failed".into()))?;
        let private_pem = sk
            .to_pem()
            .map_err(|_| KeystoreError::KeyGeneration("private key encoding failed".into()))?;
        let wrapped_private_key = wrap::wrap(&self.master, private_pem.as_bytes())
            .map_err(|_| KeystoreError::KeyGeneration("private key wrapping failed".into()))?;

        let demoted = self.storage.list_by_status(KeyStatus::Active)?;
        let key = self.storage.insert_active(NewKey {
            name: name.to_owned(),
            algorithm: rsa_algorithm_name(bits),
            public_key_pem,
            wrapped_private_key,
            created_at: Utc::now(),
        })?;

        self.cache.observe_active(key.clone());
        self.cache.put_secret(key.id, Arc::new(sk));

        self.record(AuditEvent::key_event(
            key.id,
            KeyStatus::Active,
            AuditAction::KeyGenerated {
                algorithm: key.algorithm.clone(),
            },
        ));
        for old in &demoted {
            self.record(AuditEvent::key_event(
                old.id,
                KeyStatus::Rotated,
                AuditAction::KeyRotated { successor: key.id },
            ));
        }

        tracing::info!(
            target: TRACING_TARGET,
            key_id = %key.id,
            algorithm = %key.algorithm,
            rotated = demoted.len(),
            "generated active key"
        );
        Ok(key)
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// The single active key, read from storage on every call.
    pub fn get_active_key(&self) -> Result<CryptoKey> {
        let active = self
            .storage
            .list_by_status(KeyStatus::Active)?
            .into_iter()
            .max_by_key(|k| k.id);
        match active {
            Some(key) => {
                self.cache.observe_active(key.clone());
                Ok(key)
            }
            None => {
                self.cache.clear_active();
                Err(KeystoreError::NoActiveKey)
            }
        }
    }

    /// Any key by id, whatever its status.
    pub fn get_key_by_id(&self, id: KeyId) -> Result<CryptoKey> {
        let key = self.storage.get(id)?.ok_or(KeystoreError::KeyNotFound(id))?;
        if !key.status.can_decrypt() {
            self.cache.evict(id);
        }
        Ok(key)
    }

    pub fn list_keys(&self) -> Result<Vec<CryptoKey>> {
        self.storage.list()
    }

    /// Parse the stored public key of `key`.
    pub fn public_key(&self, key: &CryptoKey) -> Result<PublicKey> {
        PublicKey::from_pem(&key.public_key_pem).map_err(|_| {
            KeystoreError::Storage(format!("public key of {} is not valid PEM", key.id))
        })
    }

    // -----------------------------------------------------------------------
    // Unwrapping
    // -----------------------------------------------------------------------

    /// Decrypt the stored private key of `key` with the master secret.
    ///
    /// The key's current row is re-read first, so a record fetched before a
    /// revocation cannot be used to get around it. Revoked keys are refused
    /// and evicted. Results are cached until invalidation.
    pub fn unwrap_private_key(&self, key: &CryptoKey) -> Result<Arc<SecretKey>> {
        let key = &self.get_key_by_id(key.id)?;
        if !key.status.can_decrypt() {
            tracing::warn!(target: TRACING_TARGET, key_id = %key.id, "refused unwrap of revoked key");
            self.record(
                AuditEvent::key_event(key.id, key.status, AuditAction::PrivateKeyUnwrapped)
                    .with_failure()
                    .with_detail("key revoked"),
            );
            return Err(KeystoreError::KeyRevoked(key.id));
        }
        if let Some(secret) = self.cache.secret(key.id) {
            return Ok(secret);
        }

        let unwrapped = match self.unwrap_uncached(key) {
            Ok(secret) => secret,
            Err(e) => {
                tracing::warn!(target: TRACING_TARGET, key_id = %key.id, "private key unwrap failed");
                self.record(
                    AuditEvent::key_event(key.id, key.status, AuditAction::PrivateKeyUnwrapped)
                        .with_failure()
                        .with_detail("wrapped private key did not open under the master secret"),
                );
                return Err(e);
            }
        };

        let secret = Arc::new(unwrapped);
        self.cache.put_secret(key.id, Arc::clone(&secret));
        self.record(AuditEvent::key_event(
            key.id,
            key.status,
            AuditAction::PrivateKeyUnwrapped,
        ));
        tracing::debug!(target: TRACING_TARGET, key_id = %key.id, "private key unwrapped");
        Ok(secret)
    }

    fn unwrap_uncached(&self, key: &CryptoKey) -> Result<SecretKey> {
        let pem = wrap::unwrap(&self.master, &key.wrapped_private_key)
            .map_err(|_| KeystoreError::KeyUnwrap(key.id))?;
        let pem = std::str::from_utf8(&pem).map_err(|_| KeystoreError::KeyUnwrap(key.id))?;
        SecretKey::from_pem(pem).map_err(|_| KeystoreError::KeyUnwrap(key.id))
    }

    // -----------------------------------------------------------------------
    // Revocation / cache control
    // -----------------------------------------------------------------------

    /// Revoke a key. Revoking the active key leaves the registry without one.
    pub fn revoke(&self, id: KeyId, reason: Option<&str>) -> Result<CryptoKey> {
        let key = self.storage.set_status(id, KeyStatus::Revoked, reason)?;
        self.cache.evict(id);

        self.record(AuditEvent::key_event(
            id,
            KeyStatus::Revoked,
            AuditAction::KeyRevoked {
                reason: reason.map(str::to_owned),
            },
        ));
        tracing::warn!(target: TRACING_TARGET, key_id = %id, reason = ?reason, "key revoked");
        Ok(key)
    }

    /// Drop the active snapshot and every unwrapped private key.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
        self.record(AuditEvent::system_event(AuditAction::CacheInvalidated));
    }

    pub fn cache(&self) -> &KeyCache {
        &self.cache
    }
}

impl std::fmt::Debug for KeyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRegistry")
            .field("actor", &self.actor)
            .field("master", &self.master)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
