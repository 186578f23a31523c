//! Process-local cache of the active key record and unwrapped private keys.
//!
//! Owned by a single [`KeyRegistry`](crate::KeyRegistry). Nothing here is ever
//! persisted or serialized; a restart starts cold. Storage stays authoritative
//! for status: the registry re-reads a key's row before handing out anything
//! cached for it, so another process rotating or revoking keys is seen on the
//! next call.

use fieldvault_envelope::SecretKey;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::types::{CryptoKey, KeyId};

#[derive(Default)]
struct CacheState {
    active: Option<CryptoKey>,
    secrets: HashMap<KeyId, Arc<SecretKey>>,
}

#[derive(Default)]
pub struct KeyCache {
    state: RwLock<CacheState>,
}

impl KeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<CryptoKey> {
        self.state.read().ok()?.active.clone()
    }

    /// Record `key` as the active key unless a newer one is already cached.
    ///
    /// Ids only grow, so a lookup that raced a rotation cannot put the
    /// demoted key back. Returns whether the snapshot was installed.
    pub fn observe_active(&self, key: CryptoKey) -> bool {
        let Ok(mut state) = self.state.write() else {
            return false;
        };
        if state.active.as_ref().is_some_and(|current| current.id > key.id) {
            return false;
        }
        state.active = Some(key);
        true
    }

    /// Storage reports no active key.
    pub fn clear_active(&self) {
        if let Ok(mut state) = self.state.write() {
            state.active = None;
        }
    }

    pub fn secret(&self, id: KeyId) -> Option<Arc<SecretKey>> {
        self.state.read().ok()?.secrets.get(&id).cloned()
    }

    pub fn put_secret(&self, id: KeyId, secret: Arc<SecretKey>) {
        if let Ok(mut state) = self.state.write() {
            state.secrets.insert(id, secret);
        }
    }

    /// Forget a single key (e.g. after revocation).
    pub fn evict(&self, id: KeyId) {
        if let Ok(mut state) = self.state.write() {
            state.secrets.remove(&id);
            if state.active.as_ref().map(|k| k.id) == Some(id) {
                state.active = None;
            }
        }
    }

    /// Drop everything.
    pub fn invalidate(&self) {
        if let Ok(mut state) = self.state.write() {
            state.active = None;
            state.secrets.clear();
        }
    }

    pub fn cached_secret_count(&self) -> usize {
        self.state.read().map(|s| s.secrets.len()).unwrap_or(0)
    }
}

impl fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active = self.active().map(|k| k.id);
        f.debug_struct("KeyCache")
            .field("active", &active)
            .field("secrets", &format_args!("[{} REDACTED]", self.cached_secret_count()))
            .finish()
    }
}
