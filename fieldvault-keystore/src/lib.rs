//! # Field Vault Keystore
//!
//! RSA key registry for field-level envelope encryption.
//!
//! Exactly one key is `active` at any time. Generating a key rotates the
//! previous active key to `rotated` in the same storage unit; rotated keys
//! keep decrypting historical payloads, revoked keys do not.
//!
//! ## Quick Start
//!
//! ```rust
//! use fieldvault_keystore::*;
//! use fieldvault_envelope::MasterSecret;
//! use std::sync::Arc;
//!
//! let registry = KeyRegistry::new(
//!     Arc::new(InMemoryBackend::new()),
//!     Arc::new(InMemoryAuditSink::new()),
//!     MasterSecret::generate().unwrap(),
//! );
//!
//! let k1 = registry.generate_keypair("payroll", "RSA", 1024).unwrap();
//! let k2 = registry.generate_keypair("payroll", "RSA", 1024).unwrap();
//!
//! assert_eq!(registry.get_active_key().unwrap().id, k2.id);
//! assert_eq!(registry.get_key_by_id(k1.id).unwrap().status, KeyStatus::Rotated);
//! ```

pub mod audit;
mod cache;
pub mod error;
mod registry;
pub mod storage;
pub mod types;

pub use audit::{AuditAction, AuditEvent, AuditSink, FileAuditSink, InMemoryAuditSink, TracingAuditSink};
pub use cache::KeyCache;
pub use error::{KeystoreError, Result};
pub use registry::KeyRegistry;
pub use storage::{InMemoryBackend, SqliteBackend, StorageBackend};
pub use types::{rsa_algorithm_name, CryptoKey, KeyId, KeyStatus, NewKey};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
