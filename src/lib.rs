//! # Field Vault
//!
//! Field-level encryption for sensitive columns, with a staged move from
//! plaintext to ciphertext-only storage.
//!
//! Three ciphers sit behind one router:
//!
//! | Tag      | Construction                                  | Key                     |
//! |----------|-----------------------------------------------|-------------------------|
//! | `AES`    | AES-128-GCM                                   | static configured key   |
//! | `RSA`    | RSA-OAEP(SHA-256), short values only          | active registry key     |
//! | `HYBRID` | AES-128-GCM body, data key wrapped by RSA-OAEP | active registry key     |
//!
//! The tag is stored next to each ciphertext and selects the decryptor on
//! read. RSA and HYBRID payloads name the registry key they were written
//! under, so rotation never breaks old rows.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use fieldvault::{Algorithm, FieldGroup, FieldPolicy, FieldRouter, PolicyHandle};
//! use fieldvault_envelope::MasterSecret;
//! use fieldvault_keystore::KeyRegistry;
//!
//! let registry = Arc::new(KeyRegistry::in_memory(MasterSecret::generate().unwrap()));
//! registry.generate_keypair("payroll", "RSA", 1024).unwrap();
//!
//! let policy = PolicyHandle::new(FieldPolicy::default().with_write_algorithm(Algorithm::Hybrid));
//! let router = FieldRouter::builder(policy).registry(registry).build();
//!
//! let value = router.encrypt_for_write("12345678901").unwrap();
//! let read = router
//!     .read_value(FieldGroup::Pii, Some(&value.payload), None, Some(value.algorithm.tag()))
//!     .unwrap();
//! assert_eq!(read.as_deref(), Some("12345678901"));
//! ```

#![deny(unsafe_code)]

pub mod algorithm;
pub mod cipher;
pub mod config;
mod error;
pub mod field;
pub mod migrate;
pub mod payload;
pub mod policy;
mod router;

pub use algorithm::{aes_key_ref, hybrid_key_ref, rsa_key_ref, Algorithm};
pub use cipher::{AsymmetricCipher, EncryptedValue, FieldCipher, HybridCipher, SymmetricCipher};
pub use config::{LogFormat, Settings};
pub use error::{FieldError, Result};
pub use field::{EncryptedField, FieldStorage};
pub use migrate::{encrypt_legacy, reencrypt, FieldRow, MigrationReport};
pub use policy::{FieldGroup, FieldPolicy, PolicyHandle, StorageMode};
pub use router::{FieldRouter, FieldRouterBuilder};

pub use fieldvault_keystore::{KeyId, KeyRegistry, KeyStatus};
