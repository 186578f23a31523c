//! # Field Vault Envelope
//!
//! Cryptographic primitives for field-level envelope encryption.
//!
//! ## Quick Start
//!
//! ```rust
//! use fieldvault_envelope::{aead, oaep};
//!
//! let (pk, sk) = oaep::keygen(1024).unwrap();
//!
//! // Envelope: seal the value under a fresh data key, wrap the data key under RSA.
//! let data_key = aead::generate_key128().unwrap();
//! let sealed = aead::seal_aes128(&data_key, b"secret", b"").unwrap();
//! let wrapped_key = oaep::encrypt(&pk, data_key.as_slice()).unwrap();
//!
//! let recovered = oaep::decrypt(&sk, &wrapped_key).unwrap();
//! let key: [u8; 16] = recovered.as_slice().try_into().unwrap();
//! let plaintext = aead::open_aes128(&key, &sealed.nonce, &sealed.tag, &sealed.ciphertext, b"").unwrap();
//! assert_eq!(plaintext, b"secret");
//! ```
//!
//! ## Security Properties
//!
//! - **Uniform errors**: every open/decrypt failure is the same `DecryptionError`
//! - **Fresh randomness**: nonces and data keys come from the OS RNG on every call
//! - **Wrapped at rest**: private keys are only persisted under the master secret
//!
//! ## What's NOT Provided
//!
//! - Key management (see `fieldvault-keystore`)
//! - Payload formats (see `fieldvault`)
//! - Streaming encryption

#![deny(unsafe_code)]

pub mod aead;
mod error;
pub mod oaep;
pub mod wrap;

pub use aead::Sealed;
pub use error::{DecryptionError, EncodingError};
pub use oaep::{PublicKey, SecretKey};
pub use wrap::MasterSecret;
