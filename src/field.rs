//! One encrypted column together with its plaintext mirror.

use std::fmt;

use crate::algorithm::Algorithm;
use crate::error::Result;
use crate::policy::{FieldGroup, StorageMode};
use crate::router::FieldRouter;

/// The stored shape of a sensitive column: the optional plaintext mirror,
/// the ciphertext and the metadata written next to it.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EncryptedField {
    pub plaintext: Option<String>,
    pub ciphertext: Option<String>,
    pub algorithm: Option<Algorithm>,
    pub key_ref: Option<String>,
}

impl EncryptedField {
    /// A row written before encryption existed: mirror only.
    pub fn legacy(plaintext: impl Into<String>) -> Self {
        Self {
            plaintext: Some(plaintext.into()),
            ..Self::default()
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.ciphertext.as_deref().is_some_and(|c| !c.is_empty())
    }

    pub fn has_plaintext(&self) -> bool {
        self.plaintext.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Stored tag as the router expects it.
    pub fn tag(&self) -> Option<&'static str> {
        self.algorithm.map(|a| a.tag())
    }
}

impl fmt::Debug for EncryptedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedField")
            .field("plaintext", &self.plaintext.as_ref().map(|_| "[REDACTED]"))
            .field("ciphertext_len", &self.ciphertext.as_ref().map(String::len))
            .field("algorithm", &self.algorithm)
            .field("key_ref", &self.key_ref)
            .finish()
    }
}

/// Reads and writes one field group through a router.
#[derive(Clone, Copy, Debug)]
pub struct FieldStorage<'a> {
    router: &'a FieldRouter,
    group: FieldGroup,
}

impl<'a> FieldStorage<'a> {
    pub fn new(router: &'a FieldRouter, group: FieldGroup) -> Self {
        Self { router, group }
    }

    pub fn group(&self) -> FieldGroup {
        self.group
    }

    /// Encrypt `value` under the current write algorithm. In cipher-only mode
    /// the mirror is left empty. `None` writes an empty field.
    pub fn write(&self, value: Option<&str>) -> Result<EncryptedField> {
        let Some(value) = value else {
            return Ok(EncryptedField::default());
        };

        let encrypted = self.router.encrypt_for_write(value)?;
        let plaintext = match self.router.storage_mode(self.group) {
            StorageMode::Transition => Some(value.to_owned()),
            StorageMode::CipherOnly => None,
        };

        Ok(EncryptedField {
            plaintext,
            ciphertext: Some(encrypted.payload),
            algorithm: Some(encrypted.algorithm),
            key_ref: Some(encrypted.key_ref),
        })
    }

    pub fn read(&self, field: &EncryptedField) -> Result<Option<String>> {
        self.router.read_value(
            self.group,
            field.ciphertext.as_deref(),
            field.plaintext.as_deref(),
            field.tag(),
        )
    }

    pub fn read_safe(&self, field: &EncryptedField) -> Option<String> {
        self.router.read_value_safe(
            self.group,
            field.ciphertext.as_deref(),
            field.plaintext.as_deref(),
            field.tag(),
        )
    }
}
