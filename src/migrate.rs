//! Batch operations over stored rows.
//!
//! Each row is handled on its own: a failure is recorded in the report and
//! the batch moves on.

use crate::field::EncryptedField;
use crate::policy::{FieldGroup, StorageMode};
use crate::router::FieldRouter;

const TRACING_TARGET: &str = "fieldvault::migrate";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldRow {
    pub id: i64,
    pub field: EncryptedField,
}

impl FieldRow {
    pub fn new(id: i64, field: EncryptedField) -> Self {
        Self { id, field }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub migrated: usize,
    pub skipped: usize,
    /// Row id and error kind. Never contains values.
    pub failed: Vec<(i64, String)>,
}

impl MigrationReport {
    pub fn total(&self) -> usize {
        self.migrated + self.skipped + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Encrypt rows from their plaintext mirror.
///
/// In transition mode only rows without ciphertext are encrypted. In
/// cipher-only mode every row with a mirror is re-encrypted from it and the
/// mirror is cleared. Rows with an empty or absent mirror are skipped.
pub fn encrypt_legacy(
    router: &FieldRouter,
    group: FieldGroup,
    rows: &mut [FieldRow],
) -> MigrationReport {
    let mut report = MigrationReport::default();
    let clear_mirror = router.storage_mode(group) == StorageMode::CipherOnly;

    for row in rows.iter_mut() {
        let plaintext = match row.field.plaintext.as_deref() {
            Some(p) if !p.is_empty() && (clear_mirror || !row.field.is_encrypted()) => p,
            _ => {
                report.skipped += 1;
                continue;
            }
        };

        match router.encrypt_for_write(plaintext) {
            Ok(encrypted) => {
                row.field.ciphertext = Some(encrypted.payload);
                row.field.algorithm = Some(encrypted.algorithm);
                row.field.key_ref = Some(encrypted.key_ref);
                if clear_mirror {
                    row.field.plaintext = None;
                }
                report.migrated += 1;
            }
            Err(e) => {
                tracing::warn!(target: TRACING_TARGET, row = row.id, kind = e.kind(), "legacy encrypt failed");
                report.failed.push((row.id, e.kind().to_owned()));
            }
        }
    }

    tracing::info!(
        target: TRACING_TARGET,
        ?group,
        migrated = report.migrated,
        skipped = report.skipped,
        failed = report.failed.len(),
        "legacy encryption finished"
    );
    report
}

/// Re-encrypt stored ciphertexts under the current write algorithm and key.
///
/// Rows without ciphertext, or already written under the current key
/// identifier, are skipped. The plaintext mirror is not touched.
pub fn reencrypt(router: &FieldRouter, rows: &mut [FieldRow]) -> MigrationReport {
    let mut report = MigrationReport::default();
    let current = router.current_key_ref().ok();

    for row in rows.iter_mut() {
        let ciphertext = match row.field.ciphertext.as_deref() {
            Some(c) if !c.is_empty() => c,
            _ => {
                report.skipped += 1;
                continue;
            }
        };
        if current.is_some() && row.field.key_ref == current {
            report.skipped += 1;
            continue;
        }

        let result = router
            .decrypt_strict(row.field.tag(), ciphertext)
            .and_then(|plaintext| router.encrypt_for_write(&plaintext));

        match result {
            Ok(encrypted) => {
                row.field.ciphertext = Some(encrypted.payload);
                row.field.algorithm = Some(encrypted.algorithm);
                row.field.key_ref = Some(encrypted.key_ref);
                report.migrated += 1;
            }
            Err(e) => {
                tracing::warn!(target: TRACING_TARGET, row = row.id, kind = e.kind(), "re-encrypt failed");
                report.failed.push((row.id, e.kind().to_owned()));
            }
        }
    }

    tracing::info!(
        target: TRACING_TARGET,
        migrated = report.migrated,
        skipped = report.skipped,
        failed = report.failed.len(),
        "re-encryption finished"
    );
    report
}
