//! Storage backends: where key records live.

use crate::error::{KeystoreError, Result};
use crate::types::{CryptoKey, KeyId, KeyStatus, NewKey};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, RwLock};

// ---------------------------------------------------------------------------
// Storage trait
// ---------------------------------------------------------------------------

/// Backend for persisting key records.
///
/// `insert_active` is the rotation primitive: demoting the current active key
/// and inserting the new one must happen as one unit, so no reader ever sees
/// zero or two active keys.
pub trait StorageBackend: Send + Sync {
    fn get(&self, id: KeyId) -> Result<Option<CryptoKey>>;
    /// All records, ordered by id.
    fn list(&self) -> Result<Vec<CryptoKey>>;
    fn list_by_status(&self, status: KeyStatus) -> Result<Vec<CryptoKey>>;
    /// Mark every active key `rotated`, then insert `key` as the active one.
    fn insert_active(&self, key: NewKey) -> Result<CryptoKey>;
    /// Move a key along its lifecycle. Rejects transitions the status machine forbids.
    fn set_status(&self, id: KeyId, status: KeyStatus, reason: Option<&str>) -> Result<CryptoKey>;
}

/// Apply a status change to a record in place, stamping the matching timestamp.
fn apply_transition(
    key: &mut CryptoKey,
    to: KeyStatus,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    if !key.status.can_transition_to(to) {
        return Err(KeystoreError::InvalidTransition {
            id: key.id,
            from: key.status,
            to,
        });
    }
    key.status = to;
    key.updated_at = now;
    match to {
        KeyStatus::Rotated => key.rotated_at = Some(now),
        KeyStatus::Revoked => {
            key.revoked_at = Some(now);
            key.revocation_reason = reason.map(str::to_owned);
        }
        KeyStatus::Active => {}
    }
    Ok(())
}

fn poisoned<T>(_: T) -> KeystoreError {
    KeystoreError::Storage("lock poisoned".into())
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    keys: BTreeMap<KeyId, CryptoKey>,
    last_id: i64,
}

/// In-memory storage (for testing and ephemeral use).
///
/// One write lock covers a whole rotation.
#[derive(Default)]
pub struct InMemoryBackend {
    state: RwLock<MemoryState>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for InMemoryBackend {
    fn get(&self, id: KeyId) -> Result<Option<CryptoKey>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.keys.get(&id).cloned())
    }

    fn list(&self) -> Result<Vec<CryptoKey>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.keys.values().cloned().collect())
    }

    fn list_by_status(&self, status: KeyStatus) -> Result<Vec<CryptoKey>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .keys
            .values()
            .filter(|k| k.status == status)
            .cloned()
            .collect())
    }

    fn insert_active(&self, key: NewKey) -> Result<CryptoKey> {
        let mut state = self.state.write().map_err(poisoned)?;
        let now = key.created_at;
        for existing in state.keys.values_mut() {
            if existing.status == KeyStatus::Active {
                apply_transition(existing, KeyStatus::Rotated, None, now)?;
            }
        }
        state.last_id += 1;
        let id = KeyId::new(state.last_id);
        let record = key.into_active(id);
        state.keys.insert(id, record.clone());
        Ok(record)
    }

    fn set_status(&self, id: KeyId, status: KeyStatus, reason: Option<&str>) -> Result<CryptoKey> {
        let mut state = self.state.write().map_err(poisoned)?;
        let key = state
            .keys
            .get_mut(&id)
            .ok_or(KeystoreError::KeyNotFound(id))?;
        apply_transition(key, status, reason, Utc::now())?;
        Ok(key.clone())
    }
}

// ---------------------------------------------------------------------------
// SQLite backend
// ---------------------------------------------------------------------------

/// The partial unique index lets the database itself refuse a second active row.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS crypto_keys (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    name                  TEXT NOT NULL,
    algorithm             TEXT NOT NULL,
    public_key            TEXT NOT NULL,
    private_key_encrypted TEXT NOT NULL,
    status                TEXT NOT NULL CHECK (status IN ('active', 'rotated', 'revoked')),
    created_at            TEXT NOT NULL,
    updated_at            TEXT NOT NULL,
    rotated_at            TEXT,
    revoked_at            TEXT,
    revocation_reason     TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS crypto_keys_single_active
    ON crypto_keys (status) WHERE status = 'active';
";

const SELECT_COLUMNS: &str = "id, name, algorithm, public_key, private_key_encrypted, status, \
     created_at, updated_at, rotated_at, revoked_at, revocation_reason";

/// SQLite-backed `crypto_keys` table.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open (creating if needed) the registry database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn query(&self, filter: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<CryptoKey>> {
        let conn = self.conn.lock().map_err(poisoned)?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM crypto_keys {filter} ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(args, row_to_key)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn row_to_key(row: &Row<'_>) -> rusqlite::Result<CryptoKey> {
    let status: String = row.get(5)?;
    let status = status
        .parse::<KeyStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, e.into()))?;
    Ok(CryptoKey {
        id: KeyId::new(row.get(0)?),
        name: row.get(1)?,
        algorithm: row.get(2)?,
        public_key_pem: row.get(3)?,
        wrapped_private_key: row.get(4)?,
        status,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        rotated_at: row.get(8)?,
        revoked_at: row.get(9)?,
        revocation_reason: row.get(10)?,
    })
}

impl StorageBackend for SqliteBackend {
    fn get(&self, id: KeyId) -> Result<Option<CryptoKey>> {
        let conn = self.conn.lock().map_err(poisoned)?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM crypto_keys WHERE id = ?1");
        Ok(conn
            .query_row(&sql, params![id.get()], row_to_key)
            .optional()?)
    }

    fn list(&self) -> Result<Vec<CryptoKey>> {
        self.query("", &[])
    }

    fn list_by_status(&self, status: KeyStatus) -> Result<Vec<CryptoKey>> {
        self.query("WHERE status = ?1", &[&status.as_str()])
    }

    fn insert_active(&self, key: NewKey) -> Result<CryptoKey> {
        let mut conn = self.conn.lock().map_err(poisoned)?;
        let tx = conn.transaction()?;
        let now = key.created_at;

        tx.execute(
            "UPDATE crypto_keys SET status = 'rotated', rotated_at = ?1, updated_at = ?1
             WHERE status = 'active'",
            params![now],
        )?;
        tx.execute(
            "INSERT INTO crypto_keys
                (name, algorithm, public_key, private_key_encrypted, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'active', ?5, ?5)",
            params![
                key.name,
                key.algorithm,
                key.public_key_pem,
                key.wrapped_private_key,
                now
            ],
        )?;
        let id = KeyId::new(tx.last_insert_rowid());
        tx.commit()?;

        Ok(key.into_active(id))
    }

    fn set_status(&self, id: KeyId, status: KeyStatus, reason: Option<&str>) -> Result<CryptoKey> {
        let mut conn = self.conn.lock().map_err(poisoned)?;
        let tx = conn.transaction()?;

        let sql = format!("SELECT {SELECT_COLUMNS} FROM crypto_keys WHERE id = ?1");
        let mut key = tx
            .query_row(&sql, params![id.get()], row_to_key)
            .optional()?
            .ok_or(KeystoreError::KeyNotFound(id))?;
        apply_transition(&mut key, status, reason, Utc::now())?;

        tx.execute(
            "UPDATE crypto_keys
             SET status = ?2, updated_at = ?3, rotated_at = ?4, revoked_at = ?5, revocation_reason = ?6
             WHERE id = ?1",
            params![
                id.get(),
                key.status.as_str(),
                key.updated_at,
                key.rotated_at,
                key.revoked_at,
                key.revocation_reason
            ],
        )?;
        tx.commit()?;
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_key(name: &str) -> NewKey {
        NewKey {
            name: name.into(),
            algorithm: "RSA-2048".into(),
            public_key_pem: format!("pub-{name}"),
            wrapped_private_key: format!("wrapped-{name}"),
            created_at: Utc::now(),
        }
    }

    fn exercise(backend: &dyn StorageBackend) {
        let k1 = backend.insert_active(new_key("k1")).unwrap();
        let k2 = backend.insert_active(new_key("k2")).unwrap();
        assert!(k2.id > k1.id);

        let active = backend.list_by_status(KeyStatus::Active).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, k2.id);

        let old = backend.get(k1.id).unwrap().unwrap();
        assert_eq!(old.status, KeyStatus::Rotated);
        assert!(old.rotated_at.is_some());

        let revoked = backend
            .set_status(k1.id, KeyStatus::Revoked, Some("compromised"))
            .unwrap();
        assert_eq!(revoked.revocation_reason.as_deref(), Some("compromised"));
        assert_eq!(
            backend.get(k1.id).unwrap().unwrap().status,
            KeyStatus::Revoked
        );

        let err = backend
            .set_status(k1.id, KeyStatus::Active, None)
            .unwrap_err();
        assert!(matches!(err, KeystoreError::InvalidTransition { .. }));

        assert!(backend.get(KeyId::new(999)).unwrap().is_none());
        assert!(matches!(
            backend.set_status(KeyId::new(999), KeyStatus::Revoked, None),
            Err(KeystoreError::KeyNotFound(_))
        ));

        let ids: Vec<_> = backend.list().unwrap().iter().map(|k| k.id).collect();
        assert_eq!(ids, vec![k1.id, k2.id]);
    }

    #[test]
    fn in_memory_backend_lifecycle() {
        exercise(&InMemoryBackend::new());
    }

    #[test]
    fn sqlite_backend_lifecycle() {
        exercise(&SqliteBackend::open_in_memory().unwrap());
    }

    #[test]
    fn sqlite_index_rejects_second_active_row() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend.insert_active(new_key("k1")).unwrap();
        let conn = backend.conn.lock().unwrap();
        let res = conn.execute(
            "INSERT INTO crypto_keys
                (name, algorithm, public_key, private_key_encrypted, status, created_at, updated_at)
             VALUES ('x', 'RSA-2048', 'p', 'w', 'active', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
            [],
        );
        assert!(res.is_err());
    }
}
