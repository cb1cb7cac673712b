// crates/mtp-sim/src/store/sqlite.rs

use super::{OverrideEntry, OverrideStore, format_timestamp, parse_timestamp};
use crate::error::StoreError;
use crate::identity::{CanonicalKey, normalize};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rusqlite::{Connection, params};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, RwLock};

/// Default database file, relative to the working directory.
pub const DEFAULT_DB_FILE: &str = "mtp_values.db";

const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS values_store(
      node_id TEXT PRIMARY KEY,
      value TEXT NOT NULL,
      updated_utc TEXT NOT NULL
    );";

// The WHERE clause keeps the row with the latest wall-clock timestamp.
const UPSERT: &str = "
    INSERT INTO values_store(node_id, value, updated_utc) VALUES(?1, ?2, ?3)
    ON CONFLICT(node_id) DO UPDATE SET value = excluded.value, updated_utc = excluded.updated_utc
    WHERE excluded.updated_utc >= values_store.updated_utc;";

const SELECT_ALL: &str = "SELECT node_id, value, updated_utc FROM values_store";

/// SQLite-backed override store.
///
/// All rows are cached in memory when the store opens; reads are served from the
/// cache so the tick loop never waits on database I/O. Writes go to SQLite first
/// and update the cache only once they are durable.
///
/// SQLite admits one writer at a time, so writes share a single connection and
/// are serialized across keys. Reads only take the cache lock and never wait on
/// a write in progress.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    cache: RwLock<HashMap<CanonicalKey, OverrideEntry>>,
}

impl SqliteStore {
    /// Opens (or creates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        let store = Self::with_connection(conn)?;
        info!(
            "[Store] Opened override store {} ({} entries)",
            path.display(),
            store.len()
        );
        Ok(store)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(CREATE_TABLE)?;
        let cache = load_all(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            cache: RwLock::new(cache),
        })
    }

    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn load_all(conn: &Connection) -> Result<HashMap<CanonicalKey, OverrideEntry>, StoreError> {
    let mut stmt = conn.prepare(SELECT_ALL)?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut cache = HashMap::new();
    for row in rows {
        let (node_id, value, updated) = row?;
        let updated_at = parse_timestamp(&updated).unwrap_or_else(|| {
            warn!(
                "[Store] Unreadable timestamp '{}' for '{}', treating as oldest",
                updated, node_id
            );
            DateTime::<Utc>::UNIX_EPOCH
        });
        // Rows are keyed by canonical keys already; normalizing again is a no-op
        // for them and repairs rows written by older tools.
        let key = normalize(&node_id);
        cache.insert(
            key.clone(),
            OverrideEntry {
                key,
                value,
                updated_at,
            },
        );
    }
    debug!("[Store] Loaded {} override rows", cache.len());
    Ok(cache)
}

impl OverrideStore for SqliteStore {
    fn upsert(&self, key: &CanonicalKey, value: &str) -> Result<(), StoreError> {
        let entry = OverrideEntry::new(key.clone(), value);
        {
            let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
            conn.execute(
                UPSERT,
                params![key.as_str(), value, format_timestamp(&entry.updated_at)],
            )?;
        }

        let mut cache = self.cache.write().map_err(|_| StoreError::Poisoned)?;
        match cache.get(key) {
            Some(existing) if !entry.supersedes(existing) => {}
            _ => {
                cache.insert(key.clone(), entry);
            }
        }
        Ok(())
    }

    fn entry(&self, key: &CanonicalKey) -> Result<Option<OverrideEntry>, StoreError> {
        let cache = self.cache.read().map_err(|_| StoreError::Poisoned)?;
        Ok(cache.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_upsert() {
        let store = SqliteStore::open_in_memory().unwrap();
        let key = CanonicalKey::from_raw("R0001");
        assert!(store.is_empty());

        store.upsert(&key, "42").unwrap();
        store.upsert(&key, "open").unwrap();

        let entry = store.entry(&key).unwrap().expect("entry stored");
        assert_eq!(entry.value, "open");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_overrides_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("values.db");
        let key = CanonicalKey::from_raw("NS2|String|R0001");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.upsert(&key, "42").unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.try_get(&key).unwrap().as_deref(), Some("42"));
        assert_eq!(
            reopened.try_get(&CanonicalKey::from_raw("R0001")).unwrap().as_deref(),
            Some("42")
        );
    }

    #[test]
    fn test_concurrent_writers_to_different_keys() {
        use std::sync::Arc;
        use std::thread;

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::open(dir.path().join("values.db")).unwrap());

        let writers: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let key = CanonicalKey::from_raw(&format!("R{i:04}"));
                    for n in 0..20 {
                        store.upsert(&key, &n.to_string()).unwrap();
                        assert!(store.entry(&key).unwrap().is_some());
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(store.len(), 8);
        for i in 0..8 {
            let key = CanonicalKey::from_raw(&format!("R{i:04}"));
            assert_eq!(store.try_get(&key).unwrap().as_deref(), Some("19"));
        }
    }

    #[test]
    fn test_table_schema_matches_persisted_format() {
        let store = SqliteStore::open_in_memory().unwrap();
        let key = CanonicalKey::from_raw("Temp");
        store.upsert(&key, "1.5").unwrap();

        let conn = store.conn.lock().unwrap();
        let (id, value, updated): (String, String, String) = conn
            .query_row(SELECT_ALL, [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .unwrap();
        assert_eq!(id, "ns=2;s=Temp");
        assert_eq!(value, "1.5");
        assert!(updated.ends_with('Z'), "timestamp must be UTC: {updated}");
        assert!(parse_timestamp(&updated).is_some());
    }
}
