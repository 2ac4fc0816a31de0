/// Shared key-value store backing the execution gate.
///
/// The gate needs Redis-shaped primitives: get, set-with-expiry, increment,
/// and expire. Two implementations:
///
///   MemoryStore — process-local, for single-instance deployments and tests.
///   SqliteStore — durable, `rusqlite` with the `bundled` feature so SQLite
///                 is compiled in; counters survive a restart.
///
/// Store operations never surface errors to the engine: a store hiccup is
/// logged and degrades to a miss (get) or a no-op (writes). A rule firing
/// once too often beats an event abandoned over a counter read.
use rusqlite::{params, Connection, OpenFlags};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock seconds since the Unix epoch. The gate takes `now` as a
/// parameter for testability; production callers pass this.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// KvStore
// ---------------------------------------------------------------------------

/// `ttl_secs` of 0 means "no expiry" everywhere below.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str, ttl_secs: u64);
    /// Increment the integer at `key` (missing or expired → 1) and return
    /// the new count. Keeps any existing expiry.
    fn incr(&self, key: &str) -> i64;
    fn expire(&self, key: &str, ttl_secs: u64);
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

struct Entry {
    value:      String,
    expires_at: Option<u64>,
}

impl Entry {
    fn expired(&self, now: u64) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let now = now_secs();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(e) if e.expired(now) => {
                entries.remove(key);
                None
            }
            Some(e) => Some(e.value.clone()),
            None => None,
        }
    }

    fn set(&self, key: &str, value: &str, ttl_secs: u64) {
        let expires_at = (ttl_secs > 0).then(|| now_secs() + ttl_secs);
        self.lock().insert(
            key.to_owned(),
            Entry { value: value.to_owned(), expires_at },
        );
    }

    fn incr(&self, key: &str) -> i64 {
        let now = now_secs();
        let mut entries = self.lock();
        let (count, expires_at) = match entries.get(key) {
            Some(e) if !e.expired(now) => {
                (e.value.parse::<i64>().unwrap_or(0) + 1, e.expires_at)
            }
            _ => (1, None),
        };
        entries.insert(
            key.to_owned(),
            Entry { value: count.to_string(), expires_at },
        );
        count
    }

    fn expire(&self, key: &str, ttl_secs: u64) {
        let mut entries = self.lock();
        if let Some(e) = entries.get_mut(key) {
            e.expires_at = (ttl_secs > 0).then(|| now_secs() + ttl_secs);
        }
    }
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        apply_schema(&conn)?;
        tracing::info!("Gate store opened at {:?}", db_path);
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Ephemeral store for tests and trial runs.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_with_flags(
            ":memory:",
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        apply_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn apply_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous  = NORMAL;

        CREATE TABLE IF NOT EXISTS gate_kv (
            key        TEXT PRIMARY KEY,
            value      TEXT NOT NULL,
            expires_at INTEGER
        );
    ",
    )?;
    Ok(())
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> Option<String> {
        let now = now_secs() as i64;
        let conn = self.lock();
        // Expired rows are reaped lazily, on read.
        if let Err(e) = conn.execute(
            "DELETE FROM gate_kv WHERE key = ?1 AND expires_at IS NOT NULL AND expires_at <= ?2",
            params![key, now],
        ) {
            tracing::warn!("Gate store reap error for '{}': {}", key, e);
            return None;
        }
        match conn.query_row(
            "SELECT value FROM gate_kv WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        ) {
            Ok(value) => Some(value),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => {
                tracing::warn!("Gate store read error for '{}': {}", key, e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str, ttl_secs: u64) {
        let expires_at = (ttl_secs > 0).then(|| (now_secs() + ttl_secs) as i64);
        if let Err(e) = self.lock().execute(
            "INSERT INTO gate_kv (key, value, expires_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(key) DO UPDATE SET value = ?2, expires_at = ?3",
            params![key, value, expires_at],
        ) {
            tracing::warn!("Gate store write error for '{}': {}", key, e);
        }
    }

    fn incr(&self, key: &str) -> i64 {
        let now = now_secs() as i64;
        let conn = self.lock();
        let current: Option<(String, Option<i64>)> = conn
            .query_row(
                "SELECT value, expires_at FROM gate_kv WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .ok();

        let (count, expires_at) = match current {
            Some((_, Some(at))) if at <= now => (1, None),
            Some((value, at)) => (value.parse::<i64>().unwrap_or(0) + 1, at),
            None => (1, None),
        };

        if let Err(e) = conn.execute(
            "INSERT INTO gate_kv (key, value, expires_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(key) DO UPDATE SET value = ?2, expires_at = ?3",
            params![key, count.to_string(), expires_at],
        ) {
            tracing::warn!("Gate store incr error for '{}': {}", key, e);
        }
        count
    }

    fn expire(&self, key: &str, ttl_secs: u64) {
        let expires_at = (ttl_secs > 0).then(|| (now_secs() + ttl_secs) as i64);
        if let Err(e) = self.lock().execute(
            "UPDATE gate_kv SET expires_at = ?2 WHERE key = ?1",
            params![key, expires_at],
        ) {
            tracing::warn!("Gate store expire error for '{}': {}", key, e);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn exercise_store(store: &dyn KvStore) {
        assert_eq!(store.get("missing"), None);

        store.set("ts", "1700000000", 60);
        assert_eq!(store.get("ts").as_deref(), Some("1700000000"));

        assert_eq!(store.incr("count"), 1);
        assert_eq!(store.incr("count"), 2);
        assert_eq!(store.incr("count"), 3);
        store.expire("count", 60);
        assert_eq!(store.get("count").as_deref(), Some("3"));
    }

    #[test]
    fn memory_store_basics() {
        exercise_store(&MemoryStore::new());
    }

    #[test]
    fn sqlite_store_basics() {
        exercise_store(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn sqlite_store_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gate.sqlite");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("k", "v", 0);
            assert_eq!(store.incr("n"), 1);
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));
        assert_eq!(store.incr("n"), 2);
    }

    #[test]
    fn expired_entries_read_as_missing() {
        // ttl already elapsed: write an entry whose expiry is in the past by
        // going through set with a 1s ttl, then simulating the passage of
        // time via a direct expiry rewrite.
        let store = MemoryStore::new();
        store.set("gone", "x", 1);
        {
            let mut entries = store.lock();
            entries.get_mut("gone").unwrap().expires_at = Some(now_secs() - 1);
        }
        assert_eq!(store.get("gone"), None);
        // incr on an expired counter restarts at 1
        store.set("c", "5", 1);
        {
            let mut entries = store.lock();
            entries.get_mut("c").unwrap().expires_at = Some(now_secs() - 1);
        }
        assert_eq!(store.incr("c"), 1);
    }

    #[test]
    fn zero_ttl_means_no_expiry() {
        let store = MemoryStore::new();
        store.set("forever", "x", 0);
        assert_eq!(store.get("forever").as_deref(), Some("x"));
    }
}
