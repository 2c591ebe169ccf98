//! SQLite-backed state store.
//!
//! Provides persistent storage for:
//! - The key-value records shared with the extension (timer state, history,
//!   current queue, last forced pull-back)
//! - Named one-shot alarms, so a pending phase end survives restarts

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::broadcast;

use super::{data_dir, StateStore, StoreChange, WATCH_CAPACITY};
use crate::error::StoreError;
use crate::timer::{Alarm, AlarmSlot};

/// SQLite database holding the state store and the alarm table.
///
/// Change notifications only cover writes made through this handle; other
/// processes sharing the file are not observed.
pub struct Database {
    conn: Connection,
    changes: broadcast::Sender<StoreChange>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data dir>/pomoguard.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory is unusable or the database
    /// cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let dir = data_dir().map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        Self::open_at(dir.join("pomoguard.db"))
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for tests and throwaway sessions).
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(std::time::Duration::from_secs(2))?;
        let (changes, _) = broadcast::channel(WATCH_CAPACITY);
        let db = Self { conn, changes };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS alarms (
                name    TEXT PRIMARY KEY,
                fire_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_alarms_fire_at ON alarms(fire_at);",
        )?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Delete a kv entry. Returns whether a row was removed.
    pub fn kv_delete(&self, key: &str) -> Result<bool, rusqlite::Error> {
        let n = self
            .conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(n > 0)
    }

    fn notify(&self, key: &str) {
        let _ = self.changes.send(StoreChange {
            key: key.to_string(),
        });
    }
}

impl StateStore for Database {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.kv_get(key)?)
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.kv_set(key, value)?;
        self.notify(key);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        if self.kv_delete(key)? {
            self.notify(key);
        }
        Ok(())
    }

    fn watch(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

impl AlarmSlot for Database {
    fn create(&self, alarm: Alarm) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO alarms (name, fire_at) VALUES (?1, ?2)",
            params![alarm.name, alarm.when],
        )?;
        Ok(())
    }

    fn clear(&self, name: &str) -> Result<bool, StoreError> {
        let n = self
            .conn
            .execute("DELETE FROM alarms WHERE name = ?1", params![name])?;
        Ok(n > 0)
    }

    fn get(&self, name: &str) -> Result<Option<Alarm>, StoreError> {
        let alarm = self
            .conn
            .query_row(
                "SELECT name, fire_at FROM alarms WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Alarm {
                        name: row.get(0)?,
                        when: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(alarm)
    }

    fn all(&self) -> Result<Vec<Alarm>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, fire_at FROM alarms ORDER BY fire_at")?;
        let rows = stmt.query_map([], |row| {
            Ok(Alarm {
                name: row.get(0)?,
                when: row.get(1)?,
            })
        })?;
        let mut alarms = Vec::new();
        for row in rows {
            alarms.push(row?);
        }
        Ok(alarms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::PHASE_ALARM;

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        assert!(db.kv_delete("test").unwrap());
        assert!(!db.kv_delete("test").unwrap());
    }

    #[test]
    fn alarm_create_replaces_same_name() {
        let db = Database::open_memory().unwrap();
        db.create(Alarm {
            name: PHASE_ALARM.into(),
            when: 10,
        })
        .unwrap();
        db.create(Alarm {
            name: PHASE_ALARM.into(),
            when: 20,
        })
        .unwrap();
        let all = db.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].when, 20);
        assert!(db.clear(PHASE_ALARM).unwrap());
        assert!(db.get(PHASE_ALARM).unwrap().is_none());
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.set_raw("pomodoroState", r#"{"phase":"focus"}"#).unwrap();
            db.create(Alarm {
                name: PHASE_ALARM.into(),
                when: 1_500_000,
            })
            .unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(
            db.get_raw("pomodoroState").unwrap().as_deref(),
            Some(r#"{"phase":"focus"}"#)
        );
        assert_eq!(db.get(PHASE_ALARM).unwrap().map(|a| a.when), Some(1_500_000));
    }

    #[test]
    fn watch_reports_writes_and_removals() {
        let db = Database::open_memory().unwrap();
        let mut rx = db.watch();
        db.set_raw("a", "1").unwrap();
        db.remove("a").unwrap();
        db.remove("a").unwrap();
        assert_eq!(rx.try_recv().unwrap().key, "a");
        assert_eq!(rx.try_recv().unwrap().key, "a");
        assert!(rx.try_recv().is_err());
    }
}
