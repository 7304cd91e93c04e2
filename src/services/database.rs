use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tokio::task;

use super::session::{SessionStore, Snapshot, StoreOp, Update};

/// How long a writer waits for another process holding the write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed [`SessionStore`] so that a CLI session survives between
/// invocations. Holds one key/value table.
///
/// Several processes may open the same file. Transactions take the write
/// lock up front (`BEGIN IMMEDIATE`), so a read-modify-write never works
/// from values another process is about to replace.
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create data directory: {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open session store at {}", path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;

        Ok(db)
    }

    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(crate::config::state_dir()?.join(crate::config::STORE_FILE_NAME))
    }

    fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
        conn.lock().map_err(|_| anyhow!("Session store lock poisoned"))
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = Self::lock(&self.conn)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            );",
        )?;

        let version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE session_items (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                INSERT INTO schema_version (version) VALUES (1);",
            )?;
        }

        Ok(())
    }

    #[cfg(test)]
    pub async fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn.clone();
        task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            let mut stmt = conn.prepare("SELECT key FROM session_items ORDER BY key")?;
            let keys = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(keys)
        })
        .await?
    }
}

fn read_item(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM session_items WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

fn apply(conn: &Connection, op: &StoreOp) -> rusqlite::Result<()> {
    match op {
        StoreOp::Set { key, value } => conn.execute(
            "INSERT INTO session_items (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
            params![key, value, chrono::Utc::now().to_rfc3339()],
        )?,
        StoreOp::Remove { key } => {
            conn.execute("DELETE FROM session_items WHERE key = ?1", params![key])?
        }
    };
    Ok(())
}

#[async_trait]
impl SessionStore for Database {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.clone();
        let key = key.to_string();
        task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            Ok(read_item(&conn, &key)?)
        })
        .await?
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.clone();
        let op = StoreOp::Set {
            key: key.to_string(),
            value: value.to_string(),
        };
        task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            Ok(apply(&conn, &op)?)
        })
        .await?
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let conn = self.conn.clone();
        let op = StoreOp::remove(key);
        task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            Ok(apply(&conn, &op)?)
        })
        .await?
    }

    async fn transact(&self, keys: &[&str], update: Update) -> Result<()> {
        let conn = self.conn.clone();
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        task::spawn_blocking(move || {
            let mut conn = Self::lock(&conn)?;
            // Dropping the transaction without commit rolls it back.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let mut snapshot = Snapshot::new();
            for key in keys {
                if let Some(value) = read_item(&tx, &key)? {
                    snapshot.insert(key, value);
                }
            }

            for op in update(&snapshot)? {
                apply(&tx, &op)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await?
    }
}
