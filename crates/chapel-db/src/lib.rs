pub mod commands;
pub mod documents;
pub mod error;
pub mod migrations;
pub mod otp;
pub mod queries;
pub mod seed;
pub mod system;

pub use documents::{Collection, Document, Setting};
pub use error::{StoreError, StoreResult};

use anyhow::anyhow;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

use chapel_types::validate::normalize_email;
use seed::DEFAULT_ROOT_EMAIL;

/// The document store. Every record is its own row, so a write only touches
/// the rows it changes. All access goes through one connection guarded by a
/// mutex; construct one per process and share it.
pub struct Database {
    conn: Mutex<Connection>,
    /// Admin account that seeding guarantees exists.
    root_email: String,
}

impl Database {
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_root(path, DEFAULT_ROOT_EMAIL)
    }

    pub fn open_with_root(path: &Path, root_email: &str) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let db = Self::init(conn, root_email)?;

        info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// A private, non-persistent store. Used by tests and ephemeral runs.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open_in_memory_with_root(DEFAULT_ROOT_EMAIL)
    }

    pub fn open_in_memory_with_root(root_email: &str) -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?, root_email)
    }

    fn init(mut conn: Connection, root_email: &str) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        let root_email = normalize_email(root_email);
        let tx = conn.transaction()?;
        let seeded = seed::run(&tx, &root_email)?;
        tx.commit()?;
        if !seeded.is_empty() {
            info!("Seeded default records for: {}", seeded.join(", "));
        }

        Ok(Self {
            conn: Mutex::new(conn),
            root_email,
        })
    }

    /// Case-folded email of the protected admin account.
    pub fn root_email(&self) -> &str {
        &self.root_email
    }

    pub fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T>,
    {
        let mut conn = self.conn.lock().map_err(|e| anyhow!("DB lock poisoned: {}", e))?;
        f(&mut conn)
    }
}
