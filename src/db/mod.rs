pub mod schema;

use color_eyre::{eyre::eyre, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Durable key-value store shared by the snapshot cache and the offline
/// queue. Survives process restarts; the two consumers use disjoint tables.
pub struct Database {
  conn: Mutex<Connection>,
}

impl Database {
  /// Open or create the database at the default location
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
    }

    Self::open_at(&path)
  }

  /// Open or create the database at an explicit path
  pub fn open_at(path: &Path) -> Result<Self> {
    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;

    Self::from_conn(conn)
  }

  /// In-memory database, for tests and cache-less embedders
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;

    Self::from_conn(conn)
  }

  fn from_conn(conn: Connection) -> Result<Self> {
    let db = Self {
      conn: Mutex::new(conn),
    };
    db.run_migrations()?;

    Ok(db)
  }

  /// Get the default database path
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("vistore").join("vistore.db"))
  }

  /// Run database migrations. Idempotent, safe to call on every open.
  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute_batch(schema::SCHEMA)
      .map_err(|e| eyre!("Failed to run migrations: {}", e))?;

    Ok(())
  }

  pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_migrations_create_tables() {
    let db = Database::open_in_memory().unwrap();
    let conn = db.lock().unwrap();

    conn
      .execute(
        "INSERT INTO store_snapshot (key, data, count) VALUES ('stores', x'5b5d', 0)",
        [],
      )
      .unwrap();
    conn
      .execute(
        "INSERT INTO pending_stores (payload, queued_at) VALUES (x'7b7d', '2024-01-01T00:00:00Z')",
        [],
      )
      .unwrap();
  }

  #[test]
  fn test_open_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vistore.db");

    {
      let db = Database::open_at(&path).unwrap();
      let conn = db.lock().unwrap();
      conn
        .execute(
          "INSERT INTO pending_stores (payload, queued_at) VALUES (x'7b7d', '2024-01-01T00:00:00Z')",
          [],
        )
        .unwrap();
    }

    // Reopening runs migrations again without touching existing rows
    let db = Database::open_at(&path).unwrap();
    let conn = db.lock().unwrap();
    let count: i64 = conn
      .query_row("SELECT COUNT(*) FROM pending_stores", [], |row| row.get(0))
      .unwrap();
    assert_eq!(count, 1);
  }
}
