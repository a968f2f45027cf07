//! Snapshot storage trait and SQLite implementation.

use color_eyre::{eyre::eyre, Result};
use rusqlite::params;
use std::sync::Arc;

use crate::db::Database;
use crate::store::StoreRecord;

/// Well-known key the stores snapshot is saved under.
const SNAPSHOT_KEY: &str = "stores";

/// The cached view of the full stores collection at a point in time.
///
/// `count` mirrors the remote row count the snapshot was validated against;
/// it equals `data.len()` whenever the snapshot is fresh, and a mismatch with
/// the remote count is what triggers a refetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
  /// Rows in remote insertion order, not guaranteed sorted otherwise.
  pub data: Vec<StoreRecord>,
  pub count: usize,
}

impl Snapshot {
  pub fn new(data: Vec<StoreRecord>) -> Self {
    let count = data.len();
    Self { data, count }
  }
}

/// Trait for snapshot storage backends.
pub trait SnapshotStore: Send + Sync {
  /// Load the persisted snapshot, if any.
  fn load(&self) -> Result<Option<Snapshot>>;

  /// Persist the snapshot, replacing any previous one.
  fn save(&self, snapshot: &Snapshot) -> Result<()>;

  /// Drop the persisted snapshot.
  fn clear(&self) -> Result<()>;
}

/// Storage implementation that doesn't persist anything.
/// Used when durable storage is unavailable - the cache then runs memory-only.
pub struct NoopSnapshotStore;

impl SnapshotStore for NoopSnapshotStore {
  fn load(&self) -> Result<Option<Snapshot>> {
    Ok(None) // Always miss
  }

  fn save(&self, _snapshot: &Snapshot) -> Result<()> {
    Ok(()) // Discard
  }

  fn clear(&self) -> Result<()> {
    Ok(())
  }
}

/// SQLite-backed snapshot storage. The whole collection is stored as one
/// serialized row so reads and writes are a single transaction.
pub struct SqliteSnapshotStore {
  db: Arc<Database>,
}

impl SqliteSnapshotStore {
  pub fn new(db: Arc<Database>) -> Self {
    Self { db }
  }
}

impl SnapshotStore for SqliteSnapshotStore {
  fn load(&self) -> Result<Option<Snapshot>> {
    let conn = self.db.lock()?;

    let mut stmt = conn
      .prepare("SELECT data, count FROM store_snapshot WHERE key = ?")
      .map_err(|e| eyre!("Failed to prepare snapshot query: {}", e))?;

    let row: Option<(Vec<u8>, i64)> = stmt
      .query_row(params![SNAPSHOT_KEY], |row| Ok((row.get(0)?, row.get(1)?)))
      .ok();

    let (data, count) = match row {
      Some(row) => row,
      None => return Ok(None),
    };

    let data: Vec<StoreRecord> = serde_json::from_slice(&data)
      .map_err(|e| eyre!("Failed to deserialize snapshot: {}", e))?;

    Ok(Some(Snapshot {
      data,
      count: count as usize,
    }))
  }

  fn save(&self, snapshot: &Snapshot) -> Result<()> {
    let data = serde_json::to_vec(&snapshot.data)
      .map_err(|e| eyre!("Failed to serialize snapshot: {}", e))?;

    let conn = self.db.lock()?;
    conn
      .execute(
        "INSERT OR REPLACE INTO store_snapshot (key, data, count, saved_at)
         VALUES (?, ?, ?, datetime('now'))",
        params![SNAPSHOT_KEY, data, snapshot.count as i64],
      )
      .map_err(|e| eyre!("Failed to save snapshot: {}", e))?;

    Ok(())
  }

  fn clear(&self) -> Result<()> {
    let conn = self.db.lock()?;
    conn
      .execute(
        "DELETE FROM store_snapshot WHERE key = ?",
        params![SNAPSHOT_KEY],
      )
      .map_err(|e| eyre!("Failed to clear snapshot: {}", e))?;

    Ok(())
  }
}
