//! Durable queue of store creations made while offline.
//!
//! Entries never touch the remote when enqueued; the sync engine drains them
//! once connectivity returns and removes each entry only after its remote
//! insert succeeded.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::params;
use std::sync::Arc;
use tracing::warn;

use crate::db::Database;
use crate::store::{NewStore, PendingStore};

pub struct PendingQueue {
  db: Arc<Database>,
}

impl PendingQueue {
  pub fn new(db: Arc<Database>) -> Self {
    Self { db }
  }

  /// Durably record a store creation. Returns the queue-local id.
  pub fn enqueue(
    &self,
    store: &NewStore,
    image_data: Option<Vec<u8>>,
    image_name: Option<String>,
  ) -> Result<i64> {
    let payload =
      serde_json::to_vec(store).map_err(|e| eyre!("Failed to serialize pending store: {}", e))?;
    let queued_at = Utc::now().to_rfc3339();

    let conn = self.db.lock()?;
    conn
      .execute(
        "INSERT INTO pending_stores (payload, image_data, image_name, queued_at)
         VALUES (?, ?, ?, ?)",
        params![payload, image_data, image_name, queued_at],
      )
      .map_err(|e| eyre!("Failed to enqueue pending store: {}", e))?;

    Ok(conn.last_insert_rowid())
  }

  /// All pending entries in insertion order.
  pub fn list(&self) -> Result<Vec<PendingStore>> {
    let conn = self.db.lock()?;

    let mut stmt = conn
      .prepare(
        "SELECT id, payload, image_data, image_name, queued_at
         FROM pending_stores ORDER BY id",
      )
      .map_err(|e| eyre!("Failed to prepare queue query: {}", e))?;

    let rows: Vec<(i64, Vec<u8>, Option<Vec<u8>>, Option<String>, String)> = stmt
      .query_map([], |row| {
        Ok((
          row.get(0)?,
          row.get(1)?,
          row.get(2)?,
          row.get(3)?,
          row.get(4)?,
        ))
      })
      .map_err(|e| eyre!("Failed to query pending stores: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    let mut entries = Vec::with_capacity(rows.len());
    for (local_id, payload, image_data, image_name, queued_at) in rows {
      // A row whose payload no longer decodes would wedge the queue forever;
      // skip it and leave the row for manual inspection
      let store: NewStore = match serde_json::from_slice(&payload) {
        Ok(store) => store,
        Err(e) => {
          warn!(local_id, error = %e, "skipping undecodable pending store");
          continue;
        }
      };

      let queued_at = DateTime::parse_from_rfc3339(&queued_at)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

      entries.push(PendingStore {
        local_id,
        store,
        image_data,
        image_name,
        queued_at,
      });
    }

    Ok(entries)
  }

  /// Number of pending entries. Cheap; used to decide whether a sync run is
  /// worth starting at all.
  pub fn count(&self) -> Result<usize> {
    let conn = self.db.lock()?;

    let count: i64 = conn
      .query_row("SELECT COUNT(*) FROM pending_stores", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to count pending stores: {}", e))?;

    Ok(count as usize)
  }

  /// Delete one entry by its queue-local id.
  pub fn remove(&self, local_id: i64) -> Result<()> {
    let conn = self.db.lock()?;

    conn
      .execute("DELETE FROM pending_stores WHERE id = ?", params![local_id])
      .map_err(|e| eyre!("Failed to remove pending store {}: {}", local_id, e))?;

    Ok(())
  }
}
