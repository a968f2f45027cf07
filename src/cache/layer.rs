//! Read-through cache over the remote stores collection.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::store::{StoreRecord, StoreRemote};

use super::storage::{Snapshot, SnapshotStore};

/// Default minimum interval between remote count validations.
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Default rows per page on a full refetch.
const DEFAULT_PAGE_SIZE: usize = 1000;

/// Cache over the full stores collection, validated against the remote
/// through a cheap row-count check.
///
/// Reads consult memory, then durable storage, then the remote. A snapshot
/// whose count matches the remote count is served without refetching rows;
/// a mismatch triggers a full paginated refetch that replaces both layers.
/// While the cooldown since the last validation has not elapsed, reads are
/// answered from memory with zero I/O.
///
/// All callers go through one internal critical section, so concurrent
/// reads during an in-flight validation or fetch share that single remote
/// operation instead of issuing duplicates.
pub struct StoreCache<S: SnapshotStore> {
  storage: Arc<S>,
  remote: Arc<dyn StoreRemote>,
  state: Mutex<CacheState>,
  cooldown: Duration,
  page_size: usize,
}

struct CacheState {
  snapshot: Option<Snapshot>,
  last_validated: Option<Instant>,
}

impl<S: SnapshotStore> StoreCache<S> {
  pub fn new(storage: S, remote: Arc<dyn StoreRemote>) -> Self {
    Self {
      storage: Arc::new(storage),
      remote,
      state: Mutex::new(CacheState {
        snapshot: None,
        last_validated: None,
      }),
      cooldown: DEFAULT_COOLDOWN,
      page_size: DEFAULT_PAGE_SIZE,
    }
  }

  /// Set the cooldown between remote count validations.
  pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
    self.cooldown = cooldown;
    self
  }

  /// Set the page size used on a full refetch.
  pub fn with_page_size(mut self, page_size: usize) -> Self {
    self.page_size = page_size;
    self
  }

  /// Get the full stores collection.
  ///
  /// Degrades to the last known snapshot (or an empty list) on remote
  /// failure; never returns an error for offline conditions.
  pub async fn get_all(&self) -> Vec<StoreRecord> {
    let mut guard = self.state.lock().await;
    let state = &mut *guard;

    // Fresh in-memory snapshot: answer with zero I/O
    if let (Some(snap), Some(at)) = (&state.snapshot, state.last_validated) {
      if at.elapsed() < self.cooldown {
        return snap.data.clone();
      }
    }

    let remote_count = match self.remote.count_stores().await {
      Ok(count) => count,
      Err(e) => {
        debug!(error = %e, "count check failed, serving cached snapshot");
        return self.fallback(state);
      }
    };

    if state.snapshot.is_none() {
      state.snapshot = self.load_durable();
    }

    // Count matches a held snapshot: revalidate without refetching rows
    if let Some(snap) = &state.snapshot {
      if snap.count == remote_count {
        let data = snap.data.clone();
        state.last_validated = Some(Instant::now());
        return data;
      }
    }

    match self.fetch_all().await {
      Ok(data) => {
        let snapshot = Snapshot::new(data);
        debug!(count = snapshot.count, "snapshot refreshed from remote");
        self.save_durable(&snapshot);
        let data = snapshot.data.clone();
        state.snapshot = Some(snapshot);
        state.last_validated = Some(Instant::now());
        data
      }
      Err(e) => {
        warn!(error = %e, "row fetch failed, serving last known snapshot");
        self.fallback(state)
      }
    }
  }

  /// Clear both snapshot layers and reset the cooldown, forcing the next
  /// `get_all` to revalidate against the remote.
  pub async fn invalidate(&self) {
    let mut state = self.state.lock().await;
    state.snapshot = None;
    state.last_validated = None;

    if let Err(e) = self.storage.clear() {
      debug!(error = %e, "failed to clear durable snapshot");
    }
  }

  /// Add a record that was just created remotely to both snapshot layers
  /// without a remote round-trip.
  ///
  /// A no-op when no snapshot is held; the next `get_all` fetches fresh
  /// data that already includes the record.
  pub async fn append(&self, record: StoreRecord) {
    let mut state = self.state.lock().await;

    let Some(snapshot) = state.snapshot.as_mut() else {
      return;
    };

    snapshot.data.push(record);
    snapshot.count += 1;
    self.save_durable(snapshot);
  }

  /// Fetch every row, page by page, until a short page signals the end.
  async fn fetch_all(&self) -> color_eyre::Result<Vec<StoreRecord>> {
    let mut all = Vec::new();
    let mut offset = 0;

    loop {
      let page = self.remote.fetch_stores_page(offset, self.page_size).await?;
      let fetched = page.len();
      all.extend(page);

      if fetched < self.page_size {
        break;
      }
      offset += self.page_size;
    }

    Ok(all)
  }

  fn fallback(&self, state: &mut CacheState) -> Vec<StoreRecord> {
    if state.snapshot.is_none() {
      state.snapshot = self.load_durable();
    }

    match &state.snapshot {
      Some(snap) => snap.data.clone(),
      None => Vec::new(),
    }
  }

  fn load_durable(&self) -> Option<Snapshot> {
    match self.storage.load() {
      Ok(snapshot) => snapshot,
      Err(e) => {
        debug!(error = %e, "failed to load durable snapshot");
        None
      }
    }
  }

  fn save_durable(&self, snapshot: &Snapshot) {
    if let Err(e) = self.storage.save(snapshot) {
      debug!(error = %e, "failed to persist snapshot");
    }
  }
}
