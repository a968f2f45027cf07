//! Facade the UI holds: cached reads plus offline-aware writes.

use color_eyre::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{SqliteSnapshotStore, StoreCache};
use crate::config::Config;
use crate::connectivity::{ConnectivityMonitor, HttpProbe};
use crate::db::Database;
use crate::queue::PendingQueue;
use crate::sync::SyncEngine;

use super::client::{StoreApi, StoreRemote};
use super::types::{NewStore, StoreRecord};

/// What happened to a creation request.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
  /// Inserted remotely; carries the created row when the server returned it.
  Created(Option<StoreRecord>),
  /// Recorded in the offline queue under this local id, to be synced later.
  Queued(i64),
}

/// Store client with transparent caching and offline support.
///
/// Reads go through the read-through cache; writes go straight to the remote
/// while online and into the durable queue while offline. Call
/// `verify_initial` on the monitor, then `spawn_sync_trigger`, during
/// application startup.
pub struct CachedStoreClient {
  remote: Arc<StoreApi>,
  cache: Arc<StoreCache<SqliteSnapshotStore>>,
  queue: Arc<PendingQueue>,
  sync: Arc<SyncEngine<SqliteSnapshotStore>>,
  monitor: Arc<ConnectivityMonitor>,
}

impl CachedStoreClient {
  pub fn new(config: &Config) -> Result<Self> {
    let remote = Arc::new(StoreApi::new(config)?);
    let db = Arc::new(Database::open()?);

    let cache = Arc::new(
      StoreCache::new(
        SqliteSnapshotStore::new(db.clone()),
        remote.clone() as Arc<dyn StoreRemote>,
      )
      .with_cooldown(Duration::from_secs(config.cache.cooldown_secs))
      .with_page_size(config.cache.page_size),
    );

    let queue = Arc::new(PendingQueue::new(db));
    let sync = Arc::new(SyncEngine::new(
      remote.clone() as Arc<dyn StoreRemote>,
      queue.clone(),
      cache.clone(),
    ));

    let probe = HttpProbe::new(config.probe_url()?)
      .with_timeout(Duration::from_millis(config.probe.timeout_ms));
    let monitor = Arc::new(ConnectivityMonitor::new(Arc::new(probe)));

    Ok(Self {
      remote,
      cache,
      queue,
      sync,
      monitor,
    })
  }

  /// The full stores collection, served from cache whenever possible.
  pub async fn get_all(&self) -> Vec<StoreRecord> {
    self.cache.get_all().await
  }

  /// Create a store. While online the remote is mutated directly and the
  /// cache appended; while offline the request is queued durably.
  pub async fn create_store(
    &self,
    store: NewStore,
    image: Option<(String, Vec<u8>)>,
  ) -> Result<CreateOutcome> {
    if !self.monitor.is_online() {
      let (image_name, image_data) = match image {
        Some((name, bytes)) => (Some(name), Some(bytes)),
        None => (None, None),
      };
      let local_id = self.queue.enqueue(&store, image_data, image_name)?;
      debug!(local_id, "offline, store creation queued");
      return Ok(CreateOutcome::Queued(local_id));
    }

    let image_url = match image {
      Some((name, bytes)) => Some(self.remote.upload_image(&name, bytes).await?),
      None => None,
    };

    match self.remote.insert_store(&store, image_url.as_deref()).await? {
      Some(record) => {
        self.cache.append(record.clone()).await;
        Ok(CreateOutcome::Created(Some(record)))
      }
      None => {
        // No row came back; drop the snapshot so the next read refetches
        self.cache.invalidate().await;
        Ok(CreateOutcome::Created(None))
      }
    }
  }

  /// Number of creations still waiting to be synced.
  pub fn pending_count(&self) -> Result<usize> {
    self.queue.count()
  }

  /// Wire the connectivity monitor to the sync engine: drains the queue on
  /// every offline-to-online transition and once at startup when already
  /// online.
  pub fn spawn_sync_trigger(&self) -> JoinHandle<()> {
    SyncEngine::spawn_online_trigger(self.sync.clone(), &self.monitor)
  }

  pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
    &self.monitor
  }

  pub fn sync(&self) -> &Arc<SyncEngine<SqliteSnapshotStore>> {
    &self.sync
  }
}
