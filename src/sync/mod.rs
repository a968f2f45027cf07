//! Drains the offline queue against the remote once connectivity returns.

use color_eyre::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{SnapshotStore, StoreCache};
use crate::connectivity::ConnectivityMonitor;
use crate::queue::PendingQueue;
use crate::store::{PendingStore, StoreRemote};

/// Outcome of one queue drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
  pub synced: usize,
  pub failed: usize,
}

/// Replays queued store creations against the remote, one at a time.
///
/// Entries are independent: a failure leaves its entry queued for the next
/// run and the batch continues. Processing is sequential so entries never
/// race each other into the cache, and a reentrancy guard drops triggers
/// that arrive while a run is already active.
pub struct SyncEngine<S: SnapshotStore> {
  remote: Arc<dyn StoreRemote>,
  queue: Arc<PendingQueue>,
  cache: Arc<StoreCache<S>>,
  running: AtomicBool,
  completions: broadcast::Sender<SyncReport>,
}

impl<S: SnapshotStore + 'static> SyncEngine<S> {
  pub fn new(
    remote: Arc<dyn StoreRemote>,
    queue: Arc<PendingQueue>,
    cache: Arc<StoreCache<S>>,
  ) -> Self {
    let (completions, _) = broadcast::channel(16);
    Self {
      remote,
      queue,
      cache,
      running: AtomicBool::new(false),
      completions,
    }
  }

  /// Completion reports, one per finished drain. Fire-and-forget from the
  /// engine's side; lagging receivers miss reports rather than block it.
  pub fn subscribe(&self) -> broadcast::Receiver<SyncReport> {
    self.completions.subscribe()
  }

  /// Drain the queue. Returns a zero report without touching the queue when
  /// another run is already in progress.
  pub async fn process_queue(&self) -> SyncReport {
    if self
      .running
      .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
      .is_err()
    {
      debug!("sync already running, trigger dropped");
      return SyncReport::default();
    }

    let report = self.drain().await;
    self.running.store(false, Ordering::SeqCst);

    let _ = self.completions.send(report);
    report
  }

  async fn drain(&self) -> SyncReport {
    let entries = match self.queue.list() {
      Ok(entries) => entries,
      Err(e) => {
        warn!(error = %e, "failed to read offline queue");
        return SyncReport::default();
      }
    };

    let mut report = SyncReport::default();

    for entry in entries {
      match self.sync_entry(&entry).await {
        Ok(()) => report.synced += 1,
        Err(e) => {
          warn!(local_id = entry.local_id, error = %e, "failed to sync queued store");
          report.failed += 1;
        }
      }
    }

    info!(synced = report.synced, failed = report.failed, "offline queue drained");
    report
  }

  /// Replay one entry. The queue row is deleted only after the remote
  /// insert (and the upload, when bytes are present) succeeded, so a crash
  /// or failure anywhere leaves the entry for the next run.
  async fn sync_entry(&self, entry: &PendingStore) -> Result<()> {
    let image_url = match &entry.image_data {
      Some(bytes) => {
        let name = entry.image_name.as_deref().unwrap_or("store.jpg");
        Some(self.remote.upload_image(name, bytes.clone()).await?)
      }
      None => None,
    };

    let created = self
      .remote
      .insert_store(&entry.store, image_url.as_deref())
      .await?;

    match created {
      Some(record) => self.cache.append(record).await,
      // No row came back; refetch on the next read instead of guessing
      None => self.cache.invalidate().await,
    }

    self.queue.remove(entry.local_id)?;
    Ok(())
  }

  /// Watch the monitor and drain the queue on every offline-to-online
  /// transition, plus once at startup when already online (entries queued
  /// in a previous session).
  pub fn spawn_online_trigger(
    engine: Arc<Self>,
    monitor: &ConnectivityMonitor,
  ) -> JoinHandle<()> {
    let mut rx = monitor.subscribe();

    tokio::spawn(async move {
      let mut was_online = *rx.borrow();
      if was_online {
        Self::run_if_pending(&engine).await;
      }

      while rx.changed().await.is_ok() {
        let now_online = *rx.borrow_and_update();
        if now_online && !was_online {
          Self::run_if_pending(&engine).await;
        }
        was_online = now_online;
      }
    })
  }

  async fn run_if_pending(engine: &Self) {
    match engine.queue.count() {
      Ok(0) => {}
      Ok(pending) => {
        debug!(pending, "connectivity restored, draining offline queue");
        engine.process_queue().await;
      }
      Err(e) => warn!(error = %e, "failed to count pending stores"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use color_eyre::eyre::eyre;
  use std::collections::HashSet;
  use std::sync::atomic::AtomicUsize;
  use std::sync::Mutex as StdMutex;
  use std::time::Duration;

  use crate::cache::SqliteSnapshotStore;
  use crate::connectivity::ConnectivityProbe;
  use crate::db::Database;
  use crate::store::{NewStore, StoreRecord};

  /// Remote whose inserts can be made to fail per store name.
  #[derive(Default)]
  struct FakeRemote {
    rows: StdMutex<Vec<StoreRecord>>,
    fail_inserts_named: StdMutex<HashSet<String>>,
    fail_uploads: AtomicBool,
    insert_calls: AtomicUsize,
    uploads: StdMutex<Vec<String>>,
  }

  #[async_trait]
  impl StoreRemote for FakeRemote {
    async fn count_stores(&self) -> color_eyre::Result<usize> {
      Ok(self.rows.lock().unwrap().len())
    }

    async fn fetch_stores_page(
      &self,
      offset: usize,
      limit: usize,
    ) -> color_eyre::Result<Vec<StoreRecord>> {
      let rows = self.rows.lock().unwrap();
      let end = (offset + limit).min(rows.len());
      Ok(rows.get(offset..end).unwrap_or(&[]).to_vec())
    }

    async fn insert_store(
      &self,
      store: &NewStore,
      image_url: Option<&str>,
    ) -> color_eyre::Result<Option<StoreRecord>> {
      self.insert_calls.fetch_add(1, Ordering::SeqCst);
      if self.fail_inserts_named.lock().unwrap().contains(&store.name) {
        return Err(eyre!("insert failed"));
      }

      let mut rows = self.rows.lock().unwrap();
      let record = StoreRecord {
        id: rows.len() as i64 + 1,
        name: store.name.clone(),
        image_url: image_url.map(String::from),
        latitude: store.latitude,
        longitude: store.longitude,
        address_detail: store.address_detail.clone(),
        ward: store.ward.clone(),
        district: store.district.clone(),
        phone: store.phone.clone(),
        note: store.note.clone(),
        active: store.active,
        created_at: None,
      };
      rows.push(record.clone());
      Ok(Some(record))
    }

    async fn upload_image(&self, name: &str, _bytes: Vec<u8>) -> color_eyre::Result<String> {
      if self.fail_uploads.load(Ordering::SeqCst) {
        return Err(eyre!("upload failed"));
      }
      self.uploads.lock().unwrap().push(name.to_string());
      Ok(name.to_string())
    }
  }

  struct Fixture {
    remote: Arc<FakeRemote>,
    queue: Arc<PendingQueue>,
    cache: Arc<StoreCache<SqliteSnapshotStore>>,
    engine: Arc<SyncEngine<SqliteSnapshotStore>>,
  }

  fn fixture() -> Fixture {
    let remote = Arc::new(FakeRemote::default());
    let db = Arc::new(Database::open_in_memory().unwrap());
    let queue = Arc::new(PendingQueue::new(db.clone()));
    let cache = Arc::new(StoreCache::new(
      SqliteSnapshotStore::new(db),
      remote.clone() as Arc<dyn StoreRemote>,
    ));
    let engine = Arc::new(SyncEngine::new(
      remote.clone() as Arc<dyn StoreRemote>,
      queue.clone(),
      cache.clone(),
    ));
    Fixture {
      remote,
      queue,
      cache,
      engine,
    }
  }

  fn new_store(name: &str) -> NewStore {
    NewStore {
      name: name.to_string(),
      latitude: Some(10.776),
      longitude: Some(106.700),
      ..Default::default()
    }
  }

  #[tokio::test]
  async fn test_sync_success_path() {
    let f = fixture();
    // Prime the cache so appends apply to a held snapshot
    f.cache.get_all().await;
    f.queue.enqueue(&new_store("Quán A"), None, None).unwrap();

    let report = f.engine.process_queue().await;

    assert_eq!(report, SyncReport { synced: 1, failed: 0 });
    assert!(f.queue.list().unwrap().is_empty());

    let cached = f.cache.get_all().await;
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].name, "Quán A");
    assert!(cached[0].id > 0);
  }

  #[tokio::test]
  async fn test_sync_partial_failure_keeps_failed_entry() {
    let f = fixture();
    f.remote
      .fail_inserts_named
      .lock()
      .unwrap()
      .insert("Quán A".to_string());

    f.queue.enqueue(&new_store("Quán A"), None, None).unwrap();
    f.queue.enqueue(&new_store("Quán B"), None, None).unwrap();

    let report = f.engine.process_queue().await;

    assert_eq!(report, SyncReport { synced: 1, failed: 1 });

    let remaining = f.queue.list().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].store.name, "Quán A");
  }

  #[tokio::test]
  async fn test_upload_failure_skips_insert_and_keeps_entry() {
    let f = fixture();
    f.remote.fail_uploads.store(true, Ordering::SeqCst);

    f.queue
      .enqueue(
        &new_store("Quán A"),
        Some(vec![1, 2, 3]),
        Some("a.jpg".to_string()),
      )
      .unwrap();

    let report = f.engine.process_queue().await;

    assert_eq!(report, SyncReport { synced: 0, failed: 1 });
    assert_eq!(f.remote.insert_calls.load(Ordering::SeqCst), 0);
    assert_eq!(f.queue.count().unwrap(), 1);
  }

  #[tokio::test]
  async fn test_uploaded_filename_lands_on_record() {
    let f = fixture();
    f.queue
      .enqueue(
        &new_store("Quán A"),
        Some(vec![1, 2, 3]),
        Some("a.jpg".to_string()),
      )
      .unwrap();

    let report = f.engine.process_queue().await;
    assert_eq!(report, SyncReport { synced: 1, failed: 0 });

    assert_eq!(f.remote.uploads.lock().unwrap().as_slice(), ["a.jpg"]);
    let rows = f.remote.rows.lock().unwrap();
    assert_eq!(rows[0].image_url.as_deref(), Some("a.jpg"));
  }

  #[tokio::test]
  async fn test_completion_broadcast_carries_report() {
    let f = fixture();
    f.queue.enqueue(&new_store("Quán A"), None, None).unwrap();

    let mut rx = f.engine.subscribe();
    let report = f.engine.process_queue().await;

    assert_eq!(rx.recv().await.unwrap(), report);
  }

  #[tokio::test]
  async fn test_trigger_drains_on_startup_when_online() {
    let f = fixture();
    f.queue.enqueue(&new_store("Quán A"), None, None).unwrap();

    struct AlwaysOnline;
    #[async_trait]
    impl ConnectivityProbe for AlwaysOnline {
      async fn check(&self) -> bool {
        true
      }
    }

    let monitor = ConnectivityMonitor::new(Arc::new(AlwaysOnline));
    let mut rx = f.engine.subscribe();
    let handle = SyncEngine::spawn_online_trigger(f.engine.clone(), &monitor);

    let report = tokio::time::timeout(Duration::from_secs(1), rx.recv())
      .await
      .unwrap()
      .unwrap();
    assert_eq!(report, SyncReport { synced: 1, failed: 0 });
    assert_eq!(f.queue.count().unwrap(), 0);

    handle.abort();
  }

  #[tokio::test]
  async fn test_trigger_drains_on_offline_to_online_transition() {
    let f = fixture();

    struct AlwaysOnline;
    #[async_trait]
    impl ConnectivityProbe for AlwaysOnline {
      async fn check(&self) -> bool {
        true
      }
    }

    let monitor = Arc::new(ConnectivityMonitor::new(Arc::new(AlwaysOnline)));
    monitor.system_offline();

    let handle = SyncEngine::spawn_online_trigger(f.engine.clone(), &monitor);

    // Queued while offline
    f.queue.enqueue(&new_store("Quán A"), None, None).unwrap();
    let mut rx = f.engine.subscribe();

    monitor.system_online().await;

    let report = tokio::time::timeout(Duration::from_secs(1), rx.recv())
      .await
      .unwrap()
      .unwrap();
    assert_eq!(report, SyncReport { synced: 1, failed: 0 });
    assert_eq!(f.queue.count().unwrap(), 0);

    handle.abort();
  }
}
