//! Offline-first data engine for a store-visit management app.
//!
//! The engine owns the client-side view of the remote "stores" collection:
//! - A read-through cache validated against the remote through a cheap row
//!   count, with a cooldown and in-flight request deduplication
//! - A durable offline queue for store creations made while disconnected
//! - A connectivity monitor that trusts offline signals and verifies online
//!   ones with a probed request
//! - A sync engine that drains the queue once connectivity returns and
//!   broadcasts a completion summary
//!
//! UI code holds a [`CachedStoreClient`] and calls `get_all` / `create_store`;
//! everything else happens behind it.

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod logging;
pub mod queue;
pub mod store;
pub mod sync;

pub use cache::{NoopSnapshotStore, Snapshot, SnapshotStore, SqliteSnapshotStore, StoreCache};
pub use config::Config;
pub use connectivity::{ConnectivityMonitor, ConnectivityProbe, HttpProbe};
pub use db::Database;
pub use queue::PendingQueue;
pub use store::{
  search_name, CachedStoreClient, CreateOutcome, NewStore, PendingStore, StoreApi, StoreRecord,
  StoreRemote,
};
pub use sync::{SyncEngine, SyncReport};
