//! Read-through caching of the remote stores collection.
//!
//! This module keeps a snapshot of the full collection in memory and in
//! durable storage, and:
//! - Validates the snapshot against a cheap remote row count instead of
//!   refetching rows
//! - Applies a cooldown so repeated reads cost zero I/O
//! - Deduplicates concurrent reads into one in-flight remote operation
//! - Serves the last known snapshot when the remote is unreachable

mod layer;
mod storage;

pub use layer::StoreCache;
pub use storage::{NoopSnapshotStore, Snapshot, SnapshotStore, SqliteSnapshotStore};
