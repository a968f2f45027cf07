//! Store domain: records, wire types, the remote client, and the cached
//! facade UI code consumes.

mod api_types;
mod cached_client;
mod client;
mod types;

pub use cached_client::{CachedStoreClient, CreateOutcome};
pub use client::{StoreApi, StoreRemote};
pub use types::{search_name, NewStore, PendingStore, StoreRecord};
