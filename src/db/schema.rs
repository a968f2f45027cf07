/// Schema for the engine's durable tables.
///
/// Two logical stores share the one database: the snapshot table holds the
/// cached stores collection under a single well-known key, the pending table
/// holds one row per store creation queued while offline.
pub const SCHEMA: &str = r#"
-- Cached view of the remote stores collection (one row per snapshot key)
CREATE TABLE IF NOT EXISTS store_snapshot (
    key TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    count INTEGER NOT NULL,
    saved_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Store creations made while offline, drained by the sync engine
CREATE TABLE IF NOT EXISTS pending_stores (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    payload BLOB NOT NULL,
    image_data BLOB,
    image_name TEXT,
    queued_at TEXT NOT NULL
);
"#;
