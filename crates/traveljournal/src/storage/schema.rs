//! `SQLite` schema definitions for the collection store.

/// Entries of every collection. `value` holds a JSON object.
pub const CREATE_ENTRIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS entries (
    collection TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (collection, key)
)
";

/// Index for listing a collection in creation order.
pub const CREATE_CREATED_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_entries_created ON entries(collection, created_at)
";
