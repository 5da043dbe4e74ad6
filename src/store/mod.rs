//! Catalog data store: in-memory index, SQLite tables, thumbnail blobs.

mod blobs;
mod catalog;
mod connection;
mod writer;

pub use blobs::{folder_blob_dir, read_folder_blobs, remove_folder_blobs, write_folder_blobs};
pub use catalog::{CatalogStore, ThumbnailIndex};
pub use connection::{load_assets, load_folders, open_db, open_db_in_memory};
pub use writer::write_catalog;

/// WAL tuning pragmas (synchronous, autocheckpoint, size limit). Use after PRAGMA journal_mode = WAL.
pub(crate) const WAL_PRAGMAS: &str = r#"
        PRAGMA synchronous = NORMAL;
        PRAGMA wal_autocheckpoint = 10000;
        PRAGMA journal_size_limit = 67108864;
        "#;

/// Insert statement for the folders table.
pub(crate) const INSERT_FOLDER_SQL: &str = "INSERT INTO folders (id, path) VALUES (?1, ?2)";

/// Insert statement for the assets table.
pub(crate) const INSERT_ASSET_SQL: &str = r#"
INSERT INTO assets (
    folder_id, file_name, width, height, thumb_width, thumb_height, size,
    created_ns, modified_ns, thumbnail_created_at, rotation, hash,
    corrupted, corrupted_message, rotated, rotated_message
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
"#;

/// Schema for folders and assets tables.
pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS folders (
    id TEXT PRIMARY KEY,
    path TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS assets (
    folder_id TEXT NOT NULL,
    file_name TEXT NOT NULL,
    width INTEGER NOT NULL,
    height INTEGER NOT NULL,
    thumb_width INTEGER NOT NULL,
    thumb_height INTEGER NOT NULL,
    size INTEGER NOT NULL,
    created_ns INTEGER NOT NULL,
    modified_ns INTEGER NOT NULL,
    thumbnail_created_at TEXT NOT NULL,
    rotation INTEGER NOT NULL,
    hash TEXT NOT NULL,
    corrupted INTEGER NOT NULL,
    corrupted_message TEXT,
    rotated INTEGER NOT NULL,
    rotated_message TEXT,
    PRIMARY KEY (folder_id, file_name)
);
CREATE INDEX IF NOT EXISTS idx_assets_hash ON assets(hash);
"#;
