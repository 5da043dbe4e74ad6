//! Open the tables database and load its rows.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::{Asset, AssetMetadata, Flag, Folder, ImageRotation, PixelSize};

use super::{SCHEMA, WAL_PRAGMAS};

/// Enable WAL and apply schema to an open connection (idempotent).
fn apply_wal_and_schema(conn: &Connection) -> Result<()> {
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
        .context("enable WAL")?;
    conn.execute_batch(WAL_PRAGMAS).context("set WAL pragmas")?;
    conn.execute_batch(SCHEMA).context("create schema")?;
    Ok(())
}

/// Open or create the tables DB and ensure schema + WAL.
pub fn open_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("open catalog database {}", path.display()))?;
    apply_wal_and_schema(&conn)?;
    Ok(conn)
}

/// Open an in-memory DB with the same schema (tests; no WAL pragmas needed).
pub fn open_db_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory database")?;
    conn.execute_batch(SCHEMA).context("create schema")?;
    Ok(conn)
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).with_context(|| format!("invalid id in catalog: {s}"))
}

/// Load every folder row.
pub fn load_folders(conn: &Connection) -> Result<Vec<Folder>> {
    let mut stmt = conn.prepare("SELECT id, path FROM folders ORDER BY path")?;
    let rows = stmt.query_map([], |row| {
        let id: String = row.get(0)?;
        let path: String = row.get(1)?;
        Ok((id, path))
    })?;
    let mut folders = Vec::new();
    for row in rows {
        let (id, path) = row?;
        folders.push(Folder {
            id: parse_uuid(&id)?,
            path: PathBuf::from(path),
        });
    }
    Ok(folders)
}

/// Raw column values of one assets row, converted outside the rusqlite closure.
struct AssetRow {
    folder_id: String,
    file_name: String,
    dims: [i64; 4],
    size: i64,
    created_ns: i64,
    modified_ns: i64,
    thumbnail_created_at: String,
    rotation: i64,
    hash: String,
    corrupted: (bool, Option<String>),
    rotated: (bool, Option<String>),
}

impl AssetRow {
    fn into_asset(self) -> Result<Asset> {
        let thumbnail_created_at = DateTime::parse_from_rfc3339(&self.thumbnail_created_at)
            .with_context(|| {
                format!(
                    "invalid thumbnail timestamp for {}: {}",
                    self.file_name, self.thumbnail_created_at
                )
            })?
            .with_timezone(&Utc);
        let [w, h, tw, th] = self.dims.map(|v| v.max(0) as u32);
        Ok(Asset {
            folder_id: parse_uuid(&self.folder_id)?,
            file_name: self.file_name,
            pixel_size: PixelSize::new(w, h),
            thumbnail_size: PixelSize::new(tw, th),
            size: self.size.max(0) as u64,
            created_ns: self.created_ns,
            modified_ns: self.modified_ns,
            thumbnail_created_at,
            image_rotation: ImageRotation::from_degrees(self.rotation.max(0) as u32),
            hash: self.hash,
            metadata: AssetMetadata {
                corrupted: Flag {
                    is_true: self.corrupted.0,
                    message: self.corrupted.1,
                },
                rotated: Flag {
                    is_true: self.rotated.0,
                    message: self.rotated.1,
                },
            },
            image_data: None,
        })
    }
}

/// Load every asset row.
pub fn load_assets(conn: &Connection) -> Result<Vec<Asset>> {
    let mut stmt = conn.prepare(
        "SELECT folder_id, file_name, width, height, thumb_width, thumb_height, size,
                created_ns, modified_ns, thumbnail_created_at, rotation, hash,
                corrupted, corrupted_message, rotated, rotated_message
         FROM assets ORDER BY folder_id, file_name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(AssetRow {
            folder_id: row.get(0)?,
            file_name: row.get(1)?,
            dims: [row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?],
            size: row.get(6)?,
            created_ns: row.get(7)?,
            modified_ns: row.get(8)?,
            thumbnail_created_at: row.get(9)?,
            rotation: row.get(10)?,
            hash: row.get(11)?,
            corrupted: (row.get(12)?, row.get(13)?),
            rotated: (row.get(14)?, row.get(15)?),
        })
    })?;
    let mut assets = Vec::new();
    for row in rows {
        assets.push(row?.into_asset()?);
    }
    Ok(assets)
}
