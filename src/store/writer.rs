//! Rewrite the tables from the in-memory index.

use anyhow::{Context, Result};
use rusqlite::{Connection, Statement};

use crate::engine::tools::path_to_db_string;
use crate::{Asset, Folder};

use super::{INSERT_ASSET_SQL, INSERT_FOLDER_SQL};

/// Execute one asset insert.
fn execute_insert_asset(stmt: &mut Statement<'_>, a: &Asset) -> Result<()> {
    stmt.execute(rusqlite::params![
        a.folder_id.to_string(),
        a.file_name,
        a.pixel_size.width as i64,
        a.pixel_size.height as i64,
        a.thumbnail_size.width as i64,
        a.thumbnail_size.height as i64,
        a.size as i64,
        a.created_ns,
        a.modified_ns,
        a.thumbnail_created_at.to_rfc3339(),
        a.image_rotation.degrees() as i64,
        a.hash,
        a.metadata.corrupted.is_true,
        a.metadata.corrupted.message,
        a.metadata.rotated.is_true,
        a.metadata.rotated.message,
    ])
    .with_context(|| format!("insert asset {}", a.file_name))?;
    Ok(())
}

/// Replace both tables with `folders` and `assets` in a single transaction, then checkpoint the
/// WAL so the database file alone holds the catalog.
pub fn write_catalog<'a>(
    conn: &mut Connection,
    folders: &[Folder],
    assets: impl IntoIterator<Item = &'a Asset>,
) -> Result<usize> {
    let tx = conn.transaction().context("begin transaction")?;
    tx.execute("DELETE FROM assets", [])
        .context("clear assets")?;
    tx.execute("DELETE FROM folders", [])
        .context("clear folders")?;

    let mut written = 0_usize;
    {
        let mut stmt = tx.prepare(INSERT_FOLDER_SQL).context("prepare folder insert")?;
        for f in folders {
            stmt.execute((f.id.to_string(), path_to_db_string(&f.path)))
                .with_context(|| format!("insert folder {}", f.path.display()))?;
        }
        let mut stmt = tx.prepare(INSERT_ASSET_SQL).context("prepare asset insert")?;
        for a in assets {
            execute_insert_asset(&mut stmt, a)?;
            written += 1;
        }
    }
    tx.commit().context("commit transaction")?;

    conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
        .context("WAL checkpoint")?;
    Ok(written)
}
