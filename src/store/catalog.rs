//! The catalog held in memory, loaded from and persisted to the store directory.

use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::utils::config::StoreLayout;
use crate::{Asset, Folder};

use super::blobs::{read_folder_blobs, remove_folder_blobs, write_folder_blobs};
use super::connection::{load_assets, load_folders, open_db};
use super::writer::write_catalog;

/// Thumbnail bytes keyed by folder path, then file name.
pub type ThumbnailIndex = HashMap<PathBuf, HashMap<String, Vec<u8>>>;

/// Folders, assets and thumbnails. Mutations only touch memory and mark the store dirty;
/// [`CatalogStore::persist`] writes them out.
pub struct CatalogStore {
    tables_dir: PathBuf,
    blobs_dir: PathBuf,
    folders: BTreeMap<PathBuf, Folder>,
    folder_paths: HashMap<Uuid, PathBuf>,
    assets: HashMap<Uuid, BTreeMap<String, Asset>>,
    /// Loaded lazily per folder.
    thumbnails: HashMap<Uuid, HashMap<String, Vec<u8>>>,
    dirty_blobs: HashSet<Uuid>,
    removed_folders: HashSet<Uuid>,
    has_changes: bool,
}

impl CatalogStore {
    /// Open (creating if needed) the store under `store_dir` and load folders and assets.
    pub fn open(store_dir: &Path) -> Result<Self> {
        let tables_dir = store_dir.join(StoreLayout::TABLES_DIR);
        let blobs_dir = store_dir.join(StoreLayout::BLOBS_DIR);
        for dir in [&tables_dir, &blobs_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create store dir {}", dir.display()))?;
        }
        let conn = open_db(&tables_dir.join(StoreLayout::CATALOG_DB))?;
        let folders = load_folders(&conn)?;
        let assets = load_assets(&conn)?;
        debug!(
            "loaded {} folders, {} assets from {}",
            folders.len(),
            assets.len(),
            store_dir.display()
        );

        let mut store = Self {
            tables_dir,
            blobs_dir,
            folders: BTreeMap::new(),
            folder_paths: HashMap::new(),
            assets: HashMap::new(),
            thumbnails: HashMap::new(),
            dirty_blobs: HashSet::new(),
            removed_folders: HashSet::new(),
            has_changes: false,
        };
        for folder in folders {
            store.insert_folder(folder);
        }
        for asset in assets {
            if store.folder_paths.contains_key(&asset.folder_id) {
                store
                    .assets
                    .entry(asset.folder_id)
                    .or_default()
                    .insert(asset.file_name.clone(), asset);
            }
        }
        Ok(store)
    }

    pub fn tables_dir(&self) -> &Path {
        &self.tables_dir
    }

    pub fn blobs_dir(&self) -> &Path {
        &self.blobs_dir
    }

    fn insert_folder(&mut self, folder: Folder) {
        self.folder_paths.insert(folder.id, folder.path.clone());
        self.folders.insert(folder.path.clone(), folder);
    }

    // ---- Queries ----

    pub fn get_folder_by_path(&self, path: &Path) -> Option<Folder> {
        self.folders.get(path).cloned()
    }

    pub fn get_folder_by_id(&self, id: Uuid) -> Option<Folder> {
        self.folder_paths
            .get(&id)
            .and_then(|p| self.folders.get(p))
            .cloned()
    }

    /// All folders in path order.
    pub fn get_folders(&self) -> Vec<Folder> {
        self.folders.values().cloned().collect()
    }

    /// Folders whose parent is exactly `parent`.
    pub fn get_subfolders(&self, parent: &Path) -> Vec<Folder> {
        self.folders
            .values()
            .filter(|f| f.path.parent() == Some(parent))
            .cloned()
            .collect()
    }

    /// Assets of one folder in file name order.
    pub fn get_assets_by_folder_id(&self, id: Uuid) -> Vec<Asset> {
        self.assets
            .get(&id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_assets_by_folder_path(&self, path: &Path) -> Vec<Asset> {
        self.folders
            .get(path)
            .map(|f| self.get_assets_by_folder_id(f.id))
            .unwrap_or_default()
    }

    /// Every asset, grouped by folder path order.
    pub fn get_cataloged_assets(&self) -> Vec<Asset> {
        self.folders
            .values()
            .flat_map(|f| self.assets.get(&f.id).into_iter().flat_map(|m| m.values()))
            .cloned()
            .collect()
    }

    pub fn get_asset(&self, folder_id: Uuid, file_name: &str) -> Option<Asset> {
        self.assets.get(&folder_id)?.get(file_name).cloned()
    }

    pub fn contains_asset(&self, folder_id: Uuid, file_name: &str) -> bool {
        self.assets
            .get(&folder_id)
            .is_some_and(|m| m.contains_key(file_name))
    }

    pub fn asset_count(&self) -> usize {
        self.assets.values().map(BTreeMap::len).sum()
    }

    /// True when memory differs from what was last loaded or persisted.
    pub fn has_changes(&self) -> bool {
        self.has_changes
    }

    /// Thumbnails of every folder loaded so far.
    pub fn get_thumbnail_index(&self) -> ThumbnailIndex {
        self.thumbnails
            .iter()
            .filter_map(|(id, thumbs)| Some((self.folder_paths.get(id)?.clone(), thumbs.clone())))
            .collect()
    }

    /// One thumbnail, loading the folder's blobs on first access.
    pub fn load_thumbnail(&mut self, folder_id: Uuid, file_name: &str) -> Result<Option<Vec<u8>>> {
        if !self.folder_paths.contains_key(&folder_id) {
            return Ok(None);
        }
        Ok(self.thumbnails_mut(folder_id)?.get(file_name).cloned())
    }

    /// Fill `asset.image_data` with its thumbnail bytes.
    pub fn load_image_data(&mut self, asset: &mut Asset) -> Result<()> {
        asset.image_data = self.load_thumbnail(asset.folder_id, &asset.file_name)?;
        Ok(())
    }

    fn thumbnails_mut(&mut self, folder_id: Uuid) -> Result<&mut HashMap<String, Vec<u8>>> {
        if !self.thumbnails.contains_key(&folder_id) {
            let loaded = read_folder_blobs(&self.blobs_dir, folder_id)?;
            self.thumbnails.insert(folder_id, loaded);
        }
        Ok(self.thumbnails.entry(folder_id).or_default())
    }

    // ---- Mutations ----

    /// Add a folder for `path`, or return the existing one.
    pub fn add_folder(&mut self, path: PathBuf) -> Folder {
        if let Some(existing) = self.folders.get(&path) {
            return existing.clone();
        }
        let folder = Folder::new(path);
        self.insert_folder(folder.clone());
        self.has_changes = true;
        folder
    }

    /// Remove a folder together with any assets and thumbnails it still holds.
    pub fn delete_folder(&mut self, id: Uuid) -> Option<Folder> {
        let path = self.folder_paths.remove(&id)?;
        let folder = self.folders.remove(&path)?;
        self.assets.remove(&id);
        self.thumbnails.remove(&id);
        self.dirty_blobs.remove(&id);
        self.removed_folders.insert(id);
        self.has_changes = true;
        Some(folder)
    }

    /// Insert or replace an asset and its thumbnail. The asset's folder must exist.
    pub fn upsert_asset(&mut self, mut asset: Asset, thumbnail: Vec<u8>) -> Result<()> {
        let folder_id = asset.folder_id;
        if !self.folder_paths.contains_key(&folder_id) {
            anyhow::bail!(
                "cannot catalog {}: folder {folder_id} is not in the catalog",
                asset.file_name
            );
        }
        asset.image_data = None;
        self.thumbnails_mut(folder_id)?
            .insert(asset.file_name.clone(), thumbnail);
        self.assets
            .entry(folder_id)
            .or_default()
            .insert(asset.file_name.clone(), asset);
        self.dirty_blobs.insert(folder_id);
        self.has_changes = true;
        Ok(())
    }

    /// Remove one asset and its thumbnail. Returns the removed record.
    pub fn delete_asset(&mut self, folder_id: Uuid, file_name: &str) -> Result<Option<Asset>> {
        let Some(removed) = self
            .assets
            .get_mut(&folder_id)
            .and_then(|m| m.remove(file_name))
        else {
            return Ok(None);
        };
        self.thumbnails_mut(folder_id)?.remove(file_name);
        self.dirty_blobs.insert(folder_id);
        self.has_changes = true;
        Ok(Some(removed))
    }

    /// Write tables and changed blob folders. Returns false when there was nothing to write.
    pub fn persist(&mut self) -> Result<bool> {
        if !self.has_changes {
            return Ok(false);
        }
        let mut conn = open_db(&self.tables_dir.join(StoreLayout::CATALOG_DB))?;
        let folders: Vec<Folder> = self.folders.values().cloned().collect();
        let written = write_catalog(
            &mut conn,
            &folders,
            self.assets.values().flat_map(|m| m.values()),
        )?;

        for id in self.removed_folders.drain() {
            remove_folder_blobs(&self.blobs_dir, id)?;
        }
        let dirty: Vec<Uuid> = self.dirty_blobs.drain().collect();
        for id in dirty {
            if let Some(thumbs) = self.thumbnails.get(&id) {
                write_folder_blobs(&self.blobs_dir, id, thumbs)?;
            }
        }
        self.has_changes = false;
        info!("catalog persisted: {} folders, {written} assets", folders.len());
        Ok(true)
    }
}
