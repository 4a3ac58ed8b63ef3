//! Output layout.
//!
//! `<root>/<scope folder>/<item folder>/<item folder><suffix>.<ext>`

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::fs::naming::{asset_file_name, item_folder_name, scope_folder_name, sidecar_file_name};
use crate::media::{ContentItem, MediaAsset};

/// Where every file of one item goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemLayout {
    dir: PathBuf,
    folder: String,
}

impl ItemLayout {
    /// Layout of `item` under `root` for the given ledger scope.
    pub fn new(root: &Path, scope: &str, item: &ContentItem) -> Result<Self> {
        let folder = item_folder_name(item)?;
        let dir = root.join(scope_folder_name(scope)?).join(&folder);
        Ok(Self { dir, folder })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn asset_path(&self, asset: &MediaAsset) -> PathBuf {
        self.dir.join(asset_file_name(&self.folder, asset))
    }

    pub fn sidecar_path(&self) -> PathBuf {
        self.dir.join(sidecar_file_name(&self.folder))
    }
}
