use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use objdb_io::ChannelConfig;

/// File layout and channel settings of a file-backed store.
///
/// Every file name is relative to the store directory.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    pub channel: ChannelConfig,
    /// Appended object and class record frames.
    pub records_file: String,
    /// Identity table for object identifiers.
    pub object_ids_file: String,
    /// Identity table for class identifiers.
    pub class_ids_file: String,
    /// Dynamic part of the type registry.
    pub catalog_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            records_file: "records.odb".into(),
            object_ids_file: "objects.oid".into(),
            class_ids_file: "classes.oid".into(),
            catalog_file: "types.cat".into(),
        }
    }
}

impl StoreConfig {
    pub fn records_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.records_file)
    }

    pub fn object_ids_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.object_ids_file)
    }

    pub fn class_ids_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.class_ids_file)
    }

    pub fn catalog_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.catalog_file)
    }
}
