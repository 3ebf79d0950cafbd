use serde::{Deserialize, Serialize};

/// When a file channel forces its data to stable storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// `fsync` after every write (safest, highest latency).
    EveryWrite,
    /// `fsync` only on an explicit [`flush`](crate::StorageChannel::flush).
    #[default]
    OnFlush,
}

/// Configuration for opening a storage channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Sync strategy for file-backed channels.
    pub sync_mode: SyncMode,
    /// Remove the backing file when the channel is dropped.
    pub auto_delete: bool,
    /// Create missing parent directories when opening a file.
    pub create_parent_dirs: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            sync_mode: SyncMode::default(),
            auto_delete: false,
            create_parent_dirs: true,
        }
    }
}

impl ChannelConfig {
    /// A configuration for scratch files that disappear on drop.
    pub fn scratch() -> Self {
        Self {
            auto_delete: true,
            ..Default::default()
        }
    }
}
