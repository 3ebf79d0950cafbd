use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::channel::{check_available, StorageChannel};
use crate::config::{ChannelConfig, SyncMode};
use crate::error::IoResult;

/// Storage channel backed by a local file.
///
/// The channel keeps its own cursor and seeks the file before every
/// operation, so positioned reads never disturb the write cursor. Nothing is
/// buffered in user space: each call reaches the OS before returning, and
/// with [`SyncMode::EveryWrite`] each write is also synced to disk.
pub struct FileChannel {
    file: File,
    path: PathBuf,
    cursor: u64,
    sync_mode: SyncMode,
    auto_delete: bool,
}

impl FileChannel {
    /// Open (or create) the file at `path`, keeping existing contents.
    pub fn open(path: &Path, config: &ChannelConfig) -> IoResult<Self> {
        Self::open_with(path, config, false)
    }

    /// Create the file at `path`, discarding any existing contents.
    pub fn create(path: &Path, config: &ChannelConfig) -> IoResult<Self> {
        Self::open_with(path, config, true)
    }

    /// Create a channel over a fresh temporary file that is deleted on drop.
    pub fn temporary() -> IoResult<Self> {
        let (file, path) = tempfile::NamedTempFile::new()?
            .keep()
            .map_err(|e| e.error)?;
        debug!(path = %path.display(), "opened temporary channel");
        Ok(Self {
            file,
            path,
            cursor: 0,
            sync_mode: SyncMode::OnFlush,
            auto_delete: true,
        })
    }

    fn open_with(path: &Path, config: &ChannelConfig, truncate: bool) -> IoResult<Self> {
        if config.create_parent_dirs {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(truncate)
            .open(path)?;

        debug!(path = %path.display(), truncate, "opened file channel");
        Ok(Self {
            file,
            path: path.to_path_buf(),
            cursor: 0,
            sync_mode: config.sync_mode,
            auto_delete: config.auto_delete,
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_at_cursor(&mut self, bytes: &[u8]) -> IoResult<()> {
        self.file.seek(SeekFrom::Start(self.cursor))?;
        self.file.write_all(bytes)?;
        if matches!(self.sync_mode, SyncMode::EveryWrite) {
            self.file.sync_data()?;
        }
        self.cursor += bytes.len() as u64;
        Ok(())
    }
}

impl StorageChannel for FileChannel {
    fn len(&self) -> IoResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn position(&self) -> u64 {
        self.cursor
    }

    fn set_position(&mut self, position: u64) -> IoResult<()> {
        self.cursor = position;
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> IoResult<()> {
        self.write_at_cursor(&[byte])
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> IoResult<()> {
        self.write_at_cursor(bytes)
    }

    fn read_byte(&mut self) -> IoResult<u8> {
        let bytes = self.read_bytes(1)?;
        Ok(bytes[0])
    }

    fn read_bytes(&mut self, size: usize) -> IoResult<Vec<u8>> {
        let bytes = self.read_at(self.cursor, size)?;
        self.cursor += size as u64;
        Ok(bytes)
    }

    fn read_at(&mut self, position: u64, size: usize) -> IoResult<Vec<u8>> {
        check_available(self.len()?, position, size)?;
        let mut buf = vec![0u8; size];
        self.file.seek(SeekFrom::Start(position))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn auto_delete(&self) -> bool {
        self.auto_delete
    }

    fn set_auto_delete(&mut self, enabled: bool) {
        self.auto_delete = enabled;
    }

    fn flush(&mut self) -> IoResult<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

impl Drop for FileChannel {
    fn drop(&mut self) {
        if self.auto_delete {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "failed to delete channel file");
            }
        }
    }
}

impl std::fmt::Debug for FileChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileChannel")
            .field("path", &self.path)
            .field("cursor", &self.cursor)
            .field("auto_delete", &self.auto_delete)
            .finish()
    }
}
