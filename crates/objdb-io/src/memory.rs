use crate::channel::{check_available, StorageChannel};
use crate::error::IoResult;

/// In-memory storage channel backed by a growable buffer.
///
/// Intended for tests and in-memory databases. The auto-delete flag is
/// recorded but has no effect: the buffer is released with the channel.
/// [`into_bytes`](Self::into_bytes) / [`from_bytes`](Self::from_bytes)
/// stand in for closing and reopening a file.
#[derive(Clone, Default)]
pub struct MemoryChannel {
    data: Vec<u8>,
    cursor: u64,
    auto_delete: bool,
}

impl MemoryChannel {
    /// Create a new empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reopen a channel over previously written bytes, cursor at zero.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data,
            cursor: 0,
            auto_delete: false,
        }
    }

    /// The full contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the channel and return its contents.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Mutable access to the raw buffer, for corruption tests.
    pub fn bytes_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    fn write_at_cursor(&mut self, bytes: &[u8]) {
        let start = self.cursor as usize;
        let end = start + bytes.len();
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(bytes);
        self.cursor = end as u64;
    }
}

impl StorageChannel for MemoryChannel {
    fn len(&self) -> IoResult<u64> {
        Ok(self.data.len() as u64)
    }

    fn position(&self) -> u64 {
        self.cursor
    }

    fn set_position(&mut self, position: u64) -> IoResult<()> {
        self.cursor = position;
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> IoResult<()> {
        self.write_at_cursor(&[byte]);
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> IoResult<()> {
        self.write_at_cursor(bytes);
        Ok(())
    }

    fn read_byte(&mut self) -> IoResult<u8> {
        check_available(self.data.len() as u64, self.cursor, 1)?;
        let byte = self.data[self.cursor as usize];
        self.cursor += 1;
        Ok(byte)
    }

    fn read_bytes(&mut self, size: usize) -> IoResult<Vec<u8>> {
        let bytes = self.read_at(self.cursor, size)?;
        self.cursor += size as u64;
        Ok(bytes)
    }

    fn read_at(&mut self, position: u64, size: usize) -> IoResult<Vec<u8>> {
        check_available(self.data.len() as u64, position, size)?;
        let start = position as usize;
        Ok(self.data[start..start + size].to_vec())
    }

    fn auto_delete(&self) -> bool {
        self.auto_delete
    }

    fn set_auto_delete(&mut self, enabled: bool) {
        self.auto_delete = enabled;
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

impl std::fmt::Debug for MemoryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryChannel")
            .field("len", &self.data.len())
            .field("cursor", &self.cursor)
            .finish()
    }
}
