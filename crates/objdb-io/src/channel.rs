use crate::error::{IoError, IoResult};

/// Non-buffered, positioned binary I/O.
///
/// All implementations must satisfy these invariants:
/// - Writes land at the cursor and advance it; writing past the end extends
///   the channel.
/// - Reads of `n` bytes return exactly `n` bytes or fail with
///   [`IoError::EndOfStream`] / [`IoError::TruncatedRead`].
/// - [`read_at`](Self::read_at) never moves the cursor.
/// - All I/O errors are propagated, never silently ignored.
///
/// Multi-byte integers written through the provided helpers are big-endian.
pub trait StorageChannel: Send {
    /// Current length in bytes.
    fn len(&self) -> IoResult<u64>;

    /// Returns `true` if the channel holds no bytes.
    fn is_empty(&self) -> IoResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Current cursor position.
    fn position(&self) -> u64;

    /// Move the cursor to an absolute position. Positions past the end are
    /// allowed; the next write fills the gap with zeros.
    fn set_position(&mut self, position: u64) -> IoResult<()>;

    /// Write one byte at the cursor.
    fn write_byte(&mut self, byte: u8) -> IoResult<()>;

    /// Write a block at the cursor.
    fn write_bytes(&mut self, bytes: &[u8]) -> IoResult<()>;

    /// Read one byte at the cursor.
    fn read_byte(&mut self) -> IoResult<u8>;

    /// Read exactly `size` bytes at the cursor.
    fn read_bytes(&mut self, size: usize) -> IoResult<Vec<u8>>;

    /// Read exactly `size` bytes at `position` without moving the cursor.
    fn read_at(&mut self, position: u64, size: usize) -> IoResult<Vec<u8>>;

    /// Whether the backing resource is removed when the channel is dropped.
    fn auto_delete(&self) -> bool;

    /// Toggle removal of the backing resource on drop.
    fn set_auto_delete(&mut self, enabled: bool);

    /// Push written data to stable storage.
    fn flush(&mut self) -> IoResult<()>;

    /// Move the cursor to the end and return that position.
    fn seek_end(&mut self) -> IoResult<u64> {
        let len = self.len()?;
        self.set_position(len)?;
        Ok(len)
    }

    fn write_u32(&mut self, value: u32) -> IoResult<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    fn write_u64(&mut self, value: u64) -> IoResult<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    fn read_u32(&mut self) -> IoResult<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes(to_array(&bytes)))
    }

    fn read_u64(&mut self) -> IoResult<u64> {
        let bytes = self.read_bytes(8)?;
        Ok(u64::from_be_bytes(to_array(&bytes)))
    }

    fn read_u32_at(&mut self, position: u64) -> IoResult<u32> {
        let bytes = self.read_at(position, 4)?;
        Ok(u32::from_be_bytes(to_array(&bytes)))
    }

    fn read_u64_at(&mut self, position: u64) -> IoResult<u64> {
        let bytes = self.read_at(position, 8)?;
        Ok(u64::from_be_bytes(to_array(&bytes)))
    }
}

impl<C: StorageChannel + ?Sized> StorageChannel for Box<C> {
    fn len(&self) -> IoResult<u64> {
        (**self).len()
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn set_position(&mut self, position: u64) -> IoResult<()> {
        (**self).set_position(position)
    }

    fn write_byte(&mut self, byte: u8) -> IoResult<()> {
        (**self).write_byte(byte)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> IoResult<()> {
        (**self).write_bytes(bytes)
    }

    fn read_byte(&mut self) -> IoResult<u8> {
        (**self).read_byte()
    }

    fn read_bytes(&mut self, size: usize) -> IoResult<Vec<u8>> {
        (**self).read_bytes(size)
    }

    fn read_at(&mut self, position: u64, size: usize) -> IoResult<Vec<u8>> {
        (**self).read_at(position, size)
    }

    fn auto_delete(&self) -> bool {
        (**self).auto_delete()
    }

    fn set_auto_delete(&mut self, enabled: bool) {
        (**self).set_auto_delete(enabled)
    }

    fn flush(&mut self) -> IoResult<()> {
        (**self).flush()
    }
}

/// Check that `size` bytes can be read at `position` of a channel of `len`
/// bytes.
pub(crate) fn check_available(len: u64, position: u64, size: usize) -> IoResult<()> {
    if size == 0 {
        return Ok(());
    }
    if position >= len {
        return Err(IoError::EndOfStream { position });
    }
    let available = len - position;
    if available < size as u64 {
        return Err(IoError::TruncatedRead {
            position,
            expected: size,
            available,
        });
    }
    Ok(())
}

fn to_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut arr = [0u8; N];
    arr.copy_from_slice(&bytes[..N]);
    arr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_read_is_always_available() {
        assert!(check_available(0, 10, 0).is_ok());
    }

    #[test]
    fn read_past_end_is_end_of_stream() {
        let err = check_available(10, 10, 1).unwrap_err();
        assert!(matches!(err, IoError::EndOfStream { position: 10 }));
    }

    #[test]
    fn partial_read_is_truncated() {
        let err = check_available(10, 8, 4).unwrap_err();
        assert!(matches!(
            err,
            IoError::TruncatedRead {
                position: 8,
                expected: 4,
                available: 2
            }
        ));
    }
}
