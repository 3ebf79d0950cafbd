//! Fixed header shared by the channel-backed persisters.
//!
//! ```text
//! [4 bytes: magic]
//! [4 bytes: format version (big-endian u32)]
//! [8 bytes: root pointer (big-endian u64), 0 = no root]
//! ```

use objdb_io::{IoError, StorageChannel};

use crate::error::{BTreeError, BTreeResult};
use crate::node::NodeHandle;

pub(crate) const SUPERBLOCK_SIZE: u64 = 16;
const VERSION: u32 = 1;
const POINTER_OFFSET: u64 = 8;

/// Write a fresh superblock to an empty channel, or validate an existing one.
pub(crate) fn init_or_check<C: StorageChannel + ?Sized>(
    channel: &mut C,
    magic: &[u8; 4],
) -> BTreeResult<()> {
    if channel.is_empty()? {
        let mut header = Vec::with_capacity(SUPERBLOCK_SIZE as usize);
        header.extend_from_slice(magic);
        header.extend_from_slice(&VERSION.to_be_bytes());
        header.extend_from_slice(&0u64.to_be_bytes());
        channel.set_position(0)?;
        channel.write_bytes(&header)?;
        channel.flush()?;
        return Ok(());
    }
    check(channel, magic)
}

/// Validate the superblock of a non-empty channel without writing to it.
pub(crate) fn check<C: StorageChannel + ?Sized>(
    channel: &mut C,
    magic: &[u8; 4],
) -> BTreeResult<()> {
    let found = channel.read_at(0, 4)?;
    if found != magic {
        return Err(BTreeError::RootMismatch(format!(
            "bad superblock magic {found:?}"
        )));
    }
    let version = channel.read_u32_at(4)?;
    if version != VERSION {
        return Err(BTreeError::RootMismatch(format!(
            "unsupported superblock version {version}"
        )));
    }
    Ok(())
}

pub(crate) fn read_pointer<C: StorageChannel + ?Sized>(channel: &mut C) -> BTreeResult<u64> {
    Ok(channel.read_u64_at(POINTER_OFFSET)?)
}

pub(crate) fn write_pointer<C: StorageChannel + ?Sized>(
    channel: &mut C,
    pointer: u64,
) -> BTreeResult<()> {
    channel.set_position(POINTER_OFFSET)?;
    channel.write_u64(pointer)?;
    channel.flush()?;
    Ok(())
}

/// Map a failed node read to `CorruptNode`, keeping genuine I/O failures.
pub(crate) fn node_read_error(handle: NodeHandle, err: IoError) -> BTreeError {
    match err {
        IoError::CorruptFrame { reason, .. } => BTreeError::CorruptNode { handle, reason },
        err @ (IoError::EndOfStream { .. } | IoError::TruncatedRead { .. }) => {
            BTreeError::CorruptNode {
                handle,
                reason: err.to_string(),
            }
        }
        err => BTreeError::Io(err),
    }
}

pub(crate) fn encode<T: serde::Serialize>(value: &T) -> BTreeResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| BTreeError::Serialization(e.to_string()))
}
