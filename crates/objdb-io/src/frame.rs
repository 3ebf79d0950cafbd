//! Length + CRC32 framed records.
//!
//! On-channel format:
//! ```text
//! [4 bytes: payload length (big-endian u32)]
//! [4 bytes: CRC32 of payload (big-endian u32)]
//! [N bytes: payload]
//! ```

use tracing::warn;

use crate::channel::StorageChannel;
use crate::error::{IoError, IoResult};

/// Header size: 4 bytes length + 4 bytes CRC.
pub const FRAME_HEADER_SIZE: u64 = 8;

/// Append a framed payload at the end of the channel. Returns the offset of
/// the frame header.
pub fn write_frame<C: StorageChannel + ?Sized>(channel: &mut C, payload: &[u8]) -> IoResult<u64> {
    let length = u32::try_from(payload.len()).map_err(|_| IoError::CorruptFrame {
        position: channel.position(),
        reason: format!("payload of {} bytes exceeds frame limit", payload.len()),
    })?;
    let offset = channel.seek_end()?;
    channel.write_bytes(&encode_frame(length, payload))?;
    Ok(offset)
}

/// Append a framed payload to an in-memory buffer, for formats that write a
/// whole region in one call.
pub fn push_frame(buf: &mut Vec<u8>, payload: &[u8]) -> IoResult<()> {
    let length = u32::try_from(payload.len()).map_err(|_| IoError::CorruptFrame {
        position: buf.len() as u64,
        reason: format!("payload of {} bytes exceeds frame limit", payload.len()),
    })?;
    buf.extend_from_slice(&encode_frame(length, payload));
    Ok(())
}

fn encode_frame(length: u32, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE as usize + payload.len());
    buf.extend_from_slice(&length.to_be_bytes());
    buf.extend_from_slice(&crc32fast::hash(payload).to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Read and verify the frame whose header starts at `position`.
///
/// A frame that runs past the end of the channel is reported as
/// `TruncatedRead`; a CRC mismatch as `CorruptFrame`.
pub fn read_frame_at<C: StorageChannel + ?Sized>(channel: &mut C, position: u64) -> IoResult<Vec<u8>> {
    let length = channel.read_u32_at(position)?;
    let expected_crc = channel.read_u32_at(position + 4)?;
    let payload = channel.read_at(position + FRAME_HEADER_SIZE, length as usize)?;

    let actual_crc = crc32fast::hash(&payload);
    if actual_crc != expected_crc {
        warn!(position, expected = expected_crc, actual = actual_crc, "frame CRC mismatch");
        return Err(IoError::CorruptFrame {
            position,
            reason: format!("crc mismatch: expected {expected_crc:#010x}, got {actual_crc:#010x}"),
        });
    }
    Ok(payload)
}
