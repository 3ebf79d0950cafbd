//! Raw storage channels for objdb.
//!
//! A storage channel is a byte-addressable, seekable store with a write
//! cursor. It performs no buffering or caching of its own: every call reaches
//! the backing resource before returning. The index and object layers build
//! their on-disk formats on top of it.
//!
//! # Backends
//!
//! - [`MemoryChannel`] -- growable in-memory buffer, for tests and in-memory
//!   databases
//! - [`FileChannel`] -- local file, optionally deleted when dropped
//!
//! # Read Contract
//!
//! A read of `n` bytes returns exactly `n` bytes or fails:
//! [`IoError::EndOfStream`] when nothing is available at the position,
//! [`IoError::TruncatedRead`] when fewer than `n` bytes are. Short reads are
//! never padded.
//!
//! # Framing
//!
//! [`frame`] provides length + CRC32 framed records shared by every persisted
//! format in the workspace.

pub mod channel;
pub mod config;
pub mod error;
pub mod file;
pub mod frame;
pub mod memory;

pub use channel::StorageChannel;
pub use config::{ChannelConfig, SyncMode};
pub use error::{IoError, IoResult};
pub use file::FileChannel;
pub use frame::{push_frame, read_frame_at, write_frame, FRAME_HEADER_SIZE};
pub use memory::MemoryChannel;
