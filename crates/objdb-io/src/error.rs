use std::io;

/// Errors produced by storage channels.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// I/O error from the backing file.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Nothing can be read at the requested position.
    #[error("end of stream at position {position}")]
    EndOfStream { position: u64 },

    /// Fewer bytes than requested are available.
    #[error("truncated read at position {position}: expected {expected} bytes, {available} available")]
    TruncatedRead {
        position: u64,
        expected: usize,
        available: u64,
    },

    /// A framed record failed its length or CRC check.
    #[error("corrupt frame at position {position}: {reason}")]
    CorruptFrame { position: u64, reason: String },
}

/// Result alias for channel operations.
pub type IoResult<T> = Result<T, IoError>;
