use std::fmt;

use serde::{Deserialize, Serialize};

/// Absolute byte offset of a record inside a storage channel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position(u64);

impl Position {
    pub const fn new(offset: u64) -> Self {
        Self(offset)
    }

    pub const fn offset(&self) -> u64 {
        self.0
    }
}

impl From<u64> for Position {
    fn from(offset: u64) -> Self {
        Self(offset)
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({})", self.0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_offset() {
        let pos = Position::new(128);
        assert_eq!(pos.offset(), 128);
        assert_eq!(pos.to_string(), "@128");
        assert_eq!(Position::from(128), pos);
    }
}
