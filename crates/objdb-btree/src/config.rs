use serde::{Deserialize, Serialize};

use crate::error::{BTreeError, BTreeResult};

/// Smallest order that keeps a B-tree balanced.
pub const MIN_ORDER: usize = 3;

/// Configuration for a [`BTree`](crate::BTree).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BTreeConfig {
    /// Maximum number of children of an internal node.
    pub order: usize,
}

impl Default for BTreeConfig {
    fn default() -> Self {
        Self { order: 50 }
    }
}

impl BTreeConfig {
    pub fn with_order(order: usize) -> Self {
        Self { order }
    }

    pub fn validate(&self) -> BTreeResult<()> {
        if self.order < MIN_ORDER {
            return Err(BTreeError::InvalidOrder(self.order));
        }
        Ok(())
    }

    /// Maximum keys in any node.
    pub fn max_keys(&self) -> usize {
        self.order - 1
    }

    /// Minimum keys in a non-root node.
    pub fn min_keys(&self) -> usize {
        self.order.div_ceil(2) - 1
    }
}
