use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable address of a stored node, assigned by the persister.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeHandle(u64);

impl NodeHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeHandle({})", self.0)
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One B-tree node.
///
/// Keys and value slots are stored in every node. An internal node has
/// exactly one more child than keys; a leaf has none.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node<K, S> {
    pub keys: Vec<K>,
    pub slots: Vec<S>,
    pub children: Vec<NodeHandle>,
}

impl<K, S> Node<K, S> {
    pub fn leaf(key: K, slot: S) -> Self {
        Self {
            keys: vec![key],
            slots: vec![slot],
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Split off the upper half, returning the median entry and the new
    /// right sibling. `self` keeps the keys below the median.
    pub(crate) fn split_at(&mut self, mid: usize) -> (K, S, Node<K, S>) {
        let mut right_keys = self.keys.split_off(mid);
        let mut right_slots = self.slots.split_off(mid);
        let right_children = if self.is_leaf() {
            Vec::new()
        } else {
            self.children.split_off(mid + 1)
        };
        let key = right_keys.remove(0);
        let slot = right_slots.remove(0);
        let right = Node {
            keys: right_keys,
            slots: right_slots,
            children: right_children,
        };
        (key, slot, right)
    }

    /// Append `separator` and every entry of `right` to `self`.
    pub(crate) fn absorb_right(&mut self, separator: (K, S), right: Node<K, S>) {
        self.keys.push(separator.0);
        self.slots.push(separator.1);
        self.keys.extend(right.keys);
        self.slots.extend(right.slots);
        self.children.extend(right.children);
    }
}
