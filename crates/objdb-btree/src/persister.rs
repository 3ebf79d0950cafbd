use serde::{Deserialize, Serialize};

use crate::error::BTreeResult;
use crate::node::{Node, NodeHandle};

/// Durable description of a tree, committed after every mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeRoot {
    pub name: String,
    pub order: usize,
    /// Number of key/value associations.
    pub size: u64,
    /// Number of node levels; `0` for an empty tree.
    pub height: u32,
    pub root: Option<NodeHandle>,
    /// Canonical name of the key type.
    pub key_type: String,
    /// Multi-value variant.
    pub multi: bool,
}

/// Turns nodes into durable storage and back.
///
/// Nodes are immutable once saved: `save` always returns a fresh handle.
/// `commit_root` must be atomic with respect to `load_root`.
pub trait NodePersister<K, S>: Send + Sync {
    fn load(&self, handle: NodeHandle) -> BTreeResult<Node<K, S>>;

    fn save(&self, node: &Node<K, S>) -> BTreeResult<NodeHandle>;

    /// Release a node no committed root refers to.
    fn delete(&self, handle: NodeHandle) -> BTreeResult<()>;

    fn commit_root(&self, root: &TreeRoot) -> BTreeResult<()>;

    fn load_root(&self) -> BTreeResult<Option<TreeRoot>>;
}
