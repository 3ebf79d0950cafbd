use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::error::{BTreeError, BTreeResult};
use crate::node::{Node, NodeHandle};
use crate::persister::{NodePersister, TreeRoot};

/// Node arena held in memory.
///
/// Handles are never reused. Intended for tests and in-memory indexes.
pub struct MemoryPersister<K, S> {
    nodes: RwLock<HashMap<NodeHandle, Node<K, S>>>,
    root: RwLock<Option<TreeRoot>>,
    next_handle: AtomicU64,
}

impl<K, S> MemoryPersister<K, S> {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            root: RwLock::new(None),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Number of nodes currently stored.
    pub fn node_count(&self) -> usize {
        self.nodes.read().expect("lock poisoned").len()
    }
}

impl<K, S> Default for MemoryPersister<K, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, S> NodePersister<K, S> for MemoryPersister<K, S>
where
    K: Clone + Send + Sync,
    S: Clone + Send + Sync,
{
    fn load(&self, handle: NodeHandle) -> BTreeResult<Node<K, S>> {
        self.nodes
            .read()
            .expect("lock poisoned")
            .get(&handle)
            .cloned()
            .ok_or(BTreeError::NodeNotFound(handle))
    }

    fn save(&self, node: &Node<K, S>) -> BTreeResult<NodeHandle> {
        let handle = NodeHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.nodes
            .write()
            .expect("lock poisoned")
            .insert(handle, node.clone());
        Ok(handle)
    }

    fn delete(&self, handle: NodeHandle) -> BTreeResult<()> {
        self.nodes.write().expect("lock poisoned").remove(&handle);
        Ok(())
    }

    fn commit_root(&self, root: &TreeRoot) -> BTreeResult<()> {
        *self.root.write().expect("lock poisoned") = Some(root.clone());
        Ok(())
    }

    fn load_root(&self) -> BTreeResult<Option<TreeRoot>> {
        Ok(self.root.read().expect("lock poisoned").clone())
    }
}

impl<K, S> std::fmt::Debug for MemoryPersister<K, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPersister")
            .field("node_count", &self.node_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_load_delete() {
        let persister = MemoryPersister::<u32, u32>::new();
        let a = persister.save(&Node::leaf(1, 10)).unwrap();
        let b = persister.save(&Node::leaf(2, 20)).unwrap();
        assert_ne!(a, b);
        assert_eq!(persister.load(a).unwrap().keys, vec![1]);

        persister.delete(a).unwrap();
        assert!(matches!(persister.load(a), Err(BTreeError::NodeNotFound(h)) if h == a));
        assert_eq!(persister.node_count(), 1);
    }

    #[test]
    fn root_roundtrip() {
        let persister = MemoryPersister::<u32, u32>::new();
        assert!(persister.load_root().unwrap().is_none());
        let root = TreeRoot {
            name: "t".into(),
            order: 4,
            size: 0,
            height: 0,
            root: None,
            key_type: "u32".into(),
            multi: false,
        };
        persister.commit_root(&root).unwrap();
        assert_eq!(persister.load_root().unwrap(), Some(root));
    }
}
