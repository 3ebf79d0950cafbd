use std::sync::RwLock;

use crate::error::BTreeResult;
use crate::iter::Direction;
use crate::mode::ValueMode;
use crate::persister::NodePersister;
use crate::tree::BTree;

/// A [`BTree`] shared across threads.
///
/// Mutations serialize on a write lock; lookups and traversals run
/// concurrently under the read lock and always observe a committed root.
pub struct SharedBTree<K, M: ValueMode, P> {
    inner: RwLock<BTree<K, M, P>>,
}

impl<K, M, P> SharedBTree<K, M, P>
where
    K: Ord + Clone,
    M: ValueMode,
    P: NodePersister<K, M::Slot>,
{
    pub fn new(tree: BTree<K, M, P>) -> Self {
        Self {
            inner: RwLock::new(tree),
        }
    }

    pub fn insert(&self, key: K, value: M::Value) -> BTreeResult<()> {
        self.inner.write().expect("lock poisoned").insert(key, value)
    }

    pub fn delete(&self, key: &K) -> BTreeResult<bool> {
        self.inner.write().expect("lock poisoned").delete(key)
    }

    pub fn delete_value(&self, key: &K, value: &M::Value) -> BTreeResult<bool> {
        self.inner
            .write()
            .expect("lock poisoned")
            .delete_value(key, value)
    }

    pub fn find(&self, key: &K) -> BTreeResult<Option<M::Slot>> {
        self.inner.read().expect("lock poisoned").find(key)
    }

    pub fn contains(&self, key: &K) -> BTreeResult<bool> {
        self.inner.read().expect("lock poisoned").contains(key)
    }

    pub fn size(&self) -> u64 {
        self.inner.read().expect("lock poisoned").size()
    }

    pub fn height(&self) -> u32 {
        self.inner.read().expect("lock poisoned").height()
    }

    /// Run `f` against the tree under the read lock.
    pub fn with_read<R>(&self, f: impl FnOnce(&BTree<K, M, P>) -> R) -> R {
        f(&self.inner.read().expect("lock poisoned"))
    }

    /// Snapshot every pair in `direction`.
    pub fn collect(&self, direction: Direction) -> BTreeResult<Vec<(K, M::Value)>> {
        self.with_read(|tree| tree.iter(direction).collect())
    }

    pub fn into_inner(self) -> BTree<K, M, P> {
        self.inner.into_inner().expect("lock poisoned")
    }
}
