use std::collections::VecDeque;

use crate::error::{BTreeError, BTreeResult};
use crate::mode::ValueMode;
use crate::node::{Node, NodeHandle};
use crate::persister::NodePersister;
use crate::tree::BTree;

/// Traversal order of an [`Iter`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

struct Frame<K, S> {
    handle: NodeHandle,
    node: Node<K, S>,
    /// Entries of this node already yielded.
    index: usize,
    /// Whether the child before the next entry has been visited.
    descended: bool,
}

impl<K, S> Frame<K, S> {
    fn new(handle: NodeHandle, node: Node<K, S>) -> Self {
        Self {
            handle,
            node,
            index: 0,
            descended: false,
        }
    }
}

/// In-order traversal of a [`BTree`].
///
/// Nodes are loaded lazily, one root-to-leaf path at a time. Each item is a
/// single key/value pair; a key with several values yields one item per
/// value, in insertion order, whichever the direction.
///
/// A failed node load is yielded once as an error, after which the
/// iterator is exhausted.
pub struct Iter<'a, K, M: ValueMode, P> {
    tree: &'a BTree<K, M, P>,
    direction: Direction,
    start: Option<NodeHandle>,
    stack: Vec<Frame<K, M::Slot>>,
    pending: VecDeque<(K, M::Value)>,
}

impl<'a, K, M, P> Iter<'a, K, M, P>
where
    K: Ord + Clone,
    M: ValueMode,
    P: NodePersister<K, M::Slot>,
{
    pub(crate) fn new(tree: &'a BTree<K, M, P>, direction: Direction) -> Self {
        Self {
            tree,
            direction,
            start: tree.root_record().root,
            stack: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The next key and its slot.
    fn advance(&mut self) -> BTreeResult<Option<(K, M::Slot)>> {
        if let Some(root) = self.start.take() {
            let node = self.tree.load(root)?;
            self.stack.push(Frame::new(root, node));
        }

        let direction = self.direction;
        loop {
            let Some(frame) = self.stack.last_mut() else {
                return Ok(None);
            };
            let len = frame.node.len();

            if !frame.descended && !frame.node.is_leaf() {
                frame.descended = true;
                let child = frame.node.children[child_index(direction, len, frame.index)];
                let node = self.tree.load(child)?;
                self.stack.push(Frame::new(child, node));
                continue;
            }

            if frame.index < len {
                let at = key_index(direction, len, frame.index);
                frame.index += 1;
                frame.descended = false;
                let (Some(key), Some(slot)) = (frame.node.keys.get(at), frame.node.slots.get(at))
                else {
                    return Err(BTreeError::CorruptNode {
                        handle: frame.handle,
                        reason: format!("entry {at} missing"),
                    });
                };
                return Ok(Some((key.clone(), slot.clone())));
            }

            self.stack.pop();
        }
    }
}

fn key_index(direction: Direction, len: usize, step: usize) -> usize {
    match direction {
        Direction::Ascending => step,
        Direction::Descending => len - 1 - step,
    }
}

fn child_index(direction: Direction, len: usize, step: usize) -> usize {
    match direction {
        Direction::Ascending => step,
        Direction::Descending => len - step,
    }
}

impl<K, M, P> Iterator for Iter<'_, K, M, P>
where
    K: Ord + Clone,
    M: ValueMode,
    P: NodePersister<K, M::Slot>,
{
    type Item = BTreeResult<(K, M::Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return Some(Ok(entry));
            }
            match self.advance() {
                Ok(Some((key, slot))) => {
                    self.pending
                        .extend(M::values(&slot).into_iter().map(|v| (key.clone(), v)));
                }
                Ok(None) => return None,
                Err(e) => {
                    self.stack.clear();
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BTreeConfig;
    use crate::memory::MemoryPersister;
    use crate::tree::SingleValueBTree;
    use objdb_meta::TypeRegistry;

    type Tree = SingleValueBTree<u32, u32, MemoryPersister<u32, u32>>;

    fn tree(keys: impl IntoIterator<Item = u32>) -> Tree {
        let mut tree = Tree::create(
            "iter",
            &TypeRegistry::new(),
            BTreeConfig::with_order(3),
            MemoryPersister::new(),
        )
        .unwrap();
        for k in keys {
            tree.insert(k, k + 1).unwrap();
        }
        tree
    }

    #[test]
    fn empty_tree_yields_nothing() {
        let tree = tree([]);
        assert!(tree.iter(Direction::Ascending).next().is_none());
        assert!(tree.iter(Direction::Descending).next().is_none());
    }

    #[test]
    fn both_directions_cover_every_key() {
        let tree = tree((0..200).rev());
        let asc: Vec<_> = tree.iter(Direction::Ascending).map(|e| e.unwrap()).collect();
        assert_eq!(asc, (0..200).map(|k| (k, k + 1)).collect::<Vec<_>>());

        let desc: Vec<_> = tree.iter(Direction::Descending).map(|e| e.unwrap().0).collect();
        assert_eq!(desc, (0..200).rev().collect::<Vec<_>>());
    }

    #[test]
    fn passes_are_independent() {
        let tree = tree(0..10);
        let mut first = tree.iter(Direction::Ascending);
        first.next();
        first.next();
        assert_eq!(tree.iter(Direction::Ascending).count(), 10);
        assert_eq!(first.count(), 8);
    }

    #[test]
    fn missing_node_yields_one_error() {
        let tree = tree(0..20);
        let root = tree.root_record().root.unwrap();
        tree.persister().delete(root).unwrap();

        let mut iter = tree.iter(Direction::Descending);
        assert!(matches!(iter.next(), Some(Err(BTreeError::NodeNotFound(h))) if h == root));
        assert!(iter.next().is_none());
    }
}
