use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use objdb_meta::{Describe, TypeRegistry};

use crate::config::BTreeConfig;
use crate::error::{BTreeError, BTreeResult};
use crate::iter::{Direction, Iter};
use crate::mode::{Multi, Removal, Single, ValueMode};
use crate::node::{Node, NodeHandle};
use crate::persister::{NodePersister, TreeRoot};

/// B-tree keeping one value per key.
pub type SingleValueBTree<K, V, P> = BTree<K, Single<V>, P>;

/// B-tree keeping every value inserted under a key.
pub type MultiValueBTree<K, V, P> = BTree<K, Multi<V>, P>;

type Slot<M> = <M as ValueMode>::Slot;

/// Result of inserting into a subtree.
enum Inserted<K, S> {
    /// The subtree root was rewritten under a new handle.
    Fit(NodeHandle),
    /// The subtree root overflowed and was split around a median entry.
    Split {
        left: NodeHandle,
        key: K,
        slot: S,
        right: NodeHandle,
    },
}

/// Result of deleting from a subtree.
enum Deleted<K, S> {
    NotFound,
    /// The subtree root, modified but not yet saved, so the parent can
    /// repair an underflow before writing it.
    Changed { node: Node<K, S>, removed: u64 },
}

/// What a delete removes under the matching key.
enum Target<'a, V> {
    All,
    Value(&'a V),
}

/// Copy-on-write B-tree.
///
/// The tree itself holds only its root record; nodes are demand-loaded
/// through the persister on every operation. Mutations take `&mut self`;
/// see [`SharedBTree`](crate::SharedBTree) for cross-thread use.
pub struct BTree<K, M: ValueMode, P> {
    root: TreeRoot,
    config: BTreeConfig,
    persister: P,
    _entry: PhantomData<fn() -> (K, M)>,
}

impl<K, M, P> BTree<K, M, P>
where
    K: Ord + Clone + Serialize + DeserializeOwned + Describe,
    M: ValueMode,
    P: NodePersister<K, Slot<M>>,
{
    /// Create an empty tree and commit its root record.
    ///
    /// Any root already held by `persister` is replaced.
    pub fn create(
        name: impl Into<String>,
        registry: &TypeRegistry,
        config: BTreeConfig,
        persister: P,
    ) -> BTreeResult<Self> {
        config.validate()?;
        let key_type = registry.resolve_type::<K>();
        if !key_type.is_orderable() {
            return Err(BTreeError::NonOrderableKeyType {
                type_name: key_type.name().to_string(),
            });
        }

        let root = TreeRoot {
            name: name.into(),
            order: config.order,
            size: 0,
            height: 0,
            root: None,
            key_type: key_type.name().to_string(),
            multi: M::MULTI,
        };
        persister.commit_root(&root)?;
        info!(tree = %root.name, order = root.order, key_type = %root.key_type, multi = root.multi, "created tree");

        Ok(Self {
            root,
            config,
            persister,
            _entry: PhantomData,
        })
    }

    /// Rebind a tree to the root record stored in `persister`.
    pub fn open(registry: &TypeRegistry, persister: P) -> BTreeResult<Self> {
        let root = persister.load_root()?.ok_or(BTreeError::MissingRoot)?;

        let key_type = registry.resolve_type::<K>();
        if root.key_type != key_type.name() {
            return Err(BTreeError::RootMismatch(format!(
                "stored key type {} but opened with {}",
                root.key_type,
                key_type.name()
            )));
        }
        if root.multi != M::MULTI {
            return Err(BTreeError::RootMismatch(format!(
                "stored multi={} but opened with multi={}",
                root.multi,
                M::MULTI
            )));
        }
        let config = BTreeConfig::with_order(root.order);
        config.validate()?;

        info!(tree = %root.name, size = root.size, height = root.height, "opened tree");
        Ok(Self {
            root,
            config,
            persister,
            _entry: PhantomData,
        })
    }
}

impl<K, M, P> BTree<K, M, P>
where
    K: Ord + Clone,
    M: ValueMode,
    P: NodePersister<K, Slot<M>>,
{
    pub fn name(&self) -> &str {
        &self.root.name
    }

    pub fn order(&self) -> usize {
        self.config.order
    }

    /// Number of key/value associations.
    pub fn size(&self) -> u64 {
        self.root.size
    }

    pub fn is_empty(&self) -> bool {
        self.root.size == 0
    }

    /// Number of node levels; `0` for an empty tree.
    pub fn height(&self) -> u32 {
        self.root.height
    }

    /// The committed root record.
    pub fn root_record(&self) -> &TreeRoot {
        &self.root
    }

    pub fn persister(&self) -> &P {
        &self.persister
    }

    pub fn into_persister(self) -> P {
        self.persister
    }

    pub(crate) fn load(&self, handle: NodeHandle) -> BTreeResult<Node<K, Slot<M>>> {
        self.persister.load(handle)
    }

    /// The slot stored under `key`.
    pub fn find(&self, key: &K) -> BTreeResult<Option<Slot<M>>> {
        let mut next = self.root.root;
        while let Some(handle) = next {
            let node = self.load(handle)?;
            match node.keys.binary_search(key) {
                Ok(index) => return Ok(node.slots.into_iter().nth(index)),
                Err(index) => next = node.children.get(index).copied(),
            }
        }
        Ok(None)
    }

    pub fn contains(&self, key: &K) -> BTreeResult<bool> {
        Ok(self.find(key)?.is_some())
    }

    /// Lazy in-order traversal. Each call starts a fresh pass.
    pub fn iter(&self, direction: Direction) -> Iter<'_, K, M, P> {
        Iter::new(self, direction)
    }

    /// Insert a value. A single-value tree replaces the value of an
    /// existing key; a multi-value tree appends to it.
    pub fn insert(&mut self, key: K, value: M::Value) -> BTreeResult<()> {
        let mut retired = Vec::new();
        let mut next = self.root.clone();

        match self.root.root {
            None => {
                let handle = self.persister.save(&Node::leaf(key, M::new_slot(value)))?;
                next.root = Some(handle);
                next.height = 1;
                next.size += 1;
            }
            Some(root) => {
                let (inserted, added) = self.insert_into(root, key, value, &mut retired)?;
                next.size += added;
                match inserted {
                    Inserted::Fit(handle) => next.root = Some(handle),
                    Inserted::Split {
                        left,
                        key,
                        slot,
                        right,
                    } => {
                        let node = Node {
                            keys: vec![key],
                            slots: vec![slot],
                            children: vec![left, right],
                        };
                        next.root = Some(self.persister.save(&node)?);
                        next.height += 1;
                        debug!(height = next.height, "root split");
                    }
                }
            }
        }

        self.commit(next, retired)
    }

    /// Remove a key with all its values. Returns `false` if absent.
    pub fn delete(&mut self, key: &K) -> BTreeResult<bool> {
        self.delete_target(key, Target::All)
    }

    /// Remove one value under `key`, dropping the key once it holds no
    /// values. Returns `false` if the pair is absent.
    pub fn delete_value(&mut self, key: &K, value: &M::Value) -> BTreeResult<bool> {
        self.delete_target(key, Target::Value(value))
    }

    fn delete_target(&mut self, key: &K, target: Target<'_, M::Value>) -> BTreeResult<bool> {
        let Some(root) = self.root.root else {
            return Ok(false);
        };
        let mut retired = Vec::new();
        let (node, removed) = match self.delete_from(root, key, &target, &mut retired)? {
            Deleted::NotFound => return Ok(false),
            Deleted::Changed { node, removed } => (node, removed),
        };

        let mut next = self.root.clone();
        next.size -= removed;
        if !node.is_empty() {
            next.root = Some(self.persister.save(&node)?);
        } else if node.is_leaf() {
            next.root = None;
            next.height = 0;
        } else {
            // Only child of an emptied root; already saved.
            next.root = node.children.first().copied();
            next.height -= 1;
            debug!(height = next.height, "root collapsed");
        }

        self.commit(next, retired)?;
        Ok(true)
    }

    /// Commit `next` as the new root record, then release retired nodes.
    fn commit(&mut self, next: TreeRoot, retired: Vec<NodeHandle>) -> BTreeResult<()> {
        self.persister.commit_root(&next)?;
        self.root = next;
        debug!(size = self.root.size, height = self.root.height, "root committed");

        for handle in retired {
            if let Err(e) = self.persister.delete(handle) {
                warn!(%handle, error = %e, "failed to release retired node");
            }
        }
        Ok(())
    }

    fn insert_into(
        &self,
        handle: NodeHandle,
        key: K,
        value: M::Value,
        retired: &mut Vec<NodeHandle>,
    ) -> BTreeResult<(Inserted<K, Slot<M>>, u64)> {
        let mut node = self.load(handle)?;
        retired.push(handle);

        let added = match node.keys.binary_search(&key) {
            Ok(index) => M::absorb(&mut node.slots[index], value),
            Err(index) if node.is_leaf() => {
                node.keys.insert(index, key);
                node.slots.insert(index, M::new_slot(value));
                1
            }
            Err(index) => {
                let (inserted, added) =
                    self.insert_into(node.children[index], key, value, retired)?;
                match inserted {
                    Inserted::Fit(child) => node.children[index] = child,
                    Inserted::Split {
                        left,
                        key,
                        slot,
                        right,
                    } => {
                        node.children[index] = left;
                        node.keys.insert(index, key);
                        node.slots.insert(index, slot);
                        node.children.insert(index + 1, right);
                    }
                }
                added
            }
        };

        if node.len() <= self.config.max_keys() {
            return Ok((Inserted::Fit(self.persister.save(&node)?), added));
        }

        let (key, slot, right) = node.split_at(self.config.order / 2);
        debug!(left = node.len(), right = right.len(), "node split");
        let left = self.persister.save(&node)?;
        let right = self.persister.save(&right)?;
        Ok((
            Inserted::Split {
                left,
                key,
                slot,
                right,
            },
            added,
        ))
    }

    fn delete_from(
        &self,
        handle: NodeHandle,
        key: &K,
        target: &Target<'_, M::Value>,
        retired: &mut Vec<NodeHandle>,
    ) -> BTreeResult<Deleted<K, Slot<M>>> {
        let mut node = self.load(handle)?;

        let removed = match node.keys.binary_search(key) {
            Ok(index) => {
                let (removed, drop_key) = match target {
                    Target::All => (M::len(&node.slots[index]), true),
                    Target::Value(value) => match M::remove(&mut node.slots[index], value) {
                        Removal::NotFound => return Ok(Deleted::NotFound),
                        Removal::Removed { now_empty } => (1, now_empty),
                    },
                };
                if drop_key {
                    if node.is_leaf() {
                        node.keys.remove(index);
                        node.slots.remove(index);
                    } else {
                        // Replace with the in-order predecessor.
                        let (child, key, slot) = self.remove_max(node.children[index], retired)?;
                        node.keys[index] = key;
                        node.slots[index] = slot;
                        self.repair_child(&mut node, index, child, retired)?;
                    }
                }
                removed
            }
            Err(_) if node.is_leaf() => return Ok(Deleted::NotFound),
            Err(index) => match self.delete_from(node.children[index], key, target, retired)? {
                Deleted::NotFound => return Ok(Deleted::NotFound),
                Deleted::Changed {
                    node: child,
                    removed,
                } => {
                    self.repair_child(&mut node, index, child, retired)?;
                    removed
                }
            },
        };

        retired.push(handle);
        Ok(Deleted::Changed { node, removed })
    }

    /// Remove the greatest entry of a subtree, returning the modified
    /// (unsaved) subtree root and the entry.
    fn remove_max(
        &self,
        handle: NodeHandle,
        retired: &mut Vec<NodeHandle>,
    ) -> BTreeResult<(Node<K, Slot<M>>, K, Slot<M>)> {
        let mut node = self.load(handle)?;
        retired.push(handle);

        if node.is_leaf() {
            let (Some(key), Some(slot)) = (node.keys.pop(), node.slots.pop()) else {
                return Err(BTreeError::CorruptNode {
                    handle,
                    reason: "empty leaf".into(),
                });
            };
            return Ok((node, key, slot));
        }

        let last = node.children.len() - 1;
        let (child, key, slot) = self.remove_max(node.children[last], retired)?;
        self.repair_child(&mut node, last, child, retired)?;
        Ok((node, key, slot))
    }

    /// Save the modified child at `index` of `parent`, first borrowing from
    /// or merging with a sibling if it fell below the minimum occupancy.
    fn repair_child(
        &self,
        parent: &mut Node<K, Slot<M>>,
        index: usize,
        mut child: Node<K, Slot<M>>,
        retired: &mut Vec<NodeHandle>,
    ) -> BTreeResult<()> {
        let min = self.config.min_keys();
        if child.len() >= min {
            parent.children[index] = self.persister.save(&child)?;
            return Ok(());
        }

        if index > 0 {
            let left_handle = parent.children[index - 1];
            let mut left = self.load(left_handle)?;
            if left.len() > min {
                // Rotate right through the separator.
                let (Some(key), Some(slot)) = (left.keys.pop(), left.slots.pop()) else {
                    return Err(BTreeError::CorruptNode {
                        handle: left_handle,
                        reason: "empty sibling".into(),
                    });
                };
                let key = std::mem::replace(&mut parent.keys[index - 1], key);
                let slot = std::mem::replace(&mut parent.slots[index - 1], slot);
                child.keys.insert(0, key);
                child.slots.insert(0, slot);
                if let Some(grandchild) = left.children.pop() {
                    child.children.insert(0, grandchild);
                }
                retired.push(left_handle);
                parent.children[index - 1] = self.persister.save(&left)?;
                parent.children[index] = self.persister.save(&child)?;
                return Ok(());
            }
        }

        if index + 1 < parent.children.len() {
            let right_handle = parent.children[index + 1];
            let mut right = self.load(right_handle)?;
            if right.len() > min {
                // Rotate left through the separator.
                let key = std::mem::replace(&mut parent.keys[index], right.keys.remove(0));
                let slot = std::mem::replace(&mut parent.slots[index], right.slots.remove(0));
                child.keys.push(key);
                child.slots.push(slot);
                if !right.is_leaf() {
                    child.children.push(right.children.remove(0));
                }
                retired.push(right_handle);
                parent.children[index] = self.persister.save(&child)?;
                parent.children[index + 1] = self.persister.save(&right)?;
                return Ok(());
            }
        }

        if index > 0 {
            let left_handle = parent.children[index - 1];
            let mut left = self.load(left_handle)?;
            let separator = (parent.keys.remove(index - 1), parent.slots.remove(index - 1));
            parent.children.remove(index);
            left.absorb_right(separator, child);
            retired.push(left_handle);
            parent.children[index - 1] = self.persister.save(&left)?;
            debug!(keys = left.len(), "merged into left sibling");
        } else {
            let right_handle = parent.children[index + 1];
            let right = self.load(right_handle)?;
            let separator = (parent.keys.remove(index), parent.slots.remove(index));
            parent.children.remove(index + 1);
            child.absorb_right(separator, right);
            retired.push(right_handle);
            parent.children[index] = self.persister.save(&child)?;
            debug!(keys = child.len(), "merged with right sibling");
        }
        Ok(())
    }

    /// Check every structural invariant of the stored tree.
    pub fn verify(&self) -> BTreeResult<()> {
        let Some(root) = self.root.root else {
            if self.root.size != 0 || self.root.height != 0 {
                return Err(BTreeError::RootMismatch(format!(
                    "empty tree with size {} and height {}",
                    self.root.size, self.root.height
                )));
            }
            return Ok(());
        };

        let mut size = 0;
        self.verify_node(root, None, None, 1, true, &mut size)?;
        if size != self.root.size {
            return Err(BTreeError::CorruptNode {
                handle: root,
                reason: format!("tree holds {size} values, root says {}", self.root.size),
            });
        }
        Ok(())
    }

    fn verify_node(
        &self,
        handle: NodeHandle,
        lower: Option<&K>,
        upper: Option<&K>,
        depth: u32,
        is_root: bool,
        size: &mut u64,
    ) -> BTreeResult<()> {
        let node = self.load(handle)?;
        let corrupt = |reason: String| BTreeError::CorruptNode { handle, reason };

        if node.slots.len() != node.len() {
            return Err(corrupt(format!(
                "{} keys but {} slots",
                node.len(),
                node.slots.len()
            )));
        }
        if node.len() > self.config.max_keys() {
            return Err(corrupt(format!("{} keys exceed the maximum", node.len())));
        }
        let min = if is_root { 1 } else { self.config.min_keys() };
        if node.len() < min {
            return Err(corrupt(format!("{} keys below the minimum {min}", node.len())));
        }
        if node.keys.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(corrupt("keys out of order".into()));
        }
        let (Some(first), Some(last)) = (node.keys.first(), node.keys.last()) else {
            return Err(corrupt("empty node".into()));
        };
        if lower.is_some_and(|lower| first <= lower) || upper.is_some_and(|upper| last >= upper) {
            return Err(corrupt("key outside the parent's separator range".into()));
        }
        for slot in &node.slots {
            let len = M::len(slot);
            if len == 0 {
                return Err(corrupt("empty value slot".into()));
            }
            *size += len;
        }

        if node.is_leaf() {
            if depth != self.root.height {
                return Err(corrupt(format!(
                    "leaf at depth {depth}, tree height {}",
                    self.root.height
                )));
            }
            return Ok(());
        }

        if node.children.len() != node.len() + 1 {
            return Err(corrupt(format!(
                "{} keys but {} children",
                node.len(),
                node.children.len()
            )));
        }
        for (index, child) in node.children.iter().enumerate() {
            let lower = if index == 0 { lower } else { node.keys.get(index - 1) };
            let upper = node.keys.get(index).or(upper);
            self.verify_node(*child, lower, upper, depth + 1, false, size)?;
        }
        Ok(())
    }
}

impl<K, M: ValueMode, P> std::fmt::Debug for BTree<K, M, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BTree")
            .field("name", &self.root.name)
            .field("order", &self.config.order)
            .field("size", &self.root.size)
            .field("height", &self.root.height)
            .finish()
    }
}
