//! Nodes appended to a storage channel, addressed by offset.
//!
//! Channel format:
//! ```text
//! [16 bytes: superblock, magic "ODBT", root pointer = offset of the
//!            current root record frame]
//! [frame]*   bincode nodes and root records, appended in write order
//! ```
//!
//! The channel is append-only: `commit_root` appends the new root record and
//! then rewrites the 8-byte pointer, so a crash leaves either the old or the
//! new root reachable.

use std::marker::PhantomData;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use objdb_io::{read_frame_at, write_frame, StorageChannel};

use crate::error::{BTreeError, BTreeResult};
use crate::node::{Node, NodeHandle};
use crate::persister::{NodePersister, TreeRoot};
use crate::superblock::{self, encode, node_read_error, SUPERBLOCK_SIZE};

const MAGIC: &[u8; 4] = b"ODBT";

/// Offset-addressed node persister over a storage channel.
///
/// # Growth
///
/// The channel never shrinks. [`NodePersister::delete`] only retires a
/// handle; the node's bytes stay where they are. Each committed mutation on
/// a tree of height `h` appends at most `2h + 1` node frames (the copied
/// path, one sibling per level, and a new root on a root split) plus one
/// root record, so the file grows with the number of mutations, not with
/// the number of live entries. Reclaiming the space means copying the live
/// tree into a fresh channel.
pub struct ChannelPersister<K, S, C> {
    channel: Mutex<C>,
    _node: PhantomData<fn() -> (K, S)>,
}

impl<K, S, C: StorageChannel> ChannelPersister<K, S, C> {
    /// Open a persister over `channel`, writing a superblock if it is empty.
    pub fn open(mut channel: C) -> BTreeResult<Self> {
        superblock::init_or_check(&mut channel, MAGIC)?;
        Ok(Self {
            channel: Mutex::new(channel),
            _node: PhantomData,
        })
    }

    /// Close the persister, returning its channel.
    pub fn into_channel(self) -> C {
        self.channel.into_inner().expect("lock poisoned")
    }

    /// Current length of the backing channel.
    pub fn len(&self) -> BTreeResult<u64> {
        Ok(self.channel.lock().expect("lock poisoned").len()?)
    }

    pub fn is_empty(&self) -> BTreeResult<bool> {
        Ok(self.len()? <= SUPERBLOCK_SIZE)
    }
}

impl<K, S, C> NodePersister<K, S> for ChannelPersister<K, S, C>
where
    K: Serialize + DeserializeOwned,
    S: Serialize + DeserializeOwned,
    C: StorageChannel,
{
    fn load(&self, handle: NodeHandle) -> BTreeResult<Node<K, S>> {
        if handle.get() < SUPERBLOCK_SIZE {
            return Err(BTreeError::CorruptNode {
                handle,
                reason: "handle points into the superblock".into(),
            });
        }
        let mut channel = self.channel.lock().expect("lock poisoned");
        let payload =
            read_frame_at(&mut *channel, handle.get()).map_err(|e| node_read_error(handle, e))?;
        bincode::deserialize(&payload).map_err(|e| BTreeError::CorruptNode {
            handle,
            reason: e.to_string(),
        })
    }

    fn save(&self, node: &Node<K, S>) -> BTreeResult<NodeHandle> {
        let payload = encode(node)?;
        let mut channel = self.channel.lock().expect("lock poisoned");
        let offset = write_frame(&mut *channel, &payload)?;
        Ok(NodeHandle::new(offset))
    }

    fn delete(&self, handle: NodeHandle) -> BTreeResult<()> {
        debug!(%handle, "node retired");
        Ok(())
    }

    fn commit_root(&self, root: &TreeRoot) -> BTreeResult<()> {
        let payload = encode(root)?;
        let mut channel = self.channel.lock().expect("lock poisoned");
        let offset = write_frame(&mut *channel, &payload)?;
        channel.flush()?;
        superblock::write_pointer(&mut *channel, offset)
    }

    fn load_root(&self) -> BTreeResult<Option<TreeRoot>> {
        let mut channel = self.channel.lock().expect("lock poisoned");
        load_root_record(&mut *channel)
    }
}

fn load_root_record<C: StorageChannel + ?Sized>(
    channel: &mut C,
) -> BTreeResult<Option<TreeRoot>> {
    let offset = superblock::read_pointer(channel)?;
    if offset == 0 {
        return Ok(None);
    }
    let handle = NodeHandle::new(offset);
    let payload = read_frame_at(channel, offset).map_err(|e| node_read_error(handle, e))?;
    let root = bincode::deserialize(&payload).map_err(|e| BTreeError::CorruptNode {
        handle,
        reason: format!("bad root record: {e}"),
    })?;
    Ok(Some(root))
}

impl<K, S, C> std::fmt::Debug for ChannelPersister<K, S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelPersister").finish_non_exhaustive()
    }
}

/// Read the committed root record of a tree channel without knowing its
/// key and value types. Never writes to the channel; an empty channel has
/// no root.
pub fn read_root<C: StorageChannel + ?Sized>(
    channel: &mut C,
) -> BTreeResult<Option<TreeRoot>> {
    if channel.is_empty()? {
        return Ok(None);
    }
    superblock::check(channel, MAGIC)?;
    load_root_record(channel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BTreeConfig;
    use crate::tree::SingleValueBTree;
    use objdb_io::{MemoryChannel, FRAME_HEADER_SIZE};
    use objdb_meta::TypeRegistry;

    type Persister = ChannelPersister<i64, String, MemoryChannel>;

    #[test]
    fn read_root_without_types() {
        let persister = Persister::open(MemoryChannel::new()).unwrap();
        let root = TreeRoot {
            name: "idx".into(),
            order: 8,
            size: 0,
            height: 0,
            root: None,
            key_type: "i64".into(),
            multi: false,
        };
        persister.commit_root(&root).unwrap();
        assert_eq!(read_root(&mut persister.into_channel()).unwrap(), Some(root));
    }

    #[test]
    fn read_root_leaves_empty_channel_untouched() {
        let mut channel = MemoryChannel::new();
        assert_eq!(read_root(&mut channel).unwrap(), None);
        assert!(channel.as_bytes().is_empty());
    }

    #[test]
    fn read_root_rejects_foreign_channel() {
        let mut channel = MemoryChannel::from_bytes(b"ODBO\0\0\0\x01\0\0\0\0\0\0\0\0".to_vec());
        assert!(matches!(read_root(&mut channel), Err(BTreeError::RootMismatch(_))));
    }

    #[test]
    fn empty_channel_gets_superblock() {
        let persister = Persister::open(MemoryChannel::new()).unwrap();
        assert!(persister.is_empty().unwrap());
        assert!(persister.load_root().unwrap().is_none());
        let bytes = persister.into_channel().into_bytes();
        assert_eq!(&bytes[..4], MAGIC);
    }

    #[test]
    fn handles_are_offsets() {
        let persister = Persister::open(MemoryChannel::new()).unwrap();
        let handle = persister.save(&Node::leaf(7, "seven".into())).unwrap();
        assert_eq!(handle.get(), SUPERBLOCK_SIZE);
        let node = persister.load(handle).unwrap();
        assert_eq!(node.keys, vec![7]);
        assert_eq!(node.slots, vec!["seven".to_string()]);
    }

    #[test]
    fn latest_root_wins() {
        let persister = Persister::open(MemoryChannel::new()).unwrap();
        let mut root = TreeRoot {
            name: "idx".into(),
            order: 8,
            size: 0,
            height: 0,
            root: None,
            key_type: "i64".into(),
            multi: false,
        };
        persister.commit_root(&root).unwrap();
        root.size = 3;
        persister.commit_root(&root).unwrap();

        let reopened = Persister::open(persister.into_channel()).unwrap();
        assert_eq!(reopened.load_root().unwrap().unwrap().size, 3);
    }

    fn frame_count(channel: &mut MemoryChannel) -> usize {
        let len = channel.len().unwrap();
        let mut position = SUPERBLOCK_SIZE;
        let mut frames = 0;
        while position < len {
            let payload = read_frame_at(channel, position).unwrap();
            position += FRAME_HEADER_SIZE + payload.len() as u64;
            frames += 1;
        }
        frames
    }

    #[test]
    fn retired_nodes_stay_on_channel() {
        let persister = Persister::open(MemoryChannel::new()).unwrap();
        let handle = persister.save(&Node::leaf(1, "one".into())).unwrap();
        let len = persister.len().unwrap();
        persister.delete(handle).unwrap();
        assert_eq!(persister.len().unwrap(), len);
        assert_eq!(persister.load(handle).unwrap().keys, vec![1]);
    }

    #[test]
    fn growth_per_mutation_is_bounded() {
        let registry = TypeRegistry::new();
        let tree = SingleValueBTree::<i64, String, _>::create(
            "grow",
            &registry,
            BTreeConfig::with_order(4),
            Persister::open(MemoryChannel::new()).unwrap(),
        )
        .unwrap();
        let mut channel = tree.into_persister().into_channel();

        for k in 0..300i64 {
            let before = frame_count(&mut channel);
            let mut tree =
                SingleValueBTree::<i64, String, _>::open(&registry, Persister::open(channel).unwrap())
                    .unwrap();
            let height = tree.height() as usize;
            if k % 3 == 2 {
                assert!(tree.delete(&(k - 1)).unwrap());
            } else {
                tree.insert(k, k.to_string()).unwrap();
            }
            channel = tree.into_persister().into_channel();
            assert!(frame_count(&mut channel) - before <= 2 * height + 2);
        }
    }

    #[test]
    fn flipped_byte_is_corrupt_node() {
        let persister = Persister::open(MemoryChannel::new()).unwrap();
        let handle = persister.save(&Node::leaf(1, "one".into())).unwrap();
        let mut channel = persister.into_channel();
        let last = channel.as_bytes().len() - 1;
        channel.bytes_mut()[last] ^= 0x01;

        let persister = Persister::open(channel).unwrap();
        assert!(matches!(
            persister.load(handle),
            Err(BTreeError::CorruptNode { handle: h, .. }) if h == handle
        ));
    }

    #[test]
    fn handle_past_end_is_corrupt_node() {
        let persister = Persister::open(MemoryChannel::new()).unwrap();
        assert!(matches!(
            persister.load(NodeHandle::new(4096)),
            Err(BTreeError::CorruptNode { .. })
        ));
        assert!(matches!(
            persister.load(NodeHandle::new(3)),
            Err(BTreeError::CorruptNode { .. })
        ));
    }

    #[test]
    fn foreign_channel_rejected() {
        let channel = MemoryChannel::from_bytes(b"ODBI\0\0\0\x01\0\0\0\0\0\0\0\x01".to_vec());
        assert!(matches!(
            Persister::open(channel),
            Err(BTreeError::RootMismatch(_))
        ));
    }
}
