//! Nodes addressed by object identifiers.
//!
//! Each node is a frame on a data channel whose position is bound to a fresh
//! [`ObjectOid`]; the node handle is the identifier's value. Deleting a node
//! invalidates its identifier. The root record has an identifier of its
//! own, stored in the superblock (magic `"ODBO"`) and rebound on every
//! commit; the rebind is the commit point.

use std::marker::PhantomData;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use objdb_io::{read_frame_at, write_frame, StorageChannel};
use objdb_oid::{IdentityTable, OidError};
use objdb_types::{ObjectOid, Oid, Position};

use crate::error::{BTreeError, BTreeResult};
use crate::node::{Node, NodeHandle};
use crate::persister::{NodePersister, TreeRoot};
use crate::superblock::{self, encode, node_read_error};

const MAGIC: &[u8; 4] = b"ODBO";

/// OID-addressed node persister.
pub struct OidPersister<K, S, T, C> {
    table: T,
    channel: Mutex<C>,
    _node: PhantomData<fn() -> (K, S)>,
}

impl<K, S, T, C> OidPersister<K, S, T, C>
where
    T: IdentityTable<ObjectOid>,
    C: StorageChannel,
{
    pub fn open(table: T, mut channel: C) -> BTreeResult<Self> {
        superblock::init_or_check(&mut channel, MAGIC)?;
        Ok(Self {
            table,
            channel: Mutex::new(channel),
            _node: PhantomData,
        })
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    /// Close the persister, returning the identity table and data channel.
    pub fn into_parts(self) -> (T, C) {
        (self.table, self.channel.into_inner().expect("lock poisoned"))
    }

    fn position_of(&self, handle: NodeHandle) -> BTreeResult<Position> {
        self.table
            .resolve(ObjectOid::new(handle.get()))
            .map_err(|e| match e {
                OidError::UnknownOid { .. } | OidError::DeletedOid { .. } => {
                    BTreeError::NodeNotFound(handle)
                }
                e => BTreeError::Oid(e),
            })
    }

    fn read_at<V: DeserializeOwned>(&self, handle: NodeHandle) -> BTreeResult<V> {
        let position = self.position_of(handle)?;
        let mut channel = self.channel.lock().expect("lock poisoned");
        let payload = read_frame_at(&mut *channel, position.offset())
            .map_err(|e| node_read_error(handle, e))?;
        bincode::deserialize(&payload).map_err(|e| BTreeError::CorruptNode {
            handle,
            reason: e.to_string(),
        })
    }

    fn append(&self, payload: &[u8]) -> BTreeResult<Position> {
        let mut channel = self.channel.lock().expect("lock poisoned");
        Ok(Position::new(write_frame(&mut *channel, payload)?))
    }
}

impl<K, S, T, C> NodePersister<K, S> for OidPersister<K, S, T, C>
where
    K: Serialize + DeserializeOwned,
    S: Serialize + DeserializeOwned,
    T: IdentityTable<ObjectOid>,
    C: StorageChannel,
{
    fn load(&self, handle: NodeHandle) -> BTreeResult<Node<K, S>> {
        self.read_at(handle)
    }

    fn save(&self, node: &Node<K, S>) -> BTreeResult<NodeHandle> {
        let position = self.append(&encode(node)?)?;
        let oid = self.table.allocate()?;
        self.table.bind(oid, position)?;
        Ok(NodeHandle::new(oid.value()))
    }

    fn delete(&self, handle: NodeHandle) -> BTreeResult<()> {
        self.table.invalidate(ObjectOid::new(handle.get()))?;
        debug!(%handle, "node identifier invalidated");
        Ok(())
    }

    fn commit_root(&self, root: &TreeRoot) -> BTreeResult<()> {
        let position = self.append(&encode(root)?)?;
        let mut channel = self.channel.lock().expect("lock poisoned");
        channel.flush()?;
        let current = superblock::read_pointer(&mut *channel)?;
        if current == 0 {
            let oid = self.table.allocate()?;
            self.table.bind(oid, position)?;
            superblock::write_pointer(&mut *channel, oid.value())
        } else {
            self.table.bind(ObjectOid::new(current), position)?;
            Ok(())
        }
    }

    fn load_root(&self) -> BTreeResult<Option<TreeRoot>> {
        let current = {
            let mut channel = self.channel.lock().expect("lock poisoned");
            superblock::read_pointer(&mut *channel)?
        };
        if current == 0 {
            return Ok(None);
        }
        self.read_at(NodeHandle::new(current)).map(Some)
    }
}

impl<K, S, T, C> std::fmt::Debug for OidPersister<K, S, T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidPersister").finish_non_exhaustive()
    }
}
