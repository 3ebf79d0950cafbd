//! Copy-on-write B-tree index for objdb.
//!
//! A [`BTree`] maps ordered keys to values. The value slot is chosen by a
//! [`ValueMode`]: [`Single`] keeps one value per key and replaces it on a
//! duplicate insert, [`Multi`] keeps every value in insertion order. Both
//! share the same shape algorithm.
//!
//! # Persistence
//!
//! Nodes are never modified in place. Every mutation loads the nodes on its
//! path, writes modified copies through a [`NodePersister`], and finally
//! commits a new [`TreeRoot`] record. The root commit is the atomicity
//! point: a failure before it leaves the tree and its stored root untouched,
//! and nodes retired by the mutation are deleted only after it.
//!
//! Persisters:
//!
//! - [`MemoryPersister`] -- nodes in a `HashMap` arena
//! - [`ChannelPersister`] -- nodes appended as frames to a storage channel,
//!   addressed by offset
//! - [`OidPersister`] -- nodes addressed by object identifiers resolved
//!   through an identity table
//!
//! # Shape
//!
//! For order `m`, every node holds at most `m - 1` keys and every non-root
//! node at least `ceil(m / 2) - 1`. All leaves sit at the same depth.
//! [`BTree::verify`] checks these invariants on the stored tree.

pub mod channel;
pub mod config;
pub mod error;
pub mod iter;
pub mod memory;
pub mod mode;
pub mod node;
pub mod oid;
pub mod persister;
pub mod shared;
mod superblock;
pub mod tree;

pub use channel::{read_root, ChannelPersister};
pub use config::BTreeConfig;
pub use error::{BTreeError, BTreeResult};
pub use iter::{Direction, Iter};
pub use memory::MemoryPersister;
pub use mode::{Multi, Removal, Single, ValueMode};
pub use node::{Node, NodeHandle};
pub use oid::OidPersister;
pub use persister::{NodePersister, TreeRoot};
pub use shared::SharedBTree;
pub use tree::{BTree, MultiValueBTree, SingleValueBTree};
