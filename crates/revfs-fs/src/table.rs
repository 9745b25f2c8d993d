use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use revfs_store::{ObjectKind, StoreResult, StoredObject};
use revfs_types::InodeId;

use crate::inode::{Inode, InodeKind, Stat};

/// Identity shared by every root directory, so independently created
/// archives agree on what `/` is.
pub const ROOT_IDENTITY: u64 = 1;

/// Every live inode of one revision, plus the id allocator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InodeTable {
    inodes: BTreeMap<InodeId, Inode>,
    next_inode_id: InodeId,
}

/// Encoded form; ids live inside each inode's stat.
#[derive(Serialize, Deserialize)]
struct EncodedTable {
    next_inode_id: InodeId,
    inodes: Vec<Inode>,
}

impl InodeTable {
    /// A table holding only an empty root directory with zeroed timestamps.
    pub fn with_root() -> Self {
        let mut root = Inode::new(
            Stat::new(InodeId::ROOT_DIRECTORY, InodeKind::Directory, 0),
            ROOT_IDENTITY,
        );
        root.nlink = 1;
        let mut inodes = BTreeMap::new();
        inodes.insert(InodeId::ROOT_DIRECTORY, root);
        Self {
            inodes,
            next_inode_id: InodeId::USER_START,
        }
    }

    pub fn get(&self, id: InodeId) -> Option<&Inode> {
        self.inodes.get(&id)
    }

    pub fn get_mut(&mut self, id: InodeId) -> Option<&mut Inode> {
        self.inodes.get_mut(&id)
    }

    pub fn contains(&self, id: InodeId) -> bool {
        self.inodes.contains_key(&id)
    }

    /// Store an inode under its own id, returning the value it replaced.
    pub fn insert(&mut self, inode: Inode) -> Option<Inode> {
        let id = inode.id();
        if id >= self.next_inode_id {
            self.next_inode_id = id.next();
        }
        self.inodes.insert(id, inode)
    }

    pub fn remove(&mut self, id: InodeId) -> Option<Inode> {
        self.inodes.remove(&id)
    }

    pub fn ids(&self) -> Vec<InodeId> {
        self.inodes.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Inode> {
        self.inodes.values()
    }

    pub fn len(&self) -> usize {
        self.inodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inodes.is_empty()
    }

    pub fn next_inode_id(&self) -> InodeId {
        self.next_inode_id
    }

    pub fn issue_inode_id(&mut self) -> InodeId {
        let id = self.next_inode_id;
        self.next_inode_id = id.next();
        id
    }

    /// Make sure ids below `next` are never issued again.
    pub fn reserve_through(&mut self, next: InodeId) {
        if next > self.next_inode_id {
            self.next_inode_id = next;
        }
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        let encoded = EncodedTable {
            next_inode_id: self.next_inode_id,
            inodes: self.inodes.values().cloned().collect(),
        };
        StoredObject::encode_json(ObjectKind::InodeTable, &encoded)
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        let encoded: EncodedTable = obj.decode_json(ObjectKind::InodeTable)?;
        Ok(Self {
            inodes: encoded.inodes.into_iter().map(|i| (i.id(), i)).collect(),
            next_inode_id: encoded.next_inode_id,
        })
    }
}
