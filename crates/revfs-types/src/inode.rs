use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable numeric identity of a filesystem object.
///
/// An inode keeps its id across edits and renames; the path that reaches it
/// is a property of the directories that link it, not of the inode. Within
/// one revision at most one live inode carries a given id. A deleted id is
/// represented by the absence of an inode, never by id 0.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InodeId(u64);

impl InodeId {
    /// Reserved for the inode table itself.
    pub const INODE_TABLE: InodeId = InodeId(0);
    /// The root directory of every revision.
    pub const ROOT_DIRECTORY: InodeId = InodeId(1);
    /// Reserved for the free list.
    pub const FREELIST: InodeId = InodeId(2);
    /// First id handed out to user-created objects.
    pub const USER_START: InodeId = InodeId(16);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Ids below [`InodeId::USER_START`] other than the root are never issued.
    pub fn is_reserved(self) -> bool {
        self.0 < Self::USER_START.0 && self != Self::ROOT_DIRECTORY
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Debug for InodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InodeId({})", self.0)
    }
}

impl fmt::Display for InodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for InodeId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}
