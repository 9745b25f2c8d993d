use serde::{Deserialize, Serialize};

use revfs_types::{InodeId, ObjectId, RevisionTag};

/// The type of filesystem object an inode describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InodeKind {
    File,
    Directory,
    Symlink,
    Fifo,
    CharDevice,
    BlockDevice,
}

impl std::fmt::Display for InodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Symlink => "symlink",
            Self::Fifo => "fifo",
            Self::CharDevice => "char-device",
            Self::BlockDevice => "block-device",
        };
        f.write_str(s)
    }
}

/// Stat metadata. Timestamps are nanoseconds since the UNIX epoch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stat {
    pub inode_id: InodeId,
    pub kind: InodeKind,
    /// Permission bits only; the type lives in `kind`.
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub user: String,
    pub group: String,
    pub size: u64,
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
    pub dev_major: u32,
    pub dev_minor: u32,
}

impl Stat {
    pub fn new(inode_id: InodeId, kind: InodeKind, now_ns: u64) -> Self {
        let mode = match kind {
            InodeKind::Directory => 0o755,
            _ => 0o644,
        };
        Self {
            inode_id,
            kind,
            mode,
            uid: 0,
            gid: 0,
            user: String::new(),
            group: String::new(),
            size: 0,
            atime: now_ns,
            mtime: now_ns,
            ctime: now_ns,
            dev_major: 0,
            dev_minor: 0,
        }
    }
}

/// One filesystem object as recorded in a revision's inode table.
///
/// Equality is full-field equality, which is exactly equality of the
/// serialized form: two revisions agree on an inode only if every field,
/// timestamps included, matches.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Inode {
    pub stat: Stat,
    /// Random value fixed at creation. Distinguishes two objects that
    /// independent writers happened to give the same id.
    pub identity: u64,
    /// Number of directory entries referencing this inode.
    pub nlink: u32,
    /// File blob or directory listing. `None` for empty objects.
    pub content: Option<ObjectId>,
    /// Base revision of the working tree that last modified this inode.
    pub changed_from: Option<RevisionTag>,
}

impl Inode {
    pub fn new(stat: Stat, identity: u64) -> Self {
        Self {
            stat,
            identity,
            nlink: 0,
            content: None,
            changed_from: None,
        }
    }

    pub fn id(&self) -> InodeId {
        self.stat.inode_id
    }

    pub fn kind(&self) -> InodeKind {
        self.stat.kind
    }

    pub fn is_directory(&self) -> bool {
        self.stat.kind == InodeKind::Directory
    }

    /// A copy of this value under another id, used when renumbering.
    pub fn renumbered(&self, id: InodeId) -> Self {
        let mut copy = self.clone();
        copy.stat.inode_id = id;
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_modes_by_kind() {
        let file = Stat::new(InodeId::new(16), InodeKind::File, 5);
        let dir = Stat::new(InodeId::new(17), InodeKind::Directory, 5);
        assert_eq!(file.mode, 0o644);
        assert_eq!(dir.mode, 0o755);
        assert_eq!(file.mtime, 5);
    }

    #[test]
    fn equality_covers_every_field() {
        let a = Inode::new(Stat::new(InodeId::new(16), InodeKind::File, 1), 42);
        let mut b = a.clone();
        assert_eq!(a, b);
        b.stat.atime += 1;
        assert_ne!(a, b);
        let mut c = a.clone();
        c.identity = 43;
        assert_ne!(a, c);
    }

    #[test]
    fn renumbered_changes_only_the_id() {
        let a = Inode::new(Stat::new(InodeId::new(16), InodeKind::File, 1), 42);
        let b = a.renumbered(InodeId::new(99));
        assert_eq!(b.id(), InodeId::new(99));
        assert_eq!(b.identity, a.identity);
        assert_eq!(b.renumbered(InodeId::new(16)), a);
    }
}
