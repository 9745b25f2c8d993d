//! The unit of work a resolution policy decides on.

use std::cmp::Ordering;

use revfs_fs::Inode;
use revfs_types::{InodeId, RevisionTag};

use crate::path_diff::replay_order;
use crate::version::{self, Version};

/// The value a policy picks for a conflict.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Inode(Inode),
    Deleted,
}

impl Resolution {
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }

    pub fn inode(&self) -> Option<&Inode> {
        match self {
            Self::Inode(inode) => Some(inode),
            Self::Deleted => None,
        }
    }

    pub fn into_value(self) -> Option<Inode> {
        match self {
            Self::Inode(inode) => Some(inode),
            Self::Deleted => None,
        }
    }
}

impl From<Option<Inode>> for Resolution {
    fn from(value: Option<Inode>) -> Self {
        value.map_or(Self::Deleted, Self::Inode)
    }
}

/// Where a [`FileDiff`] came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffOrigin {
    /// The path resolves to different inodes (or values) across candidates.
    Path,
    /// The inode changed in place; anchored at its lowest path.
    Inode(InodeId),
}

/// One conflicting path and the inode value each candidate has there.
#[derive(Clone, Debug)]
pub struct FileDiff {
    path: String,
    origin: DiffOrigin,
    versions: Vec<Version<Option<Inode>>>,
    resolution: Option<Resolution>,
}

impl FileDiff {
    pub fn new(path: impl Into<String>, origin: DiffOrigin) -> Self {
        Self {
            path: path.into(),
            origin,
            versions: Vec::new(),
            resolution: None,
        }
    }

    pub(crate) fn with_versions(
        path: impl Into<String>,
        origin: DiffOrigin,
        versions: Vec<Version<Option<Inode>>>,
    ) -> Self {
        Self {
            versions,
            ..Self::new(path, origin)
        }
    }

    pub fn add(&mut self, value: Option<Inode>, tag: RevisionTag) {
        version::add_to_group(&mut self.versions, value, &[tag]);
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn origin(&self) -> DiffOrigin {
        self.origin
    }

    pub fn versions(&self) -> &[Version<Option<Inode>>] {
        &self.versions
    }

    /// Every candidate that contributed, in version order.
    pub fn revisions(&self) -> Vec<RevisionTag> {
        version::all_revisions(&self.versions)
    }

    pub fn value_for(&self, tag: &RevisionTag) -> Option<&Option<Inode>> {
        version::value_for(&self.versions, tag)
    }

    /// True if some candidate has nothing at this path and another does.
    pub fn is_presence_conflict(&self) -> bool {
        self.versions.iter().any(|v| v.value.is_none())
            && self.versions.iter().any(|v| v.value.is_some())
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = Some(resolution);
    }

    pub fn is_deleted(&self) -> bool {
        self.resolution.as_ref().is_some_and(Resolution::is_deleted)
    }

    /// Replay order: kept entries before deletions, then shorter paths,
    /// then lexicographic.
    pub fn replay_cmp(&self, other: &Self) -> Ordering {
        replay_order(&self.path, self.is_deleted(), &other.path, other.is_deleted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revfs_fs::{InodeKind, Stat};
    use revfs_types::ObjectId;

    fn tag(n: u8) -> RevisionTag {
        RevisionTag::new(ObjectId::from_bytes(&[n]), 1)
    }

    fn file(id: u64) -> Inode {
        Inode::new(Stat::new(InodeId::new(id), InodeKind::File, 0), 1)
    }

    #[test]
    fn versions_group_by_value() {
        let mut diff = FileDiff::new("/x", DiffOrigin::Path);
        diff.add(Some(file(20)), tag(1));
        diff.add(None, tag(2));
        diff.add(Some(file(20)), tag(3));
        assert_eq!(diff.versions().len(), 2);
        assert_eq!(diff.revisions(), vec![tag(1), tag(3), tag(2)]);
        assert!(diff.is_presence_conflict());
        assert_eq!(diff.value_for(&tag(2)), Some(&None));
    }

    #[test]
    fn deletions_replay_last() {
        let mut deep = FileDiff::new("/a/b/c", DiffOrigin::Path);
        deep.set_resolution(Resolution::Inode(file(20)));
        let mut shallow = FileDiff::new("/z", DiffOrigin::Path);
        shallow.set_resolution(Resolution::Deleted);
        assert_eq!(deep.replay_cmp(&shallow), Ordering::Less);
        assert!(shallow.is_deleted());
        assert_eq!(Resolution::from(None), Resolution::Deleted);
    }
}
