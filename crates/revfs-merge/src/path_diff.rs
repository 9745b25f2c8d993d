//! Per-path conflicts.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use revfs_fs::{FsView, RevisionView};
use revfs_types::{InodeId, RevisionTag};

use crate::error::MergeResult;
use crate::version::{self, Version};

/// Renumbering table: original id → candidate revision → id it was moved to.
pub type IdMap = BTreeMap<InodeId, BTreeMap<RevisionTag, InodeId>>;

/// The id `raw` is known by after renumbering, and whether it moved.
pub fn remap(id_map: &IdMap, raw: InodeId, tag: &RevisionTag) -> (InodeId, bool) {
    match id_map.get(&raw).and_then(|per_tag| per_tag.get(tag)) {
        Some(moved) => (*moved, true),
        None => (raw, false),
    }
}

/// Total order used for replay: deletions after everything else, then
/// shorter paths first (parents before children), then lexicographic.
pub fn replay_order(a: &str, a_deleted: bool, b: &str, b_deleted: bool) -> Ordering {
    a_deleted
        .cmp(&b_deleted)
        .then_with(|| a.len().cmp(&b.len()))
        .then_with(|| a.cmp(b))
}

/// Every distinct inode id one path resolves to across the candidates.
#[derive(Clone, Debug)]
pub struct PathDiff {
    path: String,
    groups: Vec<Version<Option<InodeId>>>,
    force_conflict: bool,
    resolution: Option<Option<InodeId>>,
}

impl PathDiff {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            groups: Vec::new(),
            force_conflict: false,
            resolution: None,
        }
    }

    /// Resolve `path` in every view. Ids listed in `id_map` for a view's
    /// revision are substituted and force the path to count as a conflict.
    pub fn from_views(
        path: &str,
        views: &[RevisionView],
        id_map: Option<&IdMap>,
    ) -> MergeResult<Self> {
        let mut diff = Self::new(path);
        for view in views {
            let tag = view.tag();
            let id = match view.resolve_path(path)? {
                Some(raw) => match id_map {
                    Some(map) => {
                        let (id, moved) = remap(map, raw, &tag);
                        diff.force_conflict |= moved;
                        Some(id)
                    }
                    None => Some(raw),
                },
                None => None,
            };
            diff.add(id, &[tag]);
        }
        Ok(diff)
    }

    pub fn add(&mut self, id: Option<InodeId>, tags: &[RevisionTag]) {
        version::add_to_group(&mut self.groups, id, tags);
    }

    pub fn force_conflict(&mut self) {
        self.force_conflict = true;
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn groups(&self) -> &[Version<Option<InodeId>>] {
        &self.groups
    }

    pub fn is_conflict(&self) -> bool {
        self.force_conflict || self.groups.len() > 1
    }

    pub fn id_for(&self, tag: &RevisionTag) -> Option<InodeId> {
        version::value_for(&self.groups, tag).copied().flatten()
    }

    /// Ids this path resolves to in at least one candidate.
    pub fn targets(&self) -> impl Iterator<Item = InodeId> + '_ {
        self.groups.iter().filter_map(|g| g.value)
    }

    pub fn set_resolution(&mut self, id: Option<InodeId>) {
        self.resolution = Some(id);
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    pub fn resolution(&self) -> Option<Option<InodeId>> {
        self.resolution
    }

    pub fn is_deleted(&self) -> bool {
        self.resolution == Some(None)
    }
}

impl Ord for PathDiff {
    fn cmp(&self, other: &Self) -> Ordering {
        replay_order(&self.path, self.is_deleted(), &other.path, other.is_deleted())
    }
}

impl PartialOrd for PathDiff {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PathDiff {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PathDiff {}
