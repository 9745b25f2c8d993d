//! Per-inode conflicts.

use std::collections::BTreeMap;

use revfs_fs::Inode;
use revfs_types::{InodeId, RevisionTag};

use crate::file_diff::Resolution;
use crate::version::{self, Version};

/// Every distinct value one inode id takes across the candidates.
///
/// `None` stands for "absent in this revision" and counts as a value of
/// its own. Each revision holds at most one value per id.
#[derive(Clone, Debug)]
pub struct InodeDiff {
    inode_id: InodeId,
    groups: Vec<Version<Option<Inode>>>,
    /// The id each revision used for this object before renumbering;
    /// `None` where the revision does not have it.
    original_ids: BTreeMap<RevisionTag, Option<InodeId>>,
    resolution: Option<Resolution>,
    canonical_source: Option<RevisionTag>,
    canonical_original_id: Option<InodeId>,
}

impl InodeDiff {
    pub fn new(inode_id: InodeId) -> Self {
        Self {
            inode_id,
            groups: Vec::new(),
            original_ids: BTreeMap::new(),
            resolution: None,
            canonical_source: None,
            canonical_original_id: None,
        }
    }

    pub fn inode_id(&self) -> InodeId {
        self.inode_id
    }

    pub fn groups(&self) -> &[Version<Option<Inode>>] {
        &self.groups
    }

    pub fn is_conflict(&self) -> bool {
        self.groups.len() > 1
    }

    /// Record that `tags` hold `value`, which they knew under `id`.
    ///
    /// An absent value never overrides a tag already known to hold this
    /// object. A present value moves the tags out of every other group.
    pub fn add(&mut self, value: Option<Inode>, id: InodeId, tags: &[RevisionTag]) {
        let tags: Vec<RevisionTag> = match value {
            Some(_) => tags.to_vec(),
            None => tags
                .iter()
                .filter(|t| !matches!(self.original_ids.get(t), Some(Some(_))))
                .copied()
                .collect(),
        };
        if tags.is_empty() {
            return;
        }

        for tag in &tags {
            self.original_ids.insert(*tag, value.as_ref().map(|_| id));
        }
        if value.is_some() {
            self.prune_alternatives(&value, &tags);
        }
        version::add_to_group(&mut self.groups, value, &tags);
    }

    fn prune_alternatives(&mut self, keep: &Option<Inode>, tags: &[RevisionTag]) {
        version::prune_others(&mut self.groups, keep, tags);
    }

    /// The value `tag` holds, or `None` if `tag` never contributed.
    pub fn value_for(&self, tag: &RevisionTag) -> Option<&Option<Inode>> {
        version::value_for(&self.groups, tag)
    }

    pub fn original_inode_id_for_tag(&self, tag: &RevisionTag) -> Option<InodeId> {
        self.original_ids.get(tag).copied().flatten()
    }

    pub fn revisions(&self) -> Vec<RevisionTag> {
        version::all_revisions(&self.groups)
    }

    /// Settle on `resolution` and note the first revision that produced it.
    pub fn set_resolution(&mut self, resolution: Resolution) {
        let wanted = resolution.clone().into_value();
        self.canonical_source = self
            .groups
            .iter()
            .find(|g| g.value == wanted)
            .and_then(|g| g.revisions.first().copied());
        self.canonical_original_id = self
            .canonical_source
            .and_then(|tag| self.original_inode_id_for_tag(&tag));
        self.resolution = Some(resolution);
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }

    pub fn canonical_source_revision(&self) -> Option<RevisionTag> {
        self.canonical_source
    }

    pub fn canonical_original_inode_id(&self) -> Option<InodeId> {
        self.canonical_original_id
    }
}
