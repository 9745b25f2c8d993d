//! Replaying resolved conflicts into a merged revision.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info};

use revfs_dag::RevisionOrder;
use revfs_fs::{path, Archive, FsView, Inode, WorkingTree};
use revfs_types::{InodeId, RevisionTag, TemporalAnchor};

use crate::config::MergeConfig;
use crate::diff_set::DiffSet;
use crate::error::{MergeError, MergeResult};
use crate::file_diff::{FileDiff, Resolution};
use crate::path_diff::replay_order;
use crate::policy::{FileDiffResolver, MergeContext};

/// Resolves a [`DiffSet`] with a policy and commits the result.
///
/// Values are settled first. The latest candidate is opened as the base and
/// its renumbered objects are moved to their new ids. Directory membership
/// is then reconciled in replay order (parents before children, deletions
/// last) and resolved inodes are written back. The commit is the only step
/// with a lasting effect, so any failure leaves the archive untouched apart
/// from unreferenced objects.
pub struct DiffSetResolver<'p> {
    diff_set: DiffSet,
    policy: &'p dyn FileDiffResolver,
    order: Arc<dyn RevisionOrder + Send + Sync>,
    file_diffs: Vec<FileDiff>,
    diffs_by_dir: BTreeMap<String, Vec<usize>>,
    message: Option<String>,
}

impl<'p> DiffSetResolver<'p> {
    pub(crate) fn new(
        diff_set: DiffSet,
        policy: &'p dyn FileDiffResolver,
        order: Arc<dyn RevisionOrder + Send + Sync>,
    ) -> MergeResult<Self> {
        let file_diffs = diff_set.file_diffs()?;
        Ok(Self {
            diff_set,
            policy,
            order,
            file_diffs,
            diffs_by_dir: BTreeMap::new(),
            message: None,
        })
    }

    pub fn diff_set(&self) -> &DiffSet {
        &self.diff_set
    }

    pub fn file_diffs(&self) -> &[FileDiff] {
        &self.file_diffs
    }

    /// Pre-resolve diffs; the policy only sees the ones left unresolved.
    pub fn file_diffs_mut(&mut self) -> &mut [FileDiff] {
        &mut self.file_diffs
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Log every inode and path diff.
    pub fn dump(&self) {
        if !tracing::enabled!(tracing::Level::DEBUG) {
            return;
        }
        for (id, diff) in self.diff_set.inode_diffs() {
            for group in diff.groups() {
                debug!(
                    inode = %id,
                    value = ?group.value.as_ref().map(|i| (i.stat.mtime, i.content)),
                    revisions = ?group.revisions.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
                    "inode diff"
                );
            }
        }
        for (path, diff) in self.diff_set.path_diffs() {
            for group in diff.groups() {
                debug!(
                    path = %path,
                    target = ?group.value.map(|id| id.to_string()),
                    revisions = ?group.revisions.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
                    "path diff"
                );
            }
        }
    }

    /// Resolve everything and commit the merged revision, whose parents are
    /// exactly the candidates. A single candidate is returned as is.
    pub fn resolve(mut self) -> MergeResult<RevisionTag> {
        let revisions = self.diff_set.revisions().to_vec();
        if let [only] = revisions.as_slice() {
            return Ok(*only);
        }
        self.dump();

        self.resolve_non_directories()?;
        self.assert_resolved()?;
        let kept = self.resolve_inodes()?;

        let base = *self.order.latest(&revisions).ok_or_else(|| {
            MergeError::InvalidArgument("no candidate revisions".into())
        })?;
        let anchor = self.merge_anchor(&revisions)?;
        let archive = Arc::clone(self.diff_set.archive());
        let mut tree = archive.open_revision(&base)?.with_clock(anchor.as_nanos());
        tree.renumber_inodes(&self.base_moves(&base))?;

        self.resolve_directories(&mut tree)?;
        replace_inodes(&mut tree, &kept);
        tree.reserve_inode_ids(self.diff_set.next_inode_id());

        let message = self
            .message
            .take()
            .unwrap_or_else(|| format!("merge of {} revisions", revisions.len()));
        let tag = tree.commit_at(&revisions, anchor, Some(message))?;
        info!(
            revision = %tag,
            parents = revisions.len(),
            base = %base,
            conflicts = self.file_diffs.len(),
            "merged revisions"
        );
        Ok(tag)
    }

    /// The ids the base revision's own objects were moved to.
    fn base_moves(&self, base: &RevisionTag) -> BTreeMap<InodeId, InodeId> {
        self.diff_set
            .id_map()
            .iter()
            .filter_map(|(from, per_tag)| per_tag.get(base).map(|to| (*from, *to)))
            .collect()
    }

    /// Ask the policy about every unresolved diff, indexing each by its
    /// parent directory.
    fn resolve_non_directories(&mut self) -> MergeResult<()> {
        let ctx = MergeContext::new(&self.diff_set, self.order.as_ref());
        for (index, diff) in self.file_diffs.iter_mut().enumerate() {
            if diff.path() != "/" {
                self.diffs_by_dir
                    .entry(path::dirname(diff.path()).to_string())
                    .or_default()
                    .push(index);
            }
            if !diff.is_resolved() {
                let resolution = self.policy.resolve(&ctx, diff)?.ok_or_else(|| {
                    MergeError::InvalidArgument(format!(
                        "the policy returned no resolution for {}",
                        diff.path()
                    ))
                })?;
                diff.set_resolution(resolution);
            }
            if diff.path() == "/" && diff.is_deleted() {
                return Err(MergeError::InvalidArgument(
                    "the root directory cannot be deleted".into(),
                ));
            }
        }
        Ok(())
    }

    fn assert_resolved(&self) -> MergeResult<()> {
        match self.file_diffs.iter().find(|d| !d.is_resolved()) {
            Some(diff) => Err(MergeError::UnresolvedDiff {
                path: diff.path().to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Collect the value every kept inode resolved to and record it on the
    /// inode and path diffs. One id resolved to two values is a
    /// contradiction.
    fn resolve_inodes(&mut self) -> MergeResult<BTreeMap<InodeId, Inode>> {
        let mut kept: BTreeMap<InodeId, (Inode, &str)> = BTreeMap::new();
        for diff in &self.file_diffs {
            let Some(Resolution::Inode(inode)) = diff.resolution() else {
                continue;
            };
            match kept.get(&inode.id()) {
                Some((existing, other)) if existing != inode => {
                    return Err(MergeError::InconsistentDiffResolution {
                        path: diff.path().to_string(),
                        reason: format!(
                            "inode {} was resolved to another value at {}",
                            inode.id(),
                            other
                        ),
                    });
                }
                Some(_) => {}
                None => {
                    kept.insert(inode.id(), (inode.clone(), diff.path()));
                }
            }
        }
        let kept: BTreeMap<InodeId, Inode> =
            kept.into_iter().map(|(id, (inode, _))| (id, inode)).collect();

        for (id, inode_diff) in self.diff_set.inode_diffs_mut() {
            if let Some(inode) = kept.get(id) {
                inode_diff.set_resolution(Resolution::Inode(inode.clone()));
            }
        }
        for diff in &self.file_diffs {
            if let Some(path_diff) = self.diff_set.path_diffs_mut().get_mut(diff.path()) {
                path_diff.set_resolution(diff.resolution().and_then(Resolution::inode).map(Inode::id));
            }
        }
        debug!(inodes = kept.len(), "resolved inode values");
        Ok(kept)
    }

    /// Bring directory membership in line with the resolved paths.
    fn resolve_directories(&self, tree: &mut WorkingTree) -> MergeResult<()> {
        let mut dirs: Vec<&String> = self.diffs_by_dir.keys().collect();
        dirs.sort_by(|a, b| replay_order(a, false, b, false));

        let mut skipped: BTreeSet<&str> = BTreeSet::new();
        for dir in dirs {
            let own = self.file_diffs.iter().find(|d| d.path() == dir.as_str());
            let is_directory = match own.and_then(FileDiff::resolution) {
                Some(Resolution::Inode(inode)) => inode.is_directory(),
                Some(Resolution::Deleted) => false,
                None => true,
            };
            if is_directory {
                continue;
            }
            let children = &self.diffs_by_dir[dir];
            if let Some(child) = children
                .iter()
                .map(|&i| &self.file_diffs[i])
                .find(|d| !d.is_deleted())
            {
                return Err(MergeError::InconsistentDiffResolution {
                    path: dir.clone(),
                    reason: format!("not a directory in the merge, but {} is kept", child.path()),
                });
            }
            skipped.insert(dir.as_str());
        }

        let mut replay: Vec<&FileDiff> = self.file_diffs.iter().filter(|d| d.path() != "/").collect();
        replay.sort_by(|a, b| a.replay_cmp(b));
        for diff in replay {
            let dir = path::dirname(diff.path());
            let name = path::basename(diff.path());
            if skipped.contains(dir) {
                continue;
            }
            match diff.resolution() {
                Some(Resolution::Inode(inode)) => {
                    tree.opendir(dir)?.link(name, inode)?;
                }
                _ => {
                    let parent_is_directory = match tree.inode_for_path(dir)? {
                        Some(parent) => parent.is_directory(),
                        None => false,
                    };
                    if !parent_is_directory {
                        continue;
                    }
                    let mut handle = tree.opendir(dir)?;
                    if handle.contains(name)? {
                        handle.unlink(name)?;
                        debug!(path = diff.path(), "unlinked");
                    }
                }
            }
        }
        Ok(())
    }

    /// The latest candidate timestamp, advanced one logical step. Peers
    /// merging the same candidates derive the same anchor.
    fn merge_anchor(&self, revisions: &[RevisionTag]) -> MergeResult<TemporalAnchor> {
        let mut latest = TemporalAnchor::zero();
        for tag in revisions {
            latest = latest.max(self.diff_set.archive().revision_info(tag)?.timestamp);
        }
        Ok(latest.tick(0))
    }
}

/// Write resolved values over the ids still present in the tree.
fn replace_inodes(tree: &mut WorkingTree, kept: &BTreeMap<InodeId, Inode>) {
    for (id, inode) in kept {
        if tree.table().contains(*id) {
            tree.replace_inode(inode.clone());
        } else {
            debug!(inode = %id, "resolved inode is unreachable, skipping");
        }
    }
}

// ---------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------

/// Merge `candidates` with `policy`, in chunks of at most
/// `config.max_parents` candidates.
pub fn merge(
    archive: &Arc<Archive>,
    candidates: &[RevisionTag],
    policy: &dyn FileDiffResolver,
    config: &MergeConfig,
) -> MergeResult<RevisionTag> {
    if config.max_parents < 2 {
        return Err(MergeError::InvalidArgument(format!(
            "max_parents must be at least 2, got {}",
            config.max_parents
        )));
    }
    let mut candidates = candidates.to_vec();
    candidates.sort();
    candidates.dedup();
    if candidates.len() <= config.max_parents {
        return DiffSet::build(archive, &candidates)?.resolve(policy);
    }

    debug!(
        candidates = candidates.len(),
        max_parents = config.max_parents,
        "merging in chunks"
    );
    let mut partial = Vec::new();
    for chunk in candidates.chunks(config.max_parents) {
        partial.push(merge(archive, chunk, policy, config)?);
    }
    merge(archive, &partial, policy, config)
}

/// Merge every tip of the archive's revision graph.
pub fn merge_tips(
    archive: &Arc<Archive>,
    policy: &dyn FileDiffResolver,
    config: &MergeConfig,
) -> MergeResult<RevisionTag> {
    let tips = archive.minimal_set(&archive.tips());
    merge(archive, &tips, policy, config)
}
