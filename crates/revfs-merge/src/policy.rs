//! Conflict resolution policies.

use std::sync::Arc;

use tracing::trace;

use revfs_dag::RevisionOrder;
use revfs_fs::{Archive, FsView, Inode};
use revfs_types::RevisionTag;

use crate::config::PolicyKind;
use crate::diff_set::DiffSet;
use crate::error::MergeResult;
use crate::file_diff::{FileDiff, Resolution};

/// What a policy can see while deciding.
pub struct MergeContext<'a> {
    diff_set: &'a DiffSet,
    order: &'a dyn RevisionOrder,
}

impl<'a> MergeContext<'a> {
    pub fn new(diff_set: &'a DiffSet, order: &'a dyn RevisionOrder) -> Self {
        Self { diff_set, order }
    }

    pub fn diff_set(&self) -> &DiffSet {
        self.diff_set
    }

    pub fn order(&self) -> &dyn RevisionOrder {
        self.order
    }

    pub fn archive(&self) -> &Arc<Archive> {
        self.diff_set.archive()
    }

    pub fn common_ancestor(&self) -> Option<RevisionTag> {
        self.diff_set.common_ancestor()
    }

    /// The most recent of `tags`.
    pub fn latest(&self, tags: &[RevisionTag]) -> Option<RevisionTag> {
        self.order.latest(tags).copied()
    }
}

/// Picks the winning value for one [`FileDiff`].
///
/// Returning `Ok(None)` fails the merge with
/// [`MergeError::InvalidArgument`](crate::MergeError::InvalidArgument).
/// Policies must be deterministic for a given set of candidates so that
/// peers merging the same revisions commit the same tree.
pub trait FileDiffResolver {
    fn resolve(&self, ctx: &MergeContext<'_>, diff: &FileDiff) -> MergeResult<Option<Resolution>>;
}

impl<F> FileDiffResolver for F
where
    F: Fn(&MergeContext<'_>, &FileDiff) -> MergeResult<Option<Resolution>>,
{
    fn resolve(&self, ctx: &MergeContext<'_>, diff: &FileDiff) -> MergeResult<Option<Resolution>> {
        self(ctx, diff)
    }
}

/// The latest candidate's value wins.
#[derive(Clone, Copy, Debug, Default)]
pub struct LatestVersionResolver;

/// The default policy.
pub const LATEST_VERSION: LatestVersionResolver = LatestVersionResolver;

impl FileDiffResolver for LatestVersionResolver {
    fn resolve(&self, ctx: &MergeContext<'_>, diff: &FileDiff) -> MergeResult<Option<Resolution>> {
        let Some(latest) = ctx.latest(&diff.revisions()) else {
            return Ok(None);
        };
        Ok(diff.value_for(&latest).cloned().map(Resolution::from))
    }
}

/// Judges paths that exist in some candidates but not others against the
/// common ancestor, so a file added on one branch is not lost because
/// another branch is newer.
///
/// - absent from the ancestor: added after it, keep
/// - its ancestor inode sits elsewhere in a candidate lacking the path:
///   moved, delete
/// - its inode was edited after the ancestor: keep
/// - otherwise: deleted on purpose, delete
///
/// A kept path takes the latest value its inode has in any candidate.
/// Every other conflict falls back to [`LatestVersionResolver`].
#[derive(Clone, Copy, Debug, Default)]
pub struct AncestorAwareResolver;

impl FileDiffResolver for AncestorAwareResolver {
    fn resolve(&self, ctx: &MergeContext<'_>, diff: &FileDiff) -> MergeResult<Option<Resolution>> {
        let ancestor = match ctx.common_ancestor() {
            Some(tag) if diff.is_presence_conflict() => tag,
            _ => return LATEST_VERSION.resolve(ctx, diff),
        };

        let present: Vec<RevisionTag> = diff
            .versions()
            .iter()
            .filter(|v| v.value.is_some())
            .flat_map(|v| v.revisions.iter().copied())
            .collect();
        let Some(source) = ctx.latest(&present) else {
            return Ok(None);
        };
        let Some(Some(kept)) = diff.value_for(&source).cloned() else {
            return Ok(None);
        };
        let kept = latest_value(ctx, kept);

        let base = ctx.archive().read_only_fs(&ancestor)?;
        let Some(original) = base.inode_for_path(diff.path())? else {
            trace!(path = diff.path(), "added after ancestor");
            return Ok(Some(Resolution::Inode(kept)));
        };

        for version in diff.versions().iter().filter(|v| v.value.is_none()) {
            for tag in &version.revisions {
                let view = ctx.archive().read_only_fs(tag)?;
                let moved = match view.inode(original.id())? {
                    Some(inode) if inode.identity == original.identity => {
                        !view.find_paths_for_inode(original.id())?.is_empty()
                    }
                    _ => false,
                };
                if moved {
                    trace!(path = diff.path(), revision = %tag, "moved away");
                    return Ok(Some(Resolution::Deleted));
                }
            }
        }

        let edited = diff
            .versions()
            .iter()
            .filter_map(|v| v.value.as_ref())
            .any(|value| edited_since(value, &original));
        if edited {
            trace!(path = diff.path(), "edited after ancestor");
            Ok(Some(Resolution::Inode(kept)))
        } else {
            Ok(Some(Resolution::Deleted))
        }
    }
}

/// The value `inode`'s id has in the latest candidate that holds it.
fn latest_value(ctx: &MergeContext<'_>, inode: Inode) -> Inode {
    let Some(inode_diff) = ctx.diff_set().inode_diffs().get(&inode.id()) else {
        return inode;
    };
    let holders: Vec<RevisionTag> = inode_diff
        .groups()
        .iter()
        .filter(|g| g.value.is_some())
        .flat_map(|g| g.revisions.iter().copied())
        .collect();
    ctx.latest(&holders)
        .and_then(|tag| inode_diff.value_for(&tag).cloned().flatten())
        .unwrap_or(inode)
}

fn edited_since(value: &Inode, original: &Inode) -> bool {
    if value.identity != original.identity {
        return false;
    }
    let value = value.renumbered(original.id());
    value.stat != original.stat || value.content != original.content
}

/// The built-in policy named by `kind`.
pub fn builtin(kind: PolicyKind) -> Box<dyn FileDiffResolver> {
    match kind {
        PolicyKind::Latest => Box::new(LatestVersionResolver),
        PolicyKind::AncestorAware => Box::new(AncestorAwareResolver),
    }
}
