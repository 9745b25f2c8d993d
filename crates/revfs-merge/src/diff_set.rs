//! Enumerating everything that differs across a set of candidate revisions.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, trace};

use revfs_dag::RevisionOrder;
use revfs_fs::{Archive, Directory, FsView, Inode, RevisionView};
use revfs_types::{InodeId, RevisionTag};

use crate::error::{MergeError, MergeResult};
use crate::file_diff::{DiffOrigin, FileDiff};
use crate::inode_diff::InodeDiff;
use crate::path_diff::{remap, replay_order, IdMap, PathDiff};
use crate::policy::FileDiffResolver;
use crate::resolver::DiffSetResolver;

/// The conflicts between a fixed set of candidate revisions.
///
/// Only conflicting inodes and paths are kept. Candidates are sorted and
/// deduplicated on construction so the same set always yields the same
/// diff set.
pub struct DiffSet {
    archive: Arc<Archive>,
    revisions: Vec<RevisionTag>,
    common_ancestor: Option<RevisionTag>,
    inode_diffs: BTreeMap<InodeId, InodeDiff>,
    path_diffs: BTreeMap<String, PathDiff>,
    id_map: IdMap,
    next_inode_id: InodeId,
}

impl DiffSet {
    /// An empty diff set over `revisions`. Fails on an empty candidate set
    /// or a revision missing from the archive.
    pub fn new(archive: &Arc<Archive>, revisions: &[RevisionTag]) -> MergeResult<Self> {
        if revisions.is_empty() {
            return Err(MergeError::InvalidArgument(
                "a diff set needs at least one candidate revision".into(),
            ));
        }
        let mut revisions = revisions.to_vec();
        revisions.sort();
        revisions.dedup();
        for tag in &revisions {
            archive.adopt_revision(tag)?;
        }

        let common_ancestor = archive.common_ancestor(&revisions);
        debug!(
            candidates = revisions.len(),
            ancestor = ?common_ancestor.map(|t| t.to_string()),
            "created diff set"
        );
        Ok(Self {
            archive: Arc::clone(archive),
            revisions,
            common_ancestor,
            inode_diffs: BTreeMap::new(),
            path_diffs: BTreeMap::new(),
            id_map: IdMap::new(),
            next_inode_id: InodeId::USER_START,
        })
    }

    /// Create a diff set and run both enumeration passes.
    pub fn build(archive: &Arc<Archive>, revisions: &[RevisionTag]) -> MergeResult<Self> {
        let mut set = Self::new(archive, revisions)?;
        set.find_inode_diffs()?;
        set.find_path_diffs()?;
        Ok(set)
    }

    pub fn archive(&self) -> &Arc<Archive> {
        &self.archive
    }

    pub fn revisions(&self) -> &[RevisionTag] {
        &self.revisions
    }

    pub fn common_ancestor(&self) -> Option<RevisionTag> {
        self.common_ancestor
    }

    pub fn inode_diffs(&self) -> &BTreeMap<InodeId, InodeDiff> {
        &self.inode_diffs
    }

    pub(crate) fn inode_diffs_mut(&mut self) -> &mut BTreeMap<InodeId, InodeDiff> {
        &mut self.inode_diffs
    }

    pub fn path_diffs(&self) -> &BTreeMap<String, PathDiff> {
        &self.path_diffs
    }

    pub(crate) fn path_diffs_mut(&mut self) -> &mut BTreeMap<String, PathDiff> {
        &mut self.path_diffs
    }

    /// Ids renumbered because candidates used them for different objects.
    pub fn id_map(&self) -> &IdMap {
        &self.id_map
    }

    /// First id the merged tree may issue: above every candidate's
    /// allocator and every renumbered id.
    pub fn next_inode_id(&self) -> InodeId {
        self.next_inode_id
    }

    pub fn is_empty(&self) -> bool {
        self.inode_diffs.is_empty() && self.path_diffs.is_empty()
    }

    /// One read-only view per candidate. Dropping the vector releases them.
    pub(crate) fn open_views(&self) -> MergeResult<Vec<RevisionView>> {
        let mut views = Vec::with_capacity(self.revisions.len());
        for tag in &self.revisions {
            views.push(self.archive.read_only_fs(tag)?);
        }
        Ok(views)
    }

    /// Every inode id live in at least one candidate.
    pub fn all_inodes(&self) -> MergeResult<BTreeSet<InodeId>> {
        Ok(union_inodes(&self.open_views()?))
    }

    /// Every path reachable in at least one candidate, plus the root.
    pub fn all_paths(&self) -> MergeResult<BTreeSet<String>> {
        union_paths(&self.open_views()?)
    }

    // ---------------------------------------------------------------
    // Enumeration
    // ---------------------------------------------------------------

    /// Record every inode id whose value differs between candidates.
    ///
    /// An id holding objects of different identities in different
    /// candidates is split: the lowest identity keeps the id and each other
    /// identity moves to a fresh id, recorded in [`id_map`](Self::id_map).
    /// Directory values have their entries repointed at the moved ids of
    /// the same candidate, so every value speaks of the merged id space.
    pub fn find_inode_diffs(&mut self) -> MergeResult<()> {
        let views = self.open_views()?;
        let mut next = views
            .iter()
            .map(|v| v.next_inode_id())
            .max()
            .unwrap_or(InodeId::USER_START);
        let ids = union_inodes(&views);

        // Every move has to be known before any listing is rewritten.
        let mut id_map = IdMap::new();
        for &id in &ids {
            let mut held = Vec::with_capacity(views.len());
            for view in &views {
                if let Some(inode) = view.inode(id)? {
                    held.push((view.tag(), inode.identity));
                }
            }
            let identities: BTreeSet<u64> = held.iter().map(|(_, identity)| *identity).collect();
            for identity in identities.into_iter().skip(1) {
                let target = next;
                next = next.next();
                for (tag, _) in held.iter().filter(|(_, i)| *i == identity) {
                    id_map.entry(id).or_default().insert(*tag, target);
                }
                debug!(from = %id, to = %target, identity, "renumbered inode");
            }
        }

        let mut inode_diffs = BTreeMap::new();
        for id in ids {
            let mut values = Vec::with_capacity(views.len());
            for view in &views {
                let tag = view.tag();
                values.push((tag, remap(&id_map, id, &tag).0, candidate_value(view, id, &id_map)?));
            }
            let split = id_map.contains_key(&id);
            let targets: BTreeSet<InodeId> = std::iter::once(id)
                .chain(id_map.get(&id).into_iter().flat_map(|moved| moved.values().copied()))
                .collect();
            for target in targets {
                let mut diff = InodeDiff::new(target);
                for (tag, held_at, value) in &values {
                    let value = value.clone().filter(|_| *held_at == target);
                    diff.add(value, id, &[*tag]);
                }
                if split || diff.is_conflict() {
                    trace!(inode = %target, groups = diff.groups().len(), "inode conflict");
                    inode_diffs.insert(target, diff);
                }
            }
        }

        debug!(
            inodes = inode_diffs.len(),
            renumbered = id_map.len(),
            "found inode diffs"
        );
        self.inode_diffs = inode_diffs;
        self.id_map = id_map;
        self.next_inode_id = next;
        Ok(())
    }

    /// Record every path whose target differs between candidates. Runs
    /// after [`find_inode_diffs`](Self::find_inode_diffs) so renumbered ids
    /// are applied.
    pub fn find_path_diffs(&mut self) -> MergeResult<()> {
        let views = self.open_views()?;
        let mut path_diffs = BTreeMap::new();
        for path in union_paths(&views)? {
            let diff = PathDiff::from_views(&path, &views, Some(&self.id_map))?;
            if diff.is_conflict() {
                trace!(path = %path, groups = diff.groups().len(), "path conflict");
                path_diffs.insert(path, diff);
            }
        }
        debug!(paths = path_diffs.len(), "found path diffs");
        self.path_diffs = path_diffs;
        Ok(())
    }

    /// The decisions a policy has to make: one per conflicting path, plus
    /// one per conflicting inode no conflicting path points at, anchored at
    /// that inode's lowest path. Inodes unreachable in every candidate get
    /// no file diff.
    pub fn file_diffs(&self) -> MergeResult<Vec<FileDiff>> {
        let views = self.open_views()?;
        let mut diffs = Vec::new();
        let mut targeted = BTreeSet::new();

        for path_diff in self.path_diffs.values() {
            let mut diff = FileDiff::new(path_diff.path(), DiffOrigin::Path);
            for view in &views {
                let tag = view.tag();
                let value = match view.resolve_path(path_diff.path())? {
                    Some(raw) => {
                        targeted.insert(remap(&self.id_map, raw, &tag).0);
                        candidate_value(view, raw, &self.id_map)?
                    }
                    None => None,
                };
                diff.add(value, tag);
            }
            diffs.push(diff);
        }

        let in_place: Vec<&InodeDiff> = self
            .inode_diffs
            .values()
            .filter(|d| !targeted.contains(&d.inode_id()))
            .collect();
        if !in_place.is_empty() {
            let lowest = lowest_paths(&views)?;
            for inode_diff in in_place {
                let path = views
                    .iter()
                    .zip(&lowest)
                    .filter_map(|(view, paths)| {
                        let original = inode_diff.original_inode_id_for_tag(&view.tag())?;
                        paths.get(&original)
                    })
                    .min_by(|a, b| replay_order(a, false, b, false));
                match path {
                    Some(path) => diffs.push(FileDiff::with_versions(
                        path.clone(),
                        DiffOrigin::Inode(inode_diff.inode_id()),
                        inode_diff.groups().to_vec(),
                    )),
                    None => {
                        debug!(inode = %inode_diff.inode_id(), "inode unreachable in every candidate");
                    }
                }
            }
        }
        Ok(diffs)
    }

    // ---------------------------------------------------------------
    // Resolution
    // ---------------------------------------------------------------

    /// A resolver ordering candidates by the archive's revision graph.
    pub fn resolver<'p>(
        self,
        policy: &'p dyn FileDiffResolver,
    ) -> MergeResult<DiffSetResolver<'p>> {
        let order: Arc<dyn RevisionOrder + Send + Sync> = Arc::clone(&self.archive) as _;
        DiffSetResolver::new(self, policy, order)
    }

    /// A resolver with an explicit revision order.
    pub fn resolver_with_order<'p>(
        self,
        policy: &'p dyn FileDiffResolver,
        order: Arc<dyn RevisionOrder + Send + Sync>,
    ) -> MergeResult<DiffSetResolver<'p>> {
        DiffSetResolver::new(self, policy, order)
    }

    /// Resolve every conflict with `policy` and commit the merged tree.
    pub fn resolve(self, policy: &dyn FileDiffResolver) -> MergeResult<RevisionTag> {
        self.resolver(policy)?.resolve()
    }
}

impl std::fmt::Debug for DiffSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiffSet")
            .field("revisions", &self.revisions)
            .field("common_ancestor", &self.common_ancestor)
            .field("inode_diffs", &self.inode_diffs.len())
            .field("path_diffs", &self.path_diffs.len())
            .field("renumbered", &self.id_map.len())
            .finish()
    }
}

/// `raw`'s value in `view` under its merged id. A directory's entries are
/// repointed at the ids their targets were moved to in the same candidate.
fn candidate_value(view: &RevisionView, raw: InodeId, id_map: &IdMap) -> MergeResult<Option<Inode>> {
    let Some(inode) = view.inode(raw)? else {
        return Ok(None);
    };
    let tag = view.tag();
    let (id, moved) = remap(id_map, raw, &tag);
    let mut value = if moved { inode.renumbered(id) } else { inode };
    if !value.is_directory() || id_map.is_empty() {
        return Ok(Some(value));
    }

    let mut listing = Directory::new();
    let mut repointed = false;
    for (name, child) in view.listing(raw)?.iter() {
        let (child, moved) = remap(id_map, child, &tag);
        repointed |= moved;
        listing.insert(name, child);
    }
    if repointed {
        value.content = view.archive().write_listing(&listing)?;
        trace!(inode = %id, revision = %tag, "repointed directory entries");
    }
    Ok(Some(value))
}

fn union_inodes(views: &[RevisionView]) -> BTreeSet<InodeId> {
    views.iter().flat_map(|v| v.inode_ids()).collect()
}

fn union_paths(views: &[RevisionView]) -> MergeResult<BTreeSet<String>> {
    let mut paths = BTreeSet::from(["/".to_string()]);
    for view in views {
        paths.extend(view.list_all_paths()?);
    }
    Ok(paths)
}

/// Per view, the lowest path of every reachable inode.
fn lowest_paths(views: &[RevisionView]) -> MergeResult<Vec<BTreeMap<InodeId, String>>> {
    let mut result = Vec::with_capacity(views.len());
    for view in views {
        let mut lowest: BTreeMap<InodeId, String> = BTreeMap::new();
        for (path, id) in view.walk_tree()? {
            match lowest.get(&id) {
                Some(current) if replay_order(current, false, &path, false).is_le() => {}
                _ => {
                    lowest.insert(id, path);
                }
            }
        }
        result.push(lowest);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use revfs_fs::WorkingTree;
    use revfs_store::ObjectStore;

    fn commit(tree: WorkingTree, parents: &[RevisionTag], message: &str) -> RevisionTag {
        tree.commit(parents, Some(message.to_string())).unwrap()
    }

    /// A root revision with `/shared` and `/dir/inner`, plus two children
    /// of it produced by `left` and `right`.
    fn fork(
        left: impl FnOnce(&mut WorkingTree),
        right: impl FnOnce(&mut WorkingTree),
    ) -> (Arc<Archive>, RevisionTag, RevisionTag, RevisionTag) {
        let archive = Archive::in_memory();
        let mut tree = archive.open_blank().with_clock(1_000);
        tree.write_file("/shared", b"base").unwrap();
        tree.mkdir("/dir").unwrap();
        tree.write_file("/dir/inner", b"inner").unwrap();
        let base = commit(tree, &[], "base");

        let mut a = archive.open_revision(&base).unwrap().with_clock(2_000);
        left(&mut a);
        let a = commit(a, &[base], "left");
        let mut b = archive.open_revision(&base).unwrap().with_clock(3_000);
        right(&mut b);
        let b = commit(b, &[base], "right");
        (archive, base, a, b)
    }

    #[test]
    fn empty_candidate_set_is_rejected() {
        let archive = Archive::in_memory();
        assert!(matches!(
            DiffSet::new(&archive, &[]),
            Err(MergeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn candidates_are_sorted_and_deduplicated() {
        let (archive, base, a, b) = fork(|_| {}, |_| {});
        let set = DiffSet::new(&archive, &[b, a, b]).unwrap();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(set.revisions(), expected.as_slice());
        assert_eq!(set.common_ancestor(), Some(base));
    }

    #[test]
    fn unions_cover_every_candidate() {
        let (archive, _, a, b) = fork(
            |t| {
                t.write_file("/only-a", b"a").unwrap();
            },
            |t| {
                t.unlink("/shared").unwrap();
            },
        );
        let set = DiffSet::new(&archive, &[a, b]).unwrap();
        let paths = set.all_paths().unwrap();
        assert!(paths.contains("/"));
        assert!(paths.contains("/only-a"));
        assert!(paths.contains("/shared"));
        assert!(set.all_inodes().unwrap().contains(&InodeId::ROOT_DIRECTORY));
        assert_eq!(archive.open_view_count(), 0);
    }

    #[test]
    fn unchanged_candidates_have_no_diffs() {
        let (archive, _, a, _) = fork(|_| {}, |_| {});
        let set = DiffSet::build(&archive, &[a, a]).unwrap();
        assert!(set.is_empty());
        assert!(set.file_diffs().unwrap().is_empty());
    }

    #[test]
    fn in_place_edit_is_an_inode_only_diff() {
        let (archive, _, a, b) = fork(
            |t| {
                t.write_file("/dir/inner", b"left").unwrap();
            },
            |_| {},
        );
        let set = DiffSet::build(&archive, &[a, b]).unwrap();
        assert!(set.path_diffs().is_empty());

        let inner = archive
            .read_only_fs(&a)
            .unwrap()
            .resolve_path("/dir/inner")
            .unwrap()
            .unwrap();
        assert!(set.inode_diffs().contains_key(&inner));

        let diffs = set.file_diffs().unwrap();
        let diff = diffs.iter().find(|d| d.path() == "/dir/inner").unwrap();
        assert_eq!(diff.origin(), DiffOrigin::Inode(inner));
        assert_eq!(diff.versions().len(), 2);
        assert_eq!(diffs.len(), 1);
    }

    #[test]
    fn colliding_ids_are_renumbered() {
        let (archive, _, a, b) = fork(
            |t| {
                t.write_file("/left", b"l").unwrap();
            },
            |t| {
                t.write_file("/right", b"r").unwrap();
            },
        );
        let left = archive.read_only_fs(&a).unwrap().resolve_path("/left").unwrap().unwrap();
        let right = archive.read_only_fs(&b).unwrap().resolve_path("/right").unwrap().unwrap();
        assert_eq!(left, right);

        let set = DiffSet::build(&archive, &[a, b]).unwrap();
        let moved = set.id_map().get(&left).expect("collision recorded");
        assert_eq!(moved.len(), 1);
        let (moved_tag, new_id) = moved.iter().next().unwrap();
        assert!(set.inode_diffs().contains_key(new_id));
        assert!(set.next_inode_id() > *new_id);

        let moved_path = if *moved_tag == a { "/left" } else { "/right" };
        assert_eq!(set.path_diffs()[moved_path].id_for(moved_tag), Some(*new_id));
    }

    #[test]
    fn moved_directory_entries_follow_their_children() {
        let (archive, _, a, b) = fork(
            |t| {
                t.mkdir("/da").unwrap();
                t.write_file("/da/f", b"f").unwrap();
            },
            |t| {
                t.write_file("/fb", b"fb").unwrap();
                t.write_file("/fc", b"fc").unwrap();
            },
        );
        let left = archive.read_only_fs(&a).unwrap();
        let da = left.resolve_path("/da").unwrap().unwrap();
        let f = left.resolve_path("/da/f").unwrap().unwrap();
        drop(left);

        let set = DiffSet::build(&archive, &[a, b]).unwrap();
        assert_eq!(set.id_map().len(), 2);
        let (da_now, _) = remap(set.id_map(), da, &a);
        let (f_now, _) = remap(set.id_map(), f, &a);

        let value = set.inode_diffs()[&da_now]
            .value_for(&a)
            .cloned()
            .flatten()
            .unwrap();
        assert_eq!(value.id(), da_now);
        let stored = archive.store().fetch(&value.content.unwrap()).unwrap();
        let listing = Directory::from_stored_object(&stored).unwrap();
        assert_eq!(listing.get("f"), Some(f_now));

        // Path diffs carry the same value, so both enumerations agree.
        let diffs = set.file_diffs().unwrap();
        let at_da = diffs.iter().find(|d| d.path() == "/da").unwrap();
        assert_eq!(at_da.value_for(&a), Some(&Some(value)));
        assert_eq!(archive.open_view_count(), 0);
    }
}
