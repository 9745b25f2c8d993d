//! Writable working trees.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use revfs_crypto::random_identity;
use revfs_store::Blob;
use revfs_types::{InodeId, RevisionTag, TemporalAnchor};

use crate::archive::Archive;
use crate::directory::Directory;
use crate::error::{FsError, FsResult};
use crate::inode::{Inode, InodeKind, Stat};
use crate::path;
use crate::revision::RevisionInfo;
use crate::table::InodeTable;
use crate::view::{read_listing, FsView};

struct CachedListing {
    directory: Directory,
    dirty: bool,
}

/// A mutable tree opened from a revision (or blank) that commits new
/// revisions.
///
/// Directory listings are loaded lazily and written back on commit. Every
/// modified inode records the base revision in `changed_from`.
pub struct WorkingTree {
    archive: Arc<Archive>,
    base: Option<RevisionTag>,
    table: InodeTable,
    listings: HashMap<InodeId, CachedListing>,
    clock: Option<u64>,
}

impl WorkingTree {
    pub(crate) fn blank(archive: Arc<Archive>) -> Self {
        Self::from_table(archive, None, InodeTable::with_root())
    }

    pub(crate) fn from_table(
        archive: Arc<Archive>,
        base: Option<RevisionTag>,
        table: InodeTable,
    ) -> Self {
        Self {
            archive,
            base,
            table,
            listings: HashMap::new(),
            clock: None,
        }
    }

    /// Pin the timestamp (ns) used for every inode change.
    pub fn with_clock(mut self, now_ns: u64) -> Self {
        self.clock = Some(now_ns);
        self
    }

    pub fn set_clock(&mut self, now_ns: u64) {
        self.clock = Some(now_ns);
    }

    pub fn table(&self) -> &InodeTable {
        &self.table
    }

    fn now(&self) -> u64 {
        self.clock
            .unwrap_or_else(|| TemporalAnchor::now(self.archive.node_id()).as_nanos())
    }

    // ---------------------------------------------------------------
    // Internal bookkeeping
    // ---------------------------------------------------------------

    fn cached(&mut self, dir: InodeId) -> FsResult<&mut CachedListing> {
        if !self.listings.contains_key(&dir) {
            let inode = self.table.get(dir).ok_or(FsError::MissingInode(dir))?;
            let directory = read_listing(&self.archive, inode)?;
            self.listings.insert(
                dir,
                CachedListing {
                    directory,
                    dirty: false,
                },
            );
        }
        self.listings.get_mut(&dir).ok_or(FsError::MissingInode(dir))
    }

    /// Mutable listing of `dir`, marked for write-back.
    fn listing_mut(&mut self, dir: InodeId) -> FsResult<&mut Directory> {
        let cached = self.cached(dir)?;
        cached.dirty = true;
        Ok(&mut cached.directory)
    }

    /// Content change: mtime and ctime.
    fn touch(&mut self, id: InodeId) {
        let now = self.now();
        let base = self.base;
        if let Some(inode) = self.table.get_mut(id) {
            inode.stat.mtime = now;
            inode.stat.ctime = now;
            inode.changed_from = base;
        }
    }

    /// Metadata change: ctime only.
    fn mark_changed(&mut self, id: InodeId) {
        let now = self.now();
        let base = self.base;
        if let Some(inode) = self.table.get_mut(id) {
            inode.stat.ctime = now;
            inode.changed_from = base;
        }
    }

    /// Drop one link to `id`; the last link frees the inode and, for a
    /// directory, everything beneath it.
    fn release(&mut self, id: InodeId) -> FsResult<()> {
        let Some(inode) = self.table.get_mut(id) else {
            return Ok(());
        };
        inode.nlink = inode.nlink.saturating_sub(1);
        if inode.nlink > 0 {
            self.mark_changed(id);
            return Ok(());
        }

        let Some(removed) = self.table.remove(id) else {
            return Ok(());
        };
        debug!(inode = %id, kind = %removed.kind(), "released inode");
        if removed.is_directory() {
            let listing = match self.listings.remove(&id) {
                Some(cached) => cached.directory,
                None => read_listing(&self.archive, &removed)?,
            };
            let children: Vec<InodeId> = listing.iter().map(|(_, child)| child).collect();
            for child in children {
                self.release(child)?;
            }
        }
        Ok(())
    }

    /// Point `name` in `dir` at `inode`, inserting the inode if the table
    /// does not hold its id yet.
    fn attach(&mut self, dir: InodeId, name: &str, inode: &Inode) -> FsResult<()> {
        let id = inode.id();
        let previous = self.listing_mut(dir)?.insert(name, id);
        match previous {
            Some(old) if old == id => {
                if !self.table.contains(id) {
                    let mut fresh = inode.clone();
                    fresh.nlink = 1;
                    self.table.insert(fresh);
                }
                return Ok(());
            }
            Some(old) => self.release(old)?,
            None => {}
        }
        match self.table.get_mut(id) {
            Some(existing) => existing.nlink += 1,
            None => {
                let mut fresh = inode.clone();
                fresh.nlink = 1;
                self.table.insert(fresh);
            }
        }
        self.touch(dir);
        Ok(())
    }

    fn detach(&mut self, dir: InodeId, name: &str) -> FsResult<InodeId> {
        let id = self
            .listing_mut(dir)?
            .remove(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        self.touch(dir);
        Ok(id)
    }

    /// Normalized path, its parent directory id and its final component.
    fn split_parent(&self, raw: &str) -> FsResult<(String, InodeId, String)> {
        let normalized = path::normalize(raw)?;
        if normalized == "/" {
            return Err(FsError::InvalidPath(normalized));
        }
        let parent_path = path::dirname(&normalized);
        let parent = self.directory_id(parent_path)?;
        let name = path::basename(&normalized).to_string();
        Directory::validate_name(&name)?;
        Ok((normalized, parent, name))
    }

    fn directory_id(&self, path: &str) -> FsResult<InodeId> {
        let id = self
            .resolve_path(path)?
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        match self.table.get(id) {
            Some(inode) if inode.is_directory() => Ok(id),
            _ => Err(FsError::NotADirectory(path.to_string())),
        }
    }

    fn existing(&self, path: &str) -> FsResult<InodeId> {
        self.resolve_path(path)?
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    fn new_inode(&mut self, kind: InodeKind) -> Inode {
        let id = self.table.issue_inode_id();
        let mut inode = Inode::new(Stat::new(id, kind, self.now()), random_identity());
        inode.changed_from = self.base;
        inode
    }

    // ---------------------------------------------------------------
    // File operations
    // ---------------------------------------------------------------

    /// Create or overwrite a regular file.
    pub fn write_file(&mut self, path: &str, data: &[u8]) -> FsResult<InodeId> {
        let (path, parent, name) = self.split_parent(path)?;
        let content = if data.is_empty() {
            None
        } else {
            Some(
                self.archive
                    .store()
                    .write(&Blob::new(data.to_vec()).to_stored_object())?,
            )
        };

        if let Some(id) = self.listing(parent)?.get(&name) {
            let inode = self.table.get_mut(id).ok_or(FsError::MissingInode(id))?;
            if inode.is_directory() {
                return Err(FsError::IsADirectory(path));
            }
            inode.content = content;
            inode.stat.size = data.len() as u64;
            self.touch(id);
            return Ok(id);
        }

        let mut inode = self.new_inode(InodeKind::File);
        inode.content = content;
        inode.stat.size = data.len() as u64;
        let id = inode.id();
        self.attach(parent, &name, &inode)?;
        Ok(id)
    }

    pub fn mkdir(&mut self, path: &str) -> FsResult<InodeId> {
        let (path, parent, name) = self.split_parent(path)?;
        if self.listing(parent)?.contains(&name) {
            return Err(FsError::AlreadyExists(path));
        }
        let inode = self.new_inode(InodeKind::Directory);
        let id = inode.id();
        self.attach(parent, &name, &inode)?;
        Ok(id)
    }

    /// Create a directory and any missing ancestors.
    pub fn mkdirp(&mut self, path: &str) -> FsResult<InodeId> {
        let normalized = path::normalize(path)?;
        let mut current = String::from("/");
        let mut id = InodeId::ROOT_DIRECTORY;
        for name in path::components(&normalized) {
            current = path::join(&current, name);
            id = match self.resolve_path(&current)? {
                Some(existing) => {
                    self.directory_id(&current)?;
                    existing
                }
                None => self.mkdir(&current)?,
            };
        }
        Ok(id)
    }

    /// Remove a non-directory entry.
    pub fn unlink(&mut self, path: &str) -> FsResult<()> {
        let (path, parent, name) = self.split_parent(path)?;
        let id = self.existing(&path)?;
        if self.table.get(id).is_some_and(Inode::is_directory) {
            return Err(FsError::IsADirectory(path));
        }
        self.detach(parent, &name)?;
        self.release(id)
    }

    /// Remove an empty directory.
    pub fn rmdir(&mut self, path: &str) -> FsResult<()> {
        let (path, parent, name) = self.split_parent(path)?;
        let id = self.directory_id(&path)?;
        if !self.listing(id)?.is_empty() {
            return Err(FsError::DirectoryNotEmpty(path));
        }
        self.detach(parent, &name)?;
        self.release(id)
    }

    /// Hard link `new_path` to the file at `existing`.
    pub fn link(&mut self, existing: &str, new_path: &str) -> FsResult<()> {
        let id = self.existing(existing)?;
        let inode = self.table.get(id).cloned().ok_or(FsError::MissingInode(id))?;
        if inode.is_directory() {
            return Err(FsError::IsADirectory(existing.to_string()));
        }
        let (new_path, parent, name) = self.split_parent(new_path)?;
        if self.listing(parent)?.contains(&name) {
            return Err(FsError::AlreadyExists(new_path));
        }
        self.attach(parent, &name, &inode)?;
        self.mark_changed(id);
        Ok(())
    }

    /// Move an entry. An existing non-directory destination is replaced.
    pub fn rename(&mut self, from: &str, to: &str) -> FsResult<()> {
        let (from, from_parent, from_name) = self.split_parent(from)?;
        let (to, to_parent, to_name) = self.split_parent(to)?;
        if from == to {
            return Ok(());
        }
        if to.starts_with(&format!("{from}/")) {
            return Err(FsError::InvalidPath(to));
        }
        let id = self.existing(&from)?;

        if let Some(dest) = self.listing(to_parent)?.get(&to_name) {
            if dest == id {
                self.detach(from_parent, &from_name)?;
                return self.release(id);
            }
            if self.table.get(dest).is_some_and(Inode::is_directory) {
                return Err(FsError::AlreadyExists(to));
            }
            self.detach(to_parent, &to_name)?;
            self.release(dest)?;
        }

        self.detach(from_parent, &from_name)?;
        self.listing_mut(to_parent)?.insert(to_name, id);
        self.touch(to_parent);
        self.mark_changed(id);
        Ok(())
    }

    pub fn chmod(&mut self, path: &str, mode: u32) -> FsResult<()> {
        let id = self.existing(path)?;
        if let Some(inode) = self.table.get_mut(id) {
            inode.stat.mode = mode & 0o7777;
        }
        self.mark_changed(id);
        Ok(())
    }

    pub fn chown(
        &mut self,
        path: &str,
        uid: u32,
        gid: u32,
        user: &str,
        group: &str,
    ) -> FsResult<()> {
        let id = self.existing(path)?;
        if let Some(inode) = self.table.get_mut(id) {
            inode.stat.uid = uid;
            inode.stat.gid = gid;
            inode.stat.user = user.to_string();
            inode.stat.group = group.to_string();
        }
        self.mark_changed(id);
        Ok(())
    }

    pub fn set_mtime(&mut self, path: &str, mtime_ns: u64) -> FsResult<()> {
        let id = self.existing(path)?;
        self.mark_changed(id);
        if let Some(inode) = self.table.get_mut(id) {
            inode.stat.mtime = mtime_ns;
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Low-level access used by merges
    // ---------------------------------------------------------------

    pub fn opendir(&mut self, path: &str) -> FsResult<DirectoryMut<'_>> {
        let normalized = path::normalize(path)?;
        let dir = self.directory_id(&normalized)?;
        Ok(DirectoryMut {
            tree: self,
            dir,
            path: normalized,
        })
    }

    /// Bind `inode` under its id, keeping this tree's link count and, for a
    /// directory that stays a directory, this tree's listing.
    pub fn replace_inode(&mut self, inode: Inode) {
        let id = inode.id();
        let mut value = inode;
        if let Some(existing) = self.table.get(id) {
            value.nlink = existing.nlink;
            if existing.is_directory() && value.is_directory() {
                value.content = existing.content;
                value.stat.size = existing.stat.size;
            } else if existing.is_directory() {
                self.listings.remove(&id);
            }
        }
        self.table.insert(value);
    }

    /// Move each inode in `moves` from its old id to its new one and repoint
    /// every directory entry that named the old id. New ids must be free.
    pub fn renumber_inodes(&mut self, moves: &BTreeMap<InodeId, InodeId>) -> FsResult<()> {
        if moves.is_empty() {
            return Ok(());
        }
        if let Some(taken) = moves.values().find(|to| self.table.contains(**to)) {
            return Err(FsError::AlreadyExists(taken.to_string()));
        }
        let mut held = Vec::with_capacity(moves.len());
        for (&from, &to) in moves {
            if let Some(inode) = self.table.remove(from) {
                held.push(inode.renumbered(to));
            }
            if let Some(cached) = self.listings.remove(&from) {
                self.listings.insert(to, cached);
            }
        }
        for inode in held {
            self.table.insert(inode);
        }

        let dirs: Vec<InodeId> = self
            .table
            .iter()
            .filter(|inode| inode.is_directory())
            .map(Inode::id)
            .collect();
        for dir in dirs {
            let cached = self.cached(dir)?;
            let moved: Vec<(String, InodeId)> = cached
                .directory
                .iter()
                .filter_map(|(name, id)| moves.get(&id).map(|to| (name.to_string(), *to)))
                .collect();
            if moved.is_empty() {
                continue;
            }
            cached.dirty = true;
            for (name, to) in moved {
                cached.directory.insert(name, to);
            }
        }
        debug!(moved = moves.len(), "renumbered inodes");
        Ok(())
    }

    /// Never issue ids below `next`.
    pub fn reserve_inode_ids(&mut self, next: InodeId) {
        self.table.reserve_through(next);
    }

    // ---------------------------------------------------------------
    // Commit
    // ---------------------------------------------------------------

    /// Commit with a fresh timestamp later than every parent's.
    pub fn commit(self, parents: &[RevisionTag], message: Option<String>) -> FsResult<RevisionTag> {
        let mut anchors = Vec::with_capacity(parents.len());
        for parent in parents {
            anchors.push(self.archive.revision_info(parent)?.timestamp);
        }
        let timestamp = TemporalAnchor::after_all(&anchors, self.archive.node_id());
        self.commit_at(parents, timestamp, message)
    }

    /// Commit with an explicit timestamp. Parents are sorted and deduplicated.
    pub fn commit_at(
        mut self,
        parents: &[RevisionTag],
        timestamp: TemporalAnchor,
        message: Option<String>,
    ) -> FsResult<RevisionTag> {
        let mut parents = parents.to_vec();
        parents.sort();
        parents.dedup();
        for parent in &parents {
            self.archive.adopt_revision(parent)?;
        }

        self.flush_listings()?;
        let table_id = self
            .archive
            .store()
            .write(&self.table.to_stored_object()?)?;
        let info = RevisionInfo {
            height: revfs_dag::RevisionNode::expected_height(&parents),
            parents,
            inode_table: table_id,
            timestamp,
            message,
        };
        self.archive.record_revision(&info)
    }

    fn flush_listings(&mut self) -> FsResult<()> {
        let mut dirty: Vec<InodeId> = self
            .listings
            .iter()
            .filter(|(_, cached)| cached.dirty)
            .map(|(id, _)| *id)
            .collect();
        dirty.sort();

        for id in dirty {
            let Some(cached) = self.listings.get_mut(&id) else {
                continue;
            };
            cached.dirty = false;
            let directory = cached.directory.clone();
            if !self.table.contains(id) {
                continue;
            }
            let content = self.archive.write_listing(&directory)?;
            if let Some(inode) = self.table.get_mut(id) {
                inode.content = content;
                inode.stat.size = directory.len() as u64;
            }
        }
        Ok(())
    }
}

impl FsView for WorkingTree {
    fn archive(&self) -> &Archive {
        &self.archive
    }

    fn base_revision(&self) -> Option<RevisionTag> {
        self.base
    }

    fn inode_ids(&self) -> Vec<InodeId> {
        self.table.ids()
    }

    fn inode(&self, id: InodeId) -> FsResult<Option<Inode>> {
        Ok(self.table.get(id).cloned())
    }

    fn next_inode_id(&self) -> InodeId {
        self.table.next_inode_id()
    }

    fn listing(&self, dir: InodeId) -> FsResult<Directory> {
        if let Some(cached) = self.listings.get(&dir) {
            return Ok(cached.directory.clone());
        }
        let inode = self.table.get(dir).ok_or(FsError::MissingInode(dir))?;
        read_listing(&self.archive, inode)
    }
}

impl std::fmt::Debug for WorkingTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkingTree")
            .field("base", &self.base)
            .field("inodes", &self.table.len())
            .field("cached_listings", &self.listings.len())
            .finish()
    }
}

/// An open directory in a [`WorkingTree`].
pub struct DirectoryMut<'a> {
    tree: &'a mut WorkingTree,
    dir: InodeId,
    path: String,
}

impl DirectoryMut<'_> {
    pub fn id(&self) -> InodeId {
        self.dir
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn entry(&self, name: &str) -> FsResult<Option<InodeId>> {
        Ok(self.tree.listing(self.dir)?.get(name))
    }

    pub fn contains(&self, name: &str) -> FsResult<bool> {
        Ok(self.entry(name)?.is_some())
    }

    pub fn entries(&self) -> FsResult<Vec<(String, InodeId)>> {
        Ok(self
            .tree
            .listing(self.dir)?
            .iter()
            .map(|(n, id)| (n.to_string(), id))
            .collect())
    }

    /// Link `name` to `inode`. An entry already pointing at another inode
    /// is replaced; one already pointing at this inode is left alone.
    pub fn link(&mut self, name: &str, inode: &Inode) -> FsResult<()> {
        Directory::validate_name(name)?;
        self.tree.attach(self.dir, name, inode)
    }

    /// Remove `name`, releasing its inode if this was the last link.
    pub fn unlink(&mut self, name: &str) -> FsResult<()> {
        let id = self.tree.detach(self.dir, name)?;
        self.tree.release(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> WorkingTree {
        Archive::in_memory().open_blank().with_clock(500)
    }

    // -----------------------------------------------------------------------
    // Files and directories
    // -----------------------------------------------------------------------

    #[test]
    fn write_creates_then_overwrites() {
        let mut t = tree();
        let id = t.write_file("/f", b"one").unwrap();
        assert!(id >= InodeId::USER_START);
        t.set_clock(900);
        assert_eq!(t.write_file("/f", b"three").unwrap(), id);
        assert_eq!(t.read_file("/f").unwrap(), b"three");
        let inode = t.inode(id).unwrap().unwrap();
        assert_eq!(inode.stat.size, 5);
        assert_eq!(inode.stat.mtime, 900);
        assert_eq!(inode.nlink, 1);
    }

    #[test]
    fn write_requires_parent_directory() {
        let mut t = tree();
        assert!(matches!(t.write_file("/no/f", b"x"), Err(FsError::NotFound(_))));
        t.write_file("/file", b"x").unwrap();
        assert!(matches!(
            t.write_file("/file/f", b"x"),
            Err(FsError::NotADirectory(_))
        ));
        t.mkdir("/d").unwrap();
        assert!(matches!(t.write_file("/d", b"x"), Err(FsError::IsADirectory(_))));
    }

    #[test]
    fn mkdirp_and_rmdir() {
        let mut t = tree();
        let id = t.mkdirp("/a/b/c").unwrap();
        assert_eq!(t.resolve_path("/a/b/c").unwrap(), Some(id));
        assert_eq!(t.mkdirp("/a/b/c").unwrap(), id);
        assert!(matches!(t.mkdir("/a"), Err(FsError::AlreadyExists(_))));
        assert!(matches!(t.rmdir("/a"), Err(FsError::DirectoryNotEmpty(_))));
        t.rmdir("/a/b/c").unwrap();
        assert!(t.resolve_path("/a/b/c").unwrap().is_none());
        assert!(!t.table().contains(id));
    }

    #[test]
    fn unlink_releases_only_last_link() {
        let mut t = tree();
        let id = t.write_file("/f", b"x").unwrap();
        t.link("/f", "/g").unwrap();
        t.unlink("/f").unwrap();
        assert_eq!(t.inode(id).unwrap().unwrap().nlink, 1);
        t.unlink("/g").unwrap();
        assert!(t.inode(id).unwrap().is_none());
        assert!(matches!(t.unlink("/g"), Err(FsError::NotFound(_))));
    }

    #[test]
    fn rename_keeps_inode_identity() {
        let mut t = tree();
        t.mkdir("/d").unwrap();
        let id = t.write_file("/p", b"data").unwrap();
        let victim = t.write_file("/d/q", b"old").unwrap();
        t.rename("/p", "/d/q").unwrap();
        assert_eq!(t.resolve_path("/d/q").unwrap(), Some(id));
        assert!(t.resolve_path("/p").unwrap().is_none());
        assert!(t.inode(victim).unwrap().is_none());
        assert!(matches!(t.rename("/d", "/d/sub"), Err(FsError::InvalidPath(_))));
    }

    #[test]
    fn metadata_changes() {
        let mut t = tree();
        t.write_file("/f", b"x").unwrap();
        t.chmod("/f", 0o100600).unwrap();
        t.chown("/f", 7, 8, "alice", "staff").unwrap();
        t.set_mtime("/f", 42).unwrap();
        let inode = t.inode_for_path("/f").unwrap().unwrap();
        assert_eq!(inode.stat.mode, 0o600);
        assert_eq!((inode.stat.uid, inode.stat.gid), (7, 8));
        assert_eq!(inode.stat.user, "alice");
        assert_eq!(inode.stat.mtime, 42);
    }

    // -----------------------------------------------------------------------
    // Directory handles and inode replacement
    // -----------------------------------------------------------------------

    #[test]
    fn directory_handle_links_foreign_inode() {
        let mut t = tree();
        let foreign = Inode::new(Stat::new(InodeId::new(90), InodeKind::File, 1), 5);
        {
            let mut root = t.opendir("/").unwrap();
            root.link("x", &foreign).unwrap();
            assert!(root.contains("x").unwrap());
            // Relinking the same inode is a no-op.
            root.link("x", &foreign).unwrap();
        }
        assert_eq!(t.inode(InodeId::new(90)).unwrap().unwrap().nlink, 1);
        assert_eq!(t.next_inode_id(), InodeId::new(91));

        let other = Inode::new(Stat::new(InodeId::new(91), InodeKind::File, 1), 6);
        t.opendir("/").unwrap().link("x", &other).unwrap();
        assert!(t.inode(InodeId::new(90)).unwrap().is_none());
        t.opendir("/").unwrap().unlink("x").unwrap();
        assert!(t.inode(InodeId::new(91)).unwrap().is_none());
    }

    #[test]
    fn unlinking_a_directory_releases_its_subtree() {
        let mut t = tree();
        t.mkdirp("/a/b").unwrap();
        let f = t.write_file("/a/b/f", b"x").unwrap();
        t.opendir("/").unwrap().unlink("a").unwrap();
        assert!(t.inode(f).unwrap().is_none());
        assert_eq!(t.inode_ids(), vec![InodeId::ROOT_DIRECTORY]);
    }

    #[test]
    fn replace_inode_keeps_links_and_listing() {
        let mut t = tree();
        let d = t.mkdir("/d").unwrap();
        t.write_file("/d/f", b"x").unwrap();
        let mut value = t.inode(d).unwrap().unwrap();
        value.stat.mode = 0o700;
        value.nlink = 9;
        value.content = None;
        t.replace_inode(value);

        let after = t.inode(d).unwrap().unwrap();
        assert_eq!(after.stat.mode, 0o700);
        assert_eq!(after.nlink, 1);
        assert_eq!(t.read_file("/d/f").unwrap(), b"x");
    }

    #[test]
    fn renumbering_moves_inodes_and_repoints_entries() {
        let archive = Archive::in_memory();
        let mut t = archive.open_blank().with_clock(10);
        let d = t.mkdir("/d").unwrap();
        let f = t.write_file("/d/f", b"x").unwrap();
        t.link("/d/f", "/g").unwrap();
        let base = t.commit(&[], None).unwrap();

        let mut t = archive.open_revision(&base).unwrap();
        let moves = BTreeMap::from([(d, InodeId::new(40)), (f, InodeId::new(41))]);
        t.renumber_inodes(&moves).unwrap();

        assert!(t.inode(d).unwrap().is_none());
        assert!(t.inode(f).unwrap().is_none());
        assert_eq!(t.resolve_path("/d").unwrap(), Some(InodeId::new(40)));
        assert_eq!(t.resolve_path("/d/f").unwrap(), Some(InodeId::new(41)));
        assert_eq!(t.resolve_path("/g").unwrap(), Some(InodeId::new(41)));
        let moved = t.inode(InodeId::new(41)).unwrap().unwrap();
        assert_eq!(moved.nlink, 2);
        assert_eq!(moved.id(), InodeId::new(41));

        let tag = t.commit(&[base], None).unwrap();
        let view = archive.read_only_fs(&tag).unwrap();
        assert_eq!(view.read_file("/g").unwrap(), b"x");
        assert_eq!(view.inode_for_path("/d/f").unwrap().unwrap().id(), InodeId::new(41));
    }

    #[test]
    fn renumbering_onto_a_live_id_fails() {
        let mut t = tree();
        let a = t.write_file("/a", b"a").unwrap();
        let b = t.write_file("/b", b"b").unwrap();
        assert!(matches!(
            t.renumber_inodes(&BTreeMap::from([(a, b)])),
            Err(FsError::AlreadyExists(_))
        ));
        assert_eq!(t.resolve_path("/a").unwrap(), Some(a));
    }

    // -----------------------------------------------------------------------
    // Commit
    // -----------------------------------------------------------------------

    #[test]
    fn commit_flushes_listings_and_marks_changes() {
        let archive = Archive::in_memory();
        let root = archive.open_blank().commit(&[], None).unwrap();
        let mut t = archive.open_revision(&root).unwrap().with_clock(10);
        t.mkdir("/d").unwrap();
        t.write_file("/d/f", b"payload").unwrap();
        let tag = t.commit(&[root], None).unwrap();

        assert_eq!(tag.height, 1);
        let view = archive.read_only_fs(&tag).unwrap();
        assert_eq!(view.read_file("/d/f").unwrap(), b"payload");
        let d = view.inode_for_path("/d").unwrap().unwrap();
        assert_eq!(d.stat.size, 1);
        assert_eq!(d.changed_from, Some(root));
        assert!(archive
            .revision_info(&tag)
            .unwrap()
            .timestamp
            .is_after(&archive.revision_info(&root).unwrap().timestamp));
    }

    #[test]
    fn identical_commits_share_a_tag() {
        let archive = Archive::in_memory();
        let root = archive.open_blank().commit(&[], None).unwrap();
        let anchor = TemporalAnchor::new(77, 0, 0);
        let a = archive.open_revision(&root).unwrap().commit_at(&[root], anchor, None).unwrap();
        let b = archive.open_revision(&root).unwrap().commit_at(&[root], anchor, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn emptied_directory_has_no_content() {
        let archive = Archive::in_memory();
        let mut t = archive.open_blank();
        t.write_file("/f", b"x").unwrap();
        t.unlink("/f").unwrap();
        let tag = t.commit(&[], None).unwrap();
        let root = archive
            .read_only_fs(&tag)
            .unwrap()
            .inode(InodeId::ROOT_DIRECTORY)
            .unwrap()
            .unwrap();
        assert_eq!(root.content, None);
        assert_eq!(root.stat.size, 0);
    }

    #[test]
    fn commit_rejects_unknown_parent() {
        let archive = Archive::in_memory();
        let bogus = RevisionTag::new(revfs_types::ObjectId::from_bytes(b"?"), 0);
        assert!(matches!(
            archive.open_blank().commit(&[bogus], None),
            Err(FsError::UnknownRevision(_))
        ));
    }
}
