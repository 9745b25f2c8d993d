//! Read-only filesystem queries.

use std::collections::HashSet;
use std::sync::Arc;

use revfs_types::{InodeId, RevisionTag};

use crate::archive::Archive;
use crate::directory::Directory;
use crate::error::{FsError, FsResult};
use crate::inode::Inode;
use crate::path;
use crate::table::InodeTable;

/// Read access shared by committed revisions and working trees.
///
/// Lookups that miss return `Ok(None)`; only storage failures are errors.
pub trait FsView {
    fn archive(&self) -> &Archive;

    /// The revision this tree was opened from, if any.
    fn base_revision(&self) -> Option<RevisionTag>;

    /// Ids of every live inode, sorted.
    fn inode_ids(&self) -> Vec<InodeId>;

    fn inode(&self, id: InodeId) -> FsResult<Option<Inode>>;

    /// The next id this tree's allocator would issue.
    fn next_inode_id(&self) -> InodeId;

    /// The listing of directory inode `dir`.
    fn listing(&self, dir: InodeId) -> FsResult<Directory>;

    fn list_all_inodes(&self) -> FsResult<Vec<Inode>> {
        let mut inodes = Vec::new();
        for id in self.inode_ids() {
            if let Some(inode) = self.inode(id)? {
                inodes.push(inode);
            }
        }
        Ok(inodes)
    }

    fn resolve_path(&self, path: &str) -> FsResult<Option<InodeId>> {
        let path = path::normalize(path)?;
        let mut current = InodeId::ROOT_DIRECTORY;
        for name in path::components(&path) {
            match self.inode(current)? {
                Some(inode) if inode.is_directory() => {}
                _ => return Ok(None),
            }
            match self.listing(current)?.get(name) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(self.inode(current)?.map(|_| current))
    }

    fn inode_for_path(&self, path: &str) -> FsResult<Option<Inode>> {
        match self.resolve_path(path)? {
            Some(id) => self.inode(id),
            None => Ok(None),
        }
    }

    /// Every reachable `(path, inode id)` pair, root included, sorted by path.
    /// A directory linked more than once is only descended into once.
    fn walk_tree(&self) -> FsResult<Vec<(String, InodeId)>> {
        let mut found = vec![("/".to_string(), InodeId::ROOT_DIRECTORY)];
        let mut visited = HashSet::new();
        let mut stack = vec![("/".to_string(), InodeId::ROOT_DIRECTORY)];
        while let Some((dir_path, dir_id)) = stack.pop() {
            if !visited.insert(dir_id) {
                continue;
            }
            for (name, child) in self.listing(dir_id)?.iter() {
                let child_path = path::join(&dir_path, name);
                if self.inode(child)?.is_some_and(|i| i.is_directory()) {
                    stack.push((child_path.clone(), child));
                }
                found.push((child_path, child));
            }
        }
        found.sort();
        Ok(found)
    }

    fn list_all_paths(&self) -> FsResult<Vec<String>> {
        Ok(self.walk_tree()?.into_iter().map(|(p, _)| p).collect())
    }

    fn find_paths_for_inode(&self, id: InodeId) -> FsResult<Vec<String>> {
        Ok(self
            .walk_tree()?
            .into_iter()
            .filter(|(_, target)| *target == id)
            .map(|(p, _)| p)
            .collect())
    }

    fn read_file(&self, path: &str) -> FsResult<Vec<u8>> {
        let inode = self
            .inode_for_path(path)?
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        if inode.is_directory() {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        match inode.content {
            Some(id) => self.archive().read_blob(&id),
            None => Ok(Vec::new()),
        }
    }

    /// Entries of the directory at `path` with their inodes.
    fn read_dir(&self, path: &str) -> FsResult<Vec<(String, Inode)>> {
        let id = self
            .resolve_path(path)?
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        let mut entries = Vec::new();
        for (name, child) in self.listing(id)?.iter() {
            let inode = self.inode(child)?.ok_or(FsError::MissingInode(child))?;
            entries.push((name.to_string(), inode));
        }
        Ok(entries)
    }
}

/// Decode the listing a directory inode points at.
pub(crate) fn read_listing(archive: &Archive, inode: &Inode) -> FsResult<Directory> {
    if !inode.is_directory() {
        return Err(FsError::NotADirectory(inode.id().to_string()));
    }
    match inode.content {
        Some(id) => {
            let obj = archive.store().fetch(&id)?;
            Ok(Directory::from_stored_object(&obj)?)
        }
        None => Ok(Directory::new()),
    }
}

/// Read-only snapshot of one committed revision.
///
/// Holds the revision's inode table in memory; directory listings are read
/// from the store on demand. Counted as open by the archive until dropped.
pub struct RevisionView {
    archive: Arc<Archive>,
    tag: RevisionTag,
    table: InodeTable,
}

impl RevisionView {
    pub(crate) fn new(archive: Arc<Archive>, tag: RevisionTag, table: InodeTable) -> Self {
        archive.view_opened();
        Self {
            archive,
            tag,
            table,
        }
    }

    pub fn tag(&self) -> RevisionTag {
        self.tag
    }

    pub fn table(&self) -> &InodeTable {
        &self.table
    }
}

impl Drop for RevisionView {
    fn drop(&mut self) {
        self.archive.view_closed();
    }
}

impl FsView for RevisionView {
    fn archive(&self) -> &Archive {
        &self.archive
    }

    fn base_revision(&self) -> Option<RevisionTag> {
        Some(self.tag)
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
        let inode = self.table.get(dir).ok_or(FsError::MissingInode(dir))?;
        read_listing(&self.archive, inode)
    }
}

impl std::fmt::Debug for RevisionView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevisionView")
            .field("tag", &self.tag)
            .field("inodes", &self.table.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Arc<Archive>, RevisionTag) {
        let archive = Archive::in_memory();
        let mut tree = archive.open_blank().with_clock(1_000);
        tree.mkdirp("/a/b").unwrap();
        tree.write_file("/a/b/c.txt", b"deep").unwrap();
        tree.write_file("/top.txt", b"top").unwrap();
        tree.link("/top.txt", "/a/alias.txt").unwrap();
        let tag = tree.commit(&[], None).unwrap();
        (archive, tag)
    }

    #[test]
    fn lists_every_path_including_root() {
        let (archive, tag) = sample();
        let view = archive.read_only_fs(&tag).unwrap();
        assert_eq!(
            view.list_all_paths().unwrap(),
            vec!["/", "/a", "/a/alias.txt", "/a/b", "/a/b/c.txt", "/top.txt"]
        );
        assert_eq!(view.list_all_inodes().unwrap().len(), 5);
    }

    #[test]
    fn resolve_misses_are_none() {
        let (archive, tag) = sample();
        let view = archive.read_only_fs(&tag).unwrap();
        assert!(view.resolve_path("/missing").unwrap().is_none());
        // Walking through a file is a miss too.
        assert!(view.resolve_path("/top.txt/x").unwrap().is_none());
        assert_eq!(view.resolve_path("/").unwrap(), Some(InodeId::ROOT_DIRECTORY));
    }

    #[test]
    fn hard_links_share_an_inode() {
        let (archive, tag) = sample();
        let view = archive.read_only_fs(&tag).unwrap();
        let id = view.resolve_path("/top.txt").unwrap().unwrap();
        assert_eq!(
            view.find_paths_for_inode(id).unwrap(),
            vec!["/a/alias.txt", "/top.txt"]
        );
        assert_eq!(view.inode(id).unwrap().unwrap().nlink, 2);
        assert_eq!(view.read_file("/a/alias.txt").unwrap(), b"top");
    }

    #[test]
    fn read_errors() {
        let (archive, tag) = sample();
        let view = archive.read_only_fs(&tag).unwrap();
        assert!(matches!(view.read_file("/a"), Err(FsError::IsADirectory(_))));
        assert!(matches!(view.read_file("/nope"), Err(FsError::NotFound(_))));
        let names: Vec<String> = view.read_dir("/a").unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["alias.txt", "b"]);
    }
}
