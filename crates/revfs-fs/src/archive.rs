//! The archive: one object store and the revision graph built over it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use tracing::{debug, info};

use revfs_dag::{RevisionGraph, RevisionNode, RevisionOrder};
use revfs_store::{Blob, InMemoryObjectStore, ObjectStore};
use revfs_types::{ObjectId, RevisionTag};

use crate::directory::Directory;
use crate::error::{FsError, FsResult};
use crate::revision::RevisionInfo;
use crate::table::InodeTable;
use crate::view::RevisionView;
use crate::working::WorkingTree;

/// Shared handle to an object store and the graph of revisions in it.
///
/// Read-only views and working trees hold an `Arc<Archive>`. The archive
/// counts open [`RevisionView`]s so callers can check that every view was
/// released.
pub struct Archive {
    store: Arc<dyn ObjectStore>,
    graph: RwLock<RevisionGraph>,
    node_id: u16,
    open_views: AtomicUsize,
}

impl Archive {
    pub fn new(store: Arc<dyn ObjectStore>) -> Arc<Self> {
        Self::with_node_id(store, 0)
    }

    /// `node_id` is stamped into the timestamps of locally made commits.
    pub fn with_node_id(store: Arc<dyn ObjectStore>, node_id: u16) -> Arc<Self> {
        Arc::new(Self {
            store,
            graph: RwLock::new(RevisionGraph::new()),
            node_id,
            open_views: AtomicUsize::new(0),
        })
    }

    pub fn in_memory() -> Arc<Self> {
        Self::new(Arc::new(InMemoryObjectStore::new()))
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    pub fn graph(&self) -> RwLockReadGuard<'_, RevisionGraph> {
        self.graph.read().expect("lock poisoned")
    }

    // ---------------------------------------------------------------
    // Opening trees
    // ---------------------------------------------------------------

    /// A working tree holding only an empty root directory.
    pub fn open_blank(self: &Arc<Self>) -> WorkingTree {
        WorkingTree::blank(Arc::clone(self))
    }

    /// A working tree that starts from `tag` and commits on top of it.
    pub fn open_revision(self: &Arc<Self>, tag: &RevisionTag) -> FsResult<WorkingTree> {
        let table = self.load_inode_table(tag)?;
        Ok(WorkingTree::from_table(Arc::clone(self), Some(*tag), table))
    }

    /// A read-only view of `tag`. Released when dropped.
    pub fn read_only_fs(self: &Arc<Self>, tag: &RevisionTag) -> FsResult<RevisionView> {
        let table = self.load_inode_table(tag)?;
        Ok(RevisionView::new(Arc::clone(self), *tag, table))
    }

    pub fn open_view_count(&self) -> usize {
        self.open_views.load(Ordering::SeqCst)
    }

    pub(crate) fn view_opened(&self) {
        self.open_views.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn view_closed(&self) {
        self.open_views.fetch_sub(1, Ordering::SeqCst);
    }

    // ---------------------------------------------------------------
    // Revision records
    // ---------------------------------------------------------------

    pub fn revision_info(&self, tag: &RevisionTag) -> FsResult<RevisionInfo> {
        let obj = self
            .store
            .read(&tag.id)?
            .ok_or(FsError::UnknownRevision(*tag))?;
        let info = RevisionInfo::from_stored_object(&obj)?;
        if info.height != tag.height {
            return Err(FsError::UnknownRevision(*tag));
        }
        Ok(info)
    }

    pub fn load_inode_table(&self, tag: &RevisionTag) -> FsResult<InodeTable> {
        let info = self.revision_info(tag)?;
        let obj = self.store.fetch(&info.inode_table)?;
        Ok(InodeTable::from_stored_object(&obj)?)
    }

    pub fn read_blob(&self, id: &ObjectId) -> FsResult<Vec<u8>> {
        let obj = self.store.fetch(id)?;
        Ok(Blob::from_stored_object(&obj)?.data)
    }

    /// Store a directory listing. An empty listing is not stored and has no
    /// content id.
    pub fn write_listing(&self, directory: &Directory) -> FsResult<Option<ObjectId>> {
        if directory.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.store.write(&directory.to_stored_object()?)?))
    }

    /// Store a revision record and add it to the graph. Recording the same
    /// record twice returns the same tag.
    pub fn record_revision(&self, info: &RevisionInfo) -> FsResult<RevisionTag> {
        let id = self.store.write(&info.to_stored_object()?)?;
        let tag = RevisionTag::new(id, info.height);
        let mut graph = self.graph.write().expect("lock poisoned");
        if graph.contains(&tag) {
            debug!(revision = %tag, "revision already recorded");
            return Ok(tag);
        }
        graph.add_revision(RevisionNode::new(tag, info.parents.clone(), info.timestamp))?;
        info!(
            revision = %tag,
            parents = info.parents.len(),
            timestamp = %info.timestamp,
            "recorded revision"
        );
        Ok(tag)
    }

    /// Add a revision already present in the store (and its missing
    /// ancestors) to the graph.
    pub fn adopt_revision(&self, tag: &RevisionTag) -> FsResult<()> {
        let mut pending = vec![*tag];
        while let Some(current) = pending.last().copied() {
            if self.graph().contains(&current) {
                pending.pop();
                continue;
            }
            let info = self.revision_info(&current)?;
            let missing: Vec<RevisionTag> = {
                let graph = self.graph();
                info.parents
                    .iter()
                    .filter(|p| !graph.contains(p))
                    .copied()
                    .collect()
            };
            if missing.is_empty() {
                self.record_revision(&info)?;
                pending.pop();
            } else {
                pending.extend(missing);
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Graph queries
    // ---------------------------------------------------------------

    pub fn common_ancestor(&self, tags: &[RevisionTag]) -> Option<RevisionTag> {
        self.graph().common_ancestor(tags)
    }

    pub fn tips(&self) -> Vec<RevisionTag> {
        self.graph().tips()
    }

    pub fn minimal_set(&self, tags: &[RevisionTag]) -> Vec<RevisionTag> {
        self.graph().minimal_set(tags)
    }

    /// Every known revision, parents first.
    pub fn revisions(&self) -> Vec<RevisionTag> {
        self.graph()
            .topological_order()
            .iter()
            .map(|n| n.tag)
            .collect()
    }
}

impl RevisionOrder for Archive {
    fn compare(&self, a: &RevisionTag, b: &RevisionTag) -> std::cmp::Ordering {
        self.graph().compare(a, b)
    }
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("node_id", &self.node_id)
            .field("revisions", &self.graph().len())
            .field("open_views", &self.open_view_count())
            .finish()
    }
}
