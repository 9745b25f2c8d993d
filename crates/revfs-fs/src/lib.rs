//! Versioned inode filesystem for revfs.
//!
//! A revision is an immutable inode table plus the directory listings it
//! references, all stored as content-addressed objects. Files carry a stable
//! [`InodeId`](revfs_types::InodeId) and a random identity that survive
//! renames, so two revisions can be compared object by object rather than
//! path by path.
//!
//! # Key Types
//!
//! - [`Archive`] -- object store + revision graph shared by every view
//! - [`FsView`] -- read-only queries common to revisions and working trees
//! - [`RevisionView`] -- read-only snapshot of one committed revision
//! - [`WorkingTree`] -- writable tree that commits new revisions
//! - [`Inode`] / [`Stat`] -- the per-object value revisions disagree about

pub mod archive;
pub mod directory;
pub mod error;
pub mod inode;
pub mod path;
pub mod revision;
pub mod table;
pub mod view;
pub mod working;

pub use archive::Archive;
pub use directory::Directory;
pub use error::{FsError, FsResult};
pub use inode::{Inode, InodeKind, Stat};
pub use revision::RevisionInfo;
pub use table::InodeTable;
pub use view::{FsView, RevisionView};
pub use working::{DirectoryMut, WorkingTree};
