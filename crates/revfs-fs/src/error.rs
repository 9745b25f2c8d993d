use revfs_dag::DagError;
use revfs_store::StoreError;
use revfs_types::{InodeId, RevisionTag};

/// Errors from filesystem operations.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("no such file or directory: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("file exists: {0}")]
    AlreadyExists(String),

    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("unknown revision: {0}")]
    UnknownRevision(RevisionTag),

    /// A directory entry names an inode the table does not hold.
    #[error("missing inode {0}")]
    MissingInode(InodeId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dag(#[from] DagError),
}

pub type FsResult<T> = Result<T, FsError>;
