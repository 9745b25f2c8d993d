//! Error types for the merge engine.

use revfs_dag::DagError;
use revfs_fs::FsError;

/// Errors that abort a merge. No partial merge is ever committed.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// Bad input to a merge, including a policy that returns no resolution.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A diff reached replay without a resolution.
    #[error("unresolved diff at {path}")]
    UnresolvedDiff { path: String },

    /// The policy's resolutions contradict each other.
    #[error("inconsistent resolution at {path}: {reason}")]
    InconsistentDiffResolution { path: String, reason: String },

    /// Reading a candidate or writing the merged tree failed.
    #[error(transparent)]
    Fs(#[from] FsError),

    #[error(transparent)]
    Dag(#[from] DagError),
}

/// Convenience alias for merge results.
pub type MergeResult<T> = Result<T, MergeError>;
