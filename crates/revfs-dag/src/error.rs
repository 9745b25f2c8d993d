//! Error types for the revision graph.

use revfs_types::RevisionTag;

/// Errors that can occur during revision graph operations.
#[derive(Debug, thiserror::Error)]
pub enum DagError {
    #[error("revision not found: {0}")]
    RevisionNotFound(RevisionTag),

    /// A parent reference points to a revision that is not in the graph.
    #[error("dangling parent reference: revision {revision} references missing parent {parent}")]
    DanglingParent {
        revision: RevisionTag,
        parent: RevisionTag,
    },

    #[error("duplicate revision: {0}")]
    DuplicateRevision(RevisionTag),

    /// The tag's height does not follow from its parents.
    #[error("revision {revision} has height {actual}, parents imply {expected}")]
    HeightMismatch {
        revision: RevisionTag,
        expected: u64,
        actual: u64,
    },

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias for graph results.
pub type DagResult<T> = Result<T, DagError>;
