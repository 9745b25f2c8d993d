//! Identity and version primitives for revfs.
//!
//! Every other revfs crate depends on `revfs-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`] — Content-addressed identifier (BLAKE3 hash)
//! - [`InodeId`] — Stable numeric identity of a filesystem object, independent of its path
//! - [`RevisionTag`] — Identifies one committed, immutable tree state
//! - [`TemporalAnchor`] — Hybrid Logical Clock timestamp stamped on commits

pub mod error;
pub mod inode;
pub mod object;
pub mod revision;
pub mod temporal;

pub use error::TypeError;
pub use inode::InodeId;
pub use object::ObjectId;
pub use revision::RevisionTag;
pub use temporal::TemporalAnchor;
