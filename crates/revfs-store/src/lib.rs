//! Content-addressed object storage for revfs.
//!
//! Every persistent piece of a revision (file contents, directory listings,
//! inode tables, revision records) is stored as an immutable object
//! identified by its BLAKE3 hash, domain-separated by object kind. Page-level
//! chunking and encryption are the storage layer's business; this crate only
//! exposes the narrow key-value surface the filesystem needs.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests, the CLI and embedding
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written (content-addressing guarantees this).
//! 2. The store never interprets object contents.
//! 3. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use object::{Blob, ObjectKind, StoredObject};
pub use traits::ObjectStore;
