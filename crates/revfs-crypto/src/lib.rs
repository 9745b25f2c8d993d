//! Hashing primitives for revfs.
//!
//! Domain-separated BLAKE3 hashing for every stored object kind, plus the
//! entropy source used to mint inode identities.

pub mod entropy;
pub mod hasher;

pub use entropy::random_identity;
pub use hasher::{ContentHasher, HasherError};
