//! N-way merge for revfs revisions.
//!
//! Given candidate revisions that diverged from a common ancestor, the merge
//! enumerates every inode and path whose value differs, lets a policy pick a
//! winner for each conflict, and replays the winners onto the latest
//! candidate before committing a revision with every candidate as a parent.
//!
//! Files keep their inode id across renames, so a rename on one branch and
//! an edit on another show up as two path conflicts plus one inode conflict
//! rather than a delete and an add.
//!
//! # Key Types
//!
//! - [`DiffSet`] -- the conflicts between a fixed set of candidates
//! - [`InodeDiff`] / [`PathDiff`] -- per-inode and per-path conflict records
//! - [`FileDiff`] / [`Resolution`] -- what a policy decides on, and its answer
//! - [`FileDiffResolver`] -- the policy trait; [`LATEST_VERSION`] is the default
//! - [`DiffSetResolver`] -- settles a diff set and commits the merge
//! - [`merge`] / [`merge_tips`] -- one-call entry points driven by [`MergeConfig`]

pub mod config;
pub mod diff_set;
pub mod error;
pub mod file_diff;
pub mod inode_diff;
pub mod path_diff;
pub mod policy;
pub mod resolver;
pub mod version;


pub use config::{MergeConfig, PolicyKind};
pub use diff_set::DiffSet;
pub use error::{MergeError, MergeResult};
pub use file_diff::{DiffOrigin, FileDiff, Resolution};
pub use inode_diff::InodeDiff;
pub use path_diff::{IdMap, PathDiff};
pub use policy::{
    builtin, AncestorAwareResolver, FileDiffResolver, LatestVersionResolver, MergeContext,
    LATEST_VERSION,
};
pub use resolver::{merge, merge_tips, DiffSetResolver};
pub use version::Version;
