//! Revision graph for revfs.
//!
//! Tracks parent relationships between committed revisions. Supports
//! ancestry queries, N-way common ancestors, tip enumeration and the total
//! order merges use to decide which revision is "latest".

pub mod error;
pub mod graph;
pub mod node;
pub mod order;

pub use error::{DagError, DagResult};
pub use graph::RevisionGraph;
pub use node::RevisionNode;
pub use order::{FixedOrder, RevisionOrder};
