//! Revision nodes.

use serde::{Deserialize, Serialize};

use revfs_types::{RevisionTag, TemporalAnchor};

/// A committed revision as seen by the graph.
///
/// Nodes are immutable once added. The graph can always be rebuilt from the
/// revision records in the object store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionNode {
    pub tag: RevisionTag,
    /// Empty for a root revision; more than one for a merge.
    pub parents: Vec<RevisionTag>,
    /// Commit timestamp, always later than every parent's.
    pub timestamp: TemporalAnchor,
}

impl RevisionNode {
    pub fn new(tag: RevisionTag, parents: Vec<RevisionTag>, timestamp: TemporalAnchor) -> Self {
        Self {
            tag,
            parents,
            timestamp,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// The height a tag with these parents must carry.
    pub fn expected_height(parents: &[RevisionTag]) -> u64 {
        parents.iter().map(|p| p.height + 1).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revfs_types::ObjectId;

    fn tag(seed: u8, height: u64) -> RevisionTag {
        RevisionTag::new(ObjectId::from_hash([seed; 32]), height)
    }

    #[test]
    fn expected_height_follows_tallest_parent() {
        assert_eq!(RevisionNode::expected_height(&[]), 0);
        assert_eq!(RevisionNode::expected_height(&[tag(1, 0)]), 1);
        assert_eq!(RevisionNode::expected_height(&[tag(1, 4), tag(2, 2)]), 5);
    }

    #[test]
    fn root_and_merge_flags() {
        let root = RevisionNode::new(tag(1, 0), vec![], TemporalAnchor::zero());
        assert!(root.is_root());
        assert!(!root.is_merge());
        let merge = RevisionNode::new(
            tag(3, 1),
            vec![tag(1, 0), tag(2, 0)],
            TemporalAnchor::new(5, 0, 0),
        );
        assert!(merge.is_merge());
    }
}
