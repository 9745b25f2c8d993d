//! Total orders over revisions.

use std::cmp::Ordering;

use revfs_types::RevisionTag;

use crate::graph::RevisionGraph;

/// A total, deterministic order over revisions: `Greater` means "more recent".
///
/// Merge policies that prefer the latest value depend only on this trait,
/// so tests can substitute a [`FixedOrder`] for the real graph.
pub trait RevisionOrder {
    fn compare(&self, a: &RevisionTag, b: &RevisionTag) -> Ordering;

    /// The most recent tag in `tags`.
    fn latest<'a>(&self, tags: &'a [RevisionTag]) -> Option<&'a RevisionTag> {
        tags.iter().max_by(|a, b| self.compare(a, b))
    }

    /// Sort oldest first.
    fn sort(&self, tags: &mut [RevisionTag]) {
        tags.sort_by(|a, b| self.compare(a, b));
    }
}

/// Descent first, then commit timestamp, then the lower content hash is
/// judged more recent. Unknown tags fall back to height.
impl RevisionOrder for RevisionGraph {
    fn compare(&self, a: &RevisionTag, b: &RevisionTag) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        if self.is_ancestor(a, b) {
            return Ordering::Less;
        }
        if self.is_ancestor(b, a) {
            return Ordering::Greater;
        }
        let by_time = match (self.get(a), self.get(b)) {
            (Some(na), Some(nb)) => na.timestamp.cmp(&nb.timestamp),
            _ => a.height.cmp(&b.height),
        };
        by_time.then_with(|| b.id.cmp(&a.id))
    }
}

/// An explicit ranking, oldest first. Tags not listed rank below every
/// listed tag, ordered among themselves by tag.
#[derive(Clone, Debug, Default)]
pub struct FixedOrder {
    ranking: Vec<RevisionTag>,
}

impl FixedOrder {
    pub fn new(oldest_first: Vec<RevisionTag>) -> Self {
        Self {
            ranking: oldest_first,
        }
    }

    fn rank(&self, tag: &RevisionTag) -> Option<usize> {
        self.ranking.iter().position(|t| t == tag)
    }
}

impl RevisionOrder for FixedOrder {
    fn compare(&self, a: &RevisionTag, b: &RevisionTag) -> Ordering {
        match (self.rank(a), self.rank(b)) {
            (Some(ra), Some(rb)) => ra.cmp(&rb),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => a.cmp(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::RevisionNode;
    use proptest::prelude::*;
    use revfs_types::{ObjectId, TemporalAnchor};

    fn tag(seed: u8, height: u64) -> RevisionTag {
        RevisionTag::new(ObjectId::from_hash([seed; 32]), height)
    }

    #[test]
    fn descendant_beats_newer_timestamp() {
        let mut g = RevisionGraph::new();
        let root = tag(1, 0);
        let child = tag(2, 1);
        let sibling = tag(3, 0);
        g.add_revision(RevisionNode::new(root, vec![], TemporalAnchor::new(900, 0, 0)))
            .unwrap();
        g.add_revision(RevisionNode::new(child, vec![root], TemporalAnchor::new(100, 0, 0)))
            .unwrap();
        g.add_revision(RevisionNode::new(sibling, vec![], TemporalAnchor::new(50, 0, 0)))
            .unwrap();

        assert_eq!(g.compare(&root, &child), Ordering::Less);
        assert_eq!(g.compare(&child, &root), Ordering::Greater);
        // Unrelated: timestamps decide.
        assert_eq!(g.compare(&sibling, &child), Ordering::Less);
        assert_eq!(g.latest(&[root, sibling, child]), Some(&child));
    }

    #[test]
    fn equal_timestamps_prefer_lower_hash() {
        let mut g = RevisionGraph::new();
        let low = tag(1, 0);
        let high = tag(2, 0);
        for t in [low, high] {
            g.add_revision(RevisionNode::new(t, vec![], TemporalAnchor::new(10, 0, 0)))
                .unwrap();
        }
        assert_eq!(g.latest(&[low, high]), Some(&low));
    }

    #[test]
    fn fixed_order_ranks_unlisted_lowest() {
        let order = FixedOrder::new(vec![tag(5, 0), tag(4, 0)]);
        assert_eq!(order.latest(&[tag(5, 0), tag(4, 0), tag(9, 3)]), Some(&tag(4, 0)));
        let mut tags = vec![tag(4, 0), tag(9, 3), tag(5, 0)];
        order.sort(&mut tags);
        assert_eq!(tags, vec![tag(9, 3), tag(5, 0), tag(4, 0)]);
    }

    proptest! {
        #[test]
        fn fixed_order_is_antisymmetric(a in 0u8..6, b in 0u8..6) {
            let order = FixedOrder::new(vec![tag(0, 0), tag(2, 0), tag(4, 0)]);
            let (x, y) = (tag(a, 0), tag(b, 0));
            prop_assert_eq!(order.compare(&x, &y), order.compare(&y, &x).reverse());
        }
    }
}
