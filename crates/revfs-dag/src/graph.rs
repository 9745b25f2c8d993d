//! The revision graph and its traversal algorithms.
//!
//! [`RevisionGraph`] stores nodes in a [`HashMap`] and maintains a
//! forward-edge index (`children`) for descendant and tip queries.
//!
//! # Invariants
//!
//! - The graph is acyclic (parents must exist before their children).
//! - Every parent reference resolves to an existing node.
//! - A tag's height is one more than its tallest parent.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use revfs_types::RevisionTag;

use crate::error::{DagError, DagResult};
use crate::node::RevisionNode;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RevisionGraph {
    nodes: HashMap<RevisionTag, RevisionNode>,
    /// Forward-edge index: parent -> children.
    children: HashMap<RevisionTag, Vec<RevisionTag>>,
    roots: Vec<RevisionTag>,
}

impl RevisionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Add a revision. Its parents must already be present.
    pub fn add_revision(&mut self, node: RevisionNode) -> DagResult<()> {
        if self.nodes.contains_key(&node.tag) {
            return Err(DagError::DuplicateRevision(node.tag));
        }
        for parent in &node.parents {
            if !self.nodes.contains_key(parent) {
                return Err(DagError::DanglingParent {
                    revision: node.tag,
                    parent: *parent,
                });
            }
        }
        let expected = RevisionNode::expected_height(&node.parents);
        if node.tag.height != expected {
            return Err(DagError::HeightMismatch {
                revision: node.tag,
                expected,
                actual: node.tag.height,
            });
        }

        for parent in &node.parents {
            self.children.entry(*parent).or_default().push(node.tag);
        }
        if node.is_root() {
            self.roots.push(node.tag);
        }

        debug!(
            revision = %node.tag,
            parents = node.parents.len(),
            "added revision to graph"
        );
        self.nodes.insert(node.tag, node);
        Ok(())
    }

    pub fn contains(&self, tag: &RevisionTag) -> bool {
        self.nodes.contains_key(tag)
    }

    pub fn get(&self, tag: &RevisionTag) -> Option<&RevisionNode> {
        self.nodes.get(tag)
    }

    pub fn roots(&self) -> Vec<&RevisionNode> {
        self.roots.iter().filter_map(|t| self.nodes.get(t)).collect()
    }

    /// Revisions nothing else builds on, sorted.
    pub fn tips(&self) -> Vec<RevisionTag> {
        let mut tips: Vec<RevisionTag> = self
            .nodes
            .keys()
            .filter(|t| self.children.get(t).map_or(true, Vec::is_empty))
            .copied()
            .collect();
        tips.sort();
        tips
    }

    // ---------------------------------------------------------------
    // Ancestor / Descendant queries
    // ---------------------------------------------------------------

    /// All ancestors of a revision up to `max_depth` levels (BFS upward).
    ///
    /// The revision itself is **not** included.
    pub fn ancestors(&self, tag: &RevisionTag, max_depth: usize) -> Vec<&RevisionNode> {
        self.walk(tag, max_depth, |t| {
            self.nodes.get(t).map(|n| n.parents.clone()).unwrap_or_default()
        })
    }

    /// All descendants of a revision up to `max_depth` levels (BFS downward).
    pub fn descendants(&self, tag: &RevisionTag, max_depth: usize) -> Vec<&RevisionNode> {
        self.walk(tag, max_depth, |t| {
            self.children.get(t).cloned().unwrap_or_default()
        })
    }

    fn walk<F>(&self, start: &RevisionTag, max_depth: usize, next: F) -> Vec<&RevisionNode>
    where
        F: Fn(&RevisionTag) -> Vec<RevisionTag>,
    {
        if !self.nodes.contains_key(start) {
            return Vec::new();
        }
        let mut visited = HashSet::new();
        visited.insert(*start);
        let mut result = Vec::new();
        let mut queue: VecDeque<(RevisionTag, usize)> = VecDeque::new();
        for t in next(start) {
            if visited.insert(t) {
                queue.push_back((t, 1));
            }
        }

        while let Some((current, depth)) = queue.pop_front() {
            if depth > max_depth {
                continue;
            }
            if let Some(node) = self.nodes.get(&current) {
                result.push(node);
                if depth < max_depth {
                    for t in next(&current) {
                        if visited.insert(t) {
                            queue.push_back((t, depth + 1));
                        }
                    }
                }
            }
        }
        result
    }

    /// Returns `true` if `ancestor` is a strict ancestor of `descendant`.
    pub fn is_ancestor(&self, ancestor: &RevisionTag, descendant: &RevisionTag) -> bool {
        if ancestor == descendant || ancestor.height >= descendant.height {
            return false;
        }
        // Heights only shrink walking upward, so stop below the target.
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([*descendant]);
        while let Some(current) = queue.pop_front() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            for parent in &node.parents {
                if parent == ancestor {
                    return true;
                }
                if parent.height > ancestor.height && visited.insert(*parent) {
                    queue.push_back(*parent);
                }
            }
        }
        false
    }

    // ---------------------------------------------------------------
    // Common ancestor
    // ---------------------------------------------------------------

    /// The nearest revision every tag in `tags` descends from (or is).
    ///
    /// Intersects the inclusive ancestor sets and picks the deepest shared
    /// revision, breaking ties by timestamp then tag. Returns `None` for an
    /// empty input, unknown tags, or unrelated lineages.
    pub fn common_ancestor(&self, tags: &[RevisionTag]) -> Option<RevisionTag> {
        let (first, rest) = tags.split_first()?;
        if tags.iter().any(|t| !self.nodes.contains_key(t)) {
            return None;
        }
        let mut common = self.inclusive_ancestors(first);
        for tag in rest {
            let other = self.inclusive_ancestors(tag);
            common.retain(|t| other.contains(t));
        }

        common
            .into_iter()
            .filter_map(|t| self.nodes.get(&t))
            .max_by(|a, b| {
                a.tag
                    .height
                    .cmp(&b.tag.height)
                    .then(a.timestamp.cmp(&b.timestamp))
                    .then(a.tag.cmp(&b.tag))
            })
            .map(|n| n.tag)
    }

    fn inclusive_ancestors(&self, tag: &RevisionTag) -> HashSet<RevisionTag> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(*tag);
        queue.push_back(*tag);
        while let Some(current) = queue.pop_front() {
            if let Some(node) = self.nodes.get(&current) {
                for parent in &node.parents {
                    if visited.insert(*parent) {
                        queue.push_back(*parent);
                    }
                }
            }
        }
        visited
    }

    /// Sorted, deduplicated `tags` with every tag that is an ancestor of
    /// another member removed. Merging the result covers the whole input.
    pub fn minimal_set(&self, tags: &[RevisionTag]) -> Vec<RevisionTag> {
        let unique: BTreeSet<RevisionTag> = tags.iter().copied().collect();
        unique
            .iter()
            .filter(|t| !unique.iter().any(|other| self.is_ancestor(t, other)))
            .copied()
            .collect()
    }

    // ---------------------------------------------------------------
    // Topological sort
    // ---------------------------------------------------------------

    /// All revisions, parents before children (Kahn's algorithm, ties by tag).
    pub fn topological_order(&self) -> Vec<&RevisionNode> {
        let mut in_degree: HashMap<RevisionTag, usize> = self
            .nodes
            .values()
            .map(|n| (n.tag, n.parents.len()))
            .collect();
        let mut ready: BTreeSet<RevisionTag> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(t, _)| *t)
            .collect();

        let mut result = Vec::with_capacity(self.nodes.len());
        while let Some(current) = ready.pop_first() {
            if let Some(node) = self.nodes.get(&current) {
                result.push(node);
            }
            for child in self.children.get(&current).into_iter().flatten() {
                if let Some(deg) = in_degree.get_mut(child) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.insert(*child);
                    }
                }
            }
        }
        result
    }

    /// Check structural integrity: parents resolve, roots are roots.
    pub fn validate(&self) -> DagResult<()> {
        for node in self.nodes.values() {
            for parent in &node.parents {
                if !self.nodes.contains_key(parent) {
                    return Err(DagError::DanglingParent {
                        revision: node.tag,
                        parent: *parent,
                    });
                }
            }
        }
        for root in &self.roots {
            if self.nodes.get(root).is_some_and(|n| !n.is_root()) {
                return Err(DagError::DanglingParent {
                    revision: *root,
                    parent: *root,
                });
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Serialization helpers
    // ---------------------------------------------------------------

    pub fn to_bytes(&self) -> DagResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| DagError::Serialization(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> DagResult<Self> {
        bincode::deserialize(data).map_err(|e| DagError::Serialization(e.to_string()))
    }
}
