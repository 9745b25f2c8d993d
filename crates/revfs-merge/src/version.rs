//! Candidate revisions grouped by the value they hold.

use revfs_types::RevisionTag;

/// One distinct value and the candidate revisions that hold it, in the order
/// they were added.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Version<T> {
    pub value: T,
    pub revisions: Vec<RevisionTag>,
}

impl<T> Version<T> {
    pub fn contains(&self, tag: &RevisionTag) -> bool {
        self.revisions.contains(tag)
    }
}

/// Append `tags` to the group holding `value`, creating it if needed.
pub(crate) fn add_to_group<T: PartialEq>(
    groups: &mut Vec<Version<T>>,
    value: T,
    tags: &[RevisionTag],
) {
    let index = match groups.iter().position(|g| g.value == value) {
        Some(i) => i,
        None => {
            groups.push(Version {
                value,
                revisions: Vec::new(),
            });
            groups.len() - 1
        }
    };
    let group = &mut groups[index];
    for tag in tags {
        if !group.revisions.contains(tag) {
            group.revisions.push(*tag);
        }
    }
}

/// Remove `tags` from every group whose value is not `keep`, dropping groups
/// left empty.
pub(crate) fn prune_others<T: PartialEq>(
    groups: &mut Vec<Version<T>>,
    keep: &T,
    tags: &[RevisionTag],
) {
    for group in groups.iter_mut().filter(|g| g.value != *keep) {
        group.revisions.retain(|t| !tags.contains(t));
    }
    groups.retain(|g| !g.revisions.is_empty());
}

/// The value `tag` holds, if it was added to any group.
pub(crate) fn value_for<'a, T>(groups: &'a [Version<T>], tag: &RevisionTag) -> Option<&'a T> {
    groups.iter().find(|g| g.contains(tag)).map(|g| &g.value)
}

/// Every tag across all groups, in group order.
pub(crate) fn all_revisions<T>(groups: &[Version<T>]) -> Vec<RevisionTag> {
    groups.iter().flat_map(|g| g.revisions.iter().copied()).collect()
}
