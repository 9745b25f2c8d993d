use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use revfs_store::{ObjectKind, StoreResult, StoredObject};
use revfs_types::InodeId;

use crate::error::{FsError, FsResult};

/// A directory listing: entry name -> inode id, kept sorted so identical
/// listings hash identically.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    entries: BTreeMap<String, InodeId>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<InodeId> {
        self.entries.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Insert or repoint an entry, returning the id it pointed to before.
    pub fn insert(&mut self, name: impl Into<String>, id: InodeId) -> Option<InodeId> {
        self.entries.insert(name.into(), id)
    }

    pub fn remove(&mut self, name: &str) -> Option<InodeId> {
        self.entries.remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, InodeId)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        StoredObject::encode_json(ObjectKind::Directory, self)
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.decode_json(ObjectKind::Directory)
    }

    /// Entry names must be non-empty, contain no `/`, and not be `.` or `..`.
    pub fn validate_name(name: &str) -> FsResult<()> {
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(FsError::InvalidPath(name.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_reports_previous_target() {
        let mut dir = Directory::new();
        assert_eq!(dir.insert("a", InodeId::new(16)), None);
        assert_eq!(dir.insert("a", InodeId::new(17)), Some(InodeId::new(16)));
        assert_eq!(dir.get("a"), Some(InodeId::new(17)));
        assert_eq!(dir.remove("a"), Some(InodeId::new(17)));
        assert!(dir.is_empty());
    }

    #[test]
    fn listing_order_does_not_affect_hash() {
        let mut a = Directory::new();
        a.insert("x", InodeId::new(16));
        a.insert("y", InodeId::new(17));
        let mut b = Directory::new();
        b.insert("y", InodeId::new(17));
        b.insert("x", InodeId::new(16));
        assert_eq!(
            a.to_stored_object().unwrap().compute_id(),
            b.to_stored_object().unwrap().compute_id()
        );
        let decoded = Directory::from_stored_object(&a.to_stored_object().unwrap()).unwrap();
        assert_eq!(decoded.iter().map(|(n, _)| n).collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[test]
    fn rejects_bad_names() {
        for bad in ["", ".", "..", "a/b"] {
            assert!(matches!(
                Directory::validate_name(bad),
                Err(FsError::InvalidPath(_))
            ));
        }
        Directory::validate_name("ok.txt").unwrap();
    }
}
