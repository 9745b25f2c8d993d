use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use revfs_crypto::ContentHasher;
use revfs_types::ObjectId;

use crate::error::{StoreError, StoreResult};

/// The kind of object stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Raw file contents.
    Blob,
    /// Directory listing mapping names to inode ids.
    Directory,
    /// Every live inode of one revision.
    InodeTable,
    /// Revision record: parents, inode table, timestamp.
    Revision,
}

impl ObjectKind {
    fn hasher(self) -> &'static ContentHasher {
        match self {
            Self::Blob => &ContentHasher::BLOB,
            Self::Directory => &ContentHasher::DIRECTORY,
            Self::InodeTable => &ContentHasher::INODE_TABLE,
            Self::Revision => &ContentHasher::REVISION,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Directory => write!(f, "directory"),
            Self::InodeTable => write!(f, "inode-table"),
            Self::Revision => write!(f, "revision"),
        }
    }
}

/// A stored object: kind tag + serialized data + cached size.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
    pub size: u64,
}

impl StoredObject {
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self { kind, data, size }
    }

    /// Compute the content-addressed ID using the kind's hasher.
    pub fn compute_id(&self) -> ObjectId {
        self.kind.hasher().hash(&self.data)
    }

    /// Encode a structured value as a JSON payload of the given kind.
    pub fn encode_json<T: Serialize>(kind: ObjectKind, value: &T) -> StoreResult<Self> {
        let data =
            serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Self::new(kind, data))
    }

    /// Decode a JSON payload, checking the kind first.
    pub fn decode_json<T: DeserializeOwned>(&self, expected: ObjectKind) -> StoreResult<T> {
        self.expect_kind(expected)?;
        serde_json::from_slice(&self.data).map_err(|e| StoreError::CorruptObject {
            id: self.compute_id(),
            reason: e.to_string(),
        })
    }

    pub fn expect_kind(&self, expected: ObjectKind) -> StoreResult<()> {
        if self.kind != expected {
            return Err(StoreError::CorruptObject {
                id: self.compute_id(),
                reason: format!("expected {expected}, got {}", self.kind),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Blob
// ---------------------------------------------------------------------------

/// Raw file contents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn to_stored_object(&self) -> StoredObject {
        StoredObject::new(ObjectKind::Blob, self.data.clone())
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.expect_kind(ObjectKind::Blob)?;
        Ok(Self {
            data: obj.data.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn blob_roundtrip() {
        let blob = Blob::new(b"hello world".to_vec());
        let stored = blob.to_stored_object();
        assert_eq!(stored.size, 11);
        assert_eq!(Blob::from_stored_object(&stored).unwrap(), blob);
    }

    #[test]
    fn blob_kind_mismatch() {
        let stored = StoredObject::new(ObjectKind::Directory, b"{}".to_vec());
        let err = Blob::from_stored_object(&stored).unwrap_err();
        assert!(matches!(err, StoreError::CorruptObject { .. }));
    }

    #[test]
    fn same_bytes_different_kinds_have_different_ids() {
        let a = StoredObject::new(ObjectKind::Directory, b"{}".to_vec());
        let b = StoredObject::new(ObjectKind::InodeTable, b"{}".to_vec());
        assert_ne!(a.compute_id(), b.compute_id());
    }

    #[test]
    fn json_payload_roundtrip() {
        let mut listing = BTreeMap::new();
        listing.insert("a".to_string(), 16u64);
        let stored = StoredObject::encode_json(ObjectKind::Directory, &listing).unwrap();
        let decoded: BTreeMap<String, u64> = stored.decode_json(ObjectKind::Directory).unwrap();
        assert_eq!(decoded, listing);
    }

    #[test]
    fn decode_json_rejects_garbage() {
        let stored = StoredObject::new(ObjectKind::Revision, b"not json".to_vec());
        let err = stored
            .decode_json::<BTreeMap<String, u64>>(ObjectKind::Revision)
            .unwrap_err();
        assert!(matches!(err, StoreError::CorruptObject { .. }));
    }

    #[test]
    fn decode_json_checks_kind() {
        let stored = StoredObject::encode_json(ObjectKind::Revision, &1u32).unwrap();
        assert!(stored.decode_json::<u32>(ObjectKind::InodeTable).is_err());
    }
}
