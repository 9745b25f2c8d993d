use serde::{Deserialize, Serialize};

use revfs_store::{ObjectKind, StoreResult, StoredObject};
use revfs_types::{ObjectId, RevisionTag, TemporalAnchor};

/// The stored record behind a revision tag.
///
/// The tag's id is the content hash of this record, so two peers that commit
/// the same table with the same parents and anchor produce the same tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionInfo {
    /// Sorted and deduplicated.
    pub parents: Vec<RevisionTag>,
    pub inode_table: ObjectId,
    pub timestamp: TemporalAnchor,
    pub height: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RevisionInfo {
    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        StoredObject::encode_json(ObjectKind::Revision, self)
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.decode_json(ObjectKind::Revision)
    }

    pub fn tag(&self) -> StoreResult<RevisionTag> {
        Ok(RevisionTag::new(
            self.to_stored_object()?.compute_id(),
            self.height,
        ))
    }
}
