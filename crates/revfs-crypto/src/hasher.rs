use revfs_types::ObjectId;

/// Domain-separated BLAKE3 content hasher.
///
/// The domain tag is prepended to every hash so a blob and a directory
/// listing with identical bytes never share an address.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// File contents.
    pub const BLOB: Self = Self {
        domain: "revfs-blob-v1",
    };
    /// Directory listings.
    pub const DIRECTORY: Self = Self {
        domain: "revfs-directory-v1",
    };
    /// Inode tables.
    pub const INODE_TABLE: Self = Self {
        domain: "revfs-inode-table-v1",
    };
    /// Revision records. The resulting id is the revision tag's id.
    pub const REVISION: Self = Self {
        domain: "revfs-revision-v1",
    };

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ObjectId::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash a serializable value as JSON with domain separation.
    pub fn hash_json<T: serde::Serialize>(&self, value: &T) -> Result<ObjectId, HasherError> {
        let data =
            serde_json::to_vec(value).map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(self.hash(&data))
    }

    pub fn verify(&self, data: &[u8], expected: &ObjectId) -> bool {
        self.hash(data) == *expected
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(
            ContentHasher::BLOB.hash(b"contents"),
            ContentHasher::BLOB.hash(b"contents")
        );
    }

    #[test]
    fn domains_never_collide() {
        let data = b"same bytes";
        let ids = [
            ContentHasher::BLOB.hash(data),
            ContentHasher::DIRECTORY.hash(data),
            ContentHasher::INODE_TABLE.hash(data),
            ContentHasher::REVISION.hash(data),
        ];
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn verify_detects_tampering() {
        let id = ContentHasher::BLOB.hash(b"original");
        assert!(ContentHasher::BLOB.verify(b"original", &id));
        assert!(!ContentHasher::BLOB.verify(b"tampered", &id));
    }

    #[test]
    fn hash_json_matches_hash_of_encoding() {
        let value = serde_json::json!({"name": "x", "inode": 16});
        let id = ContentHasher::DIRECTORY.hash_json(&value).unwrap();
        let bytes = serde_json::to_vec(&value).unwrap();
        assert_eq!(id, ContentHasher::DIRECTORY.hash(&bytes));
    }
}
