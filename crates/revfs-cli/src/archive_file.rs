//! An archive persisted as one JSON file: every stored object plus the list
//! of recorded revisions.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use revfs_fs::Archive;
use revfs_store::{InMemoryObjectStore, ObjectKind, ObjectStore, StoredObject};
use revfs_types::{ObjectId, RevisionTag};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize, Deserialize)]
struct ArchiveFile {
    objects: Vec<PersistedObject>,
    revisions: Vec<PersistedRevision>,
}

#[derive(Serialize, Deserialize)]
struct PersistedObject {
    kind: ObjectKind,
    /// Hex-encoded payload.
    data: String,
}

#[derive(Serialize, Deserialize)]
struct PersistedRevision {
    id: String,
    height: u64,
}

/// Read the archive at `path` and rebuild its revision graph.
pub fn load(path: &Path) -> anyhow::Result<Arc<Archive>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading archive {}", path.display()))?;
    let file: ArchiveFile = serde_json::from_str(&text)
        .with_context(|| format!("parsing archive {}", path.display()))?;

    let store = InMemoryObjectStore::new();
    for object in &file.objects {
        let data = hex::decode(&object.data).context("object payload is not hex")?;
        store.write(&StoredObject::new(object.kind, data))?;
    }
    let archive = Archive::new(Arc::new(store));
    for revision in &file.revisions {
        let id = ObjectId::from_hex(&revision.id)?;
        archive
            .adopt_revision(&RevisionTag::new(id, revision.height))
            .with_context(|| format!("loading revision {}", revision.id))?;
    }
    debug!(
        path = %path.display(),
        objects = file.objects.len(),
        revisions = file.revisions.len(),
        "loaded archive"
    );
    Ok(archive)
}

/// Write `archive` to `path`, replacing the previous file.
pub fn save(archive: &Archive, path: &Path) -> anyhow::Result<()> {
    let store = archive.store();
    let mut objects = Vec::new();
    for id in store.ids()? {
        let object = store.fetch(&id)?;
        objects.push(PersistedObject {
            kind: object.kind,
            data: hex::encode(&object.data),
        });
    }
    let revisions = archive
        .revisions()
        .into_iter()
        .map(|tag| PersistedRevision {
            id: tag.id.to_hex(),
            height: tag.height,
        })
        .collect();
    let file = ArchiveFile { objects, revisions };

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(&file)?)
        .with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    debug!(path = %path.display(), objects = file.objects.len(), "saved archive");
    Ok(())
}

/// Create a new archive file holding one empty root revision.
pub fn create(path: &Path) -> anyhow::Result<(Arc<Archive>, RevisionTag)> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    let archive = Archive::in_memory();
    let root = archive
        .open_blank()
        .commit(&[], Some("init".into()))
        .context("creating the root revision")?;
    save(&archive, path)?;
    Ok((archive, root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use revfs_fs::FsView;

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("revfs.json");
        let (archive, root) = create(&path).unwrap();

        let mut tree = archive.open_revision(&root).unwrap();
        tree.write_file("/hello", b"world").unwrap();
        let child = tree.commit(&[root], Some("hello".into())).unwrap();
        save(&archive, &path).unwrap();

        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded.revisions(), vec![root, child]);
        assert_eq!(reloaded.tips(), vec![child]);
        let view = reloaded.read_only_fs(&child).unwrap();
        assert_eq!(view.read_file("/hello").unwrap(), b"world");
        assert_eq!(
            reloaded.revision_info(&child).unwrap().message.as_deref(),
            Some("hello")
        );
    }

    #[test]
    fn create_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("revfs.json");
        create(&path).unwrap();
        assert!(create(&path).is_err());
    }

    #[test]
    fn load_reports_missing_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("revfs.json");
        assert!(load(&path).is_err());
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load(&path).is_err());
    }
}
