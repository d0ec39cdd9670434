use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use strata_sync::LocalPipe;
use strata_types::{canonical_prefix, ResourceKey};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::traits::{ContentStore, Producer};

/// Directory under the root reserved for Strata's own files (lock files,
/// bookkeeping). Never reported as content and never writable as a key.
pub const RESERVED_DIR: &str = ".strata";

/// Prefix of in-flight temporary files.
const TEMP_PREFIX: &str = ".strata-tmp-";

/// Attempts at creating a temporary file whose directory a concurrent delete
/// of a sibling key keeps pruning.
const CREATE_ATTEMPTS: usize = 16;

/// Filesystem content store: one file per key under a root directory.
///
/// Files are named by the canonical (lowercase) key, so lookups are
/// case-insensitive on every platform. Parent directories are created on
/// demand and removed again once a delete leaves them empty. Writes go to a
/// temporary file in the target directory and are renamed into place, so
/// readers never observe a partial record.
pub struct FsStore {
    root: PathBuf,
    pipe: LocalPipe,
}

impl FsStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(root.display(), e))?;
        Ok(Self {
            root,
            pipe: LocalPipe::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `key`.
    pub fn path_for(&self, key: &ResourceKey) -> PathBuf {
        key.segments().fold(self.root.clone(), |path, segment| path.join(segment))
    }

    fn read(&self, key: &ResourceKey, path: &Path) -> StoreResult<Option<Bytes>> {
        match fs::read(path) {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(key, e)),
        }
    }

    fn write(&self, key: &ResourceKey, path: &Path, data: &[u8]) -> StoreResult<()> {
        let parent = path.parent().unwrap_or(&self.root);
        let mut temp = self.temp_file_in(key, parent)?;
        temp.write_all(data).map_err(|e| StoreError::io(key, e))?;
        temp.as_file().sync_data().map_err(|e| StoreError::io(key, e))?;
        temp.persist(path).map_err(|e| StoreError::io(key, e.error))?;

        debug!(key = %key, len = data.len(), "fs store: wrote record");
        Ok(())
    }

    /// Create `parent` and a temporary file in it. Once the temporary file
    /// exists the directory is not empty and pruning leaves it alone.
    fn temp_file_in(&self, key: &ResourceKey, parent: &Path) -> StoreResult<tempfile::NamedTempFile> {
        let mut attempt = 1;
        loop {
            let created = fs::create_dir_all(parent)
                .and_then(|()| tempfile::Builder::new().prefix(TEMP_PREFIX).tempfile_in(parent));
            match created {
                Ok(temp) => return Ok(temp),
                Err(e) if e.kind() == io::ErrorKind::NotFound && attempt < CREATE_ATTEMPTS => {
                    debug!(key = %key, attempt, "fs store: directory pruned under write, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(StoreError::io(key, e)),
            }
        }
    }

    fn delete(&self, key: &ResourceKey, path: &Path) -> StoreResult<()> {
        match fs::remove_file(path) {
            Ok(()) => debug!(key = %key, "fs store: deleted record"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StoreError::io(key, e)),
        }
        self.prune_empty_dirs(path);
        Ok(())
    }

    /// Remove now-empty directories between `path` and the root.
    fn prune_empty_dirs(&self, path: &Path) {
        let mut dir = path.parent();
        while let Some(current) = dir {
            if current == self.root || !current.starts_with(&self.root) {
                break;
            }
            // Fails (and stops) as soon as a directory is not empty.
            if fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }
    }

    fn check_writable(&self, key: &ResourceKey) -> StoreResult<()> {
        if key.segments().next() == Some(RESERVED_DIR) {
            return Err(StoreError::consistency(key, "key lies in the reserved directory"));
        }
        Ok(())
    }

    fn key_for(&self, path: &Path) -> Option<ResourceKey> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let joined = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?
            .join("/");
        ResourceKey::parse(&joined).ok()
    }
}

impl ContentStore for FsStore {
    fn bytes(&self, key: &ResourceKey, if_absent: Producer<'_>) -> StoreResult<Bytes> {
        let path = self.path_for(key);
        self.pipe.run(key.canonical(), || {
            if let Some(data) = self.read(key, &path)? {
                return Ok(data);
            }
            let produced = if_absent()?;
            if !produced.is_empty() {
                self.check_writable(key)?;
                self.write(key, &path, &produced)?;
            }
            Ok(produced)
        })
    }

    fn update_bytes(&self, key: &ResourceKey, data: &[u8]) -> StoreResult<()> {
        self.check_writable(key)?;
        let path = self.path_for(key);
        self.pipe.run(key.canonical(), || {
            if data.is_empty() {
                self.delete(key, &path)
            } else {
                self.write(key, &path, data)
            }
        })
    }

    fn knowledge(&self, prefix: &str) -> StoreResult<Vec<ResourceKey>> {
        let prefix = canonical_prefix(prefix);
        let mut keys = Vec::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                !(entry.depth() == 1 && name == RESERVED_DIR) && !name.starts_with(TEMP_PREFIX)
            });
        for entry in walker {
            let entry = entry.map_err(|e| {
                let resource = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| self.root.display().to_string());
                StoreError::io(resource, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(key) = self.key_for(entry.path()) {
                if key.has_prefix(&prefix) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn contains(&self, key: &ResourceKey) -> StoreResult<bool> {
        Ok(self.path_for(key).is_file())
    }
}

impl std::fmt::Debug for FsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsStore").field("root", &self.root).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> ResourceKey {
        ResourceKey::parse(raw).unwrap()
    }

    fn temp_store() -> (tempfile::TempDir, FsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path().join("data")).unwrap();
        (dir, store)
    }

    fn failing() -> StoreResult<Bytes> {
        Err(StoreError::consistency("test", "producer must not run"))
    }

    #[test]
    fn write_and_read_back() {
        let (_dir, store) = temp_store();
        store.update_bytes(&key("Fleet/Truck-1/Odometer"), b"1200").unwrap();
        assert!(store.root().join("fleet/truck-1/odometer").is_file());

        let data = store.bytes(&key("fleet\\truck-1\\odometer"), &mut failing).unwrap();
        assert_eq!(&data[..], b"1200");
    }

    #[test]
    fn producer_runs_once_and_is_persisted() {
        let (_dir, store) = temp_store();
        let mut calls = 0;
        let first = store
            .bytes(&key("a/b"), &mut || {
                calls += 1;
                Ok(Bytes::from_static(b"default"))
            })
            .unwrap();
        assert_eq!(&first[..], b"default");
        assert_eq!(calls, 1);
        assert!(store.contains(&key("a/b")).unwrap());
        let second = store.bytes(&key("A/B"), &mut failing).unwrap();
        assert_eq!(&second[..], b"default");
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FsStore::open(dir.path()).unwrap();
            store.update_bytes(&key("a/b/c"), b"persisted").unwrap();
        }
        let store = FsStore::open(dir.path()).unwrap();
        assert_eq!(&store.bytes(&key("a/b/c"), &mut failing).unwrap()[..], b"persisted");
    }

    #[test]
    fn delete_prunes_empty_directories() {
        let (_dir, store) = temp_store();
        store.update_bytes(&key("a/b/c"), b"1").unwrap();
        store.update_bytes(&key("a/x"), b"2").unwrap();

        store.update_bytes(&key("a/b/c"), b"").unwrap();
        assert!(!store.root().join("a/b").exists());
        assert!(store.root().join("a").exists());

        store.update_bytes(&key("a/x"), b"").unwrap();
        assert!(!store.root().join("a").exists());
        assert!(store.root().exists());
    }

    #[test]
    fn knowledge_walks_the_tree() {
        let (_dir, store) = temp_store();
        for raw in ["fleet/t1/a", "fleet/t1/b", "fleet/t2/a", "garage/x"] {
            store.update_bytes(&key(raw), b"x").unwrap();
        }
        let keys: Vec<_> = store
            .knowledge("fleet/t1/")
            .unwrap()
            .into_iter()
            .map(|k| k.canonical().to_string())
            .collect();
        assert_eq!(keys, vec!["fleet/t1/a", "fleet/t1/b"]);
        assert_eq!(store.knowledge("").unwrap().len(), 4);
    }

    #[test]
    fn reserved_directory_is_hidden_and_protected() {
        let (_dir, store) = temp_store();
        fs::create_dir_all(store.root().join(RESERVED_DIR).join("locks")).unwrap();
        fs::write(store.root().join(RESERVED_DIR).join("locks/x.lock"), b"").unwrap();
        store.update_bytes(&key("a"), b"1").unwrap();

        let keys = store.knowledge("").unwrap();
        assert_eq!(keys, vec![key("a")]);
        assert!(matches!(
            store.update_bytes(&key(".strata/x"), b"1"),
            Err(StoreError::Consistency { .. })
        ));
    }

    #[test]
    fn sibling_writes_survive_concurrent_pruning() {
        let (_dir, store) = temp_store();
        let store = std::sync::Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    let k = key(&format!("fleet/truck-1/c{i}"));
                    for round in 0..50 {
                        store.update_bytes(&k, format!("{round}").as_bytes()).unwrap();
                        store.update_bytes(&k, b"").unwrap();
                    }
                    store.update_bytes(&k, b"final").unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.knowledge("fleet/truck-1/").unwrap().len(), 8);
    }

    #[test]
    fn empty_write_of_absent_record_is_noop() {
        let (_dir, store) = temp_store();
        store.update_bytes(&key("nothing/here"), b"").unwrap();
        assert!(store.knowledge("").unwrap().is_empty());
    }
}
