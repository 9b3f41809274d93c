use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;
use refpack_platform::AppPaths;

/// Last full catalog response as persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEntry {
    pub body: Option<Vec<u8>>,
    pub etag: Option<String>,
}

/// Storage for the release catalog and its revalidation token.
pub trait CacheStore {
    fn load(&self) -> CacheEntry;

    /// Persist a freshly fetched body, then its entity tag.
    ///
    /// # Errors
    /// Returns an error if either artifact cannot be written.
    fn store(&self, body: &[u8], etag: Option<&str>) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileCacheStore {
    body_path: PathBuf,
    etag_path: PathBuf,
}

impl FileCacheStore {
    #[must_use]
    pub fn new(body_path: PathBuf, etag_path: PathBuf) -> Self {
        Self {
            body_path,
            etag_path,
        }
    }

    #[must_use]
    pub fn from_paths(paths: &AppPaths) -> Self {
        Self::new(paths.release_cache_file(), paths.etag_file())
    }
}

impl CacheStore for FileCacheStore {
    fn load(&self) -> CacheEntry {
        let body = std::fs::read(&self.body_path).ok();
        let etag = std::fs::read_to_string(&self.etag_path)
            .ok()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty());
        CacheEntry { body, etag }
    }

    fn store(&self, body: &[u8], etag: Option<&str>) -> std::io::Result<()> {
        if let Some(parent) = self.body_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_atomic(&self.body_path, body)?;

        match etag {
            Some(tag) => write_atomic(&self.etag_path, tag.as_bytes())?,
            None => match std::fs::remove_file(&self.etag_path) {
                Ok(()) => debug!("Removed stale etag {}", self.etag_path.display()),
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => return Err(error),
            },
        }
        Ok(())
    }
}

/// In-process store, for callers that must not touch the disk cache.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entry: Mutex<CacheEntry>,
}

impl MemoryCacheStore {
    #[must_use]
    pub fn new(entry: CacheEntry) -> Self {
        Self {
            entry: Mutex::new(entry),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> CacheEntry {
        self.entry
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self) -> CacheEntry {
        self.snapshot()
    }

    fn store(&self, body: &[u8], etag: Option<&str>) -> std::io::Result<()> {
        let mut guard = self
            .entry
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = CacheEntry {
            body: Some(body.to_vec()),
            etag: etag.map(str::to_string),
        };
        Ok(())
    }
}

/// Write through a sibling temp file so readers never see a torn cache.
fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "cache path has no parent")
    })?;

    let mut file = tempfile::NamedTempFile::new_in(parent)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CacheEntry, CacheStore, FileCacheStore, MemoryCacheStore};

    fn file_store(dir: &std::path::Path) -> FileCacheStore {
        FileCacheStore::new(dir.join("releases.json"), dir.join("etag"))
    }

    #[test]
    fn load_from_empty_directory_returns_empty_entry() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");

        let entry = file_store(temp_dir.path()).load();

        assert_eq!(entry, CacheEntry::default());
    }

    #[test]
    fn store_then_load_returns_body_and_trimmed_etag() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let store = file_store(temp_dir.path());

        store
            .store(b"[]", Some("W/\"abc\""))
            .expect("cache should be written");
        std::fs::write(temp_dir.path().join("etag"), "W/\"abc\"\n")
            .expect("etag should be rewritten with trailing newline");

        let entry = store.load();
        assert_eq!(entry.body.as_deref(), Some(&b"[]"[..]));
        assert_eq!(entry.etag.as_deref(), Some("W/\"abc\""));
    }

    #[test]
    fn store_without_etag_removes_stale_token() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let store = file_store(temp_dir.path());
        store
            .store(b"[1]", Some("\"old\""))
            .expect("first write should succeed");

        store.store(b"[2]", None).expect("second write should succeed");

        let entry = store.load();
        assert_eq!(entry.body.as_deref(), Some(&b"[2]"[..]));
        assert!(entry.etag.is_none());
    }

    #[test]
    fn store_leaves_no_temp_files_behind() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let store = file_store(temp_dir.path());

        store.store(b"[]", Some("\"tag\"")).expect("write should succeed");
        store.store(b"[]", Some("\"tag2\"")).expect("overwrite should succeed");

        let mut names: Vec<String> = std::fs::read_dir(temp_dir.path())
            .expect("read temp dir entries")
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, ["etag", "releases.json"]);
    }

    #[test]
    fn memory_store_overwrites_previous_entry() {
        let store = MemoryCacheStore::new(CacheEntry {
            body: Some(b"old".to_vec()),
            etag: Some("\"1\"".to_string()),
        });

        store.store(b"new", None).expect("memory store never fails");

        assert_eq!(
            store.snapshot(),
            CacheEntry {
                body: Some(b"new".to_vec()),
                etag: None,
            }
        );
    }
}
