//! Upload storage module
//!
//! A single flat directory is the only store of truth: no manifest, no
//! sidecar metadata, nothing cached in memory between requests.

mod name;

pub use name::{base_name, is_storable};

use hyper::body::Bytes;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Subdirectory of the upload directory holding in-flight atomic writes
pub const STAGING_DIR: &str = ".partial";

/// Errors raised while persisting an upload
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file name {0:?} cannot be stored")]
    InvalidName(String),

    #[error("failed to write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("write task aborted: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A stored file opened for download
#[derive(Debug)]
pub struct StoredFile {
    pub name: String,
    pub size: u64,
    pub file: fs::File,
}

/// Flat directory of uploaded files
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    staging: PathBuf,
    atomic_writes: bool,
}

impl FileStore {
    /// Open the upload directory, creating it (and the staging area) if absent
    pub fn open(root: impl AsRef<Path>, atomic_writes: bool) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let staging = root.join(STAGING_DIR);

        std::fs::create_dir_all(&root)?;
        if atomic_writes {
            std::fs::create_dir_all(&staging)?;
        }

        Ok(Self {
            root,
            staging,
            atomic_writes,
        })
    }

    #[allow(clippy::missing_const_for_fn)]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of the regular files in the directory, in enumeration order
    pub async fn list(&self) -> io::Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            // Symlinks are followed, as in `open_file`; the staging area and
            // anything else that is not a plain file is skipped
            match fs::metadata(entry.path()).await {
                Ok(meta) if meta.is_file() => {}
                _ => continue,
            }
            names.push(entry.file_name().to_string_lossy().into_owned());
        }

        Ok(names)
    }

    /// Map a client-supplied name onto a path directly inside the directory.
    ///
    /// Directory components are discarded; `None` when nothing storable remains.
    pub fn resolve(&self, requested: &str) -> Option<(String, PathBuf)> {
        let name = base_name(requested);
        if !is_storable(name) {
            return None;
        }
        Some((name.to_string(), self.root.join(name)))
    }

    /// Open a stored file for streaming, `Ok(None)` if no regular file has that name.
    ///
    /// The size is taken from the open handle, so a concurrent atomic
    /// replace cannot make it disagree with the bytes that will be read.
    pub async fn open_file(&self, requested: &str) -> io::Result<Option<StoredFile>> {
        let Some((name, path)) = self.resolve(requested) else {
            return Ok(None);
        };

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Ok(None);
        }

        Ok(Some(StoredFile {
            name,
            size: meta.len(),
            file,
        }))
    }

    /// Persist `data` under the base name of `filename`, replacing any existing file.
    ///
    /// Returns the name the file was stored as.
    pub async fn save(&self, filename: &str, data: Bytes) -> Result<String, StorageError> {
        let Some((name, target)) = self.resolve(filename) else {
            return Err(StorageError::InvalidName(filename.to_string()));
        };

        if self.atomic_writes {
            let staging = self.staging.clone();
            tokio::task::spawn_blocking(move || write_atomically(&staging, &target, &data))
                .await??;
        } else {
            fs::write(&target, &data)
                .await
                .map_err(|source| StorageError::Write {
                    path: target,
                    source,
                })?;
        }

        Ok(name)
    }
}

/// Write into a staging file, then rename it over `target`.
///
/// Readers see either the previous content or the complete new content.
/// Concurrent writers of the same name resolve last-rename-wins.
fn write_atomically(staging: &Path, target: &Path, data: &[u8]) -> Result<(), StorageError> {
    let write_err = |source| StorageError::Write {
        path: target.to_path_buf(),
        source,
    };

    // Recreate in case the staging area was removed while running
    std::fs::create_dir_all(staging).map_err(write_err)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".upload-")
        .tempfile_in(staging)
        .map_err(write_err)?;
    tmp.write_all(data).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(target).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn read_back(store: &FileStore, name: &str) -> Option<Vec<u8>> {
        let mut stored = store.open_file(name).await.unwrap()?;
        let mut content = Vec::new();
        stored.file.read_to_end(&mut content).await.unwrap();
        assert_eq!(stored.size, content.len() as u64);
        Some(content)
    }

    #[tokio::test]
    async fn test_open_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("uploads");
        let store = FileStore::open(&root, true).unwrap();
        assert!(root.is_dir());
        assert!(root.join(STAGING_DIR).is_dir());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), true).unwrap();

        let name = store
            .save("notes.txt", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert_eq!(name, "notes.txt");

        let file = store.open_file("notes.txt").await.unwrap().unwrap();
        assert_eq!(file.name, "notes.txt");
        assert_eq!(file.size, 5);
        assert_eq!(read_back(&store, "notes.txt").await.unwrap(), b"hello");
        assert_eq!(store.list().await.unwrap(), vec!["notes.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        for atomic in [true, false] {
            let dir = tempfile::tempdir().unwrap();
            let store = FileStore::open(dir.path(), atomic).unwrap();
            store.save("a.bin", Bytes::from_static(b"first")).await.unwrap();
            store.save("a.bin", Bytes::from_static(b"second")).await.unwrap();
            let content = read_back(&store, "a.bin").await.unwrap();
            assert_eq!(content, b"second", "atomic: {atomic}");
        }
    }

    #[tokio::test]
    async fn test_save_strips_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");
        let store = FileStore::open(&root, true).unwrap();

        let name = store
            .save("../../escape.txt", Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert_eq!(name, "escape.txt");
        assert!(root.join("escape.txt").is_file());
        assert!(!dir.path().join("escape.txt").exists());

        let name = store
            .save("..\\windows\\evil.txt", Bytes::from_static(b"y"))
            .await
            .unwrap();
        assert_eq!(name, "evil.txt");
        assert!(root.join("evil.txt").is_file());
    }

    #[tokio::test]
    async fn test_save_rejects_unstorable_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), true).unwrap();
        for bad in ["", "dir/", "..", STAGING_DIR] {
            let err = store.save(bad, Bytes::new()).await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidName(_)), "name: {bad:?}");
        }
    }

    #[tokio::test]
    async fn test_list_skips_directories_and_staging() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), true).unwrap();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();
        std::fs::write(dir.path().join(STAGING_DIR).join(".upload-x"), b"partial").unwrap();
        store.save("one.txt", Bytes::from_static(b"1")).await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["one.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_read_missing_or_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), true).unwrap();
        std::fs::create_dir(dir.path().join("folder")).unwrap();

        assert!(store.open_file("missing.txt").await.unwrap().is_none());
        assert!(store.open_file("folder").await.unwrap().is_none());
        assert!(store.open_file(STAGING_DIR).await.unwrap().is_none());
        assert!(store.open_file("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_ignores_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");
        let store = FileStore::open(&root, true).unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"top secret").unwrap();

        assert!(store.open_file("../secret.txt").await.unwrap().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks_listed_and_served_alike() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");
        let store = FileStore::open(&root, true).unwrap();
        std::fs::write(dir.path().join("target.txt"), b"linked").unwrap();
        std::os::unix::fs::symlink(dir.path().join("target.txt"), root.join("link.txt")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone.txt"), root.join("dangling.txt"))
            .unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["link.txt".to_string()]);
        assert_eq!(read_back(&store, "link.txt").await.unwrap(), b"linked");
        assert!(store.open_file("dangling.txt").await.unwrap().is_none());
    }
}
