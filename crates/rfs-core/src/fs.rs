//! FileStore trait abstraction for whole-file persistence.
//!
//! Implementations:
//! - `AtomicFs` - Native filesystem via tokio::fs, temp file + rename
//! - `InMemoryFs` - For testing, can be told to fail writes
//!
//! Both sides of the sync only ever read a file fully into memory or replace it
//! wholesale, so the trait is deliberately two methods wide.

use async_trait::async_trait;
use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write temp file {}: {source}", .path.display())]
    WriteTemp {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to rename {} over {}: {source}", .from.display(), .to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Whole-file read/replace abstraction.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Read the entire file. A missing file reads as empty content.
    async fn read_all(&self, path: &Path) -> Result<Vec<u8>>;

    /// Replace the file contents. Readers never observe a partial write.
    async fn write_all(&self, path: &Path, content: &[u8]) -> Result<()>;
}

/// Native store: writes `<path>.tmp`, syncs it, then renames over `<path>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomicFs;

impl AtomicFs {
    pub fn new() -> Self {
        Self
    }

    /// The sibling temp file used while replacing `path`.
    pub fn temp_path(path: &Path) -> PathBuf {
        let mut name = OsString::from(path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// First phase: write and sync the temp file. Returns its path.
    ///
    /// On failure the temp file is removed; the target is never touched.
    pub async fn write_temp(&self, path: &Path, content: &[u8]) -> Result<PathBuf> {
        let tmp = Self::temp_path(path);

        let written = async {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)
                .await?;
            file.write_all(content).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok::<(), io::Error>(())
        }
        .await;

        if let Err(source) = written {
            let _ = fs::remove_file(&tmp).await;
            return Err(PersistenceError::WriteTemp { path: tmp, source });
        }
        Ok(tmp)
    }

    /// Second phase: rename the temp file over the target.
    pub async fn commit_temp(&self, tmp: &Path, path: &Path) -> Result<()> {
        if let Err(source) = fs::rename(tmp, path).await {
            let _ = fs::remove_file(tmp).await;
            return Err(PersistenceError::Rename {
                from: tmp.to_path_buf(),
                to: path.to_path_buf(),
                source,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl FileStore for AtomicFs {
    async fn read_all(&self, path: &Path) -> Result<Vec<u8>> {
        match fs::read(path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(PersistenceError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    async fn write_all(&self, path: &Path, content: &[u8]) -> Result<()> {
        let tmp = self.write_temp(path, content).await?;
        self.commit_temp(&tmp, path).await
    }
}

/// In-memory store for testing
#[derive(Default)]
pub struct InMemoryFs {
    files: RwLock<HashMap<PathBuf, Vec<u8>>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file before the store is used.
    pub fn with_file(self, path: impl Into<PathBuf>, content: &[u8]) -> Self {
        self.files
            .write()
            .unwrap()
            .insert(path.into(), content.to_vec());
        self
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Current contents of a file, if it exists.
    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.read().unwrap().get(path).cloned()
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileStore for InMemoryFs {
    async fn read_all(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(self.contents(path).unwrap_or_default())
    }

    async fn write_all(&self, path: &Path, content: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Io(format!(
                "write to {} refused",
                path.display()
            )));
        }
        self.files
            .write()
            .unwrap()
            .insert(path.to_path_buf(), content.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// Implement FileStore for Arc<T> where T: FileStore
// This lets tests keep a handle on the store they hand to a component
#[async_trait]
impl<T: FileStore + ?Sized> FileStore for std::sync::Arc<T> {
    async fn read_all(&self, path: &Path) -> Result<Vec<u8>> {
        (**self).read_all(path).await
    }

    async fn write_all(&self, path: &Path, content: &[u8]) -> Result<()> {
        (**self).write_all(path, content).await
    }
}
