//! The authoritative, versioned copy of the synced file.
//!
//! All reads and writes go through one exclusive lock. A PUT merges, persists,
//! and only then commits the new version, so memory never gets ahead of disk.

use rfs_core::{FileStore, PersistenceError, Version, MAX_CONTENT};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const CLIENT_MARKER: &[u8] = b"<<<<<<< client\n";
const SEPARATOR: &[u8] = b"=======\n";
const SERVER_MARKER: &[u8] = b">>>>>>> server\n";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to persist document: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("version counter exhausted at {0}")]
    VersionExhausted(Version),

    #[error("document would be {len} bytes, more than the {max} a STATE reply can carry")]
    TooLarge { len: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, DocumentError>;

/// How a PUT was folded into the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Base version matched; the client content replaced the document.
    Accepted,
    /// Base version was stale; both sides were wrapped in conflict markers.
    Conflict,
}

/// Combine a client submission with the current server content.
///
/// Never fails: a stale base produces a conflict block for a human to resolve.
pub fn resolve(
    base_version: Version,
    current_version: Version,
    client: &[u8],
    server: &[u8],
) -> (Vec<u8>, Resolution) {
    if base_version == current_version {
        return (client.to_vec(), Resolution::Accepted);
    }

    let markers = CLIENT_MARKER.len() + SEPARATOR.len() + SERVER_MARKER.len();
    let mut merged = Vec::with_capacity(markers + client.len() + server.len() + 2);
    merged.extend_from_slice(CLIENT_MARKER);
    merged.extend_from_slice(client);
    merged.push(b'\n');
    merged.extend_from_slice(SEPARATOR);
    merged.extend_from_slice(server);
    merged.push(b'\n');
    merged.extend_from_slice(SERVER_MARKER);
    (merged, Resolution::Conflict)
}

fn check_size(len: usize) -> Result<()> {
    if len > MAX_CONTENT {
        return Err(DocumentError::TooLarge {
            len,
            max: MAX_CONTENT,
        });
    }
    Ok(())
}

struct DocumentState {
    version: Version,
    content: Vec<u8>,
}

/// Server-side document: `(version, content)` plus where it lives on disk.
pub struct Document {
    path: PathBuf,
    store: Arc<dyn FileStore>,
    state: Mutex<DocumentState>,
}

impl Document {
    /// Load the document from disk. A missing file starts empty at version 0.
    ///
    /// A file too large to serve is refused rather than loaded.
    pub async fn load(path: impl Into<PathBuf>, store: Arc<dyn FileStore>) -> Result<Self> {
        let path = path.into();
        let content = store.read_all(&path).await?;
        check_size(content.len())?;
        info!(
            "Loaded {} ({} bytes) at version 0",
            path.display(),
            content.len()
        );

        Ok(Self {
            path,
            store,
            state: Mutex::new(DocumentState {
                version: 0,
                content,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Consistent snapshot of the current version and content.
    pub async fn get(&self) -> (Version, Vec<u8>) {
        let state = self.state.lock().await;
        (state.version, state.content.clone())
    }

    pub async fn version(&self) -> Version {
        self.state.lock().await.version
    }

    /// Apply a client submission made against `base_version`.
    ///
    /// Returns the new version. If persisting fails nothing changes.
    pub async fn put(&self, base_version: Version, client_content: &[u8]) -> Result<Version> {
        let mut state = self.state.lock().await;

        let next_version = state
            .version
            .checked_add(1)
            .ok_or(DocumentError::VersionExhausted(state.version))?;

        let (merged, resolution) =
            resolve(base_version, state.version, client_content, &state.content);

        if let Err(e) = check_size(merged.len()) {
            warn!(
                "PUT (base {}) not applied, version stays {}: {}",
                base_version, state.version, e
            );
            return Err(e);
        }

        if let Err(e) = self.store.write_all(&self.path, &merged).await {
            warn!(
                "PUT (base {}) not applied, version stays {}: {}",
                base_version, state.version, e
            );
            return Err(e.into());
        }

        state.content = merged;
        state.version = next_version;

        match resolution {
            Resolution::Accepted => debug!(
                "PUT accepted: version {} ({} bytes)",
                next_version,
                state.content.len()
            ),
            Resolution::Conflict => info!(
                "PUT conflict: base {} behind {}, wrote conflict block as version {}",
                base_version,
                next_version - 1,
                next_version
            ),
        }

        Ok(next_version)
    }
}
