//! Compiled-artifact cache with path-keyed locking
//!
//! Backends that persist compiled artifacts externally store them here, keyed
//! by document name plus program position. Writers serialize per target path,
//! so two threads never write the same artifact concurrently; cross-process
//! safety comes from writing to a temp file and renaming into place. Each
//! artifact is prefixed with a blake3 hash of its payload, verified on load.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ArtifactError;

const HASH_LEN: usize = 32;

/// Filesystem store for prepared program artifacts.
pub struct ArtifactCache {
    root: PathBuf,
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl ArtifactCache {
    /// Create a cache rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Root directory of the cache.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the artifact for a document name and program position.
    pub fn artifact_path(&self, document: &str, position: usize) -> PathBuf {
        let sanitized: String = document
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '.' {
                ch
            } else {
                '_'
            })
            .collect();
        self.root.join(format!("{}.{}.bin", sanitized, position))
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Store an artifact, replacing any previous content atomically.
    pub fn store(
        &self,
        document: &str,
        position: usize,
        payload: &[u8],
    ) -> Result<PathBuf, ArtifactError> {
        let path = self.artifact_path(document, position);
        let lock = self.lock_for(&path);
        let _guard = lock.lock();

        fs::create_dir_all(&self.root)?;
        let tmp = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(blake3::hash(payload).as_bytes())?;
            file.write_all(payload)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(path)
    }

    /// Load an artifact if present, verifying its content hash.
    ///
    /// A reader that finds a pre-existing artifact may use it without
    /// re-preparing the program.
    pub fn load(&self, document: &str, position: usize) -> Result<Option<Vec<u8>>, ArtifactError> {
        let path = self.artifact_path(document, position);
        let lock = self.lock_for(&path);
        let _guard = lock.lock();

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        if bytes.len() < HASH_LEN {
            return Err(ArtifactError::HashMismatch { path });
        }
        let (stored, payload) = bytes.split_at(HASH_LEN);
        if blake3::hash(payload).as_bytes().as_slice() != stored {
            return Err(ArtifactError::HashMismatch { path });
        }
        Ok(Some(payload.to_vec()))
    }
}
