//! Write coordinator — per-document serialized, atomic writes
//!
//! Every write goes through a lock keyed by the document's path (without
//! extension, so all formats of one document share a lock). Content is
//! written to a dot-prefixed temp file in the same directory, flushed,
//! and renamed over the target. A crash or failure leaves either the old
//! file or the new one, never a mixture, and readers never take the lock.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

type LockTable = HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>;

/// Serializes writes to the same document; writes to different documents
/// proceed independently.
#[derive(Default)]
pub struct WriteCoordinator {
    locks: Arc<Mutex<LockTable>>,
}

/// Held per-document lock. Released on drop, including on error paths.
pub struct DocumentLock {
    key: PathBuf,
    locks: Arc<Mutex<LockTable>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl DocumentLock {
    /// Path the lock is keyed by
    pub fn key(&self) -> &Path {
        &self.key
    }
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        // Release first so the strong count reflects only other holders/waiters
        self.guard.take();
        if let Ok(mut table) = self.locks.lock() {
            let idle = table
                .get(&self.key)
                .map(|m| Arc::strong_count(m) == 1)
                .unwrap_or(false);
            if idle {
                table.remove(&self.key);
            }
        }
    }
}

impl WriteCoordinator {
    /// Create a coordinator with no locks held
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the exclusive lock for `key`, waiting at most `timeout`
    /// (forever when `None`).
    pub async fn lock(&self, key: &Path, timeout: Option<Duration>) -> Result<DocumentLock> {
        let mutex = {
            let mut table = self
                .locks
                .lock()
                .map_err(|_| Error::Io(std::io::Error::other("write lock table poisoned")))?;
            table
                .entry(key.to_path_buf())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        let guard = match mutex.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!(path = %key.display(), "Waiting for document lock");
                match timeout {
                    Some(limit) => match tokio::time::timeout(limit, mutex.lock_owned()).await {
                        Ok(guard) => guard,
                        Err(_) => {
                            tracing::warn!(
                                path = %key.display(),
                                waited_ms = limit.as_millis() as u64,
                                "Document lock timed out"
                            );
                            return Err(Error::LockTimeout {
                                path: key.to_path_buf(),
                                waited: limit,
                            });
                        }
                    },
                    None => mutex.lock_owned().await,
                }
            }
        };

        Ok(DocumentLock {
            key: key.to_path_buf(),
            locks: self.locks.clone(),
            guard: Some(guard),
        })
    }

    /// Atomically replace the file at `path` with `content`.
    ///
    /// `key` is the lock key; `superseded` lists sibling files (other
    /// formats of the same document) removed after the replace succeeds.
    /// Once the replace has succeeded the write is committed: a sibling
    /// that cannot be removed is logged, not reported as a failure.
    pub async fn write(
        &self,
        key: &Path,
        path: &Path,
        content: &[u8],
        superseded: &[PathBuf],
        timeout: Option<Duration>,
    ) -> Result<()> {
        let _lock = self.lock(key, timeout).await?;

        replace_atomic(path, content).await?;

        for old in superseded {
            match tokio::fs::remove_file(old).await {
                Ok(()) => {
                    tracing::debug!(path = %old.display(), "Removed superseded document file")
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    path = %old.display(),
                    error = %e,
                    "Could not remove superseded document file"
                ),
            }
        }

        tracing::debug!(path = %path.display(), bytes = content.len(), "Document written");
        Ok(())
    }

    /// Number of documents with a held or awaited lock
    pub fn active_locks(&self) -> usize {
        self.locks.lock().map(|t| t.len()).unwrap_or(0)
    }
}

/// Temp file next to `path`: `.<file-name>.<uuid>.tmp`
fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()))
}

async fn replace_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let tmp = temp_path_for(path);

    let result = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(content).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    if let Err(source) = result {
        let _ = tokio::fs::remove_file(&tmp).await;
        tracing::warn!(path = %path.display(), error = %source, "Atomic replace failed");
        return Err(Error::WriteFailed {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}
