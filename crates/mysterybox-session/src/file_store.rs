//! A [`SessionStore`] that survives restarts by mirroring itself to a
//! JSON file.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{MemoryStore, Session, SessionStore, StoreError, Username};

/// On-disk layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    sessions: Vec<Session>,
}

/// [`MemoryStore`] plus a JSON snapshot on disk.
///
/// Reads are served from memory. Every write is followed by a full
/// snapshot write (temp file, then rename) and only reports success once
/// the snapshot is on disk. If the snapshot write fails, the in-memory
/// change is rolled back before the error is returned, so memory and
/// disk never disagree and a failed debit spends nothing.
///
/// Unlike [`MemoryStore`], writes for *different* usernames contend
/// here: every mutation holds the one file-wide write lock until its
/// snapshot is written.
#[derive(Debug)]
pub struct FileStore {
    memory: MemoryStore,
    path: PathBuf,
    /// Held across a mutation and its snapshot write. Also keeps two
    /// writers off the temp file.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens the store at `path`, loading any snapshot already there.
    ///
    /// A missing file means an empty store; the parent directory is
    /// created if needed.
    ///
    /// # Errors
    /// [`StoreError::Io`] if the file or directory can't be accessed,
    /// [`StoreError::Corrupt`] if the file doesn't parse (including
    /// usernames that fail validation).
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let file = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<StoreFile>(&bytes).map_err(|source| {
                StoreError::Corrupt {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreFile::default(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        tracing::info!(
            path = %path.display(),
            sessions = file.sessions.len(),
            "session store opened"
        );

        Ok(Self {
            memory: MemoryStore::with_sessions(file.sessions),
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Where the snapshot lives.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copies every session out, sorted by username.
    pub async fn snapshot(&self) -> Vec<Session> {
        self.memory.snapshot().await
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Writes the current memory state to disk. Callers hold `write_lock`.
    async fn write_snapshot(&self) -> Result<(), StoreError> {
        let file = StoreFile {
            sessions: self.memory.snapshot().await,
        };
        let json = serde_json::to_vec_pretty(&file).map_err(StoreError::Encode)?;

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })?;

        tracing::trace!(
            path = %self.path.display(),
            sessions = file.sessions.len(),
            "snapshot written"
        );
        Ok(())
    }
}

impl SessionStore for FileStore {
    async fn load(&self, username: &Username) -> Result<Option<Session>, StoreError> {
        self.memory.load(username).await
    }

    async fn save(&self, session: Session) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let username = session.username.clone();
        let previous = self.memory.load(&username).await?;

        self.memory.save(session).await?;
        if let Err(e) = self.write_snapshot().await {
            match previous {
                Some(previous) => self.memory.save(previous).await?,
                None => self.memory.remove(&username).await,
            }
            tracing::warn!(%username, error = %e, "snapshot failed, save rolled back");
            return Err(e);
        }
        Ok(())
    }

    async fn compare_and_swap(&self, expected: &Session, new: Session) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        if !self.memory.compare_and_swap(expected, new.clone()).await? {
            return Ok(false);
        }
        if let Err(e) = self.write_snapshot().await {
            // Every writer goes through `write_lock`, so `new` is still
            // the stored value and this swap can't miss.
            self.memory.compare_and_swap(&new, expected.clone()).await?;
            tracing::warn!(
                username = %expected.username,
                error = %e,
                "snapshot failed, swap rolled back"
            );
            return Err(e);
        }
        Ok(true)
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.write_snapshot().await
    }
}
