//! The session store seam and its in-memory implementation.
//!
//! [`SessionManager`](crate::SessionManager) never touches a `HashMap`
//! directly; it goes through [`SessionStore`], which is just enough of a
//! key-value API to make the attempt debit atomic: `load`, `save`, and a
//! `compare_and_swap` that only writes if nobody else wrote first.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::{Session, StoreError, Username};

/// Backing storage for sessions, keyed by username.
///
/// # Why `impl Future + Send` instead of `async fn`?
///
/// The server calls these from `tokio::spawn`ed connection tasks, and
/// spawned futures must be `Send`. Spelling the return type out lets the
/// trait promise that; implementations can still be written as plain
/// `async fn`.
pub trait SessionStore: Send + Sync + 'static {
    /// Returns the stored session for `username`, if any.
    fn load(
        &self,
        username: &Username,
    ) -> impl Future<Output = Result<Option<Session>, StoreError>> + Send;

    /// Stores `session`, replacing whatever was there for its username.
    fn save(&self, session: Session) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Replaces the stored session with `new` only if it still equals
    /// `expected`.
    ///
    /// Returns `Ok(false)` when another writer got there first (or the
    /// entry is gone); the caller re-reads and decides again.
    fn compare_and_swap(
        &self,
        expected: &Session,
        new: Session,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Pushes everything to durable storage. No-op for volatile stores.
    fn flush(&self) -> impl Future<Output = Result<(), StoreError>> + Send {
        async { Ok(()) }
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Volatile store: sessions live as long as the process.
///
/// Each session sits behind its own `Mutex`. The outer `RwLock` only
/// guards the map shape and is held just long enough to find (read) or
/// insert (write) an entry, so debits for different usernames never
/// wait on each other.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<Username, Arc<Mutex<Session>>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-filled with `sessions` (later duplicates win).
    pub fn with_sessions(sessions: impl IntoIterator<Item = Session>) -> Self {
        let entries = sessions
            .into_iter()
            .map(|s| (s.username.clone(), Arc::new(Mutex::new(s))))
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Copies every session out, sorted by username.
    pub async fn snapshot(&self) -> Vec<Session> {
        let entries = self.entries.read().await;
        let mut sessions = Vec::with_capacity(entries.len());
        for cell in entries.values() {
            sessions.push(cell.lock().await.clone());
        }
        sessions.sort_by(|a, b| a.username.cmp(&b.username));
        sessions
    }

    /// Number of usernames with a session.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if no session has been stored yet.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drops the session for `username`, if any.
    pub(crate) async fn remove(&self, username: &Username) {
        self.entries.write().await.remove(username);
    }

    /// Finds the cell for `username`, releasing the map lock before
    /// returning.
    async fn cell(&self, username: &Username) -> Option<Arc<Mutex<Session>>> {
        self.entries.read().await.get(username).cloned()
    }
}

impl SessionStore for MemoryStore {
    async fn load(&self, username: &Username) -> Result<Option<Session>, StoreError> {
        match self.cell(username).await {
            Some(cell) => Ok(Some(cell.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn save(&self, session: Session) -> Result<(), StoreError> {
        // Fast path: overwrite in place under the shared map lock.
        if let Some(cell) = self.cell(&session.username).await {
            *cell.lock().await = session;
            return Ok(());
        }

        let mut entries = self.entries.write().await;
        match entries.entry(session.username.clone()) {
            // Someone inserted between our read and write lock.
            Entry::Occupied(slot) => *slot.get().lock().await = session,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(session)));
            }
        }
        Ok(())
    }

    async fn compare_and_swap(&self, expected: &Session, new: Session) -> Result<bool, StoreError> {
        debug_assert_eq!(expected.username, new.username);
        let Some(cell) = self.cell(&expected.username).await else {
            return Ok(false);
        };
        let mut current = cell.lock().await;
        if *current != *expected {
            return Ok(false);
        }
        *current = new;
        Ok(true)
    }
}
