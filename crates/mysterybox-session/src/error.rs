//! Error types for the session layer.

use std::path::PathBuf;

use crate::Username;

/// Errors that can occur during session management.
///
/// Each variant maps onto one client-visible category: a bad username
/// is a validation problem, a missing session means "register again",
/// an exhausted one means "no attempts left", and a store failure is
/// something the client can retry.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The username failed trimming/length validation.
    #[error("invalid username: {0}")]
    InvalidUsername(String),

    /// No session exists for this username.
    #[error("no active session for {0}")]
    NotFound(Username),

    /// The session's attempt budget is spent.
    #[error("{0} has no attempts left this round")]
    Exhausted(Username),

    /// The backing store failed. The operation did not report success.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures of a [`SessionStore`](crate::SessionStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the store file failed.
    #[error("session store I/O failed on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store file exists but does not parse.
    #[error("session store {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Serializing the snapshot failed.
    #[error("encoding session snapshot failed: {0}")]
    Encode(#[source] serde_json::Error),
}
