//! Player sessions and attempt budgets.
//!
//! This crate owns the answer to "how many attempts does this player
//! have left?":
//!
//! 1. **Identity**: [`Username`] validation and per-round [`RoundId`]s
//! 2. **Budget**: [`SessionManager`] creates rounds and debits attempts
//! 3. **Storage**: the [`SessionStore`] seam, with [`MemoryStore`] for
//!    volatile use and [`FileStore`] for a JSON file that survives restarts
//!
//! # How it fits in the stack
//!
//! ```text
//! Reveal Engine (above)  ← debits one attempt per box opened
//!     ↕
//! Session Layer (this crate)  ← identity, budgets, storage
//!     ↕
//! SessionStore (below)  ← memory or JSON file
//! ```

mod error;
mod file_store;
mod manager;
mod session;
mod store;

pub use error::{SessionError, StoreError};
pub use file_store::FileStore;
pub use manager::SessionManager;
pub use session::{
    DEFAULT_MAX_ATTEMPTS, MAX_USERNAME_CHARS, MIN_USERNAME_CHARS, RoundId, Session,
    SessionConfig, SessionState, Username,
};
pub use store::{MemoryStore, SessionStore};
