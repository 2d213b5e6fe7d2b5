//! The session manager: the single source of truth for attempt budgets.
//!
//! It's responsible for:
//! - Starting (or restarting) a round when a player registers
//! - Answering "how many attempts are left?"
//! - Debiting exactly one attempt per reveal, atomically
//!
//! # Concurrency
//!
//! Unlike a manager owned by a single task, `SessionManager` is shared
//! by every connection task behind an `Arc` and all methods take `&self`.
//! The debit is a load / compare-and-swap loop against the store: two
//! reveals racing on the last attempt both read `remaining == 1`, but
//! only one swap can match, and the loser re-reads `0` and fails with
//! [`SessionError::Exhausted`].

use crate::{Session, SessionConfig, SessionError, SessionStore, Username};

/// Owns player identity and attempt budgets.
///
/// ## Lifecycle
///
/// ```text
/// create() ──→ debit_attempt() ... debit_attempt() ──→ Exhausted
///    ▲                                                    │
///    └────────────── create() (new round) ────────────────┘
/// ```
#[derive(Debug)]
pub struct SessionManager<S> {
    store: S,
    config: SessionConfig,
}

impl<S: SessionStore> SessionManager<S> {
    /// Creates a manager over `store`.
    pub fn new(store: S, config: SessionConfig) -> Self {
        Self { store, config }
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Starts a round for `raw_username` with a full attempt budget.
    ///
    /// Registering a name that already has a session replaces it: the
    /// budget goes back to `max_attempts` and a new [`RoundId`](crate::RoundId)
    /// is issued. Nothing from the old round is kept.
    ///
    /// # Errors
    /// - [`SessionError::InvalidUsername`]: trimmed length out of range
    /// - [`SessionError::Store`]: the store rejected the write
    pub async fn create(&self, raw_username: &str) -> Result<Session, SessionError> {
        let username = Username::parse(raw_username)?;
        let session = Session::new(username, self.config.max_attempts);

        self.store.save(session.clone()).await?;

        tracing::info!(
            username = %session.username,
            round_id = %session.round_id,
            remaining = session.remaining_attempts,
            "round started"
        );
        Ok(session)
    }

    /// Returns the full session for `username`.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the player never registered.
    pub async fn session(&self, username: &Username) -> Result<Session, SessionError> {
        self.store
            .load(username)
            .await?
            .ok_or_else(|| SessionError::NotFound(username.clone()))
    }

    /// Returns how many attempts `username` has left. No side effects.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the player never registered.
    pub async fn get_remaining(&self, username: &Username) -> Result<u32, SessionError> {
        Ok(self.session(username).await?.remaining_attempts)
    }

    /// Spends one attempt and returns how many are left afterwards.
    ///
    /// The check and the decrement are one atomic unit: every `Ok`
    /// corresponds to exactly one attempt consumed, and the count never
    /// goes below zero no matter how many calls race.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`]: no session
    /// - [`SessionError::Exhausted`]: zero attempts left
    /// - [`SessionError::Store`]: the store failed; no success is reported
    pub async fn debit_attempt(&self, username: &Username) -> Result<u32, SessionError> {
        loop {
            let current = self.session(username).await?;
            let Some(next) = current.debited() else {
                tracing::debug!(%username, "debit refused, no attempts left");
                return Err(SessionError::Exhausted(username.clone()));
            };

            let remaining = next.remaining_attempts;
            if self.store.compare_and_swap(&current, next).await? {
                tracing::debug!(%username, remaining, "attempt debited");
                return Ok(remaining);
            }

            tracing::trace!(%username, "debit lost a race, retrying");
        }
    }

    /// Flushes the store to durable storage (no-op for memory stores).
    pub async fn flush(&self) -> Result<(), SessionError> {
        self.store.flush().await?;
        tracing::info!("session store flushed");
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================
