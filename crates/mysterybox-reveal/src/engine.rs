//! The reveal engine: one box pick in, one outcome out.
//!
//! The protocol for a single reveal:
//!
//! 1. Validate the box number and win probability. Bad input fails here
//!    and costs nothing.
//! 2. Debit one attempt through the [`SessionManager`]. Not-found and
//!    exhausted errors pass through unchanged.
//! 3. Draw `r` uniformly from `[0, 1)`; the player wins if `r < p`.
//!
//! The draw happens only on the server, after the debit, and ignores the
//! box number entirely, so a client can neither choose nor predict the
//! outcome by picking a particular box.

use std::sync::Arc;

use mysterybox_session::{SessionManager, SessionStore, Username};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::check_probability;
use crate::{RevealConfig, RevealError};

/// Outcome of one reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealResult {
    /// The box that was opened.
    pub box_number: u32,
    /// Whether it held a prize.
    pub won: bool,
    /// Attempts left after this reveal.
    pub remaining_attempts: u32,
}

impl RevealResult {
    /// Returns `true` if this reveal used the last attempt of the round.
    pub fn is_final(&self) -> bool {
        self.remaining_attempts == 0
    }
}

/// Decides reveal outcomes and charges them to a session.
///
/// Cheap to share: wrap it in an `Arc` and call [`reveal`](Self::reveal)
/// from as many tasks as you like.
#[derive(Debug)]
pub struct RevealEngine<S> {
    sessions: Arc<SessionManager<S>>,
    config: RevealConfig,
}

impl<S: SessionStore> RevealEngine<S> {
    /// Creates an engine over `sessions`.
    ///
    /// # Errors
    /// [`RevealError::InvalidConfig`] if `config` fails validation.
    pub fn new(sessions: Arc<SessionManager<S>>, config: RevealConfig) -> Result<Self, RevealError> {
        config.validate()?;
        Ok(Self { sessions, config })
    }

    /// The board configuration.
    pub fn config(&self) -> &RevealConfig {
        &self.config
    }

    /// The session manager attempts are charged to.
    pub fn sessions(&self) -> &Arc<SessionManager<S>> {
        &self.sessions
    }

    /// Opens `box_number` for `username` with an explicit win probability.
    ///
    /// Exactly one attempt is debited per `Ok`. Nothing is debited when
    /// an `Err` is returned.
    ///
    /// # Errors
    /// - [`RevealError::BoxOutOfRange`]: `box_number` not in `1..=total_boxes`
    /// - [`RevealError::InvalidProbability`]: `win_probability` not in `[0, 1]`
    /// - [`RevealError::Session`]: not found, exhausted, or store failure
    pub async fn reveal(
        &self,
        username: &Username,
        box_number: u32,
        win_probability: f64,
    ) -> Result<RevealResult, RevealError> {
        self.config.check_box(i64::from(box_number))?;
        check_probability(win_probability)?;

        let remaining_attempts = self.sessions.debit_attempt(username).await?;

        // `rand::rng()` is thread-local and not `Send`; it's created and
        // dropped within this statement so it never lives across an await.
        let roll: f64 = rand::rng().random();
        let won = roll < win_probability;

        tracing::info!(
            %username,
            box_number,
            won,
            remaining = remaining_attempts,
            "box revealed"
        );

        Ok(RevealResult {
            box_number,
            won,
            remaining_attempts,
        })
    }

    /// Opens `box_number` using the configured win probability.
    pub async fn select(
        &self,
        username: &Username,
        box_number: u32,
    ) -> Result<RevealResult, RevealError> {
        self.reveal(username, box_number, self.config.win_probability)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mysterybox_session::{MemoryStore, SessionConfig, SessionError};

    async fn engine_with(name: &str) -> (RevealEngine<MemoryStore>, Username) {
        let sessions = Arc::new(SessionManager::new(MemoryStore::new(), SessionConfig::default()));
        sessions.create(name).await.unwrap();
        let engine = RevealEngine::new(sessions, RevealConfig::default()).unwrap();
        (engine, Username::parse(name).unwrap())
    }

    #[tokio::test]
    async fn test_reveal_debits_one_attempt() {
        let (engine, alice) = engine_with("alice").await;
        let result = engine.reveal(&alice, 7, 0.10).await.unwrap();
        assert_eq!(result.box_number, 7);
        assert_eq!(result.remaining_attempts, 2);
        assert!(!result.is_final());
        assert_eq!(engine.sessions().get_remaining(&alice).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reveal_box_zero_is_rejected_without_debit() {
        let (engine, alice) = engine_with("alice").await;
        let result = engine.reveal(&alice, 0, 0.5).await;
        assert!(matches!(
            result,
            Err(RevealError::BoxOutOfRange { box_number: 0, total_boxes: 200 })
        ));
        assert_eq!(engine.sessions().get_remaining(&alice).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_reveal_box_past_end_is_rejected_without_debit() {
        let (engine, alice) = engine_with("alice").await;
        let result = engine.reveal(&alice, 201, 0.5).await;
        assert!(matches!(result, Err(RevealError::BoxOutOfRange { .. })));
        assert_eq!(engine.sessions().get_remaining(&alice).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_reveal_last_box_is_valid() {
        let (engine, alice) = engine_with("alice").await;
        assert!(engine.reveal(&alice, 200, 0.5).await.is_ok());
    }

    #[tokio::test]
    async fn test_reveal_bad_probability_is_rejected_without_debit() {
        let (engine, alice) = engine_with("alice").await;
        for p in [-0.5, 1.5, f64::NAN] {
            let result = engine.reveal(&alice, 1, p).await;
            assert!(matches!(result, Err(RevealError::InvalidProbability(_))));
        }
        assert_eq!(engine.sessions().get_remaining(&alice).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_reveal_probability_zero_never_wins() {
        let sessions = Arc::new(SessionManager::new(
            MemoryStore::new(),
            SessionConfig { max_attempts: 200 },
        ));
        sessions.create("bob").await.unwrap();
        let engine = RevealEngine::new(sessions, RevealConfig::default()).unwrap();
        let bob = Username::parse("bob").unwrap();

        for box_number in 1..=200 {
            assert!(!engine.reveal(&bob, box_number, 0.0).await.unwrap().won);
        }
    }

    #[tokio::test]
    async fn test_reveal_probability_one_always_wins() {
        let sessions = Arc::new(SessionManager::new(
            MemoryStore::new(),
            SessionConfig { max_attempts: 200 },
        ));
        sessions.create("carol").await.unwrap();
        let engine = RevealEngine::new(sessions, RevealConfig::default()).unwrap();
        let carol = Username::parse("carol").unwrap();

        for box_number in 1..=200 {
            assert!(engine.reveal(&carol, box_number, 1.0).await.unwrap().won);
        }
    }

    #[tokio::test]
    async fn test_reveal_same_box_twice_is_allowed() {
        let (engine, alice) = engine_with("alice").await;
        assert!(engine.reveal(&alice, 5, 0.1).await.is_ok());
        assert!(engine.reveal(&alice, 5, 0.1).await.is_ok());
    }

    #[tokio::test]
    async fn test_reveal_exhausted_session_propagates_unchanged() {
        let (engine, alice) = engine_with("alice").await;
        for _ in 0..3 {
            engine.reveal(&alice, 1, 0.1).await.unwrap();
        }
        let result = engine.reveal(&alice, 1, 0.1).await;
        assert!(matches!(
            result,
            Err(RevealError::Session(SessionError::Exhausted(_)))
        ));
    }

    #[tokio::test]
    async fn test_reveal_unknown_player_propagates_not_found() {
        let (engine, _) = engine_with("alice").await;
        let ghost = Username::parse("ghost").unwrap();
        let result = engine.reveal(&ghost, 1, 0.1).await;
        assert!(matches!(
            result,
            Err(RevealError::Session(SessionError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_select_uses_configured_probability() {
        let sessions = Arc::new(SessionManager::new(MemoryStore::new(), SessionConfig::default()));
        sessions.create("dave").await.unwrap();
        let config = RevealConfig {
            total_boxes: 9,
            win_probability: 1.0,
        };
        let engine = RevealEngine::new(sessions, config).unwrap();
        let dave = Username::parse("dave").unwrap();

        assert!(engine.select(&dave, 9).await.unwrap().won);
        assert!(matches!(
            engine.select(&dave, 10).await,
            Err(RevealError::BoxOutOfRange { total_boxes: 9, .. })
        ));
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let sessions = Arc::new(SessionManager::new(MemoryStore::new(), SessionConfig::default()));
        let result = RevealEngine::new(
            sessions,
            RevealConfig {
                total_boxes: 0,
                win_probability: 0.1,
            },
        );
        assert!(matches!(result, Err(RevealError::InvalidConfig(_))));
    }
}
