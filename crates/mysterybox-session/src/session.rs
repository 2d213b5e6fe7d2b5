//! Session types: the records that represent a player's round.
//!
//! A session tracks:
//! - WHO is playing (`Username`)
//! - WHICH round this is (`RoundId`, fresh on every registration)
//! - HOW MANY attempts are left (`remaining_attempts`)

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::SessionError;

/// Shortest allowed username, counted in characters after trimming.
pub const MIN_USERNAME_CHARS: usize = 2;

/// Longest allowed username, counted in characters after trimming.
pub const MAX_USERNAME_CHARS: usize = 20;

/// Attempts granted per round unless configured otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Attempt budget every new round starts with.
    pub max_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

// ---------------------------------------------------------------------------
// Username
// ---------------------------------------------------------------------------

/// A validated player name.
///
/// The only way to get one is [`Username::parse`] (or deserializing,
/// which goes through the same check), so holding a `Username` means
/// the trimmed length is within bounds.
///
/// `#[serde(try_from = "String", into = "String")]` makes the type show
/// up as a plain JSON string while still rejecting bad values on load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Trims `raw` and checks its length.
    ///
    /// Length is counted in characters, not bytes, so "Zoë" is 3 long.
    ///
    /// # Errors
    /// [`SessionError::InvalidUsername`] if the trimmed name is shorter
    /// than [`MIN_USERNAME_CHARS`] or longer than [`MAX_USERNAME_CHARS`].
    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        let trimmed = raw.trim();
        let len = trimmed.chars().count();
        if len < MIN_USERNAME_CHARS {
            return Err(SessionError::InvalidUsername(format!(
                "must be at least {MIN_USERNAME_CHARS} characters, got {len}"
            )));
        }
        if len > MAX_USERNAME_CHARS {
            return Err(SessionError::InvalidUsername(format!(
                "must be at most {MAX_USERNAME_CHARS} characters, got {len}"
            )));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Username {
    type Error = SessionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// RoundId
// ---------------------------------------------------------------------------

/// Identifies one round of one player.
///
/// A 32-character hex string (128 random bits). Every registration gets
/// a new one, so two rounds never share an id even when they start in
/// the same millisecond.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundId(String);

impl RoundId {
    /// Draws a fresh random round id.
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::rng().random();
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a session is in its round.
///
/// ```text
///            reveal (remaining > 1)
///              ┌─────┐
///              ▼     │
///   create ─→ Active ─┴─ reveal (remaining == 1) ─→ Exhausted
///              ▲                                       │
///              └──────────────── create ───────────────┘
/// ```
///
/// `Exhausted` is terminal for the round: nothing but a new `create`
/// brings the session back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// At least one attempt left.
    Active { remaining: u32 },
    /// No attempts left.
    Exhausted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active { remaining } => write!(f, "Active({remaining})"),
            Self::Exhausted => write!(f, "Exhausted"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single player's round on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Who is playing.
    pub username: Username,

    /// Which round this record belongs to.
    pub round_id: RoundId,

    /// Attempts left. Only ever goes down within a round.
    pub remaining_attempts: u32,
}

impl Session {
    /// Starts a new round for `username` with a full budget.
    pub fn new(username: Username, max_attempts: u32) -> Self {
        Self {
            username,
            round_id: RoundId::generate(),
            remaining_attempts: max_attempts,
        }
    }

    /// The session's current state.
    pub fn state(&self) -> SessionState {
        match self.remaining_attempts {
            0 => SessionState::Exhausted,
            remaining => SessionState::Active { remaining },
        }
    }

    /// Returns `true` when no attempts are left.
    pub fn is_exhausted(&self) -> bool {
        self.remaining_attempts == 0
    }

    /// The same session with one attempt fewer, or `None` if there is
    /// nothing left to spend.
    pub(crate) fn debited(&self) -> Option<Self> {
        let remaining_attempts = self.remaining_attempts.checked_sub(1)?;
        Some(Self {
            remaining_attempts,
            ..self.clone()
        })
    }
}
