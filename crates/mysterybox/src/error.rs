//! Unified error type for the mystery box server.

use mysterybox_protocol::{ErrorKind, ProtocolError};
use mysterybox_reveal::RevealError;
use mysterybox_session::SessionError;
use mysterybox_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum MysteryBoxError {
    /// A transport-level error (accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (bad username, not found, exhausted, store).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A reveal error (box out of range, bad probability, or a session
    /// error raised during the debit).
    #[error(transparent)]
    Reveal(#[from] RevealError),

    /// Startup configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MysteryBoxError {
    /// The client-facing category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Session(e) | Self::Reveal(RevealError::Session(e)) => session_kind(e),
            Self::Reveal(RevealError::BoxOutOfRange { .. } | RevealError::InvalidProbability(_)) => {
                ErrorKind::Validation
            }
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Reveal(RevealError::InvalidConfig(_)) | Self::Config(_) | Self::Transport(_) => {
                ErrorKind::Unavailable
            }
        }
    }

    /// HTTP-style status code, derived from [`kind`](Self::kind).
    pub fn code(&self) -> u16 {
        self.kind().code()
    }
}

fn session_kind(err: &SessionError) -> ErrorKind {
    match err {
        SessionError::InvalidUsername(_) => ErrorKind::Validation,
        SessionError::NotFound(_) => ErrorKind::NotFound,
        SessionError::Exhausted(_) => ErrorKind::Exhausted,
        SessionError::Store(_) => ErrorKind::Unavailable,
    }
}
