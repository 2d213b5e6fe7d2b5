//! Error types for the reveal engine.

use mysterybox_session::SessionError;

/// Errors that can occur while revealing a box.
///
/// Input problems ([`BoxOutOfRange`](Self::BoxOutOfRange),
/// [`InvalidProbability`](Self::InvalidProbability)) are caught before
/// any attempt is spent. Session problems are passed through unchanged.
#[derive(Debug, thiserror::Error)]
pub enum RevealError {
    /// The box number is outside `1..=total_boxes`.
    #[error("box {box_number} is out of range 1..={total_boxes}")]
    BoxOutOfRange { box_number: i64, total_boxes: u32 },

    /// The win probability is NaN or outside `[0, 1]`.
    #[error("win probability {0} is outside [0, 1]")]
    InvalidProbability(f64),

    /// The engine configuration itself is unusable.
    #[error("invalid reveal config: {0}")]
    InvalidConfig(String),

    /// The attempt debit failed (not found, exhausted, store failure).
    #[error(transparent)]
    Session(#[from] SessionError),
}
