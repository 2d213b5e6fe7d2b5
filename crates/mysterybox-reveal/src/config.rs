//! Board configuration.

use serde::{Deserialize, Serialize};

use crate::RevealError;

/// Boxes on the board unless configured otherwise.
pub const DEFAULT_TOTAL_BOXES: u32 = 200;

/// Chance that a single reveal wins unless configured otherwise.
pub const DEFAULT_WIN_PROBABILITY: f64 = 0.10;

/// Configuration for a [`RevealEngine`](crate::RevealEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevealConfig {
    /// Number of boxes on the board. Valid picks are `1..=total_boxes`.
    pub total_boxes: u32,

    /// Probability in `[0, 1]` that a reveal wins. Independent of the
    /// box picked and of every earlier draw.
    pub win_probability: f64,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            total_boxes: DEFAULT_TOTAL_BOXES,
            win_probability: DEFAULT_WIN_PROBABILITY,
        }
    }
}

impl RevealConfig {
    /// Checks that the board has at least one box and the probability
    /// is in range.
    pub fn validate(&self) -> Result<(), RevealError> {
        if self.total_boxes == 0 {
            return Err(RevealError::InvalidConfig(
                "total_boxes must be at least 1".into(),
            ));
        }
        check_probability(self.win_probability).map_err(|_| {
            RevealError::InvalidConfig(format!(
                "win_probability must be in [0, 1], got {}",
                self.win_probability
            ))
        })
    }

    /// Returns `true` if `box_number` is on the board.
    pub fn contains_box(&self, box_number: u32) -> bool {
        (1..=self.total_boxes).contains(&box_number)
    }

    /// Narrows a client-supplied box number to a box on the board.
    ///
    /// Takes `i64` so negative numbers and numbers past `u32::MAX` are
    /// reported as out of range rather than as malformed input.
    pub fn check_box(&self, box_number: i64) -> Result<u32, RevealError> {
        u32::try_from(box_number)
            .ok()
            .filter(|&n| self.contains_box(n))
            .ok_or(RevealError::BoxOutOfRange {
                box_number,
                total_boxes: self.total_boxes,
            })
    }
}

/// NaN fails `contains`, so it is rejected along with out-of-range values.
pub(crate) fn check_probability(p: f64) -> Result<(), RevealError> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(RevealError::InvalidProbability(p))
    }
}
