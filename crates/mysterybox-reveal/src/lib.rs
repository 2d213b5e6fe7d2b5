//! Box reveal engine.
//!
//! Given a player with attempts left and a box number, [`RevealEngine`]
//! debits one attempt and draws a win/lose outcome.
//!
//! # Key types
//!
//! - [`RevealEngine`]: validates, debits, draws
//! - [`RevealConfig`]: board size and win probability
//! - [`RevealResult`]: what the player gets back
//! - [`RevealError`]: input and session failures

mod config;
mod engine;
mod error;

pub use config::{DEFAULT_TOTAL_BOXES, DEFAULT_WIN_PROBABILITY, RevealConfig};
pub use engine::{RevealEngine, RevealResult};
pub use error::RevealError;
