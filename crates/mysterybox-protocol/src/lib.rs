//! Wire protocol for the mystery box server.
//!
//! - **Types** ([`Envelope`], [`ClientMessage`], [`ServerMessage`],
//!   [`ErrorKind`]): what travels on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages
//!   become bytes and back.
//! - **Errors** ([`ProtocolError`]): what can go wrong doing that.
//!
//! The protocol layer knows nothing about sessions or attempt budgets.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Session / Reveal
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{ClientMessage, Envelope, ErrorKind, ServerMessage};

/// The protocol version clients must announce in their handshake.
pub const PROTOCOL_VERSION: u32 = 1;
