//! Message types for the mystery box wire format.
//!
//! Everything in this module travels "on the wire": it is serialized by
//! a [`Codec`](crate::Codec), sent over a WebSocket, and deserialized by
//! the other side. The browser client builds these shapes by hand, so
//! the JSON layout is part of the contract and is pinned by the tests
//! at the bottom of this file.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ClientMessage: browser → server
// ---------------------------------------------------------------------------

/// Requests a client can make.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON:
///   `{ "type": "SelectBox", "username": "alice", "boxNumber": 7 }`
///
/// `rename_all_fields = "camelCase"` renames the fields *inside* each
/// variant, so Rust's `box_number` becomes `boxNumber` for JavaScript.
///
/// Usernames arrive exactly as typed. Trimming and length checks happen
/// in the session layer, which owns the rules for what a username is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Must be the first message on a connection.
    Handshake { version: u32 },

    /// Start (or restart) a round for `username` with a full attempt budget.
    Register { username: String },

    /// Open box `box_number` (1-based), spending one attempt.
    ///
    /// Signed and wide so that `-1` or `4294967296` still decode; the
    /// reveal engine then rejects them as out of range.
    SelectBox { username: String, box_number: i64 },

    /// Ask how many attempts `username` has left. Spends nothing.
    Status { username: String },

    /// Liveness check. Answered with [`ServerMessage::Pong`].
    Ping,

    /// The client is leaving. `reason` is only logged.
    Disconnect { reason: String },
}

// ---------------------------------------------------------------------------
// ServerMessage: server → browser
// ---------------------------------------------------------------------------

/// Replies the server sends. Every request gets exactly one reply,
/// either its matching success variant or [`ServerMessage::Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Handshake accepted. Carries the board size and attempt budget so
    /// the client can draw the grid without hardcoding either.
    HandshakeAck {
        server_time: u64,
        total_boxes: u32,
        max_attempts: u32,
    },

    /// A round was started (or reset) for `username`.
    Registered {
        username: String,
        round_id: String,
        remaining_attempts: u32,
    },

    /// Outcome of a `SelectBox`.
    Revealed {
        box_number: u32,
        won: bool,
        remaining_attempts: u32,
    },

    /// Answer to a `Status` request.
    Status {
        username: String,
        remaining_attempts: u32,
        exhausted: bool,
    },

    /// Answer to `Ping`. `status` is always `"ok"`.
    Pong { status: String },

    /// The request failed. `code` follows HTTP conventions; `kind` is the
    /// machine-readable category the client branches on.
    Error {
        code: u16,
        kind: ErrorKind,
        message: String,
    },
}

impl ServerMessage {
    /// The liveness reply.
    pub fn pong() -> Self {
        Self::Pong {
            status: "ok".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Category of a failed request.
///
/// The client only needs to tell these apart: `Validation` means "fix
/// your input", `NotFound` means "register again", `Exhausted` means
/// "no attempts left, show the game-over screen", `Unavailable` means
/// "try again later".
///
/// On the wire and in `Display` the kind is snake_case (`"not_found"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed username or out-of-range box number.
    Validation,
    /// No session for that username.
    NotFound,
    /// The session has zero attempts left.
    Exhausted,
    /// The backing store failed; the request may be retried.
    Unavailable,
    /// The frame itself was bad (undecodable, wrong version, out of order).
    Protocol,
}

impl ErrorKind {
    /// HTTP-style status code for this kind.
    pub fn code(self) -> u16 {
        match self {
            Self::Validation | Self::Protocol => 400,
            Self::NotFound => 404,
            Self::Exhausted => 409,
            Self::Unavailable => 503,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Exhausted => "exhausted",
            Self::Unavailable => "unavailable",
            Self::Protocol => "protocol",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Envelope: the top-level wire format
// ---------------------------------------------------------------------------

/// The top-level wrapper around every message, in both directions.
///
/// ```text
/// ┌──────────────────────────────┐
/// │ seq: 4                       │  ← per-sender counter
/// │ timestamp: 1520              │  ← ms since the sender started
/// │ ┌──────────────────────────┐ │
/// │ │ message: Revealed {...}  │ │
/// │ └──────────────────────────┘ │
/// └──────────────────────────────┘
/// ```
///
/// Generic over the message type so the same wrapper serves
/// `Envelope<ClientMessage>` and `Envelope<ServerMessage>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<M> {
    /// Each side keeps its own counter. The server does not reorder or
    /// reject on gaps; the field is there for client-side debugging.
    pub seq: u64,

    /// Milliseconds since the sender started.
    #[serde(default)]
    pub timestamp: u64,

    /// The actual request or reply.
    pub message: M,
}

impl<M> Envelope<M> {
    /// Wraps `message` with the given sequence number and timestamp.
    pub fn new(seq: u64, timestamp: u64, message: M) -> Self {
        Self {
            seq,
            timestamp,
            message,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
