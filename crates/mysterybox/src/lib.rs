//! # Mystery Box
//!
//! Server for a browser game: a player registers a username, gets a fixed
//! number of attempts, and opens numbered boxes until a box wins or the
//! attempts run out.
//!
//! The crates are layered the same way a request flows through them:
//!
//! | Crate | Job |
//! |---|---|
//! | `mysterybox-transport` | WebSocket listener and connections |
//! | `mysterybox-protocol` | `Envelope`, request/reply messages, JSON codec |
//! | `mysterybox-session` | usernames, attempt budgets, session stores |
//! | `mysterybox-reveal` | box validation and the win draw |
//! | `mysterybox` | builder, accept loop, per-connection handler |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mysterybox::prelude::*;
//!
//! # async fn start() -> Result<(), MysteryBoxError> {
//! let config = AppConfig::from_env()?;
//! let server = config.builder().build(MemoryStore::new()).await?;
//! server.run().await
//! # }
//! ```

pub mod config;
mod error;
mod handler;
mod server;

pub use config::AppConfig;
pub use error::MysteryBoxError;
pub use server::{
    DEFAULT_BIND_ADDR, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_IDLE_TIMEOUT, MysteryBoxServer,
    MysteryBoxServerBuilder,
};

pub use mysterybox_protocol as protocol;
pub use mysterybox_reveal as reveal;
pub use mysterybox_session as session;
pub use mysterybox_transport as transport;

/// Everything needed to configure, start and talk to a server.
pub mod prelude {
    pub use crate::{AppConfig, MysteryBoxError, MysteryBoxServer, MysteryBoxServerBuilder};

    pub use mysterybox_protocol::{
        ClientMessage, Envelope, ErrorKind, PROTOCOL_VERSION, ServerMessage,
    };
    pub use mysterybox_reveal::{RevealConfig, RevealEngine, RevealResult};
    pub use mysterybox_session::{
        FileStore, MemoryStore, Session, SessionConfig, SessionManager, SessionStore, Username,
    };
}
