//! `MysteryBoxServer` builder and server loop.
//!
//! This is the entry point for running the game server. It ties
//! together all the layers: transport → protocol → session → reveal.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mysterybox_protocol::{Codec, JsonCodec};
use mysterybox_reveal::{RevealConfig, RevealEngine};
use mysterybox_session::{SessionConfig, SessionManager, SessionStore};
use mysterybox_transport::{PendingConnection, Transport, WebSocketTransport};

use crate::MysteryBoxError;
use crate::handler::handle_connection;

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";

/// How long a connection may stay silent before it is dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// How long a new connection has to send its `Handshake`.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared server state passed to each connection handler task.
///
/// No outer `Mutex`: the session manager and engine synchronize
/// internally, per username.
pub(crate) struct ServerState<S, C> {
    pub(crate) sessions: Arc<SessionManager<S>>,
    pub(crate) engine: RevealEngine<S>,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
    pub(crate) handshake_timeout: Duration,
    /// Reference point for envelope timestamps and `serverTime`.
    pub(crate) started: Instant,
}

impl<S, C> ServerState<S, C> {
    /// Milliseconds since the server started.
    pub(crate) fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Builder for configuring and starting a server.
///
/// # Example
///
/// ```rust,no_run
/// use mysterybox::prelude::*;
///
/// # async fn start() -> Result<(), MysteryBoxError> {
/// let server = MysteryBoxServerBuilder::new()
///     .bind("0.0.0.0:5000")
///     .session_config(SessionConfig { max_attempts: 3 })
///     .build(MemoryStore::new())
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MysteryBoxServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    reveal_config: RevealConfig,
    idle_timeout: Duration,
    handshake_timeout: Duration,
}

impl MysteryBoxServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            session_config: SessionConfig::default(),
            reveal_config: RevealConfig::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the attempt budget configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the board size and win probability.
    pub fn reveal_config(mut self, config: RevealConfig) -> Self {
        self.reveal_config = config;
        self
    }

    /// Sets how long a connection may stay silent.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets how long a new connection has to send its handshake.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Binds the listener and wires the layers over `store`.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    ///
    /// # Errors
    /// Fails if the reveal config is invalid or the address can't be bound.
    pub async fn build<S: SessionStore>(
        self,
        store: S,
    ) -> Result<MysteryBoxServer<S, JsonCodec>, MysteryBoxError> {
        let sessions = Arc::new(SessionManager::new(store, self.session_config));
        let engine = RevealEngine::new(Arc::clone(&sessions), self.reveal_config)?;
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            sessions,
            engine,
            codec: JsonCodec,
            idle_timeout: self.idle_timeout,
            handshake_timeout: self.handshake_timeout,
            started: Instant::now(),
        });

        Ok(MysteryBoxServer { transport, state })
    }
}

impl Default for MysteryBoxServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound, ready-to-run server.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct MysteryBoxServer<S, C> {
    transport: WebSocketTransport,
    state: Arc<ServerState<S, C>>,
}

impl<S, C> MysteryBoxServer<S, C>
where
    S: SessionStore,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The session manager, e.g. for inspecting budgets from outside.
    pub fn sessions(&self) -> Arc<SessionManager<S>> {
        Arc::clone(&self.state.sessions)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), MysteryBoxError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes, then flushes the
    /// session store.
    ///
    /// Connections already being served keep running on their own tasks;
    /// only new connections stop being accepted.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), MysteryBoxError> {
        tokio::pin!(shutdown);
        tracing::info!(addr = ?self.local_addr().ok(), "mystery box server running");

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested, no longer accepting");
                    break;
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(pending) => {
                        let state = Arc::clone(&self.state);
                        // Upgrade here, never on the accept loop.
                        tokio::spawn(async move {
                            let conn = match pending.establish().await {
                                Ok(conn) => conn,
                                Err(e) => {
                                    tracing::debug!(error = %e, "websocket upgrade failed");
                                    return;
                                }
                            };
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                },
            }
        }

        self.state.sessions.flush().await?;
        Ok(())
    }
}
