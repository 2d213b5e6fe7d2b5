//! Per-connection handler: handshake, then request/reply.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake → check version → send HandshakeAck
//!   2. Loop: receive a request → run it → send exactly one reply
//!
//! A failed request is answered with an `Error` reply and the loop goes
//! on; only transport failures, timeouts and `Disconnect` end it.

use std::sync::Arc;

use mysterybox_protocol::{
    ClientMessage, Codec, Envelope, ErrorKind, PROTOCOL_VERSION, ProtocolError, ServerMessage,
};
use mysterybox_session::{SessionStore, Username};
use mysterybox_transport::{Connection, WebSocketConnection};

use crate::MysteryBoxError;
use crate::server::ServerState;

/// Numbers and sends replies on one connection.
struct Outbox<'a, S, C> {
    conn: &'a WebSocketConnection,
    state: &'a ServerState<S, C>,
    seq: u64,
}

impl<S, C: Codec> Outbox<'_, S, C> {
    async fn send(&mut self, message: ServerMessage) -> Result<(), MysteryBoxError> {
        let envelope = Envelope::new(self.seq, self.state.elapsed_ms(), message);
        self.seq += 1;
        let bytes = self.state.codec.encode(&envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }

    async fn send_error(&mut self, err: &MysteryBoxError) -> Result<(), MysteryBoxError> {
        let kind = err.kind();
        self.send(ServerMessage::Error {
            code: kind.code(),
            kind,
            message: err.to_string(),
        })
        .await
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<S, C>>,
) -> Result<(), MysteryBoxError>
where
    S: SessionStore,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let mut outbox = Outbox {
        conn: &conn,
        state: state.as_ref(),
        seq: 0,
    };

    // --- Step 1: Handshake ---
    perform_handshake(&conn, &state, &mut outbox).await?;
    tracing::info!(%conn_id, "client connected");

    // --- Step 2: Request loop ---
    loop {
        let data = match tokio::time::timeout(state.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%conn_id, "connection idle, closing");
                let _ = conn.close().await;
                break;
            }
        };

        let envelope: Envelope<ClientMessage> = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                outbox.send_error(&e.into()).await?;
                continue;
            }
        };

        match envelope.message {
            ClientMessage::Disconnect { reason } => {
                tracing::info!(%conn_id, %reason, "client disconnected");
                break;
            }
            ClientMessage::Handshake { .. } => {
                let err = ProtocolError::InvalidMessage("handshake already completed".into());
                outbox.send_error(&err.into()).await?;
            }
            request => match respond(&state, request).await {
                Ok(reply) => outbox.send(reply).await?,
                Err(e) => {
                    if e.kind() == ErrorKind::Unavailable {
                        tracing::warn!(%conn_id, error = %e, "request failed");
                    } else {
                        tracing::debug!(%conn_id, error = %e, "request rejected");
                    }
                    outbox.send_error(&e).await?;
                }
            },
        }
    }

    Ok(())
}

/// Receives the first message and accepts it only if it is a
/// `Handshake` with the right version.
async fn perform_handshake<S, C>(
    conn: &WebSocketConnection,
    state: &ServerState<S, C>,
    outbox: &mut Outbox<'_, S, C>,
) -> Result<(), MysteryBoxError>
where
    S: SessionStore,
    C: Codec,
{
    let data = match tokio::time::timeout(state.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before handshake".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let envelope: Envelope<ClientMessage> = match state.codec.decode(&data) {
        Ok(env) => env,
        Err(e) => {
            let err = MysteryBoxError::from(e);
            outbox.send_error(&err).await?;
            return Err(err);
        }
    };

    let version = match envelope.message {
        ClientMessage::Handshake { version } => version,
        _ => {
            let err: MysteryBoxError =
                ProtocolError::InvalidMessage("first message must be Handshake".into()).into();
            outbox.send_error(&err).await?;
            return Err(err);
        }
    };

    if version != PROTOCOL_VERSION {
        let err: MysteryBoxError = ProtocolError::InvalidMessage(format!(
            "version mismatch: expected {PROTOCOL_VERSION}, got {version}"
        ))
        .into();
        outbox.send_error(&err).await?;
        return Err(err);
    }

    outbox
        .send(ServerMessage::HandshakeAck {
            server_time: state.elapsed_ms(),
            total_boxes: state.engine.config().total_boxes,
            max_attempts: state.sessions.config().max_attempts,
        })
        .await
}

/// Runs one request against the session manager / reveal engine.
async fn respond<S, C>(
    state: &ServerState<S, C>,
    request: ClientMessage,
) -> Result<ServerMessage, MysteryBoxError>
where
    S: SessionStore,
{
    let reply = match request {
        ClientMessage::Register { username } => {
            let session = state.sessions.create(&username).await?;
            ServerMessage::Registered {
                username: session.username.to_string(),
                round_id: session.round_id.to_string(),
                remaining_attempts: session.remaining_attempts,
            }
        }

        ClientMessage::SelectBox {
            username,
            box_number,
        } => {
            let username = Username::parse(&username)?;
            let box_number = state.engine.config().check_box(box_number)?;
            let result = state.engine.select(&username, box_number).await?;
            ServerMessage::Revealed {
                box_number: result.box_number,
                won: result.won,
                remaining_attempts: result.remaining_attempts,
            }
        }

        ClientMessage::Status { username } => {
            let username = Username::parse(&username)?;
            let session = state.sessions.session(&username).await?;
            ServerMessage::Status {
                exhausted: session.is_exhausted(),
                remaining_attempts: session.remaining_attempts,
                username: session.username.into(),
            }
        }

        ClientMessage::Ping => ServerMessage::pong(),

        ClientMessage::Handshake { .. } | ClientMessage::Disconnect { .. } => {
            return Err(ProtocolError::InvalidMessage(
                "not a request message".into(),
            )
            .into());
        }
    };
    Ok(reply)
}
