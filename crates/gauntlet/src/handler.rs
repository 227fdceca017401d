//! Per-connection handler: handshake, auth, and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `hello` → validate version
//!   2. Authenticate token → get an [`Identity`]
//!   3. Send `welcome` → register with the arena actor
//!   4. Loop: decode client events and forward them; write whatever the
//!      arena addresses to this connection

use std::sync::Arc;
use std::time::Duration;

use gauntlet_protocol::{ClientEvent, Codec, PROTOCOL_VERSION, ProtocolError, ServerEvent};
use gauntlet_session::{Authenticator, Identity};
use gauntlet_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::GauntletError;
use crate::server::{Command, ServerState};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Drop guard that tells the arena the socket is gone when the handler
/// exits, even on an error path.
struct CloseGuard {
    connection: ConnectionId,
    commands: mpsc::UnboundedSender<Command>,
}

impl Drop for CloseGuard {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Closed {
            connection: self.connection,
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, C>>,
) -> Result<(), GauntletError>
where
    A: Authenticator,
    C: Codec,
{
    let connection = conn.id();
    tracing::debug!(%connection, "handling new connection");

    let identity = perform_handshake(&conn, &state).await?;
    let display_name = if identity.display_name.trim().is_empty() {
        format!("Player_{}", identity.user_id)
    } else {
        identity.display_name
    };
    tracing::info!(%connection, user_id = identity.user_id, "player authenticated");

    let (outbox, mut inbox) = mpsc::unbounded_channel();
    state
        .commands
        .send(Command::Connect {
            connection,
            display_name,
            outbox,
        })
        .map_err(|_| GauntletError::ArenaClosed)?;
    let _guard = CloseGuard {
        connection,
        commands: state.commands.clone(),
    };

    loop {
        tokio::select! {
            received = conn.recv() => {
                let data = match received {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%connection, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%connection, error = %e, "recv error");
                        break;
                    }
                };

                let event: ClientEvent = match state.codec.decode(&data) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::debug!(%connection, error = %e, "malformed frame dropped");
                        continue;
                    }
                };

                match event {
                    ClientEvent::Hello { .. } => {
                        tracing::debug!(%connection, "duplicate hello ignored");
                    }
                    ClientEvent::Disconnect => {
                        tracing::info!(%connection, "client disconnected");
                        break;
                    }
                    event => {
                        state
                            .commands
                            .send(Command::Event { connection, event })
                            .map_err(|_| GauntletError::ArenaClosed)?;
                    }
                }
            }
            outbound = inbox.recv() => {
                let Some(event) = outbound else {
                    break;
                };
                let bytes = state.codec.encode(&event)?;
                conn.send(&bytes).await?;
            }
        }
    }

    let _ = conn.close().await;
    // _guard drops here → the arena runs its disconnect path.
    Ok(())
}

/// Performs the initial handshake: receive `hello`, validate, auth, send
/// `welcome`.
async fn perform_handshake<A, C>(
    conn: &WebSocketConnection,
    state: &ServerState<A, C>,
) -> Result<Identity, GauntletError>
where
    A: Authenticator,
    C: Codec,
{
    let data = match tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv()).await {
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

    let (version, token) = match state.codec.decode::<ClientEvent>(&data) {
        Ok(ClientEvent::Hello { version, token }) => (version, token),
        _ => {
            send_error(conn, &state.codec, 400, "expected hello").await?;
            return Err(
                ProtocolError::InvalidMessage("first message must be hello".into()).into(),
            );
        }
    };

    if version != PROTOCOL_VERSION {
        send_error(
            conn,
            &state.codec,
            400,
            &format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
        )
        .await?;
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }

    let identity = match state.auth.authenticate(token.as_deref().unwrap_or("")).await {
        Ok(identity) => identity,
        Err(e) => {
            send_error(conn, &state.codec, 401, "unauthorized").await?;
            return Err(e.into());
        }
    };

    let welcome = ServerEvent::Welcome {
        connection_id: conn.id().into_inner(),
        protocol_version: PROTOCOL_VERSION,
    };
    conn.send(&state.codec.encode(&welcome)?).await?;

    Ok(identity)
}

/// Sends an `error` event to the client.
async fn send_error(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    code: u16,
    message: &str,
) -> Result<(), GauntletError> {
    let event = ServerEvent::Error {
        code,
        message: message.to_string(),
    };
    let bytes = codec.encode(&event)?;
    conn.send(&bytes).await?;
    Ok(())
}
