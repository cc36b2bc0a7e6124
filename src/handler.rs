//! WebSocket connection handler
//!
//! Handles individual connections: the upgrade handshake (including the
//! display name header), registration with the hub, and the reader/writer
//! pump pair bridging the socket to the session.
//!
//! Both pumps share one cancellation token. Whichever pump stops first
//! cancels it and the other observes it and returns. Teardown runs once,
//! after both pumps have returned.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::command::normalize;
use crate::config::ConnectionSettings;
use crate::error::AppError;
use crate::hub::Hub;
use crate::session::Session;

/// Request header carrying the display name
pub const PLAYER_NAME_HEADER: &str = "PlayerName";

/// Handle a new connection
///
/// Performs the WebSocket handshake, registers the session and runs the
/// pump pair until the connection ends or `shutdown` is cancelled.
pub async fn handle_connection<S>(
    stream: S,
    peer_addr: SocketAddr,
    hub: Arc<Hub>,
    settings: Arc<ConnectionSettings>,
    shutdown: CancellationToken,
) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    debug!("New TCP connection from {}", peer_addr);

    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(settings.max_message_size);
    ws_config.max_frame_size = Some(settings.max_message_size);

    // WebSocket handshake, bounded by the write deadline and by shutdown
    let mut player_name = None;
    let handshake = tokio_tungstenite::accept_hdr_async_with_config(
        stream,
        |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            let name = check_upgrade(req, &settings.path, &hub)?;
            player_name = Some(name);
            Ok(resp)
        },
        Some(ws_config),
    );
    let mut ws_stream = tokio::select! {
        _ = shutdown.cancelled() => {
            debug!("Shutdown before handshake with {} completed", peer_addr);
            return Ok(());
        }
        result = timeout(settings.write_wait, handshake) => match result {
            Ok(ws_stream) => ws_stream?,
            Err(_) => {
                warn!("Handshake with {} timed out", peer_addr);
                return Ok(());
            }
        },
    };

    let Some(name) = player_name else {
        return Ok(());
    };

    let (session, outbox) = Session::new(name, peer_addr.to_string(), settings.mailbox_capacity);
    let session = Arc::new(session);

    // Lost a registration race for the same name after the handshake check
    if let Err(e) = hub.register(Arc::clone(&session)) {
        session.mailbox().close();
        if let Err(close_err) = ws_stream.close(None).await {
            debug!("Could not close rejected connection: {}", close_err);
        }
        return Err(e);
    }

    info!(session = %session.id(), "Client {} connected from {}", session.name(), peer_addr);

    serve_session(
        ws_stream,
        session,
        outbox,
        &hub,
        &settings,
        shutdown.child_token(),
    )
    .await;

    Ok(())
}

/// Validate an upgrade request and extract the display name
fn check_upgrade(req: &Request, path: &str, hub: &Hub) -> Result<String, ErrorResponse> {
    if req.uri().path() != path {
        return Err(reject(StatusCode::NOT_FOUND, "not found"));
    }

    let name = req
        .headers()
        .get(PLAYER_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            warn!("Player name not found in headers");
            reject(StatusCode::BAD_REQUEST, "player name required")
        })?;

    if hub.is_name_taken(name) {
        warn!("Player name '{}' already in use", name);
        return Err(reject(StatusCode::CONFLICT, "player name already in use"));
    }

    Ok(name.to_string())
}

fn reject(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut resp = ErrorResponse::new(Some(reason.to_string()));
    *resp.status_mut() = status;
    resp
}

/// Run the pump pair for a registered session, then tear it down
///
/// Teardown order: the writer drops its keep-alive timer on exit, then the
/// mailbox is closed, the session unregistered (destroying or leaving its
/// lobby) and the socket released.
pub async fn serve_session<S>(
    ws_stream: WebSocketStream<S>,
    session: Arc<Session>,
    outbox: mpsc::Receiver<String>,
    hub: &Hub,
    settings: &ConnectionSettings,
    cancel: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (sink, stream) = ws_stream.split();

    tokio::join!(
        read_pump(stream, &session, hub, settings.pong_wait, &cancel),
        write_pump(sink, outbox, settings, &cancel),
    );

    session.mailbox().close();
    hub.unregister(&session);

    info!(session = %session.id(), "Client {} disconnected", session.name());
}

/// Inbound pump: socket -> command handler
async fn read_pump<R>(
    mut stream: R,
    session: &Arc<Session>,
    hub: &Hub,
    pong_wait: Duration,
    cancel: &CancellationToken,
) where
    R: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        // Any inbound frame, pongs included, renews the deadline
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = timeout(pong_wait, stream.next()) => next,
        };

        match next {
            Err(_) => {
                debug!(session = %session.id(), "Read deadline expired");
                break;
            }
            Ok(None) => {
                debug!(session = %session.id(), "Stream ended");
                break;
            }
            Ok(Some(Err(e))) => {
                debug!(session = %session.id(), "WebSocket read error: {}", e);
                break;
            }
            Ok(Some(Ok(msg))) => match msg {
                Message::Text(text) => session.handle_input(hub, &normalize(&text)),
                Message::Binary(data) => {
                    session.handle_input(hub, &normalize(&String::from_utf8_lossy(&data)))
                }
                Message::Ping(_) | Message::Pong(_) => {
                    trace!(session = %session.id(), "Keep-alive frame");
                }
                Message::Close(_) => {
                    debug!(session = %session.id(), "Client sent close frame");
                    break;
                }
                Message::Frame(_) => {}
            },
        }
    }

    cancel.cancel();
    debug!(session = %session.id(), "Read pump ended");
}

/// Outbound pump: mailbox -> socket, plus keep-alive pings
async fn write_pump<W>(
    mut sink: W,
    mut outbox: mpsc::Receiver<String>,
    settings: &ConnectionSettings,
    cancel: &CancellationToken,
) where
    W: Sink<Message, Error = WsError> + Unpin,
{
    let mut ticker = interval_at(Instant::now() + settings.ping_period, settings.ping_period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = outbox.recv() => {
                let Some(text) = msg else {
                    debug!("Mailbox closed by producer");
                    break;
                };
                if let Err(e) = send_with_deadline(&mut sink, Message::Text(text), settings.write_wait).await {
                    debug!("Could not write message: {}", e);
                    break;
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = send_with_deadline(&mut sink, Message::Ping(Vec::new()), settings.write_wait).await {
                    debug!("Could not write ping: {}", e);
                    break;
                }
            }
        }
    }

    cancel.cancel();

    // Send close frame when done
    match timeout(settings.write_wait, sink.close()).await {
        Ok(Err(e)) => debug!("Could not close socket: {}", e),
        Err(_) => debug!("Timed out closing socket"),
        Ok(Ok(())) => {}
    }
    debug!("Write pump ended");
}

async fn send_with_deadline<W>(sink: &mut W, msg: Message, deadline: Duration) -> Result<(), AppError>
where
    W: Sink<Message, Error = WsError> + Unpin,
{
    match timeout(deadline, sink.send(msg)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "write deadline exceeded",
        )
        .into()),
    }
}
