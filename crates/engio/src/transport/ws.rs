//! The websocket transport handles direct websocket sessions and the upgrade
//! of existing polling sessions.

use std::sync::Arc;

use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt, TryStreamExt,
};
use http::{HeaderValue, Request, Response, StatusCode};
use hyper::upgrade::Upgraded;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    tungstenite::{handshake::derive_accept_key, protocol::Role, Message},
    WebSocketStream,
};
use tracing::debug;

use crate::{
    body::ResponseBody,
    config::EngineIoConfig,
    engine::EngineIo,
    errors::Error,
    handler::EngineIoHandler,
    packet::{OpenPacket, Packet},
    service::TransportType,
    sid::Sid,
    socket::{DisconnectReason, Socket},
};

/// Create the 101 response accepting the websocket upgrade.
fn ws_response<B>(ws_key: &HeaderValue) -> Result<Response<ResponseBody<B>>, http::Error> {
    use http::header::{CONNECTION, SEC_WEBSOCKET_ACCEPT, UPGRADE};
    let derived = derive_accept_key(ws_key.as_bytes());
    let sec = derived.parse::<HeaderValue>().unwrap();
    Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(UPGRADE, HeaderValue::from_static("websocket"))
        .header(CONNECTION, HeaderValue::from_static("Upgrade"))
        .header(SEC_WEBSOCKET_ACCEPT, sec)
        .body(ResponseBody::empty_response())
}

/// Accept a websocket request.
///
/// Without a sid a fresh session is created. With a sid the request enters
/// the upgrade handshake for the matching polling session.
pub fn new_req<H: EngineIoHandler, R, B>(
    engine: Arc<EngineIo<H>>,
    sid: Option<Sid>,
    req: Request<R>,
) -> Result<Response<ResponseBody<B>>, Error> {
    let (parts, _) = req.into_parts();
    let ws_key = parts
        .headers
        .get("Sec-WebSocket-Key")
        .ok_or(Error::HttpErrorResponse(StatusCode::BAD_REQUEST))?
        .clone();
    let req_parts = clone_parts(&parts);

    let req = Request::from_parts(parts, ());
    tokio::spawn(async move {
        match hyper::upgrade::on(req).await {
            Ok(conn) => match on_init(engine, conn, sid, req_parts).await {
                Ok(_) => debug!("ws closed"),
                Err(e) => debug!("ws closed with error: {:?}", e),
            },
            Err(e) => debug!("ws upgrade error: {}", e),
        }
    });

    Ok(ws_response(&ws_key)?)
}

/// Copy the request metadata kept as the session's peer info. `Parts` is not
/// `Clone` and the original is consumed by the hyper upgrade.
fn clone_parts(parts: &http::request::Parts) -> http::request::Parts {
    let mut req = Request::builder()
        .method(parts.method.clone())
        .uri(parts.uri.clone())
        .body(())
        .unwrap();
    *req.headers_mut() = parts.headers.clone();
    req.into_parts().0
}

/// Drive a fully upgraded websocket connection.
///
/// Sends an open packet unless this is an upgrade from polling, then reads
/// packets until the connection is closed.
async fn on_init<H: EngineIoHandler>(
    engine: Arc<EngineIo<H>>,
    conn: Upgraded,
    sid: Option<Sid>,
    req_parts: http::request::Parts,
) -> Result<(), Error> {
    let ws_init = move || WebSocketStream::from_raw_socket(conn, Role::Server, None);
    let (socket, ws) = if let Some(sid) = sid {
        match engine.get_socket(sid) {
            None => return Err(Error::UnknownSessionID(sid)),
            // A session may hold one websocket at most, drop the second one
            Some(socket) if socket.is_ws() || socket.is_upgrading() => {
                return Err(Error::UpgradeError)
            }
            Some(socket) => {
                debug!("[sid={sid}] websocket upgrade");
                let mut ws = ws_init().await;
                upgrade_handshake(&socket, &mut ws).await?;
                (socket, ws)
            }
        }
    } else {
        let socket = engine.create_session(TransportType::Websocket, req_parts);
        debug!("[sid={}] new websocket session", socket.id);
        let mut ws = ws_init().await;
        init_handshake(socket.id, &mut ws, &engine.config).await?;
        (socket, ws)
    };

    let (tx, rx) = ws.split();
    let rx_handle = forward_to_socket(socket.clone(), tx);

    if let Err(ref e) = forward_to_handler(&engine, rx, &socket).await {
        debug!("[sid={}] error while handling packet: {:?}", socket.id, e);
        if let Some(reason) = e.into() {
            engine.close_session(socket.id, reason);
        }
    } else {
        engine.close_session(socket.id, DisconnectReason::TransportClose);
    }
    rx_handle.abort();
    Ok(())
}

/// Forward packets received on the websocket to the session.
async fn forward_to_handler<H: EngineIoHandler>(
    engine: &Arc<EngineIo<H>>,
    mut rx: SplitStream<WebSocketStream<Upgraded>>,
    socket: &Arc<Socket<H::Data>>,
) -> Result<(), Error> {
    while let Some(msg) = rx.try_next().await? {
        match msg {
            Message::Text(msg) => match Packet::try_from(msg)? {
                Packet::Close => {
                    debug!("[sid={}] closing session", socket.id);
                    engine.close_session(socket.id, DisconnectReason::TransportClose);
                    break;
                }
                Packet::Pong | Packet::Ping => socket
                    .heartbeat_tx
                    .try_send(())
                    .map_err(|_| Error::HeartbeatTimeout),
                Packet::Message(msg) => {
                    engine.handler.on_message(msg, socket.clone());
                    Ok(())
                }
                p => return Err(Error::BadPacket(p)),
            },
            Message::Binary(data) => {
                engine.handler.on_binary(data.into(), socket.clone());
                Ok(())
            }
            Message::Close(_) => break,
            // tungstenite answers ws-level ping/pong frames on its own
            _ => Ok(()),
        }?
    }
    Ok(())
}

/// Writer task draining the outbound queue into the websocket.
///
/// The stream is only flushed once the queue is empty so adjacent packets
/// share a single syscall when possible.
fn forward_to_socket<D: Default + Send + Sync + 'static>(
    socket: Arc<Socket<D>>,
    mut tx: SplitSink<WebSocketStream<Upgraded>, Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rx = socket.internal_rx.lock().await;
        'conn: while let Some(first) = rx.recv().await {
            let mut bufs = vec![first];
            while let Ok(buf) = rx.try_recv() {
                bufs.push(buf);
            }

            for packet in bufs.into_iter().flatten() {
                let res = match packet {
                    Packet::Binary(bin) => tx.feed(Message::Binary(bin.to_vec())).await,
                    Packet::Close => {
                        tx.send(Message::Close(None)).await.ok();
                        rx.close();
                        break 'conn;
                    }
                    // A leftover noop from the upgrade drain has no meaning
                    // on the websocket
                    Packet::Noop => Ok(()),
                    packet => {
                        let packet: String = packet.try_into().unwrap();
                        tx.feed(Message::Text(packet)).await
                    }
                };
                if let Err(e) = res {
                    debug!("[sid={}] error sending packet: {}", socket.id, e);
                }
            }
            tx.flush().await.ok();
        }
    })
}

/// Send the open packet on a fresh websocket session.
async fn init_handshake(
    sid: Sid,
    ws: &mut WebSocketStream<Upgraded>,
    config: &EngineIoConfig,
) -> Result<(), Error> {
    let packet = Packet::Open(OpenPacket::new(TransportType::Websocket, sid, config));
    ws.send(Message::Text(packet.try_into()?)).await?;
    Ok(())
}

/// Upgrade a polling session to this websocket.
///
/// ```text
/// CLIENT                                                 SERVER
///│   GET /socket.io/?EIO=4&transport=websocket&sid=...  │
///│ ───────────────────────────────────────────────────► │
///│  ◄─────────────────────────────────────────────────┘ │
///│            HTTP 101 (WebSocket handshake)            │
///│  ─────────────────────────────────────────────────►  │
///│                         2probe                       │ (ping packet)
///│  ◄─────────────────────────────────────────────────  │
///│                         3probe                       │ (pong packet)
///│  ─────────────────────────────────────────────────►  │
///│                         5                            │ (upgrade packet)
/// ```
///
/// A noop is queued first so any pending polling request completes and the
/// client can switch over; the outbound queue is handed to the websocket
/// once the polling side released it.
async fn upgrade_handshake<D: Default + Send + Sync + 'static>(
    socket: &Arc<Socket<D>>,
    ws: &mut WebSocketStream<Upgraded>,
) -> Result<(), Error> {
    socket.start_upgrade();
    let res = probe_handshake(socket, ws).await;
    if res.is_err() {
        socket.cancel_upgrade();
    }
    res
}

async fn probe_handshake<D: Default + Send + Sync + 'static>(
    socket: &Arc<Socket<D>>,
    ws: &mut WebSocketStream<Upgraded>,
) -> Result<(), Error> {
    socket.send(Packet::Noop).ok();

    // The first message must be the probe ping
    let msg = match ws.next().await {
        Some(Ok(Message::Text(d))) => d,
        _ => return Err(Error::UpgradeError),
    };
    match Packet::try_from(msg)? {
        Packet::PingProbe => {
            ws.send(Message::Text(Packet::PongProbe.try_into()?)).await?;
        }
        p => return Err(Error::BadPacket(p)),
    };

    // Then the upgrade packet
    let msg = match ws.next().await {
        Some(Ok(Message::Text(d))) => d,
        _ => {
            debug!("ws stream closed or invalid before upgrade");
            return Err(Error::UpgradeError);
        }
    };
    match Packet::try_from(msg)? {
        Packet::Upgrade => debug!("[sid={}] ws upgrade successful", socket.id),
        p => return Err(Error::BadPacket(p)),
    };

    // Wait for any suspended poll to finish before taking over the queue
    let _ = socket.internal_rx.lock().await;
    socket.upgrade_to_websocket();
    Ok(())
}
