//! The polling transport handles the handshake, poll and push requests.

use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use tracing::debug;

use crate::{
    body::ResponseBody,
    engine::EngineIo,
    errors::Error,
    handler::EngineIoHandler,
    packet::{OpenPacket, Packet},
    payload,
    service::TransportType,
    sid::Sid,
    socket::DisconnectReason,
};

/// Create a plain text response for a polling request.
fn http_response<B, D>(code: StatusCode, data: D) -> Result<Response<ResponseBody<B>>, http::Error>
where
    D: Into<Bytes>,
{
    use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
    let body: Bytes = data.into();
    Response::builder()
        .status(code)
        .header(CONTENT_LENGTH, body.len())
        .header(CONTENT_TYPE, "text/plain; charset=UTF-8")
        .body(ResponseBody::custom_response(body))
}

/// Handshake: create a session and answer with the open packet.
pub fn open_req<H, B, R>(
    engine: Arc<EngineIo<H>>,
    req: Request<R>,
) -> Result<Response<ResponseBody<B>>, Error>
where
    H: EngineIoHandler,
    B: Send + 'static,
{
    let socket = engine.create_session(TransportType::Polling, req.into_parts().0);
    debug!("[sid={}] new polling session", socket.id);

    let packet = OpenPacket::new(TransportType::Polling, socket.id, &engine.config);
    let packet: String = Packet::Open(packet).try_into()?;
    Ok(http_response(StatusCode::OK, packet)?)
}

/// Poll request: drain the outbound queue into one payload, waiting for the
/// first packet if the queue is empty.
///
/// Only one poll may be pending per session; a concurrent GET gets a 400 and
/// the session is left untouched.
pub async fn polling_req<H, B>(
    engine: Arc<EngineIo<H>>,
    sid: Sid,
) -> Result<Response<ResponseBody<B>>, Error>
where
    H: EngineIoHandler,
    B: Send + 'static,
{
    let socket = engine.get_socket(sid).ok_or(Error::UnknownSessionID(sid))?;
    if !socket.is_http() {
        return Err(Error::TransportMismatch);
    }

    // A held lock means another poll is currently suspended on this session
    let rx = match socket.internal_rx.try_lock() {
        Ok(rx) => rx,
        Err(_) => {
            debug!("[sid={sid}] refusing concurrent polling request");
            return Err(Error::HttpErrorResponse(StatusCode::BAD_REQUEST));
        }
    };

    debug!("[sid={sid}] polling request");
    let data = payload::encoder(rx, engine.config.max_payload).await?;

    debug!("[sid={sid}] sending data: {:?}", data);
    Ok(http_response(StatusCode::OK, data)?)
}

/// Push request: decode the payload into packets and feed them to the
/// session. Framing errors close the session with a parse error.
pub async fn post_req<H, R, B>(
    engine: Arc<EngineIo<H>>,
    sid: Sid,
    req: Request<R>,
) -> Result<Response<ResponseBody<B>>, Error>
where
    H: EngineIoHandler,
    R: http_body::Body + Send + 'static,
    R::Error: std::fmt::Debug,
    R::Data: Send,
    B: Send + 'static,
{
    let socket = engine.get_socket(sid).ok_or(Error::UnknownSessionID(sid))?;
    if !socket.is_http() {
        return Err(Error::TransportMismatch);
    }

    let body = hyper::body::to_bytes(req.into_body()).await.map_err(|e| {
        debug!("[sid={sid}] error reading request body: {:?}", e);
        Error::HttpErrorResponse(StatusCode::BAD_REQUEST)
    })?;
    if body.len() as u64 > engine.config.max_payload {
        engine.close_session(sid, DisconnectReason::PacketParsingError);
        return Err(Error::PayloadTooLarge);
    }

    for packet in payload::decoder(&body) {
        match packet {
            Ok(Packet::Close) => {
                debug!("[sid={sid}] closing session");
                socket.send(Packet::Noop).ok();
                engine.close_session(sid, DisconnectReason::TransportClose);
                break;
            }
            Ok(Packet::Pong | Packet::Ping) => socket
                .heartbeat_tx
                .try_send(())
                .map_err(|_| Error::HeartbeatTimeout),
            Ok(Packet::Message(msg)) => {
                engine.handler.on_message(msg, socket.clone());
                Ok(())
            }
            Ok(Packet::Binary(bin)) => {
                engine.handler.on_binary(bin, socket.clone());
                Ok(())
            }
            Ok(p) => {
                debug!("[sid={sid}] bad packet received: {:?}", p);
                engine.close_session(sid, DisconnectReason::PacketParsingError);
                Err(Error::BadPacket(p))
            }
            Err(e) => {
                debug!("[sid={sid}] error parsing packet: {:?}", e);
                engine.close_session(sid, DisconnectReason::PacketParsingError);
                Err(e)
            }
        }?;
    }
    Ok(http_response(StatusCode::OK, "ok")?)
}
