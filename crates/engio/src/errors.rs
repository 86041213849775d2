use http::{Response, StatusCode};
use tokio_tungstenite::tungstenite;
use tracing::debug;

use crate::{body::ResponseBody, packet::Packet, sid::Sid, socket::DisconnectReason};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("error serializing json packet: {0:?}")]
    Serialize(#[from] serde_json::Error),
    #[error("error decoding base64 packet: {0:?}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid utf-8 in packet: {0:?}")]
    StrUtf8(#[from] std::str::Utf8Error),
    #[error("io error: {0:?}")]
    Io(#[from] std::io::Error),
    #[error("invalid packet type: {0:?}")]
    InvalidPacketType(Option<char>),
    #[error("bad packet received: {0:?}")]
    BadPacket(Packet),
    #[error("payload exceeds the maxPayload limit")]
    PayloadTooLarge,
    #[error("ws transport error: {0:?}")]
    WsTransport(#[from] tungstenite::Error),
    #[error("http error: {0:?}")]
    Http(#[from] http::Error),
    #[error("unknown session id: {0}")]
    UnknownSessionID(Sid),
    #[error("transport mismatch")]
    TransportMismatch,
    #[error("heartbeat timeout")]
    HeartbeatTimeout,
    #[error("upgrade error")]
    UpgradeError,
    #[error("polling request aborted")]
    Aborted,

    #[error("http error response: {0:?}")]
    HttpErrorResponse(StatusCode),
}

/// Convert an [`Error`] into a [`DisconnectReason`] if it is fatal for the
/// session. A `None` result means the session can be kept alive.
impl From<&Error> for Option<DisconnectReason> {
    fn from(err: &Error) -> Self {
        use Error::*;
        match err {
            WsTransport(_) | Io(_) => Some(DisconnectReason::TransportError),
            BadPacket(_) | Base64(_) | StrUtf8(_) | Serialize(_) | PayloadTooLarge
            | InvalidPacketType(_) => Some(DisconnectReason::PacketParsingError),
            HeartbeatTimeout => Some(DisconnectReason::HeartbeatTimeout),
            _ => None,
        }
    }
}

/// Convert an error into an http response.
/// Transport protocol errors map to a 400, anything else is a 500.
impl<B> From<Error> for Response<ResponseBody<B>> {
    fn from(err: Error) -> Self {
        let status = match err {
            Error::HttpErrorResponse(code) => code,
            Error::UnknownSessionID(_)
            | Error::TransportMismatch
            | Error::UpgradeError
            | Error::PayloadTooLarge
            | Error::BadPacket(_)
            | Error::InvalidPacketType(_)
            | Error::Base64(_)
            | Error::StrUtf8(_)
            | Error::Serialize(_) => StatusCode::BAD_REQUEST,
            e => {
                debug!("uncaught error: {e:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Response::builder()
            .status(status)
            .body(ResponseBody::empty_response())
            .unwrap()
    }
}
