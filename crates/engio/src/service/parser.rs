//! Parser for Engine.IO request metadata. Everything is derived from the
//! query string so any host route can be aliased to the engine.

use std::{str::FromStr, sync::Arc};

use futures::Future;
use http::{Method, Request, Response};

use crate::{
    body::ResponseBody,
    engine::EngineIo,
    handler::EngineIoHandler,
    service::futures::ResponseFuture,
    sid::Sid,
    transport::{polling, ws},
};

/// Dispatch a request to the appropriate transport handler.
pub(crate) fn dispatch_req<F, H, ReqBody, ResBody>(
    req: Request<ReqBody>,
    engine: Arc<EngineIo<H>>,
) -> ResponseFuture<F, ResBody>
where
    ReqBody: http_body::Body + Send + 'static,
    ReqBody::Data: Send,
    ReqBody::Error: std::fmt::Debug,
    ResBody: Send + 'static,
    H: EngineIoHandler,
    F: Future,
{
    match RequestInfo::parse(&req) {
        Ok(RequestInfo {
            sid: None,
            transport: TransportType::Polling,
            method: Method::GET,
        }) => ResponseFuture::ready(polling::open_req(engine, req)),
        Ok(RequestInfo {
            sid: Some(sid),
            transport: TransportType::Polling,
            method: Method::GET,
        }) => ResponseFuture::async_response(Box::pin(polling::polling_req(engine, sid))),
        Ok(RequestInfo {
            sid: Some(sid),
            transport: TransportType::Polling,
            method: Method::POST,
        }) => ResponseFuture::async_response(Box::pin(polling::post_req(engine, sid, req))),
        Ok(RequestInfo {
            sid,
            transport: TransportType::Websocket,
            method: Method::GET,
        }) => ResponseFuture::ready(ws::new_req(engine, sid, req)),
        Err(e) => {
            tracing::debug!("error parsing request: {:?}", e);
            ResponseFuture::ready(Ok(e.into()))
        }
        _req => {
            tracing::debug!("invalid request: {:?}", _req);
            ResponseFuture::empty_response(400)
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("transport unknown")]
    UnknownTransport,
    #[error("bad handshake method")]
    BadHandshakeMethod,
    #[error("unsupported protocol version")]
    UnsupportedProtocolVersion,
}

/// Convert a [`ParseError`] into the matching 400 response, with the error
/// bodies the reference implementation sends.
impl<B> From<ParseError> for Response<ResponseBody<B>> {
    fn from(err: ParseError) -> Self {
        use ParseError::*;
        let conn_err_resp = |message: &'static str| {
            Response::builder()
                .status(400)
                .header("Content-Type", "application/json")
                .body(ResponseBody::custom_response(message))
                .unwrap()
        };
        match err {
            UnknownTransport => conn_err_resp("{\"code\":\"0\",\"message\":\"Transport unknown\"}"),
            BadHandshakeMethod => {
                conn_err_resp("{\"code\":\"2\",\"message\":\"Bad handshake method\"}")
            }
            UnsupportedProtocolVersion => {
                conn_err_resp("{\"code\":\"5\",\"message\":\"Unsupported protocol version\"}")
            }
        }
    }
}

/// The transport type requested by the client.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransportType {
    Polling = 0x01,
    Websocket = 0x02,
}

impl FromStr for TransportType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "polling" => Ok(TransportType::Polling),
            "websocket" => Ok(TransportType::Websocket),
            _ => Err(ParseError::UnknownTransport),
        }
    }
}

impl From<TransportType> for &'static str {
    fn from(t: TransportType) -> Self {
        match t {
            TransportType::Polling => "polling",
            TransportType::Websocket => "websocket",
        }
    }
}

/// The request metadata extracted from the query string.
#[derive(Debug)]
struct RequestInfo {
    /// The session id if present in the request.
    sid: Option<Sid>,
    /// The transport requested by the client.
    transport: TransportType,
    /// The request method.
    method: Method,
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|s| s.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

impl RequestInfo {
    fn parse<B>(req: &Request<B>) -> Result<Self, ParseError> {
        use ParseError::*;
        let query = req.uri().query().ok_or(UnknownTransport)?;

        // Only the v4 revision of the protocol is supported
        match query_param(query, "EIO") {
            Some("4") => (),
            _ => return Err(UnsupportedProtocolVersion),
        }

        let transport: TransportType = query_param(query, "transport")
            .ok_or(UnknownTransport)
            .and_then(|t| t.parse())?;

        let sid: Option<Sid> = query_param(query, "sid").and_then(|s| s.parse().ok());

        let method = req.method().clone();
        if method != Method::GET && sid.is_none() {
            Err(BadHandshakeMethod)
        } else {
            Ok(RequestInfo {
                sid,
                transport,
                method,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_request(path: &str) -> Request<()> {
        Request::get(path).body(()).unwrap()
    }

    #[test]
    fn request_info_polling() {
        let req = build_request("http://localhost:3000/socket.io/?EIO=4&transport=polling");
        let info = RequestInfo::parse(&req).unwrap();
        assert_eq!(info.sid, None);
        assert_eq!(info.transport, TransportType::Polling);
        assert_eq!(info.method, Method::GET);
    }

    #[test]
    fn request_info_websocket_with_sid() {
        let req = build_request(
            "http://localhost:3000/socket.io/?EIO=4&transport=websocket&sid=AAAAAAAAAAAAAAHs",
        );
        let info = RequestInfo::parse(&req).unwrap();
        assert_eq!(info.sid, Some("AAAAAAAAAAAAAAHs".parse().unwrap()));
        assert_eq!(info.transport, TransportType::Websocket);
    }

    #[test]
    fn any_path_is_accepted() {
        let req = build_request("http://localhost/testsuitesocket.io/?EIO=4&transport=polling");
        let info = RequestInfo::parse(&req).unwrap();
        assert_eq!(info.transport, TransportType::Polling);
    }

    #[test]
    fn transport_unknown_err() {
        let req = build_request("http://localhost:3000/socket.io/?EIO=4&transport=grpc");
        let err = RequestInfo::parse(&req).unwrap_err();
        assert!(matches!(err, ParseError::UnknownTransport));
    }

    #[test]
    fn unsupported_protocol_version() {
        let req = build_request("http://localhost:3000/socket.io/?EIO=3&transport=polling");
        let err = RequestInfo::parse(&req).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedProtocolVersion));

        let req = build_request("http://localhost:3000/socket.io/?transport=polling");
        let err = RequestInfo::parse(&req).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedProtocolVersion));
    }

    #[test]
    fn bad_handshake_method() {
        let req = Request::post("http://localhost:3000/socket.io/?EIO=4&transport=polling")
            .body(())
            .unwrap();
        let err = RequestInfo::parse(&req).unwrap_err();
        assert!(matches!(err, ParseError::BadHandshakeMethod));
    }
}
