//! Wire-level tests for the long-polling transport.

use std::time::Duration;

use engio::config::EngineIoConfig;
use http::{Method, StatusCode};

use fixture::{create_polling_connection, create_server, send_req, short_config, EchoHandler};

#[tokio::test]
async fn polling_handshake() {
    let (handler, _rx) = EchoHandler::new();
    create_server(handler, EngineIoConfig::default(), 2001);

    let open = create_polling_connection(2001).await;
    assert_eq!(open.upgrades, ["websocket"]);
    assert_eq!(open.ping_interval, 25000);
    assert_eq!(open.ping_timeout, 20000);
    assert_eq!(open.max_payload, 1_000_000);
    assert!(!open.sid.is_empty());
}

#[tokio::test]
async fn polling_ping_pong() {
    let (handler, _rx) = EchoHandler::new();
    create_server(handler, short_config(), 2002);
    let sid = create_polling_connection(2002).await.sid;

    for _ in 0..3 {
        let (status, body) = send_req(
            2002,
            format!("transport=polling&sid={sid}"),
            Method::GET,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "2");

        let (status, body) = send_req(
            2002,
            format!("transport=polling&sid={sid}"),
            Method::POST,
            Some("3".to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }
}

#[tokio::test]
async fn polling_message_roundtrip() {
    let (handler, _rx) = EchoHandler::new();
    create_server(handler, EngineIoConfig::default(), 2003);
    let sid = create_polling_connection(2003).await.sid;

    let poll = tokio::spawn(send_req(
        2003,
        format!("transport=polling&sid={sid}"),
        Method::GET,
        None,
    ));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let (status, body) = send_req(
        2003,
        format!("transport=polling&sid={sid}"),
        Method::POST,
        Some("4hello".to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");

    let (status, body) = poll.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "4hello");
}

#[tokio::test]
async fn polling_forced_close() {
    let (handler, _rx) = EchoHandler::new();
    create_server(handler, EngineIoConfig::default(), 2004);
    let sid = create_polling_connection(2004).await.sid;

    // A poll is pending when the client pushes a close packet: the noop
    // releases it so the client sees the session end
    let poll = tokio::spawn(send_req(
        2004,
        format!("transport=polling&sid={sid}"),
        Method::GET,
        None,
    ));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let (status, _) = send_req(
        2004,
        format!("transport=polling&sid={sid}"),
        Method::POST,
        Some("1".to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = poll.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "6");

    let (status, _) = send_req(
        2004,
        format!("transport=polling&sid={sid}"),
        Method::GET,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn polling_second_get_rejected() {
    let (handler, _rx) = EchoHandler::new();
    create_server(handler, EngineIoConfig::default(), 2005);
    let sid = create_polling_connection(2005).await.sid;

    let pending = tokio::spawn(send_req(
        2005,
        format!("transport=polling&sid={sid}"),
        Method::GET,
        None,
    ));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let (status, _) = send_req(
        2005,
        format!("transport=polling&sid={sid}"),
        Method::GET,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The session survives: a message still reaches the pending poll
    send_req(
        2005,
        format!("transport=polling&sid={sid}"),
        Method::POST,
        Some("4still-alive".to_string()),
    )
    .await;
    let (status, body) = pending.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "4still-alive");
}

#[tokio::test]
async fn bad_requests_are_rejected() {
    let (handler, _rx) = EchoHandler::new();
    create_server(handler, EngineIoConfig::default(), 2006);

    // Protocol version must be 4; `send_req` already pins EIO=4 so go raw
    let req = hyper::Request::builder()
        .method(Method::GET)
        .uri("http://127.0.0.1:2006/socket.io/?EIO=3&transport=polling")
        .body(hyper::Body::empty())
        .unwrap();
    let res = hyper::Client::new().request(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Unknown transport
    let (status, _) = send_req(2006, "transport=grpc".to_string(), Method::GET, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Handshake must be a GET
    let (status, _) = send_req(2006, "transport=polling".to_string(), Method::POST, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown (but well formed) sid
    let (status, _) = send_req(
        2006,
        "transport=polling&sid=AAAAAAAAAAAAAAHs".to_string(),
        Method::GET,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unsupported method
    let (status, _) = send_req(
        2006,
        "transport=polling&sid=AAAAAAAAAAAAAAHs".to_string(),
        Method::PUT,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
