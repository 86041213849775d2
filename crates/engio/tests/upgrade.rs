//! Tests for the polling to websocket upgrade handshake.

use std::time::Duration;

use engio::config::EngineIoConfig;
use futures::{SinkExt, StreamExt};
use http::{Method, StatusCode};
use tokio_tungstenite::tungstenite::Message;

use fixture::{create_polling_connection, create_server, create_ws_connection, send_req, EchoHandler};

#[tokio::test]
async fn upgrade_handshake() {
    let (handler, _rx) = EchoHandler::new();
    create_server(handler, EngineIoConfig::default(), 2101);
    let sid = create_polling_connection(2101).await.sid;

    let mut ws = create_ws_connection(2101, Some(&sid)).await;
    ws.send(Message::Text("2probe".to_string())).await.unwrap();
    let msg = ws.next().await.unwrap().unwrap();
    assert_eq!(msg, Message::Text("3probe".to_string()));
    ws.send(Message::Text("5".to_string())).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Polling requests for an upgraded session are refused
    let (status, _) = send_req(
        2101,
        format!("transport=polling&sid={sid}"),
        Method::GET,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The websocket is now authoritative
    ws.send(Message::Text("4hello".to_string())).await.unwrap();
    let msg = ws.next().await.unwrap().unwrap();
    assert_eq!(msg, Message::Text("4hello".to_string()));

    // A second websocket for the same sid is closed immediately
    let mut ws2 = create_ws_connection(2101, Some(&sid)).await;
    let closed = tokio::time::timeout(Duration::from_millis(500), async {
        loop {
            match ws2.next().await {
                None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
                Some(Ok(_)) => (),
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "second websocket should have been closed");
}

#[tokio::test]
async fn upgrade_requires_probe_first() {
    let (handler, _rx) = EchoHandler::new();
    create_server(handler, EngineIoConfig::default(), 2102);
    let sid = create_polling_connection(2102).await.sid;

    let mut ws = create_ws_connection(2102, Some(&sid)).await;
    ws.send(Message::Text("5".to_string())).await.unwrap();

    let closed = tokio::time::timeout(Duration::from_millis(500), async {
        loop {
            match ws.next().await {
                None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
                Some(Ok(_)) => (),
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "out of order upgrade should close the socket");
}

#[tokio::test]
async fn ws_direct_session() {
    let (handler, _rx) = EchoHandler::new();
    create_server(handler, EngineIoConfig::default(), 2103);

    let mut ws = create_ws_connection(2103, None).await;
    let msg = ws.next().await.unwrap().unwrap();
    let body = match msg {
        Message::Text(body) => body,
        m => panic!("expected an open packet, got {m:?}"),
    };
    assert!(body.starts_with('0'));
    // A websocket-origin session has nothing to upgrade to
    assert!(body.contains("\"upgrades\":[]"));

    ws.send(Message::Text("4hello".to_string())).await.unwrap();
    let msg = ws.next().await.unwrap().unwrap();
    assert_eq!(msg, Message::Text("4hello".to_string()));

    // Binary frames are binary message payloads
    ws.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
    let msg = ws.next().await.unwrap().unwrap();
    assert_eq!(msg, Message::Binary(vec![1, 2, 3]));
}

#[tokio::test]
async fn ws_unknown_sid_is_closed() {
    let (handler, _rx) = EchoHandler::new();
    create_server(handler, EngineIoConfig::default(), 2104);

    let mut ws = create_ws_connection(2104, Some("AAAAAAAAAAAAAAHs")).await;
    let closed = tokio::time::timeout(Duration::from_millis(500), async {
        loop {
            match ws.next().await {
                None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
                Some(Ok(_)) => (),
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "unknown sid should close the websocket");
}
