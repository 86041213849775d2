//! Acknowledgement flow in both directions.

use futures::SinkExt;
use serde_json::json;
use sockio::{AckError, NsBuilder, SockIo};
use tokio::sync::mpsc;

mod fixture;
use fixture::{create_server, next_sio, send_sio, sio_connect, ws_handshake};

#[tokio::test]
async fn client_ack_roundtrip() {
    let (svc, io) = SockIo::new_svc();
    io.ns(
        "/",
        NsBuilder::new()
            .on("message-with-ack", |_socket, data, _bin, ack| async move {
                if let Some(ack) = ack {
                    ack.send(data).ok();
                }
            })
            .build(),
    );
    create_server(svc, 3101);

    let mut ws = ws_handshake(3101).await;
    sio_connect(&mut ws, "0").await;

    send_sio(&mut ws, "2456[\"message-with-ack\",1,\"2\",{\"3\":[false]}]").await;
    let res = next_sio(&mut ws).await;
    assert_eq!(res, "3456[1,\"2\",{\"3\":[false]}]");
}

#[tokio::test]
async fn binary_ack() {
    let (svc, io) = SockIo::new_svc();
    io.ns(
        "/",
        NsBuilder::new()
            .on("message-with-ack", |_socket, data, bin, ack| async move {
                if let Some(ack) = ack {
                    ack.bin(bin).send(data).ok();
                }
            })
            .build(),
    );
    create_server(svc, 3102);

    let mut ws = ws_handshake(3102).await;
    sio_connect(&mut ws, "0").await;

    send_sio(&mut ws, "51-1[\"message-with-ack\",{\"_placeholder\":true,\"num\":0}]").await;
    ws.send(tokio_tungstenite::tungstenite::Message::Binary(vec![1, 2, 3]))
        .await
        .unwrap();

    let res = next_sio(&mut ws).await;
    assert_eq!(res, "61-1[{\"_placeholder\":true,\"num\":0}]");
    assert_eq!(fixture::next_binary(&mut ws).await, vec![1, 2, 3]);
}

#[tokio::test]
async fn server_initiated_ack() {
    let (ack_tx, mut ack_rx) = mpsc::channel(1);
    let (svc, io) = SockIo::new_svc();
    io.ns(
        "/",
        NsBuilder::new()
            .on("start", move |socket, _data, _bin, _ack| {
                let ack_tx = ack_tx.clone();
                async move {
                    let res = socket.emit_with_ack("question", json!(["q"])).await;
                    ack_tx.send(res).await.ok();
                }
            })
            .build(),
    );
    create_server(svc, 3103);

    let mut ws = ws_handshake(3103).await;
    sio_connect(&mut ws, "0").await;

    send_sio(&mut ws, "2[\"start\"]").await;
    // Ack ids are allocated from the socket's monotonic counter
    let res = next_sio(&mut ws).await;
    assert_eq!(res, "21[\"question\",\"q\"]");
    send_sio(&mut ws, "31[\"answer\"]").await;

    let ack = ack_rx.recv().await.unwrap().unwrap();
    assert_eq!(ack.data, json!(["answer"]));
}

#[tokio::test]
async fn server_ack_timeout() {
    let (ack_tx, mut ack_rx) = mpsc::channel(1);
    let (svc, io) = SockIo::builder()
        .ack_timeout(std::time::Duration::from_millis(50))
        .build_svc();
    io.ns(
        "/",
        NsBuilder::new()
            .on("start", move |socket, _data, _bin, _ack| {
                let ack_tx = ack_tx.clone();
                async move {
                    let res = socket.emit_with_ack("question", json!(["q"])).await;
                    ack_tx.send(res).await.ok();
                }
            })
            .build(),
    );
    create_server(svc, 3104);

    let mut ws = ws_handshake(3104).await;
    sio_connect(&mut ws, "0").await;

    send_sio(&mut ws, "2[\"start\"]").await;
    // Never answer the ack
    let res = ack_rx.recv().await.unwrap();
    assert!(matches!(res, Err(AckError::Timeout)));
}
