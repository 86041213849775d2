//! Room membership and broadcast fan-out across several clients.

use std::time::Duration;

use serde_json::json;
use sockio::{NsBuilder, SockIo};

mod fixture;
use fixture::{create_server, next_sio, send_sio, sio_connect, ws_handshake, Ws};

fn room_server(port: u16) -> SockIo {
    let (svc, io) = SockIo::new_svc();
    io.ns(
        "/",
        NsBuilder::new()
            .on("join", |socket, data, _bin, _ack| async move {
                let room = data[0].as_str().unwrap().to_string();
                socket.join(room);
                socket.emit("joined", json!([socket.rooms().len()])).ok();
            })
            .on("leave", |socket, data, _bin, _ack| async move {
                let room = data[0].as_str().unwrap().to_string();
                socket.leave(room);
            })
            .on("send", |socket, data, _bin, _ack| async move {
                let room = data[0].as_str().unwrap().to_string();
                socket.to(room).emit("hello", json!(["to the room"])).ok();
            })
            .on("send-all", |socket, _data, _bin, _ack| async move {
                socket.broadcast().emit("hello", json!(["to everyone"])).ok();
            })
            .build(),
    );
    create_server(svc, port);
    io
}

async fn join(ws: &mut Ws, room: &str) {
    send_sio(ws, &format!("2[\"join\",\"{room}\"]")).await;
    let res = next_sio(ws).await;
    assert!(res.starts_with("2[\"joined\""), "unexpected response {res:?}");
}

async fn assert_silent(ws: &mut Ws) {
    let res = tokio::time::timeout(Duration::from_millis(100), next_sio(ws)).await;
    assert!(res.is_err(), "expected no packet, got {res:?}");
}

#[tokio::test]
async fn room_broadcast_skips_the_sender() {
    room_server(3401);

    let mut a = ws_handshake(3401).await;
    sio_connect(&mut a, "0").await;
    let mut b = ws_handshake(3401).await;
    sio_connect(&mut b, "0").await;
    let mut c = ws_handshake(3401).await;
    sio_connect(&mut c, "0").await;

    join(&mut a, "room1").await;
    join(&mut b, "room1").await;
    // c stays out of the room

    send_sio(&mut a, "2[\"send\",\"room1\"]").await;
    assert_eq!(next_sio(&mut b).await, "2[\"hello\",\"to the room\"]");
    assert_silent(&mut a).await;
    assert_silent(&mut c).await;
}

#[tokio::test]
async fn leave_stops_delivery() {
    room_server(3402);

    let mut a = ws_handshake(3402).await;
    sio_connect(&mut a, "0").await;
    let mut b = ws_handshake(3402).await;
    sio_connect(&mut b, "0").await;

    join(&mut a, "room1").await;
    join(&mut b, "room1").await;

    send_sio(&mut b, "2[\"leave\",\"room1\"]").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    send_sio(&mut a, "2[\"send\",\"room1\"]").await;
    assert_silent(&mut b).await;
}

#[tokio::test]
async fn namespace_broadcast_reaches_everyone() {
    let io = room_server(3403);

    let mut a = ws_handshake(3403).await;
    sio_connect(&mut a, "0").await;
    let mut b = ws_handshake(3403).await;
    sio_connect(&mut b, "0").await;

    // Server-level broadcast: every socket in the namespace
    io.of("/")
        .unwrap()
        .emit("announce", json!(["all"]))
        .unwrap();
    assert_eq!(next_sio(&mut a).await, "2[\"announce\",\"all\"]");
    assert_eq!(next_sio(&mut b).await, "2[\"announce\",\"all\"]");

    // Socket-level broadcast: everyone but the sender
    send_sio(&mut a, "2[\"send-all\"]").await;
    assert_eq!(next_sio(&mut b).await, "2[\"hello\",\"to everyone\"]");
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn disconnect_leaves_rooms() {
    room_server(3404);

    let mut a = ws_handshake(3404).await;
    sio_connect(&mut a, "0").await;
    let mut b = ws_handshake(3404).await;
    sio_connect(&mut b, "0").await;

    join(&mut a, "room1").await;
    join(&mut b, "room1").await;

    // b leaves the namespace entirely, its membership is dropped
    send_sio(&mut b, "1").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    send_sio(&mut a, "2[\"send\",\"room1\"]").await;
    assert_silent(&mut b).await;
}
