//! Shared helpers booting a hyper server running the Socket.IO service and
//! speaking the wire protocol over a websocket transport.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use sockio::channel::LocalLayer;
use sockio::service::SockIoService;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub fn create_server(svc: SockIoService<engio::service::NotFoundService, LocalLayer>, port: u16) {
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
    // Bind eagerly so the port is ready when this returns
    let server = hyper::Server::bind(&addr).serve(svc.into_make_service());
    tokio::spawn(async move {
        server.await.unwrap();
    });
}

/// Open a websocket engine.io session, consuming the open packet.
pub async fn ws_handshake(port: u16) -> Ws {
    let mut ws = tokio_tungstenite::connect_async(format!(
        "ws://127.0.0.1:{port}/socket.io/?EIO=4&transport=websocket"
    ))
    .await
    .unwrap()
    .0;
    let open = next_text(&mut ws).await;
    assert!(open.starts_with('0'), "expected an open packet, got {open:?}");
    ws
}

/// Read the next text frame, skipping heartbeat pings.
pub async fn next_text(ws: &mut Ws) -> String {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a text frame")
            .expect("connection closed")
            .unwrap();
        match msg {
            Message::Text(text) if text == "2" => {
                ws.send(Message::Text("3".to_string())).await.unwrap();
            }
            Message::Text(text) => break text,
            _ => continue,
        }
    }
}

/// Read the next binary frame.
pub async fn next_binary(ws: &mut Ws) -> Vec<u8> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a binary frame")
            .expect("connection closed")
            .unwrap();
        if let Message::Binary(data) = msg {
            break data;
        }
    }
}

/// Send a Socket.IO frame, wrapped as an engine.io message packet.
pub async fn send_sio(ws: &mut Ws, frame: &str) {
    ws.send(Message::Text(format!("4{frame}"))).await.unwrap();
}

/// Read the next Socket.IO frame, unwrapping the engine.io message packet.
pub async fn next_sio(ws: &mut Ws) -> String {
    let text = next_text(ws).await;
    assert!(text.starts_with('4'), "expected a message packet, got {text:?}");
    text[1..].to_string()
}

/// Connect to a namespace and return the Socket.IO connect response.
pub async fn sio_connect(ws: &mut Ws, connect_frame: &str) -> String {
    send_sio(ws, connect_frame).await;
    next_sio(ws).await
}

/// Wait until the server closes the websocket.
pub async fn assert_ws_closed(ws: &mut Ws) {
    let closed = tokio::time::timeout(Duration::from_millis(500), async {
        loop {
            match ws.next().await {
                None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
                Some(Ok(_)) => (),
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "the websocket should have been closed");
}
