//! A [`Socket`] represents one Engine.IO session: its outbound packet queue,
//! its heartbeat job and its current transport.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU8, Ordering},
        Arc,
    },
    time::Duration,
};

use bytes::Bytes;
use http::request::Parts;
use smallvec::{smallvec, SmallVec};
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        Mutex,
    },
    task::JoinHandle,
};
use tracing::debug;

use crate::{
    config::EngineIoConfig, errors::Error, packet::Packet, peekable::PeekableReceiver,
    service::TransportType, sid::Sid,
};

/// The reason why a [`Socket`] was closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client gracefully closed the connection
    TransportClose,
    /// A packet from the client could not be parsed
    PacketParsingError,
    /// The connection was abruptly closed by the transport layer
    TransportError,
    /// The client did not answer a ping within the configured timeout
    HeartbeatTimeout,
    /// The server is shutting down
    ClosingServer,
}

/// Packets pushed as one queue slot are delivered back to back, so a binary
/// message header and its attachments can never be interleaved with packets
/// queued concurrently by other tasks.
pub(crate) type PacketBuf = SmallVec<[Packet; 2]>;

/// One Engine.IO session.
///
/// It handles:
/// * the packet communication between the engine and the
///   user defined [`EngineIoHandler`](crate::handler::EngineIoHandler),
/// * the heartbeat job verifying that the connection is still up,
/// * the user defined `Data` bound to the socket.
pub struct Socket<D>
where
    D: Default + Send + Sync + 'static,
{
    /// The session id
    pub id: Sid,

    /// The current transport, as a bitfield so it can live in an [`AtomicU8`]
    transport: AtomicU8,

    /// Whether the session is in the middle of a websocket upgrade
    upgrading: AtomicBool,

    /// Outbound FIFO queue.
    ///
    /// The receiving half is locked by whoever currently delivers packets:
    /// * the polling transport locks it for the duration of each GET,
    /// * the websocket transport keeps it locked until the connection closes.
    pub(crate) internal_rx: Mutex<PeekableReceiver<PacketBuf>>,
    internal_tx: mpsc::Sender<PacketBuf>,

    /// Channel used by the transports to forward client pongs to the
    /// heartbeat job
    pub(crate) heartbeat_tx: mpsc::Sender<()>,
    heartbeat_rx: Mutex<mpsc::Receiver<()>>,
    heartbeat_handle: Mutex<Option<JoinHandle<()>>>,

    /// Called when the socket closes so the engine can drop the session
    close_fn: Box<dyn Fn(Sid, DisconnectReason) + Send + Sync>,

    /// User data bound to the socket
    pub data: D,

    /// The http request that opened the session, kept as opaque peer info
    pub req_parts: Parts,
}

impl<D> Socket<D>
where
    D: Default + Send + Sync + 'static,
{
    pub(crate) fn new(
        transport: TransportType,
        config: &EngineIoConfig,
        req_parts: Parts,
        close_fn: Box<dyn Fn(Sid, DisconnectReason) + Send + Sync>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::channel(config.max_buffer_size);
        let (heartbeat_tx, heartbeat_rx) = mpsc::channel(1);

        Self {
            id: Sid::new(),
            transport: AtomicU8::new(transport as u8),
            upgrading: AtomicBool::new(false),

            internal_rx: Mutex::new(PeekableReceiver::new(internal_rx)),
            internal_tx,

            heartbeat_tx,
            heartbeat_rx: Mutex::new(heartbeat_rx),
            heartbeat_handle: Mutex::new(None),
            close_fn,

            data: D::default(),
            req_parts,
        }
    }

    /// Sends a single packet to the connection.
    pub(crate) fn send(&self, packet: Packet) -> Result<(), TrySendError<Packet>> {
        debug!("[sid={}] sending packet: {:?}", self.id, packet);
        self.send_buf(smallvec![packet]).map_err(|e| match e {
            TrySendError::Full(mut buf) => TrySendError::Full(buf.pop().unwrap()),
            TrySendError::Closed(mut buf) => TrySendError::Closed(buf.pop().unwrap()),
        })
    }

    fn send_buf(&self, buf: PacketBuf) -> Result<(), TrySendError<PacketBuf>> {
        self.internal_tx.try_send(buf)
    }

    /// Emits a message to the client.
    ///
    /// On a websocket transport it is sent as a text frame; on polling it is
    /// buffered until the next GET drains the queue.
    pub fn emit(&self, msg: String) -> Result<(), TrySendError<()>> {
        self.send(Packet::Message(msg)).map_err(strip_payload)
    }

    /// Emits a binary message to the client.
    ///
    /// On a websocket transport it is sent as a binary frame; on polling it
    /// is base64 encoded into the next payload.
    pub fn emit_binary(&self, data: Bytes) -> Result<(), TrySendError<()>> {
        self.send(Packet::Binary(data)).map_err(strip_payload)
    }

    /// Emits a message followed by binary payloads as one atomic batch.
    ///
    /// The transports deliver a batch back to back, which keeps a multi-part
    /// binary packet contiguous on the wire even when other tasks emit to the
    /// same session concurrently.
    pub fn emit_many(&self, msg: String, bin: Vec<Bytes>) -> Result<(), TrySendError<()>> {
        let mut buf = SmallVec::with_capacity(bin.len() + 1);
        buf.push(Packet::Message(msg));
        buf.extend(bin.into_iter().map(Packet::Binary));
        self.send_buf(buf).map_err(strip_payload)
    }

    /// Immediately closes the socket and the underlying connection.
    /// The session is removed from the engine and the handler is notified.
    pub fn close(&self, reason: DisconnectReason) {
        (self.close_fn)(self.id, reason);
        self.send(Packet::Close).ok();
    }

    /// Returns true if no more packets can be sent to the client.
    pub fn is_closed(&self) -> bool {
        self.internal_tx.is_closed()
    }

    /// Spawns the heartbeat job and keeps its handle so it can be aborted
    /// when the socket closes.
    pub(crate) fn spawn_heartbeat(self: Arc<Self>, interval: Duration, timeout: Duration) {
        let socket = self.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = socket.heartbeat_job(interval, timeout).await {
                socket.close(DisconnectReason::HeartbeatTimeout);
                debug!("[sid={}] heartbeat error: {:?}", socket.id, e);
            }
        });
        self.heartbeat_handle
            .try_lock()
            .expect("heartbeat handle mutex should not be locked twice")
            .replace(handle);
    }

    /// A ping is sent every `interval` and the client has `timeout` to answer
    /// with a pong. A missing pong closes the session.
    async fn heartbeat_job(&self, interval: Duration, timeout: Duration) -> Result<(), Error> {
        let mut heartbeat_rx = self
            .heartbeat_rx
            .try_lock()
            .expect("heartbeat rx should be locked only once");

        debug!("[sid={}] heartbeat routine started", self.id);

        let mut interval_tick = tokio::time::interval(interval);
        interval_tick.tick().await;
        // Some clients send a pong first, consume it
        heartbeat_rx.try_recv().ok();

        loop {
            interval_tick.tick().await;

            // The probe ping/pong pair takes over while an upgrade is running
            if self.is_upgrading() {
                debug!("[sid={}] heartbeat paused during upgrade", self.id);
                continue;
            }

            self.send_buf(smallvec![Packet::Ping])
                .map_err(|_| Error::HeartbeatTimeout)?;
            tokio::time::timeout(timeout, heartbeat_rx.recv())
                .await
                .map_err(|_| Error::HeartbeatTimeout)?
                .ok_or(Error::HeartbeatTimeout)?;
        }
    }

    /// Aborts the heartbeat job if it is running.
    pub(crate) fn abort_heartbeat(&self) {
        if let Ok(Some(handle)) = self.heartbeat_handle.try_lock().map(|mut h| h.take()) {
            handle.abort();
        }
    }

    pub(crate) fn is_ws(&self) -> bool {
        self.transport.load(Ordering::Relaxed) == TransportType::Websocket as u8
    }

    pub(crate) fn is_http(&self) -> bool {
        self.transport.load(Ordering::Relaxed) == TransportType::Polling as u8
    }

    pub(crate) fn is_upgrading(&self) -> bool {
        self.upgrading.load(Ordering::Relaxed)
    }

    pub(crate) fn start_upgrade(&self) {
        self.upgrading.store(true, Ordering::Relaxed);
    }

    pub(crate) fn cancel_upgrade(&self) {
        self.upgrading.store(false, Ordering::Relaxed);
    }

    /// Makes the websocket the authoritative transport, ending the upgrade.
    pub(crate) fn upgrade_to_websocket(&self) {
        self.upgrading.store(false, Ordering::Relaxed);
        self.transport
            .store(TransportType::Websocket as u8, Ordering::Relaxed);
    }

    /// The current [`TransportType`] of the session.
    pub fn transport_type(&self) -> TransportType {
        if self.is_ws() {
            TransportType::Websocket
        } else {
            TransportType::Polling
        }
    }
}

fn strip_payload<T>(e: TrySendError<T>) -> TrySendError<()> {
    match e {
        TrySendError::Full(_) => TrySendError::Full(()),
        TrySendError::Closed(_) => TrySendError::Closed(()),
    }
}

impl<D: Default + Send + Sync + 'static> std::fmt::Debug for Socket<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("sid", &self.id)
            .field("transport", &self.transport)
            .field("upgrading", &self.upgrading)
            .finish()
    }
}

#[doc(hidden)]
impl<D> Socket<D>
where
    D: Default + Send + Sync + 'static,
{
    /// Create a detached socket for tests, with a receiver yielding every
    /// packet sent to the client.
    pub fn new_dummy_piped(
        close_fn: Box<dyn Fn(Sid, DisconnectReason) + Send + Sync>,
        buffer_size: usize,
    ) -> (Arc<Socket<D>>, mpsc::Receiver<Packet>) {
        let socket = Arc::new(Socket::new(
            TransportType::Websocket,
            &EngineIoConfig {
                max_buffer_size: buffer_size,
                ..Default::default()
            },
            http::Request::<()>::default().into_parts().0,
            close_fn,
        ));

        let (tx, rx) = mpsc::channel(buffer_size);
        let sock = socket.clone();
        tokio::spawn(async move {
            let mut internal_rx = sock.internal_rx.try_lock().unwrap();
            while let Some(buf) = internal_rx.recv().await {
                for packet in buf {
                    tx.send(packet).await.ok();
                }
            }
        });

        (socket, rx)
    }
}
