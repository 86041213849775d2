//! A [`Socket`] represents a client connected to one namespace. It is the
//! handle handed to every handler: it emits events, joins and leaves rooms,
//! tracks pending acknowledgements and disconnects.

use std::{
    borrow::Cow,
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicI64, Ordering},
        Arc, Mutex,
    },
};

use bytes::Bytes;
use engio::sid::Sid;
use engio::DisconnectReason as EIoDisconnectReason;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::{
    channel::{ChannelLayer, Room},
    client::SocketData,
    config::SocketIoConfig,
    errors::{AckError, Error, SendError},
    handler::AckSender,
    ns::Namespace,
    operators::{BroadcastOperators, RoomParam},
    packet::{Packet, PacketData},
};

/// Why a [`Socket`] was disconnected from its namespace.
///
/// It is passed to the namespace's disconnect hook.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DisconnectReason {
    /// The client sent a DISCONNECT packet, or the server called
    /// [`Socket::disconnect`]
    ClientDisconnect,
    /// The underlying Engine.IO session closed or failed
    TransportClose,
    /// The client stopped answering heartbeats
    PingTimeout,
    /// The server is shutting down
    ServerShutdown,
    /// A packet from the client could not be parsed
    ParseError,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str: &'static str = match self {
            DisconnectReason::ClientDisconnect => "client-disconnect",
            DisconnectReason::TransportClose => "transport-close",
            DisconnectReason::PingTimeout => "ping-timeout",
            DisconnectReason::ServerShutdown => "server-shutdown",
            DisconnectReason::ParseError => "parse-error",
        };
        f.write_str(str)
    }
}

impl From<EIoDisconnectReason> for DisconnectReason {
    fn from(reason: EIoDisconnectReason) -> Self {
        match reason {
            EIoDisconnectReason::TransportClose | EIoDisconnectReason::TransportError => {
                DisconnectReason::TransportClose
            }
            EIoDisconnectReason::PacketParsingError => DisconnectReason::ParseError,
            EIoDisconnectReason::HeartbeatTimeout => DisconnectReason::PingTimeout,
            EIoDisconnectReason::ClosingServer => DisconnectReason::ServerShutdown,
        }
    }
}

/// An acknowledgement received from the client.
#[derive(Debug)]
pub struct AckResponse {
    /// The arguments of the acknowledgement
    pub data: Value,
    /// Binary payloads, empty unless the client answered with a BINARY_ACK
    pub binary: Vec<Bytes>,
}

type AckResult = Result<AckResponse, AckError>;

pub struct Socket<L: ChannelLayer> {
    /// The namespace scoped session id, sent to the client in the CONNECT
    /// response
    pub id: Sid,
    /// The id of the owning Engine.IO session
    pub(crate) esid: Sid,

    pub(crate) ns: Arc<Namespace<L>>,
    esocket: Arc<engio::Socket<SocketData>>,
    config: Arc<SocketIoConfig>,

    /// Set once the connect flow completed and the CONNECT ack was sent.
    /// A socket whose connect hook is still running is registered in the
    /// namespace (so duplicate CONNECTs are caught) but not yet connected.
    connected: AtomicBool,
    /// Set by [`Socket::close`], which runs at most once.
    closed: AtomicBool,
    ack_message: Mutex<HashMap<i64, oneshot::Sender<AckResult>>>,
    ack_counter: AtomicI64,
}

impl<L: ChannelLayer> Socket<L> {
    pub(crate) fn new(
        esid: Sid,
        ns: Arc<Namespace<L>>,
        esocket: Arc<engio::Socket<SocketData>>,
        config: Arc<SocketIoConfig>,
    ) -> Self {
        Self {
            id: Sid::new(),
            esid,
            ns,
            esocket,
            config,
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            ack_message: Mutex::new(HashMap::new()),
            ack_counter: AtomicI64::new(0),
        }
    }

    /// The namespace path this socket is connected to.
    pub fn ns_path(&self) -> &str {
        &self.ns.path
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Marks the connect flow as completed.
    pub(crate) fn confirm(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Emits an event to this client.
    ///
    /// Array-like data is treated as the argument list; anything else is
    /// sent as a single argument.
    pub fn emit<T: Serialize>(
        &self,
        event: impl Into<Cow<'static, str>>,
        data: T,
    ) -> Result<(), SendError> {
        let data = serde_json::to_value(data)?;
        self.send(Packet::event(self.ns.path.clone(), event.into(), data))
    }

    /// Emits an event with binary attachments to this client.
    pub fn emit_binary<T: Serialize>(
        &self,
        event: impl Into<Cow<'static, str>>,
        data: T,
        bin: Vec<Bytes>,
    ) -> Result<(), SendError> {
        let data = serde_json::to_value(data)?;
        self.send(Packet::bin_event(
            self.ns.path.clone(),
            event.into(),
            data,
            bin,
        ))
    }

    /// Emits an event and waits for the client's acknowledgement.
    ///
    /// The ack id is allocated from this socket's monotonic counter. If the
    /// client does not answer within the configured ack timeout an
    /// [`AckError::Timeout`] is returned; if the socket closes first the
    /// pending ack resolves to [`AckError::SocketClosed`].
    pub async fn emit_with_ack<T: Serialize>(
        &self,
        event: impl Into<Cow<'static, str>>,
        data: T,
    ) -> Result<AckResponse, AckError> {
        let data = serde_json::to_value(data).map_err(SendError::from)?;
        let mut packet = Packet::event(self.ns.path.clone(), event.into(), data);

        let ack_id = self.ack_counter.fetch_add(1, Ordering::SeqCst) + 1;
        packet.inner.set_ack_id(ack_id);

        let (tx, rx) = oneshot::channel();
        self.ack_message.lock().unwrap().insert(ack_id, tx);
        if let Err(e) = self.send(packet) {
            self.ack_message.lock().unwrap().remove(&ack_id);
            return Err(e.into());
        }

        match tokio::time::timeout(self.config.ack_timeout, rx).await {
            Ok(Ok(res)) => res,
            Ok(Err(_)) => Err(AckError::SocketClosed),
            Err(_) => {
                self.ack_message.lock().unwrap().remove(&ack_id);
                Err(AckError::Timeout)
            }
        }
    }

    // Room actions, delegated to the namespace's channel layer

    /// Joins the given rooms, creating them if needed.
    pub fn join(&self, rooms: impl RoomParam) {
        self.ns.channel.group_add(self.esid, rooms)
    }

    /// Leaves the given rooms.
    pub fn leave(&self, rooms: impl RoomParam) {
        self.ns.channel.group_discard(self.esid, rooms)
    }

    /// Leaves every room this socket has joined.
    pub fn leave_all(&self) {
        self.ns.channel.discard_all(self.esid)
    }

    /// All rooms this socket has joined.
    pub fn rooms(&self) -> Vec<Room> {
        self.ns.channel.socket_rooms(self.esid)
    }

    // Broadcast operators

    /// Selects all sockets in the given rooms, except this one.
    pub fn to(&self, rooms: impl RoomParam) -> BroadcastOperators<L> {
        BroadcastOperators::from_sock(self.ns.clone(), self.esid).to(rooms)
    }

    /// Selects all sockets in the given rooms, including this one.
    pub fn within(&self, rooms: impl RoomParam) -> BroadcastOperators<L> {
        BroadcastOperators::from_sock(self.ns.clone(), self.esid).within(rooms)
    }

    /// Selects every socket in the namespace except this one.
    pub fn broadcast(&self) -> BroadcastOperators<L> {
        BroadcastOperators::from_sock(self.ns.clone(), self.esid).broadcast()
    }

    /// Disconnects this socket from its namespace: a DISCONNECT packet is
    /// sent to the client and the disconnect hook fires.
    pub fn disconnect(self: Arc<Self>) -> Result<(), SendError> {
        self.send(Packet::disconnect(&self.ns.path))?;
        self.close(DisconnectReason::ClientDisconnect);
        Ok(())
    }

    /// Closes the underlying Engine.IO session, used on server shutdown.
    pub(crate) fn close_underlying_transport(&self) {
        if !self.esocket.is_closed() {
            self.esocket.close(EIoDisconnectReason::ClosingServer);
        }
    }

    /// Encode and push a packet onto the session's outbound queue. A binary
    /// packet and its attachments are enqueued as one atomic batch.
    pub(crate) fn send(&self, mut packet: Packet<'_>) -> Result<(), SendError> {
        let bin = match packet.inner {
            PacketData::BinaryEvent(_, ref mut bin, _) | PacketData::BinaryAck(ref mut bin, _) => {
                std::mem::take(&mut bin.bin)
            }
            _ => vec![],
        };
        let msg: String = packet.try_into()?;
        let res = if bin.is_empty() {
            self.esocket.emit(msg)
        } else {
            self.esocket.emit_many(msg, bin)
        };
        res.map_err(|e| match e {
            tokio::sync::mpsc::error::TrySendError::Full(_) => SendError::ChannelFull,
            tokio::sync::mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Remove this socket from its namespace, failing every pending ack and
    /// firing the disconnect hook with the reason. The hook only fires for
    /// sockets that completed the connect flow.
    pub(crate) fn close(self: Arc<Self>, reason: DisconnectReason) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let was_connected = self.connected.swap(false, Ordering::SeqCst);
        debug!("[sid={}] socket disconnected: {}", self.id, reason);

        for (_, tx) in self.ack_message.lock().unwrap().drain() {
            tx.send(Err(AckError::SocketClosed)).ok();
        }

        if was_connected {
            if let Some(handler) = &self.ns.handlers.disconnect {
                tokio::spawn(handler(self.clone(), reason));
            }
        }
        self.ns.remove_socket(self.esid);
    }

    /// Dispatch a packet received from the client.
    pub(crate) fn recv(self: Arc<Self>, packet: PacketData<'static>) -> Result<(), Error> {
        // The client only gets its CONNECT ack once the connect hook
        // resolved; packets racing the hook are dropped
        if !self.connected() {
            debug!("[sid={}] dropping packet for unconfirmed socket", self.id);
            return Ok(());
        }
        match packet {
            PacketData::Event(e, data, ack) => self.recv_event(&e, data, vec![], ack),
            PacketData::BinaryEvent(e, packet, ack) => {
                self.recv_event(&e, packet.data, packet.bin, ack)
            }
            PacketData::EventAck(data, ack_id) => self.recv_ack(data, vec![], ack_id),
            PacketData::BinaryAck(packet, ack_id) => {
                self.recv_ack(packet.data, packet.bin, ack_id)
            }
            PacketData::Disconnect => {
                self.close(DisconnectReason::ClientDisconnect);
                Ok(())
            }
            _ => unreachable!("connect packets are handled by the client"),
        }
    }

    /// Look up the event handler on the namespace; an unknown event is
    /// silently ignored.
    fn recv_event(
        self: Arc<Self>,
        event: &str,
        data: Value,
        bin: Vec<Bytes>,
        ack: Option<i64>,
    ) -> Result<(), Error> {
        let Some(handler) = self.ns.handlers.events.get(event) else {
            debug!("[sid={}] no handler for event {:?}", self.id, event);
            return Ok(());
        };
        let ack = ack.map(|ack_id| AckSender::new(self.clone(), ack_id));
        tokio::spawn(handler(self.clone(), data, bin, ack));
        Ok(())
    }

    fn recv_ack(&self, data: Value, binary: Vec<Bytes>, ack_id: i64) -> Result<(), Error> {
        if let Some(tx) = self.ack_message.lock().unwrap().remove(&ack_id) {
            tx.send(Ok(AckResponse { data, binary })).ok();
        }
        Ok(())
    }
}

impl<L: ChannelLayer> std::fmt::Debug for Socket<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("nsid", &self.id)
            .field("esid", &self.esid)
            .field("ns", &self.ns.path)
            .field("connected", &self.connected)
            .finish()
    }
}

impl<L: ChannelLayer> PartialEq for Socket<L> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
