//! The [`Client`] bridges the Engine.IO session machinery and the Socket.IO
//! layer: it parses message payloads, routes CONNECT packets to namespaces,
//! accumulates binary attachments and tears namespace sockets down when the
//! session closes.

use std::{
    borrow::Cow,
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
};

use bytes::Bytes;
use engio::handler::EngineIoHandler;
use engio::sid::Sid;
use engio::DisconnectReason as EIoDisconnectReason;
use tracing::debug;

use crate::{
    channel::ChannelLayer,
    config::SocketIoConfig,
    errors::Error,
    ns::{Namespace, NsHandlers},
    packet::{Packet, PacketData},
};

type EIoSocket = engio::Socket<SocketData>;

/// Data attached to every Engine.IO session.
#[derive(Debug, Default)]
pub struct SocketData {
    /// A binary packet being received, held until all of its attachments
    /// arrived on the transport
    pub(crate) partial_bin_packet: Mutex<Option<Packet<'static>>>,
}

pub struct Client<L: ChannelLayer> {
    pub(crate) config: Arc<SocketIoConfig>,
    ns: RwLock<HashMap<Cow<'static, str>, Arc<Namespace<L>>>>,
}

impl<L: ChannelLayer> Client<L> {
    pub fn new(config: Arc<SocketIoConfig>) -> Self {
        Self {
            config,
            ns: RwLock::new(HashMap::new()),
        }
    }

    /// Register a namespace. Namespaces are registered once at startup,
    /// before the service starts accepting connections.
    pub fn add_ns(&self, path: Cow<'static, str>, handlers: NsHandlers<L>) {
        debug!("adding namespace {}", path);
        let ns = Namespace::new(path.clone(), handlers);
        self.ns.write().unwrap().insert(path, ns);
    }

    pub fn get_ns(&self, path: &str) -> Option<Arc<Namespace<L>>> {
        self.ns.read().unwrap().get(path).cloned()
    }

    /// Close every namespace, disconnecting all their sockets.
    pub fn close(&self) {
        debug!("closing all namespaces");
        for ns in self.ns.read().unwrap().values() {
            ns.close();
        }
    }

    /// Handle a CONNECT packet: resolve the namespace, reject duplicates and
    /// unknown paths, then run the namespace connection flow.
    fn sock_connect(&self, auth: Option<String>, ns_path: &str, esocket: &Arc<EIoSocket>) {
        debug!("[sid={}] connect to namespace {}", esocket.id, ns_path);
        let Some(ns) = self.get_ns(ns_path) else {
            let res: Result<String, _> =
                Packet::connect_error(ns_path, "Invalid namespace").try_into();
            if let Ok(packet) = res {
                esocket.emit(packet).ok();
            }
            return;
        };

        // A second CONNECT for a namespace this session already joined is a
        // protocol error
        if ns.has(esocket.id) {
            debug!("[sid={}] duplicate connect to {}", esocket.id, ns_path);
            esocket.close(EIoDisconnectReason::PacketParsingError);
            return;
        }

        let auth = match auth.map(|auth| serde_json::from_str(&auth)).transpose() {
            Ok(auth) => auth,
            Err(e) => {
                debug!("[sid={}] invalid connect payload: {}", esocket.id, e);
                esocket.close(EIoDisconnectReason::PacketParsingError);
                return;
            }
        };
        ns.connect(esocket.id, esocket.clone(), auth, self.config.clone());
    }

    /// Propagate a decoded packet to its target namespace.
    fn sock_propagate_packet(&self, packet: Packet<'static>, esid: Sid) -> Result<(), Error> {
        if let Some(ns) = self.get_ns(&packet.ns) {
            ns.recv(esid, packet.inner)
        } else {
            debug!("[sid={esid}] packet for unknown namespace {}", packet.ns);
            Ok(())
        }
    }
}

impl<L: ChannelLayer> EngineIoHandler for Client<L> {
    type Data = SocketData;

    fn on_connect(&self, socket: Arc<EIoSocket>) {
        // Nothing to do yet: the session only becomes interesting once the
        // client sends a CONNECT for some namespace
        debug!("[sid={}] engine.io session open", socket.id);
    }

    fn on_disconnect(&self, socket: Arc<EIoSocket>, reason: EIoDisconnectReason) {
        debug!("[sid={}] engine.io session closed: {:?}", socket.id, reason);
        let sockets: Vec<_> = self
            .ns
            .read()
            .unwrap()
            .values()
            .filter_map(|ns| ns.get_socket(socket.id).ok())
            .collect();

        for ns_socket in sockets {
            ns_socket.close(reason.clone().into());
        }
    }

    fn on_message(&self, msg: String, socket: Arc<EIoSocket>) {
        debug!("[sid={}] received message: {:?}", socket.id, msg);
        let packet = match Packet::try_from(msg) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("[sid={}] packet parse error: {}", socket.id, e);
                socket.close(EIoDisconnectReason::PacketParsingError);
                return;
            }
        };

        let res: Result<(), Error> = match packet.inner {
            PacketData::Connect(auth) => {
                self.sock_connect(auth, &packet.ns, &socket);
                Ok(())
            }
            PacketData::BinaryEvent(_, _, _) | PacketData::BinaryAck(_, _) => {
                // Hold the packet until all its attachments arrived
                socket
                    .data
                    .partial_bin_packet
                    .lock()
                    .unwrap()
                    .replace(packet);
                Ok(())
            }
            _ => self.sock_propagate_packet(packet, socket.id),
        };
        if let Err(ref err) = res {
            debug!("[sid={}] error processing packet: {}", socket.id, err);
            if let Some(reason) = err.into() {
                socket.close(reason);
            }
        }
    }

    /// A binary payload fills the next slot of the pending binary packet;
    /// once complete the placeholders left in its arguments are resolved and
    /// the packet is dispatched like any other.
    fn on_binary(&self, data: Bytes, socket: Arc<EIoSocket>) {
        if apply_payload_on_packet(data, &socket) {
            if let Some(mut packet) = socket.data.partial_bin_packet.lock().unwrap().take() {
                match packet.inner {
                    PacketData::BinaryEvent(_, ref mut bin, _)
                    | PacketData::BinaryAck(ref mut bin, _) => bin.reconstruct(),
                    _ => (),
                }
                if let Err(ref err) = self.sock_propagate_packet(packet, socket.id) {
                    debug!("[sid={}] error processing packet: {}", socket.id, err);
                    if let Some(reason) = err.into() {
                        socket.close(reason);
                    }
                }
            }
        }
    }
}

impl<L: ChannelLayer> std::fmt::Debug for Client<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("config", &self.config).finish()
    }
}

/// Apply an incoming binary payload to the partial binary packet.
/// Returns true once the packet has all its attachments.
fn apply_payload_on_packet(data: Bytes, socket: &EIoSocket) -> bool {
    if let Some(ref mut packet) = *socket.data.partial_bin_packet.lock().unwrap() {
        match packet.inner {
            PacketData::BinaryEvent(_, ref mut bin, _) | PacketData::BinaryAck(ref mut bin, _) => {
                bin.add_payload(data);
                bin.is_complete()
            }
            _ => unreachable!("partial_bin_packet is only set for binary packets"),
        }
    } else {
        debug!("[sid={}] unexpected binary data", socket.id);
        false
    }
}
