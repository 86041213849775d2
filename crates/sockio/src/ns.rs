//! A [`Namespace`] is a logical endpoint registered once at startup. It owns
//! the event handler map, the optional connect/disconnect hooks, its
//! channel layer and the sockets currently connected to it.

use std::{
    borrow::Cow,
    collections::HashMap,
    future::Future,
    sync::{Arc, RwLock},
};

use engio::sid::Sid;
use serde_json::Value;
use tracing::debug;

use crate::{
    channel::ChannelLayer,
    client::SocketData,
    config::SocketIoConfig,
    errors::Error,
    handler::{AckSender, BoxedConnectHandler, BoxedDisconnectHandler, BoxedEventHandler},
    packet::{Packet, PacketData},
    socket::{DisconnectReason, Socket},
};

type EIoSocket = engio::Socket<SocketData>;

/// The handlers of one namespace, built with [`NsBuilder`] and registered
/// through [`SockIo::ns`](crate::SockIo::ns).
pub struct NsHandlers<L: ChannelLayer> {
    pub(crate) connect: Option<BoxedConnectHandler<L>>,
    pub(crate) disconnect: Option<BoxedDisconnectHandler<L>>,
    pub(crate) events: HashMap<Cow<'static, str>, BoxedEventHandler<L>>,
}

impl<L: ChannelLayer> NsHandlers<L> {
    pub fn builder() -> NsBuilder<L> {
        NsBuilder::new()
    }
}

impl<L: ChannelLayer> Default for NsHandlers<L> {
    fn default() -> Self {
        Self {
            connect: None,
            disconnect: None,
            events: HashMap::new(),
        }
    }
}

/// Builder registering the handlers of a namespace.
///
/// ```
/// # use sockio::ns::NsBuilder;
/// # use sockio::channel::LocalLayer;
/// let handlers = NsBuilder::<LocalLayer>::new()
///     .on("message", |socket, data, _bin, _ack| async move {
///         socket.emit("message-back", data).ok();
///     })
///     .build();
/// ```
pub struct NsBuilder<L: ChannelLayer> {
    handlers: NsHandlers<L>,
}

impl<L: ChannelLayer> NsBuilder<L> {
    pub fn new() -> Self {
        Self {
            handlers: NsHandlers::default(),
        }
    }

    /// Register the connect hook, called with the auth payload of the
    /// CONNECT packet. An `Err` refuses the connection.
    pub fn on_connect<H, F>(mut self, handler: H) -> Self
    where
        H: Fn(Arc<Socket<L>>, Option<Value>) -> F + Send + Sync + 'static,
        F: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.handlers.connect = Some(Box::new(move |socket, auth| {
            Box::pin(handler(socket, auth))
        }));
        self
    }

    /// Register a handler for the given event name.
    pub fn on<H, F>(mut self, event: impl Into<Cow<'static, str>>, handler: H) -> Self
    where
        H: Fn(Arc<Socket<L>>, Value, Vec<bytes::Bytes>, Option<AckSender<L>>) -> F
            + Send
            + Sync
            + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        self.handlers.events.insert(
            event.into(),
            Box::new(move |socket, data, bin, ack| Box::pin(handler(socket, data, bin, ack))),
        );
        self
    }

    /// Register the disconnect hook, called once when the namespace socket
    /// is removed.
    pub fn on_disconnect<H, F>(mut self, handler: H) -> Self
    where
        H: Fn(Arc<Socket<L>>, DisconnectReason) -> F + Send + Sync + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        self.handlers.disconnect = Some(Box::new(move |socket, reason| {
            Box::pin(handler(socket, reason))
        }));
        self
    }

    pub fn build(self) -> NsHandlers<L> {
        self.handlers
    }
}

impl<L: ChannelLayer> Default for NsBuilder<L> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Namespace<L: ChannelLayer> {
    pub path: Cow<'static, str>,
    pub(crate) channel: L,
    pub(crate) handlers: NsHandlers<L>,
    sockets: RwLock<HashMap<Sid, Arc<Socket<L>>>>,
}

impl<L: ChannelLayer> Namespace<L> {
    pub(crate) fn new(path: Cow<'static, str>, handlers: NsHandlers<L>) -> Arc<Self> {
        Arc::new_cyclic(|ns| Self {
            path,
            channel: L::new(ns.clone()),
            handlers,
            sockets: RwLock::new(HashMap::new()),
        })
    }

    /// Connect a session to this namespace.
    ///
    /// The socket is registered synchronously so a second CONNECT for the
    /// same session is a duplicate for the whole connect window. The connect
    /// hook then runs: on rejection the registration is reverted and a
    /// CONNECT_ERROR with the hook's message is sent, otherwise the CONNECT
    /// response carries the namespace scoped id.
    pub(crate) fn connect(
        self: &Arc<Self>,
        esid: Sid,
        esocket: Arc<EIoSocket>,
        auth: Option<Value>,
        config: Arc<SocketIoConfig>,
    ) {
        let socket: Arc<Socket<L>> = Socket::new(esid, self.clone(), esocket.clone(), config).into();
        self.sockets.write().unwrap().insert(esid, socket.clone());

        match &self.handlers.connect {
            None => self.finish_connect(socket, &esocket),
            Some(handler) => {
                let ns = self.clone();
                let fut = handler(socket.clone(), auth);
                tokio::spawn(async move {
                    match fut.await {
                        Ok(()) => ns.finish_connect(socket, &esocket),
                        Err(message) => {
                            debug!("[sid={esid}] connection to {} refused: {message}", ns.path);
                            ns.remove_socket(esid);
                            let res: Result<String, _> =
                                Packet::connect_error(&ns.path, &message).try_into();
                            if let Ok(packet) = res {
                                esocket.emit(packet).ok();
                            }
                        }
                    }
                });
            }
        }
    }

    fn finish_connect(self: &Arc<Self>, socket: Arc<Socket<L>>, esocket: &Arc<EIoSocket>) {
        // The session may have ended while the connect hook was running, in
        // which case the registration is already gone
        if socket.is_closed() {
            debug!("[sid={}] session closed during connect", socket.esid);
            return;
        }
        socket.confirm();

        if socket.send(Packet::connect(&self.path, socket.id)).is_err() {
            debug!("[sid={}] error sending connect packet", socket.esid);
            esocket.close(engio::DisconnectReason::PacketParsingError);
        }
    }

    /// Remove a socket and leave all its rooms.
    pub(crate) fn remove_socket(&self, esid: Sid) {
        self.sockets.write().unwrap().remove(&esid);
        self.channel.discard_all(esid);
    }

    pub(crate) fn has(&self, esid: Sid) -> bool {
        self.sockets.read().unwrap().contains_key(&esid)
    }

    /// Dispatch a decoded packet to the socket of the originating session.
    pub(crate) fn recv(&self, esid: Sid, packet: PacketData<'static>) -> Result<(), Error> {
        match packet {
            PacketData::Connect(_) => unreachable!("connect packets are handled by the client"),
            PacketData::ConnectError(_) => Err(Error::InvalidPacketType),
            packet => self.get_socket(esid)?.recv(packet),
        }
    }

    pub(crate) fn get_socket(&self, esid: Sid) -> Result<Arc<Socket<L>>, Error> {
        self.sockets
            .read()
            .unwrap()
            .get(&esid)
            .cloned()
            .ok_or(Error::SocketGone(esid))
    }

    pub(crate) fn socket_sids(&self) -> Vec<Sid> {
        self.sockets.read().unwrap().keys().copied().collect()
    }

    /// Close every socket in the namespace, used on server shutdown. The
    /// engine teardown fires the disconnect hooks with the shutdown reason.
    pub(crate) fn close(&self) {
        let sockets: Vec<_> = self.sockets.read().unwrap().values().cloned().collect();
        debug!("closing {} sockets in namespace {}", sockets.len(), self.path);
        for socket in sockets {
            socket.close_underlying_transport();
        }
    }
}

#[cfg(test)]
impl<L: ChannelLayer> Namespace<L> {
    pub(crate) fn new_dummy(sids: &[Sid]) -> Arc<Self> {
        let ns = Namespace::new(Cow::Borrowed("/"), NsHandlers::default());
        for sid in sids {
            let (esocket, _rx) = engio::Socket::new_dummy_piped(Box::new(|_, _| {}), 128);
            let socket = Socket::new(
                *sid,
                ns.clone(),
                esocket,
                Arc::new(SocketIoConfig::default()),
            );
            socket.confirm();
            ns.sockets.write().unwrap().insert(*sid, Arc::new(socket));
        }
        ns
    }
}

impl<L: ChannelLayer> std::fmt::Debug for Namespace<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("path", &self.path)
            .field("sockets", &self.sockets.read().unwrap().len())
            .finish()
    }
}
