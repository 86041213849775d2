//! The [`SockIo`] facade: builds the service and registers namespaces.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    channel::{ChannelLayer, LocalLayer},
    client::Client,
    config::SocketIoConfig,
    layer::SockIoLayer,
    ns::NsHandlers,
    operators::BroadcastOperators,
    service::SockIoService,
};
use engio::service::NotFoundService;

/// Builder for the Socket.IO server.
///
/// The engine timing settings default to the `SIO_ENGINEIO_*` environment
/// variables, read once here.
pub struct SockIoBuilder {
    config: SocketIoConfig,
}

impl SockIoBuilder {
    pub fn new() -> Self {
        let config = SocketIoConfig {
            engine_config: engio::config::EngineIoConfig::from_env(),
            ..Default::default()
        };
        Self { config }
    }

    /// The path to listen for socket.io requests on.
    /// Defaults to "/socket.io".
    pub fn req_path(mut self, req_path: String) -> Self {
        self.config.engine_config.req_path = req_path;
        self
    }

    /// The interval at which the server sends ping packets.
    /// Defaults to 25 seconds.
    pub fn ping_interval(mut self, ping_interval: Duration) -> Self {
        self.config.engine_config.ping_interval = ping_interval;
        self
    }

    /// The grace period for a pong before the session is closed.
    /// Defaults to 20 seconds.
    pub fn ping_timeout(mut self, ping_timeout: Duration) -> Self {
        self.config.engine_config.ping_timeout = ping_timeout;
        self
    }

    /// The maximum number of bytes per polling payload.
    /// Defaults to 1MB.
    pub fn max_payload(mut self, max_payload: u64) -> Self {
        self.config.engine_config.max_payload = max_payload;
        self
    }

    /// The maximum number of packets buffered per session.
    /// Defaults to 128 packets.
    pub fn max_buffer_size(mut self, max_buffer_size: usize) -> Self {
        self.config.engine_config.max_buffer_size = max_buffer_size;
        self
    }

    /// How long the server waits for an acknowledgement.
    /// Defaults to 5 seconds.
    pub fn ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.config.ack_timeout = ack_timeout;
        self
    }

    /// Build a standalone service answering non socket.io requests with 404.
    pub fn build_svc(self) -> (SockIoService<NotFoundService, LocalLayer>, SockIo<LocalLayer>) {
        let client = Arc::new(Client::new(Arc::new(self.config)));
        let svc = SockIoService::with_client(NotFoundService, client.clone());
        (svc, SockIo(client))
    }

    /// Build a [`SockIoLayer`] to wrap an inner service.
    pub fn build_layer(self) -> (SockIoLayer<LocalLayer>, SockIo<LocalLayer>) {
        let client = Arc::new(Client::new(Arc::new(self.config)));
        (SockIoLayer::from_client(client.clone()), SockIo(client))
    }
}

impl Default for SockIoBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to the Socket.IO server: namespace registration and server-level
/// broadcasts.
pub struct SockIo<L: ChannelLayer = LocalLayer>(Arc<Client<L>>);

impl SockIo<LocalLayer> {
    pub fn builder() -> SockIoBuilder {
        SockIoBuilder::new()
    }

    /// Shorthand for `SockIo::builder().build_svc()`.
    pub fn new_svc() -> (SockIoService<NotFoundService, LocalLayer>, SockIo<LocalLayer>) {
        Self::builder().build_svc()
    }
}

impl<L: ChannelLayer> SockIo<L> {
    /// Register a namespace with its handlers. Must happen before clients
    /// connect to it; a CONNECT for an unregistered namespace is refused.
    pub fn ns(&self, path: impl Into<Cow<'static, str>>, handlers: NsHandlers<L>) {
        self.0.add_ns(path.into(), handlers)
    }

    /// Select a namespace for a broadcast, e.g.
    /// `io.of("/chat").unwrap().to("room1").emit("event", data)`.
    /// A broadcast without rooms reaches every socket in the namespace.
    pub fn of(&self, path: &str) -> Option<BroadcastOperators<L>> {
        self.0.get_ns(path).map(BroadcastOperators::from_ns)
    }

    /// Close every namespace and disconnect all clients.
    pub fn close(&self) {
        self.0.close()
    }
}

impl<L: ChannelLayer> Clone for SockIo<L> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<L: ChannelLayer> From<Arc<Client<L>>> for SockIo<L> {
    fn from(client: Arc<Client<L>>) -> Self {
        Self(client)
    }
}
