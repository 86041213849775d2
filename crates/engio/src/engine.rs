use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use http::request::Parts;
use tracing::debug;

use crate::{
    config::EngineIoConfig,
    handler::EngineIoHandler,
    service::TransportType,
    sid::Sid,
    socket::{DisconnectReason, Socket},
};

type SocketMap<T> = RwLock<HashMap<Sid, Arc<T>>>;

/// The [`EngineIo`] struct is the process-wide session registry. It owns
/// every open session and is the only place where sessions are created and
/// destroyed.
pub struct EngineIo<H: EngineIoHandler> {
    sockets: SocketMap<Socket<H::Data>>,

    /// Handler called when sessions open and close and when messages arrive
    pub handler: Arc<H>,

    pub config: EngineIoConfig,
}

impl<H: EngineIoHandler> EngineIo<H> {
    pub fn new(handler: Arc<H>, config: EngineIoConfig) -> Self {
        Self {
            sockets: RwLock::new(HashMap::new()),
            handler,
            config,
        }
    }

    /// Create a new session, insert it into the registry and spawn its
    /// heartbeat.
    pub(crate) fn create_session(
        self: &Arc<Self>,
        transport: TransportType,
        req_parts: Parts,
    ) -> Arc<Socket<H::Data>> {
        let engine = self.clone();
        let close_fn = Box::new(move |sid, reason| engine.close_session(sid, reason));

        let socket = Arc::new(Socket::new(transport, &self.config, req_parts, close_fn));
        self.sockets
            .write()
            .unwrap()
            .insert(socket.id, socket.clone());

        socket
            .clone()
            .spawn_heartbeat(self.config.ping_interval, self.config.ping_timeout);
        self.handler.on_connect(socket.clone());
        socket
    }

    /// Get a session by its sid.
    /// Clones the socket ref so the lock is not held by the caller.
    pub fn get_socket(&self, sid: Sid) -> Option<Arc<Socket<H::Data>>> {
        self.sockets.read().unwrap().get(&sid).cloned()
    }

    /// Close a session: remove it from the registry, abort its heartbeat,
    /// release any suspended poll and notify the handler. Idempotent; the
    /// removal path runs at most once per session.
    pub fn close_session(&self, sid: Sid, reason: DisconnectReason) {
        let Some(socket) = self.sockets.write().unwrap().remove(&sid) else {
            debug!("[sid={sid}] session already removed");
            return;
        };

        // With a polling transport the queue receiver is not always locked,
        // close it here as a fallback so senders observe the closed session
        socket.internal_rx.try_lock().map(|mut rx| rx.close()).ok();
        socket.abort_heartbeat();
        self.handler.on_disconnect(socket, reason);

        debug!(
            "[sid={sid}] session closed, remaining sessions: {}",
            self.sockets.read().unwrap().len()
        );
    }
}
