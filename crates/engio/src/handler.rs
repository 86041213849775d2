//! The [`EngineIoHandler`] trait is the seam between the Engine.IO session
//! machinery and whatever runs on top of it, typically the Socket.IO layer.

use std::sync::Arc;

use bytes::Bytes;

use crate::socket::{DisconnectReason, Socket};

/// Implement on any struct to receive socket events.
///
/// The `Data` associated type attaches custom state to every socket.
pub trait EngineIoHandler: std::fmt::Debug + Send + Sync + 'static {
    /// Data bound to each socket.
    type Data: Default + Send + Sync + 'static;

    /// Called when a new session is created.
    fn on_connect(&self, socket: Arc<Socket<Self::Data>>);

    /// Called when a session is closed, with the close reason.
    fn on_disconnect(&self, socket: Arc<Socket<Self::Data>>, reason: DisconnectReason);

    /// Called for each message packet received from the client.
    fn on_message(&self, msg: String, socket: Arc<Socket<Self::Data>>);

    /// Called for each binary packet received from the client.
    fn on_binary(&self, data: Bytes, socket: Arc<Socket<Self::Data>>);
}

impl<T: EngineIoHandler> EngineIoHandler for Arc<T> {
    type Data = T::Data;

    fn on_connect(&self, socket: Arc<Socket<Self::Data>>) {
        (**self).on_connect(socket)
    }

    fn on_disconnect(&self, socket: Arc<Socket<Self::Data>>, reason: DisconnectReason) {
        (**self).on_disconnect(socket, reason)
    }

    fn on_message(&self, msg: String, socket: Arc<Socket<Self::Data>>) {
        (**self).on_message(msg, socket)
    }

    fn on_binary(&self, data: Bytes, socket: Arc<Socket<Self::Data>>) {
        (**self).on_binary(data, socket)
    }
}
