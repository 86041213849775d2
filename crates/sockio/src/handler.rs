//! Handler types for namespaces.
//!
//! A handler receives a closed capability set: the namespace socket, the
//! decoded JSON arguments, the binary attachments, and an optional
//! [`AckSender`] when the client asked for an acknowledgement.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::{
    channel::ChannelLayer,
    errors::SendError,
    packet::Packet,
    socket::{DisconnectReason, Socket},
};

pub(crate) type BoxFuture<T = ()> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Called when a client connects to the namespace, with the optional auth
/// payload. Returning an `Err` refuses the connection: the message is sent
/// back in a CONNECT_ERROR packet and no namespace socket is created.
pub(crate) type BoxedConnectHandler<L> =
    Box<dyn Fn(Arc<Socket<L>>, Option<Value>) -> BoxFuture<Result<(), String>> + Send + Sync>;

/// Called for each event packet whose name is registered on the namespace.
pub(crate) type BoxedEventHandler<L> =
    Box<dyn Fn(Arc<Socket<L>>, Value, Vec<Bytes>, Option<AckSender<L>>) -> BoxFuture + Send + Sync>;

/// Called once when the namespace socket is removed, with the reason.
pub(crate) type BoxedDisconnectHandler<L> =
    Box<dyn Fn(Arc<Socket<L>>, DisconnectReason) -> BoxFuture + Send + Sync>;

/// One-shot sender answering an ack-expecting event from the client.
///
/// Invoking [`send`](AckSender::send) emits an ACK packet with the same ack
/// id as the event; attached binary payloads turn it into a BINARY_ACK.
pub struct AckSender<L: ChannelLayer> {
    socket: Arc<Socket<L>>,
    ack_id: i64,
    binary: Vec<Bytes>,
}

impl<L: ChannelLayer> AckSender<L> {
    pub(crate) fn new(socket: Arc<Socket<L>>, ack_id: i64) -> Self {
        Self {
            socket,
            ack_id,
            binary: vec![],
        }
    }

    /// Attach binary payloads to the acknowledgement.
    pub fn bin(mut self, binary: impl IntoIterator<Item = impl Into<Bytes>>) -> Self {
        self.binary = binary.into_iter().map(Into::into).collect();
        self
    }

    /// Send the acknowledgement with the given arguments.
    pub fn send<T: Serialize>(self, data: T) -> Result<(), SendError> {
        let data = serde_json::to_value(data)?;
        let ns_path = self.socket.ns_path();
        let packet = if self.binary.is_empty() {
            Packet::ack(ns_path, data, self.ack_id)
        } else {
            Packet::bin_ack(ns_path, data, self.binary, self.ack_id)
        };
        self.socket.send(packet)
    }
}
