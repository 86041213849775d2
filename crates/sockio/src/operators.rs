//! Broadcast operators select the sockets a packet goes to, following the
//! builder pattern: `socket.to("room1").except("room2").emit(..)`.

use std::borrow::Cow;
use std::sync::Arc;

use bytes::Bytes;
use engio::sid::Sid;
use serde::Serialize;

use crate::{
    channel::{ChannelLayer, Room, SendOptions},
    errors::BroadcastError,
    ns::Namespace,
    packet::Packet,
};

/// A type usable as one room or a set of rooms.
///
/// [`String`], [`&'static str`](str), [`Vec`] and const arrays of both are
/// implemented out of the box.
pub trait RoomParam: 'static {
    type IntoIter: Iterator<Item = Room>;

    fn into_room_iter(self) -> Self::IntoIter;
}

impl RoomParam for Room {
    type IntoIter = std::iter::Once<Room>;
    #[inline(always)]
    fn into_room_iter(self) -> Self::IntoIter {
        std::iter::once(self)
    }
}
impl RoomParam for String {
    type IntoIter = std::iter::Once<Room>;
    #[inline(always)]
    fn into_room_iter(self) -> Self::IntoIter {
        std::iter::once(Cow::Owned(self))
    }
}
impl RoomParam for &'static str {
    type IntoIter = std::iter::Once<Room>;
    #[inline(always)]
    fn into_room_iter(self) -> Self::IntoIter {
        std::iter::once(Cow::Borrowed(self))
    }
}
impl RoomParam for Vec<String> {
    type IntoIter = std::iter::Map<std::vec::IntoIter<String>, fn(String) -> Room>;
    #[inline(always)]
    fn into_room_iter(self) -> Self::IntoIter {
        self.into_iter().map(Cow::Owned)
    }
}
impl RoomParam for Vec<&'static str> {
    type IntoIter = std::iter::Map<std::vec::IntoIter<&'static str>, fn(&'static str) -> Room>;
    #[inline(always)]
    fn into_room_iter(self) -> Self::IntoIter {
        self.into_iter().map(Cow::Borrowed)
    }
}
impl RoomParam for Vec<Room> {
    type IntoIter = std::vec::IntoIter<Room>;
    #[inline(always)]
    fn into_room_iter(self) -> Self::IntoIter {
        self.into_iter()
    }
}
impl<const COUNT: usize> RoomParam for [&'static str; COUNT] {
    type IntoIter =
        std::iter::Map<std::array::IntoIter<&'static str, COUNT>, fn(&'static str) -> Room>;
    #[inline(always)]
    fn into_room_iter(self) -> Self::IntoIter {
        self.into_iter().map(Cow::Borrowed)
    }
}
impl<const COUNT: usize> RoomParam for [String; COUNT] {
    type IntoIter = std::iter::Map<std::array::IntoIter<String, COUNT>, fn(String) -> Room>;
    #[inline(always)]
    fn into_room_iter(self) -> Self::IntoIter {
        self.into_iter().map(Cow::Owned)
    }
}
impl RoomParam for Sid {
    type IntoIter = std::iter::Once<Room>;
    #[inline(always)]
    fn into_room_iter(self) -> Self::IntoIter {
        std::iter::once(Cow::Owned(self.to_string()))
    }
}

/// Chainable operators to select sockets and emit a packet to them through
/// the namespace's channel layer.
pub struct BroadcastOperators<L: ChannelLayer> {
    ns: Arc<Namespace<L>>,
    opts: SendOptions,
    binary: Vec<Bytes>,
}

impl<L: ChannelLayer> BroadcastOperators<L> {
    pub(crate) fn from_ns(ns: Arc<Namespace<L>>) -> Self {
        Self {
            ns,
            opts: SendOptions::default(),
            binary: vec![],
        }
    }

    pub(crate) fn from_sock(ns: Arc<Namespace<L>>, sid: Sid) -> Self {
        Self {
            ns,
            opts: SendOptions::new(sid),
            binary: vec![],
        }
    }

    /// Selects all sockets in the given rooms, except the sender.
    pub fn to(mut self, rooms: impl RoomParam) -> Self {
        self.opts.rooms.extend(rooms.into_room_iter());
        self.opts.skip_self = true;
        self
    }

    /// Selects all sockets in the given rooms, including the sender.
    pub fn within(mut self, rooms: impl RoomParam) -> Self {
        self.opts.rooms.extend(rooms.into_room_iter());
        self
    }

    /// Filters out the sockets that are in the given rooms.
    pub fn except(mut self, rooms: impl RoomParam) -> Self {
        self.opts.except.extend(rooms.into_room_iter());
        self
    }

    /// Selects every socket in the namespace except the sender.
    pub fn broadcast(mut self) -> Self {
        self.opts.skip_self = true;
        self
    }

    /// Attaches binary payloads to the next emit, turning it into a
    /// BINARY_EVENT.
    pub fn bin(mut self, binary: impl IntoIterator<Item = impl Into<Bytes>>) -> Self {
        self.binary = binary.into_iter().map(Into::into).collect();
        self
    }

    /// Emits an event to all selected sockets.
    ///
    /// Array-like data is treated as the argument list; anything else is
    /// sent as a single argument.
    pub fn emit<T: Serialize>(
        self,
        event: impl Into<Cow<'static, str>>,
        data: T,
    ) -> Result<(), BroadcastError> {
        let data = serde_json::to_value(data)?;
        let ns_path = self.ns.path.clone();
        let packet = if self.binary.is_empty() {
            Packet::event(ns_path, event.into(), data)
        } else {
            Packet::bin_event(ns_path, event.into(), data, self.binary)
        };
        self.ns.channel.group_send(packet, self.opts)
    }

    /// The session ids of all selected sockets.
    pub fn sockets(&self) -> Vec<Sid> {
        self.ns.channel.sockets(&self.opts)
    }
}
