//! The channel layer is the pub/sub seam used for room membership and
//! broadcast fan-out. The default [`LocalLayer`] keeps everything in memory,
//! which is all a single-process deployment needs; a distributed
//! implementation can fan out `group_send` across processes instead.

use std::{
    collections::{HashMap, HashSet},
    sync::{RwLock, Weak},
};

use engio::sid::Sid;
use itertools::Itertools;

use crate::{errors::BroadcastError, ns::Namespace, operators::RoomParam, packet::Packet};

/// A room identifier
pub type Room = std::borrow::Cow<'static, str>;

/// Target selection for a [`ChannelLayer::group_send`].
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// The rooms to send to. Empty means every socket in the namespace.
    pub rooms: Vec<Room>,
    /// Rooms whose members are excluded from the send.
    pub except: Vec<Room>,
    /// The session id of the sender, if the send originates from a socket.
    pub sid: Option<Sid>,
    /// Whether the sender itself is excluded.
    pub skip_self: bool,
}

impl SendOptions {
    pub fn new(sid: Sid) -> Self {
        Self {
            sid: Some(sid),
            ..Default::default()
        }
    }
}

/// Room membership and broadcast backend of one namespace.
pub trait ChannelLayer: Send + Sync + 'static {
    /// Create the layer for a namespace. A weak ref is handed over so the
    /// layer can resolve sockets without creating a cycle.
    fn new(ns: Weak<Namespace<Self>>) -> Self
    where
        Self: Sized;

    /// Subscribe a session to a room group.
    fn group_add(&self, sid: Sid, rooms: impl RoomParam);

    /// Unsubscribe a session from a room group.
    fn group_discard(&self, sid: Sid, rooms: impl RoomParam);

    /// Unsubscribe a session from every room, called when it disconnects.
    fn discard_all(&self, sid: Sid);

    /// All rooms a session is subscribed to.
    fn socket_rooms(&self, sid: Sid) -> Vec<Room>;

    /// The session ids matching the given options.
    fn sockets(&self, opts: &SendOptions) -> Vec<Sid>;

    /// Publish a packet to every socket matching the given options.
    ///
    /// Delivery failures never close sessions; the message is dropped for
    /// the unreachable peers and reported in the error.
    fn group_send(&self, packet: Packet<'static>, opts: SendOptions) -> Result<(), BroadcastError>;
}

/// The in-memory channel layer, mapping each room to its member sessions.
#[derive(Debug)]
pub struct LocalLayer {
    rooms: RwLock<HashMap<Room, HashSet<Sid>>>,
    ns: Weak<Namespace<Self>>,
}

impl ChannelLayer for LocalLayer {
    fn new(ns: Weak<Namespace<Self>>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            ns,
        }
    }

    fn group_add(&self, sid: Sid, rooms: impl RoomParam) {
        let mut rooms_map = self.rooms.write().unwrap();
        for room in rooms.into_room_iter() {
            rooms_map.entry(room).or_default().insert(sid);
        }
    }

    fn group_discard(&self, sid: Sid, rooms: impl RoomParam) {
        let mut rooms_map = self.rooms.write().unwrap();
        for room in rooms.into_room_iter() {
            if let Some(members) = rooms_map.get_mut(&room) {
                members.remove(&sid);
            }
        }
    }

    fn discard_all(&self, sid: Sid) {
        let mut rooms_map = self.rooms.write().unwrap();
        for members in rooms_map.values_mut() {
            members.remove(&sid);
        }
    }

    fn socket_rooms(&self, sid: Sid) -> Vec<Room> {
        let rooms_map = self.rooms.read().unwrap();
        rooms_map
            .iter()
            .filter(|(_, members)| members.contains(&sid))
            .map(|(room, _)| room.clone())
            .collect()
    }

    fn sockets(&self, opts: &SendOptions) -> Vec<Sid> {
        let Some(ns) = self.ns.upgrade() else {
            return vec![];
        };
        let except = self.except_sids(&opts.except);
        let skip = |sid: &Sid| {
            except.contains(sid) || (opts.skip_self && opts.sid.as_ref() == Some(sid))
        };

        if opts.rooms.is_empty() {
            // The whole namespace
            ns.socket_sids().into_iter().filter(|s| !skip(s)).collect()
        } else {
            let rooms_map = self.rooms.read().unwrap();
            opts.rooms
                .iter()
                .filter_map(|room| rooms_map.get(room))
                .flatten()
                .unique()
                .filter(|&s| !skip(s))
                .copied()
                .collect()
        }
    }

    fn group_send(&self, packet: Packet<'static>, opts: SendOptions) -> Result<(), BroadcastError> {
        let Some(ns) = self.ns.upgrade() else {
            return Ok(());
        };
        let sids = self.sockets(&opts);
        tracing::debug!("broadcasting packet to {} sockets", sids.len());

        let errors: Vec<_> = sids
            .into_iter()
            .filter_map(|sid| ns.get_socket(sid).ok())
            .filter_map(|socket| socket.send(packet.clone()).err())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }
}

impl LocalLayer {
    fn except_sids(&self, except: &[Room]) -> HashSet<Sid> {
        let mut except_sids = HashSet::new();
        let rooms_map = self.rooms.read().unwrap();
        for room in except {
            if let Some(members) = rooms_map.get(room) {
                except_sids.extend(members);
            }
        }
        except_sids
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn layer_with_sockets(sids: &[Sid]) -> (Arc<Namespace<LocalLayer>>, LocalLayer) {
        let ns = Namespace::new_dummy(sids);
        let layer = LocalLayer::new(Arc::downgrade(&ns));
        (ns, layer)
    }

    #[tokio::test]
    async fn membership() {
        let sid = Sid::new();
        let (_ns, layer) = layer_with_sockets(&[sid]);

        layer.group_add(sid, ["room1", "room2"]);
        let mut rooms = layer.socket_rooms(sid);
        rooms.sort();
        assert_eq!(rooms, ["room1", "room2"]);

        layer.group_discard(sid, "room1");
        assert_eq!(layer.socket_rooms(sid), ["room2"]);

        layer.discard_all(sid);
        assert!(layer.socket_rooms(sid).is_empty());
    }

    #[tokio::test]
    async fn targeting() {
        let (s0, s1, s2) = (Sid::new(), Sid::new(), Sid::new());
        let (_ns, layer) = layer_with_sockets(&[s0, s1, s2]);
        layer.group_add(s0, ["room1", "room2"]);
        layer.group_add(s1, ["room1", "room3"]);
        layer.group_add(s2, ["room2", "room3"]);

        // Room targeting dedups sockets present in several rooms
        let opts = SendOptions {
            rooms: vec!["room1".into(), "room2".into()],
            ..Default::default()
        };
        let mut sids = layer.sockets(&opts);
        sids.sort();
        let mut expected = vec![s0, s1, s2];
        expected.sort();
        assert_eq!(sids, expected);

        // The sender is excluded iff skip_self is set
        let opts = SendOptions {
            rooms: vec!["room1".into()],
            sid: Some(s0),
            skip_self: true,
            ..Default::default()
        };
        assert_eq!(layer.sockets(&opts), [s1]);

        let opts = SendOptions {
            rooms: vec!["room1".into()],
            sid: Some(s0),
            skip_self: false,
            ..Default::default()
        };
        let mut sids = layer.sockets(&opts);
        sids.sort();
        let mut expected = vec![s0, s1];
        expected.sort();
        assert_eq!(sids, expected);

        // Except rooms filter members out
        let opts = SendOptions {
            rooms: vec!["room1".into()],
            except: vec!["room3".into()],
            ..Default::default()
        };
        assert_eq!(layer.sockets(&opts), [s0]);

        // No rooms means the whole namespace
        let opts = SendOptions::default();
        assert_eq!(layer.sockets(&opts).len(), 3);
    }
}
