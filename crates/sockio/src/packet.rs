//! The Socket.IO packet model and its text codec.
//!
//! Wire grammar of the textual frame, carried as an Engine.IO message:
//!
//! ```text
//! <packet type>[<# of binary attachments>-][<namespace>,][<ack id>][JSON payload]
//! ```
//!
//! Binary attachments follow the frame as separate Engine.IO binary packets.

use std::borrow::Cow;

use bytes::Bytes;
use engio::sid::Sid;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::Error;

/// A Socket.IO packet: its data and its namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet<'a> {
    pub inner: PacketData<'a>,
    pub ns: Cow<'a, str>,
}

/// | Type          | ID  | Usage                                                      |
/// |---------------|-----|------------------------------------------------------------|
/// | CONNECT       | 0   | Connection to a namespace                                  |
/// | DISCONNECT    | 1   | Disconnection from a namespace                             |
/// | EVENT         | 2   | Event with JSON arguments                                  |
/// | ACK           | 3   | Acknowledgement of an event                                |
/// | CONNECT_ERROR | 4   | Refused connection to a namespace                          |
/// | BINARY_EVENT  | 5   | Event with JSON arguments and binary attachments           |
/// | BINARY_ACK    | 6   | Acknowledgement carrying binary attachments                |
#[derive(Debug, Clone, PartialEq)]
pub enum PacketData<'a> {
    Connect(Option<String>),
    Disconnect,
    Event(Cow<'a, str>, Value, Option<i64>),
    EventAck(Value, i64),
    ConnectError(String),
    BinaryEvent(Cow<'a, str>, BinaryPacket, Option<i64>),
    BinaryAck(BinaryPacket, i64),
}

/// The data of a BINARY_EVENT/BINARY_ACK packet while its attachments are
/// collected or emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryPacket {
    /// JSON arguments, placeholders stripped from the top-level array
    pub data: Value,
    /// Attachment buffers, in placeholder index order
    pub bin: Vec<Bytes>,
    payload_count: usize,
}

impl<'a> Packet<'a> {
    /// The packet confirming a namespace connection, carrying the namespace
    /// scoped session id.
    pub fn connect(ns: &'a str, sid: Sid) -> Self {
        let val = serde_json::to_string(&ConnectPacket { sid }).unwrap();
        Self {
            inner: PacketData::Connect(Some(val)),
            ns: Cow::Borrowed(ns),
        }
    }

    /// The packet refusing a namespace connection.
    pub fn connect_error(ns: &'a str, message: &str) -> Self {
        Self {
            inner: PacketData::ConnectError(message.to_string()),
            ns: Cow::Borrowed(ns),
        }
    }

    pub fn disconnect(ns: &'a str) -> Self {
        Self {
            inner: PacketData::Disconnect,
            ns: Cow::Borrowed(ns),
        }
    }

    pub fn event(ns: impl Into<Cow<'a, str>>, e: impl Into<Cow<'a, str>>, data: Value) -> Self {
        Self {
            inner: PacketData::Event(e.into(), data, None),
            ns: ns.into(),
        }
    }

    pub fn bin_event(
        ns: impl Into<Cow<'a, str>>,
        e: impl Into<Cow<'a, str>>,
        data: Value,
        bin: Vec<Bytes>,
    ) -> Self {
        debug_assert!(!bin.is_empty());
        Self {
            inner: PacketData::BinaryEvent(e.into(), BinaryPacket::outgoing(data, bin), None),
            ns: ns.into(),
        }
    }

    pub fn ack(ns: &'a str, data: Value, ack: i64) -> Self {
        Self {
            inner: PacketData::EventAck(data, ack),
            ns: Cow::Borrowed(ns),
        }
    }

    pub fn bin_ack(ns: &'a str, data: Value, bin: Vec<Bytes>, ack: i64) -> Self {
        debug_assert!(!bin.is_empty());
        Self {
            inner: PacketData::BinaryAck(BinaryPacket::outgoing(data, bin), ack),
            ns: Cow::Borrowed(ns),
        }
    }
}

impl PacketData<'_> {
    fn index(&self) -> char {
        match self {
            PacketData::Connect(_) => '0',
            PacketData::Disconnect => '1',
            PacketData::Event(_, _, _) => '2',
            PacketData::EventAck(_, _) => '3',
            PacketData::ConnectError(_) => '4',
            PacketData::BinaryEvent(_, _, _) => '5',
            PacketData::BinaryAck(_, _) => '6',
        }
    }

    /// Set the ack id on packets that support one.
    pub(crate) fn set_ack_id(&mut self, ack_id: i64) {
        match self {
            PacketData::Event(_, _, ack) | PacketData::BinaryEvent(_, _, ack) => {
                *ack = Some(ack_id)
            }
            _ => {}
        };
    }

    pub(crate) fn is_binary(&self) -> bool {
        matches!(
            self,
            PacketData::BinaryEvent(_, _, _) | PacketData::BinaryAck(_, _)
        )
    }
}

impl BinaryPacket {
    /// Build the incoming representation from the decoded JSON payload and
    /// the attachment count announced in the header.
    ///
    /// Every placeholder in the tree must be well formed and reference an
    /// in-range attachment, otherwise the packet is a decode failure.
    pub fn incoming(mut data: Value, payload_count: usize) -> Result<Self, Error> {
        validate_placeholders(&data, payload_count)?;

        // Attachments are delivered separately, drop the top-level markers
        if let Value::Array(ref mut args) = data {
            args.retain(|v| {
                v.as_object()
                    .map_or(true, |o| !o.contains_key(PLACEHOLDER_KEY))
            });
        }

        Ok(Self {
            data,
            bin: Vec::new(),
            payload_count,
        })
    }

    /// Build the outgoing representation: every buffer becomes a
    /// `{"_placeholder":true,"num":i}` entry appended to the arguments in
    /// index order.
    pub fn outgoing(data: Value, bin: Vec<Bytes>) -> Self {
        let mut data = match data {
            Value::Array(v) => Value::Array(v),
            d => Value::Array(vec![d]),
        };
        let payload_count = bin.len();
        let args = data.as_array_mut().unwrap();
        for i in 0..payload_count {
            args.push(json!({ PLACEHOLDER_KEY: true, PLACEHOLDER_NUM: i }));
        }
        Self {
            data,
            bin,
            payload_count,
        }
    }

    pub fn add_payload(&mut self, payload: Bytes) {
        self.bin.push(payload);
    }

    /// True once exactly `payload_count` buffers have arrived.
    pub fn is_complete(&self) -> bool {
        self.payload_count == self.bin.len()
    }

    /// Substitute every placeholder still in the tree with the content of
    /// the attachment it references, as an array of byte values.
    ///
    /// Top-level argument placeholders were stripped on decode (those map
    /// onto the handler's buffer list in index order); this resolves the
    /// placeholders nested deeper in the arguments once all buffers arrived.
    pub(crate) fn reconstruct(&mut self) {
        debug_assert!(self.is_complete());
        substitute_placeholders(&mut self.data, &self.bin);
    }

    pub(crate) fn payload_count(&self) -> usize {
        self.payload_count
    }
}

const PLACEHOLDER_KEY: &str = "_placeholder";
const PLACEHOLDER_NUM: &str = "num";

/// Walk the JSON tree and replace placeholder objects with the bytes of the
/// attachment their `num` references.
fn substitute_placeholders(value: &mut Value, bin: &[Bytes]) {
    let replacement = match &*value {
        Value::Object(obj) if obj.contains_key(PLACEHOLDER_KEY) => obj
            .get(PLACEHOLDER_NUM)
            .and_then(Value::as_u64)
            .and_then(|num| bin.get(num as usize))
            .map(|buf| Value::Array(buf.iter().map(|b| Value::from(*b)).collect())),
        _ => None,
    };
    if let Some(replacement) = replacement {
        *value = replacement;
        return;
    }
    match value {
        Value::Array(values) => {
            for v in values {
                substitute_placeholders(v, bin);
            }
        }
        Value::Object(obj) => {
            for v in obj.values_mut() {
                substitute_placeholders(v, bin);
            }
        }
        _ => (),
    }
}

/// Walk the JSON tree and check every placeholder object: the marker must be
/// a boolean `true` and `num` an integer below the attachment count.
fn validate_placeholders(value: &Value, payload_count: usize) -> Result<(), Error> {
    match value {
        Value::Array(values) => values
            .iter()
            .try_for_each(|v| validate_placeholders(v, payload_count)),
        Value::Object(obj) => match obj.get(PLACEHOLDER_KEY) {
            Some(marker) => {
                let num = obj.get(PLACEHOLDER_NUM).and_then(Value::as_u64);
                if *marker == Value::Bool(true)
                    && num.is_some_and(|n| (n as usize) < payload_count)
                {
                    Ok(())
                } else {
                    Err(Error::InvalidBinaryPlaceholder)
                }
            }
            None => obj
                .values()
                .try_for_each(|v| validate_placeholders(v, payload_count)),
        },
        _ => Ok(()),
    }
}

impl TryInto<String> for Packet<'_> {
    type Error = serde_json::Error;

    fn try_into(mut self) -> Result<String, Self::Error> {
        use PacketData::*;

        // Pre-serialize the payload so the buffer can be allocated upfront
        let data = match &mut self.inner {
            Event(e, data, _) | BinaryEvent(e, BinaryPacket { data, .. }, _) => {
                // Expand the arguments to ["event", ...args]
                let packet = match data {
                    Value::Array(args) if !args.is_empty() => {
                        args.insert(0, Value::String(e.to_string()));
                        serde_json::to_string(&args)
                    }
                    Value::Array(_) => serde_json::to_string::<(_, [(); 0])>(&(e, [])),
                    _ => serde_json::to_string(&(e, data)),
                }?;
                Some(packet)
            }
            EventAck(data, _) | BinaryAck(BinaryPacket { data, .. }, _) => {
                // An ack payload is always an array
                let packet = match data {
                    Value::Array(_) => serde_json::to_string(&data),
                    Value::Null => Ok("[]".to_string()),
                    _ => serde_json::to_string(&[data]),
                }?;
                Some(packet)
            }
            ConnectError(message) => Some(serde_json::to_string(&json!({ "message": message }))?),
            _ => None,
        };

        let capacity = 1 + self.ns.len() + 16 + data.as_ref().map(|d| d.len()).unwrap_or(0);
        let mut res = String::with_capacity(capacity);
        res.push(self.inner.index());

        // A binary packet puts its attachment count before the namespace
        let push_nsp = |res: &mut String| {
            if !self.ns.is_empty() && self.ns != "/" {
                if !self.ns.starts_with('/') {
                    res.push('/');
                }
                res.push_str(&self.ns);
                res.push(',');
            }
        };

        if !self.inner.is_binary() {
            push_nsp(&mut res);
        }

        match self.inner {
            PacketData::Connect(Some(data)) => res.push_str(&data),
            PacketData::Connect(None) | PacketData::Disconnect => (),
            PacketData::Event(_, _, ack) => {
                if let Some(ack) = ack {
                    res.push_str(&ack.to_string());
                }
                res.push_str(&data.unwrap());
            }
            PacketData::EventAck(_, ack) => {
                res.push_str(&ack.to_string());
                res.push_str(&data.unwrap());
            }
            PacketData::ConnectError(_) => res.push_str(&data.unwrap()),
            PacketData::BinaryEvent(_, bin, ack) => {
                res.push_str(&bin.payload_count.to_string());
                res.push('-');
                push_nsp(&mut res);
                if let Some(ack) = ack {
                    res.push_str(&ack.to_string());
                }
                res.push_str(&data.unwrap());
            }
            PacketData::BinaryAck(bin, ack) => {
                res.push_str(&bin.payload_count.to_string());
                res.push('-');
                push_nsp(&mut res);
                res.push_str(&ack.to_string());
                res.push_str(&data.unwrap());
            }
        };
        Ok(res)
    }
}

/// Deserialize an event payload, formatted as:
/// `["<event name>", ...<json arguments>]`
fn deserialize_event_packet(data: &str) -> Result<(String, Value), Error> {
    let packet = match serde_json::from_str::<Value>(data) {
        Ok(Value::Array(packet)) => packet,
        Ok(_) => return Err(Error::InvalidPayload),
        Err(_) => return Err(Error::InvalidPayload),
    };

    let event = packet
        .first()
        .and_then(Value::as_str)
        .ok_or(Error::InvalidEventName)?
        .to_string();
    let payload = Value::from_iter(packet.into_iter().skip(1));
    Ok((event, payload))
}

/// Deserialize an ack payload, which must be a JSON array.
fn deserialize_ack_packet(data: &str) -> Result<Value, Error> {
    match serde_json::from_str::<Value>(data) {
        Ok(packet @ Value::Array(_)) => Ok(packet),
        _ => Err(Error::InvalidPayload),
    }
}

impl TryFrom<String> for Packet<'_> {
    type Error = Error;

    /// Parse the textual frame. Separators are plain ASCII so the cursor
    /// walks the byte slice directly.
    fn try_from(value: String) -> Result<Self, Self::Error> {
        let chars = value.as_bytes();
        let index = *chars.first().ok_or(Error::InvalidPacketType)?;
        if !(b'0'..=b'6').contains(&index) {
            return Err(Error::InvalidPacketType);
        }
        let mut i = 1;

        // Attachment count, only for binary packets: `<n>-` with n >= 1
        let attachments: usize = if index == b'5' || index == b'6' {
            let start = i;
            while chars.get(i).is_some_and(u8::is_ascii_digit) {
                i += 1;
            }
            if i == start || chars.get(i) != Some(&b'-') {
                return Err(Error::InvalidPacketType);
            }
            let count = value[start..i].parse().map_err(|_| Error::InvalidPacketType)?;
            if count == 0 {
                return Err(Error::InvalidPacketType);
            }
            i += 1;
            count
        } else {
            0
        };

        // Namespace is present iff it starts with a slash
        let ns = if chars.get(i) == Some(&b'/') {
            let start = i;
            loop {
                match chars.get(i) {
                    Some(b',') => {
                        i += 1;
                        break Cow::Owned(value[start..i - 1].to_string());
                    }
                    // Some clients omit the trailing comma at end of packet,
                    // e.g. `1/custom`
                    None => break Cow::Owned(value[start..i].to_string()),
                    Some(_) => i += 1,
                }
            }
        } else {
            Cow::Borrowed("/")
        };

        // Ack id: the digit run before the JSON payload
        let start = i;
        let ack: Option<i64> = loop {
            match chars.get(i) {
                Some(c) if c.is_ascii_digit() => i += 1,
                Some(b'[') | Some(b'{') if i > start => {
                    break value[start..i].parse().ok();
                }
                _ => break None,
            }
        };

        let data = &value[i..];
        let inner = match index {
            b'0' => PacketData::Connect((!data.is_empty()).then(|| data.to_string())),
            b'1' => PacketData::Disconnect,
            b'2' => {
                let (event, payload) = deserialize_event_packet(data)?;
                PacketData::Event(event.into(), payload, ack)
            }
            b'3' => {
                let payload = deserialize_ack_packet(data)?;
                PacketData::EventAck(payload, ack.ok_or(Error::InvalidAckId)?)
            }
            b'5' => {
                let (event, payload) = deserialize_event_packet(data)?;
                PacketData::BinaryEvent(
                    event.into(),
                    BinaryPacket::incoming(payload, attachments)?,
                    ack,
                )
            }
            b'6' => {
                let payload = deserialize_ack_packet(data)?;
                PacketData::BinaryAck(
                    BinaryPacket::incoming(payload, attachments)?,
                    ack.ok_or(Error::InvalidAckId)?,
                )
            }
            _ => return Err(Error::InvalidPacketType),
        };

        Ok(Self { inner, ns })
    }
}

/// The payload of the connect packet sent back to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectPacket {
    sid: Sid,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(packet: Packet<'_>) -> String {
        packet.try_into().unwrap()
    }

    fn decode(value: &str) -> Packet<'static> {
        Packet::try_from(value.to_string()).unwrap()
    }

    #[test]
    fn connect_roundtrip() {
        let sid = Sid::new();
        let payload = format!("0{}", json!({ "sid": sid }));
        assert_eq!(encode(Packet::connect("/", sid)), payload);
        assert_eq!(decode(&payload), Packet::connect("/", sid));

        let payload = format!("0/admin™,{}", json!({ "sid": sid }));
        assert_eq!(encode(Packet::connect("/admin™", sid)), payload);
        assert_eq!(decode(&payload), Packet::connect("/admin™", sid));
    }

    #[test]
    fn connect_without_payload() {
        let packet = decode("0");
        assert_eq!(packet.inner, PacketData::Connect(None));
        assert_eq!(packet.ns, "/");
    }

    #[test]
    fn disconnect_roundtrip() {
        assert_eq!(encode(Packet::disconnect("/")), "1");
        assert_eq!(decode("1"), Packet::disconnect("/"));

        assert_eq!(encode(Packet::disconnect("/admin™")), "1/admin™,");
        assert_eq!(decode("1/admin™,"), Packet::disconnect("/admin™"));
        // A missing trailing comma is tolerated
        assert_eq!(decode("1/admin™"), Packet::disconnect("/admin™"));
    }

    #[test]
    fn event_roundtrip() {
        let payload = format!("2{}", json!(["event", { "data": "value™" }]));
        let packet = Packet::event("/", "event", json!([{ "data": "value™" }]));
        assert_eq!(encode(packet.clone()), payload);
        assert_eq!(decode(&payload), packet);

        // With ack id
        let payload = format!("21{}", json!(["event", { "data": "value™" }]));
        let mut packet = Packet::event("/", "event", json!([{ "data": "value™" }]));
        packet.inner.set_ack_id(1);
        assert_eq!(encode(packet.clone()), payload);
        assert_eq!(decode(&payload), packet);

        // With namespace and ack id
        let payload = format!("2/admin™,1{}", json!(["event", { "data": "value™" }]));
        let mut packet = Packet::event("/admin™", "event", json!([{ "data": "value™" }]));
        packet.inner.set_ack_id(1);
        assert_eq!(encode(packet.clone()), payload);
        assert_eq!(decode(&payload), packet);
    }

    #[test]
    fn event_empty_args() {
        let payload = format!("2{}", json!(["event", []]));
        assert_eq!(encode(Packet::event("/", "event", json!([]))), payload);
    }

    #[test]
    fn event_ack_roundtrip() {
        let payload = "354[\"data\"]".to_string();
        let packet = Packet::ack("/", json!(["data"]), 54);
        assert_eq!(encode(packet.clone()), payload);
        assert_eq!(decode(&payload), packet);

        let payload = "3/admin™,54[\"data\"]".to_string();
        let packet = Packet::ack("/admin™", json!(["data"]), 54);
        assert_eq!(encode(packet.clone()), payload);
        assert_eq!(decode(&payload), packet);
    }

    #[test]
    fn ack_wire_format() {
        // The ack mirrors the id received with the event
        let packet = decode("2456[\"message-with-ack\",1,\"2\",{\"3\":[false]}]");
        let PacketData::Event(event, data, ack) = packet.inner else {
            panic!("expected an event");
        };
        assert_eq!(event, "message-with-ack");
        assert_eq!(ack, Some(456));
        assert_eq!(data, json!([1, "2", { "3": [false] }]));

        let reply = encode(Packet::ack("/", data, 456));
        assert_eq!(reply, "3456[1,\"2\",{\"3\":[false]}]");
    }

    #[test]
    fn connect_error_encode() {
        let payload = format!("4{}", json!({ "message": "Invalid namespace" }));
        assert_eq!(encode(Packet::connect_error("/", "Invalid namespace")), payload);

        let payload = format!("4/admin™,{}", json!({ "message": "Invalid namespace" }));
        assert_eq!(
            encode(Packet::connect_error("/admin™", "Invalid namespace")),
            payload
        );
    }

    #[test]
    fn binary_event_roundtrip() {
        let json = json!(["event", { "data": "value™" }, { "_placeholder": true, "num": 0 }]);
        let payload = format!("51-{}", json);

        let packet = Packet::bin_event(
            "/",
            "event",
            json!({ "data": "value™" }),
            vec![Bytes::from_static(&[1])],
        );
        assert_eq!(encode(packet), payload);

        let mut packet = decode(&payload);
        match packet.inner {
            PacketData::BinaryEvent(ref e, ref mut bin, ack) => {
                assert_eq!(e, "event");
                assert_eq!(ack, None);
                assert_eq!(bin.payload_count(), 1);
                assert!(!bin.is_complete());
                bin.add_payload(Bytes::from_static(&[1]));
                assert!(bin.is_complete());
                assert_eq!(bin.data, json!([{ "data": "value™" }]));
            }
            _ => panic!("expected a binary event"),
        }
    }

    #[test]
    fn binary_event_with_ns_and_ack() {
        let json = json!(["event", { "data": "value™" }, { "_placeholder": true, "num": 0 }]);
        let payload = format!("51-/admin™,254{}", json);

        let mut packet = Packet::bin_event(
            "/admin™",
            "event",
            json!({ "data": "value™" }),
            vec![Bytes::from_static(&[1])],
        );
        packet.inner.set_ack_id(254);
        assert_eq!(encode(packet), payload);

        let packet = decode(&payload);
        assert_eq!(packet.ns, "/admin™");
        match packet.inner {
            PacketData::BinaryEvent(_, _, ack) => assert_eq!(ack, Some(254)),
            _ => panic!("expected a binary event"),
        }
    }

    #[test]
    fn binary_ack_roundtrip() {
        let json = json!([{ "data": "value™" }, { "_placeholder": true, "num": 0 }]);
        let payload = format!("61-54{}", json);

        let packet = Packet::bin_ack(
            "/",
            json!({ "data": "value™" }),
            vec![Bytes::from_static(&[1])],
            54,
        );
        assert_eq!(encode(packet), payload);

        let packet = decode(&payload);
        match packet.inner {
            PacketData::BinaryAck(ref bin, ack) => {
                assert_eq!(ack, 54);
                assert_eq!(bin.payload_count(), 1);
            }
            _ => panic!("expected a binary ack"),
        }
    }

    #[test]
    fn nested_placeholder_is_substituted() {
        let packet = decode("51-[\"msg\",{\"blob\":{\"_placeholder\":true,\"num\":0}}]");
        let PacketData::BinaryEvent(_, mut bin, _) = packet.inner else {
            panic!("expected a binary event");
        };
        // The object argument is kept, only top-level placeholders strip
        assert_eq!(bin.data, json!([{ "blob": { "_placeholder": true, "num": 0 } }]));

        bin.add_payload(Bytes::from_static(&[9, 8, 7]));
        assert!(bin.is_complete());
        bin.reconstruct();
        assert_eq!(bin.data, json!([{ "blob": [9, 8, 7] }]));
    }

    #[test]
    fn mixed_placeholders_are_substituted() {
        let packet = decode(
            "52-[\"msg\",{\"_placeholder\":true,\"num\":0},{\"meta\":[{\"_placeholder\":true,\"num\":1}]}]",
        );
        let PacketData::BinaryEvent(_, mut bin, _) = packet.inner else {
            panic!("expected a binary event");
        };
        bin.add_payload(Bytes::from_static(&[1]));
        bin.add_payload(Bytes::from_static(&[2, 3]));
        bin.reconstruct();
        // The first buffer stays in the binary list for the stripped
        // top-level argument, the nested one resolves in place
        assert_eq!(bin.data, json!([{ "meta": [[2, 3]] }]));
        assert_eq!(
            bin.bin,
            vec![Bytes::from_static(&[1]), Bytes::from_static(&[2, 3])]
        );
    }

    #[test]
    fn scenario_two_attachments() {
        let packet = decode(
            "52-[\"message\",{\"_placeholder\":true,\"num\":0},{\"_placeholder\":true,\"num\":1}]",
        );
        let PacketData::BinaryEvent(event, bin, _) = packet.inner else {
            panic!("expected a binary event");
        };
        assert_eq!(event, "message");
        assert_eq!(bin.payload_count(), 2);
        assert_eq!(bin.data, json!([]));
    }

    #[test]
    fn invalid_packets() {
        assert!(matches!(
            Packet::try_from("abc".to_string()),
            Err(Error::InvalidPacketType)
        ));
        assert!(matches!(
            Packet::try_from("7".to_string()),
            Err(Error::InvalidPacketType)
        ));
        assert!(matches!(
            Packet::try_from("".to_string()),
            Err(Error::InvalidPacketType)
        ));
        // Binary packets must have at least one attachment
        assert!(matches!(
            Packet::try_from("50-[\"e\"]".to_string()),
            Err(Error::InvalidPacketType)
        ));
        assert!(matches!(
            Packet::try_from("5[\"e\"]".to_string()),
            Err(Error::InvalidPacketType)
        ));
        // Acks must carry an id
        assert!(matches!(
            Packet::try_from("3[\"data\"]".to_string()),
            Err(Error::InvalidAckId)
        ));
        // Event payloads must be arrays with a string event name
        assert!(matches!(
            Packet::try_from("2{\"not\":\"an array\"}".to_string()),
            Err(Error::InvalidPayload)
        ));
        assert!(matches!(
            Packet::try_from("2[42]".to_string()),
            Err(Error::InvalidEventName)
        ));
        assert!(matches!(
            Packet::try_from("2qwe".to_string()),
            Err(Error::InvalidPayload)
        ));
    }

    #[test]
    fn malformed_placeholders() {
        // num out of range
        assert!(matches!(
            Packet::try_from("51-[\"e\",{\"_placeholder\":true,\"num\":2}]".to_string()),
            Err(Error::InvalidBinaryPlaceholder)
        ));
        // missing num
        assert!(matches!(
            Packet::try_from("51-[\"e\",{\"_placeholder\":true}]".to_string()),
            Err(Error::InvalidBinaryPlaceholder)
        ));
        // marker must be boolean true
        assert!(matches!(
            Packet::try_from("51-[\"e\",{\"_placeholder\":1,\"num\":0}]".to_string()),
            Err(Error::InvalidBinaryPlaceholder)
        ));
        // nested placeholders are validated too
        assert!(matches!(
            Packet::try_from("51-[\"e\",{\"deep\":{\"_placeholder\":true,\"num\":7}}]".to_string()),
            Err(Error::InvalidBinaryPlaceholder)
        ));
    }
}
