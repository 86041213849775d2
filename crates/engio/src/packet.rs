use base64::{engine::general_purpose, Engine};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::config::EngineIoConfig;
use crate::service::TransportType;
use crate::sid::Sid;

/// A Packet to use when receiving and sending data to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Open packet used to initiate a connection
    Open(OpenPacket),
    /// Close packet used to close a connection
    Close,
    /// Ping packet, sent by the server only
    Ping,
    /// Pong packet, sent by the client only
    Pong,

    /// Special ping packet (`2probe`) sent by the client to probe a websocket
    /// transport during upgrade
    PingProbe,
    /// Special pong packet (`3probe`) answering a [`Packet::PingProbe`]
    PongProbe,

    /// Message packet carrying a utf-8 payload
    Message(String),
    /// Upgrade packet to switch the session from polling to websocket
    Upgrade,
    /// Noop packet, sent to a pending polling request so it closes gracefully
    /// when the client upgrades to websocket
    Noop,

    /// Binary message payload.
    ///
    /// On a websocket transport it maps to a raw binary frame; on polling it
    /// is framed as `b<base64>` inside the payload.
    Binary(Bytes),
}

impl Packet {
    pub fn is_binary(&self) -> bool {
        matches!(self, Packet::Binary(_))
    }

    /// Get the max size the packet could have when serialized.
    /// If `b64` is true the size is computed for the polling base64 framing.
    ///
    /// The base64 size factor is `ceil(n / 3) * 4`
    pub(crate) fn get_size_hint(&self, b64: bool) -> usize {
        match self {
            Packet::Open(_) => 156, // max possible size of the serialized open packet
            Packet::Close => 1,
            Packet::Ping => 1,
            Packet::Pong => 1,
            Packet::PingProbe => 6,
            Packet::PongProbe => 6,
            Packet::Message(msg) => 1 + msg.len(),
            Packet::Upgrade => 1,
            Packet::Noop => 1,
            Packet::Binary(data) => {
                if b64 {
                    1 + data.len().div_ceil(3) * 4
                } else {
                    1 + data.len()
                }
            }
        }
    }
}

/// Serialize a [`Packet`] to a [`String`] according to the Engine.IO protocol
impl TryInto<String> for Packet {
    type Error = crate::errors::Error;

    fn try_into(self) -> Result<String, Self::Error> {
        let res = match self {
            Packet::Open(open) => "0".to_string() + &serde_json::to_string(&open)?,
            Packet::Close => "1".to_string(),
            Packet::Ping => "2".to_string(),
            Packet::Pong => "3".to_string(),
            Packet::PingProbe => "2probe".to_string(),
            Packet::PongProbe => "3probe".to_string(),
            Packet::Message(msg) => "4".to_string() + &msg,
            Packet::Upgrade => "5".to_string(),
            Packet::Noop => "6".to_string(),
            Packet::Binary(data) => "b".to_string() + &general_purpose::STANDARD.encode(data),
        };
        Ok(res)
    }
}

/// Deserialize a [`Packet`] from a [`&str`] according to the Engine.IO protocol
impl TryFrom<&str> for Packet {
    type Error = crate::errors::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        use crate::errors::Error;
        let mut chars = value.chars();
        let packet_type = chars.next().ok_or(Error::InvalidPacketType(None))?;
        let packet_data = chars.as_str();
        let is_probe = packet_data == "probe";
        let res = match packet_type {
            '0' => Packet::Open(serde_json::from_str(packet_data)?),
            '1' => Packet::Close,
            '2' if is_probe => Packet::PingProbe,
            '2' => Packet::Ping,
            '3' if is_probe => Packet::PongProbe,
            '3' => Packet::Pong,
            '4' => Packet::Message(packet_data.to_string()),
            '5' => Packet::Upgrade,
            '6' => Packet::Noop,
            'b' => Packet::Binary(general_purpose::STANDARD.decode(packet_data)?.into()),
            c => return Err(Error::InvalidPacketType(Some(c))),
        };
        Ok(res)
    }
}

impl TryFrom<String> for Packet {
    type Error = crate::errors::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Packet::try_from(value.as_str())
    }
}

/// The payload of the open packet sent on handshake.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenPacket {
    sid: Sid,
    upgrades: Vec<String>,
    ping_interval: u64,
    ping_timeout: u64,
    max_payload: u64,
}

impl OpenPacket {
    /// Create a new [`OpenPacket`].
    ///
    /// Polling-origin sessions always advertise the websocket upgrade;
    /// websocket-origin sessions have nothing left to upgrade to.
    pub fn new(transport: TransportType, sid: Sid, config: &EngineIoConfig) -> Self {
        let upgrades = if transport == TransportType::Polling {
            vec!["websocket".to_string()]
        } else {
            vec![]
        };
        OpenPacket {
            sid,
            upgrades,
            ping_interval: config.ping_interval.as_millis() as u64,
            ping_timeout: config.ping_timeout.as_millis() as u64,
            max_payload: config.max_payload,
        }
    }
}
