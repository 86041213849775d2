use engio::sid::Sid;
use engio::DisconnectReason as EIoDisconnectReason;

/// Protocol-level errors raised while decoding or dispatching packets.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("error serializing json packet: {0:?}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid packet type")]
    InvalidPacketType,

    #[error("invalid ack id")]
    InvalidAckId,

    #[error("invalid event name")]
    InvalidEventName,

    #[error("invalid packet payload")]
    InvalidPayload,

    #[error("invalid binary placeholder")]
    InvalidBinaryPlaceholder,

    #[error("cannot find socket for session: {0:?}")]
    SocketGone(Sid),
}

/// Convert an [`Error`] into the engine close reason it implies, if any.
/// Framing errors are fatal for the whole session; a missing namespace
/// socket only drops the packet.
impl From<&Error> for Option<EIoDisconnectReason> {
    fn from(err: &Error) -> Self {
        use Error::*;
        match err {
            Serialize(_) | InvalidPacketType | InvalidAckId | InvalidEventName
            | InvalidPayload | InvalidBinaryPlaceholder => {
                Some(EIoDisconnectReason::PacketParsingError)
            }
            SocketGone(_) => None,
        }
    }
}

/// Error returned when sending a packet to a client fails.
#[derive(thiserror::Error, Debug)]
pub enum SendError {
    #[error("error serializing json packet: {0:?}")]
    Serialize(#[from] serde_json::Error),
    #[error("internal channel full")]
    ChannelFull,
    #[error("socket closed")]
    Closed,
}

/// Error yielded while waiting for an acknowledgement.
#[derive(thiserror::Error, Debug)]
pub enum AckError {
    #[error("error serializing json packet: {0:?}")]
    Serialize(#[from] serde_json::Error),
    #[error("ack timeout")]
    Timeout,
    #[error("socket closed before the ack arrived")]
    SocketClosed,
    #[error("send error: {0}")]
    Send(#[from] SendError),
}

/// Error returned when a broadcast partially or completely fails.
/// Unreachable peers only lose the message, their sessions stay open.
#[derive(thiserror::Error, Debug)]
pub enum BroadcastError {
    #[error("error serializing json packet: {0:?}")]
    Serialize(#[from] serde_json::Error),
    #[error("sending errors: {0:?}")]
    Send(Vec<SendError>),
}

impl From<Vec<SendError>> for BroadcastError {
    fn from(errors: Vec<SendError>) -> Self {
        Self::Send(errors)
    }
}
