//! Polling payload codec.
//!
//! A polling payload is a batch of packets joined with the `0x1E` record
//! separator. Binary messages are framed as `b<base64>` segments, which the
//! [`Packet`] codec itself produces and consumes.

use bytes::Bytes;
use tokio::sync::MutexGuard;
use tracing::debug;

use crate::errors::Error;
use crate::packet::Packet;
use crate::peekable::PeekableReceiver;
use crate::socket::PacketBuf;

/// Record separator between packets in a polling payload.
pub const PACKET_SEPARATOR: u8 = 0x1e;

/// Try to take the next packet buffer off the queue if the whole buffer still
/// fits under `max_payload` once encoded. Buffers that do not fit stay queued
/// for the next poll.
///
/// The channel is closed when a close packet goes through so the socket
/// learns that the session is over.
fn try_recv_buf(
    rx: &mut MutexGuard<'_, PeekableReceiver<PacketBuf>>,
    payload_len: usize,
    max_payload: u64,
) -> Option<PacketBuf> {
    if let Some(packets) = rx.peek() {
        let size = packets.iter().map(|p| p.get_size_hint(true)).sum::<usize>();
        if (payload_len + size) as u64 > max_payload {
            debug!("payload full, deferring remaining packets to the next poll");
            return None;
        }
    }

    let buf = rx.try_recv().ok();
    if buf.as_ref().and_then(|b| b.first()) == Some(&Packet::Close) {
        rx.close();
    }
    buf
}

fn push_buf(buf: PacketBuf, data: &mut String) -> Result<(), Error> {
    for packet in buf {
        let packet: String = packet.try_into()?;
        if !data.is_empty() {
            data.push(PACKET_SEPARATOR as char);
        }
        data.push_str(&packet);
    }
    Ok(())
}

/// Encode queued packets into a single polling payload, bounded by
/// `max_payload` bytes. If the queue is empty the future suspends until a
/// packet is available, so a poll request blocks until there is something to
/// deliver (the heartbeat ping at the latest).
pub(crate) async fn encoder(
    mut rx: MutexGuard<'_, PeekableReceiver<PacketBuf>>,
    max_payload: u64,
) -> Result<String, Error> {
    let mut data = String::new();

    const SEPARATOR_LEN: usize = 1;
    while let Some(buf) = try_recv_buf(&mut rx, data.len() + SEPARATOR_LEN, max_payload) {
        push_buf(buf, &mut data)?;
    }

    // Nothing was queued, wait for the next packet
    if data.is_empty() {
        let buf = rx.recv().await.ok_or(Error::Aborted)?;
        if buf.first() == Some(&Packet::Close) {
            rx.close();
        }
        push_buf(buf, &mut data)?;
    }
    Ok(data)
}

/// Decode a polling payload body into packets.
///
/// The caller has already bounded the body to `max_payload` bytes, so this is
/// a plain split on the record separator.
pub(crate) fn decoder(body: &Bytes) -> impl Iterator<Item = Result<Packet, Error>> + '_ {
    body.split(|c| *c == PACKET_SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            std::str::from_utf8(segment)
                .map_err(Error::StrUtf8)
                .and_then(Packet::try_from)
        })
}
