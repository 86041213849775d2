//! Socket.IO v5 server core on top of the `engio` Engine.IO implementation.
//!
//! Packets decoded by the engine flow through the [`client::Client`] into
//! namespaces, which dispatch events to registered handlers; emits and
//! broadcasts go back out through the engine's per-session outbound queue.
//! Room fan-out goes through the [`channel::ChannelLayer`] seam, in-memory
//! by default.
//!
//! ```no_run
//! use sockio::{ns::NsBuilder, SockIo};
//!
//! let (svc, io) = SockIo::new_svc();
//! io.ns(
//!     "/",
//!     NsBuilder::new()
//!         .on("message", |socket, data, _bin, _ack| async move {
//!             socket.emit("message-back", data).ok();
//!         })
//!         .build(),
//! );
//! // mount `svc` on a hyper server
//! ```

pub mod channel;
pub mod client;
pub mod config;
pub mod errors;
pub mod handler;
pub mod io;
pub mod layer;
pub mod ns;
pub mod operators;
pub mod packet;
pub mod service;
pub mod socket;

pub use channel::{ChannelLayer, LocalLayer, Room, SendOptions};
pub use engio::sid::Sid;
pub use errors::{AckError, BroadcastError, SendError};
pub use handler::AckSender;
pub use io::{SockIo, SockIoBuilder};
pub use ns::NsBuilder;
pub use socket::{AckResponse, DisconnectReason, Socket};
