//! Engine.IO v4 server implementation: session registry, long-polling and
//! websocket transports, heartbeat and transport upgrade.
//!
//! The crate exposes a [`tower::Service`] ([`service::EngineIoService`]) and
//! a [`tower::Layer`] ([`layer::EngineIoLayer`]) so the engine can be mounted
//! in any hyper compatible host. Application logic plugs in through the
//! [`handler::EngineIoHandler`] trait; the Socket.IO layer in the `sockio`
//! crate is its main consumer.

pub mod config;
pub mod errors;
pub mod handler;
pub mod layer;
pub mod service;
pub mod sid;
pub mod socket;

pub mod body;

mod engine;
mod packet;
mod payload;
mod peekable;
mod transport;

pub use engine::EngineIo;
pub use packet::{OpenPacket, Packet};
pub use service::TransportType;
pub use socket::{DisconnectReason, Socket};
