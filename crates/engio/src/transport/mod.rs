//! The two transport adapters mediating between sessions and the underlying
//! HTTP or websocket I/O.

pub mod polling;
pub mod ws;
