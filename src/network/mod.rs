//! Network Layer: Transport Adapter
//!
//! Framing envelope di atas stream apa saja (`UnixStream`, `TcpStream`,
//! buffer in-memory). Connect/accept dan polling ada di tangan caller.

mod connection;
mod hub;

pub use connection::{Connection, ConnectionConfig};
pub use hub::{ConnectionId, Hub};
