//! DSME Protocol - Self-Describing Message Envelope
//!
//! Arsitektur:
//! - Flat Binary: 3 field u32 (total, body, type) lalu payload fixed
//! - Size-Checked: downcast hanya jika body size DAN type id cocok
//! - Extendable: extra bytes opsional setelah body
//! - Transport-Agnostic: framing di atas `Read + Write` apa saja

pub mod error;
pub mod network;
pub mod protocol;

pub use error::{EnvelopeError, FrameError, ProtocolError, Result};
pub use network::{Connection, ConnectionConfig, ConnectionId, Hub};
pub use protocol::{
    name_of, name_of_envelope, Decoder, Encoder, Envelope, EnvelopeHeader, FrameConfig, Message,
    MessageShape, HEADER_SIZE, MAX_FRAME_SIZE,
};
