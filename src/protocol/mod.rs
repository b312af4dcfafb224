//! Protocol Layer: Self-Describing Envelope
//!
//! Prinsip desain:
//! - Flat Binary: 3 field u32 lalu payload dengan layout tetap
//! - Double check: downcast butuh body size DAN type id yang cocok
//! - Diagnostik tidak pernah gagal: setiap id punya nama

mod encoder;
mod message;
pub mod registry;
pub mod shapes;

pub use encoder::{Decoder, Encoder, FrameConfig};
pub use message::{
    peek_total_size, Envelope, EnvelopeHeader, DEFAULT_BUFFER_SIZE, HEADER_SIZE, MAX_FRAME_SIZE,
};
pub use registry::{lookup, name_of, name_of_envelope, TypeEntry, NULL_MESSAGE};
pub use shapes::{CloseReason, DeviceState, Message, MessageShape};
