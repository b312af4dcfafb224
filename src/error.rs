//! Error types untuk envelope, framing, dan transport.
//!
//! Shape mismatch dan unknown type id bukan error: keduanya normal control
//! flow (lihat `Envelope::downcast` dan `registry::name_of`).

use std::io;

/// Kegagalan saat membuat envelope baru
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    /// Buffer tidak bisa dialokasikan
    #[error("out of memory allocating {requested} byte envelope")]
    OutOfMemory { requested: usize },

    /// Body harus minimal memuat header 12 bytes
    #[error("body size {body_size} is smaller than the envelope header")]
    BodyTooSmall { body_size: u32 },

    /// body_size + extra_size tidak muat di u32
    #[error("envelope size overflow: body {body_size} + extra {extra_size}")]
    SizeOverflow { body_size: u32, extra_size: usize },
}

/// Frame dari wire yang tidak valid
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame of {len} bytes is shorter than the envelope header")]
    Truncated { len: usize },

    #[error("declared total size {total_size} is shorter than the envelope header")]
    TooShort { total_size: u32 },

    #[error("declared total size {total_size} exceeds limit {max}")]
    TooLarge { total_size: u32, max: usize },

    #[error("declared total size {declared} does not match buffer length {actual}")]
    LengthMismatch { declared: u32, actual: usize },
}

/// Error di level transport adapter
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("connection is not open")]
    NotConnected,
}

pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;
