//! Zero-Allocation Encoder / Frame Decoder
//!
//! Encoder menulis frame ke pre-allocated buffer. Decoder memecah byte
//! stream menjadi owned envelope satu per frame.

use tracing::trace;

use super::message::{peek_total_size, Envelope, HEADER_SIZE, MAX_FRAME_SIZE};
use super::registry::name_of;
use crate::error::{EnvelopeError, FrameError};

/// Batas framing yang dipakai decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Frame dengan total_size lebih besar dianggap out of sync
    pub max_frame_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl FrameConfig {
    /// Validasi total_size yang dibaca dari header
    #[inline(always)]
    pub fn check_total_size(&self, total_size: u32) -> Result<usize, FrameError> {
        let total = total_size as usize;
        if total < HEADER_SIZE {
            return Err(FrameError::TooShort { total_size });
        }
        if total > self.max_frame_size {
            return Err(FrameError::TooLarge {
                total_size,
                max: self.max_frame_size,
            });
        }
        Ok(total)
    }
}

/// Pre-allocated encoder buffer
///
/// Semua operasi encode dilakukan ke buffer internal,
/// tidak ada alokasi dinamis.
pub struct Encoder {
    buffer: Box<[u8]>,
    write_pos: usize,
}

impl Encoder {
    /// Membuat encoder dengan buffer size tertentu
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity].into_boxed_slice(),
            write_pos: 0,
        }
    }

    /// Seperti `new`, tapi kehabisan memori dikembalikan sebagai error
    pub fn try_new(capacity: usize) -> Result<Self, EnvelopeError> {
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(capacity)
            .map_err(|_| EnvelopeError::OutOfMemory {
                requested: capacity,
            })?;
        buffer.resize(capacity, 0);
        Ok(Self {
            buffer: buffer.into_boxed_slice(),
            write_pos: 0,
        })
    }

    /// Kapasitas buffer dalam bytes
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Reset encoder untuk reuse
    #[inline(always)]
    pub fn reset(&mut self) {
        self.write_pos = 0;
    }

    /// Encode envelope plus extra tambahan ke buffer
    ///
    /// `extra` ditambahkan setelah extra data yang sudah ada di envelope dan
    /// `total_size` di header ikut dinaikkan. Returns slice ke frame, atau
    /// None jika buffer penuh.
    #[inline(always)]
    pub fn encode(&mut self, envelope: &Envelope, extra: &[u8]) -> Option<&[u8]> {
        let frame = envelope.as_bytes();
        let total_size = frame.len().checked_add(extra.len())?;
        let declared = u32::try_from(total_size).ok()?;

        if self.write_pos + total_size > self.buffer.len() {
            return None;
        }

        let start = self.write_pos;
        let body_end = start + frame.len();

        let mut header = envelope.header();
        header.total_size = declared;

        self.buffer[start..start + HEADER_SIZE].copy_from_slice(&header.to_bytes());
        self.buffer[start + HEADER_SIZE..body_end].copy_from_slice(&frame[HEADER_SIZE..]);
        self.buffer[body_end..start + total_size].copy_from_slice(extra);

        self.write_pos += total_size;

        trace!(
            name = %name_of(header.type_id),
            total_size,
            "encoded frame"
        );

        Some(&self.buffer[start..self.write_pos])
    }

    /// Get current buffer content
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.write_pos]
    }

    /// Available space in buffer
    #[inline(always)]
    pub fn available(&self) -> usize {
        self.buffer.len() - self.write_pos
    }
}

/// Frame decoder di atas byte slice
pub struct Decoder<'a> {
    buffer: &'a [u8],
    read_pos: usize,
    config: FrameConfig,
}

impl<'a> Decoder<'a> {
    /// Membuat decoder dari buffer
    #[inline(always)]
    pub fn new(buffer: &'a [u8]) -> Self {
        Self::with_config(buffer, FrameConfig::default())
    }

    #[inline(always)]
    pub fn with_config(buffer: &'a [u8], config: FrameConfig) -> Self {
        Self {
            buffer,
            read_pos: 0,
            config,
        }
    }

    /// Decode frame berikutnya
    ///
    /// `Ok(None)` jika sisa buffer belum berisi satu frame utuh. Setelah
    /// error, stream dianggap out of sync dan posisi baca tidak maju.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<Envelope>, FrameError> {
        let rest = &self.buffer[self.read_pos..];
        if rest.len() < HEADER_SIZE {
            return Ok(None);
        }

        let total_size = peek_total_size(rest).unwrap_or(0);
        let total = self.config.check_total_size(total_size)?;
        if rest.len() < total {
            return Ok(None);
        }

        let envelope = Envelope::from_bytes(rest[..total].to_vec())?;
        self.read_pos += total;

        trace!(name = %name_of(envelope.type_id()), total, "decoded frame");

        Ok(Some(envelope))
    }

    /// Remaining bytes
    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.read_pos)
    }
}
