//! Self-Describing Envelope Format
//!
//! Layout (native byte order, peer di host/arsitektur yang sama):
//! ┌─────────────────────────────────────────────────────┐
//! │ EnvelopeHeader (12 bytes: total, body, type_id)     │
//! ├─────────────────────────────────────────────────────┤
//! │ Fixed payload fields (body_size - 12 bytes)         │
//! ├─────────────────────────────────────────────────────┤
//! │ Extra data (total_size - body_size bytes, opsional) │
//! └─────────────────────────────────────────────────────┘
//!
//! Header dibaca langsung dari byte buffer, tanpa pointer cast.

use std::fmt;
use std::mem;

use tracing::warn;

use super::registry::name_of;
use crate::error::{EnvelopeError, FrameError};

/// Header envelope - 3 field u32, fixed 12 bytes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnvelopeHeader {
    /// Jumlah bytes seluruh envelope (header + body + extra)
    pub total_size: u32,
    /// Jumlah bytes bagian fixed (header + payload fields)
    pub body_size: u32,
    /// Selector shape payload
    pub type_id: u32,
}

pub const HEADER_SIZE: usize = mem::size_of::<EnvelopeHeader>();
pub const MAX_FRAME_SIZE: usize = 65536; // 64KB max frame
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

impl EnvelopeHeader {
    #[inline(always)]
    pub const fn new(type_id: u32, body_size: u32, total_size: u32) -> Self {
        Self {
            total_size,
            body_size,
            type_id,
        }
    }

    /// Parse header dari awal buffer
    #[inline(always)]
    pub fn read(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            total_size: read_u32(buf, 0),
            body_size: read_u32(buf, 4),
            type_id: read_u32(buf, 8),
        })
    }

    #[inline(always)]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.total_size.to_ne_bytes());
        out[4..8].copy_from_slice(&self.body_size.to_ne_bytes());
        out[8..12].copy_from_slice(&self.type_id.to_ne_bytes());
        out
    }

    /// Clamped ke nol, header dari peer bisa saja `total < body`
    #[inline(always)]
    pub fn extra_size(&self) -> usize {
        self.total_size.saturating_sub(self.body_size) as usize
    }
}

/// Baca `total_size` dari buffer yang mungkin belum lengkap
#[inline(always)]
pub fn peek_total_size(buf: &[u8]) -> Option<u32> {
    (buf.len() >= 4).then(|| read_u32(buf, 0))
}

#[inline(always)]
fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_ne_bytes(raw)
}

/// Owned envelope: header + fixed body + extra bytes dalam satu buffer
///
/// Invariant: buffer minimal `HEADER_SIZE` bytes dan panjangnya sama dengan
/// `total_size` di header.
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    buf: Box<[u8]>,
}

impl Envelope {
    /// Alokasi envelope baru, semua bytes nol kecuali header
    ///
    /// Kehabisan memori dikembalikan sebagai `EnvelopeError::OutOfMemory`,
    /// caller yang memutuskan retry atau abort.
    pub fn allocate(type_id: u32, body_size: u32, extra_size: usize) -> Result<Self, EnvelopeError> {
        if (body_size as usize) < HEADER_SIZE {
            return Err(EnvelopeError::BodyTooSmall { body_size });
        }

        let total_size = u32::try_from(extra_size)
            .ok()
            .and_then(|extra| body_size.checked_add(extra))
            .ok_or(EnvelopeError::SizeOverflow {
                body_size,
                extra_size,
            })?;

        let len = total_size as usize;
        let mut buf = Vec::new();
        if buf.try_reserve_exact(len).is_err() {
            warn!(type_id, requested = len, "envelope allocation failed");
            return Err(EnvelopeError::OutOfMemory { requested: len });
        }
        buf.resize(len, 0);

        let header = EnvelopeHeader::new(type_id, body_size, total_size);
        buf[..HEADER_SIZE].copy_from_slice(&header.to_bytes());

        Ok(Self {
            buf: buf.into_boxed_slice(),
        })
    }

    /// Decode frame mentah yang diterima dari transport
    ///
    /// Hanya header yang divalidasi. `body_size > total_size` tetap diterima;
    /// accessor extra data dan downcast yang menolak membaca di luar buffer.
    pub fn from_bytes(buf: Vec<u8>) -> Result<Self, FrameError> {
        let header = EnvelopeHeader::read(&buf).ok_or(FrameError::Truncated { len: buf.len() })?;

        if (header.total_size as usize) < HEADER_SIZE {
            return Err(FrameError::TooShort {
                total_size: header.total_size,
            });
        }
        if header.total_size as usize != buf.len() {
            return Err(FrameError::LengthMismatch {
                declared: header.total_size,
                actual: buf.len(),
            });
        }

        Ok(Self {
            buf: buf.into_boxed_slice(),
        })
    }

    #[inline(always)]
    pub fn header(&self) -> EnvelopeHeader {
        EnvelopeHeader {
            total_size: self.total_size(),
            body_size: self.body_size(),
            type_id: self.type_id(),
        }
    }

    #[inline(always)]
    pub fn type_id(&self) -> u32 {
        read_u32(&self.buf, 8)
    }

    #[inline(always)]
    pub fn body_size(&self) -> u32 {
        read_u32(&self.buf, 4)
    }

    #[inline(always)]
    pub fn total_size(&self) -> u32 {
        read_u32(&self.buf, 0)
    }

    #[inline(always)]
    pub fn extra_size(&self) -> usize {
        self.total_size().saturating_sub(self.body_size()) as usize
    }

    /// View ke extra bytes, `None` jika tidak ada
    #[inline(always)]
    pub fn extra_data(&self) -> Option<&[u8]> {
        let extra = self.extra_size();
        if extra == 0 {
            return None;
        }
        let start = self.body_size() as usize;
        self.buf.get(start..start + extra)
    }

    /// Akses tulis ke extra bytes untuk producer
    #[inline(always)]
    pub fn extra_data_mut(&mut self) -> Option<&mut [u8]> {
        let extra = self.extra_size();
        if extra == 0 {
            return None;
        }
        let start = self.body_size() as usize;
        self.buf.get_mut(start..start + extra)
    }

    /// Extra data sebagai C string (sampai NUL pertama)
    pub fn extra_str(&self) -> Option<&str> {
        let extra = self.extra_data()?;
        let nul = extra.iter().position(|&b| b == 0)?;
        std::str::from_utf8(&extra[..nul]).ok()
    }

    /// Fixed body (header + payload fields), `None` jika body_size melebihi buffer
    #[inline(always)]
    pub fn body(&self) -> Option<&[u8]> {
        self.buf.get(..self.body_size() as usize)
    }

    /// Payload fields setelah header
    #[inline(always)]
    pub(crate) fn fields_mut(&mut self) -> Option<&mut [u8]> {
        let end = self.body_size() as usize;
        self.buf.get_mut(HEADER_SIZE..end)
    }

    /// Frame lengkap siap dikirim
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Serahkan buffer ke transport
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.into_vec()
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}/{}/{})",
            name_of(self.type_id()),
            self.total_size(),
            self.body_size(),
            self.extra_size()
        )
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("name", &name_of(self.type_id()))
            .field("type_id", &format_args!("{:#010x}", self.type_id()))
            .field("total_size", &self.total_size())
            .field("body_size", &self.body_size())
            .field("extra_size", &self.extra_size())
            .finish()
    }
}
