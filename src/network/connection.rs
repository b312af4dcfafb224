//! Connection: framing envelope di atas stream `Read + Write`
//!
//! Lifecycle socket (connect/accept) bukan urusan modul ini. Caller membuat
//! stream, lalu `Connection` membaca frame utuh dan menulis frame lengkap.
//!
//! Pada EOF, error I/O, atau frame out of sync, `receive` mengembalikan
//! envelope `Close` sintetis dan connection ditandai tertutup.

use std::io::{self, Read, Write};
use std::mem;

use tracing::{debug, trace, warn};

use crate::error::{EnvelopeError, FrameError, ProtocolError, Result};
use crate::protocol::shapes::{Close, CloseReason};
use crate::protocol::{
    name_of, peek_total_size, Encoder, Envelope, FrameConfig, DEFAULT_BUFFER_SIZE, HEADER_SIZE,
    MAX_FRAME_SIZE,
};

/// Konfigurasi buffer per connection
///
/// Biaya memori per connection: read buffer mulai dari `initial_buffer_size`
/// dan tumbuh sampai ukuran frame terbesar yang diterima, plus encoder
/// sebesar `max_frame_size` yang baru dialokasikan saat `send` pertama.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Kapasitas awal read buffer
    pub initial_buffer_size: usize,
    /// Frame lebih besar dari ini dianggap out of sync; juga kapasitas encoder
    pub max_frame_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            initial_buffer_size: DEFAULT_BUFFER_SIZE,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

enum ReadOutcome {
    Complete,
    WouldBlock,
    Eof,
    Failed(io::Error),
}

/// Envelope connection di atas satu stream
pub struct Connection<S> {
    stream: S,
    is_open: bool,
    read_buffer: Vec<u8>,
    // Lazy: banyak connection hanya menerima
    encoder: Option<Encoder>,
    config: ConnectionConfig,
}

impl<S: Read + Write> Connection<S> {
    pub fn new(stream: S) -> Self {
        Self::with_config(stream, ConnectionConfig::default())
    }

    pub fn with_config(stream: S, config: ConnectionConfig) -> Self {
        Self {
            stream,
            is_open: true,
            read_buffer: Vec::new(),
            encoder: None,
            config,
        }
    }

    #[inline(always)]
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Terima satu frame utuh
    ///
    /// - `Ok(Some(envelope))`: frame lengkap, atau `Close` sintetis
    /// - `Ok(None)`: belum ada frame lengkap (would block / interrupted),
    ///   data parsial disimpan untuk call berikutnya
    /// - `Err`: alokasi buffer gagal, connection tetap terbuka untuk retry
    pub fn receive(&mut self) -> Result<Option<Envelope>> {
        if !self.is_open {
            return self.close_envelope(CloseReason::Error).map(Some);
        }

        if self.read_buffer.capacity() == 0 {
            reserve(&mut self.read_buffer, self.config.initial_buffer_size)?;
        }

        // Header dulu, baru sisa frame
        let outcome = match self.fill_to(HEADER_SIZE)? {
            ReadOutcome::Complete => {
                let total_size = peek_total_size(&self.read_buffer).unwrap_or(0);
                let frame = FrameConfig {
                    max_frame_size: self.config.max_frame_size,
                };
                match frame.check_total_size(total_size) {
                    Ok(total) => self.fill_to(total)?,
                    Err(err) => {
                        warn!(%err, "frame out of sync");
                        return self.shutdown(CloseReason::OutOfSync).map(Some);
                    }
                }
            }
            other => other,
        };

        match outcome {
            ReadOutcome::Complete => {
                let frame = mem::take(&mut self.read_buffer);
                let envelope = Envelope::from_bytes(frame)?;
                trace!(name = %name_of(envelope.type_id()), "received frame");
                Ok(Some(envelope))
            }
            ReadOutcome::WouldBlock => {
                debug!(buffered = self.read_buffer.len(), "no complete frame yet");
                Ok(None)
            }
            ReadOutcome::Eof => self.shutdown(CloseReason::Eof).map(Some),
            ReadOutcome::Failed(err) => {
                debug!(%err, "receive failed");
                self.shutdown(CloseReason::Error).map(Some)
            }
        }
    }

    pub fn send(&mut self, envelope: &Envelope) -> Result<usize> {
        self.send_with_extra(envelope, &[])
    }

    /// Kirim envelope dengan extra tambahan di ujung frame
    pub fn send_with_extra(&mut self, envelope: &Envelope, extra: &[u8]) -> Result<usize> {
        if !self.is_open {
            return Err(ProtocolError::NotConnected);
        }

        let total = envelope.as_bytes().len() + extra.len();
        let too_large = FrameError::TooLarge {
            total_size: u32::try_from(total).unwrap_or(u32::MAX),
            max: self.config.max_frame_size,
        };
        if total > self.config.max_frame_size {
            return Err(too_large.into());
        }

        let encoder = match self.encoder.take() {
            Some(encoder) => encoder,
            None => Encoder::try_new(self.config.max_frame_size)?,
        };
        let encoder = self.encoder.insert(encoder);
        encoder.reset();
        let frame = encoder.encode(envelope, extra).ok_or(too_large)?;
        self.stream.write_all(frame)?;

        trace!(name = %name_of(envelope.type_id()), total, "sent frame");
        Ok(frame.len())
    }

    /// Tandai tertutup; stream tetap dimiliki connection
    pub fn close(&mut self) {
        if self.is_open {
            debug!("connection closed locally");
        }
        self.is_open = false;
        self.read_buffer = Vec::new();
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Baca sampai buffer berisi `target` bytes
    fn fill_to(&mut self, target: usize) -> Result<ReadOutcome, EnvelopeError> {
        let len = self.read_buffer.len();
        if len < target {
            reserve(&mut self.read_buffer, target - len)?;
        }

        while self.read_buffer.len() < target {
            let start = self.read_buffer.len();
            self.read_buffer.resize(target, 0);

            match self.stream.read(&mut self.read_buffer[start..]) {
                Ok(0) => {
                    self.read_buffer.truncate(start);
                    return Ok(ReadOutcome::Eof);
                }
                Ok(n) => self.read_buffer.truncate(start + n),
                Err(ref e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::Interrupted =>
                {
                    self.read_buffer.truncate(start);
                    return Ok(ReadOutcome::WouldBlock);
                }
                Err(e) => {
                    self.read_buffer.truncate(start);
                    return Ok(ReadOutcome::Failed(e));
                }
            }
        }

        Ok(ReadOutcome::Complete)
    }

    fn shutdown(&mut self, reason: CloseReason) -> Result<Envelope> {
        debug!(?reason, "connection closed");
        self.close();
        self.close_envelope(reason)
    }

    fn close_envelope(&self, reason: CloseReason) -> Result<Envelope> {
        Ok(Envelope::from_shape(&Close::new(reason), 0)?)
    }
}

fn reserve(buffer: &mut Vec<u8>, additional: usize) -> Result<(), EnvelopeError> {
    buffer
        .try_reserve_exact(additional)
        .map_err(|_| EnvelopeError::OutOfMemory {
            requested: buffer.len() + additional,
        })
}
