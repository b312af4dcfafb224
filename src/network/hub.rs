//! Hub: registry connection yang terbuka untuk broadcast
//!
//! Daemon menaruh setiap connection client di sini supaya indikasi state
//! bisa dikirim ke semua client sekaligus.

use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};

use tracing::{debug, warn};

use super::Connection;
use crate::error::ProtocolError;
use crate::protocol::{name_of, Envelope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

pub struct Hub<S> {
    connections: HashMap<ConnectionId, Connection<S>>,
    next_id: u64,
}

impl<S> Default for Hub<S> {
    fn default() -> Self {
        Self {
            connections: HashMap::new(),
            next_id: 1,
        }
    }
}

impl<S: Read + Write> Hub<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, connection: Connection<S>) -> ConnectionId {
        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        self.connections.insert(id, connection);
        debug!(%id, "connection registered");
        id
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection<S>> {
        self.connections.remove(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Connection<S>> {
        self.connections.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.connections.keys().copied()
    }

    /// Buang connection yang sudah tertutup, returns jumlah yang dibuang
    pub fn prune_closed(&mut self) -> usize {
        let before = self.connections.len();
        self.connections.retain(|_, conn| conn.is_open());
        before - self.connections.len()
    }

    pub fn broadcast(&mut self, envelope: &Envelope) -> usize {
        self.broadcast_with_extra(envelope, &[])
    }

    /// Kirim ke semua connection, returns jumlah yang berhasil
    ///
    /// Kegagalan per connection di-log lalu dilewati.
    pub fn broadcast_with_extra(&mut self, envelope: &Envelope, extra: &[u8]) -> usize {
        let mut sent = 0;
        for (id, conn) in self.connections.iter_mut() {
            match conn.send_with_extra(envelope, extra) {
                Ok(_) => sent += 1,
                Err(ProtocolError::NotConnected) => {
                    debug!(%id, "skipping closed connection");
                }
                Err(err) => {
                    warn!(%id, %err, name = %name_of(envelope.type_id()), "broadcast failed");
                }
            }
        }
        sent
    }
}
