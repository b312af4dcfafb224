//! Type Registry: type id -> nama diagnostik
//!
//! Tabel statis, dibangun saat compile dan tidak pernah berubah. Nama untuk
//! id yang tidak terdaftar dibuat per call (owned), tidak ada buffer global.

use std::borrow::Cow;

use super::message::Envelope;

/// Nama untuk envelope yang tidak ada (mis. decode gagal)
pub const NULL_MESSAGE: &str = "NULL_MESSAGE";

/// Entry registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeEntry {
    pub id: u32,
    pub name: &'static str,
    /// Body size tetap, jika shape-nya didefinisikan di crate ini
    pub body_size: Option<u32>,
}

const fn entry(id: u32, name: &'static str) -> TypeEntry {
    TypeEntry {
        id,
        name,
        body_size: None,
    }
}

const fn shape(id: u32, name: &'static str, body_size: u32) -> TypeEntry {
    TypeEntry {
        id,
        name,
        body_size: Some(body_size),
    }
}

// Id tersebar di beberapa komponen, jadi tabel ini ditulis manual.
static REGISTRY: &[TypeEntry] = &[
    shape(0x0000_0001, "CLOSE", 16),
    entry(0x0000_0100, "DBUS_CONNECT"),
    entry(0x0000_0101, "DBUS_DISCONNECT"),
    entry(0x0000_0102, "DBUS_CONNECTED"),
    shape(0x0000_0301, "STATE_CHANGE_IND", 16),
    shape(0x0000_0302, "STATE_QUERY", 12),
    shape(0x0000_0304, "SAVE_DATA_IND", 12),
    shape(0x0000_0305, "POWERUP_REQ", 12),
    shape(0x0000_0306, "SHUTDOWN_REQ", 12),
    shape(0x0000_0307, "SET_ALARM_STATE", 16),
    shape(0x0000_0308, "REBOOT_REQ", 12),
    shape(0x0000_0309, "STATE_REQ_DENIED_IND", 16),
    entry(0x0000_0310, "THERMAL_SHUTDOWN_IND"),
    entry(0x0000_0311, "SET_CHARGER_STATE"),
    entry(0x0000_0312, "SET_THERMAL_STATE"),
    entry(0x0000_0313, "SET_EMERGENCY_CALL_STATE"),
    entry(0x0000_0314, "SET_BATTERY_STATE"),
    entry(0x0000_0315, "BATTERY_EMPTY_IND"),
    entry(0x0000_0316, "SHUTDOWN"),
    entry(0x0000_0317, "SET_USB_STATE"),
    entry(0x0000_0318, "TELINIT"),
    entry(0x0000_0319, "CHANGE_RUNLEVEL"),
    entry(0x0000_031a, "SET_BATTERY_LEVEL"),
    entry(0x0000_0320, "SET_THERMAL_STATUS"),
    entry(0x0000_0500, "PROCESSWD_CREATE"),
    entry(0x0000_0501, "PROCESSWD_DELETE"),
    entry(0x0000_0502, "PROCESSWD_CLEAR"),
    entry(0x0000_0503, "PROCESSWD_SET_INTERVAL"),
    entry(0x0000_0504, "PROCESSWD_PING"),
    entry(0x0000_0505, "PROCESSWD_MANUAL_PING"),
    entry(0x0000_0506, "PROCESSWD_PONG"),
    entry(0x0000_0600, "WAIT"),
    entry(0x0000_0601, "WAKEUP"),
    entry(0x0000_0702, "HEARTBEAT"),
    entry(0x0000_0900, "ENTER_MALF"),
    shape(0x0000_1100, "GET_VERSION", 12),
    shape(0x0000_1101, "DSME_VERSION", 12),
    shape(0x0000_1102, "SET_TA_TEST_MODE", 12),
    entry(0x0000_1103, "SET_LOGGING_VERBOSITY"),
    entry(0x0000_1104, "ADD_LOGGING_INCLUDE"),
    entry(0x0000_1105, "ADD_LOGGING_EXCLUDE"),
    entry(0x0000_1106, "USE_LOGGING_DEFAULTS"),
    entry(0x0000_1337, "IDLE"),
    entry(0x0000_2000, "DISK_SPACE"),
];

/// Semua entry yang terdaftar
pub fn entries() -> &'static [TypeEntry] {
    REGISTRY
}

#[inline]
pub fn lookup(id: u32) -> Option<&'static TypeEntry> {
    REGISTRY.iter().find(|entry| entry.id == id)
}

/// Nama diagnostik untuk type id, tidak pernah gagal
///
/// Id yang tidak terdaftar menjadi `UNKNOWN_` + 8 digit hex lowercase.
pub fn name_of(id: u32) -> Cow<'static, str> {
    match lookup(id) {
        Some(entry) => Cow::Borrowed(entry.name),
        None => Cow::Owned(format!("UNKNOWN_{:08x}", id)),
    }
}

/// Nama diagnostik untuk envelope opsional
pub fn name_of_envelope(envelope: Option<&Envelope>) -> Cow<'static, str> {
    match envelope {
        Some(envelope) => name_of(envelope.type_id()),
        None => Cow::Borrowed(NULL_MESSAGE),
    }
}
