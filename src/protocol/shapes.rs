//! Concrete payload shapes dan typed decode
//!
//! Setiap shape punya type id dan body size tetap. Field ditulis/dibaca
//! eksplisit pada offset tetap (native byte order), tidak ada cast struct
//! langsung dari buffer.

use tracing::trace;

use super::message::{Envelope, HEADER_SIZE};
use super::registry::name_of;
use crate::error::EnvelopeError;

/// Shape payload dengan type id dan body size tetap
pub trait MessageShape: Sized {
    const TYPE_ID: u32;
    /// Header + payload fields, dalam bytes
    const BODY_SIZE: u32;

    /// Tulis field ke `fields` (body setelah header, panjang `BODY_SIZE - 12`)
    fn write_fields(&self, _fields: &mut [u8]) {}

    /// Baca field dari `fields`; panjang sudah divalidasi oleh downcast
    fn read_fields(fields: &[u8]) -> Self;
}

impl Envelope {
    /// Alokasi envelope untuk shape tertentu dengan ruang extra
    pub fn from_shape<S: MessageShape>(shape: &S, extra_size: usize) -> Result<Self, EnvelopeError> {
        let mut envelope = Self::allocate(S::TYPE_ID, S::BODY_SIZE, extra_size)?;
        if let Some(fields) = envelope.fields_mut() {
            shape.write_fields(fields);
        }
        Ok(envelope)
    }

    /// Alokasi envelope dan copy extra bytes
    pub fn with_extra<S: MessageShape>(shape: &S, extra: &[u8]) -> Result<Self, EnvelopeError> {
        let mut envelope = Self::from_shape(shape, extra.len())?;
        if let Some(dst) = envelope.extra_data_mut() {
            dst.copy_from_slice(extra);
        }
        Ok(envelope)
    }

    /// Cek apakah body size DAN type id cocok dengan shape `S`
    #[inline(always)]
    pub fn is<S: MessageShape>(&self) -> bool {
        self.body_size() == S::BODY_SIZE && self.type_id() == S::TYPE_ID
    }

    /// Typed view ke body, `None` jika bukan shape `S`
    ///
    /// Bukan error: ini cara normal untuk probe "apakah ini pesan yang saya
    /// tunggu?" dalam dispatch chain.
    pub fn downcast<S: MessageShape>(&self) -> Option<S> {
        if !self.is::<S>() {
            return None;
        }
        // Shape dengan BODY_SIZE < HEADER_SIZE tidak punya field
        let fields = self.body()?.get(HEADER_SIZE..)?;
        Some(S::read_fields(fields))
    }
}

#[inline(always)]
fn read_i32(fields: &[u8], offset: usize) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&fields[offset..offset + 4]);
    i32::from_ne_bytes(raw)
}

#[inline(always)]
fn write_i32(fields: &mut [u8], offset: usize, value: i32) {
    fields[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
}

/// Alasan connection ditutup
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Protocol out of sync (local)
    OutOfSync = 0,
    /// EOF dari socket (local)
    Eof = 1,
    /// Peer minta close
    Requested = 2,
    /// Error lain atau read setelah close
    Error = 3,
}

impl CloseReason {
    #[inline(always)]
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::OutOfSync,
            1 => Self::Eof,
            2 => Self::Requested,
            _ => Self::Error,
        }
    }
}

/// Device state seperti yang dilaporkan daemon
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    NotSet = -1,
    Shutdown = 0,
    User = 2,
    ActDead = 5,
    Reboot = 6,
    Test = 7,
    Malf = 8,
    Boot = 9,
    Local = 10,
}

impl DeviceState {
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            -1 => Some(Self::NotSet),
            0 => Some(Self::Shutdown),
            2 => Some(Self::User),
            5 => Some(Self::ActDead),
            6 => Some(Self::Reboot),
            7 => Some(Self::Test),
            8 => Some(Self::Malf),
            9 => Some(Self::Boot),
            10 => Some(Self::Local),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Close {
    pub reason: CloseReason,
}

impl Close {
    pub fn new(reason: CloseReason) -> Self {
        Self { reason }
    }
}

impl MessageShape for Close {
    const TYPE_ID: u32 = 0x0000_0001;
    const BODY_SIZE: u32 = 16;

    fn write_fields(&self, fields: &mut [u8]) {
        fields[0] = self.reason as u8;
    }

    fn read_fields(fields: &[u8]) -> Self {
        Self {
            reason: CloseReason::from_u8(fields[0]),
        }
    }
}

/// Shape dengan satu field device state (raw i32)
macro_rules! state_shape {
    ($(#[$meta:meta])* $name:ident, $id:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            pub state: i32,
        }

        impl $name {
            pub fn new(state: DeviceState) -> Self {
                Self { state: state as i32 }
            }

            /// `None` jika nilai raw tidak dikenal
            pub fn state(&self) -> Option<DeviceState> {
                DeviceState::from_i32(self.state)
            }
        }

        impl MessageShape for $name {
            const TYPE_ID: u32 = $id;
            const BODY_SIZE: u32 = 16;

            fn write_fields(&self, fields: &mut [u8]) {
                write_i32(fields, 0, self.state);
            }

            fn read_fields(fields: &[u8]) -> Self {
                Self {
                    state: read_i32(fields, 0),
                }
            }
        }
    };
}

/// Shape tanpa payload field, hanya header
macro_rules! header_only_shape {
    ($(#[$meta:meta])* $name:ident, $id:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name;

        impl MessageShape for $name {
            const TYPE_ID: u32 = $id;
            const BODY_SIZE: u32 = HEADER_SIZE as u32;

            fn read_fields(_fields: &[u8]) -> Self {
                Self
            }
        }
    };
}

state_shape!(
    /// Broadcast perubahan state
    StateChangeInd,
    0x0000_0301
);
state_shape!(
    /// Request state ditolak, alasan dikirim sebagai extra string
    StateReqDeniedInd,
    0x0000_0309
);

header_only_shape!(StateQuery, 0x0000_0302);
header_only_shape!(SaveDataInd, 0x0000_0304);
header_only_shape!(PowerupReq, 0x0000_0305);
header_only_shape!(ShutdownReq, 0x0000_0306);
header_only_shape!(RebootReq, 0x0000_0308);
header_only_shape!(GetVersion, 0x0000_1100);
header_only_shape!(
    /// Versi daemon dikirim sebagai extra string
    DsmeVersion,
    0x0000_1101
);
header_only_shape!(
    /// TA = Type Approval
    SetTaTestMode,
    0x0000_1102
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetAlarmState {
    pub alarm_set: bool,
}

impl MessageShape for SetAlarmState {
    const TYPE_ID: u32 = 0x0000_0307;
    const BODY_SIZE: u32 = 16;

    fn write_fields(&self, fields: &mut [u8]) {
        fields[0] = self.alarm_set as u8;
    }

    fn read_fields(fields: &[u8]) -> Self {
        Self {
            alarm_set: fields[0] != 0,
        }
    }
}

/// Closed set semua shape yang dikenal crate ini
///
/// Setiap variant hanya dibuat lewat `Envelope::downcast`, jadi tidak ada
/// payload yang terlihat lewat shape yang belum divalidasi.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Close(Close),
    StateChangeInd(StateChangeInd),
    StateQuery(StateQuery),
    SaveDataInd(SaveDataInd),
    PowerupReq(PowerupReq),
    ShutdownReq(ShutdownReq),
    SetAlarmState(SetAlarmState),
    RebootReq(RebootReq),
    StateReqDeniedInd(StateReqDeniedInd),
    GetVersion(GetVersion),
    DsmeVersion(DsmeVersion),
    SetTaTestMode(SetTaTestMode),
    /// Id tidak dikenal, atau id dikenal dengan body size yang salah
    Unknown { type_id: u32, body_size: u32 },
}

impl Message {
    pub fn decode(envelope: &Envelope) -> Self {
        let decoded = match envelope.type_id() {
            Close::TYPE_ID => envelope.downcast::<Close>().map(Self::Close),
            StateChangeInd::TYPE_ID => envelope.downcast::<StateChangeInd>().map(Self::StateChangeInd),
            StateQuery::TYPE_ID => envelope.downcast::<StateQuery>().map(Self::StateQuery),
            SaveDataInd::TYPE_ID => envelope.downcast::<SaveDataInd>().map(Self::SaveDataInd),
            PowerupReq::TYPE_ID => envelope.downcast::<PowerupReq>().map(Self::PowerupReq),
            ShutdownReq::TYPE_ID => envelope.downcast::<ShutdownReq>().map(Self::ShutdownReq),
            SetAlarmState::TYPE_ID => envelope.downcast::<SetAlarmState>().map(Self::SetAlarmState),
            RebootReq::TYPE_ID => envelope.downcast::<RebootReq>().map(Self::RebootReq),
            StateReqDeniedInd::TYPE_ID => envelope.downcast::<StateReqDeniedInd>().map(Self::StateReqDeniedInd),
            GetVersion::TYPE_ID => envelope.downcast::<GetVersion>().map(Self::GetVersion),
            DsmeVersion::TYPE_ID => envelope.downcast::<DsmeVersion>().map(Self::DsmeVersion),
            SetTaTestMode::TYPE_ID => envelope.downcast::<SetTaTestMode>().map(Self::SetTaTestMode),
            _ => None,
        };

        decoded.unwrap_or_else(|| {
            trace!(
                name = %name_of(envelope.type_id()),
                body_size = envelope.body_size(),
                "no matching shape"
            );
            Self::Unknown {
                type_id: envelope.type_id(),
                body_size: envelope.body_size(),
            }
        })
    }

    pub fn type_id(&self) -> u32 {
        match self {
            Self::Close(_) => Close::TYPE_ID,
            Self::StateChangeInd(_) => StateChangeInd::TYPE_ID,
            Self::StateQuery(_) => StateQuery::TYPE_ID,
            Self::SaveDataInd(_) => SaveDataInd::TYPE_ID,
            Self::PowerupReq(_) => PowerupReq::TYPE_ID,
            Self::ShutdownReq(_) => ShutdownReq::TYPE_ID,
            Self::SetAlarmState(_) => SetAlarmState::TYPE_ID,
            Self::RebootReq(_) => RebootReq::TYPE_ID,
            Self::StateReqDeniedInd(_) => StateReqDeniedInd::TYPE_ID,
            Self::GetVersion(_) => GetVersion::TYPE_ID,
            Self::DsmeVersion(_) => DsmeVersion::TYPE_ID,
            Self::SetTaTestMode(_) => SetTaTestMode::TYPE_ID,
            Self::Unknown { type_id, .. } => *type_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::registry::lookup;

    fn assert_registered<S: MessageShape>() {
        let entry = lookup(S::TYPE_ID).expect("shape not in registry");
        assert_eq!(entry.body_size, Some(S::BODY_SIZE), "{}", entry.name);
    }

    #[test]
    fn test_shapes_match_registry() {
        assert_registered::<Close>();
        assert_registered::<StateChangeInd>();
        assert_registered::<StateQuery>();
        assert_registered::<SaveDataInd>();
        assert_registered::<PowerupReq>();
        assert_registered::<ShutdownReq>();
        assert_registered::<SetAlarmState>();
        assert_registered::<RebootReq>();
        assert_registered::<StateReqDeniedInd>();
        assert_registered::<GetVersion>();
        assert_registered::<DsmeVersion>();
        assert_registered::<SetTaTestMode>();
    }

    #[test]
    fn test_downcast_matching_shape() {
        let env = Envelope::from_shape(&SetAlarmState { alarm_set: true }, 0).unwrap();
        assert_eq!(
            env.downcast::<SetAlarmState>(),
            Some(SetAlarmState { alarm_set: true })
        );
    }

    #[test]
    fn test_downcast_rejects_same_id_wrong_size() {
        let env = Envelope::allocate(SetAlarmState::TYPE_ID, 20, 0).unwrap();
        assert!(env.downcast::<SetAlarmState>().is_none());
    }

    #[test]
    fn test_downcast_rejects_same_size_wrong_id() {
        let env = Envelope::from_shape(&StateChangeInd::new(DeviceState::User), 0).unwrap();
        assert_eq!(env.body_size(), SetAlarmState::BODY_SIZE);
        assert!(env.downcast::<SetAlarmState>().is_none());
        assert!(env.downcast::<StateReqDeniedInd>().is_none());
    }

    #[test]
    fn test_downcast_rejects_body_past_buffer() {
        // Peer klaim body 16 bytes tapi frame cuma 12
        let header = crate::protocol::EnvelopeHeader::new(SetAlarmState::TYPE_ID, 16, 12);
        let env = Envelope::from_bytes(header.to_bytes().to_vec()).unwrap();
        assert!(env.is::<SetAlarmState>());
        assert!(env.downcast::<SetAlarmState>().is_none());
    }

    /// Shape rusak: body lebih kecil dari header
    struct Undersized;

    impl MessageShape for Undersized {
        const TYPE_ID: u32 = 0x0000_4242;
        const BODY_SIZE: u32 = 4;

        fn read_fields(_fields: &[u8]) -> Self {
            Self
        }
    }

    #[test]
    fn test_downcast_undersized_shape_is_none() {
        let header = crate::protocol::EnvelopeHeader::new(Undersized::TYPE_ID, 4, 12);
        let env = Envelope::from_bytes(header.to_bytes().to_vec()).unwrap();
        assert!(env.is::<Undersized>());
        assert!(env.downcast::<Undersized>().is_none());
    }

    #[test]
    fn test_downcast_random_types() {
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..500 {
            let type_id = if rng.bool() {
                SetAlarmState::TYPE_ID
            } else {
                rng.u32(..)
            };
            let body_size = if rng.bool() { 16 } else { rng.u32(12..64) };
            let env = Envelope::allocate(type_id, body_size, rng.usize(..16)).unwrap();

            let expected = type_id == SetAlarmState::TYPE_ID && body_size == 16;
            assert_eq!(env.downcast::<SetAlarmState>().is_some(), expected);
        }
    }

    #[test]
    fn test_state_field_preserved() {
        let env = Envelope::from_shape(&StateReqDeniedInd::new(DeviceState::Test), 0).unwrap();
        let msg = env.downcast::<StateReqDeniedInd>().unwrap();
        assert_eq!(msg.state(), Some(DeviceState::Test));

        let raw = StateChangeInd { state: 99 };
        let env = Envelope::from_shape(&raw, 0).unwrap();
        assert_eq!(env.downcast::<StateChangeInd>().unwrap().state(), None);
    }

    #[test]
    fn test_close_reason_unknown_maps_to_error() {
        assert_eq!(CloseReason::from_u8(200), CloseReason::Error);
    }

    #[test]
    fn test_with_extra_copies_blob() {
        let env = Envelope::with_extra(&DsmeVersion, b"0.84.0\0").unwrap();
        assert_eq!(env.total_size(), 19);
        assert_eq!(env.extra_str(), Some("0.84.0"));
        assert_eq!(Message::decode(&env), Message::DsmeVersion(DsmeVersion));
    }

    #[test]
    fn test_message_decode_dispatch() {
        let env = Envelope::from_shape(&Close::new(CloseReason::Requested), 0).unwrap();
        assert_eq!(
            Message::decode(&env),
            Message::Close(Close::new(CloseReason::Requested))
        );

        let env = Envelope::allocate(0x0000_0500, 24, 0).unwrap();
        let msg = Message::decode(&env);
        assert_eq!(
            msg,
            Message::Unknown {
                type_id: 0x0000_0500,
                body_size: 24
            }
        );
        assert_eq!(msg.type_id(), 0x0000_0500);
    }

    #[test]
    fn test_message_decode_wrong_size_is_unknown() {
        let env = Envelope::allocate(StateQuery::TYPE_ID, 16, 0).unwrap();
        assert!(matches!(Message::decode(&env), Message::Unknown { .. }));
    }
}
