//! End-to-end envelope exchange over a Unix socket pair
//!
//! Usage:
//!   RUST_LOG=trace cargo test --test envelope_exchange -- --nocapture

use std::io::Write;
use std::os::unix::net::UnixStream;
use std::thread;

use dsme_protocol::protocol::shapes::{
    Close, CloseReason, DeviceState, SetAlarmState, StateQuery, StateReqDeniedInd,
};
use dsme_protocol::protocol::{lookup, name_of, EnvelopeHeader, MAX_FRAME_SIZE};
use dsme_protocol::{name_of_envelope, Connection, Envelope, Message, MessageShape};

const MOCK_EXTRA: &[u8] = b"a-reason\0";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Mock daemon: jawab STATE_QUERY dengan STATE_REQ_DENIED_IND + reason,
/// berhenti saat client disconnect.
fn mock_daemon(stream: UnixStream) -> Vec<String> {
    let mut conn = Connection::new(stream);
    let mut seen = Vec::new();

    loop {
        let msg = conn.receive().unwrap().expect("blocking stream yields a frame");
        seen.push(name_of_envelope(Some(&msg)).into_owned());

        match Message::decode(&msg) {
            Message::Close(_) => break,
            Message::StateQuery(_) => {
                let reply = Envelope::from_shape(&StateReqDeniedInd::new(DeviceState::Test), 0)
                    .unwrap();
                conn.send_with_extra(&reply, MOCK_EXTRA).unwrap();
            }
            _ => {
                // Echo apa adanya
                conn.send(&msg).unwrap();
            }
        }
    }

    seen
}

#[test]
fn query_gets_denied_reply_with_reason() {
    init_tracing();
    let (client, daemon) = UnixStream::pair().unwrap();
    let handle = thread::spawn(move || mock_daemon(daemon));

    let mut conn = Connection::new(client);
    conn.send(&Envelope::from_shape(&StateQuery, 0).unwrap()).unwrap();

    let reply = conn.receive().unwrap().unwrap();
    assert_eq!(reply.type_id(), StateReqDeniedInd::TYPE_ID);
    assert_eq!(reply.extra_size(), MOCK_EXTRA.len());

    let denied = reply.downcast::<StateReqDeniedInd>().unwrap();
    assert_eq!(denied.state(), Some(DeviceState::Test));
    assert_eq!(reply.extra_data(), Some(MOCK_EXTRA));
    assert_eq!(reply.extra_str(), Some("a-reason"));

    drop(conn);
    let seen = handle.join().unwrap();
    assert_eq!(seen, vec!["STATE_QUERY", "CLOSE"]);
}

#[test]
fn alarm_state_with_trailing_reason_survives_transport() {
    init_tracing();
    let (client, daemon) = UnixStream::pair().unwrap();
    let handle = thread::spawn(move || mock_daemon(daemon));

    let mut env = Envelope::allocate(0x0000_0307, 16, 9).unwrap();
    env.extra_data_mut().unwrap().copy_from_slice(b"a-reason\0");
    assert!(env.is::<SetAlarmState>());

    let mut conn = Connection::new(client);
    conn.send(&env).unwrap();

    let decoded = conn.receive().unwrap().unwrap();
    assert_eq!(decoded.total_size(), 25);
    assert_eq!(
        decoded.downcast::<SetAlarmState>(),
        Some(SetAlarmState { alarm_set: false })
    );
    assert_eq!(decoded.extra_data(), Some(&b"a-reason\0"[..]));
    assert_eq!(
        name_of_envelope(Some(&decoded)),
        lookup(0x0000_0307).unwrap().name
    );

    drop(conn);
    handle.join().unwrap();
}

#[test]
fn unregistered_id_without_extra() {
    init_tracing();
    let (client, daemon) = UnixStream::pair().unwrap();
    let handle = thread::spawn(move || mock_daemon(daemon));

    let env = Envelope::allocate(42, 12, 0).unwrap();
    assert!(env.extra_data().is_none());
    assert_eq!(name_of_envelope(Some(&env)), "UNKNOWN_0000002a");

    let mut conn = Connection::new(client);
    conn.send(&env).unwrap();
    let echoed = conn.receive().unwrap().unwrap();
    assert_eq!(echoed, env);
    assert_eq!(
        Message::decode(&echoed),
        Message::Unknown {
            type_id: 42,
            body_size: 12
        }
    );

    drop(conn);
    let seen = handle.join().unwrap();
    assert_eq!(seen[0], name_of(42));
}

#[test]
fn peer_disconnect_yields_close_eof() {
    init_tracing();
    let (client, daemon) = UnixStream::pair().unwrap();
    drop(daemon);

    let mut conn = Connection::new(client);
    let msg = conn.receive().unwrap().unwrap();
    assert_eq!(
        msg.downcast::<Close>(),
        Some(Close::new(CloseReason::Eof))
    );
    assert!(!conn.is_open());
    assert_eq!(name_of_envelope(None), "NULL_MESSAGE");
}

#[test]
fn garbage_frame_from_peer_closes_out_of_sync() {
    init_tracing();

    // total_size lebih kecil dari header
    let (client, mut daemon) = UnixStream::pair().unwrap();
    daemon
        .write_all(&EnvelopeHeader::new(1, 12, 4).to_bytes())
        .unwrap();
    let mut conn = Connection::new(client);
    let msg = conn.receive().unwrap().unwrap();
    assert_eq!(
        msg.downcast::<Close>(),
        Some(Close::new(CloseReason::OutOfSync))
    );
    assert!(!conn.is_open());

    // total_size melebihi batas frame
    let (client, mut daemon) = UnixStream::pair().unwrap();
    let oversized = (MAX_FRAME_SIZE + 1) as u32;
    daemon
        .write_all(&EnvelopeHeader::new(1, 12, oversized).to_bytes())
        .unwrap();
    let mut conn = Connection::new(client);
    let msg = conn.receive().unwrap().unwrap();
    assert_eq!(
        msg.downcast::<Close>(),
        Some(Close::new(CloseReason::OutOfSync))
    );

    // Setelah out of sync, read berikutnya melaporkan Error
    let msg = conn.receive().unwrap().unwrap();
    assert_eq!(
        msg.downcast::<Close>(),
        Some(Close::new(CloseReason::Error))
    );
}

#[test]
fn nonblocking_stream_without_data_returns_none() {
    init_tracing();
    let (client, _daemon) = UnixStream::pair().unwrap();
    client.set_nonblocking(true).unwrap();

    let mut conn = Connection::new(client);
    assert!(conn.receive().unwrap().is_none());
    assert!(conn.is_open());
}
