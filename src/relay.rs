//! The cross-instance relay: outbound calls and SMS to another emulated
//! device travel as plain-text console commands over a TCP channel to
//! `localhost:<console port>`.
use std::cell::RefCell;
use std::mem;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::rc::Weak;
use bytes::BytesMut;
use futures::{Async, Future, Poll};
use tokio_core::net::{TcpStream, TcpStreamNew};
use tokio_io::{AsyncRead, AsyncWrite};
use crate::call::PHONE_PREFIX;
use crate::{ModemHub, ModemState};

/* By convention, remote numbers are the console ports + 10000, i.e. 15554,
 * 15556, etc., with further instances of the same process 10000 apart. */
const REMOTE_NUMBER_BASE: i32 = 15554;
const REMOTE_NUMBER_MAX: i32 = 16;
const REMOTE_CONSOLE_PORT: i32 = 5554;

/// The operations a relay channel can carry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, is_enum_variant)]
pub(crate) enum RemoteOp {
    Dial,
    Busy,
    Hold,
    Accept,
    Hangup,
    Sms,
}

/// The remote number for `(base_port, instance_id)`, when one exists.
pub(crate) fn remote_number_from(base_port: u16, instance_id: u8) -> Option<i32> {
    let port = base_port as i32;
    if port & 1 != 0 {
        // must be even
        return None;
    }
    let offset = (port - REMOTE_CONSOLE_PORT) >> 1;
    if offset < 0 || offset >= REMOTE_NUMBER_MAX {
        return None;
    }
    if instance_id >= 9 {
        return None;
    }
    Some(REMOTE_NUMBER_BASE + 10_000 * instance_id as i32 + offset * 2)
}

/// Decodes a numeric remote number into `(console port, instance_id)`.
pub(crate) fn remote_number_to_port(number: i64) -> Option<(u16, u8)> {
    if number & 1 != 0 {
        return None;
    }
    if number < REMOTE_NUMBER_BASE as i64 || number > i32::max_value() as i64 {
        return None;
    }
    let number = number as i32;
    if ((number - REMOTE_NUMBER_BASE) % 10_000) >> 1 >= REMOTE_NUMBER_MAX {
        return None;
    }
    let instance = number / 10_000 - 1;
    if instance < 0 || instance > 8 {
        return None;
    }
    Some(((number % 10_000) as u16, instance as u8))
}

/// Decodes a dial string: either a bare remote number or the 11-digit
/// canonical form carrying this instance's digit. A trailing `;` is ignored.
pub(crate) fn remote_number_str_to_port(number: &str, instance_id: u8) -> Option<(u16, u8)> {
    let mut s = number;
    if s.ends_with(';') {
        s = &s[..s.len() - 1];
    }
    if s.len() == 11
        && s.starts_with(PHONE_PREFIX)
        && s.as_bytes()[6] == b'1' + instance_id
    {
        s = &s[6..];
    }
    let num = crate::parse::parse_decimal(s)?;
    remote_number_to_port(num)
}

/// A relay channel in flight, tracked process-wide so diagnostics can see
/// outstanding traffic. The writable channel itself is owned by the spawned
/// future; the entry dies with it.
#[derive(Debug, Clone)]
pub(crate) struct RemoteEntry {
    pub(crate) id: u64,
    pub(crate) op: RemoteOp,
    pub(crate) from: (u16, u8),
    pub(crate) to: (u16, u8),
}

pub(crate) fn remote_call_dial(st: &ModemState, number: &str) -> Result<(), ()> {
    remote_call_generic(st, RemoteOp::Dial, number, None)
}
pub(crate) fn remote_call_other(st: &ModemState, number: &str, op: RemoteOp) {
    let _ = remote_call_generic(st, op, number, None);
}
pub(crate) fn remote_call_sms(st: &ModemState, number: &str, pdu_hex: String) -> Result<(), ()> {
    remote_call_generic(st, RemoteOp::Sms, number, Some(pdu_hex))
}
/// Best-effort cancellation: sends a hangup burst, does not wait.
pub(crate) fn remote_call_cancel(st: &ModemState, number: &str) {
    let _ = remote_call_generic(st, RemoteOp::Hangup, number, None);
}

fn remote_call_generic(
    st: &ModemState,
    op: RemoteOp,
    to_number: &str,
    pdu_hex: Option<String>,
) -> Result<(), ()> {
    let from_num = match remote_number_from(st.base_port, st.instance_id) {
        Some(n) => n,
        None => {
            debug!("from port/instance {}:{} has no remote number",
                   st.base_port, st.instance_id);
            return Err(());
        }
    };
    let (to_port, to_instance) = match remote_number_str_to_port(to_number, st.instance_id) {
        Some(t) => t,
        None => {
            debug!("phone number '{}' is not decimal or remote", to_number);
            return Err(());
        }
    };
    if to_port == st.base_port && to_instance == st.instance_id {
        debug!("trying to call self");
        return Err(());
    }

    let mut payload = BytesMut::new();
    if to_instance > 0 {
        payload.extend_from_slice(format!("mux modem {}\n", to_instance).as_bytes());
    }
    let line = match op {
        RemoteOp::Dial => format!("gsm call {}{}\n", PHONE_PREFIX, from_num),
        RemoteOp::Busy => format!("gsm busy {}{}\n", PHONE_PREFIX, from_num),
        RemoteOp::Hold => format!("gsm hold {}{}\n", PHONE_PREFIX, from_num),
        RemoteOp::Accept => format!("gsm accept {}{}\n", PHONE_PREFIX, from_num),
        RemoteOp::Hangup => format!("gsm cancel {}{}\n", PHONE_PREFIX, from_num),
        RemoteOp::Sms => format!("sms pdu {}\n", pdu_hex.unwrap_or_default()),
    };
    payload.extend_from_slice(line.as_bytes());

    let hub = st.hub.clone();
    let id = hub.next_remote_id();
    hub.push_remote_entry(RemoteEntry {
        id,
        op,
        from: (st.base_port, st.instance_id),
        to: (to_port, to_instance),
    });
    debug!("adding remote call from {}:{} to {}:{}",
           st.base_port, st.instance_id, to_port, to_instance);

    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), to_port);
    let fut = RemoteCallFuture {
        hub,
        entry_id: id,
        op,
        number: to_number.to_owned(),
        modem: st.myself.clone(),
        payload,
        state: ChannelState::Connecting(TcpStream::connect(&addr, &st.handle)),
    };
    st.handle.spawn(fut);
    Ok(())
}

enum ChannelState {
    Connecting(TcpStreamNew),
    Writing(TcpStream),
    Quitting(TcpStream),
    Draining(TcpStream),
    Done,
}

/// Drives one relay channel: connect, send the payload as a single logical
/// burst, send `quit\n`, then drain whatever the console replies until it
/// closes. The success callback fires exactly once, when the burst is fully
/// out; failure anywhere earlier reports back to the originating modem.
struct RemoteCallFuture {
    hub: ModemHub,
    entry_id: u64,
    op: RemoteOp,
    number: String,
    modem: Weak<RefCell<ModemState>>,
    payload: BytesMut,
    state: ChannelState,
}

impl RemoteCallFuture {
    fn fail(&self, what: &str) {
        debug!("remote call to '{}' failed: {}", self.number, what);
        if self.op == RemoteOp::Dial {
            if let Some(modem) = self.modem.upgrade() {
                modem.borrow_mut().remote_dial_result(&self.number, false);
            }
        }
    }
    fn succeed(&self) {
        /* success only means the burst reached the remote console; the
         * interesting transitions arrive later as inbound console traffic */
        trace!("remote call burst to '{}' sent", self.number);
    }
}

impl Drop for RemoteCallFuture {
    fn drop(&mut self) {
        self.hub.remove_remote_entry(self.entry_id);
    }
}

impl Future for RemoteCallFuture {
    type Item = ();
    type Error = ();

    fn poll(&mut self) -> Poll<(), ()> {
        loop {
            match mem::replace(&mut self.state, ChannelState::Done) {
                ChannelState::Connecting(mut f) => match f.poll() {
                    Ok(Async::Ready(stream)) => {
                        self.state = ChannelState::Writing(stream);
                    }
                    Ok(Async::NotReady) => {
                        self.state = ChannelState::Connecting(f);
                        return Ok(Async::NotReady);
                    }
                    Err(e) => {
                        self.fail(&e.to_string());
                        return Ok(Async::Ready(()));
                    }
                },
                ChannelState::Writing(mut stream) => {
                    while !self.payload.is_empty() {
                        match AsyncWrite::poll_write(&mut stream, &self.payload) {
                            Ok(Async::Ready(0)) => {
                                self.fail("connection closed while writing");
                                return Ok(Async::Ready(()));
                            }
                            Ok(Async::Ready(n)) => {
                                let _ = self.payload.split_to(n);
                            }
                            Ok(Async::NotReady) => {
                                self.state = ChannelState::Writing(stream);
                                return Ok(Async::NotReady);
                            }
                            Err(e) => {
                                self.fail(&e.to_string());
                                return Ok(Async::Ready(()));
                            }
                        }
                    }
                    self.payload = BytesMut::from(&b"quit\n"[..]);
                    self.state = ChannelState::Quitting(stream);
                }
                ChannelState::Quitting(mut stream) => {
                    while !self.payload.is_empty() {
                        match AsyncWrite::poll_write(&mut stream, &self.payload) {
                            Ok(Async::Ready(0)) => {
                                self.fail("connection closed while quitting");
                                return Ok(Async::Ready(()));
                            }
                            Ok(Async::Ready(n)) => {
                                let _ = self.payload.split_to(n);
                            }
                            Ok(Async::NotReady) => {
                                self.state = ChannelState::Quitting(stream);
                                return Ok(Async::NotReady);
                            }
                            Err(e) => {
                                self.fail(&e.to_string());
                                return Ok(Async::Ready(()));
                            }
                        }
                    }
                    self.succeed();
                    self.state = ChannelState::Draining(stream);
                }
                ChannelState::Draining(mut stream) => {
                    let mut buf = [0u8; 32];
                    loop {
                        match AsyncRead::poll_read(&mut stream, &mut buf) {
                            // the console went away; we are done either way
                            Ok(Async::Ready(0)) | Err(_) => return Ok(Async::Ready(())),
                            Ok(Async::Ready(_)) => {}
                            Ok(Async::NotReady) => {
                                self.state = ChannelState::Draining(stream);
                                return Ok(Async::NotReady);
                            }
                        }
                    }
                }
                ChannelState::Done => return Ok(Async::Ready(())),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn number_from_port() {
        assert_eq!(remote_number_from(5554, 0), Some(15554));
        assert_eq!(remote_number_from(5556, 0), Some(15556));
        assert_eq!(remote_number_from(5554, 1), Some(25554));
        assert_eq!(remote_number_from(5555, 0), None); // odd
        assert_eq!(remote_number_from(5586, 0), None); // past the pool
        assert_eq!(remote_number_from(5554, 9), None);
    }
    #[test]
    fn number_to_port() {
        assert_eq!(remote_number_to_port(15554), Some((5554, 0)));
        assert_eq!(remote_number_to_port(15558), Some((5558, 0)));
        assert_eq!(remote_number_to_port(25554), Some((5554, 1)));
        assert_eq!(remote_number_to_port(15555), None); // odd
        assert_eq!(remote_number_to_port(5554), None); // below base
        assert_eq!(remote_number_to_port(15586), None); // past the pool
    }
    #[test]
    fn string_decoding() {
        assert_eq!(remote_number_str_to_port("15558", 0), Some((5558, 0)));
        assert_eq!(remote_number_str_to_port("15558;", 0), Some((5558, 0)));
        assert_eq!(remote_number_str_to_port("15555215558", 0), Some((5558, 0)));
        // the prefix form only decodes for the matching instance
        assert_eq!(remote_number_str_to_port("15555215558", 1), None);
        assert_eq!(remote_number_str_to_port("bogus", 0), None);
        assert_eq!(remote_number_str_to_port("911", 0), None);
    }
    #[test]
    fn round_trip() {
        for port in &[5554u16, 5556, 5570] {
            for inst in &[0u8, 1, 8] {
                let num = remote_number_from(*port, *inst).unwrap();
                assert_eq!(remote_number_to_port(num as i64), Some((*port, *inst)));
            }
        }
    }
}
