//! Saving and restoring the call table.
//!
//! Only the externally observable call fields survive a snapshot; timers and
//! remote-call channel bindings are deliberately not restored, so an
//! in-flight DIALING call stays wherever it was saved until the host acts.
use bytes::{Buf, BufMut, BytesMut};
use std::io::Cursor;
use crate::call::{Call, CallDir, CallMode, CallState, VoiceCall};
use crate::errors::{ModemError, ModemResult};
use crate::util::ModemFromPrimitive;

pub const SNAPSHOT_VERSION: u8 = 1;

/// A call as it exists inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SnapshotCall {
    pub(crate) dir: CallDir,
    pub(crate) state: CallState,
    pub(crate) mode: CallMode,
    pub(crate) multi: bool,
    pub(crate) number: String,
}

pub(crate) fn save_calls(calls: &[VoiceCall]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.reserve(2 + calls.iter().map(|c| 5 + c.call.number.len()).sum::<usize>());
    buf.put_u8(SNAPSHOT_VERSION);
    buf.put_u8(calls.len() as u8);
    for vcall in calls {
        let call: &Call = &vcall.call;
        buf.put_u8(call.dir as u8);
        buf.put_u8(call.state as u8);
        buf.put_u8(call.mode as u8);
        buf.put_u8(call.multi as u8);
        buf.put_u8(call.number.len() as u8);
        buf.put_slice(call.number.as_bytes());
    }
    buf.to_vec()
}

pub(crate) fn load_calls(data: &[u8]) -> ModemResult<Vec<SnapshotCall>> {
    let mut buf = Cursor::new(data);
    if buf.remaining() < 2 {
        return Err(ModemError::SnapshotTruncated);
    }
    let version = buf.get_u8();
    if version != SNAPSHOT_VERSION {
        return Err(ModemError::SnapshotVersion(version));
    }
    let count = buf.get_u8() as usize;
    let mut calls = Vec::with_capacity(count);
    for _ in 0..count {
        if buf.remaining() < 5 {
            return Err(ModemError::SnapshotTruncated);
        }
        let dir = CallDir::from_integer(buf.get_u8() as i64)?;
        let state = CallState::from_integer(buf.get_u8() as i64)?;
        let mode = CallMode::from_integer(buf.get_u8() as i64)?;
        let multi = buf.get_u8() != 0;
        let len = buf.get_u8() as usize;
        if buf.remaining() < len {
            return Err(ModemError::SnapshotTruncated);
        }
        let mut raw = vec![0u8; len];
        buf.copy_to_slice(&mut raw);
        let number = String::from_utf8(raw)
            .map_err(|_| ModemError::SnapshotTruncated)?;
        calls.push(SnapshotCall {
            dir,
            state,
            mode,
            multi,
            number,
        });
    }
    Ok(calls)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::call::Call;

    fn vcall(id: u32, state: CallState, multi: bool, number: &str) -> VoiceCall {
        VoiceCall {
            call: Call {
                id,
                dir: CallDir::Outbound,
                state,
                mode: CallMode::Voice,
                multi,
                number: number.to_owned(),
                number_presentation: 0,
            },
            serial: id as u64,
            is_remote: false,
        }
    }

    #[test]
    fn round_trip() {
        let calls = vec![
            vcall(1, CallState::Active, true, "15555215554"),
            vcall(2, CallState::Held, true, "15555215556"),
        ];
        let data = save_calls(&calls);
        let loaded = load_calls(&data).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].state, CallState::Active);
        assert_eq!(loaded[1].number, "15555215556");
        assert!(loaded[0].multi && loaded[1].multi);
    }
    #[test]
    fn version_gate() {
        let mut data = save_calls(&[]);
        data[0] = 99;
        match load_calls(&data) {
            Err(ModemError::SnapshotVersion(99)) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }
    #[test]
    fn truncation() {
        let data = save_calls(&[vcall(1, CallState::Dialing, false, "5554")]);
        assert!(load_calls(&data[..data.len() - 1]).is_err());
        assert!(load_calls(&[]).is_err());
    }
}
