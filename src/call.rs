//! The voice-call table and its state machine.
use std::time::Duration;
use futures::Future;
use tokio_core::reactor::Timeout;
use crate::errors::{ModemError, ModemResult};
use crate::relay::{self, RemoteOp};
use crate::ModemState;

/// By convention, local numbers are 11 digits starting with this prefix
/// followed by an instance digit and the console port.
pub const PHONE_PREFIX: &str = "155552";

/// 3GPP 22.083/22.084: one held five-party conference, one single call, and
/// an incoming call is the worst legal case.
pub const MAX_CALLS: usize = 7;

/// Delay before an outbound call leaves DIALING.
pub(crate) const CALL_DELAY_DIAL: u64 = 1000;

/// Direction of a call, as reported in `+CLCC`.
#[repr(u8)]
#[derive(Debug, FromPrimitive, Copy, Clone, PartialEq, Eq, is_enum_variant)]
pub enum CallDir {
    Outbound = 0,
    Inbound = 1,
}
/// State of a call, as reported in `+CLCC`.
#[repr(u8)]
#[derive(Debug, FromPrimitive, Copy, Clone, PartialEq, Eq, is_enum_variant)]
pub enum CallState {
    Active = 0,
    Held = 1,
    Dialing = 2,
    Alerting = 3,
    Incoming = 4,
    Waiting = 5,
}
/// Bearer mode of a call.
#[repr(u8)]
#[derive(Debug, FromPrimitive, Copy, Clone, PartialEq, Eq, is_enum_variant)]
pub enum CallMode {
    Voice = 0,
    Data = 1,
    Fax = 2,
}
/// Disconnect causes reported by `+CEER`, per 3GPP TS 24.008 annex H.
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CallFailCause {
    UnobtainableNumber = 1,
    Normal = 16,
    Busy = 17,
}

/// The externally observable state of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// 1-based id, unique among the currently active calls.
    pub id: u32,
    pub dir: CallDir,
    pub state: CallState,
    pub mode: CallMode,
    /// Multiparty membership bit.
    pub multi: bool,
    pub number: String,
    /// 0 = presentation allowed; see TS 27.007 `<CLI validity>`.
    pub number_presentation: i32,
}

/// A call slot, with the bookkeeping the consumer never sees.
#[derive(Debug, Clone)]
pub(crate) struct VoiceCall {
    pub(crate) call: Call,
    /// Monotonic token; a pending timer only fires for the serial it was
    /// armed with, so freeing a call (or re-using its id) disarms it.
    pub(crate) serial: u64,
    pub(crate) is_remote: bool,
}

/// Converts short local dial strings to the 11-digit canonical form.
///
/// 10, 7 and 5 digit strings are accepted when their visible prefix matches
/// this instance; a bare 4-digit extension is completed with the instance
/// digit. Anything else passes through unchanged, which makes the function
/// idempotent.
pub fn normalize_number(digits: &str, instance_id: u8) -> String {
    let b = digits.as_bytes();
    let len = b.len();
    let inst = b'1' + instance_id;
    let matches_short = (len == 10 && digits.starts_with(&PHONE_PREFIX[1..]) && b[5] == inst)
        || (len == 7 && digits.starts_with(&PHONE_PREFIX[4..]) && b[2] == inst)
        || (len == 5 && b[0] == inst);
    if matches_short {
        format!("{}{}", &PHONE_PREFIX[..11 - len], digits)
    }
    else if len == 4 {
        format!("{}{}{}", PHONE_PREFIX, inst as char, digits)
    }
    else {
        digits.to_owned()
    }
}

impl ModemState {
    /// Allocates a call slot with the smallest free positive id.
    pub(crate) fn alloc_call(&mut self) -> Option<usize> {
        if self.calls.len() >= MAX_CALLS {
            return None;
        }
        let mut id = 1u32;
        while self.calls.iter().any(|c| c.call.id == id) {
            id += 1;
        }
        self.next_call_serial += 1;
        self.calls.push(VoiceCall {
            call: Call {
                id,
                dir: CallDir::Outbound,
                state: CallState::Active,
                mode: CallMode::Voice,
                multi: false,
                number: String::new(),
                number_presentation: 0,
            },
            serial: self.next_call_serial,
            is_remote: false,
        });
        Some(self.calls.len() - 1)
    }

    pub(crate) fn find_call(&self, id: u32) -> Option<usize> {
        self.calls.iter().position(|c| c.call.id == id)
    }

    pub(crate) fn find_call_by_number(&self, number: &str) -> Option<usize> {
        self.calls.iter().position(|c| c.call.number == number)
    }

    pub(crate) fn send_calls_update(&self) {
        self.unsol("CALL STATE CHANGED\r");
    }

    /// Moves a call to `state`, propagating hold/accept to the remote side
    /// when the peer lives in another emulator.
    pub(crate) fn set_call_state(&mut self, index: usize, state: CallState) {
        if self.calls[index].call.state == state {
            return;
        }
        if self.calls[index].is_remote {
            let number = self.calls[index].call.number.clone();
            match state {
                CallState::Held => relay::remote_call_other(self, &number, RemoteOp::Hold),
                CallState::Active => relay::remote_call_other(self, &number, RemoteOp::Accept),
                _ => {}
            }
        }
        self.calls[index].call.state = state;
    }

    pub(crate) fn set_call_multi(&mut self, index: usize) {
        if self.calls[index].call.multi {
            return;
        }
        self.calls[index].call.multi = true;
        self.multi_count += 1;
    }

    pub(crate) fn unset_call_multi(&mut self, index: usize) {
        if !self.calls[index].call.multi {
            return;
        }
        self.calls[index].call.multi = false;
        self.multi_count -= 1;

        // A multiparty group of one is no group at all.
        if self.multi_count == 1 {
            for nn in 0..self.calls.len() {
                let call = &mut self.calls[nn].call;
                if call.mode != CallMode::Voice {
                    continue;
                }
                if call.multi {
                    call.multi = false;
                    self.multi_count -= 1;
                    break;
                }
            }
        }
    }

    /// Removes a call from the table, recording `cause` for `+CEER`.
    ///
    /// Pending relay traffic for the call is cancelled (best-effort), and any
    /// armed timer is disarmed by serial invalidation.
    pub(crate) fn free_call(&mut self, index: usize, cause: CallFailCause) {
        if self.calls[index].is_remote {
            let number = self.calls[index].call.number.clone();
            self.calls[index].is_remote = false;
            relay::remote_call_cancel(self, &number);
        }
        self.unset_call_multi(index);
        self.calls.remove(index);
        self.last_call_fail_cause = cause as i32;
    }

    pub(crate) fn has_waiting_call(&self) -> bool {
        self.calls
            .iter()
            .any(|c| c.call.mode == CallMode::Voice && c.call.state == CallState::Waiting)
    }

    pub(crate) fn voice_call_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| c.call.mode == CallMode::Voice)
            .count()
    }

    /// Creates an outbound call from a dial string (`<number>[I|i][;]`).
    pub(crate) fn add_outbound_call_inner(&mut self, dialstr: &str) -> Option<usize> {
        let mut digits = dialstr;
        if digits.ends_with(';') {
            digits = &digits[..digits.len() - 1];
        }
        // CLIR suffix
        if digits.ends_with('I') || digits.ends_with('i') {
            digits = &digits[..digits.len() - 1];
        }
        let number = normalize_number(digits, self.instance_id);

        let index = self.alloc_call()?;
        {
            let vcall = &mut self.calls[index];
            vcall.call.dir = CallDir::Outbound;
            vcall.call.state = CallState::Dialing;
            vcall.call.mode = CallMode::Voice;
            vcall.call.number = number.clone();
            vcall.call.number_presentation = 0;
        }
        self.send_calls_update();

        let is_remote = relay::remote_number_str_to_port(&number, self.instance_id).is_some();
        self.calls[index].is_remote = is_remote;

        let (id, serial) = (self.calls[index].call.id, self.calls[index].serial);
        self.schedule_call_timer(id, serial, CALL_DELAY_DIAL);
        Some(index)
    }

    pub(crate) fn add_inbound_call_inner(
        &mut self,
        number: &str,
        number_presentation: i32,
        name: &str,
        name_presentation: i32,
    ) -> ModemResult<()> {
        let index = self.alloc_call().ok_or(ModemError::TooManyCalls)?;
        {
            let vcall = &mut self.calls[index];
            vcall.call.dir = CallDir::Inbound;
            vcall.call.mode = CallMode::Voice;
            vcall.call.multi = false;
            vcall.call.number = number.to_owned();
            vcall.call.number_presentation = number_presentation;
            vcall.is_remote = relay::remote_number_str_to_port(number, self.instance_id).is_some();
        }
        let state = if self.voice_call_count() == 1 {
            CallState::Incoming
        }
        else {
            CallState::Waiting
        };
        self.calls[index].call.state = state;

        let cnap_name = if name_presentation == 0 { name } else { "" };
        self.unsol("RING\r");
        if !cnap_name.is_empty() || (name_presentation > 0 && name_presentation <= 2) {
            self.unsol(&format!("+CNAP: \"{}\",{}\r", cnap_name, name_presentation));
        }
        Ok(())
    }

    /// Arms the one-shot call-progress timer for `(id, serial)`.
    pub(crate) fn schedule_call_timer(&self, id: u32, serial: u64, delay_ms: u64) {
        let weak = self.myself.clone();
        let timeout = match Timeout::new(Duration::from_millis(delay_ms), &self.handle) {
            Ok(t) => t,
            Err(e) => {
                error!("could not create call timer: {}", e);
                return;
            }
        };
        self.handle.spawn(timeout.then(move |_| {
            if let Some(modem) = weak.upgrade() {
                modem.borrow_mut().voice_call_event(id, serial);
            }
            Ok(())
        }));
    }

    /// Timer-driven call progression. Only DIALING has an armed timer; a
    /// stale `(id, serial)` pair fires into the void.
    pub(crate) fn voice_call_event(&mut self, id: u32, serial: u64) {
        let index = match self.find_call(id) {
            Some(i) if self.calls[i].serial == serial => i,
            _ => return,
        };
        match self.calls[index].call.state {
            CallState::Dialing => {
                let number = self.calls[index].call.number.clone();
                if !number.bytes().all(|b| b == b'+' || (b >= b'0' && b <= b'9')) {
                    self.free_call(index, CallFailCause::UnobtainableNumber);
                }
                else {
                    self.calls[index].call.state = CallState::Alerting;
                    if self.calls[index].is_remote {
                        if relay::remote_call_dial(self, &number).is_err() {
                            // The peer emulator is not there; quietly drop the
                            // call and let the host poll the list.
                            self.free_call(index, CallFailCause::Normal);
                        }
                    }
                }
            }
            _ => {}
        }
        self.send_calls_update();
    }

    /// Completion callback for a relayed dial. A failed channel tears the
    /// call down with `NO CARRIER`.
    pub(crate) fn remote_dial_result(&mut self, number: &str, success: bool) {
        if success {
            return;
        }
        if let Some(index) = self.find_call_by_number(number) {
            self.free_call(index, CallFailCause::Normal);
            self.unsol("NO CARRIER\r");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn normalize_short_forms() {
        // instance 0 on port 5554: "15555215554"
        assert_eq!(normalize_number("5554", 0), "15555215554");
        assert_eq!(normalize_number("15554", 0), "15555215554");
        assert_eq!(normalize_number("5215554", 0), "15555215554");
        assert_eq!(normalize_number("5555215554", 0), "15555215554");
    }
    #[test]
    fn normalize_instance_digit() {
        // instance 1 gets '2' as its instance digit
        assert_eq!(normalize_number("5556", 1), "15555225556");
        assert_eq!(normalize_number("25556", 1), "15555225556");
        // a 5-digit number for some other instance passes through
        assert_eq!(normalize_number("25556", 0), "25556");
    }
    #[test]
    fn normalize_passthrough() {
        assert_eq!(normalize_number("+15551234567", 0), "+15551234567");
        assert_eq!(normalize_number("911", 0), "911");
    }
    #[test]
    fn normalize_idempotent() {
        for n in &["5554", "15554", "5215554", "911", "+15551234567"] {
            let once = normalize_number(n, 0);
            assert_eq!(normalize_number(&once, 0), once);
        }
    }
}
