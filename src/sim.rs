//! The emulated SIM card: PIN/PUK state, restricted file access and the
//! SIM application toolkit hooks.
use crate::at::AtValue;
use crate::parse::parse_params;

pub const SIM_PIN_RETRIES: i32 = 3;
pub const SIM_PUK_RETRIES: i32 = 6;

/// Card readiness as reported through `+CPIN?`.
#[repr(u8)]
#[derive(Debug, FromPrimitive, Copy, Clone, PartialEq, Eq, is_enum_variant)]
pub enum SimStatus {
    Absent = 0,
    NotReady = 1,
    Ready = 2,
    Pin = 3,
    Puk = 4,
    NetworkPersonalization = 5,
}

/// Restricted SIM Access commands, as defined by 8.18 of 3GPP 27.007.
const SIM_CMD_READ_BINARY: u32 = 176;
const SIM_CMD_READ_RECORD: u32 = 178;
const SIM_CMD_GET_RESPONSE: u32 = 192;
const SIM_CMD_UPDATE_BINARY: u32 = 214;
const SIM_CMD_UPDATE_RECORD: u32 = 220;
const SIM_CMD_STATUS: u32 = 242;

/* A token elementary-file store: (file id, GET_RESPONSE payload, body).
 * Enough for the host to identify the card and its home network. */
static SIM_FILES: &[(u32, &str, &str)] = &[
    // EF_ICCID
    (0x2fe2, "0000000a2fe204000fff01020000", "98101430121181157002"),
    // EF_AD (administrative data: normal service, 2-digit MNC)
    (0x6fad, "000000046fad04000aa0aa01020000", "00000002"),
    // EF_SST (SIM service table)
    (0x6f38, "0000000f6f3804000aa0aa01020000", "ff3fff0f003c03000c0000f0ff00"),
];

/// One emulated SIM card, owned by a modem instance.
#[derive(Debug)]
pub struct SimCard {
    status: SimStatus,
    pin: String,
    puk: String,
    pin_retries: i32,
    puk_retries: i32,
    pin_enabled: bool,
    stk_last_response: Option<String>,
    stk_last_envelope: Option<String>,
}

impl SimCard {
    pub(crate) fn new() -> SimCard {
        SimCard {
            status: SimStatus::Ready,
            pin: "0000".to_owned(),
            puk: "12345678".to_owned(),
            pin_retries: SIM_PIN_RETRIES,
            puk_retries: SIM_PUK_RETRIES,
            pin_enabled: false,
            stk_last_response: None,
            stk_last_envelope: None,
        }
    }

    pub fn status(&self) -> SimStatus {
        self.status
    }
    pub fn set_status(&mut self, status: SimStatus) {
        self.status = status;
    }

    /// Radio power drives SIM power: a powered-down card reports NOT READY.
    pub(crate) fn set_sim_power(&mut self, enabled: bool) {
        if !enabled {
            self.status = SimStatus::NotReady;
        }
        else if self.pin_enabled {
            self.status = SimStatus::Pin;
        }
        else {
            self.status = SimStatus::Ready;
        }
    }

    pub fn pin_retries(&self) -> i32 {
        self.pin_retries
    }
    pub fn puk_retries(&self) -> i32 {
        self.puk_retries
    }
    pub fn pin_enabled(&self) -> bool {
        self.pin_enabled
    }

    pub(crate) fn check_pin(&mut self, pin: &str) -> bool {
        if self.status != SimStatus::Pin && self.status != SimStatus::Ready {
            return false;
        }
        if pin == self.pin {
            self.pin_retries = SIM_PIN_RETRIES;
            self.status = SimStatus::Ready;
            return true;
        }
        self.pin_retries -= 1;
        if self.pin_retries <= 0 {
            self.pin_retries = 0;
            self.status = SimStatus::Puk;
        }
        false
    }

    pub(crate) fn check_puk(&mut self, puk: &str, new_pin: &str) -> bool {
        if self.status != SimStatus::Puk {
            return false;
        }
        if puk == self.puk {
            self.pin = new_pin.to_owned();
            self.pin_retries = SIM_PIN_RETRIES;
            self.puk_retries = SIM_PUK_RETRIES;
            self.status = SimStatus::Ready;
            return true;
        }
        self.puk_retries -= 1;
        if self.puk_retries <= 0 {
            self.puk_retries = 0;
            self.status = SimStatus::Absent;
        }
        false
    }

    pub(crate) fn set_pin(&mut self, pin: &str) {
        self.pin = pin.to_owned();
    }

    pub(crate) fn set_pin_enabled(&mut self, enabled: bool, passwd: &str) -> bool {
        if passwd != self.pin {
            return false;
        }
        self.pin_enabled = enabled;
        true
    }

    /// `+CRSM=` restricted SIM access.
    pub(crate) fn io(&mut self, cmd: &str) -> String {
        if !cmd.starts_with("+CRSM=") {
            return "+CME ERROR: 50".to_owned();
        }
        let args = match parse_params(&cmd[6..]) {
            Ok(v) => v.into_args(),
            Err(_) => return "+CME ERROR: 50".to_owned(),
        };
        let int_at = |idx: usize| -> Option<u32> {
            args.get(idx).and_then(|v| v.get_integer().ok()).cloned()
        };
        let (command, fileid) = match (int_at(0), int_at(1)) {
            (Some(c), Some(f)) => (c, f),
            _ => return "+CME ERROR: 50".to_owned(),
        };
        match command {
            SIM_CMD_STATUS => "+CRSM: 144,0".to_owned(),
            SIM_CMD_GET_RESPONSE => {
                match SIM_FILES.iter().find(|&&(id, _, _)| id == fileid) {
                    Some(&(_, response, _)) => format!("+CRSM: 144,0,{}", response),
                    // 0x6A82: file not found
                    None => "+CRSM: 106,130".to_owned(),
                }
            }
            SIM_CMD_READ_BINARY | SIM_CMD_READ_RECORD => {
                match SIM_FILES.iter().find(|&&(id, _, _)| id == fileid) {
                    Some(&(_, _, body)) => format!("+CRSM: 144,0,{}", body),
                    None => "+CRSM: 106,130".to_owned(),
                }
            }
            SIM_CMD_UPDATE_BINARY | SIM_CMD_UPDATE_RECORD => {
                // Writes are accepted and dropped.
                "+CRSM: 144,0".to_owned()
            }
            _ => "+CME ERROR: 50".to_owned(),
        }
    }

    /// `+CUSATT=` - the host answers a proactive command.
    pub(crate) fn stk_terminal_response(&mut self, cmd: &str) -> String {
        let payload = cmd.trim_start_matches("+CUSATT=").trim_matches('"');
        self.stk_last_response = Some(payload.to_owned());
        "OK".to_owned()
    }

    /// `+CUSATE=` - the host sends an envelope to the SIM.
    pub(crate) fn stk_envelope_command(&mut self, cmd: &str) -> String {
        let payload = cmd.trim_start_matches("+CUSATE=").trim_matches('"');
        self.stk_last_envelope = Some(payload.to_owned());
        "+CUSATE: \"\"".to_owned()
    }

    pub fn last_stk_response(&self) -> Option<&str> {
        self.stk_last_response.as_ref().map(|s| &s[..])
    }
    pub fn last_stk_envelope(&self) -> Option<&str> {
        self.stk_last_envelope.as_ref().map(|s| &s[..])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn pin_lockout() {
        let mut sim = SimCard::new();
        sim.set_pin_enabled(true, "0000");
        sim.set_sim_power(false);
        sim.set_sim_power(true);
        assert_eq!(sim.status(), SimStatus::Pin);
        for _ in 0..SIM_PIN_RETRIES {
            assert!(!sim.check_pin("9999"));
        }
        assert_eq!(sim.status(), SimStatus::Puk);
        assert!(!sim.check_puk("00000000", "1234"));
        assert!(sim.check_puk("12345678", "1234"));
        assert_eq!(sim.status(), SimStatus::Ready);
        assert_eq!(sim.pin_retries(), SIM_PIN_RETRIES);
        assert!(sim.check_pin("1234"));
    }
    #[test]
    fn crsm_reads() {
        let mut sim = SimCard::new();
        assert_eq!(sim.io("+CRSM=176,12258,0,0,10"),
                   "+CRSM: 144,0,98101430121181157002");
        assert_eq!(sim.io("+CRSM=176,4919,0,0,10"), "+CRSM: 106,130");
        assert_eq!(sim.io("+CRSM=broken"), "+CME ERROR: 50");
    }
    #[test]
    fn stk_stash() {
        let mut sim = SimCard::new();
        sim.stk_terminal_response("+CUSATT=\"810301250082028281830100\"");
        assert_eq!(sim.last_stk_response(), Some("810301250082028281830100"));
    }
}
