//! Network registration, operator selection and radio technology.
use crate::ModemState;

pub const MAX_OPERATORS: usize = 4;
pub const MAX_EMERGENCY_NUMBERS: usize = 16;
pub(crate) const OPERATOR_HOME_INDEX: i32 = 0;
pub(crate) const OPERATOR_ROAMING_INDEX: i32 = 1;

/* The host GSM stack checks that the operator's name has changed when
 * roaming is on, so two distinct operators are emulated: one for the 'home'
 * registration state and one with a different name and MCC/MNC for 'roaming'.
 */
pub(crate) const OPERATOR_HOME_NAME: &str = "EmuCell";
pub(crate) const OPERATOR_HOME_MCCMNC: &str = "310260";
pub(crate) const OPERATOR_ROAMING_NAME: &str = "TelKila";
pub(crate) const OPERATOR_ROAMING_MCCMNC: &str = "310295";

/// Whether the radio is powered (`+CFUN`).
#[repr(u8)]
#[derive(Debug, FromPrimitive, Copy, Clone, PartialEq, Eq, is_enum_variant)]
pub enum RadioState {
    Off = 0,
    On = 1,
}
/// The registration state of the modem, tracked independently for the
/// voice (`+CREG`) and data (`+CGREG`) domains.
#[repr(u8)]
#[derive(Debug, FromPrimitive, Copy, Clone, PartialEq, Eq, is_enum_variant)]
pub enum RegistrationState {
    Unregistered = 0,
    Home = 1,
    Searching = 2,
    Denied = 3,
    Unknown = 4,
    Roaming = 5,
}
impl RegistrationState {
    pub fn is_registered(&self) -> bool {
        match *self {
            RegistrationState::Home | RegistrationState::Roaming => true,
            _ => false,
        }
    }
}
/// How registration state changes are broadcast (`+CREG=n` / `+CGREG=n`).
#[repr(u8)]
#[derive(Debug, FromPrimitive, Copy, Clone, PartialEq, Eq, is_enum_variant)]
pub enum RegistrationUnsolMode {
    Disabled = 0,
    Enabled = 1,
    EnabledFull = 2,
}
/// The bearer technology reported in the extended `+CGREG` response.
#[repr(u8)]
#[derive(Debug, FromPrimitive, Copy, Clone, PartialEq, Eq, is_enum_variant)]
pub enum DataNetworkType {
    Unknown = 0,
    Gprs = 1,
    Edge = 2,
    Umts = 3,
    Lte = 4,
    Cdma1x = 5,
    Evdo = 6,
}
/// Operator selection mode, see the `+COPS` commands.
#[repr(u8)]
#[derive(Debug, FromPrimitive, Copy, Clone, PartialEq, Eq, is_enum_variant)]
pub enum OperatorSelection {
    Automatic = 0,
    Manual = 1,
    Deregistration = 2,
    SetFormat = 3,
    ManualAutomatic = 4,
}
/// Operator status, see the `+COPS` commands.
#[repr(u8)]
#[derive(Debug, FromPrimitive, Copy, Clone, PartialEq, Eq, is_enum_variant)]
pub enum OperatorStatus {
    Unknown = 0,
    Available = 1,
    Current = 2,
    Denied = 3,
}
/// Radio access technology (`+CTEC`).
#[repr(u8)]
#[derive(Debug, FromPrimitive, Copy, Clone, PartialEq, Eq, is_enum_variant)]
pub enum Technology {
    Gsm = 0,
    Wcdma = 1,
    Cdma = 2,
    Evdo = 3,
    Lte = 4,
    Unknown = 5,
}
/// CDMA subscription source (`+CCSS`).
#[repr(u8)]
#[derive(Debug, FromPrimitive, Copy, Clone, PartialEq, Eq, is_enum_variant)]
pub enum CdmaSubscriptionSource {
    RuimSim = 0,
    Nv = 1,
    Unknown = 2,
}
/// CDMA roaming preference (`+WRMP`).
#[repr(u8)]
#[derive(Debug, FromPrimitive, Copy, Clone, PartialEq, Eq, is_enum_variant)]
pub enum CdmaRoamingPref {
    Home = 0,
    Affiliated = 1,
    Any = 2,
    Unknown = 3,
}
/// Named technology masks a driver may select (`+CTEC=<t>,<mask>`).
#[repr(u8)]
#[derive(Debug, FromPrimitive, Copy, Clone, PartialEq, Eq, is_enum_variant)]
pub enum PreferredMask {
    GsmWcdmaPref = 0,
    Gsm = 1,
    Wcdma = 2,
    GsmWcdma = 3,
    CdmaEvdo = 4,
    Cdma = 5,
    Evdo = 6,
    GsmWcdmaCdmaEvdo = 7,
    Unknown = 8,
}
/// Optional modem behaviors, toggled through `set_feature`.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ModemFeature {
    /// Call hold / `+CHLD=2` support.
    Hold = 0x01,
}

pub(crate) static TECHS: &[(&str, Technology)] = &[
    ("gsm", Technology::Gsm),
    ("wcdma", Technology::Wcdma),
    ("cdma", Technology::Cdma),
    ("evdo", Technology::Evdo),
    ("lte", Technology::Lte),
];

/* The preferred mask is really 4 byte-sized prioritized masks; byte order
 * gives the priority, and each bit position within a byte is indexed by the
 * Technology values. The gsm/wcdma value keeps the historical bit layout
 * (WCDMA lands in the second priority byte). */
pub(crate) const TECH_PREFERRED_SHIFT: i32 = 8;
pub(crate) static PREFERRED_MASKS: &[(&str, PreferredMask, i32)] = &[
    ("gsm/wcdma", PreferredMask::GsmWcdmaPref,
     (1 << Technology::Gsm as i32) | (1 << (Technology::Wcdma as i32 + TECH_PREFERRED_SHIFT))),
    ("gsm", PreferredMask::Gsm, 1 << Technology::Gsm as i32),
    ("wcdma", PreferredMask::Wcdma, 1 << Technology::Wcdma as i32),
    ("gsm/wcdma-auto", PreferredMask::GsmWcdma,
     (1 << Technology::Gsm as i32) | (1 << Technology::Wcdma as i32)),
    ("cdma/evdo", PreferredMask::CdmaEvdo,
     (1 << Technology::Cdma as i32) | (1 << Technology::Evdo as i32)),
    ("cdma", PreferredMask::Cdma, 1 << Technology::Cdma as i32),
    ("evdo", PreferredMask::Evdo, 1 << Technology::Evdo as i32),
    ("gsm/wcdma/cdma/evdo", PreferredMask::GsmWcdmaCdmaEvdo,
     (1 << Technology::Gsm as i32) | (1 << Technology::Wcdma as i32) |
     (1 << Technology::Cdma as i32) | (1 << Technology::Evdo as i32)),
];

pub fn parse_modem_tech(name: &str) -> Technology {
    for &(n, tech) in TECHS {
        if n == name {
            return tech;
        }
    }
    Technology::Unknown
}
pub fn modem_tech_name(tech: Technology) -> Option<&'static str> {
    for &(n, t) in TECHS {
        if t == tech {
            return Some(n);
        }
    }
    None
}
pub fn parse_preferred_mask(name: &str) -> PreferredMask {
    for &(n, mask, _) in PREFERRED_MASKS {
        if n == name {
            return mask;
        }
    }
    PreferredMask::Unknown
}
pub fn preferred_mask_name(mask: PreferredMask) -> Option<&'static str> {
    for &(n, m, _) in PREFERRED_MASKS {
        if m == mask {
            return Some(n);
        }
    }
    None
}
pub(crate) fn preferred_mask_value(mask: PreferredMask) -> Option<i32> {
    for &(_, m, value) in PREFERRED_MASKS {
        if m == mask {
            return Some(value);
        }
    }
    None
}
pub(crate) fn preferred_mask_from_value(value: i32) -> PreferredMask {
    for &(_, mask, v) in PREFERRED_MASKS {
        if v == value {
            return mask;
        }
    }
    PreferredMask::Unknown
}
/// Maps a throughput name from the console to a data network type.
pub fn parse_network_type(speed: &str) -> DataNetworkType {
    match speed {
        "gprs" => DataNetworkType::Gprs,
        "edge" => DataNetworkType::Edge,
        "umts" => DataNetworkType::Umts,
        /* hsdpa is not handled yet by the host GSM framework */
        "hsdpa" => DataNetworkType::Umts,
        "full" => DataNetworkType::Umts,
        "lte" => DataNetworkType::Lte,
        "cdma" => DataNetworkType::Cdma1x,
        "evdo" => DataNetworkType::Evdo,
        // be conservative
        _ => DataNetworkType::Gprs,
    }
}
pub(crate) fn tech_from_network_type(ty: DataNetworkType) -> Technology {
    match ty {
        DataNetworkType::Gprs | DataNetworkType::Edge | DataNetworkType::Umts => Technology::Gsm,
        DataNetworkType::Lte => Technology::Lte,
        DataNetworkType::Cdma1x | DataNetworkType::Evdo => Technology::Cdma,
        DataNetworkType::Unknown => Technology::Unknown,
    }
}

/// Tells whether `tech` is set in any of the mask's 4 priority bytes.
pub(crate) fn match_preferred_mask(pmask: i32, tech: Technology) -> bool {
    for i in (0..4).rev() {
        if pmask & (1 << (tech as i32 + i * 8)) != 0 {
            return true;
        }
    }
    false
}
/// Picks the highest-priority, lowest-numbered technology set in the mask.
pub(crate) fn choose_tech_from_mask(preferred: i32) -> Technology {
    for i in (0..4).rev() {
        for j in 0..Technology::Unknown as i32 {
            if preferred & (1 << (j + 8 * i)) != 0 {
                use crate::util::ModemFromPrimitive;
                if let Ok(tech) = Technology::from_integer(j as i64) {
                    return tech;
                }
            }
        }
    }
    Technology::Unknown
}

/// One entry of the operator table, with its three name forms
/// (long alpha, short alpha, numeric MCC+MNC).
#[derive(Debug, Clone)]
pub(crate) struct Operator {
    pub(crate) status: OperatorStatus,
    pub(crate) names: [String; 3],
}

impl ModemState {
    pub(crate) fn has_network(&self) -> bool {
        !(self.radio_state == RadioState::Off
            || self.oper_index < 0
            || self.oper_index >= self.oper_count as i32
            || self.oper_selection_mode == OperatorSelection::Deregistration)
    }

    pub(crate) fn set_voice_registration_inner(&mut self, state: RegistrationState) {
        self.voice_state = state;

        self.oper_index = match state {
            RegistrationState::Home => OPERATOR_HOME_INDEX,
            RegistrationState::Roaming => OPERATOR_ROAMING_INDEX,
            _ => -1,
        };

        match self.voice_mode {
            RegistrationUnsolMode::Enabled => {
                self.unsol(&format!("+CREG: {},{}\r",
                                    self.voice_mode as i32, self.voice_state as i32));
            }
            RegistrationUnsolMode::EnabledFull => {
                self.unsol(&format!("+CREG: {},{},\"{:04x}\",\"{:07x}\"\r",
                                    self.voice_mode as i32, self.voice_state as i32,
                                    self.area_code & 0xffff, self.cell_id & 0xfffffff));
            }
            RegistrationUnsolMode::Disabled => {}
        }
    }

    pub(crate) fn set_data_registration_inner(&mut self, state: RegistrationState) {
        self.data_state = state;

        /* Any active PDP context is automatically deactivated when the
           attachment state changes to detached. */
        if !self.data_state.is_registered() {
            for nn in 0..self.contexts.len() {
                self.teardown_pdp(nn);
            }
            self.unsol("+CGEV: ME DETACH\r");
        }

        match self.data_mode {
            RegistrationUnsolMode::Enabled => {
                self.unsol(&format!("+CGREG: {},{}\r",
                                    self.data_mode as i32, self.data_state as i32));
            }
            RegistrationUnsolMode::EnabledFull => {
                if self.supports_network_data_type {
                    self.unsol(&format!("+CGREG: {},{},\"{:04x}\",\"{:07x}\",\"{:08x}\"\r",
                                        self.data_mode as i32, self.data_state as i32,
                                        self.area_code & 0xffff, self.cell_id & 0xfffffff,
                                        self.data_network as i32));
                }
                else {
                    self.unsol(&format!("+CGREG: {},{},\"{:04x}\",\"{:07x}\"\r",
                                        self.data_mode as i32, self.data_state as i32,
                                        self.area_code & 0xffff, self.cell_id & 0xfffffff));
                }
            }
            RegistrationUnsolMode::Disabled => {}
        }
    }

    /// Applies a new technology and/or preferred mask, persisting both.
    ///
    /// `Err(())` means the combination is invalid (empty mask, or a
    /// technology not present in the mask); nothing is changed in that case
    /// beyond an already-persisted mask update, matching the driver-visible
    /// behavior of the `+CTEC` handler.
    pub(crate) fn switch_technology(
        &mut self,
        newtech: Technology,
        newpreferred: i32,
    ) -> Result<Technology, ()> {
        debug!("switch_technology: oldtech: {:?}, newtech {:?}, preferred: {:x}, newpreferred: {:x}",
               self.technology, newtech, self.preferred_mask, newpreferred);
        let mut newtech = newtech;
        if newpreferred == 0 {
            return Err(());
        }
        if self.preferred_mask != newpreferred {
            self.preferred_mask = newpreferred;
            self.nvram.set(crate::nvram::NV_PREFERRED_MODE, &newpreferred.to_string());
            if !match_preferred_mask(self.preferred_mask, newtech) {
                newtech = choose_tech_from_mask(newpreferred);
            }
        }
        if self.technology != newtech {
            if !match_preferred_mask(self.preferred_mask, newtech) {
                return Err(());
            }
            self.technology = newtech;
            if let Some(name) = modem_tech_name(self.technology) {
                self.nvram.set(crate::nvram::NV_MODEM_TECHNOLOGY, name);
            }
        }
        Ok(self.technology)
    }

    /// Driver-side technology change; notifies the host with `+CTEC` when
    /// the effective technology moved.
    pub(crate) fn set_technology_inner(
        &mut self,
        tech: Technology,
        mask: Option<PreferredMask>,
    ) -> Result<(), ()> {
        let current = self.technology;
        let preferred = match mask.and_then(preferred_mask_value) {
            Some(value) => value,
            None => self.preferred_mask,
        };
        let effective = self.switch_technology(tech, preferred)?;
        if effective != current {
            self.unsol(&format!("+CTEC: {}\r", effective as i32));
        }
        Ok(())
    }

    /// The `+CSQ` response body, with out-of-range values reported as
    /// "unknown or undetectable" per TS 27.007.
    pub(crate) fn signal_strength_line(&self) -> String {
        let rssi = if self.rssi < 0 || self.rssi > 31 { 99 } else { self.rssi };
        let ber = if self.ber < 0 || self.ber > 7 { 99 } else { self.ber };
        let rxlev = if self.rxlev < 0 || self.rxlev > 63 { 99 } else { self.rxlev };
        let rsrp = if self.rsrp < 44 || self.rsrp > 140 { 0x7FFF_FFFF } else { self.rsrp };
        let rssnr = if self.rssnr < -200 || self.rssnr > 300 { 0x7FFF_FFFF } else { self.rssnr };
        format!("+CSQ: {},{},85,130,90,6,4,{},{},2147483647,{},2147483647\r\n",
                rssi, ber, rxlev, rsrp, rssnr)
    }

    pub(crate) fn is_emergency(&self, number: &str) -> bool {
        self.emergency_numbers.iter().any(|n| n == number)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn preferred_mask_values() {
        // Pin the historical gsm/wcdma layout: WCDMA's bit sits in the
        // second priority byte, not next to GSM's.
        assert_eq!(preferred_mask_value(PreferredMask::GsmWcdmaPref), Some(0x201));
        assert_eq!(preferred_mask_value(PreferredMask::GsmWcdma), Some(0x3));
        assert_eq!(preferred_mask_value(PreferredMask::GsmWcdmaCdmaEvdo), Some(0xf));
    }
    #[test]
    fn mask_matching() {
        assert!(match_preferred_mask(0x201, Technology::Gsm));
        assert!(match_preferred_mask(0x201, Technology::Wcdma));
        assert!(!match_preferred_mask(0x201, Technology::Cdma));
        assert!(match_preferred_mask(0x0f, Technology::Evdo));
    }
    #[test]
    fn tech_choice_prefers_high_bytes() {
        // WCDMA in the second priority byte beats GSM in the first.
        assert_eq!(choose_tech_from_mask(0x201), Technology::Wcdma);
        assert_eq!(choose_tech_from_mask(0x0f), Technology::Gsm);
        assert_eq!(choose_tech_from_mask(0x8), Technology::Evdo);
    }
    #[test]
    fn tech_names_round_trip() {
        for &(name, tech) in TECHS {
            assert_eq!(parse_modem_tech(name), tech);
            assert_eq!(modem_tech_name(tech), Some(name));
        }
        assert_eq!(parse_modem_tech("bogus"), Technology::Unknown);
    }
}
