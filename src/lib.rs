//! An emulated cellular baseband.
//!
//! This crate is a software stand-in for a GSM/UMTS/CDMA/LTE modem: it
//! accepts AT command lines from a host telephony stack, produces replies
//! and unsolicited notifications, and maintains the observable state a real
//! modem exposes - radio power, network registration, operator identity,
//! signal strength, a voice-call state machine, SMS routing, PDP contexts,
//! SIM status and supplementary services.
//!
//! A [`Modem`] is created per emulated device, addressed by
//! `(base_port, instance_id)`; the process-wide [`ModemHub`] carries the two
//! genuinely shared objects (the data-link pool and the in-process peer
//! registry). Placing a call or sending an SMS to another instance's number
//! raises the corresponding inbound event there, either directly in-process
//! or over a TCP relay channel to the peer's console port.
//!
//! The modem runs inside a single-threaded `tokio_core` reactor: command
//! handling, call-progress timers and relay I/O all interleave cooperatively
//! and never run concurrently with each other.

#[macro_use]
extern crate log;
#[macro_use]
extern crate nom;
extern crate failure;
#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate num_derive;
#[macro_use]
extern crate derive_is_enum_variant;
extern crate bytes;
extern crate encoding;
extern crate futures;
extern crate num;
extern crate tokio_core;
extern crate tokio_io;
#[cfg(test)]
extern crate env_logger;

pub mod at;
pub mod call;
mod dispatch;
pub mod error_codes;
pub mod errors;
mod framer;
pub mod network;
mod nvram;
pub mod parse;
pub mod pdp;
pub mod pdu;
mod relay;
pub mod sim;
mod sms;
pub mod snapshot;
pub mod supplementary;
pub mod util;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::{Rc, Weak};
use tokio_core::reactor::Handle;

pub use crate::call::{Call, CallDir, CallFailCause, CallMode, CallState, normalize_number,
                      MAX_CALLS, PHONE_PREFIX};
pub use crate::error_codes::CmeError;
pub use crate::errors::{ModemError, ModemResult};
pub use crate::network::{CdmaRoamingPref, CdmaSubscriptionSource, DataNetworkType, ModemFeature,
                         OperatorSelection, OperatorStatus, PreferredMask, RadioState,
                         RegistrationState, RegistrationUnsolMode, Technology, MAX_OPERATORS};
pub use crate::pdp::{NetworkAdapter, NullAdapter, MAX_DATA_CONTEXTS};
pub use crate::pdu::{DeliverPdu, HexData, SmsAddress, SubmitPdu};
pub use crate::sim::SimStatus;
pub use crate::snapshot::SNAPSHOT_VERSION;

use crate::framer::Framer;
use crate::network::{Operator, OPERATOR_HOME_MCCMNC, OPERATOR_HOME_NAME,
                     OPERATOR_ROAMING_MCCMNC, OPERATOR_ROAMING_NAME};
use crate::nvram::Nvram;
use crate::pdp::{DataLink, PdpContext};
use crate::pdu::SmsReceiver;
use crate::relay::RemoteEntry;
use crate::sim::SimCard;
use crate::supplementary::SupplementaryService;
use crate::util::{utc_now, ModemFromPrimitive};

const SMSC_ADDRESS: &str = "+123456789";
const MAX_EXTRA_EMERGENCY_NUMBERS: usize = network::MAX_EMERGENCY_NUMBERS - 1;

pub(crate) struct HubInner {
    pub(crate) nvram_dir: PathBuf,
    pub(crate) links: RefCell<Vec<DataLink>>,
    pub(crate) peers: RefCell<HashMap<(u16, u8), Weak<RefCell<ModemState>>>>,
    pub(crate) adapter: Box<dyn NetworkAdapter>,
    pub(crate) remote_calls: RefCell<Vec<RemoteEntry>>,
    pub(crate) next_remote_id: Cell<u64>,
}

/// The process-wide state shared by every modem instance: the data-link
/// pool, the in-process peer registry, the relay bookkeeping and the
/// directory NV-RAM files live in. Construct one per process and pass it to
/// every [`Modem::create`].
#[derive(Clone)]
pub struct ModemHub {
    pub(crate) inner: Rc<HubInner>,
}

impl ModemHub {
    /// A hub with the default link pool (`rmnet.0` .. `rmnet.3`) and a
    /// logging-only network adapter.
    pub fn new<P: Into<PathBuf>>(nvram_dir: P) -> ModemHub {
        ModemHub::with_adapter(nvram_dir, Box::new(NullAdapter), MAX_DATA_CONTEXTS)
    }

    /// A hub with a custom host network adapter and link-pool size.
    pub fn with_adapter<P: Into<PathBuf>>(
        nvram_dir: P,
        adapter: Box<dyn NetworkAdapter>,
        link_count: usize,
    ) -> ModemHub {
        let links = pdp::default_links(link_count);
        // data connections are down by default
        for link in &links {
            adapter.set_link(&link.name, false);
        }
        ModemHub {
            inner: Rc::new(HubInner {
                nvram_dir: nvram_dir.into(),
                links: RefCell::new(links),
                peers: RefCell::new(HashMap::new()),
                adapter,
                remote_calls: RefCell::new(vec![]),
                next_remote_id: Cell::new(0),
            }),
        }
    }

    /// Looks up a live in-process instance.
    pub fn instance(&self, base_port: u16, instance_id: u8) -> Option<Modem> {
        self.instance_state(base_port, instance_id)
            .map(|state| Modem { state })
    }

    pub(crate) fn instance_state(
        &self,
        base_port: u16,
        instance_id: u8,
    ) -> Option<Rc<RefCell<ModemState>>> {
        self.inner
            .peers
            .borrow()
            .get(&(base_port, instance_id))
            .and_then(|weak| weak.upgrade())
    }

    /// Number of relay channels currently in flight.
    pub fn active_remote_calls(&self) -> usize {
        self.inner.remote_calls.borrow().len()
    }

    pub(crate) fn next_remote_id(&self) -> u64 {
        let id = self.inner.next_remote_id.get() + 1;
        self.inner.next_remote_id.set(id);
        id
    }
    pub(crate) fn push_remote_entry(&self, entry: RemoteEntry) {
        self.inner.remote_calls.borrow_mut().push(entry);
    }
    pub(crate) fn remove_remote_entry(&self, id: u64) {
        self.inner.remote_calls.borrow_mut().retain(|e| e.id != id);
    }
}

/// All the mutable state of one emulated modem. Shared behind
/// `Rc<RefCell<_>>` between the consumer handle, timers and relay futures.
pub(crate) struct ModemState {
    pub(crate) base_port: u16,
    pub(crate) instance_id: u8,

    /// Legacy support: drop the network data type from `+CGREG` responses.
    pub(crate) supports_network_data_type: bool,

    pub(crate) radio_state: RadioState,
    pub(crate) area_code: i32,
    pub(crate) cell_id: i32,

    pub(crate) rssi: i32,
    pub(crate) ber: i32,

    /* LTE signal strength */
    pub(crate) rxlev: i32,
    pub(crate) rsrp: i32,
    pub(crate) rssnr: i32,

    pub(crate) wait_sms: bool,

    pub(crate) sim: SimCard,
    pub(crate) supplementary: SupplementaryService,

    pub(crate) voice_mode: RegistrationUnsolMode,
    pub(crate) voice_state: RegistrationState,
    pub(crate) data_mode: RegistrationUnsolMode,
    pub(crate) data_state: RegistrationState,
    pub(crate) data_network: DataNetworkType,

    pub(crate) oper_selection_mode: OperatorSelection,
    pub(crate) oper_name_index: usize,
    pub(crate) oper_index: i32,
    pub(crate) oper_count: usize,
    pub(crate) operators: Vec<Operator>,

    pub(crate) contexts: Vec<PdpContext>,

    pub(crate) calls: Vec<call::VoiceCall>,
    pub(crate) multi_count: usize,
    pub(crate) last_call_fail_cause: i32,
    pub(crate) next_call_serial: u64,

    pub(crate) out: Framer,
    pub(crate) nvram: Nvram,

    pub(crate) technology: Technology,
    /* Really 4 byte-sized prioritized masks; byte order gives the priority,
     * and each bit position within a byte is indexed by the Technology
     * values. 0x01 means only GSM; 0x0f means GSM, WCDMA, CDMA and EVDO. */
    pub(crate) preferred_mask: i32,
    pub(crate) subscription_source: CdmaSubscriptionSource,
    pub(crate) roaming_pref: i32,
    pub(crate) in_emergency_mode: bool,
    pub(crate) prl_version: i32,

    pub(crate) emergency_numbers: Vec<String>,

    pub(crate) smsc_address: SmsAddress,

    pub(crate) features: u32,
    pub(crate) last_dialed_tone: Option<char>,

    pub(crate) sms_receiver: SmsReceiver,

    pub(crate) hub: ModemHub,
    pub(crate) handle: Handle,
    pub(crate) myself: Weak<RefCell<ModemState>>,
}

impl ModemState {
    pub(crate) fn reply(&self, body: &str) {
        self.out.reply(body);
    }
    pub(crate) fn unsol(&self, body: &str) {
        self.out.unsol(body);
    }
    pub(crate) fn reply_cme(&self, code: CmeError) {
        debug!("+CME ERROR {}: {}", code as u32, code);
        self.reply(&format!("+CME ERROR: {}", code as u32));
    }

    pub(crate) fn has_feature(&self, feature: ModemFeature) -> bool {
        self.features & feature as u32 != 0
    }

    /// Flips the radio and cascades registration and SIM power. Returns
    /// whether the state actually changed.
    pub(crate) fn set_radio_state_quiet(&mut self, radio_state: RadioState) -> bool {
        if self.radio_state == radio_state {
            return false;
        }
        self.radio_state = radio_state;
        match radio_state {
            RadioState::Off => {
                self.set_voice_registration_inner(RegistrationState::Unregistered);
                self.set_data_registration_inner(RegistrationState::Unregistered);
                self.sim.set_sim_power(false);
            }
            RadioState::On => {
                self.set_voice_registration_inner(RegistrationState::Home);
                self.set_data_registration_inner(RegistrationState::Home);
                self.sim.set_sim_power(true);
            }
        }
        true
    }

    /// Radio flip plus the `+CFUN` notification, an extension of the
    /// `+CFUN?` response made unsolicited.
    pub(crate) fn set_radio_state_update(&mut self, radio_state: RadioState) {
        if !self.set_radio_state_quiet(radio_state) {
            return;
        }
        match radio_state {
            RadioState::Off => self.unsol("+CFUN: 0"),
            RadioState::On => self.unsol("+CFUN: 1"),
        }
    }

    pub(crate) fn set_cdma_subscription_source_quiet(
        &mut self,
        source: CdmaSubscriptionSource,
    ) -> bool {
        if source == self.subscription_source {
            return false;
        }
        self.nvram.set(
            nvram::NV_CDMA_SUBSCRIPTION_SOURCE,
            &(source as i32).to_string(),
        );
        self.subscription_source = source;
        true
    }

    pub(crate) fn set_smsc_address_inner(&mut self, smsc: &str, toa: u8) -> ModemResult<()> {
        let address = SmsAddress::from_str(smsc);
        if toa != 0 && toa != address.toa {
            return Err(ModemError::BadTypeOfAddress(toa));
        }
        self.smsc_address = address;
        self.nvram.set(nvram::NV_MODEM_SMSC_ADDRESS, smsc);
        Ok(())
    }

    /// The `%CTZV` time/timezone line, rendered in UTC.
    pub(crate) fn time_update_line(&self) -> String {
        let (y, mo, d, h, mi, s) = utc_now();
        format!(
            "%CTZV: {:02}/{:02}/{:02}:{:02}:{:02}:{:02}+0:0:Unknown!Unknown\r\n",
            y % 100,
            mo,
            d,
            h,
            mi,
            s
        )
    }
}

/// One emulated modem. A cheap clonable handle; state lives behind a shared
/// cell and is also reachable from timers and relay futures.
#[derive(Clone)]
pub struct Modem {
    state: Rc<RefCell<ModemState>>,
}

impl Modem {
    /// Creates a modem instance and registers it with `hub`.
    ///
    /// `unsol_func` receives every chunk of emitted text: framed replies and
    /// unsolicited notifications alike. It must not re-enter the modem.
    pub fn create<F>(
        hub: &ModemHub,
        handle: &Handle,
        base_port: u16,
        instance_id: u8,
        unsol_func: F,
    ) -> Modem
    where
        F: Fn(&str) + 'static,
    {
        let nvram_path = hub
            .inner
            .nvram_dir
            .join(format!("modem-nv-ram-{}-{}", base_port, instance_id));
        let mut nvram = Nvram::load(nvram_path);

        let oper_name_index = nvram.get_int(nvram::NV_OPER_NAME_INDEX, 2).max(0).min(2) as usize;
        let oper_selection_mode = OperatorSelection::from_integer(
            nvram.get_int(nvram::NV_SELECTION_MODE, OperatorSelection::Automatic as i32) as i64,
        ).unwrap_or(OperatorSelection::Automatic);
        let oper_index = nvram.get_int(nvram::NV_OPER_INDEX, 0);
        let oper_count = nvram.get_int(nvram::NV_OPER_COUNT, 2).max(0).min(MAX_OPERATORS as i32)
            as usize;
        let in_emergency_mode = nvram.get_int(nvram::NV_IN_ECBM, 0) != 0;
        let prl_version = nvram.get_int(nvram::NV_PRL_VERSION, 0);

        let mut emergency_numbers = vec!["911".to_owned()];
        for i in 1..=MAX_EXTRA_EMERGENCY_NUMBERS {
            let key = format!("{}{}", nvram::NV_EMERGENCY_NUMBER_FMT, i);
            if let Some(number) = nvram.get_str(&key, None) {
                emergency_numbers.push(number);
            }
        }

        let technology = {
            let name = nvram
                .get_str(nvram::NV_MODEM_TECHNOLOGY, Some("gsm"))
                .unwrap_or_else(|| "gsm".to_owned());
            match network::parse_modem_tech(&name) {
                Technology::Unknown => Technology::Gsm,
                tech => tech,
            }
        };
        // GSM, WCDMA, CDMA and EvDo by default
        let preferred_mask = nvram.get_int(nvram::NV_PREFERRED_MODE, 0x0f);

        let subscription_source = {
            let iss = nvram.get_int(
                nvram::NV_CDMA_SUBSCRIPTION_SOURCE,
                CdmaSubscriptionSource::RuimSim as i32,
            );
            CdmaSubscriptionSource::from_integer(iss as i64)
                .ok()
                .filter(|s| *s != CdmaSubscriptionSource::Unknown)
                .unwrap_or(CdmaSubscriptionSource::RuimSim)
        };
        let roaming_pref = {
            let rp = nvram.get_int(nvram::NV_CDMA_ROAMING_PREF, CdmaRoamingPref::Any as i32);
            if rp < 0 || rp >= CdmaRoamingPref::Unknown as i32 {
                CdmaRoamingPref::Any as i32
            }
            else {
                rp
            }
        };

        let smsc_address = {
            let smsc = nvram
                .get_str(nvram::NV_MODEM_SMSC_ADDRESS, Some(SMSC_ADDRESS))
                .unwrap_or_else(|| SMSC_ADDRESS.to_owned());
            SmsAddress::from_str(&smsc)
        };

        let mut operators = vec![
            Operator {
                status: OperatorStatus::Available,
                names: [
                    OPERATOR_HOME_NAME.to_owned(),
                    OPERATOR_HOME_NAME.to_owned(),
                    OPERATOR_HOME_MCCMNC.to_owned(),
                ],
            },
            Operator {
                status: OperatorStatus::Available,
                names: [
                    OPERATOR_ROAMING_NAME.to_owned(),
                    OPERATOR_ROAMING_NAME.to_owned(),
                    OPERATOR_ROAMING_MCCMNC.to_owned(),
                ],
            },
        ];
        while operators.len() < MAX_OPERATORS {
            operators.push(Operator {
                status: OperatorStatus::Unknown,
                names: [String::new(), String::new(), String::new()],
            });
        }

        let state = ModemState {
            base_port,
            instance_id,
            supports_network_data_type: true,
            radio_state: RadioState::Off,
            area_code: 0,
            cell_id: 0,
            rssi: 7,  // two signal strength bars
            ber: 99,  // 'unknown'
            rxlev: 99,    // not known or not detectable
            rsrp: 65535,  // invalid value
            rssnr: 65535, // invalid value
            wait_sms: false,
            sim: SimCard::new(),
            supplementary: SupplementaryService::new(),
            voice_mode: RegistrationUnsolMode::EnabledFull,
            voice_state: RegistrationState::Home,
            data_mode: RegistrationUnsolMode::EnabledFull,
            data_state: RegistrationState::Home,
            data_network: DataNetworkType::Umts,
            oper_selection_mode,
            oper_name_index,
            oper_index,
            oper_count,
            operators,
            contexts: (0..MAX_DATA_CONTEXTS).map(|_| PdpContext::undefined()).collect(),
            calls: vec![],
            multi_count: 0,
            last_call_fail_cause: 0,
            next_call_serial: 0,
            out: Framer::new(Box::new(unsol_func)),
            nvram,
            technology,
            preferred_mask,
            subscription_source,
            roaming_pref,
            in_emergency_mode,
            prl_version,
            emergency_numbers,
            smsc_address,
            features: ModemFeature::Hold as u32,
            last_dialed_tone: None,
            sms_receiver: SmsReceiver::new(),
            hub: hub.clone(),
            handle: handle.clone(),
            myself: Weak::new(),
        };
        state.nvram.save();

        let rc = Rc::new(RefCell::new(state));
        rc.borrow_mut().myself = Rc::downgrade(&rc);
        hub.inner
            .peers
            .borrow_mut()
            .insert((base_port, instance_id), Rc::downgrade(&rc));
        Modem { state: rc }
    }

    /// Feeds one line from the transport. Returns the `wait_sms` flag: when
    /// true, the next line is an SMS PDU body, not an AT command.
    pub fn send(&self, line: &str) -> bool {
        let mut st = self.state.borrow_mut();
        if st.wait_sms {
            st.wait_sms = false;
            debug!("SMS<< {}", framer::quote(line));
            st.submit_sms_body(line);
            return st.wait_sms;
        }
        /* everything that doesn't start with 'AT' is not a command */
        let bytes = line.as_bytes();
        if bytes.len() < 3 || bytes[0] != b'A' || bytes[1] != b'T' {
            return st.wait_sms;
        }
        debug!("<< {}", framer::quote(line));
        dispatch::route(&mut st, &line[2..]);
        st.wait_sms
    }

    pub fn base_port(&self) -> u16 {
        self.state.borrow().base_port
    }
    pub fn instance_id(&self) -> u8 {
        self.state.borrow().instance_id
    }

    pub fn radio_state(&self) -> RadioState {
        self.state.borrow().radio_state
    }
    pub fn set_radio_state(&self, radio_state: RadioState) {
        self.state.borrow_mut().set_radio_state_update(radio_state);
    }

    pub fn voice_registration(&self) -> RegistrationState {
        self.state.borrow().voice_state
    }
    pub fn set_voice_registration(&self, state: RegistrationState) {
        self.state.borrow_mut().set_voice_registration_inner(state);
    }
    pub fn data_registration(&self) -> RegistrationState {
        self.state.borrow().data_state
    }
    pub fn set_data_registration(&self, state: RegistrationState) {
        self.state.borrow_mut().set_data_registration_inner(state);
    }

    /// Changes the reported data network type, refreshing registration and
    /// re-deriving the radio technology where the type implies one.
    pub fn set_data_network_type(&self, ty: DataNetworkType) {
        let mut st = self.state.borrow_mut();
        st.data_network = ty;
        let current = st.data_state;
        st.set_data_registration_inner(current);
        let tech = network::tech_from_network_type(ty);
        if tech != Technology::Unknown {
            let _ = st.set_technology_inner(tech, Some(PreferredMask::GsmWcdmaPref));
        }
    }

    pub fn technology(&self) -> Technology {
        self.state.borrow().technology
    }
    pub fn preferred_mask(&self) -> PreferredMask {
        network::preferred_mask_from_value(self.state.borrow().preferred_mask)
    }
    pub fn set_technology(
        &self,
        technology: Technology,
        mask: Option<PreferredMask>,
    ) -> ModemResult<()> {
        self.state
            .borrow_mut()
            .set_technology_inner(technology, mask)
            .map_err(|()| ModemError::ValueOutOfRange(technology as i64))
    }

    pub fn signal_strength(&self) -> (i32, i32) {
        let st = self.state.borrow();
        (st.rssi, st.ber)
    }
    pub fn set_signal_strength(&self, rssi: i32, ber: i32) {
        let mut st = self.state.borrow_mut();
        st.rssi = rssi;
        st.ber = ber;
        /* reset the LTE values */
        st.rxlev = 99;
        st.rsrp = 65535;
        st.rssnr = 65535;
        let line = st.signal_strength_line();
        st.unsol(&line);
    }
    pub fn lte_signal_strength(&self) -> (i32, i32, i32) {
        let st = self.state.borrow();
        (st.rxlev, st.rsrp, st.rssnr)
    }
    pub fn set_lte_signal_strength(&self, rxlev: i32, rsrp: i32, rssnr: i32) {
        let mut st = self.state.borrow_mut();
        /* reset the GSM/UMTS values */
        st.rssi = 99;
        st.ber = 99;
        st.rxlev = rxlev;
        st.rsrp = rsrp;
        st.rssnr = rssnr;
        let line = st.signal_strength_line();
        st.unsol(&line);
    }

    pub fn call_count(&self) -> usize {
        self.state.borrow().calls.len()
    }
    pub fn call(&self, index: usize) -> Option<Call> {
        self.state.borrow().calls.get(index).map(|c| c.call.clone())
    }
    pub fn call_by_number(&self, number: &str) -> Option<Call> {
        let st = self.state.borrow();
        st.find_call_by_number(number).map(|i| st.calls[i].call.clone())
    }

    pub fn operator_name(&self, name_index: usize) -> Option<String> {
        let st = self.state.borrow();
        if name_index > 2 || st.oper_index < 0 || st.oper_index >= st.oper_count as i32 {
            return None;
        }
        Some(st.operators[st.oper_index as usize].names[name_index].clone())
    }
    pub fn set_operator_name(&self, name_index: usize, name: &str) {
        let mut st = self.state.borrow_mut();
        if name_index > 2 || st.oper_index < 0 || st.oper_index >= st.oper_count as i32 {
            return;
        }
        let mut name = name.to_owned();
        name.truncate(15);
        let index = st.oper_index as usize;
        st.operators[index].names[name_index] = name;
    }

    pub fn gsm_location(&self) -> (i32, i32) {
        let st = self.state.borrow();
        (st.area_code, st.cell_id)
    }
    pub fn set_gsm_location(&self, lac: i32, ci: i32) {
        let mut st = self.state.borrow_mut();
        if st.area_code == lac && st.cell_id == ci {
            return;
        }
        st.area_code = lac;
        st.cell_id = ci;
        // notify the host through the registration unsolicited
        let state = st.voice_state;
        st.set_voice_registration_inner(state);
    }

    pub fn smsc_address(&self) -> SmsAddress {
        self.state.borrow().smsc_address.clone()
    }
    pub fn set_smsc_address(&self, smsc: &str, toa: u8) -> ModemResult<()> {
        self.state.borrow_mut().set_smsc_address_inner(smsc, toa)
    }

    pub fn cdma_subscription_source(&self) -> CdmaSubscriptionSource {
        self.state.borrow().subscription_source
    }
    pub fn set_cdma_subscription_source(&self, source: CdmaSubscriptionSource) {
        let mut st = self.state.borrow_mut();
        if st.set_cdma_subscription_source_quiet(source) {
            st.unsol(&format!("+CCSS: {}", source as i32));
        }
    }
    pub fn cdma_prl_version(&self) -> i32 {
        self.state.borrow().prl_version
    }
    pub fn set_cdma_prl_version(&self, prl_version: i32) {
        let mut st = self.state.borrow_mut();
        if st.prl_version != prl_version {
            st.prl_version = prl_version;
            st.unsol(&format!("+WPRL: {}", prl_version));
        }
    }
    pub fn cdma_roaming_pref(&self) -> i32 {
        self.state.borrow().roaming_pref
    }

    pub fn set_feature(&self, feature: ModemFeature, enable: bool) {
        let mut st = self.state.borrow_mut();
        if enable {
            st.features |= feature as u32;
        }
        else {
            st.features &= !(feature as u32);
        }
    }
    /// Drops the network data type from extended `+CGREG` responses, for
    /// hosts predating it.
    pub fn set_legacy(&self) {
        self.state.borrow_mut().supports_network_data_type = false;
    }

    pub fn last_dialed_tone(&self) -> Option<char> {
        self.state.borrow().last_dialed_tone
    }
    pub fn reset_last_dialed_tone(&self) {
        self.state.borrow_mut().last_dialed_tone = None;
    }

    pub fn sim_status(&self) -> SimStatus {
        self.state.borrow().sim.status()
    }
    pub fn set_sim_status(&self, status: SimStatus) {
        self.state.borrow_mut().sim.set_status(status);
    }

    /// Simulates an incoming call, ringing the host.
    pub fn add_inbound_call(
        &self,
        number: &str,
        number_presentation: i32,
        name: &str,
        name_presentation: i32,
    ) -> ModemResult<()> {
        self.state.borrow_mut().add_inbound_call_inner(
            number,
            number_presentation,
            name,
            name_presentation,
        )
    }

    /// Simulates the device dialing out, as if `ATD<number>;` had arrived.
    pub fn add_outbound_call(&self, number: &str) -> ModemResult<()> {
        self.state
            .borrow_mut()
            .add_outbound_call_inner(number)
            .map(|_| ())
            .ok_or(ModemError::TooManyCalls)
    }

    /// The remote side hung up: drop the call and tell the host.
    pub fn disconnect_call(&self, number: &str) -> ModemResult<()> {
        let mut st = self.state.borrow_mut();
        let index = st
            .find_call_by_number(number)
            .ok_or_else(|| ModemError::NoSuchCall(number.to_owned()))?;
        st.free_call(index, CallFailCause::Normal);
        st.unsol("NO CARRIER\r");
        Ok(())
    }

    /// Moves the call with `number` to `state` (console / relay driven).
    pub fn update_call(&self, number: &str, state: CallState) -> ModemResult<()> {
        let mut st = self.state.borrow_mut();
        let index = st
            .find_call_by_number(number)
            .ok_or_else(|| ModemError::NoSuchCall(number.to_owned()))?;
        st.set_call_state(index, state);
        st.send_calls_update();
        Ok(())
    }

    /// The remote side is busy: drop the call with cause BUSY.
    pub fn remote_call_busy(&self, number: &str) -> ModemResult<()> {
        let mut st = self.state.borrow_mut();
        let index = st
            .find_call_by_number(number)
            .ok_or_else(|| ModemError::NoSuchCall(number.to_owned()))?;
        st.free_call(index, CallFailCause::Busy);
        st.unsol("NO CARRIER\r");
        Ok(())
    }

    /// Aborts every call at once.
    pub fn clear_call(&self) {
        let mut st = self.state.borrow_mut();
        if st.calls.is_empty() {
            return;
        }
        for index in (0..st.calls.len()).rev() {
            st.free_call(index, CallFailCause::Normal);
        }
        st.unsol("NO CARRIER\r");
    }

    /// Delivers an SMS to the host (`+CMT`).
    pub fn receive_sms(&self, pdu: &DeliverPdu) {
        self.state.borrow().receive_sms_inner(pdu);
    }
    /// Delivers a cell-broadcast PDU to the host (`+CBM`).
    pub fn receive_cbs(&self, pdu: &[u8]) {
        self.state.borrow().receive_cbs_inner(pdu);
    }

    /// Pushes an STK proactive command to the host.
    pub fn send_stk_unsol_proactive_command(&self, stk_cmd_pdu: &str) {
        self.state
            .borrow()
            .unsol(&format!("+CUSATP: {}\r", stk_cmd_pdu));
    }
    pub fn last_stk_response(&self) -> Option<String> {
        self.state.borrow().sim.last_stk_response().map(|s| s.to_owned())
    }
    pub fn last_stk_envelope(&self) -> Option<String> {
        self.state.borrow().sim.last_stk_envelope().map(|s| s.to_owned())
    }

    pub fn last_call_fail_cause(&self) -> i32 {
        self.state.borrow().last_call_fail_cause
    }

    /// Serializes the call table.
    pub fn snapshot_save(&self) -> Vec<u8> {
        snapshot::save_calls(&self.state.borrow().calls)
    }

    /// Replaces the call table with a saved one. Existing calls are freed
    /// first; timers and remote-call bindings are not restored.
    pub fn snapshot_load(&self, data: &[u8]) -> ModemResult<()> {
        let loaded = snapshot::load_calls(data)?;
        if loaded.len() > MAX_CALLS {
            return Err(ModemError::TooManyCalls);
        }
        let mut st = self.state.borrow_mut();
        for index in (0..st.calls.len()).rev() {
            st.free_call(index, CallFailCause::Normal);
        }
        for snap in loaded {
            let index = match st.alloc_call() {
                Some(index) => index,
                None => break,
            };
            let vcall = &mut st.calls[index];
            vcall.call.dir = snap.dir;
            vcall.call.state = snap.state;
            vcall.call.mode = snap.mode;
            vcall.call.multi = snap.multi;
            vcall.call.number = snap.number;
        }
        let multi = st.calls.iter().filter(|c| c.call.multi).count();
        st.multi_count = multi;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::BufRead;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_core::reactor::{Core, Timeout};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn test_hub() -> ModemHub {
        let _ = ::env_logger::init();
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        ModemHub::new(::std::env::temp_dir().join(format!(
            "modem-emu-test-{}-{}",
            ::std::process::id(),
            n
        )))
    }

    type Sink = Rc<RefCell<Vec<String>>>;

    fn test_modem(hub: &ModemHub, core: &Core, base_port: u16, instance_id: u8) -> (Modem, Sink) {
        let sink: Sink = Rc::new(RefCell::new(vec![]));
        let s2 = sink.clone();
        let modem = Modem::create(hub, &core.handle(), base_port, instance_id, move |text| {
            s2.borrow_mut().push(text.to_owned());
        });
        (modem, sink)
    }

    fn output(sink: &Sink) -> String {
        sink.borrow().concat()
    }

    fn run_for(core: &mut Core, ms: u64) {
        let timeout = Timeout::new(Duration::from_millis(ms), &core.handle()).unwrap();
        core.run(timeout).unwrap();
    }

    #[test]
    fn noise_and_unsupported() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, sink) = test_modem(&hub, &core, 5554, 0);
        assert_eq!(modem.send("not a command"), false);
        assert_eq!(output(&sink), "");
        modem.send("ATGARBAGE");
        assert_eq!(output(&sink), "ERROR: UNSUPPORTED\r");
    }

    #[test]
    fn radio_power_cycle() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, sink) = test_modem(&hub, &core, 5554, 0);
        modem.send("AT+CFUN?");
        assert_eq!(output(&sink), "+CFUN: 0\rOK\r");
        sink.borrow_mut().clear();

        modem.send("AT+CFUN=1");
        let out = output(&sink);
        assert!(out.starts_with("OK\r"));
        assert!(out.contains("+CFUN: 1"));
        assert!(out.contains("+CREG: 2,1"));
        assert_eq!(modem.radio_state(), RadioState::On);
        assert_eq!(modem.voice_registration(), RegistrationState::Home);

        sink.borrow_mut().clear();
        modem.set_radio_state(RadioState::Off);
        assert!(output(&sink).contains("+CFUN: 0"));
        assert_eq!(modem.voice_registration(), RegistrationState::Unregistered);
        assert_eq!(modem.data_registration(), RegistrationState::Unregistered);
        assert_eq!(modem.sim_status(), SimStatus::NotReady);
    }

    #[test]
    fn registration_queries() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, sink) = test_modem(&hub, &core, 5554, 0);
        modem.send("AT+CREG?");
        assert_eq!(output(&sink), "+CREG: 2,1, \"0000\", \"0000000\"\rOK\r");
        sink.borrow_mut().clear();
        modem.send("AT+CREG=1");
        assert_eq!(output(&sink), "OK\r");
        sink.borrow_mut().clear();
        modem.send("AT+CREG?");
        assert_eq!(output(&sink), "+CREG: 1,1\rOK\r");
        sink.borrow_mut().clear();
        modem.send("AT+CGREG?");
        assert_eq!(output(&sink), "+CGREG: 2,1,\"0000\",\"0000000\",\"0003\"\rOK\r");
    }

    #[test]
    fn location_update_rings_creg() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, sink) = test_modem(&hub, &core, 5554, 0);
        modem.set_gsm_location(0x12, 0x345);
        assert!(output(&sink).contains("+CREG: 2,1,\"0012\",\"0000345\""));
        assert_eq!(modem.gsm_location(), (0x12, 0x345));
    }

    #[test]
    fn dial_progresses_to_alerting() {
        let mut core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, sink) = test_modem(&hub, &core, 5554, 0);
        assert_eq!(modem.send("ATD+15551234567;"), false);
        let call = modem.call(0).unwrap();
        assert_eq!(call.id, 1);
        assert_eq!(call.dir, CallDir::Outbound);
        assert_eq!(call.state, CallState::Dialing);
        assert_eq!(call.number, "+15551234567");
        assert!(output(&sink).contains("CALL STATE CHANGED"));

        run_for(&mut core, 1200);
        assert_eq!(modem.call(0).unwrap().state, CallState::Alerting);
        // the callee answers
        modem.update_call("+15551234567", CallState::Active).unwrap();
        assert_eq!(modem.call(0).unwrap().state, CallState::Active);
    }

    #[test]
    fn dial_normalizes_short_numbers() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, _sink) = test_modem(&hub, &core, 5554, 0);
        modem.send("ATD15558;");
        assert_eq!(modem.call(0).unwrap().number, "15555215558");
    }

    #[test]
    fn dial_emergency_number() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, sink) = test_modem(&hub, &core, 5554, 0);
        modem.send("ATD911;");
        assert!(output(&sink).contains("+WSOS: 1"));
        modem.send("AT+WSOS?");
        assert!(output(&sink).contains("+WSOS: 1\rOK"));
    }

    #[test]
    fn too_many_calls() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, sink) = test_modem(&hub, &core, 5554, 0);
        for n in 0..MAX_CALLS {
            modem
                .add_inbound_call(&format!("655000{}", n), 0, "", 2)
                .unwrap();
        }
        sink.borrow_mut().clear();
        modem.send("ATD+15551234567;");
        assert_eq!(output(&sink), "ERROR: TOO MANY CALLS\r");
    }

    #[test]
    fn inbound_ring_and_answer() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, sink) = test_modem(&hub, &core, 5554, 0);
        modem.add_inbound_call("6550000", 0, "Bob", 0).unwrap();
        let out = output(&sink);
        assert!(out.contains("RING\r"));
        assert!(out.contains("+CNAP: \"Bob\",0"));
        assert_eq!(modem.call(0).unwrap().state, CallState::Incoming);

        // a second arrival waits
        modem.add_inbound_call("6550001", 0, "", 2).unwrap();
        assert_eq!(modem.call(1).unwrap().state, CallState::Waiting);

        sink.borrow_mut().clear();
        modem.send("ATA");
        assert!(output(&sink).starts_with("OK\r"));
        assert_eq!(modem.call(0).unwrap().state, CallState::Active);
    }

    #[test]
    fn clcc_lists_calls() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, sink) = test_modem(&hub, &core, 5554, 0);
        modem.add_inbound_call("6550000", 0, "", 2).unwrap();
        modem.send("ATA");
        sink.borrow_mut().clear();
        modem.send("AT+CLCC");
        assert_eq!(output(&sink), "+CLCC: 1,1,0,0,0,\"6550000\",129,\"\",2,0\r\n\rOK\r");
    }

    #[test]
    fn multiparty_lifecycle() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, sink) = test_modem(&hub, &core, 5554, 0);
        modem.add_inbound_call("6550000", 0, "", 2).unwrap();
        modem.send("ATA"); // call 1 active
        modem.add_inbound_call("6550001", 0, "", 2).unwrap(); // call 2 waiting
        modem.send("AT+CHLD=2"); // hold 1, accept 2
        assert_eq!(modem.call_by_number("6550000").unwrap().state, CallState::Held);
        assert_eq!(modem.call_by_number("6550001").unwrap().state, CallState::Active);

        sink.borrow_mut().clear();
        modem.send("AT+CHLD=3"); // join
        assert!(output(&sink).ends_with("CALL STATE CHANGED\r\rOK\r"));
        let a = modem.call_by_number("6550000").unwrap();
        let b = modem.call_by_number("6550001").unwrap();
        assert_eq!(a.state, CallState::Active);
        assert_eq!(b.state, CallState::Active);
        assert!(a.multi && b.multi);

        // releasing one of two members clears the dangling membership
        modem.send("AT+CHLD=11");
        assert_eq!(modem.call_count(), 1);
        let b = modem.call_by_number("6550001").unwrap();
        assert!(!b.multi);
    }

    #[test]
    fn chld_2x_requires_no_other_held() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, sink) = test_modem(&hub, &core, 5554, 0);
        modem.add_inbound_call("6550000", 0, "", 2).unwrap();
        modem.send("ATA");
        modem.add_inbound_call("6550001", 0, "", 2).unwrap();
        modem.send("AT+CHLD=2"); // 1 held, 2 active
        sink.borrow_mut().clear();
        modem.send("AT+CHLD=22");
        assert_eq!(output(&sink), "+CME ERROR: 3\r");
    }

    #[test]
    fn chld_without_hold_feature() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, sink) = test_modem(&hub, &core, 5554, 0);
        modem.set_feature(ModemFeature::Hold, false);
        modem.send("AT+CHLD=2");
        assert_eq!(output(&sink), "ERROR: UNSUPPORTED\r");
    }

    #[test]
    fn hangup_releases_held_and_waiting() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, sink) = test_modem(&hub, &core, 5554, 0);
        modem.add_inbound_call("6550000", 0, "", 2).unwrap();
        modem.send("ATA");
        modem.add_inbound_call("6550001", 0, "", 2).unwrap();
        modem.send("AT+CHLD=0"); // releases the waiting call
        assert_eq!(modem.call_count(), 1);
        assert_eq!(modem.call(0).unwrap().number, "6550000");
        sink.borrow_mut().clear();
        modem.send("AT+CEER");
        assert!(output(&sink).contains(&format!("+CEER: {}", CallFailCause::Normal as i32)));
    }

    #[test]
    fn pdp_define_activate_detach() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, sink) = test_modem(&hub, &core, 5554, 0);
        modem.send("AT+CGDCONT=1,\"IP\",\"internet\"");
        assert!(output(&sink).ends_with("OK\r"));
        sink.borrow_mut().clear();

        modem.send("AT+CGACT=1,1");
        assert_eq!(output(&sink), "OK\r");
        sink.borrow_mut().clear();

        modem.send("AT+CGACT?");
        assert_eq!(output(&sink), "+CGACT: 1,1\r\n\rOK\r");
        sink.borrow_mut().clear();

        modem.send("AT+CGCONTRDP=1");
        let out = output(&sink);
        assert!(out.contains("+CGCONTRDP: 1,0,\"internet\""));
        assert!(out.contains("\"10.0.2.100/24\""));
        assert!(out.contains("\"10.0.2.2\""));
        assert!(out.contains("\"10.0.2.3\""));
        sink.borrow_mut().clear();

        // redefining an active context is not allowed
        modem.send("AT+CGDCONT=1,\"IP\",\"other\"");
        assert_eq!(output(&sink), "+CME ERROR: 3\r");
        sink.borrow_mut().clear();

        // forcing the data registration away tears everything down
        modem.set_data_registration(RegistrationState::Searching);
        assert!(output(&sink).contains("+CGEV: ME DETACH\r"));
        sink.borrow_mut().clear();
        modem.send("AT+CGACT?");
        assert_eq!(output(&sink), "+CGACT: 1,0\r\n\rOK\r");
    }

    #[test]
    fn pdp_activation_preconditions() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, sink) = test_modem(&hub, &core, 5554, 0);
        modem.send("AT+CGACT=1,9");
        assert_eq!(output(&sink), "+CME ERROR: 143\r");
        sink.borrow_mut().clear();
        modem.send("AT+CGACT=1,2");
        assert_eq!(output(&sink), "+CME ERROR: 131\r");
        sink.borrow_mut().clear();
        modem.send("AT+CGDCONT=2,\"IP\",\"internet\"");
        modem.set_data_registration(RegistrationState::Searching);
        sink.borrow_mut().clear();
        modem.send("AT+CGACT=1,2");
        assert_eq!(output(&sink), "+CME ERROR: 134\r");
    }

    #[test]
    fn pdp_pool_exhaustion() {
        let core = Core::new().unwrap();
        // a hub with a single link
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let hub = ModemHub::with_adapter(
            ::std::env::temp_dir().join(format!("modem-emu-test-{}-{}", ::std::process::id(), n)),
            Box::new(NullAdapter),
            1,
        );
        let (modem, sink) = test_modem(&hub, &core, 5554, 0);
        modem.send("AT+CGDCONT=1,\"IP\",\"a\"");
        modem.send("AT+CGDCONT=2,\"IP\",\"b\"");
        modem.send("AT+CGACT=1,1");
        sink.borrow_mut().clear();
        modem.send("AT+CGACT=1,2");
        assert_eq!(output(&sink), "+CME ERROR: 134\r");
    }

    #[test]
    fn sms_submit_to_in_process_peer() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (sender, sender_sink) = test_modem(&hub, &core, 5554, 0);
        let (receiver, receiver_sink) = test_modem(&hub, &core, 5554, 1);
        assert!(receiver.instance_id() == 1);

        let parts = SubmitPdu::new_parts("25554", "hello over there", 3);
        let hex = format!("{}", HexData(&parts[0].to_bytes()));

        assert_eq!(sender.send(&format!("AT+CMGS={}", hex.len() / 2)), true);
        assert!(output(&sender_sink).ends_with("> \r"));
        sender_sink.borrow_mut().clear();

        assert_eq!(sender.send(&format!("{}\u{1a}", hex)), false);
        assert!(output(&sender_sink).starts_with("+CMGS: 0\rOK"));

        let out = output(&receiver_sink);
        assert!(out.starts_with("+CMT: 0\r\n"));
        let deliver_hex = out["+CMT: 0\r\n".len()..].trim_matches('\r');
        let deliver = DeliverPdu::from_hex(deliver_hex).unwrap();
        assert_eq!(deliver.text(), "hello over there");
        assert_eq!(deliver.originator.to_string(), "15555215554");
    }

    #[test]
    fn sms_multipart_routes_all_parts() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (sender, _sender_sink) = test_modem(&hub, &core, 5554, 0);
        let (_receiver, receiver_sink) = test_modem(&hub, &core, 5554, 1);

        let long: String = ::std::iter::repeat("zyxw").take(50).collect();
        let parts = SubmitPdu::new_parts("25554", &long, 9);
        assert!(parts.len() > 1);
        for part in &parts {
            let hex = format!("{}", HexData(&part.to_bytes()));
            sender.send(&format!("AT+CMGS={}", hex.len() / 2));
            sender.send(&hex);
        }
        let out = output(&receiver_sink);
        assert_eq!(out.matches("+CMT: 0").count(), parts.len());
        let text: String = out
            .split("+CMT: 0\r\n")
            .skip(1)
            .map(|chunk| {
                let hex = chunk.trim_matches('\r');
                DeliverPdu::from_hex(hex).unwrap().text()
            })
            .collect();
        assert_eq!(text, long);
    }

    #[test]
    fn sms_bad_pdu() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, sink) = test_modem(&hub, &core, 5554, 0);
        modem.send("AT+CMGS=4");
        sink.borrow_mut().clear();
        modem.send("nothexatall");
        assert!(output(&sink).starts_with("+CMS ERROR: INVALID SMS PDU"));
    }

    #[test]
    fn bad_pin_flow() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, sink) = test_modem(&hub, &core, 5554, 0);
        modem.set_sim_status(SimStatus::Pin);
        modem.send("AT+CPIN?");
        assert_eq!(output(&sink), "+CPIN: SIM PIN\rOK\r");
        sink.borrow_mut().clear();
        modem.send("AT+CPIN=\"9999\"");
        assert_eq!(output(&sink), "+CME ERROR: BAD PIN\r");
        sink.borrow_mut().clear();
        modem.send("AT+CPIN=\"0000\"");
        assert_eq!(output(&sink), "+CPIN: READY\rOK\r");
    }

    #[test]
    fn tech_switch_replies() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, sink) = test_modem(&hub, &core, 5554, 0);
        modem.send("AT+CTEC=2,f");
        assert_eq!(output(&sink), "+CTEC: 2\rOK\r");
        sink.borrow_mut().clear();
        modem.send("AT+CTEC=2,f");
        assert_eq!(output(&sink), "+CTEC: DONE\rOK\r");
        assert_eq!(modem.technology(), Technology::Cdma);
        sink.borrow_mut().clear();
        modem.send("AT+CTEC?");
        assert_eq!(output(&sink), "+CTEC: 2,f\rOK\r");
    }

    #[test]
    fn operator_selection() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, sink) = test_modem(&hub, &core, 5554, 0);
        modem.send("AT+COPS=1,2,\"310295\"");
        assert_eq!(output(&sink).matches("OK").count() >= 1, true);
        assert_eq!(modem.voice_registration(), RegistrationState::Roaming);
        assert_eq!(modem.operator_name(0), Some("TelKila".to_owned()));
        sink.borrow_mut().clear();

        modem.send("AT+COPS=1,2,\"999999\"");
        assert_eq!(output(&sink), "+CME ERROR: 529\r");
        sink.borrow_mut().clear();

        modem.send("AT+COPS=0");
        assert_eq!(modem.voice_registration(), RegistrationState::Home);
        sink.borrow_mut().clear();

        modem.send("AT+COPS=2");
        sink.borrow_mut().clear();
        modem.send("AT+COPS?");
        assert_eq!(output(&sink), "+CME ERROR: 30\r");
    }

    #[test]
    fn smsc_persistence() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        {
            let (modem, _sink) = test_modem(&hub, &core, 5554, 0);
            assert_eq!(modem.smsc_address().to_string(), "+123456789");
            modem.set_smsc_address("+999111222", 0).unwrap();
        }
        let (modem, _sink) = test_modem(&hub, &core, 5554, 0);
        assert_eq!(modem.smsc_address().to_string(), "+999111222");
    }

    #[test]
    fn snapshot_round_trip() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, _sink) = test_modem(&hub, &core, 5554, 0);
        modem.add_inbound_call("6550000", 0, "", 2).unwrap();
        modem.send("ATA");
        modem.add_inbound_call("6550001", 0, "", 2).unwrap();
        let data = modem.snapshot_save();

        modem.clear_call();
        assert_eq!(modem.call_count(), 0);

        modem.snapshot_load(&data).unwrap();
        assert_eq!(modem.call_count(), 2);
        let a = modem.call(0).unwrap();
        assert_eq!((a.dir, a.state, a.number.as_str()),
                   (CallDir::Inbound, CallState::Active, "6550000"));
        let b = modem.call(1).unwrap();
        assert_eq!(b.state, CallState::Waiting);
    }

    #[test]
    fn relay_burst_reaches_remote_console() {
        let mut core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, _sink) = test_modem(&hub, &core, 5554, 0);

        // the peer "emulator" console lives at the port its number encodes
        let listener = match ::std::net::TcpListener::bind(("127.0.0.1", 5584)) {
            Ok(l) => l,
            // someone else owns the port on this machine; nothing to test
            Err(_) => return,
        };
        let server = ::std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = ::std::io::BufReader::new(stream);
            let mut data = String::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 {
                    break;
                }
                let done = line == "quit\n";
                data.push_str(&line);
                if done {
                    break;
                }
            }
            data
        });

        modem.send("ATD15584;");
        run_for(&mut core, 1500);
        assert_eq!(modem.call(0).unwrap().state, CallState::Alerting);
        assert_eq!(hub.active_remote_calls(), 0);

        let received = server.join().unwrap();
        assert_eq!(received, "gsm call 15555215554\nquit\n");
    }

    #[test]
    fn relay_failure_tears_down_dial() {
        let mut core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, sink) = test_modem(&hub, &core, 5554, 0);
        // make sure nothing is listening on the target port, then free it
        match ::std::net::TcpListener::bind(("127.0.0.1", 5582)) {
            Ok(probe) => drop(probe),
            Err(_) => return,
        }
        modem.send("ATD15582;");
        run_for(&mut core, 1500);
        assert_eq!(modem.call_count(), 0);
        assert!(output(&sink).contains("NO CARRIER\r"));
    }

    #[test]
    fn call_table_invariants_after_churn() {
        let core = Core::new().unwrap();
        let hub = test_hub();
        let (modem, _sink) = test_modem(&hub, &core, 5554, 0);
        modem.add_inbound_call("6550000", 0, "", 2).unwrap();
        modem.send("ATA");
        modem.add_inbound_call("6550001", 0, "", 2).unwrap();
        modem.send("AT+CHLD=2");
        modem.send("AT+CHLD=3");
        modem.add_inbound_call("6550002", 0, "", 2).unwrap();

        let st = modem.state.borrow();
        let ids: Vec<u32> = st.calls.iter().map(|c| c.call.id).collect();
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(ids.len(), unique.len());
        assert!(st.calls.len() <= MAX_CALLS);
        let multi = st.calls.iter().filter(|c| c.call.multi).count();
        assert_eq!(multi, st.multi_count);
        assert!(st.multi_count == 0 || (st.multi_count >= 2 && st.multi_count <= 5));
        let progressing = st
            .calls
            .iter()
            .filter(|c| {
                c.call.state == CallState::Dialing
                    || c.call.state == CallState::Alerting
                    || c.call.state == CallState::Incoming
            })
            .count();
        assert!(progressing <= 1);
    }
}
