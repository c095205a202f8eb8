//! The command router: the ordered dispatch table and every AT command
//! handler.
//!
//! Handlers receive the command with its `AT` prefix already stripped and
//! reply through the framer; they run to completion, so a reply is always
//! produced before any unsolicited they trigger becomes visible to the host,
//! except where a state update deliberately precedes the final `OK` (dial,
//! `+CHLD`).
use crate::at::{Action, AtValue, Matcher};
use crate::call::{CallFailCause, CallMode, CallState};
use crate::error_codes::CmeError;
use crate::network::{
    OperatorSelection, OperatorStatus, RadioState, RegistrationUnsolMode, Technology,
    ModemFeature, OPERATOR_HOME_INDEX, OPERATOR_ROAMING_INDEX,
};
use crate::parse::{parse_decimal, parse_params};
use crate::pdp::{PdpType, MAX_APN_LENGTH, MAX_DATA_CONTEXTS};
use crate::supplementary::{
    CallBarringProgram, CallForward, CallForwardMode, CallForwardReason, ServiceType,
    MAX_CLASSX_OFFSET,
};
use crate::util::ModemFromPrimitive;
use crate::ModemState;

pub(crate) type CmdHandler = fn(&mut ModemState, &str);

/// The dispatch table. Matching is first-hit and linear; the order is part
/// of the contract (prefix rows must precede rows they would shadow).
pub(crate) static DISPATCH: &[(Matcher, Action)] = &[
    /* issued when the host radio comes up */
    (Matcher::Exact("%CPHS=1"), Action::Default),
    (Matcher::Exact("%CTZV=1"), Action::Default),

    /* issued once the SIM is ready */
    (Matcher::Exact("+CSMS=1"), Action::Reply("+CSMS: 1, 1, 1")),
    (Matcher::Exact("+CNMI=1,2,2,1,1"), Action::Default),

    /* radio power */
    (Matcher::Exact("+CFUN=0"), Action::Handler(handle_radio_power)),
    (Matcher::Exact("+CFUN=1"), Action::Handler(handle_radio_power)),

    /* technology and preferred mode */
    (Matcher::Exact("+CTEC=?"), Action::Reply("+CTEC: 0,1,2,3")),
    (Matcher::Prefix("+CTEC"), Action::Handler(handle_tech)),

    /* CDMA roam preference */
    (Matcher::Exact("+WRMP=?"), Action::Reply("+WRMP: 0,1,2")),
    (Matcher::Prefix("+WRMP"), Action::Handler(handle_roam_pref)),

    /* CDMA subscription source */
    (Matcher::Exact("+CCSS=?"), Action::Reply("+CTEC: 0,1")),
    (Matcher::Prefix("+CCSS"), Action::Handler(handle_subscription_source)),

    /* emergency callback mode */
    (Matcher::Exact("+WSOS=?"), Action::Reply("+WSOS: 0")),
    (Matcher::Prefix("+WSOS="), Action::Handler(handle_emergency_mode)),

    /* PRL version */
    (Matcher::Exact("+WPRL?"), Action::Handler(handle_prl_version)),

    /* PDP context activation states */
    (Matcher::Exact("+CGACT?"), Action::Handler(handle_list_pdp_contexts)),

    /* the composite operator query the host RIL issues */
    (Matcher::Exact("+COPS=3,0;+COPS?;+COPS=3,1;+COPS?;+COPS=3,2;+COPS?"),
     Action::Handler(handle_request_operator)),

    /* operator selection */
    (Matcher::Prefix("+COPS"), Action::Handler(handle_operator_selection)),

    /* current calls */
    (Matcher::Exact("+CLCC"), Action::Handler(handle_list_current_calls)),

    /* write SMS to SIM */
    (Matcher::Prefix("+CMGW="), Action::Handler(handle_send_sms_to_sim)),

    /* hangup and supplementary call control */
    (Matcher::Prefix("+CHLD="), Action::Handler(handle_hangup)),

    /* signal strength */
    (Matcher::Exact("+CSQ"), Action::Handler(handle_signal_strength)),

    /* registration states */
    (Matcher::Prefix("+CREG"), Action::Handler(handle_network_registration)),
    (Matcher::Prefix("+CGREG"), Action::Handler(handle_network_registration)),

    /* SMS submission */
    (Matcher::Prefix("+CMGS="), Action::Handler(handle_send_sms)),

    /* legacy data-setup incantations */
    (Matcher::Exact("%CPRIM=\"GMM\",\"CONFIG MULTISLOT_CLASS=<10>\""), Action::Default),
    (Matcher::Exact("%DATA=2,\"UART\",1,,\"SER\",\"UART\",0"), Action::Default),

    /* PDP contexts */
    (Matcher::Prefix("+CGDCONT="), Action::Handler(handle_define_pdp_context)),
    (Matcher::Exact("+CGDCONT?"), Action::Handler(handle_query_pdp_context)),
    (Matcher::Exact("+CGCONTRDP=?"), Action::Handler(handle_query_pdp_dynamic)),
    (Matcher::Prefix("+CGCONTRDP"), Action::Handler(handle_list_pdp_dynamic)),
    (Matcher::Prefix("+CGQREQ="), Action::Default),
    (Matcher::Prefix("+CGQMIN="), Action::Default),
    (Matcher::Exact("+CGEREP=1,0"), Action::Default),
    (Matcher::Prefix("+CGACT="), Action::Handler(handle_activate_pdp_context)),
    (Matcher::Prefix("D*99***"), Action::Handler(handle_start_pdp_context)),

    /* dial; success/error is ignored by the host, which polls +CLCC */
    (Matcher::Prefix("D"), Action::Handler(handle_dial)),

    /* SMS acknowledge */
    (Matcher::Exact("+CNMA=1"), Action::Default),
    (Matcher::Exact("+CNMA=2"), Action::Default),

    /* restricted SIM access */
    (Matcher::Prefix("+CRSM="), Action::Handler(handle_sim_io)),

    (Matcher::Exact("+CHLD=0"), Action::Handler(handle_hangup)),
    (Matcher::Exact("+CHLD=1"), Action::Handler(handle_hangup)),
    (Matcher::Exact("+CHLD=2"), Action::Handler(handle_hangup)),
    (Matcher::Exact("+CHLD=3"), Action::Handler(handle_hangup)),
    (Matcher::Exact("A"), Action::Handler(handle_answer)),
    (Matcher::Exact("H"), Action::Handler(handle_answer)),
    (Matcher::Prefix("+EVTS="), Action::Handler(handle_set_dial_tone)),
    (Matcher::Exact("+CIMI"), Action::Reply("310260000000000")),
    (Matcher::Exact("+CGSN"), Action::Reply("000000000000000")),
    (Matcher::Exact("+CUSD=2"), Action::Default),
    (Matcher::Exact("+COPS=0"), Action::Handler(handle_operator_selection)),
    (Matcher::Prefix("+CMGD="), Action::Handler(handle_delete_sms_on_sim)),
    (Matcher::Prefix("+CPIN="), Action::Handler(handle_change_or_enter_pin)),
    (Matcher::Prefix("+CPINR="), Action::Handler(handle_get_remaining_retries)),
    (Matcher::Exact("+CEER"), Action::Handler(handle_last_call_fail_cause)),
    (Matcher::Prefix("+CCFC"), Action::Handler(handle_call_forward_req)),
    (Matcher::Prefix("+CLCK"), Action::Handler(handle_facility_lock_req)),
    (Matcher::Prefix("+CPWD"), Action::Handler(handle_change_password)),

    /* SIM status */
    (Matcher::Exact("+CPIN?"), Action::Handler(handle_sim_status_req)),
    (Matcher::Exact("+CNMI?"), Action::Reply("+CNMI: 1,2,2,1,1")),

    /* radio power query */
    (Matcher::Exact("+CFUN?"), Action::Handler(handle_radio_power_req)),

    /* host initialization sequence */
    (Matcher::Exact("E0Q0V1"), Action::Default),
    (Matcher::Exact("S0=0"), Action::Default),
    (Matcher::Exact("+CMEE=1"), Action::Default),
    (Matcher::Exact("+CCWA=1"), Action::Default),
    (Matcher::Exact("+CMOD=0"), Action::Default),
    (Matcher::Exact("+CMUT=0"), Action::Default),
    (Matcher::Exact("+CSSN=0,1"), Action::Default),
    (Matcher::Exact("+COLP=0"), Action::Default),
    (Matcher::Exact("+CSCS=\"HEX\""), Action::Default),
    (Matcher::Exact("+CUSD=1"), Action::Default),
    (Matcher::Exact("+CGEREP=1,0"), Action::Default),
    /* a good time to push the current time and timezone */
    (Matcher::Exact("+CMGF=0"), Action::Handler(handle_end_of_init)),
    (Matcher::Exact("%CPI=3"), Action::Default),
    (Matcher::Exact("%CSTAT=1"), Action::Default),

    (Matcher::Prefix("+CSCA"), Action::Handler(handle_smsc_address)),

    /* SIM application toolkit */
    (Matcher::Prefix("+CUSATT="), Action::Handler(handle_stk_terminal_response)),
    (Matcher::Prefix("+CUSATE="), Action::Handler(handle_stk_envelope_command)),
];

/// Routes a command (already stripped of `AT`) through the table.
pub(crate) fn route(st: &mut ModemState, cmd: &str) {
    for &(ref matcher, ref action) in DISPATCH {
        if !matcher.matches(cmd) {
            continue;
        }
        match *action {
            Action::Reply(text) => st.reply(text),
            Action::Default => st.reply("OK"),
            Action::Handler(handler) => handler(st, cmd),
        }
        return;
    }
    debug!("** UNSUPPORTED COMMAND '{}' **", cmd);
    st.reply("ERROR: UNSUPPORTED");
}

fn handle_radio_power(st: &mut ModemState, cmd: &str) {
    let radio_state = match cmd {
        "+CFUN=0" => RadioState::Off,
        "+CFUN=1" => RadioState::On,
        _ => {
            st.reply_cme(CmeError::IncorrectParameters);
            return;
        }
    };
    st.reply("OK");
    st.set_radio_state_update(radio_state);
}

fn handle_radio_power_req(st: &mut ModemState, _cmd: &str) {
    if st.radio_state != RadioState::Off {
        st.reply("+CFUN: 1");
    }
    else {
        st.reply("+CFUN: 0");
    }
}

fn parse_preferred_hex(s: &str) -> Option<i32> {
    let s = if s.starts_with('"') { &s[1..] } else { s };
    if s.is_empty() {
        return None;
    }
    let end = s.find('"').unwrap_or(s.len());
    if !s[end..].chars().all(|c| c == '"') {
        return None;
    }
    i32::from_str_radix(&s[..end], 16).ok()
}

fn handle_tech(st: &mut ModemState, cmd: &str) {
    let tail = &cmd[5..];
    debug!("handle_tech: {}", cmd);
    if tail == "?" {
        let line = format!("+CTEC: {},{:x}", st.technology as i32, st.preferred_mask);
        st.reply(&line);
        return;
    }
    if tail == "=?" {
        st.reply("+CTEC: 0,1,2,3");
        return;
    }
    if tail.starts_with('=') {
        let rest = tail[1..].as_bytes();
        if let Some(&digit) = rest.get(0) {
            if digit >= b'0' && digit <= b'3' {
                let newtech = match Technology::from_integer((digit - b'0') as i64) {
                    Ok(t) => t,
                    Err(_) => Technology::Unknown,
                };
                let after = &tail[2..];
                let mut preferred = st.preferred_mask;
                if after.starts_with(',') {
                    match parse_preferred_hex(&after[1..]) {
                        Some(p) => preferred = p,
                        None => {
                            st.reply("ERROR: invalid preferred mode");
                            return;
                        }
                    }
                }
                let current = st.technology;
                match st.switch_technology(newtech, preferred) {
                    Err(()) => st.reply("ERROR: unable to set preferred mode"),
                    Ok(tech) if tech != current => {
                        st.reply(&format!("+CTEC: {}", tech as i32))
                    }
                    Ok(_) => st.reply("+CTEC: DONE"),
                }
                return;
            }
        }
    }
    st.reply(&format!("ERROR: {}: Unknown Technology", tail));
}

fn handle_roam_pref(st: &mut ModemState, cmd: &str) {
    let tail = &cmd[5..];
    debug!("handle_roam_pref: {}", cmd);
    if tail == "?" {
        st.reply(&format!("+WRMP: {}", st.roaming_pref));
        return;
    }
    if tail == "=?" {
        st.reply("+WRMP: 0,1,2");
        return;
    }
    if tail.starts_with('=') {
        if let Some(pref) = parse_decimal(&tail[1..]) {
            st.roaming_pref = pref as i32;
            st.nvram.set(crate::nvram::NV_CDMA_ROAMING_PREF, &tail[1..]);
            st.reply("OK");
            return;
        }
    }
    st.reply("ERROR");
}

fn handle_subscription_source(st: &mut ModemState, cmd: &str) {
    let tail = &cmd[5..];
    debug!("handle_subscription_source: {}", cmd);
    if tail == "?" {
        st.reply(&format!("+CCSS: {}", st.subscription_source as i32));
        return;
    }
    if tail == "=0" || tail == "=1" {
        use crate::network::CdmaSubscriptionSource;
        let source = match tail {
            "=0" => CdmaSubscriptionSource::RuimSim,
            _ => CdmaSubscriptionSource::Nv,
        };
        st.set_cdma_subscription_source_quiet(source);
        st.reply(&format!("+CCSS: {}", st.subscription_source as i32));
        return;
    }
    st.reply("ERROR: Invalid subscription source");
}

fn handle_emergency_mode(st: &mut ModemState, cmd: &str) {
    let tail = &cmd[5..];
    if tail == "?" {
        st.reply(&format!("+WSOS: {}", st.in_emergency_mode as i32));
        return;
    }
    if tail.starts_with('=') {
        let rest = &tail[1..];
        if rest == "?" {
            st.reply("+WSOS: (0)");
            return;
        }
        if let Some(value) = parse_decimal(rest) {
            let arg = value != 0;
            if arg != st.in_emergency_mode {
                st.in_emergency_mode = arg;
                st.nvram
                    .set(crate::nvram::NV_IN_ECBM, if arg { "1" } else { "0" });
                st.reply(&format!("+WSOS: {}", arg as i32));
                return;
            }
        }
    }
    st.reply("ERROR");
}

fn handle_prl_version(st: &mut ModemState, cmd: &str) {
    if cmd.ends_with('?') {
        st.reply(&format!("+WPRL: {}", st.prl_version));
        return;
    }
    st.reply("ERROR");
}

fn handle_list_pdp_contexts(st: &mut ModemState, _cmd: &str) {
    let mut body = String::new();
    for context in &st.contexts {
        /* the read command returns the activation states for all the
         * defined PDP contexts */
        if !context.is_defined() {
            continue;
        }
        body.push_str(&format!("+CGACT: {},{}\r\n", context.id, context.active as i32));
    }
    st.reply(&body);
}

fn handle_request_operator(st: &mut ModemState, _cmd: &str) {
    if !st.has_network() {
        st.reply_cme(CmeError::NoNetwork);
        return;
    }
    st.oper_name_index = 2;
    let oper = &st.operators[st.oper_index as usize];
    let body = format!(
        "+COPS: 0,0,\"{}\"\r+COPS: 0,1,\"{}\"\r+COPS: 0,2,\"{}\"",
        oper.names[0], oper.names[1], oper.names[2]
    );
    st.reply(&body);
}

fn handle_operator_selection(st: &mut ModemState, cmd: &str) {
    let tail = &cmd[5..];
    if tail == "?" {
        /* ask for the current operator */
        if !st.has_network() {
            st.reply_cme(CmeError::NoNetwork);
            return;
        }
        let mode = st.oper_selection_mode as i32;
        let name_index = st.oper_name_index;
        let oper = &st.operators[st.oper_index as usize];
        let body = if name_index == 2 {
            format!("+COPS: {},2,{}", mode, oper.names[2])
        }
        else {
            format!("+COPS: {},{},\"{}\"", mode, name_index, oper.names[name_index])
        };
        st.reply(&body);
        return;
    }
    if tail == "=?" {
        /* ask for all available operators */
        let mut body = String::new();
        let mut comma = "+COPS: ";
        for oper in &st.operators[..st.oper_count] {
            body.push_str(&format!(
                "{}({},\"{}\",\"{}\",\"{}\")",
                comma, oper.status as i32, oper.names[0], oper.names[1], oper.names[2]
            ));
            comma = ", ";
        }
        st.reply(&body);
        return;
    }
    if tail.starts_with('=') {
        let rest = tail[1..].as_bytes();
        match rest.get(0) {
            Some(&b'0') => {
                st.oper_selection_mode = OperatorSelection::Automatic;
                st.set_voice_registration_inner(crate::network::RegistrationState::Home);
                st.reply("OK");
                return;
            }
            Some(&b'1') => {
                if rest.get(1) != Some(&b',') {
                    bad_cops_command(st, tail);
                    return;
                }
                let args = match parse_params(&tail[3..]) {
                    Ok(args) => args.into_args(),
                    Err(_) => vec![],
                };
                let format = args.get(0).and_then(|v| v.get_integer().ok()).cloned();
                let name = args.get(1).and_then(|v| v.text().ok());
                let (format, name) = match (format, name) {
                    (Some(f), Some(ref n)) if f <= 2 && !n.is_empty() => (f as usize, n.clone()),
                    _ => {
                        bad_cops_command(st, tail);
                        return;
                    }
                };
                let mut found = None;
                for (nn, oper) in st.operators[..st.oper_count].iter().enumerate() {
                    if oper.names[format] == name {
                        found = Some(nn as i32);
                        break;
                    }
                }
                let found = match found {
                    None => {
                        /* selection failed */
                        st.reply_cme(CmeError::SelectionFailed);
                        return;
                    }
                    Some(nn) if st.operators[nn as usize].status == OperatorStatus::Denied => {
                        /* network not allowed */
                        st.reply_cme(CmeError::NetworkNotAllowed);
                        return;
                    }
                    Some(nn) => nn,
                };
                st.oper_selection_mode = OperatorSelection::Manual;
                st.oper_index = found;

                /* move the voice and data registration states to home or
                 * roaming depending on the selected index */
                if found == OPERATOR_HOME_INDEX {
                    st.data_state = crate::network::RegistrationState::Home;
                    st.set_voice_registration_inner(crate::network::RegistrationState::Home);
                }
                else if found == OPERATOR_ROAMING_INDEX {
                    st.data_state = crate::network::RegistrationState::Roaming;
                    st.set_voice_registration_inner(crate::network::RegistrationState::Roaming);
                }
                st.reply("OK");
                return;
            }
            Some(&b'2') => {
                st.oper_selection_mode = OperatorSelection::Deregistration;
                st.reply("OK");
                return;
            }
            Some(&b'3') => {
                if rest.get(1) != Some(&b',') {
                    bad_cops_command(st, tail);
                    return;
                }
                match rest.get(2) {
                    Some(f) if *f >= b'0' && *f <= b'2' => {
                        st.oper_name_index = (f - b'0') as usize;
                        st.reply("OK");
                        return;
                    }
                    _ => {
                        bad_cops_command(st, tail);
                        return;
                    }
                }
            }
            _ => {}
        }
    }
    bad_cops_command(st, tail);
}

fn bad_cops_command(st: &ModemState, tail: &str) {
    debug!(">>> unknown operator command '{}'", tail);
    st.reply("ERROR: unknown command\r");
}

fn handle_list_current_calls(st: &mut ModemState, _cmd: &str) {
    let mut body = String::new();
    for vcall in &st.calls {
        let call = &vcall.call;
        if call.mode != CallMode::Voice {
            continue;
        }
        /* +CLCC: <id>,<dir>,<stat>,<mode>,<mpty>,<number>,<type>,<alpha>,<priority>,<CLI validity>
         * priority 2 per TS 22.067 table 1 */
        let number = if call.number_presentation == 0 { &call.number[..] } else { "" };
        body.push_str(&format!(
            "+CLCC: {},{},{},{},{},\"{}\",{},\"\",2,{}\r\n",
            call.id,
            call.dir as i32,
            call.state as i32,
            call.mode as i32,
            call.multi as i32,
            number,
            129,
            call.number_presentation
        ));
    }
    st.reply(&body);
}

fn handle_last_call_fail_cause(st: &mut ModemState, _cmd: &str) {
    st.reply(&format!("+CEER: {}\n", st.last_call_fail_cause));
}

fn handle_send_sms(st: &mut ModemState, _cmd: &str) {
    st.wait_sms = true;
    st.reply("> ");
}

fn handle_send_sms_to_sim(st: &mut ModemState, _cmd: &str) {
    st.reply("ERROR: unimplemented");
}

fn handle_delete_sms_on_sim(st: &mut ModemState, _cmd: &str) {
    st.reply("OK");
}

fn handle_sim_io(st: &mut ModemState, cmd: &str) {
    let answer = st.sim.io(cmd);
    st.reply(&answer);
}

fn handle_sim_status_req(st: &mut ModemState, _cmd: &str) {
    use crate::sim::SimStatus;
    let answer = match st.sim.status() {
        SimStatus::Absent => "+CPIN: ABSENT",
        SimStatus::Ready => "+CPIN: READY",
        SimStatus::NotReady => "+CMERROR: NOT READY",
        SimStatus::Pin => "+CPIN: SIM PIN",
        SimStatus::Puk => "+CPIN: SIM PUK",
        SimStatus::NetworkPersonalization => "+CPIN: PH-NET PIN",
    };
    st.reply(answer);
}

fn handle_change_or_enter_pin(st: &mut ModemState, cmd: &str) {
    use crate::sim::SimStatus;
    let tail = &cmd[6..];
    match st.sim.status() {
        SimStatus::Absent => {
            st.reply("+CME ERROR: SIM ABSENT");
        }
        SimStatus::NotReady => {
            st.reply("+CME ERROR: SIM NOT READY");
        }
        SimStatus::Ready => {
            /* this may be a request to change the PIN */
            let b = tail.as_bytes();
            if tail.len() == 9 && b[4] == b',' {
                let (old_pin, new_pin) = (&tail[..4], &tail[5..9]);
                if !st.sim.check_pin(old_pin) {
                    st.reply("+CME ERROR: BAD PIN");
                    return;
                }
                st.sim.set_pin(new_pin);
                st.reply("+CPIN: READY");
                return;
            }
            st.reply("+CME ERROR: BAD FORMAT");
        }
        SimStatus::Pin => {
            /* waiting for the PIN, possibly quoted */
            let pin = tail.trim_matches('"');
            if st.sim.check_pin(pin) {
                st.reply("+CPIN: READY");
            }
            else {
                st.reply("+CME ERROR: BAD PIN");
            }
        }
        SimStatus::Puk => {
            let b = tail.as_bytes();
            if tail.len() == 13 && b[8] == b',' {
                let (puk, pin) = (&tail[..8], &tail[9..13]);
                if st.sim.check_puk(puk, pin) {
                    st.reply("+CPIN: READY");
                    return;
                }
            }
            st.reply("+CME ERROR: BAD PUK");
        }
        SimStatus::NetworkPersonalization => {
            st.reply("+CPIN: PH-NET PIN");
        }
    }
}

fn handle_get_remaining_retries(st: &mut ModemState, cmd: &str) {
    use crate::sim::{SIM_PIN_RETRIES, SIM_PUK_RETRIES};
    let tail = &cmd[7..];
    let body = if tail == "SIM PIN" {
        format!("+CPINR: SIM PIN,{},{}\r\n", st.sim.pin_retries(), SIM_PIN_RETRIES)
    }
    else if tail == "SIM PUK" {
        format!("+CPINR: SIM PUK,{},{}\r\n", st.sim.puk_retries(), SIM_PUK_RETRIES)
    }
    else {
        "+CME ERROR: 50\r\n".to_owned()
    };
    st.reply(&body);
}

fn handle_network_registration(st: &mut ModemState, cmd: &str) {
    if cmd.starts_with("+CREG") {
        let tail = &cmd[5..];
        if tail == "?" {
            let body = if st.voice_mode == RegistrationUnsolMode::EnabledFull {
                format!("+CREG: {},{}, \"{:04x}\", \"{:07x}\"",
                        st.voice_mode as i32, st.voice_state as i32,
                        st.area_code & 0xffff, st.cell_id & 0xfffffff)
            }
            else {
                format!("+CREG: {},{}", st.voice_mode as i32, st.voice_state as i32)
            };
            st.reply(&body);
            return;
        }
        else if tail.starts_with('=') {
            match tail[1..].as_bytes().get(0) {
                Some(&b'0') => st.voice_mode = RegistrationUnsolMode::Disabled,
                Some(&b'1') => st.voice_mode = RegistrationUnsolMode::Enabled,
                Some(&b'2') => st.voice_mode = RegistrationUnsolMode::EnabledFull,
                Some(&b'?') => {
                    st.reply("+CREG: (0-2)");
                    return;
                }
                _ => {
                    st.reply("ERROR: BAD COMMAND");
                    return;
                }
            }
        }
    }
    else if cmd.starts_with("+CGREG") {
        let tail = &cmd[6..];
        if tail == "?" {
            let body = if st.supports_network_data_type {
                format!("+CGREG: {},{},\"{:04x}\",\"{:07x}\",\"{:04x}\"",
                        st.data_mode as i32, st.data_state as i32,
                        st.area_code & 0xffff, st.cell_id & 0xfffffff,
                        st.data_network as i32)
            }
            else {
                format!("+CGREG: {},{},\"{:04x}\",\"{:07x}\"",
                        st.data_mode as i32, st.data_state as i32,
                        st.area_code & 0xffff, st.cell_id & 0xfffffff)
            };
            st.reply(&body);
            return;
        }
        else if tail.starts_with('=') {
            match tail[1..].as_bytes().get(0) {
                Some(&b'0') => st.data_mode = RegistrationUnsolMode::Disabled,
                Some(&b'1') => st.data_mode = RegistrationUnsolMode::Enabled,
                Some(&b'2') => st.data_mode = RegistrationUnsolMode::EnabledFull,
                Some(&b'?') => {
                    st.reply("+CGREG: (0-2)");
                    return;
                }
                _ => {
                    st.reply("ERROR: BAD COMMAND");
                    return;
                }
            }
        }
    }
    st.reply("OK");
}

fn handle_set_dial_tone(st: &mut ModemState, cmd: &str) {
    let tail = cmd[6..].as_bytes();
    let tone = match tail.get(0) {
        Some(&t) => t as char,
        None => {
            st.reply("ERROR: No active call");
            return;
        }
    };
    // `<tone>,0` stops DTMF
    if tail.get(2) == Some(&b'0') {
        st.reply("OK");
        return;
    }
    let any_active = st
        .calls
        .iter()
        .any(|c| c.call.state == CallState::Active);
    if any_active {
        st.last_dialed_tone = Some(tone);
        st.reply("OK");
    }
    else {
        st.reply("ERROR: No active call");
    }
}

fn handle_signal_strength(st: &mut ModemState, _cmd: &str) {
    let body = st.signal_strength_line();
    st.reply(&body);
}

fn handle_end_of_init(st: &mut ModemState, _cmd: &str) {
    let body = st.time_update_line();
    st.reply(&body);
}

fn handle_define_pdp_context(st: &mut ModemState, cmd: &str) {
    let tail = &cmd[9..];
    if tail == "?" {
        /* only IP contexts are supported; don't pretend PPP works */
        let body = format!("+CGDCONT: (1-{}),\"IP\",,,(0-2),(0-4)", MAX_DATA_CONTEXTS);
        st.reply(&body);
        return;
    }

    /* +CGDCONT=[<cid>[,<PDP_type>[,<APN>[,<PDP_addr>[...]]]]] */
    let args = match parse_params(tail) {
        Ok(args) => args.into_args(),
        Err(_) => {
            st.reply("ERROR: BAD COMMAND");
            return;
        }
    };
    let cid = match args.get(0).and_then(|v| v.get_integer().ok()) {
        Some(&cid) if cid >= 1 && cid <= MAX_DATA_CONTEXTS as u32 => cid as i32,
        _ => {
            st.reply("ERROR: BAD COMMAND");
            return;
        }
    };
    let index = (cid - 1) as usize;
    if st.contexts[index].active {
        /* data connection in use */
        st.reply_cme(CmeError::NotAllowed);
        return;
    }
    if args.len() == 1 {
        /* no additional parameters: undefine the specified context */
        st.contexts[index].id = -1;
        st.reply("OK");
        return;
    }

    match args.get(1).and_then(|v| v.get_string().ok()).map(|s| s.as_str()) {
        Some("IP") => {}
        _ => {
            st.reply("ERROR: BAD COMMAND");
            return;
        }
    }
    let apn = match args.get(2).and_then(|v| v.get_string().ok()) {
        Some(apn) if !apn.is_empty() && apn.len() <= MAX_APN_LENGTH => apn.clone(),
        _ => {
            st.reply("ERROR: BAD COMMAND");
            return;
        }
    };
    // an unparseable address leaves the context defined without one
    let addr = args
        .get(3)
        .and_then(|v| v.get_string().ok())
        .and_then(|s| s.parse().ok());

    {
        let context = &mut st.contexts[index];
        context.id = cid;
        context.active = false;
        context.ptype = PdpType::Ip;
        context.apn = apn;
        context.addr = addr;
    }
    st.reply("OK");
}

fn handle_query_pdp_context(st: &mut ModemState, _cmd: &str) {
    let mut body = String::new();
    for context in &st.contexts {
        if !context.is_defined() {
            continue;
        }
        let addr = match context.addr {
            Some(a) => a.to_string(),
            None => String::new(),
        };
        body.push_str(&format!(
            "+CGDCONT: {},\"{}\",\"{}\",\"{}\",0,0\r\n",
            context.id,
            context.ptype.name(),
            context.apn,
            addr
        ));
    }
    st.reply(&body);
}

fn handle_query_pdp_dynamic(st: &mut ModemState, _cmd: &str) {
    let mut body = String::from("+CGCONTRDP: (");
    let mut entries = 0;
    for context in &st.contexts {
        if !context.active {
            continue;
        }
        entries += 1;
        if entries == 1 {
            body.push_str(&context.id.to_string());
        }
        else {
            body.push_str(&format!(",{}", context.id));
        }
    }
    body.push(')');
    st.reply(&body);
}

fn handle_list_pdp_dynamic(st: &mut ModemState, cmd: &str) {
    let tail = &cmd[10..];
    let cid = if tail.is_empty() {
        -1 // list all
    }
    else {
        match tail.strip_prefix('=').and_then(parse_decimal) {
            Some(cid) if cid > 0 => cid as i32,
            _ => {
                st.reply_cme(CmeError::IncorrectParameters);
                return;
            }
        }
    };

    let mut body = String::new();
    let mut entries = 0;
    for index in 0..st.contexts.len() {
        /* report all active non-secondary contexts, or just the one asked */
        if !st.contexts[index].active {
            continue;
        }
        if cid > 0 && st.contexts[index].id != cid {
            continue;
        }
        let owner = (st.base_port, st.instance_id, st.contexts[index].id);
        let info = match st.hub.link_info(owner) {
            Some(info) => info,
            None => continue,
        };
        entries += 1;

        /* report the kernel netif number as the bearer id */
        let bearer_id = info.name.trim_start_matches("rmnet.");
        body.push_str(&format!(
            "+CGCONTRDP: {},{},\"{}\"",
            st.contexts[index].id, bearer_id, st.contexts[index].apn
        ));
        body.push_str(&format!(",\"{}/24\"", info.addr));
        body.push_str(&format!(",\"{}\"", info.gw));
        for dns in info.dns.iter() {
            match dns {
                Some(addr) => body.push_str(&format!(",\"{}\"", addr)),
                None => break,
            }
        }
        body.push_str("\r\n");
    }

    if cid > 0 && entries == 0 {
        st.reply_cme(CmeError::IncorrectParameters);
        return;
    }
    if entries > 0 {
        // drop the trailing "\r\n"
        body.truncate(body.len() - 2);
    }
    st.reply(&body);
}

fn handle_activate_pdp_context(st: &mut ModemState, cmd: &str) {
    let tail = &cmd[7..];
    if tail == "?" {
        // the list of supported <state>s
        st.reply("+CGACT: (0-1)\r\n");
        return;
    }
    let args = match parse_params(tail) {
        Ok(args) => args.into_args(),
        Err(_) => {
            st.reply_cme(CmeError::ActivationRejected);
            return;
        }
    };
    let enable = args.get(0).and_then(|v| v.get_integer().ok()).cloned();
    let cid = args.get(1).and_then(|v| v.get_integer().ok()).cloned();
    let (enable, cid) = match (enable, cid) {
        (Some(e), Some(c)) if e <= 1 => (e == 1, c as i32),
        _ => {
            st.reply_cme(CmeError::ActivationRejected);
            return;
        }
    };
    match st.activate_data_call(cid, enable) {
        Ok(()) => st.reply("OK"),
        Err(code) => st.reply_cme(code),
    }
}

fn handle_start_pdp_context(st: &mut ModemState, cmd: &str) {
    /* D*99***<cid># - <cid> as defined by +CGDCONT */
    let cid = cmd[7..]
        .bytes()
        .next()
        .map(|b| b as i32 - '0' as i32)
        .unwrap_or(-1);
    match st.activate_data_call(cid, true) {
        Ok(()) => st.reply("OK"),
        Err(code) => st.reply_cme(code),
    }
}

fn handle_dial(st: &mut ModemState, cmd: &str) {
    let index = match st.add_outbound_call_inner(&cmd[1..]) {
        Some(index) => index,
        None => {
            st.reply("ERROR: TOO MANY CALLS");
            return;
        }
    };
    let number = st.calls[index].call.number.clone();
    if st.is_emergency(&number) {
        st.in_emergency_mode = true;
        st.reply("+WSOS: 1");
    }
    else {
        st.reply("");
    }
}

fn handle_answer(st: &mut ModemState, cmd: &str) {
    if cmd == "A" {
        for nn in 0..st.calls.len() {
            match st.calls[nn].call.state {
                CallState::Incoming => st.set_call_state(nn, CallState::Active),
                CallState::Active => st.set_call_state(nn, CallState::Held),
                _ => {}
            }
        }
        st.reply("OK");
        st.send_calls_update();
    }
    else {
        /* ATH: hangup, since the user is busy */
        for nn in 0..st.calls.len() {
            if st.calls[nn].call.state == CallState::Incoming {
                st.free_call(nn, CallFailCause::Normal);
                break;
            }
        }
        st.reply("OK");
    }
}

fn handle_hangup(st: &mut ModemState, cmd: &str) {
    if !cmd.starts_with("+CHLD=") {
        st.reply("ERROR: BAD COMMAND");
        return;
    }
    let tail = cmd[6..].as_bytes();
    match tail.get(0) {
        Some(&b'0') => {
            /* release all held, waiting and incoming calls */
            let mut nn = 0;
            while nn < st.calls.len() {
                let call = st.calls[nn].call.clone();
                if call.mode == CallMode::Voice
                    && (call.state == CallState::Held
                        || call.state == CallState::Waiting
                        || call.state == CallState::Incoming)
                {
                    st.free_call(nn, CallFailCause::Normal);
                }
                else {
                    nn += 1;
                }
            }
        }
        Some(&b'1') => {
            if tail.len() == 1 {
                /* release all active, accept the held or waiting one */
                let waiting_call_only = st.has_waiting_call();
                let mut nn = 0;
                while nn < st.calls.len() {
                    let call = st.calls[nn].call.clone();
                    if call.mode != CallMode::Voice {
                        nn += 1;
                        continue;
                    }
                    if call.state == CallState::Active {
                        st.free_call(nn, CallFailCause::Normal);
                        continue;
                    }
                    if (call.state == CallState::Held && !waiting_call_only)
                        || call.state == CallState::Waiting
                    {
                        st.set_call_state(nn, CallState::Active);
                    }
                    nn += 1;
                }
            }
            else {
                /* release a specific call */
                let id = tail[1].wrapping_sub(b'0') as u32;
                if let Some(index) = st.find_call(id) {
                    st.free_call(index, CallFailCause::Normal);
                }
            }
        }
        Some(&b'2') => {
            if !st.has_feature(ModemFeature::Hold) {
                st.reply("ERROR: UNSUPPORTED");
                return;
            }
            if tail.len() == 1 {
                /* place all active on hold, accept the held or waiting one */
                let waiting_call_only = st.has_waiting_call();
                for nn in 0..st.calls.len() {
                    let call = st.calls[nn].call.clone();
                    if call.mode != CallMode::Voice {
                        continue;
                    }
                    if call.state == CallState::Active {
                        st.set_call_state(nn, CallState::Held);
                    }
                    else if (call.state == CallState::Held && !waiting_call_only)
                        || call.state == CallState::Waiting
                    {
                        st.set_call_state(nn, CallState::Active);
                    }
                }
            }
            else {
                /* place all active on hold, except a specific one */
                let id = tail[1].wrapping_sub(b'0') as u32;
                for nn in 0..st.calls.len() {
                    let call = &st.calls[nn].call;
                    if call.mode != CallMode::Voice {
                        continue;
                    }
                    if call.id == id {
                        if call.state != CallState::Active {
                            st.reply_cme(CmeError::NotAllowed);
                            return;
                        }
                    }
                    else if call.state == CallState::Held {
                        st.reply_cme(CmeError::NotAllowed);
                        return;
                    }
                }
                // checked, now proceed to set states
                for nn in 0..st.calls.len() {
                    let call = st.calls[nn].call.clone();
                    if call.mode != CallMode::Voice {
                        continue;
                    }
                    if call.id == id {
                        st.unset_call_multi(nn);
                    }
                    else if call.state == CallState::Active {
                        st.set_call_state(nn, CallState::Held);
                    }
                }
            }
        }
        Some(&b'3') => {
            /* join a single active call and a single held call together, or
             * a held call and an active MPTY, or an active call and a held
             * MPTY; see 3GPP TS 22.084, clauses 1.3.8.1 and 1.3.8.4 */
            if st.calls.len() < 2 {
                st.reply_cme(CmeError::NotAllowed);
                return;
            }
            if st.multi_count >= 5 {
                /* in GSM, a multiparty holds at most 5 calls;
                 * see 3GPP TS 22.084, clause 1.2.1 */
                st.reply_cme(CmeError::NotAllowed);
                return;
            }
            let mut has_held = false;
            let mut first_active = None;
            for vcall in &st.calls {
                let call = &vcall.call;
                if call.mode != CallMode::Voice {
                    continue;
                }
                if call.state == CallState::Held {
                    has_held = true;
                }
                else if call.state == CallState::Active && first_active.is_none() {
                    first_active = Some(call.id);
                }
            }
            let first_active = match (has_held, first_active) {
                (true, Some(id)) => id,
                _ => {
                    st.reply_cme(CmeError::NotAllowed);
                    return;
                }
            };
            // checked, now proceed to set states
            for nn in 0..st.calls.len() {
                let call = st.calls[nn].call.clone();
                if call.mode != CallMode::Voice {
                    continue;
                }
                if call.state == CallState::Held {
                    st.set_call_multi(nn);
                    st.set_call_state(nn, CallState::Active);
                }
                else if call.state == CallState::Active && call.id == first_active {
                    st.set_call_multi(nn);
                }
            }
        }
        Some(&b'4') => {
            /* explicit transfer: connect the two calls */
            for nn in 0..st.calls.len() {
                let call = st.calls[nn].call.clone();
                if call.mode != CallMode::Voice {
                    continue;
                }
                if call.state == CallState::Held {
                    st.set_call_state(nn, CallState::Active);
                    break;
                }
            }
        }
        _ => {}
    }
    st.send_calls_update();
    st.reply("OK");
}

fn handle_call_forward_req(st: &mut ModemState, cmd: &str) {
    if !cmd.starts_with("+CCFC=") {
        st.reply_cme(CmeError::IncorrectParameters);
        return;
    }
    let args = match parse_params(&cmd[6..]) {
        Ok(args) => args.into_args(),
        Err(_) => {
            st.reply_cme(CmeError::IncorrectParameters);
            return;
        }
    };
    let reason = args.get(0).and_then(|v| v.get_integer().ok()).cloned();
    let mode = args.get(1).and_then(|v| v.get_integer().ok()).cloned();
    let (reason, mode) = match (reason, mode) {
        (Some(r), Some(m)) => (r, m),
        _ => {
            st.reply_cme(CmeError::IncorrectParameters);
            return;
        }
    };
    let reason = match CallForwardReason::from_integer(reason as i64) {
        Ok(r) => r,
        Err(_) => {
            st.reply_cme(CmeError::IncorrectParameters);
            return;
        }
    };
    if reason == CallForwardReason::All || reason == CallForwardReason::AllConditional {
        /* TS 22.082 gives no detailed semantics for these groups */
        st.reply_cme(CmeError::IncorrectParameters);
        return;
    }
    match CallForwardMode::from_integer(mode as i64) {
        Ok(CallForwardMode::Query) => handle_call_forward_get(st, reason, &args),
        Ok(mode) => handle_call_forward_set(st, reason, mode, &args),
        Err(_) => st.reply_cme(CmeError::IncorrectParameters),
    }
}

fn classx_from(args: &[AtValue], index: usize, default: u32) -> Option<u32> {
    match args.get(index) {
        None | Some(&AtValue::Empty) => Some(default),
        Some(value) => value.get_integer().ok().cloned(),
    }
}

fn handle_call_forward_get(st: &mut ModemState, reason: CallForwardReason, args: &[AtValue]) {
    // +CCFC=<reason>,2[,,,<classx>]; TS 27.007 defaults classx to 7
    let classx = match classx_from(args, 4, 7) {
        Some(c) => c,
        None => {
            st.reply_cme(CmeError::IncorrectParameters);
            return;
        }
    };
    if classx >> (MAX_CLASSX_OFFSET + 1) != 0 {
        st.reply_cme(CmeError::IncorrectParameters);
        return;
    }

    let mut records: Vec<Option<CallForward>> = Vec::with_capacity(MAX_CLASSX_OFFSET + 1);
    let mut processed = [false; MAX_CLASSX_OFFSET + 1];
    for i in 0..=MAX_CLASSX_OFFSET {
        if classx & (1 << i) != 0 {
            records.push(st.supplementary.call_forward(reason, i).cloned());
        }
        else {
            records.push(None);
            processed[i] = true;
        }
    }

    let mut body = String::new();
    for i in 0..=MAX_CLASSX_OFFSET {
        if processed[i] {
            continue;
        }
        /* merge classes with identical configurations: voice and data both
         * forwarded to the same number report as one class-3 record */
        let mut classx = 1u32 << i;
        for j in (i + 1)..=MAX_CLASSX_OFFSET {
            if processed[j] {
                continue;
            }
            if records[i] == records[j] {
                classx |= 1 << j;
                processed[j] = true;
            }
        }
        match records[i] {
            Some(ref rec) => {
                body.push_str(&format!(
                    "+CCFC: {},{},\"{}\",{},,,{}\r\n",
                    rec.enabled as i32, classx, rec.number, rec.toa, rec.time
                ));
            }
            None => {
                body.push_str(&format!("+CCFC: 0,{}\r\n", classx));
            }
        }
    }
    st.reply(&body);
}

fn handle_call_forward_set(
    st: &mut ModemState,
    reason: CallForwardReason,
    mode: CallForwardMode,
    args: &[AtValue],
) {
    // +CCFC=<reason>,<mode>,"<number>",<toa>[,<classx>[,,,<time>]]
    let number = args.get(2).and_then(|v| v.get_string().ok()).cloned();
    let toa = args.get(3).and_then(|v| v.get_integer().ok()).cloned();
    let (number, toa) = match (number, toa) {
        (Some(n), Some(t)) if !n.is_empty() => (n, t as i32),
        _ => {
            st.reply_cme(CmeError::IncorrectParameters);
            return;
        }
    };
    let classx = match classx_from(args, 4, 7) {
        Some(c) => c,
        None => {
            st.reply_cme(CmeError::IncorrectParameters);
            return;
        }
    };
    if classx >> (MAX_CLASSX_OFFSET + 1) != 0 {
        st.reply_cme(CmeError::IncorrectParameters);
        return;
    }
    // TS 27.007 defaults the no-reply time to 20 seconds
    let time = args
        .get(7)
        .and_then(|v| v.get_integer().ok())
        .map(|&t| t as i32)
        .unwrap_or(20);

    for i in 0..=MAX_CLASSX_OFFSET {
        if classx & (1 << i) == 0 {
            continue;
        }
        match mode {
            CallForwardMode::Erasure => {
                st.supplementary.remove_call_forward(reason, i);
            }
            CallForwardMode::Enable | CallForwardMode::Registration => {
                st.supplementary
                    .set_call_forward(reason, i, true, &number, toa, time);
            }
            CallForwardMode::Disable => {
                st.supplementary
                    .set_call_forward(reason, i, false, &number, toa, time);
            }
            CallForwardMode::Query => {
                st.reply_cme(CmeError::IncorrectParameters);
                return;
            }
        }
    }
    st.reply("OK");
}

fn handle_call_barring_req(
    st: &mut ModemState,
    program: CallBarringProgram,
    mode: u32,
    passwd: Option<&str>,
    classx: u32,
) {
    match mode {
        0 | 1 => {
            let passwd = match passwd {
                Some(p) => p,
                None => {
                    st.reply_cme(CmeError::IncorrectParameters);
                    return;
                }
            };
            if !st
                .supplementary
                .check_passwd(ServiceType::CallBarring, passwd)
            {
                st.reply_cme(CmeError::WrongPassword);
                return;
            }
            for i in 0..=MAX_CLASSX_OFFSET {
                if classx & (1 << i) != 0 {
                    st.supplementary
                        .set_call_barring(program, i, mode == 1);
                }
            }
            st.reply("OK");
        }
        2 => {
            let mut result_pos = 0u32;
            let mut result_neg = 0u32;
            for i in 0..=MAX_CLASSX_OFFSET {
                /* some operators query with classx 0, meaning all classes */
                if classx != 0 && classx & (1 << i) == 0 {
                    continue;
                }
                if st.supplementary.is_call_barring_enabled(program, i) {
                    result_pos |= 1 << i;
                }
                else {
                    result_neg |= 1 << i;
                }
            }
            let mut body = String::new();
            if result_pos != 0 {
                body.push_str(&format!("+CLCK: 1,{}\r\n", result_pos));
            }
            if result_neg != 0 {
                body.push_str(&format!("+CLCK: 0,{}\r\n", result_neg));
            }
            st.reply(&body);
        }
        _ => {
            st.reply_cme(CmeError::IncorrectParameters);
        }
    }
}

fn handle_facility_lock_req(st: &mut ModemState, cmd: &str) {
    // AT+CLCK=<fac>,<mode>[,<password>[,<class>]]
    if !cmd.starts_with("+CLCK=") {
        st.reply_cme(CmeError::IncorrectParameters);
        return;
    }
    let args = match parse_params(&cmd[6..]) {
        Ok(args) => args.into_args(),
        Err(_) => {
            st.reply_cme(CmeError::IncorrectParameters);
            return;
        }
    };
    let fac = args.get(0).and_then(|v| v.get_string().ok()).cloned();
    let mode = args.get(1).and_then(|v| v.get_integer().ok()).cloned();
    let (fac, mode) = match (fac, mode) {
        (Some(f), Some(m)) => (f, m),
        _ => {
            st.reply_cme(CmeError::IncorrectParameters);
            return;
        }
    };
    let passwd = args.get(2).and_then(|v| v.get_string().ok()).cloned();
    let classx = match classx_from(&args, 3, 7) {
        Some(c) => c,
        None => {
            st.reply_cme(CmeError::IncorrectParameters);
            return;
        }
    };

    if fac == "SC" {
        /* the SIM PIN lock */
        if classx & 1 == 0 {
            st.reply_cme(CmeError::NotSupported);
            return;
        }
        match mode {
            0 | 1 => {
                let passwd = match passwd {
                    Some(ref p) if !p.is_empty() => p,
                    _ => {
                        st.reply_cme(CmeError::IncorrectParameters);
                        return;
                    }
                };
                if !st.sim.set_pin_enabled(mode == 1, passwd) {
                    st.reply_cme(CmeError::WrongPassword);
                    return;
                }
                st.reply("OK");
            }
            2 => {
                let body = format!("+CLCK: {},{}\r\n", st.sim.pin_enabled() as i32, 1);
                st.reply(&body);
            }
            _ => st.reply_cme(CmeError::NotSupported),
        }
        return;
    }

    let program = match &fac[..] {
        "AO" => CallBarringProgram::AllOutgoing,
        "OI" => CallBarringProgram::OutgoingInternational,
        "OX" => CallBarringProgram::OutgoingInternationalExceptHome,
        "AI" => CallBarringProgram::AllIncoming,
        "IR" => CallBarringProgram::IncomingRoaming,
        _ => {
            st.reply_cme(CmeError::NotSupported);
            return;
        }
    };
    handle_call_barring_req(st, program, mode, passwd.as_ref().map(|s| &s[..]), classx);
}

fn handle_change_password(st: &mut ModemState, cmd: &str) {
    // AT+CPWD=<fac>,<pwd>,<newpwd>
    if !cmd.starts_with("+CPWD=") {
        st.reply_cme(CmeError::IncorrectParameters);
        return;
    }
    let args = match parse_params(&cmd[6..]) {
        Ok(args) => args.into_args(),
        Err(_) => {
            st.reply_cme(CmeError::IncorrectParameters);
            return;
        }
    };
    let fac = args.get(0).and_then(|v| v.get_string().ok()).cloned();
    let old_pwd = args.get(1).and_then(|v| v.get_string().ok()).cloned();
    let new_pwd = args.get(2).and_then(|v| v.get_string().ok()).cloned();
    let (fac, old_pwd, new_pwd) = match (fac, old_pwd, new_pwd) {
        (Some(f), Some(o), Some(n)) => (f, o, n),
        _ => {
            st.reply_cme(CmeError::IncorrectParameters);
            return;
        }
    };

    match &fac[..] {
        "AB" | "AO" | "OI" | "OX" | "AI" | "IR" => {
            if !st
                .supplementary
                .check_passwd(ServiceType::CallBarring, &old_pwd)
            {
                st.reply_cme(CmeError::WrongPassword);
                return;
            }
            if !st
                .supplementary
                .set_passwd(ServiceType::CallBarring, &new_pwd)
            {
                st.reply_cme(CmeError::IncorrectParameters);
                return;
            }
            st.reply("OK");
        }
        _ => st.reply_cme(CmeError::IncorrectParameters),
    }
}

fn handle_smsc_address(st: &mut ModemState, cmd: &str) {
    if cmd.starts_with("+CSCA?") {
        /* +CSCA: "<sca>",<tosca>; see 3GPP 27.005 clause 3.3.1 */
        let body = format!(
            "+CSCA: \"{}\",{}",
            st.smsc_address.to_string(),
            st.smsc_address.toa
        );
        st.reply(&body);
        return;
    }
    if cmd.starts_with("+CSCA=") {
        // +CSCA="<sca>"[,<tosca>]
        let args = match parse_params(&cmd[6..]) {
            Ok(args) => args.into_args(),
            Err(_) => {
                st.reply("+CMS ERROR: 304");
                return;
            }
        };
        let address = args.get(0).and_then(|v| v.get_string().ok()).cloned();
        let toa = args
            .get(1)
            .and_then(|v| v.get_integer().ok())
            .map(|&t| t as u8)
            .unwrap_or(0);
        if let Some(address) = address {
            if st.set_smsc_address_inner(&address, toa).is_ok() {
                st.reply("OK");
                return;
            }
        }
    }
    st.reply("+CMS ERROR: 304");
}

fn handle_stk_terminal_response(st: &mut ModemState, cmd: &str) {
    let answer = st.sim.stk_terminal_response(cmd);
    st.reply(&answer);
}

fn handle_stk_envelope_command(st: &mut ModemState, cmd: &str) {
    let answer = st.sim.stk_envelope_command(cmd);
    st.reply(&answer);
}
