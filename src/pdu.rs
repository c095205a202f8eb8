//! SMS PDU coding: hex transport form, semi-octet addresses, SMS-SUBMIT
//! decoding, SMS-DELIVER encoding, and multipart reassembly.
//!
//! Only the subset a store-and-forward emulation needs is implemented: the
//! host submits SMS-SUBMIT PDUs, the modem turns them into SMS-DELIVER PDUs
//! for the target instance. User data is carried verbatim between the two,
//! so nothing here ever re-encodes message text except the convenience
//! constructors used to originate messages.
use std::fmt;
use crate::errors::{ModemError, ModemResult};
use crate::util::utc_now;

/// Wrapper that displays a byte buffer in the AT hex transport form.
pub struct HexData<'a>(pub &'a [u8]);
impl<'a> fmt::Display for HexData<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for b in self.0.iter() {
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}
impl<'a> HexData<'a> {
    pub fn decode(data: &str) -> ModemResult<Vec<u8>> {
        if data.len() % 2 != 0 {
            return Err(ModemError::InvalidPdu("odd-length hex string"));
        }
        data.as_bytes()
            .chunks(2)
            .map(|ch| {
                ::std::str::from_utf8(ch)
                    .ok()
                    .and_then(|s| u8::from_str_radix(s, 16).ok())
                    .ok_or(ModemError::InvalidPdu("invalid hex digit"))
            })
            .collect()
    }
}

const TOA_INTERNATIONAL: u8 = 0x91;
const TOA_UNKNOWN: u8 = 0x81;

/// The dialling digits a semi-octet nibble can carry.
const DIAL_DIGITS: &[u8; 15] = b"0123456789*#,N%";

/// A phone-number value with its type-of-address byte. Used both for SMS
/// addresses and for the persisted SMSC address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsAddress {
    pub toa: u8,
    pub digits: String,
}
impl SmsAddress {
    pub fn from_str(s: &str) -> SmsAddress {
        if s.starts_with('+') {
            SmsAddress {
                toa: TOA_INTERNATIONAL,
                digits: s[1..].to_owned(),
            }
        }
        else {
            SmsAddress {
                toa: TOA_UNKNOWN,
                digits: s.to_owned(),
            }
        }
    }
    /// The printable form: international numbers get their `+` back.
    pub fn to_string(&self) -> String {
        if self.toa == TOA_INTERNATIONAL {
            format!("+{}", self.digits)
        }
        else {
            self.digits.clone()
        }
    }
    fn digit_value(b: u8) -> Option<u8> {
        DIAL_DIGITS.iter().position(|&d| d == b).map(|p| p as u8)
    }
    /// Encodes as `[length in digits][toa][swapped BCD digits]`.
    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> ModemResult<()> {
        out.push(self.digits.len() as u8);
        out.push(self.toa);
        let b = self.digits.as_bytes();
        for pair in b.chunks(2) {
            let lo = SmsAddress::digit_value(pair[0])
                .ok_or(ModemError::InvalidPdu("invalid address digit"))?;
            let hi = match pair.get(1) {
                Some(&d) => SmsAddress::digit_value(d)
                    .ok_or(ModemError::InvalidPdu("invalid address digit"))?,
                None => 0xf,
            };
            out.push((hi << 4) | lo);
        }
        Ok(())
    }
    /// Decodes from `data[*off..]`, advancing the offset past the address.
    pub(crate) fn decode(data: &[u8], off: &mut usize) -> ModemResult<SmsAddress> {
        let len = *data.get(*off).ok_or(ModemError::InvalidPdu("missing address length"))? as usize;
        let toa = *data.get(*off + 1).ok_or(ModemError::InvalidPdu("missing type of address"))?;
        let bytes = (len + 1) / 2;
        let end = *off + 2 + bytes;
        if data.len() < end {
            return Err(ModemError::InvalidPdu("address runs past end of data"));
        }
        let mut digits = String::with_capacity(len);
        for nn in 0..len {
            let b = data[*off + 2 + nn / 2];
            let nibble = if nn % 2 == 0 { b & 0xf } else { b >> 4 };
            if nibble == 0xf {
                break;
            }
            digits.push(DIAL_DIGITS[nibble as usize] as char);
        }
        *off = end;
        Ok(SmsAddress { toa, digits })
    }
}

/* TP first-octet bits (3GPP TS 23.040 clause 9.2.3) */
const MTI_MASK: u8 = 0x03;
const MTI_DELIVER: u8 = 0x00;
const MTI_SUBMIT: u8 = 0x01;
const VPF_MASK: u8 = 0x18;
const VPF_NONE: u8 = 0x00;
const VPF_RELATIVE: u8 = 0x10;
const UDHI: u8 = 0x40;
/// Deliver first octet: no more messages to send, no UDH.
const DELIVER_FIRST_OCTET: u8 = 0x04;

/* TP-DCS coding groups as produced by the simplistic general scheme. */
const DCS_ENCODING_MASK: u8 = 0x0c;
const DCS_GSM7: u8 = 0x00;
const DCS_EIGHT_BIT: u8 = 0x04;
const DCS_UCS2: u8 = 0x08;

/// A decoded SMS-SUBMIT.
#[derive(Debug, Clone)]
pub struct SubmitPdu {
    pub mr: u8,
    pub dest: SmsAddress,
    pub pid: u8,
    pub dcs: u8,
    pub udhi: bool,
    /// TP-UDL exactly as transmitted (septets for the 7-bit alphabet).
    pub user_data_len: u8,
    /// TP-UD bytes, user data header included when `udhi` is set.
    pub user_data: Vec<u8>,
}
impl SubmitPdu {
    pub fn from_hex(hex: &str) -> ModemResult<SubmitPdu> {
        SubmitPdu::from_bytes(&HexData::decode(hex)?)
    }
    pub fn from_bytes(data: &[u8]) -> ModemResult<SubmitPdu> {
        let mut off = 0usize;
        let sca_len = *data.get(off).ok_or(ModemError::InvalidPdu("empty PDU"))? as usize;
        off += 1 + sca_len;
        let fo = *data.get(off).ok_or(ModemError::InvalidPdu("missing first octet"))?;
        if fo & MTI_MASK != MTI_SUBMIT {
            return Err(ModemError::InvalidPdu("not an SMS-SUBMIT"));
        }
        off += 1;
        let mr = *data.get(off).ok_or(ModemError::InvalidPdu("missing message reference"))?;
        off += 1;
        let dest = SmsAddress::decode(data, &mut off)?;
        let pid = *data.get(off).ok_or(ModemError::InvalidPdu("missing protocol id"))?;
        let dcs = *data.get(off + 1).ok_or(ModemError::InvalidPdu("missing coding scheme"))?;
        off += 2;
        off += match fo & VPF_MASK {
            VPF_NONE => 0,
            VPF_RELATIVE => 1,
            _ => 7,
        };
        let user_data_len = *data.get(off).ok_or(ModemError::InvalidPdu("missing user data length"))?;
        off += 1;
        if off > data.len() {
            return Err(ModemError::InvalidPdu("user data runs past end of data"));
        }
        Ok(SubmitPdu {
            mr,
            dest,
            pid,
            dcs,
            udhi: fo & UDHI != 0,
            user_data_len,
            user_data: data[off..].to_vec(),
        })
    }
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8]; // zero-length SMSC: use the stored default
        out.push(MTI_SUBMIT | if self.udhi { UDHI } else { 0 });
        out.push(self.mr);
        // The destination was built by `SmsAddress::from_str`, so the digits
        // are always encodable.
        let _ = self.dest.encode(&mut out);
        out.push(self.pid);
        out.push(self.dcs);
        out.push(self.user_data_len);
        out.extend_from_slice(&self.user_data);
        out
    }
    /// Concatenation info from the user data header: (reference, total, seq).
    pub fn concat_info(&self) -> Option<(u16, u8, u8)> {
        let udh = self.header()?;
        for &(id, ref data) in &udh.components {
            match id {
                0x00 if data.len() == 3 => {
                    return Some((data[0] as u16, data[1], data[2]));
                }
                0x08 if data.len() == 4 => {
                    return Some((((data[0] as u16) << 8) | data[1] as u16, data[2], data[3]));
                }
                _ => {}
            }
        }
        None
    }
    pub(crate) fn header(&self) -> Option<UserDataHeader> {
        if !self.udhi {
            return None;
        }
        UserDataHeader::from_bytes(&self.user_data).ok()
    }

    /// Builds the SMS-SUBMIT PDUs carrying `text`, splitting into
    /// concatenated parts tagged with `reference` where necessary.
    pub fn new_parts(dest: &str, text: &str, reference: u8) -> Vec<SubmitPdu> {
        let dest = SmsAddress::from_str(dest);
        let single = |dcs: u8, udl: u8, ud: Vec<u8>| SubmitPdu {
            mr: 0,
            dest: dest.clone(),
            pid: 0,
            dcs,
            udhi: false,
            user_data_len: udl,
            user_data: ud,
        };
        if let Some(septets) = try_gsm_encode_string(text) {
            if septets.len() <= 160 {
                let packed = pack_septets(&septets, 0);
                return vec![single(DCS_GSM7, septets.len() as u8, packed)];
            }
            let chunks: Vec<&[u8]> = septets.chunks(153).collect();
            let total = chunks.len() as u8;
            chunks
                .into_iter()
                .enumerate()
                .map(|(i, chunk)| {
                    let udh = UserDataHeader {
                        components: vec![(0x00, vec![reference, total, i as u8 + 1])],
                    };
                    let mut ud = udh.as_bytes();
                    let padding = 7 - ((ud.len() * 8) % 7);
                    let udl = ((ud.len() * 8) + padding + (chunk.len() * 7)) / 7;
                    ud.extend(pack_septets(chunk, padding));
                    SubmitPdu {
                        mr: 0,
                        dest: dest.clone(),
                        pid: 0,
                        dcs: DCS_GSM7,
                        udhi: true,
                        user_data_len: udl as u8,
                        user_data: ud,
                    }
                })
                .collect()
        }
        else {
            use encoding::{Encoding, EncoderTrap};
            use encoding::all::UTF_16BE;
            let bytes = UTF_16BE.encode(text, EncoderTrap::Replace).unwrap_or_default();
            if bytes.len() <= 140 {
                let len = bytes.len() as u8;
                return vec![single(DCS_UCS2, len, bytes)];
            }
            let chunks: Vec<&[u8]> = bytes.chunks(134).collect();
            let total = chunks.len() as u8;
            chunks
                .into_iter()
                .enumerate()
                .map(|(i, chunk)| {
                    let udh = UserDataHeader {
                        components: vec![(0x00, vec![reference, total, i as u8 + 1])],
                    };
                    let mut ud = udh.as_bytes();
                    ud.extend_from_slice(chunk);
                    let len = ud.len() as u8;
                    SubmitPdu {
                        mr: 0,
                        dest: dest.clone(),
                        pid: 0,
                        dcs: DCS_UCS2,
                        udhi: true,
                        user_data_len: len,
                        user_data: ud,
                    }
                })
                .collect()
        }
    }
}

/// A decoded (or constructed) SMS-DELIVER.
#[derive(Debug, Clone)]
pub struct DeliverPdu {
    pub originator: SmsAddress,
    pub pid: u8,
    pub dcs: u8,
    pub udhi: bool,
    /// Service-center timestamp, swapped BCD.
    pub scts: [u8; 7],
    pub user_data_len: u8,
    pub user_data: Vec<u8>,
}
impl DeliverPdu {
    /// Builds the deliver corresponding to one submitted part; the user data
    /// (header included) travels verbatim.
    pub fn from_submit(submit: &SubmitPdu, from: &SmsAddress) -> DeliverPdu {
        DeliverPdu {
            originator: from.clone(),
            pid: submit.pid,
            dcs: submit.dcs,
            udhi: submit.udhi,
            scts: scts_now(),
            user_data_len: submit.user_data_len,
            user_data: submit.user_data.clone(),
        }
    }
    pub fn from_hex(hex: &str) -> ModemResult<DeliverPdu> {
        DeliverPdu::from_bytes(&HexData::decode(hex)?)
    }
    pub fn from_bytes(data: &[u8]) -> ModemResult<DeliverPdu> {
        let mut off = 0usize;
        let sca_len = *data.get(off).ok_or(ModemError::InvalidPdu("empty PDU"))? as usize;
        off += 1 + sca_len;
        let fo = *data.get(off).ok_or(ModemError::InvalidPdu("missing first octet"))?;
        if fo & MTI_MASK != MTI_DELIVER {
            return Err(ModemError::InvalidPdu("not an SMS-DELIVER"));
        }
        off += 1;
        let originator = SmsAddress::decode(data, &mut off)?;
        let pid = *data.get(off).ok_or(ModemError::InvalidPdu("missing protocol id"))?;
        let dcs = *data.get(off + 1).ok_or(ModemError::InvalidPdu("missing coding scheme"))?;
        off += 2;
        if data.len() < off + 7 {
            return Err(ModemError::InvalidPdu("missing timestamp"));
        }
        let mut scts = [0u8; 7];
        scts.copy_from_slice(&data[off..off + 7]);
        off += 7;
        let user_data_len = *data.get(off).ok_or(ModemError::InvalidPdu("missing user data length"))?;
        off += 1;
        Ok(DeliverPdu {
            originator,
            pid,
            dcs,
            udhi: fo & UDHI != 0,
            scts,
            user_data_len,
            user_data: data[off..].to_vec(),
        })
    }
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8];
        out.push(DELIVER_FIRST_OCTET | if self.udhi { UDHI } else { 0 });
        let _ = self.originator.encode(&mut out);
        out.push(self.pid);
        out.push(self.dcs);
        out.extend_from_slice(&self.scts);
        out.push(self.user_data_len);
        out.extend_from_slice(&self.user_data);
        out
    }
    /// Decodes the message text, skipping any user data header.
    ///
    /// Unsupported codings (the 8-bit data alphabet) yield an empty string.
    pub fn text(&self) -> String {
        let mut padding = 0;
        let mut start = 0;
        if self.udhi {
            let udhl = match self.user_data.get(0) {
                Some(&l) => l as usize,
                None => return String::new(),
            };
            padding = 7 - (((udhl + 1) * 8) % 7);
            start = udhl + 1;
        }
        if self.user_data.len() < start {
            return String::new();
        }
        match self.dcs & DCS_ENCODING_MASK {
            DCS_GSM7 => {
                // TP-UDL counts the header's septets too; the text is what
                // remains past the header and its alignment padding.
                let text_len = (self.user_data_len as usize)
                    .saturating_sub((start * 8 + padding) / 7);
                let mut septets = unpack_septets(&self.user_data[start..], padding, text_len);
                septets.truncate(text_len);
                gsm_decode_string(&septets)
            }
            DCS_UCS2 => {
                use encoding::{Encoding, DecoderTrap};
                use encoding::all::UTF_16BE;
                UTF_16BE
                    .decode(&self.user_data[start..], DecoderTrap::Replace)
                    .unwrap_or_default()
            }
            _ => String::new(),
        }
    }
}

fn bcd_swapped(v: u32) -> u8 {
    (((v % 10) << 4) | (v / 10 % 10)) as u8
}
fn scts_now() -> [u8; 7] {
    let (y, mo, d, h, mi, s) = utc_now();
    [
        bcd_swapped((y % 100) as u32),
        bcd_swapped(mo),
        bcd_swapped(d),
        bcd_swapped(h),
        bcd_swapped(mi),
        bcd_swapped(s),
        0, // UTC
    ]
}

/// A parsed user data header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UserDataHeader {
    /// `(information element id, data)` pairs.
    pub(crate) components: Vec<(u8, Vec<u8>)>,
}
impl UserDataHeader {
    pub(crate) fn from_bytes(user_data: &[u8]) -> ModemResult<UserDataHeader> {
        let udhl = *user_data.get(0).ok_or(ModemError::InvalidPdu("empty user data"))? as usize;
        if user_data.len() < udhl + 1 {
            return Err(ModemError::InvalidPdu("UDHL goes past end of data"));
        }
        let mut components = vec![];
        let mut off = 1;
        while off < udhl + 1 {
            let id = user_data[off];
            let len = *user_data
                .get(off + 1)
                .ok_or(ModemError::InvalidPdu("truncated UDH component"))? as usize;
            let end = off + 2 + len;
            if end > udhl + 1 {
                return Err(ModemError::InvalidPdu("UDH component goes past header"));
            }
            components.push((id, user_data[off + 2..end].to_vec()));
            off = end;
        }
        Ok(UserDataHeader { components })
    }
    pub(crate) fn as_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8];
        for &(id, ref data) in &self.components {
            out.push(id);
            out.push(data.len() as u8);
            out.extend_from_slice(data);
        }
        out[0] = (out.len() - 1) as u8;
        out
    }
}

/// Packs unpacked septets into octets, with `padding` filler bits before the
/// first septet (used to align user data after a header).
pub(crate) fn pack_septets(orig: &[u8], padding: usize) -> Vec<u8> {
    let mut ret = vec![];
    let mut chars_cur = 7;
    if padding > 0 && !orig.is_empty() {
        chars_cur = padding;
        ret.push(orig[0] << padding);
        chars_cur -= 1;
    }
    for (i, data) in orig.iter().enumerate() {
        if chars_cur == 0 {
            chars_cur = 7;
            continue;
        }
        let mut cur = (*data & 0b0111_1111) >> (7 - chars_cur);
        if let Some(n) = orig.get(i + 1) {
            cur |= *n << chars_cur;
        }
        ret.push(cur);
        chars_cur -= 1;
    }
    ret
}

/// Unpacks octets into septets; `len` is the announced septet count.
pub(crate) fn unpack_septets(orig: &[u8], padding: usize, len: usize) -> Vec<u8> {
    let mut ret = vec![0u8];
    // Number of bits in the current octet that come from the current septet.
    let mut chars_cur = 7;
    let mut i = 0;
    if padding > 0 && !orig.is_empty() {
        chars_cur = padding;
    }
    for (j, data) in orig.iter().enumerate() {
        if chars_cur == 0 {
            chars_cur = 7;
            ret.push(0);
            i += 1;
        }
        let next = data >> chars_cur;
        let cur = ((data << (8 - chars_cur)) >> (8 - chars_cur)) << (7 - chars_cur);
        ret[i] |= cur;
        if j + 1 < orig.len() || ret.len() < len {
            ret.push(next);
        }
        chars_cur -= 1;
        i += 1;
    }
    if padding > 0 && !ret.is_empty() {
        ret.remove(0);
    }
    ret
}

/// Non-identity mappings of the GSM 7-bit default alphabet that this
/// emulation cares about. Characters it cannot represent force UCS-2.
static GSM_ENCODING_TABLE: &[(char, u8)] = &[
    ('@', 0x00),
    ('£', 0x01),
    ('$', 0x02),
    ('\n', 0x0a),
    ('\r', 0x0d),
    ('_', 0x11),
];

fn is_identity_septet(c: char) -> bool {
    match c {
        'A'...'Z' | 'a'...'z' | '0'...'9' => true,
        ' ' | '!' | '"' | '#' => true,
        '%'...'?' => true,
        _ => false,
    }
}

/// Decode a buffer of unpacked septets into a string, lossily.
pub(crate) fn gsm_decode_string(input: &[u8]) -> String {
    let mut ret = String::new();
    for &b in input {
        if is_identity_septet(b as char) {
            ret.push(b as char);
            continue;
        }
        for &(ch, val) in GSM_ENCODING_TABLE {
            if val == b {
                ret.push(ch);
            }
        }
    }
    ret
}

/// Encodes a string as unpacked septets iff every character is
/// representable.
pub(crate) fn try_gsm_encode_string(input: &str) -> Option<Vec<u8>> {
    let mut ret = vec![];
    'chars: for c in input.chars() {
        if is_identity_septet(c) {
            ret.push(c as u8);
            continue;
        }
        for &(ch, val) in GSM_ENCODING_TABLE {
            if c == ch {
                ret.push(val);
                continue 'chars;
            }
        }
        return None;
    }
    Some(ret)
}

/// Reassembles concatenated SMS-SUBMIT parts into complete messages.
#[derive(Debug, Default)]
pub(crate) struct SmsReceiver {
    partials: Vec<PartialSms>,
}
#[derive(Debug)]
struct PartialSms {
    reference: u16,
    parts: Vec<Option<SubmitPdu>>,
}
impl SmsReceiver {
    pub(crate) fn new() -> SmsReceiver {
        SmsReceiver { partials: vec![] }
    }
    /// Accepts one submitted PDU; returns the ordered part list once a
    /// message is complete. PDUs without (or with malformed) concatenation
    /// headers complete immediately.
    pub(crate) fn add_submit_pdu(&mut self, pdu: SubmitPdu) -> Option<Vec<SubmitPdu>> {
        let (reference, total, seq) = match pdu.concat_info() {
            Some((r, t, s)) if s >= 1 && s <= t && t >= 1 => (r, t, s),
            _ => return Some(vec![pdu]),
        };
        let pos = self.partials.iter().position(|p| p.reference == reference);
        let pos = match pos {
            Some(p) => p,
            None => {
                self.partials.push(PartialSms {
                    reference,
                    parts: vec![None; total as usize],
                });
                self.partials.len() - 1
            }
        };
        {
            let partial = &mut self.partials[pos];
            if partial.parts.len() != total as usize {
                // total changed mid-stream; restart collection
                partial.parts = vec![None; total as usize];
            }
            partial.parts[seq as usize - 1] = Some(pdu);
            if partial.parts.iter().any(|p| p.is_none()) {
                return None;
            }
        }
        let complete = self.partials.remove(pos);
        Some(complete.parts.into_iter().filter_map(|p| p).collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn hex_round_trip() {
        let data = vec![0x00, 0x1a, 0xff, 0x42];
        let hex = format!("{}", HexData(&data));
        assert_eq!(hex, "001AFF42");
        assert_eq!(HexData::decode(&hex).unwrap(), data);
        assert!(HexData::decode("0").is_err());
        assert!(HexData::decode("zz").is_err());
    }
    #[test]
    fn address_round_trip() {
        for num in &["15555215554", "+15555215556", "911"] {
            let addr = SmsAddress::from_str(num);
            let mut enc = vec![];
            addr.encode(&mut enc).unwrap();
            let mut off = 0;
            let dec = SmsAddress::decode(&enc, &mut off).unwrap();
            assert_eq!(off, enc.len());
            assert_eq!(dec.to_string(), *num);
        }
    }
    #[test]
    fn septet_round_trip() {
        let septets: Vec<u8> = "hello world".bytes().collect();
        for padding in &[0usize, 1, 3] {
            let packed = pack_septets(&septets, *padding);
            let unpacked = unpack_septets(&packed, *padding, septets.len());
            assert_eq!(&unpacked[..septets.len()], &septets[..]);
        }
    }
    #[test]
    fn submit_deliver_text() {
        let parts = SubmitPdu::new_parts("+15555215556", "hello from 5554", 7);
        assert_eq!(parts.len(), 1);
        let sub = SubmitPdu::from_bytes(&parts[0].to_bytes()).unwrap();
        assert_eq!(sub.dest.to_string(), "+15555215556");
        let from = SmsAddress::from_str("15555215554");
        let deliver = DeliverPdu::from_submit(&sub, &from);
        let decoded = DeliverPdu::from_bytes(&deliver.to_bytes()).unwrap();
        assert_eq!(decoded.originator.to_string(), "15555215554");
        assert_eq!(decoded.text(), "hello from 5554");
    }
    #[test]
    fn submit_deliver_ucs2() {
        let parts = SubmitPdu::new_parts("5556", "héllo", 1);
        assert_eq!(parts.len(), 1);
        let deliver = DeliverPdu::from_submit(&parts[0], &SmsAddress::from_str("5554"));
        let decoded = DeliverPdu::from_bytes(&deliver.to_bytes()).unwrap();
        assert_eq!(decoded.text(), "héllo");
    }
    #[test]
    fn multipart_reassembly() {
        let long: String = ::std::iter::repeat("0123456789").take(20).collect();
        let parts = SubmitPdu::new_parts("15556", &long, 42);
        assert!(parts.len() > 1);
        let mut receiver = SmsReceiver::new();
        let count = parts.len();
        for (i, part) in parts.into_iter().enumerate() {
            let done = receiver.add_submit_pdu(part);
            if i + 1 < count {
                assert!(done.is_none());
            }
            else {
                let done = done.unwrap();
                assert_eq!(done.len(), count);
                let from = SmsAddress::from_str("15554");
                let text: String = done
                    .iter()
                    .map(|p| DeliverPdu::from_submit(p, &from).text())
                    .collect();
                assert_eq!(text, long);
            }
        }
    }
    #[test]
    fn rejects_garbage() {
        assert!(SubmitPdu::from_hex("00").is_err());
        assert!(SubmitPdu::from_hex("0011").is_err());
        // A deliver is not a submit.
        let deliver = DeliverPdu {
            originator: SmsAddress::from_str("123"),
            pid: 0,
            dcs: 0,
            udhi: false,
            scts: [0; 7],
            user_data_len: 0,
            user_data: vec![],
        };
        assert!(SubmitPdu::from_bytes(&deliver.to_bytes()).is_err());
    }
}
