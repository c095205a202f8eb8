//! SMS submission and delivery routing.
use crate::call::{normalize_number, PHONE_PREFIX};
use crate::pdu::{DeliverPdu, HexData, SmsAddress, SubmitPdu};
use crate::relay;
use crate::ModemState;

impl ModemState {
    /// Hands a deliver PDU to the host as a `+CMT` unsolicited.
    pub(crate) fn receive_sms_inner(&self, pdu: &DeliverPdu) {
        let body = format!("+CMT: 0\r\n{}", HexData(&pdu.to_bytes()));
        self.unsol(&body);
    }

    /// Hands a cell-broadcast PDU to the host as a `+CBM` unsolicited.
    pub(crate) fn receive_cbs_inner(&self, pdu: &[u8]) {
        let body = format!("+CBM: 0\r\n{}", HexData(pdu));
        self.unsol(&body);
    }

    /// The transport line following the `+CMGS=` prompt: a hex SMS-SUBMIT,
    /// possibly terminated by a `^Z`.
    pub(crate) fn submit_sms_body(&mut self, cmd: &str) {
        let mut body = cmd;
        if body.ends_with('\u{1a}') {
            body = &body[..body.len() - 1];
        }
        let pdu = match SubmitPdu::from_hex(body) {
            Ok(pdu) => pdu,
            Err(e) => {
                debug!("invalid SMS PDU '{}': {}", body, e);
                self.reply("+CMS ERROR: INVALID SMS PDU");
                return;
            }
        };
        if pdu.dest.digits.is_empty() {
            debug!("could not get SMS receiver address from '{}'", body);
            self.reply("+CMS ERROR: BAD SMS RECEIVER ADDRESS");
            return;
        }

        self.reply("+CMGS: 0");

        let receiver = normalize_number(&pdu.dest.to_string(), self.instance_id);
        let (port, instance) =
            match relay::remote_number_str_to_port(&receiver, self.instance_id) {
                Some(target) => target,
                // not an emulated subscriber; the message vanishes into the
                // simulated network
                None => return,
            };

        let parts = match self.sms_receiver.add_submit_pdu(pdu) {
            Some(parts) => parts,
            // more concatenated parts to come
            None => return,
        };

        let from = SmsAddress::from_str(&format!(
            "{}{}{}",
            PHONE_PREFIX,
            self.instance_id + 1,
            self.base_port
        ));
        for part in &parts {
            let deliver = DeliverPdu::from_submit(part, &from);
            if port == self.base_port {
                if instance == self.instance_id {
                    // a message to ourselves never leaves the instance
                    self.receive_sms_inner(&deliver);
                }
                else if let Some(peer) = self.hub.instance_state(port, instance) {
                    peer.borrow_mut().receive_sms_inner(&deliver);
                }
            }
            else {
                let hex = format!("{}", HexData(&deliver.to_bytes()));
                if relay::remote_call_sms(self, &receiver, hex).is_err() {
                    debug!("could not send SMS PDU to remote emulator");
                    break;
                }
            }
        }
    }
}
