//! Packet-data (PDP) contexts and the shared pool of virtual data links.
use std::net::Ipv4Addr;
use crate::error_codes::CmeError;
use crate::{ModemHub, ModemState};

/// 3GPP allows at most 4 primary contexts here.
pub const MAX_DATA_CONTEXTS: usize = 4;
/// `+CGCONTRDP` can only report a primary and a secondary DNS server.
pub const NUM_DNS_PER_LINK: usize = 2;
pub(crate) const MAX_APN_LENGTH: usize = 31;

/// PDP type; only IP contexts can actually be defined.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, is_enum_variant)]
pub enum PdpType {
    Ip = 0,
    Ppp = 1,
}
impl PdpType {
    pub(crate) fn name(&self) -> &'static str {
        match *self {
            PdpType::Ip => "IP",
            PdpType::Ppp => "PPP",
        }
    }
}

/// One PDP context slot, indexed 1-based by `<cid>`.
#[derive(Debug, Clone)]
pub(crate) struct PdpContext {
    /// -1 when undefined, otherwise equal to the slot's `<cid>`.
    pub(crate) id: i32,
    pub(crate) active: bool,
    pub(crate) ptype: PdpType,
    pub(crate) apn: String,
    pub(crate) addr: Option<Ipv4Addr>,
}
impl PdpContext {
    pub(crate) fn undefined() -> PdpContext {
        PdpContext {
            id: -1,
            active: false,
            ptype: PdpType::Ip,
            apn: String::new(),
            addr: None,
        }
    }
    pub(crate) fn is_defined(&self) -> bool {
        self.id > 0
    }
}

/// Identifies the context currently holding a link:
/// `(base_port, instance_id, cid)`.
pub(crate) type LinkOwner = (u16, u8, i32);

/// A virtual network interface from the process-wide pool.
#[derive(Debug, Clone)]
pub(crate) struct DataLink {
    pub(crate) name: String,
    pub(crate) addr: Ipv4Addr,
    pub(crate) gw: Ipv4Addr,
    pub(crate) dns: [Option<Ipv4Addr>; NUM_DNS_PER_LINK],
    pub(crate) owner: Option<LinkOwner>,
}

/// Read-only view of a link handed to the `+CGCONTRDP` reporter.
#[derive(Debug, Clone)]
pub(crate) struct DataLinkInfo {
    pub(crate) name: String,
    pub(crate) addr: Ipv4Addr,
    pub(crate) gw: Ipv4Addr,
    pub(crate) dns: [Option<Ipv4Addr>; NUM_DNS_PER_LINK],
}

/// Host-side control over the virtual interfaces backing data contexts.
pub trait NetworkAdapter {
    /// Brings an interface up or down; returns `false` when bringing the
    /// link up failed.
    fn set_link(&self, name: &str, up: bool) -> bool;
}
/// Adapter that only logs. Useful when no host networking is wired up.
pub struct NullAdapter;
impl NetworkAdapter for NullAdapter {
    fn set_link(&self, name: &str, up: bool) -> bool {
        debug!("link {} {}", name, if up { "up" } else { "down" });
        true
    }
}

pub(crate) fn default_links(count: usize) -> Vec<DataLink> {
    (0..count)
        .map(|n| DataLink {
            name: format!("rmnet.{}", n),
            addr: Ipv4Addr::new(10, 0, 2, 100 + n as u8),
            gw: Ipv4Addr::new(10, 0, 2, 2),
            dns: [Some(Ipv4Addr::new(10, 0, 2, 3)), None],
            owner: None,
        })
        .collect()
}

impl ModemHub {
    /// First-fit acquisition of a free link for `owner`.
    pub(crate) fn acquire_link(&self, owner: LinkOwner) -> Option<String> {
        let mut links = self.inner.links.borrow_mut();
        for link in links.iter_mut() {
            if link.owner.is_none() {
                link.owner = Some(owner);
                return Some(link.name.clone());
            }
        }
        None
    }
    pub(crate) fn release_link(&self, owner: LinkOwner) -> Option<String> {
        let mut links = self.inner.links.borrow_mut();
        for link in links.iter_mut() {
            if link.owner == Some(owner) {
                link.owner = None;
                return Some(link.name.clone());
            }
        }
        None
    }
    pub(crate) fn link_info(&self, owner: LinkOwner) -> Option<DataLinkInfo> {
        let links = self.inner.links.borrow();
        links.iter().find(|l| l.owner == Some(owner)).map(|l| DataLinkInfo {
            name: l.name.clone(),
            addr: l.addr,
            gw: l.gw,
            dns: l.dns,
        })
    }
    pub(crate) fn set_link(&self, name: &str, up: bool) -> bool {
        self.inner.adapter.set_link(name, up)
    }
}

impl ModemState {
    fn link_owner(&self, index: usize) -> LinkOwner {
        (self.base_port, self.instance_id, self.contexts[index].id)
    }

    /// Binds a link and brings it up. Idempotent on active contexts.
    pub(crate) fn setup_pdp(&mut self, index: usize) -> Result<(), CmeError> {
        if self.contexts[index].active {
            return Ok(());
        }
        let owner = self.link_owner(index);
        let name = match self.hub.acquire_link(owner) {
            Some(name) => name,
            None => return Err(CmeError::ServiceOutOfOrder),
        };
        if !self.hub.set_link(&name, true) {
            self.hub.release_link(owner);
            return Err(CmeError::ServiceOutOfOrder);
        }
        self.contexts[index].active = true;
        Ok(())
    }

    /// Brings the link down and unbinds it. Idempotent on inactive contexts.
    pub(crate) fn teardown_pdp(&mut self, index: usize) {
        if !self.contexts[index].active {
            return;
        }
        let owner = self.link_owner(index);
        if let Some(name) = self.hub.release_link(owner) {
            self.hub.set_link(&name, false);
        }
        self.contexts[index].active = false;
    }

    /// `+CGACT=<enable>,<cid>` / `D*99***<cid>#` entry point.
    pub(crate) fn activate_data_call(&mut self, cid: i32, enable: bool) -> Result<(), CmeError> {
        if cid < 1 || cid > MAX_DATA_CONTEXTS as i32 {
            return Err(CmeError::UnknownPdpContext);
        }
        let index = (cid - 1) as usize;
        if !self.contexts[index].is_defined() {
            return Err(CmeError::ActivationRejected);
        }
        if !self.data_state.is_registered() {
            return Err(CmeError::ServiceOutOfOrder);
        }
        if enable {
            self.setup_pdp(index)
        }
        else {
            self.teardown_pdp(index);
            Ok(())
        }
    }
}
