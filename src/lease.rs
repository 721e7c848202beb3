// SPDX-License-Identifier: Apache-2.0

use std::net::Ipv6Addr;
use std::time::Instant;

use crate::{
    DhcpError, DhcpV6IaType, DhcpV6Option, DhcpV6OptionCode, ErrorKind,
};

/// A bound DHCPv6 lease: the address/prefix granted plus everything needed
/// to renew, rebind, or release it later.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct DhcpV6Lease {
    pub t1: u32,
    pub t2: u32,
    pub xid: [u8; 3],
    pub iaid: u32,
    pub ia_type: DhcpV6IaType,
    pub addr: Ipv6Addr,
    pub prefix_len: u8,
    pub preferred_life: u32,
    pub valid_life: u32,
    pub cli_duid: Vec<u8>,
    pub srv_duid: Vec<u8>,
    /// Present only when the server sent a Server Unicast option; permits
    /// Request/Renew/Release/Decline to address the server directly instead
    /// of multicasting (section 4.D).
    pub srv_unicast: Option<Ipv6Addr>,
    /// Every option the server's Reply carried, for callers that need an
    /// option this type does not surface directly (DNS servers, NTP, ...).
    pub aux_opts: Vec<DhcpV6Option>,
    pub acquired_at: Instant,
}

impl PartialEq for DhcpV6Lease {
    fn eq(&self, other: &Self) -> bool {
        self.t1 == other.t1
            && self.t2 == other.t2
            && self.xid == other.xid
            && self.iaid == other.iaid
            && self.ia_type == other.ia_type
            && self.addr == other.addr
            && self.prefix_len == other.prefix_len
            && self.preferred_life == other.preferred_life
            && self.valid_life == other.valid_life
            && self.cli_duid == other.cli_duid
            && self.srv_duid == other.srv_duid
            && self.srv_unicast == other.srv_unicast
            && self.aux_opts == other.aux_opts
    }
}

impl Default for DhcpV6Lease {
    fn default() -> Self {
        Self {
            t1: 0,
            t2: 0,
            xid: [0; 3],
            iaid: 0,
            ia_type: DhcpV6IaType::NonTemporaryAddresses,
            addr: Ipv6Addr::UNSPECIFIED,
            prefix_len: 128,
            preferred_life: 0,
            valid_life: 0,
            cli_duid: Vec::new(),
            srv_duid: Vec::new(),
            srv_unicast: None,
            aux_opts: Vec::new(),
            acquired_at: Instant::now(),
        }
    }
}

impl DhcpV6Lease {
    /// Build a lease from a server Reply's option set. `xid` should be the
    /// transaction ID of the exchange this Reply concluded.
    pub(crate) fn from_reply(
        xid: [u8; 3],
        options: &[DhcpV6Option],
    ) -> Result<Self, DhcpError> {
        let mut ret = Self {
            xid,
            ..Default::default()
        };
        let mut got_ia = false;
        for opt in options {
            match opt {
                DhcpV6Option::ClientId(v) => ret.cli_duid = v.clone(),
                DhcpV6Option::ServerId(v) => ret.srv_duid = v.clone(),
                DhcpV6Option::IANA(v) => {
                    got_ia = true;
                    ret.ia_type = DhcpV6IaType::NonTemporaryAddresses;
                    ret.iaid = v.iaid;
                    ret.t1 = v.t1_sec;
                    ret.t2 = v.t2_sec;
                    if let Some(status) = v.status.as_ref() {
                        if !status.is_success() {
                            return Err(DhcpError::new(
                                ErrorKind::NoLease,
                                format!(
                                    "IA_NA status {}: {}",
                                    status.status, status.message
                                ),
                            ));
                        }
                    }
                    if let Some(addr) = v.address.as_ref() {
                        ret.addr = addr.address;
                        ret.prefix_len = 128;
                        ret.preferred_life = addr.preferred_time_sec;
                        ret.valid_life = addr.valid_time_sec;
                    }
                }
                DhcpV6Option::IATA(v) => {
                    got_ia = true;
                    ret.ia_type = DhcpV6IaType::TemporaryAddresses;
                    ret.iaid = v.iaid;
                    if let Some(addr) = v.address.as_ref() {
                        ret.addr = addr.address;
                        ret.prefix_len = 128;
                        ret.preferred_life = addr.preferred_time_sec;
                        ret.valid_life = addr.valid_time_sec;
                    }
                }
                DhcpV6Option::IAPD(v) => {
                    got_ia = true;
                    ret.ia_type = DhcpV6IaType::PrefixDelegation;
                    ret.iaid = v.iaid;
                    ret.t1 = v.t1_sec;
                    ret.t2 = v.t2_sec;
                    if let Some(prefix) = v.prefix.as_ref() {
                        ret.addr = prefix.prefix;
                        ret.prefix_len = prefix.prefix_len;
                        ret.preferred_life = prefix.preferred_time_sec;
                        ret.valid_life = prefix.valid_time_sec;
                    }
                }
                DhcpV6Option::StatusCode(v) => {
                    if !v.is_success() {
                        return Err(DhcpError::new(
                            ErrorKind::NoLease,
                            format!(
                                "DHCPv6 server reply status {}: {}",
                                v.status, v.message
                            ),
                        ));
                    }
                }
                DhcpV6Option::Unicast(addr) => ret.srv_unicast = Some(*addr),
                v => {
                    log::trace!("Unused DHCPv6 option in reply: {:?}", v);
                }
            }
        }
        if !got_ia {
            return Err(DhcpError::new(
                ErrorKind::InvalidDhcpServerReply,
                "DHCPv6 Reply carried no IA_NA/IA_TA/IA_PD option".to_string(),
            ));
        }
        ret.aux_opts = options.to_vec();
        Ok(ret)
    }

    /// Build from an Information-request Reply's option set. Unlike
    /// `from_reply`, no IA_NA/IA_TA/IA_PD is expected or required (section
    /// 4.F): the stateless exchange only carries configuration options.
    pub(crate) fn from_info_reply(
        xid: [u8; 3],
        options: &[DhcpV6Option],
    ) -> Result<Self, DhcpError> {
        let mut ret = Self {
            xid,
            ..Default::default()
        };
        for opt in options {
            match opt {
                DhcpV6Option::ClientId(v) => ret.cli_duid = v.clone(),
                DhcpV6Option::ServerId(v) => ret.srv_duid = v.clone(),
                DhcpV6Option::StatusCode(v) => {
                    if !v.is_success() {
                        return Err(DhcpError::new(
                            ErrorKind::NoLease,
                            format!(
                                "DHCPv6 server reply status {}: {}",
                                v.status, v.message
                            ),
                        ));
                    }
                }
                DhcpV6Option::Unicast(addr) => ret.srv_unicast = Some(*addr),
                v => {
                    log::trace!("Unused DHCPv6 option in info reply: {v:?}");
                }
            }
        }
        ret.aux_opts = options.to_vec();
        Ok(ret)
    }

    pub fn get_option(&self, code: DhcpV6OptionCode) -> Option<&DhcpV6Option> {
        self.aux_opts.iter().find(|o| o.code() == code)
    }

    pub fn t1_elapsed(&self) -> std::time::Duration {
        self.acquired_at.elapsed()
    }
}
