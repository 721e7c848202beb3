// SPDX-License-Identifier: Apache-2.0

use std::net::Ipv6Addr;
use std::time::Instant;

use crate::buffer::{Buffer, BufferMut};
use crate::{
    DhcpError, DhcpV6Config, DhcpV6Mode, DhcpV6Option, DhcpV6OptionCode,
    DhcpV6OptionIaAddr, DhcpV6OptionIaNa, DhcpV6OptionIaPd,
    DhcpV6OptionIaPrefix, DhcpV6OptionIaTa, DhcpV6OptionUserClass,
    DhcpV6OptionVendorClass, DhcpV6OptionVendorOpts, ErrorContext, ErrorKind,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) struct DhcpV6MessageType(u8);

impl DhcpV6MessageType {
    pub(crate) const SOLICIT: Self = Self(1);
    pub(crate) const ADVERTISE: Self = Self(2);
    pub(crate) const REQUEST: Self = Self(3);
    pub(crate) const CONFIRM: Self = Self(4);
    pub(crate) const RENEW: Self = Self(5);
    pub(crate) const REBIND: Self = Self(6);
    pub(crate) const REPLY: Self = Self(7);
    pub(crate) const RELEASE: Self = Self(8);
    pub(crate) const DECLINE: Self = Self(9);
    pub(crate) const INFORMATION_REQUEST: Self = Self(11);
}

impl Default for DhcpV6MessageType {
    fn default() -> Self {
        Self(0)
    }
}

impl std::fmt::Display for DhcpV6MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match *self {
                Self::SOLICIT => "solicit".to_string(),
                Self::ADVERTISE => "advertise".to_string(),
                Self::REQUEST => "request".to_string(),
                Self::CONFIRM => "confirm".to_string(),
                Self::RENEW => "renew".to_string(),
                Self::REBIND => "rebind".to_string(),
                Self::REPLY => "reply".to_string(),
                Self::RELEASE => "release".to_string(),
                Self::DECLINE => "decline".to_string(),
                Self::INFORMATION_REQUEST => "information-request".to_string(),
                Self(d) => format!("unknown({d})"),
            }
        )
    }
}

impl From<DhcpV6MessageType> for u8 {
    fn from(v: DhcpV6MessageType) -> u8 {
        v.0
    }
}

impl From<u8> for DhcpV6MessageType {
    fn from(v: u8) -> Self {
        Self(v)
    }
}

/// Information about the lease currently held, if any -- echoed back in
/// Request/Renew/Rebind/Release/Decline's IA option per section 4.C.
#[derive(Debug, Clone)]
pub(crate) struct DhcpV6LeaseHint {
    pub(crate) iaid: u32,
    pub(crate) addr: Ipv6Addr,
    pub(crate) prefix_len: u8,
    pub(crate) server_duid: Vec<u8>,
}

/// DHCPv6 message builder/parser (section 4.C). Options are always emitted
/// in the order: Client-ID, Server-ID, Elapsed-Time, IA, ORO, Rapid-Commit,
/// User-Class, Vendor-Class, Vendor-Options, Reconfigure-Accept.
#[derive(Debug, Clone)]
pub(crate) struct DhcpV6Message {
    msg_type: DhcpV6MessageType,
    xid: [u8; 3],
    client_duid: Vec<u8>,
    mode: DhcpV6Mode,
    iaid: u32,
    lease_hint: Option<DhcpV6LeaseHint>,
    request_opts: Vec<DhcpV6OptionCode>,
    elapsed_time: u16,
    rapid_commit: bool,
    user_class: Option<Vec<Vec<u8>>>,
    vendor_class: Option<(u32, Vec<Vec<u8>>)>,
    vendor_opts: Option<(u32, Vec<u8>)>,
    reconfigure_accept: bool,
}

impl DhcpV6Message {
    pub(crate) fn new(
        config: &DhcpV6Config,
        msg_type: DhcpV6MessageType,
        xid: [u8; 3],
        iaid: u32,
    ) -> Self {
        Self {
            msg_type,
            xid,
            client_duid: config.duid.to_vec(),
            mode: config.mode,
            iaid,
            lease_hint: None,
            request_opts: config.request_opts.clone(),
            elapsed_time: 0,
            rapid_commit: false,
            user_class: config.user_class.clone(),
            vendor_class: config.vendor_class.clone(),
            vendor_opts: config.vendor_opts.clone(),
            reconfigure_accept: config.reconfigure_accept,
        }
    }

    pub(crate) fn with_lease_hint(
        mut self,
        hint: DhcpV6LeaseHint,
    ) -> Self {
        self.lease_hint = Some(hint);
        self
    }

    pub(crate) fn with_rapid_commit(mut self, enabled: bool) -> Self {
        self.rapid_commit = enabled;
        self
    }

    pub(crate) fn add_elapsed_time(&mut self, trans_begin_time: Instant) {
        self.elapsed_time =
            match u16::try_from(trans_begin_time.elapsed().as_millis() / 10) {
                Ok(i) => i,
                Err(_) => u16::MAX,
            };
    }

    fn needs_server_id(&self) -> bool {
        matches!(
            self.msg_type,
            DhcpV6MessageType::REQUEST
                | DhcpV6MessageType::RENEW
                | DhcpV6MessageType::RELEASE
                | DhcpV6MessageType::DECLINE
        )
    }

    pub(crate) fn to_dhcp_pkg(&self) -> Result<Vec<u8>, DhcpError> {
        if self.needs_server_id() && self.lease_hint.is_none() {
            return Err(DhcpError::new(
                ErrorKind::InvalidArgument,
                format!(
                    "No DHCPv6 lease hint loaded for a {} message, which \
                     requires Server-ID",
                    self.msg_type
                ),
            ));
        }

        let mut out = BufferMut::new(128);
        out.write_u8(self.msg_type.into());
        out.write_bytes(&self.xid);

        DhcpV6Option::ClientId(self.client_duid.clone()).emit(&mut out);

        if let Some(hint) = self.lease_hint.as_ref() {
            if self.needs_server_id() {
                DhcpV6Option::ServerId(hint.server_duid.clone()).emit(&mut out);
            }
        }

        if self.elapsed_time > 0 || self.msg_type != DhcpV6MessageType::SOLICIT
        {
            DhcpV6Option::ElapsedTime(self.elapsed_time).emit(&mut out);
        }

        if self.msg_type != DhcpV6MessageType::INFORMATION_REQUEST {
            self.build_ia_option().emit(&mut out);
        }

        if !self.request_opts.is_empty() {
            DhcpV6Option::Oro(self.request_opts.clone()).emit(&mut out);
        }

        if self.rapid_commit {
            DhcpV6Option::RapidCommit.emit(&mut out);
        }

        if let Some(classes) = self.user_class.as_ref() {
            DhcpV6Option::UserClass(DhcpV6OptionUserClass {
                data: classes.clone(),
            })
            .emit(&mut out);
        }

        if let Some((enterprise_number, data)) = self.vendor_class.as_ref() {
            DhcpV6Option::VendorClass(DhcpV6OptionVendorClass {
                enterprise_number: *enterprise_number,
                data: data.clone(),
            })
            .emit(&mut out);
        }

        if let Some((enterprise_number, data)) = self.vendor_opts.as_ref() {
            DhcpV6Option::VendorOpts(DhcpV6OptionVendorOpts {
                enterprise_number: *enterprise_number,
                data: data.clone(),
            })
            .emit(&mut out);
        }

        if self.reconfigure_accept {
            DhcpV6Option::ReconfAccept.emit(&mut out);
        }

        Ok(out.data)
    }

    fn build_ia_option(&self) -> DhcpV6Option {
        let (preferred, valid, prefix_len) = self
            .lease_hint
            .as_ref()
            .map(|h| (0u32, 0u32, h.prefix_len))
            .unwrap_or((0, 0, 128));
        let addr = self
            .lease_hint
            .as_ref()
            .map(|h| h.addr)
            .unwrap_or(Ipv6Addr::UNSPECIFIED);
        let have_hint = self.lease_hint.is_some();

        match self.mode {
            DhcpV6Mode::NonTemporaryAddresses => {
                DhcpV6Option::IANA(DhcpV6OptionIaNa {
                    iaid: self.iaid,
                    t1_sec: 0,
                    t2_sec: 0,
                    address: have_hint.then(|| DhcpV6OptionIaAddr {
                        address: addr,
                        preferred_time_sec: preferred,
                        valid_time_sec: valid,
                        status: None,
                    }),
                    status: None,
                })
            }
            DhcpV6Mode::TemporaryAddresses => {
                DhcpV6Option::IATA(DhcpV6OptionIaTa {
                    iaid: self.iaid,
                    address: have_hint.then(|| DhcpV6OptionIaAddr {
                        address: addr,
                        preferred_time_sec: preferred,
                        valid_time_sec: valid,
                        status: None,
                    }),
                    status: None,
                })
            }
            DhcpV6Mode::PrefixDelegation(hint_len) => {
                DhcpV6Option::IAPD(DhcpV6OptionIaPd {
                    iaid: self.iaid,
                    t1_sec: 0,
                    t2_sec: 0,
                    prefix: Some(DhcpV6OptionIaPrefix {
                        preferred_time_sec: preferred,
                        valid_time_sec: valid,
                        prefix_len: if have_hint { prefix_len } else { hint_len },
                        prefix: addr,
                        status: None,
                    }),
                    status: None,
                })
            }
        }
    }

    /// Parse a server reply, validating the transaction ID matches. Per
    /// section 4.C a mismatched xid is silently dropped rather than
    /// surfaced as an error, since on a shared multicast link other
    /// clients' traffic is expected.
    pub(crate) fn from_dhcp_pkg(
        payload: &[u8],
        expected_xid: [u8; 3],
    ) -> Result<Option<(DhcpV6MessageType, Vec<DhcpV6Option>)>, DhcpError> {
        let mut buf = Buffer::new(payload);
        let msg_type: DhcpV6MessageType =
            buf.get_u8().context("Invalid DHCPv6 message type")?.into();
        let xid = buf
            .get_bytes(3)
            .context("Invalid DHCPv6 transaction ID")?;
        let mut xid_arr = [0u8; 3];
        xid_arr.copy_from_slice(xid);
        if xid_arr != expected_xid {
            log::trace!(
                "Dropping DHCPv6 message with mismatched xid {xid_arr:?}, \
                 expected {expected_xid:?}"
            );
            return Ok(None);
        }

        let mut opts = Vec::new();
        while !buf.is_empty() {
            opts.push(DhcpV6Option::parse(&mut buf)?);
        }
        log::debug!("Parsed DHCPv6 {msg_type} message, xid {xid_arr:?}");
        Ok(Some((msg_type, opts)))
    }
}
