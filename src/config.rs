// SPDX-License-Identifier: Apache-2.0

use std::net::Ipv6Addr;
use std::sync::Arc;

use crate::{
    DhcpError, DhcpV6Duid, DhcpV6OptionCode, ErrorKind, ETH_ALEN,
};

#[cfg(feature = "netlink")]
use crate::netlink::resolve_iface_sync;

#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash, Default)]
#[non_exhaustive]
pub enum DhcpV6IaType {
    #[default]
    NonTemporaryAddresses,
    TemporaryAddresses,
    PrefixDelegation,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash, Default)]
#[non_exhaustive]
pub enum DhcpV6Mode {
    #[default]
    NonTemporaryAddresses,
    TemporaryAddresses,
    /// Request prefix delegation with the given prefix length as a hint;
    /// the server may reply with a shorter prefix.
    PrefixDelegation(u8),
}

impl std::fmt::Display for DhcpV6Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonTemporaryAddresses => {
                write!(f, "Non-temporary Addresses(IA_NA)")
            }
            Self::TemporaryAddresses => write!(f, "Temporary Addresses(IA_TA)"),
            Self::PrefixDelegation(d) => {
                write!(f, "Prefix Delegation(IA_PD)-{d}")
            }
        }
    }
}

/// Per-device configuration (section 3). Everything a `DhcpV6Client`
/// instance needs to run one interface's exchange.
#[derive(Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub struct DhcpV6Config {
    pub iface_name: String,
    pub iface_index: u32,
    pub duid: DhcpV6Duid,
    pub mode: DhcpV6Mode,
    pub src_ip: Ipv6Addr,
    pub(crate) src_mac: Option<[u8; ETH_ALEN]>,
    /// Timeout in seconds for getting/refreshing a lease. 0 means wait
    /// indefinitely.
    pub timeout_sec: u32,
    pub request_opts: Vec<DhcpV6OptionCode>,
    /// Explicit DUID hex string to prefer over any other source, if set
    /// (section 4.A resolution order).
    pub duid_hex: Option<String>,
    /// Ask the server to commit a lease directly from the Solicit/Reply
    /// exchange, skipping Advertise/Request.
    pub rapid_commit: bool,
    pub user_class: Option<Vec<Vec<u8>>>,
    pub vendor_class: Option<(u32, Vec<Vec<u8>>)>,
    pub vendor_opts: Option<(u32, Vec<u8>)>,
    pub reconfigure_accept: bool,
    /// Run the stateless Information-request exchange instead of acquiring
    /// an address/prefix lease (section 4.F).
    pub info_only: bool,
}

impl Default for DhcpV6Config {
    fn default() -> Self {
        Self {
            iface_name: String::new(),
            iface_index: 0,
            duid: DhcpV6Duid::Raw(Vec::new()),
            mode: DhcpV6Mode::default(),
            src_ip: Ipv6Addr::UNSPECIFIED,
            src_mac: None,
            timeout_sec: 0,
            request_opts: vec![
                DhcpV6OptionCode::ORO,
                DhcpV6OptionCode::Preference,
                DhcpV6OptionCode::DomainNameServers,
                DhcpV6OptionCode::DomainSearchList,
                DhcpV6OptionCode::NtpServer,
            ],
            duid_hex: None,
            rapid_commit: false,
            user_class: None,
            vendor_class: None,
            vendor_opts: None,
            reconfigure_accept: false,
            info_only: false,
        }
    }
}

impl DhcpV6Config {
    pub fn new(iface_name: &str, mode: DhcpV6Mode) -> Self {
        Self {
            iface_name: iface_name.to_string(),
            mode,
            ..Default::default()
        }
    }

    pub(crate) fn need_resolve(&self) -> bool {
        self.iface_index == 0 || self.src_ip.is_unspecified()
    }

    /// Resolve interface index, MAC address, link-local address and DUID.
    /// Runs the netlink lookups on a background thread (see
    /// `netlink::resolve_iface_sync`) so this stays synchronous.
    #[cfg(feature = "netlink")]
    pub(crate) fn resolve(
        &mut self,
        global: &DhcpV6GlobalConfig,
    ) -> Result<(), DhcpError> {
        let (iface_index, mac, link_local) =
            resolve_iface_sync(&self.iface_name)?;
        self.iface_index = iface_index;
        if let Some(mac) = mac.as_ref() {
            if mac.len() == ETH_ALEN {
                let mut tmp = [0u8; ETH_ALEN];
                tmp.copy_from_slice(&mac[..ETH_ALEN]);
                self.src_mac = Some(tmp);
            }
        }
        self.src_ip = link_local;
        self.duid = DhcpV6Duid::resolve(
            self.duid_hex.as_deref(),
            global.default_duid.as_ref(),
            mac.as_deref(),
        )?;
        Ok(())
    }

    #[cfg(not(feature = "netlink"))]
    pub(crate) fn resolve(
        &mut self,
        _global: &DhcpV6GlobalConfig,
    ) -> Result<(), DhcpError> {
        Err(DhcpError::new(
            ErrorKind::NotSupported,
            "Automatic interface resolution requires the \"netlink\" \
             feature; set iface_index/src_ip explicitly instead"
                .to_string(),
        ))
    }

    pub fn set_iface_index(&mut self, iface_index: u32) -> &mut Self {
        self.iface_index = iface_index;
        self
    }

    pub fn set_link_local_ip(&mut self, addr: Ipv6Addr) -> &mut Self {
        self.src_ip = addr;
        self
    }

    pub fn set_duid(&mut self, duid: DhcpV6Duid) -> &mut Self {
        self.duid = duid;
        self
    }

    pub fn set_duid_hex(&mut self, hex: &str) -> &mut Self {
        self.duid_hex = Some(hex.to_string());
        self
    }

    /// Timeout in seconds for getting/refreshing a lease. 0 means wait
    /// indefinitely.
    pub fn set_timeout_sec(&mut self, timeout_sec: u32) -> &mut Self {
        self.timeout_sec = timeout_sec;
        self
    }

    pub fn request_extra_dhcp_opts(&mut self, opts: &[u16]) -> &mut Self {
        for opt in opts {
            self.request_opts.push((*opt).into());
        }
        self.request_opts.sort_unstable();
        self.request_opts.dedup();
        self
    }

    /// Specify arbitrary DHCP options to request, replacing the defaults.
    pub fn override_request_dhcp_opts(&mut self, opts: &[u16]) -> &mut Self {
        self.request_opts =
            opts.iter().map(|c| DhcpV6OptionCode::from(*c)).collect();
        self.request_opts.sort_unstable();
        self.request_opts.dedup();
        self
    }

    pub fn set_rapid_commit(&mut self, enabled: bool) -> &mut Self {
        self.rapid_commit = enabled;
        self
    }

    pub fn set_user_class(&mut self, classes: Vec<Vec<u8>>) -> &mut Self {
        self.user_class = Some(classes);
        self
    }

    pub fn set_vendor_class(
        &mut self,
        enterprise_number: u32,
        data: Vec<Vec<u8>>,
    ) -> &mut Self {
        self.vendor_class = Some((enterprise_number, data));
        self
    }

    pub fn set_vendor_opts(
        &mut self,
        enterprise_number: u32,
        data: Vec<u8>,
    ) -> &mut Self {
        self.vendor_opts = Some((enterprise_number, data));
        self
    }

    pub fn set_reconfigure_accept(&mut self, enabled: bool) -> &mut Self {
        self.reconfigure_accept = enabled;
        self
    }

    /// Run the stateless Information-request exchange instead of acquiring
    /// an address/prefix lease.
    pub fn set_info_only(&mut self, enabled: bool) -> &mut Self {
        self.info_only = enabled;
        self
    }
}

/// Read-only global view shared by every device (section 4.H). Reconfigured
/// atomically by swapping the `Arc` held by the registry; a device consults
/// its snapshot only at the start of a new exchange (section 5).
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct DhcpV6GlobalConfig {
    /// Fallback DUID used when a device's own config has neither an
    /// explicit hex DUID nor a persisted one.
    pub default_duid: Option<DhcpV6Duid>,
    /// Servers whose Advertise/Reply this client must silently discard.
    pub ignore_servers: Vec<Ipv6Addr>,
    /// Servers preferred over others of equal Preference-option value.
    pub preferred_servers: Vec<Ipv6Addr>,
    pub default_user_class: Option<Vec<Vec<u8>>>,
    pub default_vendor_class: Option<(u32, Vec<Vec<u8>>)>,
    pub default_vendor_opts: Option<(u32, Vec<u8>)>,
    /// Upper bound applied to any server-granted valid lifetime, 0 means
    /// unbounded.
    pub max_lease_sec: u32,
}

impl DhcpV6GlobalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}
