// SPDX-License-Identifier: Apache-2.0

use crate::DhcpV6Lease;

#[derive(Debug, PartialEq, Clone, Eq, Default)]
#[non_exhaustive]
pub enum DhcpV6State {
    /// Freshly created device, nothing sent yet.
    #[default]
    Init,
    /// Sent `Solicit` multicast packet, waiting DHCPv6 server `Advertise`
    /// message or `Reply` message for `OPTION_RAPID_COMMIT`.
    Selecting,
    /// Sent `Request` multicast (or unicast for `OPTION_UNICAST`) packet,
    /// waiting DHCPv6 server `Reply` message.
    Requesting,
    /// Lease acquired, waiting on the T1 timer.
    Bound(Box<DhcpV6Lease>),
    /// Sent `Renew` unicast packet to the lease-granting server, waiting
    /// DHCPv6 server `Reply` message.
    Renewing,
    /// T2 elapsed without a Renew reply; sent `Rebind` multicast packet,
    /// waiting any DHCPv6 server's `Reply` message.
    Rebinding,
    /// Sent `Information-request` multicast packet for stateless mode,
    /// waiting DHCPv6 server `Reply` message.
    InfoRequesting,
    /// Sent `Release`, tearing the device down; no reply is required.
    Releasing,
    /// Sent `Decline` for an address that failed duplicate-address
    /// detection, waiting DHCPv6 server `Reply` message.
    Declining,
    /// Retransmission exhausted (MRC/MRD) with no usable reply; the device
    /// is idle until `restart_all` or reconfiguration.
    Failed,
}

impl std::fmt::Display for DhcpV6State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Selecting => write!(f, "selecting"),
            Self::Requesting => write!(f, "requesting"),
            Self::Bound(lease) => write!(f, "bound({})", lease.addr),
            Self::Renewing => write!(f, "renewing"),
            Self::Rebinding => write!(f, "rebinding"),
            Self::InfoRequesting => write!(f, "info_requesting"),
            Self::Releasing => write!(f, "releasing"),
            Self::Declining => write!(f, "declining"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl DhcpV6State {
    pub fn is_bound(&self) -> bool {
        matches!(self, DhcpV6State::Bound(_))
    }

    pub fn is_done(&self) -> bool {
        self.is_bound()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DhcpV6State::Failed)
    }
}
