// SPDX-License-Identifier: Apache-2.0

mod buffer;
mod client;
mod client_async;
mod config;
mod duid;
mod error;
mod event;
mod info_request;
mod lease;
mod msg;
#[cfg(feature = "netlink")]
mod netlink;
mod option;
mod option_ia;
mod option_status;
mod rebind;
mod registry;
mod renew;
mod request;
mod retrans;
mod socket;
mod solicit;
mod state;
mod time;

#[cfg(test)]
mod integ_tests;

pub(crate) const ETH_ALEN: usize = 6;

pub use crate::client::DhcpV6Client;
pub use crate::client_async::DhcpV6ClientAsync;
pub use crate::config::{DhcpV6Config, DhcpV6GlobalConfig, DhcpV6IaType, DhcpV6Mode};
pub use crate::duid::{
    DhcpV6Duid, DhcpV6DuidEnterpriseNumber, DhcpV6DuidLinkLayerAddr,
    DhcpV6DuidLinkLayerAddrPlusTime, DhcpV6DuidUuid,
};
pub use crate::error::{DhcpError, ErrorKind};
pub(crate) use crate::error::ErrorContext;
pub use crate::event::DhcpV6Event;
pub use crate::lease::DhcpV6Lease;
pub use crate::option::{
    DhcpV6Option, DhcpV6OptionCode, DhcpV6OptionUnknown, DhcpV6OptionUserClass,
    DhcpV6OptionVendorClass, DhcpV6OptionVendorOpts,
};
pub use crate::option_ia::{
    DhcpV6OptionIaAddr, DhcpV6OptionIaNa, DhcpV6OptionIaPd,
    DhcpV6OptionIaPrefix, DhcpV6OptionIaTa,
};
pub use crate::option_status::{DhcpV6OptionStatus, DhcpV6OptionStatusCode};
pub use crate::registry::{DeviceContext, DhcpV6Registry};
pub use crate::state::DhcpV6State;
