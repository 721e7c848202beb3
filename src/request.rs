// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use crate::{
    msg::DhcpV6MessageType,
    retrans::{RetransParams, RetransState},
    state::DhcpV6State,
    DhcpError, DhcpV6Client, DhcpV6Event, DhcpV6Lease, DhcpV6Option,
};

// RFC 8415 section 7.6 Transmission and Retransmission Parameters
const REQ_TIMEOUT: Duration = Duration::from_secs(1);
const REQ_MAX_RT: Duration = Duration::from_secs(30);
const REQ_MAX_RC: u32 = 10;

const PARAMS: RetransParams = RetransParams {
    irt: REQ_TIMEOUT,
    mrt: REQ_MAX_RT,
    mrc: REQ_MAX_RC,
    mrd: Duration::ZERO,
    delay: Duration::ZERO,
};

impl DhcpV6Client {
    /// Commit to the given Advertise (or the server-chosen winner) and send
    /// Request. Per RFC 8415 section 18.2.1, Request may go directly to the
    /// server's unicast address if it offered one; Solicit, Confirm, Rebind
    /// and Information-request are the only exchanges that must stay
    /// multicast.
    pub(crate) fn start_request(
        &mut self,
        candidate: DhcpV6Lease,
    ) -> Result<(), DhcpError> {
        self.state = DhcpV6State::Requesting;
        self.best_advertise = None;
        self.xid = self.next_xid();
        self.pending_srv_unicast = candidate
            .srv_unicast
            .filter(|a| DhcpV6Client::usable_unicast(*a));

        let msg = self.build_message(DhcpV6MessageType::REQUEST, &candidate);

        let mut retrans = RetransState::new(PARAMS, false);
        let rt = retrans.arm_exchange();
        self.retrans = Some(retrans);
        self.trans_msg = Some(msg);

        self.send_current()?;
        self.event_pool.arm_timer(DhcpV6Event::TransmitWait, rt)?;
        Ok(())
    }

    pub(crate) fn on_request_reply(
        &mut self,
        msg_type: DhcpV6MessageType,
        opts: &[DhcpV6Option],
    ) -> Result<Option<DhcpV6Lease>, DhcpError> {
        if msg_type != DhcpV6MessageType::REPLY {
            return Ok(None);
        }
        if self.handle_use_multicast(opts)? {
            return Ok(None);
        }
        match DhcpV6Lease::from_reply(self.xid, opts) {
            Ok(lease) => {
                let lease = self.finalize_lease(lease);
                self.install_lease(lease.clone())?;
                Ok(Some(lease))
            }
            Err(e) => {
                log::warn!(
                    "DHCPv6 {}: Request rejected ({e}), restarting Solicit",
                    self.config.iface_name
                );
                self.start_solicit()?;
                Ok(None)
            }
        }
    }
}
