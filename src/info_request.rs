// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use crate::{
    msg::{DhcpV6Message, DhcpV6MessageType},
    retrans::{RetransParams, RetransState},
    state::DhcpV6State,
    DhcpError, DhcpV6Client, DhcpV6Event, DhcpV6Lease, DhcpV6Option,
};

// RFC 8415 section 7.6. Same shape as Solicit: no server-granted lifetime
// governs this exchange, so it retries forever on the same MRT-bounded
// backoff until a Reply arrives.
const INF_TIMEOUT: Duration = Duration::from_secs(1);
const INF_MAX_RT: Duration = Duration::from_secs(120);

const PARAMS: RetransParams = RetransParams {
    irt: INF_TIMEOUT,
    mrt: INF_MAX_RT,
    mrc: 0,
    mrd: Duration::ZERO,
    delay: Duration::ZERO,
};

impl DhcpV6Client {
    /// Stateless configuration-only exchange (section 4.F); never yields an
    /// address/prefix, only the requested options (DNS, NTP, ...).
    pub(crate) fn start_info_request(&mut self) -> Result<(), DhcpError> {
        self.state = DhcpV6State::InfoRequesting;
        self.pending_srv_unicast = None;
        self.xid = self.next_xid();

        let msg = DhcpV6Message::new(
            &self.config,
            DhcpV6MessageType::INFORMATION_REQUEST,
            self.xid,
            self.iaid,
        );

        let mut retrans = RetransState::new(PARAMS, false);
        let rt = retrans.arm_exchange();
        self.retrans = Some(retrans);
        self.trans_msg = Some(msg);

        self.send_current()?;
        self.event_pool.arm_timer(DhcpV6Event::TransmitWait, rt)?;
        Ok(())
    }

    pub(crate) fn on_info_request_reply(
        &mut self,
        msg_type: DhcpV6MessageType,
        opts: &[DhcpV6Option],
    ) -> Result<Option<DhcpV6Lease>, DhcpError> {
        if msg_type != DhcpV6MessageType::REPLY {
            return Ok(None);
        }
        match DhcpV6Lease::from_info_reply(self.xid, opts) {
            Ok(lease) => {
                self.finish_info_request();
                Ok(Some(lease))
            }
            Err(e) => {
                log::info!(
                    "DHCPv6 {}: ignoring unusable Information-request Reply: \
                     {e}",
                    self.config.iface_name
                );
                Ok(None)
            }
        }
    }
}
