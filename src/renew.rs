// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use crate::{
    msg::DhcpV6MessageType,
    retrans::{RetransParams, RetransState},
    state::DhcpV6State,
    DhcpError, DhcpV6Client, DhcpV6Event, DhcpV6Lease, DhcpV6Option,
    ErrorKind,
};

// RFC 8415 section 7.6 Transmission and Retransmission Parameters.
// MRD is T2 - T1, computed fresh from the bound lease each time Renew
// starts, since the event pool can only arm one timer (section 5): the
// Renew-to-Rebind transition is driven by this MRD expiring, not by a
// second timer.
const REN_TIMEOUT: Duration = Duration::from_secs(10);
const REN_MAX_RT: Duration = Duration::from_secs(600);

impl DhcpV6Client {
    pub(crate) fn start_renew(&mut self) -> Result<(), DhcpError> {
        let lease = self.active_lease.clone().ok_or_else(|| {
            DhcpError::new(
                ErrorKind::Bug,
                "BUG: Renew fired with no active lease".to_string(),
            )
        })?;
        self.state = DhcpV6State::Renewing;
        self.xid = self.next_xid();
        self.pending_srv_unicast = lease
            .srv_unicast
            .filter(|a| DhcpV6Client::usable_unicast(*a));

        let mrd = Duration::from_secs(
            lease.t2.saturating_sub(lease.t1).into(),
        );
        let msg = self.build_message(DhcpV6MessageType::RENEW, &lease);

        let mut retrans = RetransState::new(
            RetransParams {
                irt: REN_TIMEOUT,
                mrt: REN_MAX_RT,
                mrc: 0,
                mrd,
                delay: Duration::ZERO,
            },
            false,
        );
        let rt = retrans.arm_exchange();
        self.retrans = Some(retrans);
        self.trans_msg = Some(msg);

        self.send_current()?;
        self.event_pool.arm_timer(DhcpV6Event::TransmitWait, rt)?;
        Ok(())
    }

    pub(crate) fn on_renew_reply(
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
                    "DHCPv6 {}: Renew rejected ({e}), moving to Rebind",
                    self.config.iface_name
                );
                self.start_rebind()?;
                Ok(None)
            }
        }
    }
}
