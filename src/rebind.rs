// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use crate::{
    msg::DhcpV6MessageType,
    retrans::{RetransParams, RetransState},
    state::DhcpV6State,
    DhcpError, DhcpV6Client, DhcpV6Event, DhcpV6Lease, DhcpV6Option,
    ErrorKind,
};

// RFC 8415 section 7.6 Transmission and Retransmission Parameters. MRD is
// valid_life - T2: once it elapses with no Reply, the lease is unusable and
// the client drops it entirely (section 4.F).
const REB_TIMEOUT: Duration = Duration::from_secs(10);
const REB_MAX_RT: Duration = Duration::from_secs(600);

impl DhcpV6Client {
    pub(crate) fn start_rebind(&mut self) -> Result<(), DhcpError> {
        let lease = self.active_lease.clone().ok_or_else(|| {
            DhcpError::new(
                ErrorKind::Bug,
                "BUG: Rebind fired with no active lease".to_string(),
            )
        })?;
        self.state = DhcpV6State::Rebinding;
        self.xid = self.next_xid();
        // Rebind is always multicast: any server on the link may answer.
        self.pending_srv_unicast = None;

        let mrd = Duration::from_secs(
            lease.valid_life.saturating_sub(lease.t2).into(),
        );
        let msg = self.build_message(DhcpV6MessageType::REBIND, &lease);

        let mut retrans = RetransState::new(
            RetransParams {
                irt: REB_TIMEOUT,
                mrt: REB_MAX_RT,
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

    pub(crate) fn on_rebind_reply(
        &mut self,
        msg_type: DhcpV6MessageType,
        opts: &[DhcpV6Option],
    ) -> Result<Option<DhcpV6Lease>, DhcpError> {
        if msg_type != DhcpV6MessageType::REPLY {
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
                    "DHCPv6 {}: Rebind rejected ({e}), lease dropped",
                    self.config.iface_name
                );
                self.drop_lease();
                Ok(None)
            }
        }
    }
}
