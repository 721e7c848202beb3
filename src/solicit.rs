// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use crate::{
    msg::{DhcpV6Message, DhcpV6MessageType},
    retrans::{RetransParams, RetransState},
    state::DhcpV6State,
    DhcpError, DhcpV6Client, DhcpV6Event, DhcpV6Lease, DhcpV6Option,
};

// RFC 8415 section 7.6 Transmission and Retransmission Parameters
const SOL_TIMEOUT: Duration = Duration::from_secs(1);
const SOL_MAX_RT: Duration = Duration::from_secs(120);
// RFC 8415 section 18.2.1: delay the very first Solicit by a random amount
// up to SOL_MAX_DELAY to avoid synchronized bursts from clients booting
// together.
const SOL_MAX_DELAY: Duration = Duration::from_secs(1);

const PARAMS: RetransParams = RetransParams {
    irt: SOL_TIMEOUT,
    mrt: SOL_MAX_RT,
    mrc: 0,
    mrd: Duration::ZERO,
    delay: SOL_MAX_DELAY,
};

impl DhcpV6Client {
    /// Build and send the first Solicit of a new acquisition (section
    /// 4.F). The very first transmission waits out a random initial delay
    /// (`arm_initial_delay`, RFC 8415 section 18.2.1) before drawing its
    /// strictly-positive jitter per RFC 3315 section 17.1.2.
    pub(crate) fn start_solicit(&mut self) -> Result<(), DhcpError> {
        self.state = DhcpV6State::Selecting;
        self.best_advertise = None;
        self.active_lease = None;
        self.pending_srv_unicast = None;
        self.xid = self.next_xid();

        let msg = DhcpV6Message::new(
            &self.config,
            DhcpV6MessageType::SOLICIT,
            self.xid,
            self.iaid,
        )
        .with_rapid_commit(self.config.rapid_commit);

        let mut retrans = RetransState::new(PARAMS, true);
        self.trans_msg = Some(msg);

        if let Some(delay) = retrans.arm_initial_delay() {
            self.retrans = Some(retrans);
            self.event_pool.arm_timer(DhcpV6Event::TransmitWait, delay)?;
        } else {
            let rt = retrans.arm_exchange();
            self.retrans = Some(retrans);
            self.send_current()?;
            self.event_pool.arm_timer(DhcpV6Event::TransmitWait, rt)?;
        }
        Ok(())
    }

    pub(crate) fn on_advertise_or_rapid_reply(
        &mut self,
        msg_type: DhcpV6MessageType,
        opts: &[DhcpV6Option],
    ) -> Result<Option<DhcpV6Lease>, DhcpError> {
        if msg_type == DhcpV6MessageType::REPLY {
            // Rapid-commit path: the server committed a lease directly.
            return match DhcpV6Lease::from_reply(self.xid, opts) {
                Ok(lease) => {
                    let lease = self.finalize_lease(lease);
                    self.install_lease(lease.clone())?;
                    Ok(Some(lease))
                }
                Err(e) => {
                    log::warn!(
                        "DHCPv6 {}: rapid-commit Reply rejected: {e}",
                        self.config.iface_name
                    );
                    Ok(None)
                }
            };
        }
        if msg_type != DhcpV6MessageType::ADVERTISE {
            return Ok(None);
        }

        let preference = opts
            .iter()
            .find_map(|o| match o {
                DhcpV6Option::Preference(p) => Some(*p),
                _ => None,
            })
            .unwrap_or(0);

        let candidate = match DhcpV6Lease::from_reply(self.xid, opts) {
            Ok(lease) => lease,
            Err(e) => {
                log::info!(
                    "DHCPv6 {}: ignoring unusable Advertise: {e}",
                    self.config.iface_name
                );
                return Ok(None);
            }
        };

        if preference == 255 {
            log::debug!(
                "DHCPv6 {}: Advertise with preference 255, committing now",
                self.config.iface_name
            );
            self.start_request(candidate)?;
            return Ok(None);
        }

        let keep = match &self.best_advertise {
            Some((best_pref, _)) => preference > *best_pref,
            None => true,
        };
        if keep {
            self.best_advertise = Some((preference, candidate));
        }
        Ok(None)
    }

    pub(crate) fn next_xid(&self) -> [u8; 3] {
        let mut xid = [0u8; 3];
        xid.copy_from_slice(&rand::random::<u32>().to_le_bytes()[..3]);
        xid
    }
}
