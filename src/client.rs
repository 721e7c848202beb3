// SPDX-License-Identifier: Apache-2.0

use std::net::Ipv6Addr;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::{
    event::DhcpEventPool,
    msg::{DhcpV6LeaseHint, DhcpV6Message, DhcpV6MessageType},
    retrans::RetransState,
    socket::DhcpUdpV6Socket,
    state::DhcpV6State,
    DhcpError, DhcpV6Config, DhcpV6Event, DhcpV6GlobalConfig, DhcpV6Lease,
    DhcpV6Option, DhcpV6OptionStatus, DhcpV6OptionStatusCode, ErrorKind,
};

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a over the interface name, combined with the interface index so two
/// devices sharing a name prefix (or a renamed/re-indexed device) still get
/// distinct IAIDs.
pub(crate) fn hash32(s: &str) -> u32 {
    let mut hash = FNV_OFFSET;
    for b in s.as_bytes() {
        hash ^= u32::from(*b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

pub(crate) fn status_of(opts: &[DhcpV6Option]) -> Option<&DhcpV6OptionStatus> {
    opts.iter().find_map(|o| match o {
        DhcpV6Option::StatusCode(s) => Some(s),
        _ => None,
    })
}

/// A single device's DHCPv6 client: one epoll instance driving one UDP
/// socket and the single retransmission timer permitted at any moment
/// (section 5). The FSM states are `DhcpV6State`; each state's
/// retransmission parameters live in its own module (`solicit`, `request`,
/// `renew`, `rebind`).
#[derive(Debug)]
#[non_exhaustive]
pub struct DhcpV6Client {
    pub(crate) config: DhcpV6Config,
    pub(crate) global: Arc<DhcpV6GlobalConfig>,
    pub(crate) state: DhcpV6State,
    pub(crate) event_pool: DhcpEventPool,
    udp_socket: Option<DhcpUdpV6Socket>,
    pub(crate) xid: [u8; 3],
    pub(crate) iaid: u32,
    pub(crate) retrans: Option<RetransState>,
    pub(crate) trans_msg: Option<DhcpV6Message>,
    pub(crate) best_advertise: Option<(u8, DhcpV6Lease)>,
    /// The lease being renewed/rebound. `DhcpV6State::Renewing`/`Rebinding`
    /// carry no payload of their own, so this is what `start_rebind` and the
    /// reply handlers fall back to once the state has moved out of `Bound`.
    pub(crate) active_lease: Option<DhcpV6Lease>,
    /// Set after a server replies `UseMulticast` to a unicast exchange;
    /// forces the next send back to multicast (section 4.F).
    force_multicast: bool,
    /// Server unicast address to use for the exchange currently staged in
    /// `trans_msg`, when the message type and lease both allow it.
    pub(crate) pending_srv_unicast: Option<Ipv6Addr>,
    acquire_deadline: Option<Instant>,
}

impl AsRawFd for DhcpV6Client {
    fn as_raw_fd(&self) -> RawFd {
        self.event_pool.as_raw_fd()
    }
}

impl DhcpV6Client {
    pub fn init(
        config: DhcpV6Config,
        lease: Option<DhcpV6Lease>,
    ) -> Result<Self, DhcpError> {
        Self::init_with_global(
            config,
            lease,
            Arc::new(DhcpV6GlobalConfig::default()),
        )
    }

    pub(crate) fn init_with_global(
        mut config: DhcpV6Config,
        lease: Option<DhcpV6Lease>,
        global: Arc<DhcpV6GlobalConfig>,
    ) -> Result<Self, DhcpError> {
        if config.need_resolve() {
            config.resolve(&global)?;
        }
        let iaid = hash32(&config.iface_name) ^ config.iface_index;
        let mut xid = [0u8; 3];
        xid.copy_from_slice(&rand::rng().random::<u32>().to_le_bytes()[..3]);

        let mut ret = Self {
            config,
            global,
            state: DhcpV6State::Init,
            event_pool: DhcpEventPool::new()?,
            udp_socket: None,
            xid,
            iaid,
            retrans: None,
            trans_msg: None,
            best_advertise: None,
            active_lease: None,
            force_multicast: false,
            pending_srv_unicast: None,
            acquire_deadline: None,
        };

        if let Some(lease) = lease {
            ret.install_lease(lease)?;
        } else if ret.config.info_only {
            ret.arm_acquire_deadline();
            ret.start_info_request()?;
        } else {
            ret.arm_acquire_deadline();
            ret.start_solicit()?;
        }
        Ok(ret)
    }

    pub fn state(&self) -> &DhcpV6State {
        &self.state
    }

    pub fn poll(&mut self, wait_ms: u32) -> Result<Vec<DhcpV6Event>, DhcpError> {
        self.event_pool.poll(wait_ms)
    }

    pub fn process(
        &mut self,
        event: DhcpV6Event,
    ) -> Result<Option<DhcpV6Lease>, DhcpError> {
        log::debug!(
            "DHCPv6 {}: processing {event} in state {}",
            self.config.iface_name,
            self.state
        );
        match event {
            DhcpV6Event::TransmitWait => self.on_transmit_wait(),
            DhcpV6Event::UdpPackageIn => self.on_udp_package_in(),
            DhcpV6Event::Renew => {
                self.start_renew()?;
                Ok(None)
            }
            other => Err(DhcpError::new(
                ErrorKind::Bug,
                format!(
                    "BUG: unexpected DHCPv6 event {other} in state {}",
                    self.state
                ),
            )),
        }
    }

    /// Sends once and tears the device down immediately; RFC 8415 only
    /// requires best-effort delivery for Release. To request a new lease,
    /// create a new `DhcpV6Client`.
    pub fn release(&mut self, lease: &DhcpV6Lease) -> Result<(), DhcpError> {
        self.state = DhcpV6State::Releasing;
        let msg = self.build_message(DhcpV6MessageType::RELEASE, lease);
        self.ensure_socket()?;
        let pkg = msg.to_dhcp_pkg()?;
        self.send_pkg(&pkg, lease.srv_unicast)?;
        self.teardown();
        Ok(())
    }

    /// Sends once, reporting the address as unusable (failed duplicate
    /// address detection) and tearing the device down (section 4.F).
    pub fn decline(
        &mut self,
        lease: &DhcpV6Lease,
        bad_addr: Ipv6Addr,
    ) -> Result<(), DhcpError> {
        let mut lease = lease.clone();
        lease.addr = bad_addr;
        self.state = DhcpV6State::Declining;
        let msg = self.build_message(DhcpV6MessageType::DECLINE, &lease);
        self.ensure_socket()?;
        let pkg = msg.to_dhcp_pkg()?;
        self.send_pkg(&pkg, lease.srv_unicast)?;
        self.teardown();
        Ok(())
    }

    /// Tear the device down after a completed Information-request: no
    /// lease to bind, so the device returns to `Init` rather than `Bound`.
    pub(crate) fn finish_info_request(&mut self) {
        self.teardown();
        self.acquire_deadline = None;
        self.state = DhcpV6State::Init;
    }

    /// Rebind exhausted its MRD/MRC or was rejected with a fatal Reply: the
    /// lease is unrecoverable. Tears down and returns to `Init`; a fresh
    /// acquisition only ever starts from a new `DhcpV6Client::init()` call,
    /// never automatically from here.
    pub(crate) fn drop_lease(&mut self) {
        self.teardown();
        self.acquire_deadline = None;
        self.active_lease = None;
        self.state = DhcpV6State::Init;
    }

    fn teardown(&mut self) {
        let _ = self.close_socket();
        let _ = self.event_pool.disarm_timer();
        self.retrans = None;
        self.trans_msg = None;
        self.best_advertise = None;
        self.pending_srv_unicast = None;
    }

    /// Whether `addr` is usable as a direct unicast destination: not the
    /// unspecified, loopback, or multicast range (RFC 8415 section 21.12).
    pub(crate) fn usable_unicast(addr: Ipv6Addr) -> bool {
        !addr.is_unspecified() && !addr.is_loopback() && !addr.is_multicast()
    }

    fn arm_acquire_deadline(&mut self) {
        if self.config.timeout_sec != 0 {
            self.acquire_deadline = Some(
                Instant::now()
                    + Duration::from_secs(self.config.timeout_sec.into()),
            );
        }
    }

    fn acquire_timed_out(&self) -> bool {
        matches!(self.acquire_deadline, Some(d) if Instant::now() >= d)
    }

    fn fail(&mut self, msg: &str) {
        log::warn!("DHCPv6 {}: {msg}", self.config.iface_name);
        self.teardown();
        self.state = DhcpV6State::Failed;
    }

    pub(crate) fn ensure_socket(&mut self) -> Result<(), DhcpError> {
        if self.udp_socket.is_none() {
            let socket = DhcpUdpV6Socket::new(
                &self.config.iface_name,
                self.config.iface_index,
                self.config.src_ip,
            )?;
            self.event_pool.set_socket(socket.as_raw_fd())?;
            self.udp_socket = Some(socket);
        }
        Ok(())
    }

    fn close_socket(&mut self) -> Result<(), DhcpError> {
        self.event_pool.unset_socket()?;
        self.udp_socket = None;
        Ok(())
    }

    fn send_pkg(
        &self,
        pkg: &[u8],
        srv_unicast: Option<Ipv6Addr>,
    ) -> Result<(), DhcpError> {
        let socket = self.udp_socket.as_ref().ok_or_else(|| {
            DhcpError::new(
                ErrorKind::Bug,
                "BUG: no UDP socket to send DHCPv6 packet".to_string(),
            )
        })?;
        match srv_unicast {
            Some(addr) if !self.force_multicast => socket.send_unicast(addr, pkg),
            _ => socket.send_multicast(pkg),
        }
    }

    /// Sends the exchange's current outgoing message, whatever phase built
    /// it into `self.trans_msg`.
    pub(crate) fn send_current(&mut self) -> Result<(), DhcpError> {
        self.ensure_socket()?;
        let retrans = self.retrans.as_ref().ok_or_else(|| {
            DhcpError::new(
                ErrorKind::Bug,
                "BUG: no retransmission state armed".to_string(),
            )
        })?;
        let start = retrans.start();
        let srv_unicast = self.pending_srv_unicast;
        let msg = self.trans_msg.as_mut().ok_or_else(|| {
            DhcpError::new(
                ErrorKind::Bug,
                "BUG: no DHCPv6 message staged for transmission".to_string(),
            )
        })?;
        if retrans.transmit_count() > 1 {
            msg.add_elapsed_time(start);
        }
        let pkg = msg.to_dhcp_pkg()?;
        self.send_pkg(&pkg, srv_unicast)
    }

    pub(crate) fn build_message(
        &self,
        msg_type: DhcpV6MessageType,
        lease: &DhcpV6Lease,
    ) -> DhcpV6Message {
        DhcpV6Message::new(&self.config, msg_type, self.xid, self.iaid)
            .with_lease_hint(DhcpV6LeaseHint {
                iaid: lease.iaid,
                addr: lease.addr,
                prefix_len: lease.prefix_len,
                server_duid: lease.srv_duid.clone(),
            })
    }

    fn on_transmit_wait(&mut self) -> Result<Option<DhcpV6Lease>, DhcpError> {
        match self.state {
            DhcpV6State::Selecting => {
                if let Some((_, lease)) = self.best_advertise.take() {
                    self.start_request(lease)?;
                    return Ok(None);
                }
                if self
                    .retrans
                    .as_ref()
                    .map(RetransState::is_initial)
                    .unwrap_or(false)
                {
                    // The initial delay just elapsed: send the first
                    // Solicit now and arm the real retransmission timer.
                    let rt = self
                        .retrans
                        .as_mut()
                        .expect("checked above")
                        .arm_exchange();
                    self.send_current()?;
                    self.event_pool
                        .arm_timer(DhcpV6Event::TransmitWait, rt)?;
                    return Ok(None);
                }
                self.retransmit_or(|c| {
                    c.fail("Solicit exhausted MRT with no usable Advertise");
                })
            }
            DhcpV6State::Requesting => self.retransmit_or(|c| {
                log::warn!(
                    "DHCPv6 {}: Request failed, restarting Solicit",
                    c.config.iface_name
                );
                if let Err(e) = c.start_solicit() {
                    c.fail(&format!("failed to restart Solicit: {e}"));
                }
            }),
            DhcpV6State::Renewing => self.retransmit_or(|c| {
                log::info!(
                    "DHCPv6 {}: Renew window elapsed, moving to Rebind",
                    c.config.iface_name
                );
                if let Err(e) = c.start_rebind() {
                    c.fail(&format!("failed to start Rebind: {e}"));
                }
            }),
            DhcpV6State::Rebinding => self.retransmit_or(|c| {
                log::warn!(
                    "DHCPv6 {}: Rebind window elapsed, lease dropped",
                    c.config.iface_name
                );
                c.drop_lease();
            }),
            DhcpV6State::InfoRequesting => {
                self.retransmit_or(|c| {
                    c.fail("Information-request exhausted MRT");
                })
            }
            ref other => Err(DhcpError::new(
                ErrorKind::Bug,
                format!("BUG: TransmitWait fired in state {other}"),
            )),
        }
    }

    fn retransmit_or(
        &mut self,
        on_expired: impl FnOnce(&mut Self),
    ) -> Result<Option<DhcpV6Lease>, DhcpError> {
        if self.acquire_timed_out() {
            self.fail("acquisition timed out");
            return Ok(None);
        }
        let advance = self
            .retrans
            .as_mut()
            .ok_or_else(|| {
                DhcpError::new(
                    ErrorKind::Bug,
                    "BUG: TransmitWait with no retransmission state"
                        .to_string(),
                )
            })?
            .advance_or_expire();
        match advance {
            crate::retrans::Advance::Transmit(wait) => {
                self.send_current()?;
                self.event_pool.arm_timer(DhcpV6Event::TransmitWait, wait)?;
            }
            crate::retrans::Advance::Expired => {
                on_expired(self);
            }
        }
        Ok(None)
    }

    fn on_udp_package_in(&mut self) -> Result<Option<DhcpV6Lease>, DhcpError> {
        loop {
            let payload = match self.udp_socket.as_ref() {
                Some(s) => s.recv()?,
                None => return Ok(None),
            };
            let Some(payload) = payload else {
                return Ok(None);
            };
            let Some((msg_type, opts)) =
                DhcpV6Message::from_dhcp_pkg(&payload, self.xid)?
            else {
                continue;
            };
            if let Some(lease) = self.dispatch_reply(msg_type, &opts)? {
                return Ok(Some(lease));
            }
        }
    }

    fn dispatch_reply(
        &mut self,
        msg_type: DhcpV6MessageType,
        opts: &[DhcpV6Option],
    ) -> Result<Option<DhcpV6Lease>, DhcpError> {
        match self.state {
            DhcpV6State::Selecting => {
                self.on_advertise_or_rapid_reply(msg_type, opts)
            }
            DhcpV6State::Requesting => self.on_request_reply(msg_type, opts),
            DhcpV6State::Renewing => self.on_renew_reply(msg_type, opts),
            DhcpV6State::Rebinding => self.on_rebind_reply(msg_type, opts),
            DhcpV6State::InfoRequesting => {
                self.on_info_request_reply(msg_type, opts)
            }
            _ => {
                log::trace!(
                    "DHCPv6 {}: dropping unexpected {msg_type} in state {}",
                    self.config.iface_name,
                    self.state
                );
                Ok(None)
            }
        }
    }

    /// Honors the `UseMulticast` escape hatch: a server refusing a unicast
    /// exchange forces us back to multicast and we resend immediately
    /// without treating it as a full retransmission failure.
    pub(crate) fn handle_use_multicast(
        &mut self,
        opts: &[DhcpV6Option],
    ) -> Result<bool, DhcpError> {
        if let Some(status) = status_of(opts) {
            if status.status == DhcpV6OptionStatusCode::UseMulticast {
                log::info!(
                    "DHCPv6 {}: server requested multicast, retrying",
                    self.config.iface_name
                );
                self.force_multicast = true;
                self.send_current()?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub(crate) fn finalize_lease(&self, mut lease: DhcpV6Lease) -> DhcpV6Lease {
        if lease.t1 == 0 && lease.t2 == 0 {
            lease.t1 = (u64::from(lease.preferred_life) / 2) as u32;
            lease.t2 = (u64::from(lease.preferred_life) * 8 / 10) as u32;
        }
        if self.global.max_lease_sec != 0 {
            lease.valid_life = lease.valid_life.min(self.global.max_lease_sec);
            lease.preferred_life =
                lease.preferred_life.min(lease.valid_life);
        }
        lease
    }

    pub(crate) fn install_lease(
        &mut self,
        lease: DhcpV6Lease,
    ) -> Result<(), DhcpError> {
        self.teardown();
        self.acquire_deadline = None;
        self.force_multicast = false;
        let t1 = Duration::from_secs(lease.t1.into());
        let wait = t1.saturating_sub(lease.t1_elapsed());
        self.event_pool.arm_timer(DhcpV6Event::Renew, wait)?;
        log::info!(
            "DHCPv6 {}: bound {}/{}, Renew in {wait:?}",
            self.config.iface_name,
            lease.addr,
            lease.prefix_len
        );
        self.active_lease = Some(lease.clone());
        self.state = DhcpV6State::Bound(Box::new(lease));
        Ok(())
    }
}
