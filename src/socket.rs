// SPDX-License-Identifier: Apache-2.0

use std::net::Ipv6Addr;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use nix::sys::socket::{
    bind, recvfrom, sendto, setsockopt, socket, sockopt, AddressFamily,
    MsgFlags, SockFlag, SockType, SockaddrIn6,
};

use crate::{DhcpError, ErrorKind};

/// RFC 8415 section 7.2.
pub(crate) const CLIENT_PORT: u16 = 546;
/// RFC 8415 section 7.2.
pub(crate) const SERVER_PORT: u16 = 547;

/// RFC 8415: All_DHCP_Relay_Agents_and_Servers
const ALL_DHCP_RELAY_AGENTS_AND_SERVERS: Ipv6Addr =
    Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 1, 2);

/// Non-blocking IPv6 UDP socket bound to the DHCPv6 client port on a single
/// interface (section 4.D). Multicast is the default destination; unicast is
/// only used for Request/Renew/Release/Decline when the held lease carries a
/// Server Unicast option.
#[derive(Debug)]
pub(crate) struct DhcpUdpV6Socket {
    fd: OwnedFd,
    iface_index: u32,
}

impl DhcpUdpV6Socket {
    pub(crate) fn new(
        iface_name: &str,
        iface_index: u32,
        src_ip: Ipv6Addr,
    ) -> Result<Self, DhcpError> {
        log::debug!(
            "Creating UDP socket on [{src_ip}]:{CLIENT_PORT} on interface \
             {iface_name}(index {iface_index})"
        );
        let fd = socket(
            AddressFamily::Inet6,
            SockType::Datagram,
            SockFlag::SOCK_NONBLOCK,
            None,
        )?;
        setsockopt(&fd, sockopt::BindToDevice, &iface_name.into())
            .map_err(|e| {
                DhcpError::new(
                    ErrorKind::IoError,
                    format!(
                        "Failed to bind socket to device {iface_name}: {e}"
                    ),
                )
            })?;
        let so_addr = SockaddrIn6::from(std::net::SocketAddrV6::new(
            src_ip,
            CLIENT_PORT,
            0,
            iface_index,
        ));
        bind(fd.as_raw_fd(), &so_addr)?;
        log::debug!("Finished UDP socket creation");
        Ok(Self { fd, iface_index })
    }

    pub(crate) fn send_multicast(
        &self,
        packet: &[u8],
    ) -> Result<(), DhcpError> {
        log::trace!(
            "Sending DHCPv6 packet multicast to all DHCPv6 servers and \
             relays"
        );
        let dst = SockaddrIn6::from(std::net::SocketAddrV6::new(
            ALL_DHCP_RELAY_AGENTS_AND_SERVERS,
            SERVER_PORT,
            0,
            self.iface_index,
        ));
        self.send_to(packet, &dst, MsgFlags::MSG_DONTROUTE)
    }

    /// Send directly to the lease-granting server. Only valid for
    /// Request/Renew/Release/Decline when the server advertised a Server
    /// Unicast option (section 4.D).
    pub(crate) fn send_unicast(
        &self,
        dst_ip: Ipv6Addr,
        packet: &[u8],
    ) -> Result<(), DhcpError> {
        if dst_ip.is_unspecified()
            || dst_ip.is_multicast()
            || dst_ip.is_loopback()
        {
            return Err(DhcpError::new(
                ErrorKind::InvalidArgument,
                format!("Refusing to unicast DHCPv6 packet to {dst_ip}"),
            ));
        }
        log::trace!("Sending DHCPv6 packet unicast to {dst_ip}");
        let dst = SockaddrIn6::from(std::net::SocketAddrV6::new(
            dst_ip,
            SERVER_PORT,
            0,
            self.iface_index,
        ));
        self.send_to(packet, &dst, MsgFlags::empty())
    }

    fn send_to(
        &self,
        packet: &[u8],
        dst: &SockaddrIn6,
        flags: MsgFlags,
    ) -> Result<(), DhcpError> {
        let mut sent = 0;
        while sent < packet.len() {
            sent += sendto(self.fd.as_raw_fd(), &packet[sent..], dst, flags)?;
        }
        Ok(())
    }

    /// Non-blocking receive. Returns `Ok(None)` when nothing is queued
    /// (EAGAIN/EWOULDBLOCK), which is the expected poll-loop outcome when
    /// the epoll readiness turns out to be stale.
    pub(crate) fn recv(&self) -> Result<Option<Vec<u8>>, DhcpError> {
        let mut buffer = [0u8; 1500];
        match recvfrom::<SockaddrIn6>(self.fd.as_raw_fd(), &mut buffer) {
            Ok((received, _src)) => {
                log::trace!("Received {received} bytes DHCPv6 packet");
                Ok(Some(buffer[..received].to_vec()))
            }
            Err(nix::Error::EAGAIN) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl AsRawFd for DhcpUdpV6Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}
