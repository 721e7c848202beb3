// SPDX-License-Identifier: Apache-2.0

use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
use std::time::Duration;

use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags};

use crate::{time::DhcpTimerFd, DhcpError, ErrorKind};

/// Events a device's single epoll instance can report. Per SPEC_FULL section
/// 5 there is at most one armed timer at any moment, so `TransmitWait`
/// covers both "initial delay elapsed" and "retransmit deadline elapsed" --
/// the FSM tells them apart from its own phase, not from the event.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[non_exhaustive]
pub enum DhcpV6Event {
    UdpPackageIn = 1,
    TransmitWait,
    Timeout,
    Renew,
    Rebind,
    LeaseExpired,
}

impl From<DhcpV6Event> for u64 {
    fn from(v: DhcpV6Event) -> u64 {
        v as u64
    }
}

impl TryFrom<u64> for DhcpV6Event {
    type Error = DhcpError;

    fn try_from(v: u64) -> Result<Self, DhcpError> {
        match v {
            x if x == Self::UdpPackageIn as u64 => Ok(Self::UdpPackageIn),
            x if x == Self::TransmitWait as u64 => Ok(Self::TransmitWait),
            x if x == Self::Timeout as u64 => Ok(Self::Timeout),
            x if x == Self::Renew as u64 => Ok(Self::Renew),
            x if x == Self::Rebind as u64 => Ok(Self::Rebind),
            x if x == Self::LeaseExpired as u64 => Ok(Self::LeaseExpired),
            _ => {
                let e = DhcpError::new(
                    ErrorKind::Bug,
                    format!("BUG: Got unexpected event ID {v}"),
                );
                log::error!("{e}");
                Err(e)
            }
        }
    }
}

impl std::fmt::Display for DhcpV6Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::UdpPackageIn => "UdpPackageIn",
                Self::TransmitWait => "TransmitWait",
                Self::Timeout => "Timeout",
                Self::Renew => "Renew",
                Self::Rebind => "Rebind",
                Self::LeaseExpired => "LeaseExpired",
            }
        )
    }
}

#[derive(Debug)]
pub(crate) struct DhcpEpoll {
    fd: Epoll,
}

impl DhcpEpoll {
    fn new() -> Result<Self, DhcpError> {
        Ok(Self {
            fd: Epoll::new(EpollCreateFlags::empty())?,
        })
    }

    fn add_fd(&self, fd: RawFd, data: u64) -> Result<(), DhcpError> {
        self.fd.add(
            unsafe { BorrowedFd::borrow_raw(fd) },
            EpollEvent::new(EpollFlags::EPOLLIN, data),
        )?;
        Ok(())
    }

    fn del_fd(&self, fd: RawFd) -> Result<(), DhcpError> {
        self.fd.delete(unsafe { BorrowedFd::borrow_raw(fd) })?;
        Ok(())
    }

    fn poll(&self, wait_ms: u32) -> Result<Vec<u64>, DhcpError> {
        let mut events = [EpollEvent::empty(); 8];
        loop {
            match self.fd.wait(&mut events, wait_ms) {
                Ok(count) => {
                    return Ok(events[..count]
                        .iter()
                        .map(|e| e.data())
                        .collect());
                }
                Err(nix::errno::Errno::EINTR)
                | Err(nix::errno::Errno::EAGAIN) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl AsRawFd for DhcpEpoll {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

/// Multiplexes a device's UDP socket fd against its single outstanding
/// timer fd. Arming a new timer always replaces whatever was armed before
/// -- the pool never holds more than one timer fd, realizing SPEC_FULL
/// section 9's `min(retransmit_next, state_deadline)` rule literally: the
/// caller always re-arms with whichever deadline is sooner.
#[derive(Debug)]
pub(crate) struct DhcpEventPool {
    epoll: DhcpEpoll,
    socket_fd: Option<RawFd>,
    timer: Option<DhcpTimerFd>,
}

impl DhcpEventPool {
    pub(crate) fn new() -> Result<Self, DhcpError> {
        Ok(Self {
            epoll: DhcpEpoll::new()?,
            socket_fd: None,
            timer: None,
        })
    }

    pub(crate) fn set_socket(&mut self, fd: RawFd) -> Result<(), DhcpError> {
        self.unset_socket()?;
        self.epoll.add_fd(fd, DhcpV6Event::UdpPackageIn.into())?;
        self.socket_fd = Some(fd);
        Ok(())
    }

    pub(crate) fn unset_socket(&mut self) -> Result<(), DhcpError> {
        if let Some(fd) = self.socket_fd.take() {
            self.epoll.del_fd(fd)?;
        }
        Ok(())
    }

    pub(crate) fn arm_timer(
        &mut self,
        event: DhcpV6Event,
        wait: Duration,
    ) -> Result<(), DhcpError> {
        self.disarm_timer()?;
        let timer = DhcpTimerFd::new(wait)?;
        self.epoll.add_fd(timer.as_raw_fd(), event.into())?;
        self.timer = Some(timer);
        Ok(())
    }

    pub(crate) fn disarm_timer(&mut self) -> Result<(), DhcpError> {
        if let Some(timer) = self.timer.take() {
            self.epoll.del_fd(timer.as_raw_fd())?;
        }
        Ok(())
    }

    pub(crate) fn poll(
        &mut self,
        wait_ms: u32,
    ) -> Result<Vec<DhcpV6Event>, DhcpError> {
        self.epoll
            .poll(wait_ms)?
            .into_iter()
            .map(DhcpV6Event::try_from)
            .collect()
    }
}

impl AsRawFd for DhcpEventPool {
    fn as_raw_fd(&self) -> RawFd {
        self.epoll.as_raw_fd()
    }
}

impl Drop for DhcpEventPool {
    fn drop(&mut self) {
        let _ = self.unset_socket();
        let _ = self.disarm_timer();
    }
}
