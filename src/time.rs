// SPDX-License-Identifier: Apache-2.0

use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

use nix::sys::timerfd::{ClockId, Expiration, TimerFd, TimerFlags, TimerSetTimeFlags};

use crate::DhcpError;

/// One-shot `timerfd`-backed timer usable as an epoll source.
#[derive(Debug)]
pub(crate) struct DhcpTimerFd {
    fd: TimerFd,
}

impl DhcpTimerFd {
    pub(crate) fn new(wait: Duration) -> Result<Self, DhcpError> {
        let fd = TimerFd::new(ClockId::CLOCK_BOOTTIME, TimerFlags::TFD_NONBLOCK)?;
        fd.set(Expiration::OneShot(wait.into()), TimerSetTimeFlags::empty())?;
        Ok(Self { fd })
    }
}

impl AsRawFd for DhcpTimerFd {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_fd().as_raw_fd()
    }
}

/// Higher-level deadline timer used for T1/T2/valid-lifetime bookkeeping,
/// where only "how much longer" matters rather than a pollable fd.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DhcpTimer {
    deadline: Instant,
}

impl DhcpTimer {
    pub(crate) fn new(wait: Duration) -> Result<Self, DhcpError> {
        Ok(Self {
            deadline: Instant::now() + wait,
        })
    }

    /// Time remaining until the deadline, zero if already passed.
    pub(crate) fn remains(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.remains() == Duration::ZERO
    }
}
