// SPDX-License-Identifier: Apache-2.0

use std::time::{Duration, Instant};

/// RFC 8415 section 15. Reliability of Client-Initiated Message Exchanges
///  RT      Retransmission timeout
///  IRT     Initial retransmission time
///  MRC     Maximum retransmission count
///  MRT     Maximum retransmission time
///  MRD     Maximum retransmission duration
///  RAND    Randomization factor
///
/// Separated from the device FSM: this type only tracks "when should the
/// next datagram go out, and has the exchange expired", never touching
/// sockets or messages directly.
#[derive(Debug, Clone)]
pub(crate) struct RetransState {
    params: RetransParams,
    start: Instant,
    rt: Duration,
    count: u32,
    /// First Solicit transmission draws its jitter from `(0, +0.1]` instead
    /// of `[-0.1, +0.1]` per RFC 3315 section 17.1.2.
    first_solicit: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetransParams {
    pub(crate) irt: Duration,
    pub(crate) mrt: Duration,
    pub(crate) mrc: u32,
    pub(crate) mrd: Duration,
    /// Upper bound for a random delay before the exchange's very first
    /// transmission (e.g. RFC 8415 section 18.2.1's `SOL_MAX_DELAY` for
    /// Solicit); `Duration::ZERO` means send immediately.
    pub(crate) delay: Duration,
}

pub(crate) enum Advance {
    /// Send another datagram now, then wait `Duration` before the next one.
    Transmit(Duration),
    /// MRC or MRD was reached; the exchange has failed.
    Expired,
}

impl RetransState {
    pub(crate) fn new(params: RetransParams, first_solicit: bool) -> Self {
        Self {
            params,
            start: Instant::now(),
            rt: Duration::ZERO,
            count: 0,
            first_solicit,
        }
    }

    pub(crate) fn start(&self) -> Instant {
        self.start
    }

    pub(crate) fn transmit_count(&self) -> u32 {
        self.count
    }

    /// Whether `arm_exchange` has not yet run, i.e. the exchange is still
    /// waiting out its initial delay (or hasn't started at all).
    pub(crate) fn is_initial(&self) -> bool {
        self.count == 0
    }

    /// Draw a random delay in `[0, delay]` to wait before the first
    /// datagram goes out (RFC 8415 section 18.2.1). Returns `None` when the
    /// exchange has no initial delay configured, in which case the caller
    /// should send immediately and call `arm_exchange` itself.
    pub(crate) fn arm_initial_delay(&mut self) -> Option<Duration> {
        if self.params.delay == Duration::ZERO {
            return None;
        }
        let upper = self.params.delay.as_millis() as u64;
        Some(Duration::from_millis(rand::random_range(0..=upper)))
    }

    /// Compute the first RT and arm the exchange. Call once, right before
    /// the first datagram is sent.
    pub(crate) fn arm_exchange(&mut self) -> Duration {
        self.start = Instant::now();
        self.rt = Self::jitter(self.params.irt, self.first_solicit);
        self.count = 1;
        self.rt
    }

    /// A retransmission deadline fired (or the exchange is done waiting for
    /// the current RT). Decide whether to retransmit or declare the
    /// exchange expired.
    pub(crate) fn advance_or_expire(&mut self) -> Advance {
        if self.params.mrc != 0 && self.count >= self.params.mrc {
            return Advance::Expired;
        }
        if self.params.mrd != Duration::ZERO
            && self.start.elapsed() >= self.params.mrd
        {
            return Advance::Expired;
        }

        let mut next = self.rt.saturating_mul(2);
        next = Self::jitter(next, false);
        if self.params.mrt != Duration::ZERO && next > self.params.mrt {
            next = Self::jitter(self.params.mrt, false);
        }
        self.rt = next;
        self.count += 1;
        Advance::Transmit(self.rt)
    }

    /// `RAND` uniform in `[-0.1, +0.1]`, or `(0, +0.1]` for the very first
    /// Solicit transmission per RFC 3315 section 17.1.2.
    fn jitter(base: Duration, strictly_positive: bool) -> Duration {
        let (low, high) = if strictly_positive {
            (1001, 1100)
        } else {
            (900, 1100)
        };
        let factor = rand::random_range(low..=high);
        Duration::from_millis(
            ((base.as_millis() * factor) / 1000)
                .try_into()
                .unwrap_or(u64::MAX),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(irt: u64, mrt: u64, mrc: u32, mrd: u64) -> RetransParams {
        RetransParams {
            irt: Duration::from_secs(irt),
            mrt: Duration::from_secs(mrt),
            mrc,
            mrd: Duration::from_secs(mrd),
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn first_rt_within_bounds() {
        let mut st = RetransState::new(params(1, 120, 0, 0), false);
        let rt = st.arm_exchange();
        assert!(rt >= Duration::from_millis(900));
        assert!(rt <= Duration::from_millis(1100));
    }

    #[test]
    fn first_solicit_rt_strictly_above_irt() {
        let mut st = RetransState::new(params(1, 120, 0, 0), true);
        let rt = st.arm_exchange();
        assert!(rt > Duration::from_secs(1));
        assert!(rt <= Duration::from_millis(1100));
    }

    #[test]
    fn mrc_expires_exchange() {
        let mut st = RetransState::new(params(1, 30, 2, 0), false);
        st.arm_exchange();
        match st.advance_or_expire() {
            Advance::Transmit(_) => {}
            Advance::Expired => panic!("should not expire yet"),
        }
        match st.advance_or_expire() {
            Advance::Expired => {}
            Advance::Transmit(_) => panic!("should have expired at mrc"),
        }
    }

    #[test]
    fn initial_delay_within_bounds_then_clears() {
        let mut st = RetransState::new(
            RetransParams {
                delay: Duration::from_secs(1),
                ..params(1, 120, 0, 0)
            },
            true,
        );
        assert!(st.is_initial());
        let delay = st.arm_initial_delay().expect("delay configured");
        assert!(delay <= Duration::from_secs(1));
        assert!(st.is_initial());
        st.arm_exchange();
        assert!(!st.is_initial());
    }

    #[test]
    fn no_initial_delay_configured() {
        let mut st = RetransState::new(params(1, 120, 0, 0), false);
        assert!(st.arm_initial_delay().is_none());
    }

    #[test]
    fn rt_caps_at_mrt() {
        let mut st = RetransState::new(params(60, 70, 0, 0), false);
        st.arm_exchange();
        match st.advance_or_expire() {
            Advance::Transmit(rt) => {
                assert!(rt <= Duration::from_millis(77_000));
            }
            Advance::Expired => panic!("mrc/mrd unlimited, should not expire"),
        }
    }
}
