//! Deadline arithmetic and the keepalive/DPD scheduler.
//!
//! The session loop owns one [`Timeout`] per iteration: a running minimum
//! over every concurrently armed deadline (rekey, dead-peer detection,
//! keepalive, per-driver internal timers). Drivers only ever tighten it;
//! the loop feeds the result straight into the blocking readiness wait.
//!
//! [`KeepaliveState`] is the per-transport deadline engine: given the
//! configured intervals and the last-activity marks, it decides whether a
//! rekey, a dead-peer probe, a dead verdict, or a keepalive packet is due
//! *now*, and otherwise tightens the caller's timeout to the next deadline.

use std::time::{Duration, Instant};

/// A wait bound that can only shrink.
///
/// Starts unbounded at the top of each loop iteration and is tightened,
/// never loosened, by every armed deadline along the way. The cooperative
/// substitute for a timer-interrupt model: a plain running minimum, no
/// scheduled callbacks, no allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout {
    remaining: Option<Duration>,
}

impl Timeout {
    /// An unbounded wait (no deadline armed yet).
    pub const fn unbounded() -> Self {
        Self { remaining: None }
    }

    /// A wait bounded by `limit` from the start.
    pub const fn bounded(limit: Duration) -> Self {
        Self {
            remaining: Some(limit),
        }
    }

    /// Lower the bound to `limit` if it is tighter than the current one.
    pub fn tighten(&mut self, limit: Duration) {
        match self.remaining {
            Some(current) if current <= limit => {}
            _ => self.remaining = Some(limit),
        }
    }

    /// The current bound, `None` when still unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.remaining
    }

    /// Whether no deadline has been armed.
    pub fn is_unbounded(&self) -> bool {
        self.remaining.is_none()
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Action the keepalive scheduler asks the caller to take *now*.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveAction {
    /// Nothing due; the timeout was tightened to the nearest deadline.
    None,
    /// Time to renegotiate session keys.
    Rekey,
    /// Time to send a dead-peer-detection probe.
    DpdProbe,
    /// Peer presumed unreachable; the caller must treat this as fatal.
    DpdDead,
    /// Time to send a content-free keepalive packet.
    Keepalive,
}

/// Per-transport keepalive, dead-peer-detection, and rekey timing.
///
/// Pure deadline evaluation over monotonic timestamps: the state is updated
/// by the owning driver as traffic is observed (`record_rx`, `record_tx`,
/// `record_rekey`) and interrogated once per loop cycle (`check`). It is
/// created at session start and survives pauses and reconnects.
///
/// Priority order is fixed: rekey first (stale keys are a security
/// exposure), then the dead-peer verdict and probe (a peer presumed dead
/// must not receive further traffic), keepalive last (least urgent when
/// the channel is otherwise idle).
#[derive(Debug, Clone)]
pub struct KeepaliveState {
    rekey_interval: Option<Duration>,
    dpd_interval: Option<Duration>,
    keepalive_interval: Option<Duration>,
    last_rx: Instant,
    last_tx: Instant,
    last_dpd: Instant,
    last_rekey: Instant,
}

/// Zero means disabled, same as absent.
fn enabled(interval: Option<Duration>) -> Option<Duration> {
    interval.filter(|d| !d.is_zero())
}

impl KeepaliveState {
    /// Create keepalive state with all last-activity marks set to now.
    ///
    /// `None` or a zero duration disables the corresponding feature.
    pub fn new(
        rekey_interval: Option<Duration>,
        dpd_interval: Option<Duration>,
        keepalive_interval: Option<Duration>,
    ) -> Self {
        Self::with_start(Instant::now(), rekey_interval, dpd_interval, keepalive_interval)
    }

    /// Create keepalive state with all last-activity marks set to `start`.
    pub fn with_start(
        start: Instant,
        rekey_interval: Option<Duration>,
        dpd_interval: Option<Duration>,
        keepalive_interval: Option<Duration>,
    ) -> Self {
        Self {
            rekey_interval: enabled(rekey_interval),
            dpd_interval: enabled(dpd_interval),
            keepalive_interval: enabled(keepalive_interval),
            last_rx: start,
            last_tx: start,
            last_dpd: start,
            last_rekey: start,
        }
    }

    /// Record a receive at `now`. Also resets probe eligibility: the next
    /// probe is scheduled from this mark, not from the outstanding probe.
    pub fn record_rx_at(&mut self, now: Instant) {
        self.last_rx = now;
    }

    /// Record a receive at the current time.
    pub fn record_rx(&mut self) {
        self.record_rx_at(Instant::now());
    }

    /// Record a transmit at `now`.
    pub fn record_tx_at(&mut self, now: Instant) {
        self.last_tx = now;
    }

    /// Record a transmit at the current time.
    pub fn record_tx(&mut self) {
        self.record_tx_at(Instant::now());
    }

    /// Record a completed rekey at `now`.
    pub fn record_rekey_at(&mut self, now: Instant) {
        self.last_rekey = now;
    }

    /// Record a completed rekey at the current time.
    pub fn record_rekey(&mut self) {
        self.record_rekey_at(Instant::now());
    }

    /// When the last authenticated packet was received.
    pub fn last_rx(&self) -> Instant {
        self.last_rx
    }

    /// When we last sent anything.
    pub fn last_tx(&self) -> Instant {
        self.last_tx
    }

    /// When session keys were last negotiated.
    pub fn last_rekey(&self) -> Instant {
        self.last_rekey
    }

    /// Replace the rekey interval (`None` or zero disables).
    pub fn set_rekey_interval(&mut self, interval: Option<Duration>) {
        self.rekey_interval = enabled(interval);
    }

    /// Replace the DPD interval (`None` or zero disables).
    pub fn set_dpd_interval(&mut self, interval: Option<Duration>) {
        self.dpd_interval = enabled(interval);
    }

    /// Replace the keepalive interval (`None` or zero disables).
    pub fn set_keepalive_interval(&mut self, interval: Option<Duration>) {
        self.keepalive_interval = enabled(interval);
    }

    /// Normal per-cycle check at an explicit `now`.
    ///
    /// Evaluates rekey, DPD, and keepalive in fixed priority order.
    /// Returns the first due action; every armed check that did not
    /// trigger tightens `timeout` to its deadline. A returned
    /// [`KeepaliveAction::DpdProbe`] stamps the probe time, so a second
    /// call without an intervening receive will not reissue a probe
    /// before half the DPD interval has elapsed.
    pub fn check_at(&mut self, now: Instant, timeout: &mut Timeout) -> KeepaliveAction {
        if let Some(rekey) = self.rekey_interval {
            let due = self.last_rekey + rekey;
            if now >= due {
                return KeepaliveAction::Rekey;
            }
            timeout.tighten(due - now);
        }

        // DPD is bidirectional: probe out, response back.
        if let Some(dpd) = self.dpd_interval {
            let overdue = self.last_rx + 2 * dpd;

            // Peer didn't respond to the previous probe either.
            if now > overdue {
                return KeepaliveAction::DpdDead;
            }

            let mut due = self.last_rx + dpd;

            // A probe is outstanding iff it is strictly newer than the last
            // receive; a receive at the very same instant counts as a
            // response. Repeat by all means, but only after half the DPD
            // period, so an unresponsive peer is not flooded.
            if self.last_dpd > self.last_rx {
                due = self.last_dpd + dpd / 2;
            }

            if now >= due {
                self.last_dpd = now;
                return KeepaliveAction::DpdProbe;
            }
            timeout.tighten(due - now);
        }

        // Keepalive is client -> server only.
        if let Some(keepalive) = self.keepalive_interval {
            let due = self.last_tx + keepalive;
            if now >= due {
                return KeepaliveAction::Keepalive;
            }
            timeout.tighten(due - now);
        }

        KeepaliveAction::None
    }

    /// Normal per-cycle check at the current time.
    pub fn check(&mut self, timeout: &mut Timeout) -> KeepaliveAction {
        self.check_at(Instant::now(), timeout)
    }

    /// Degraded-mode check at an explicit `now`, for when the channel is
    /// known to be unwritable.
    ///
    /// Sending a probe or keepalive is meaningless on an unwritable
    /// channel, so only the rekey deadline and the dead-peer verdict are
    /// evaluated; the tightened timeout bounds how long the caller should
    /// wait for writability to return before giving up.
    pub fn stalled_check_at(&mut self, now: Instant, timeout: &mut Timeout) -> KeepaliveAction {
        if let Some(rekey) = self.rekey_interval {
            let due = self.last_rekey + rekey;
            if now >= due {
                return KeepaliveAction::Rekey;
            }
            timeout.tighten(due - now);
        }

        if let Some(dpd) = self.dpd_interval {
            let due = self.last_rx + 2 * dpd;
            if now > due {
                return KeepaliveAction::DpdDead;
            }
            timeout.tighten(due - now);
        }

        KeepaliveAction::None
    }

    /// Degraded-mode check at the current time.
    pub fn stalled_check(&mut self, timeout: &mut Timeout) -> KeepaliveAction {
        self.stalled_check_at(Instant::now(), timeout)
    }
}
