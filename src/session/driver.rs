//! Collaborator contracts for the session loop.
//!
//! The loop specifies *when* each collaborator runs; these traits specify
//! *what* it may do when it runs. Every per-cycle entry point is
//! synchronous and non-blocking: a driver that would need to block must
//! instead report no work, tighten the shared timeout, and rely on its
//! registered readiness interest to be woken.
//!
//! Work-done counts drive the loop's progress decision: any nonzero total
//! starts the next iteration immediately, a zero total lets the loop block
//! until readiness or the tightened timeout. An `Err` from any entry point
//! is a terminal cause for the whole session; drivers classify their own
//! faults and the loop trusts the classification.

use crate::core::SessionError;
use crate::timing::Timeout;

use super::context::SessionContext;

/// Result of a per-cycle driver invocation: packets moved, or a terminal
/// cause.
pub type DriveResult = Result<usize, SessionError>;

/// The always-present ordered control/data channel (e.g. TLS).
pub trait ReliableTransport {
    /// Per-cycle driver: consume/produce packets through the context
    /// queues, tighten `timeout` for any internal deadline, and report
    /// how much work was done.
    fn drive(&mut self, ctx: &mut SessionContext, timeout: &mut Timeout) -> DriveResult;

    /// Whether the channel currently has a connected peer. Gates fresh
    /// unreliable-transport attempts.
    fn is_connected(&self) -> bool;

    /// Send a best-effort termination notice. Failures are ignored; this
    /// is only called on the terminal path.
    fn send_bye(&mut self, ctx: &mut SessionContext, reason: &str);

    /// Close the channel gracefully for a pause. Authentication state is
    /// expected to survive so the caller can resume.
    fn close(&mut self, ctx: &mut SessionContext);
}

/// Lifecycle phase of the optional unreliable transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreliablePhase {
    /// No session and no handshake in flight.
    Inactive,
    /// A handshake attempt is in flight.
    Handshaking,
    /// A session is active and carrying data.
    Active,
}

/// The optional low-latency lossy data channel (e.g. DTLS).
///
/// A handshake failure a driver wants to survive is not an error: revert
/// to [`UnreliablePhase::Inactive`] and return `Ok`; the loop will retry
/// after the configured attempt period. `Err` is terminal.
pub trait UnreliableTransport {
    /// Current lifecycle phase, re-read by the loop every cycle.
    fn phase(&self) -> UnreliablePhase;

    /// Begin a fresh handshake attempt. Non-blocking; called only while
    /// [`UnreliablePhase::Inactive`], the reliable channel is connected,
    /// and the attempt period has elapsed.
    fn begin_handshake(&mut self, ctx: &mut SessionContext) -> Result<(), SessionError>;

    /// Advance an in-flight handshake one step.
    fn advance_handshake(&mut self, ctx: &mut SessionContext) -> Result<(), SessionError>;

    /// Per-cycle driver; called only while [`UnreliablePhase::Active`].
    fn drive(&mut self, ctx: &mut SessionContext, timeout: &mut Timeout) -> DriveResult;

    /// Tear down any active or handshaking session. Called on pause and
    /// on the terminal path.
    fn shutdown(&mut self, ctx: &mut SessionContext);
}

/// The component moving packets between the tunnel and the local virtual
/// interface.
pub trait InterfaceRelay {
    /// Per-cycle driver. Runs after both transports each cycle so that
    /// the read interest it sets from the current uplink depth reflects
    /// packets they enqueued this same cycle.
    fn drive(&mut self, ctx: &mut SessionContext, timeout: &mut Timeout) -> DriveResult;

    /// Release the local interface binding. Called once on the terminal
    /// path.
    fn shutdown(&mut self, ctx: &mut SessionContext);
}
