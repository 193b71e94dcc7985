//! The session main loop.
//!
//! Implements the per-cycle driver protocol: unreliable transport first,
//! then the reliable transport, then the interface relay, then external
//! commands; block on readiness only when nobody did any work, for the
//! minimum of every pending deadline.

use std::io;
use std::time::Instant;

use mio::{Events, Poll};
use tracing::{info, trace};

use crate::core::SessionError;
use crate::timing::Timeout;

use super::command::{CommandChannel, CommandHandle};
use super::config::SessionConfig;
use super::context::{SessionContext, WAKER_TOKEN};
use super::driver::{InterfaceRelay, ReliableTransport, UnreliablePhase, UnreliableTransport};

/// The session-sustaining main loop of a VPN client.
///
/// Owns the readiness poll, the shared [`SessionContext`], and the three
/// caller-supplied drivers. `run` keeps the tunnel alive until an external
/// pause (resumable, `Ok(())`) or a terminal cause (`Err`).
///
/// # Example
///
/// ```ignore
/// let config = SessionConfigBuilder::new()
///     .unreliable_attempt_period(Some(Duration::from_secs(60)))
///     .build();
/// let (mut session, handle) = Session::new(config, tls, Some(dtls), tun)?;
///
/// // `handle` can pause or cancel the loop from any thread.
/// match session.run() {
///     Ok(()) => println!("paused; call run() again to resume"),
///     Err(cause) => eprintln!("session stopped: {cause} ({})", cause.code()),
/// }
/// ```
#[derive(Debug)]
pub struct Session<R, U, I> {
    poll: Poll,
    events: Events,
    ctx: SessionContext,
    cmd: CommandChannel,
    reliable: R,
    unreliable: Option<U>,
    relay: I,
    config: SessionConfig,
    last_unreliable_attempt: Option<Instant>,
}

impl<R, U, I> Session<R, U, I>
where
    R: ReliableTransport,
    U: UnreliableTransport,
    I: InterfaceRelay,
{
    /// Create a session over the given drivers.
    ///
    /// Returns the session and a [`CommandHandle`] for issuing pause and
    /// cancel requests from other threads.
    ///
    /// # Errors
    /// Returns an error if the readiness poll or the command waker cannot
    /// be set up.
    pub fn new(
        config: SessionConfig,
        reliable: R,
        unreliable: Option<U>,
        relay: I,
    ) -> io::Result<(Self, CommandHandle)> {
        let poll = Poll::new()?;
        let (cmd, handle) = CommandChannel::new(poll.registry(), WAKER_TOKEN)?;
        let ctx = SessionContext::new(poll.registry().try_clone()?, &config);
        let events = Events::with_capacity(config.event_capacity.max(1));

        let session = Self {
            poll,
            events,
            ctx,
            cmd,
            reliable,
            unreliable,
            relay,
            config,
            last_unreliable_attempt: None,
        };
        Ok((session, handle))
    }

    /// The shared session context (for driver setup before `run`).
    pub fn context(&mut self) -> &mut SessionContext {
        &mut self.ctx
    }

    /// The reliable-transport driver.
    pub fn reliable(&self) -> &R {
        &self.reliable
    }

    /// The unreliable-transport driver, if one was supplied.
    pub fn unreliable(&self) -> Option<&U> {
        self.unreliable.as_ref()
    }

    /// The interface-relay driver.
    pub fn relay(&self) -> &I {
        &self.relay
    }

    /// Drive the session until pause or a terminal stop.
    ///
    /// `Ok(())` exclusively means the caller requested a pause: transports
    /// are released, keepalive timing in the drivers survives, and `run`
    /// may be called again to resume. `Err` is a terminal stop; the
    /// reserved code is available via [`SessionError::code`].
    ///
    /// Readiness events are never dispatched to drivers: a wake-up, an
    /// empty wake-up, and a timeout all look the same, and every driver
    /// recomputes its due actions from current timestamps on the next
    /// cycle.
    ///
    /// # Errors
    /// Any terminal cause: local cancel, remote termination, expired
    /// authentication, allocation failure, or a generic driver fault.
    pub fn run(&mut self) -> Result<(), SessionError> {
        while !self.ctx.is_quitting() {
            let mut did_work = 0usize;
            let mut timeout = Timeout::unbounded();

            did_work += self.drive_unreliable(&mut timeout);
            if self.ctx.is_quitting() {
                break;
            }

            match self.reliable.drive(&mut self.ctx, &mut timeout) {
                Ok(work) => did_work += work,
                Err(cause) => self.ctx.set_quit(cause),
            }
            if self.ctx.is_quitting() {
                break;
            }

            // The relay must run after both transports: it sets and
            // clears its read interest from the uplink depth, which has
            // to include packets the transports enqueued this cycle.
            match self.relay.drive(&mut self.ctx, &mut timeout) {
                Ok(work) => did_work += work,
                Err(cause) => self.ctx.set_quit(cause),
            }
            if self.ctx.is_quitting() {
                break;
            }

            if self.cmd.take_cancel() {
                self.ctx.set_quit(SessionError::Interrupted);
                break;
            }
            if self.cmd.take_pause() {
                // Release both transports and hand control back; the
                // caller resumes by calling run() again.
                self.reliable.close(&mut self.ctx);
                if let Some(unreliable) = self.unreliable.as_mut() {
                    unreliable.shutdown(&mut self.ctx);
                }
                self.last_unreliable_attempt = None;
                info!("caller paused the connection");
                return Ok(());
            }

            if did_work > 0 {
                continue;
            }

            trace!(timeout = ?timeout.remaining(), "no work to do; sleeping");
            if let Err(error) = self.poll.poll(&mut self.events, timeout.remaining()) {
                // Indistinguishable from an ordinary timeout; reiterate.
                trace!(%error, "readiness wait interrupted");
            }
        }

        let cause = self.ctx.take_quit().unwrap_or_else(|| {
            SessionError::Io(io::Error::other("session loop exited without a recorded cause"))
        });
        info!(%cause, code = cause.code(), "session stopped");
        self.reliable.send_bye(&mut self.ctx, &cause.to_string());
        self.relay.shutdown(&mut self.ctx);
        Err(cause)
    }

    /// Steps 1-3 of the cycle: attempt, advance, or drive the unreliable
    /// transport depending on its phase. Terminal causes are recorded on
    /// the context.
    fn drive_unreliable(&mut self, timeout: &mut Timeout) -> usize {
        let Some(unreliable) = self.unreliable.as_mut() else {
            return 0;
        };

        match unreliable.phase() {
            UnreliablePhase::Inactive => {
                let Some(period) = self.config.unreliable_attempt_period else {
                    return 0;
                };
                let period_elapsed = self
                    .last_unreliable_attempt
                    .is_none_or(|at| at.elapsed() >= period);
                if period_elapsed && self.reliable.is_connected() {
                    trace!("attempting new unreliable transport session");
                    self.last_unreliable_attempt = Some(Instant::now());
                    if let Err(cause) = unreliable.begin_handshake(&mut self.ctx) {
                        self.ctx.set_quit(cause);
                    }
                }
                0
            }
            UnreliablePhase::Handshaking => {
                if let Err(cause) = unreliable.advance_handshake(&mut self.ctx) {
                    self.ctx.set_quit(cause);
                }
                0
            }
            UnreliablePhase::Active => match unreliable.drive(&mut self.ctx, timeout) {
                Ok(work) => work,
                Err(cause) => {
                    self.ctx.set_quit(cause);
                    0
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::core::constants;
    use crate::session::config::SessionConfigBuilder;
    use crate::session::driver::DriveResult;
    use crate::timing::KeepaliveState;

    fn init_trace() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    type CallLog = Rc<RefCell<Vec<&'static str>>>;

    #[derive(Default)]
    struct MockReliable {
        connected: bool,
        drives: usize,
        work: usize,
        tighten: Option<Duration>,
        fail: Option<SessionError>,
        cancel_after: Option<(usize, CommandHandle)>,
        bye: Option<String>,
        closed: bool,
        log: Option<CallLog>,
        keepalive: Option<KeepaliveState>,
    }

    impl ReliableTransport for MockReliable {
        fn drive(&mut self, _ctx: &mut SessionContext, timeout: &mut Timeout) -> DriveResult {
            self.drives += 1;
            if let Some(log) = &self.log {
                log.borrow_mut().push("reliable");
            }
            if let Some(limit) = self.tighten {
                timeout.tighten(limit);
            }
            if let Some((after, handle)) = &self.cancel_after
                && self.drives >= *after
            {
                handle.cancel();
            }
            if let Some(cause) = self.fail.take() {
                return Err(cause);
            }
            Ok(self.work)
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn send_bye(&mut self, _ctx: &mut SessionContext, reason: &str) {
            self.bye = Some(reason.to_string());
        }

        fn close(&mut self, _ctx: &mut SessionContext) {
            self.closed = true;
        }
    }

    /// Unreliable mock whose handshake either progresses to Active or
    /// falls straight back to Inactive (a failed, non-fatal attempt).
    struct MockUnreliable {
        phase: UnreliablePhase,
        sticky: bool,
        begins: usize,
        advances: usize,
        drives: usize,
        shutdowns: usize,
        log: Option<CallLog>,
    }

    impl MockUnreliable {
        fn failing() -> Self {
            Self {
                phase: UnreliablePhase::Inactive,
                sticky: false,
                begins: 0,
                advances: 0,
                drives: 0,
                shutdowns: 0,
                log: None,
            }
        }

        fn connecting() -> Self {
            Self {
                sticky: true,
                ..Self::failing()
            }
        }
    }

    impl UnreliableTransport for MockUnreliable {
        fn phase(&self) -> UnreliablePhase {
            self.phase
        }

        fn begin_handshake(&mut self, _ctx: &mut SessionContext) -> Result<(), SessionError> {
            self.begins += 1;
            if self.sticky {
                self.phase = UnreliablePhase::Handshaking;
            }
            Ok(())
        }

        fn advance_handshake(&mut self, _ctx: &mut SessionContext) -> Result<(), SessionError> {
            self.advances += 1;
            self.phase = UnreliablePhase::Active;
            Ok(())
        }

        fn drive(&mut self, _ctx: &mut SessionContext, _timeout: &mut Timeout) -> DriveResult {
            self.drives += 1;
            if let Some(log) = &self.log {
                log.borrow_mut().push("unreliable");
            }
            Ok(0)
        }

        fn shutdown(&mut self, _ctx: &mut SessionContext) {
            self.shutdowns += 1;
            self.phase = UnreliablePhase::Inactive;
        }
    }

    #[derive(Default)]
    struct MockRelay {
        drives: usize,
        shutdowns: usize,
        log: Option<CallLog>,
    }

    impl InterfaceRelay for MockRelay {
        fn drive(&mut self, _ctx: &mut SessionContext, _timeout: &mut Timeout) -> DriveResult {
            self.drives += 1;
            if let Some(log) = &self.log {
                log.borrow_mut().push("relay");
            }
            Ok(0)
        }

        fn shutdown(&mut self, _ctx: &mut SessionContext) {
            self.shutdowns += 1;
        }
    }

    fn config_without_unreliable() -> SessionConfig {
        SessionConfigBuilder::new()
            .unreliable_attempt_period(None)
            .build()
    }

    #[test]
    fn test_cancel_stops_within_one_iteration() {
        init_trace();
        let (mut session, handle) = Session::<_, MockUnreliable, _>::new(
            config_without_unreliable(),
            MockReliable::default(),
            None,
            MockRelay::default(),
        )
        .unwrap();

        handle.cancel();
        let err = session.run().unwrap_err();

        assert!(matches!(err, SessionError::Interrupted));
        assert_eq!(err.code(), constants::ERR_INTERRUPTED);
        // One full iteration, then the goodbye notice and teardown.
        assert_eq!(session.reliable().drives, 1);
        assert!(session.reliable().bye.is_some());
        assert_eq!(session.relay().shutdowns, 1);
    }

    #[test]
    fn test_pause_returns_ok_and_releases_transports() {
        init_trace();
        let session_start = Instant::now() - Duration::from_secs(100);
        let reliable = MockReliable {
            keepalive: Some(KeepaliveState::with_start(
                session_start,
                Some(Duration::from_secs(300)),
                None,
                None,
            )),
            ..MockReliable::default()
        };
        let (mut session, handle) = Session::new(
            SessionConfig::default(),
            reliable,
            Some(MockUnreliable::connecting()),
            MockRelay::default(),
        )
        .unwrap();

        handle.pause();
        session.run().unwrap();

        assert!(session.reliable().closed);
        assert!(session.reliable().bye.is_none());
        assert_eq!(session.unreliable().unwrap().shutdowns, 1);
        // The relay binding survives a pause; only terminal stops tear it
        // down.
        assert_eq!(session.relay().shutdowns, 0);
        // Keepalive timing is untouched across the call boundary.
        let keepalive = session.reliable().keepalive.as_ref().unwrap();
        assert_eq!(keepalive.last_rekey(), session_start);
    }

    #[test]
    fn test_pause_resets_unreliable_attempt_timer() {
        init_trace();
        // Long attempt period; a second attempt inside one run would be
        // gated off, so a second begin proves the pause reset the timer.
        let config = SessionConfigBuilder::new()
            .unreliable_attempt_period(Some(Duration::from_secs(3600)))
            .build();
        let reliable = MockReliable {
            connected: true,
            ..MockReliable::default()
        };
        let (mut session, handle) = Session::new(
            config,
            reliable,
            Some(MockUnreliable::failing()),
            MockRelay::default(),
        )
        .unwrap();

        handle.pause();
        session.run().unwrap();
        assert_eq!(session.unreliable().unwrap().begins, 1);

        handle.pause();
        session.run().unwrap();
        assert_eq!(session.unreliable().unwrap().begins, 2);
    }

    #[test]
    fn test_remote_termination_code() {
        init_trace();
        let reliable = MockReliable {
            fail: Some(SessionError::RemoteTerminated("BYE from gateway".into())),
            ..MockReliable::default()
        };
        let (mut session, _handle) = Session::<_, MockUnreliable, _>::new(
            config_without_unreliable(),
            reliable,
            None,
            MockRelay::default(),
        )
        .unwrap();

        let err = session.run().unwrap_err();
        assert_eq!(err.code(), constants::ERR_REMOTE_TERMINATED);

        let bye = session.reliable().bye.as_deref().unwrap();
        assert!(bye.contains("BYE from gateway"));
        assert_eq!(session.relay().shutdowns, 1);
    }

    #[test]
    fn test_auth_expired_code() {
        init_trace();
        let reliable = MockReliable {
            fail: Some(SessionError::AuthExpired("cookie rejected".into())),
            ..MockReliable::default()
        };
        let (mut session, _handle) = Session::<_, MockUnreliable, _>::new(
            config_without_unreliable(),
            reliable,
            None,
            MockRelay::default(),
        )
        .unwrap();

        let err = session.run().unwrap_err();
        assert_eq!(err.code(), constants::ERR_AUTH_EXPIRED);
    }

    #[test]
    fn test_relay_driven_after_both_transports_every_cycle() {
        init_trace();
        let log: CallLog = Rc::new(RefCell::new(Vec::new()));

        let (mut session, handle) = Session::new(
            SessionConfig::default(),
            MockReliable {
                tighten: Some(Duration::from_millis(5)),
                log: Some(Rc::clone(&log)),
                ..MockReliable::default()
            },
            Some(MockUnreliable {
                phase: UnreliablePhase::Active,
                log: Some(Rc::clone(&log)),
                ..MockUnreliable::connecting()
            }),
            MockRelay {
                log: Some(Rc::clone(&log)),
                ..MockRelay::default()
            },
        )
        .unwrap();

        // Let two full cycles happen, then stop.
        session.reliable.cancel_after = Some((2, handle));
        session.run().unwrap_err();

        let calls = log.borrow();
        assert_eq!(calls.len(), 6);
        for cycle in calls.chunks(3) {
            assert_eq!(cycle, ["unreliable", "reliable", "relay"]);
        }
    }

    #[test]
    fn test_work_skips_the_blocking_wait() {
        init_trace();
        // Every cycle reports work and nothing ever tightens the
        // unbounded timeout: if the loop blocked anyway it would sleep
        // forever. Three fast cycles prove it reiterates immediately.
        let reliable = MockReliable {
            work: 1,
            ..MockReliable::default()
        };
        let (mut session, handle) = Session::<_, MockUnreliable, _>::new(
            config_without_unreliable(),
            reliable,
            None,
            MockRelay::default(),
        )
        .unwrap();
        session.reliable.cancel_after = Some((3, handle));

        let started = Instant::now();
        let err = session.run().unwrap_err();

        assert!(matches!(err, SessionError::Interrupted));
        assert_eq!(session.reliable().drives, 3);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_unreliable_attempt_requires_connected_reliable() {
        init_trace();
        let config = SessionConfigBuilder::new()
            .unreliable_attempt_period(Some(Duration::ZERO))
            .build();

        // Disconnected reliable transport: no attempts at all.
        let (mut session, handle) = Session::new(
            config.clone(),
            MockReliable {
                connected: false,
                tighten: Some(Duration::from_millis(5)),
                ..MockReliable::default()
            },
            Some(MockUnreliable::failing()),
            MockRelay::default(),
        )
        .unwrap();
        session.reliable.cancel_after = Some((2, handle));
        session.run().unwrap_err();
        assert_eq!(session.unreliable().unwrap().begins, 0);

        // Connected: attempts happen.
        let (mut session, handle) = Session::new(
            config,
            MockReliable {
                connected: true,
                tighten: Some(Duration::from_millis(5)),
                ..MockReliable::default()
            },
            Some(MockUnreliable::failing()),
            MockRelay::default(),
        )
        .unwrap();
        session.reliable.cancel_after = Some((2, handle));
        session.run().unwrap_err();
        assert!(session.unreliable().unwrap().begins >= 1);
    }

    #[test]
    fn test_handshake_advances_to_active() {
        init_trace();
        let config = SessionConfigBuilder::new()
            .unreliable_attempt_period(Some(Duration::ZERO))
            .build();
        let (mut session, handle) = Session::new(
            config,
            MockReliable {
                connected: true,
                tighten: Some(Duration::from_millis(5)),
                ..MockReliable::default()
            },
            Some(MockUnreliable::connecting()),
            MockRelay::default(),
        )
        .unwrap();

        // Cycle 1 begins the handshake, cycle 2 advances it, cycle 3
        // drives the active session.
        session.reliable.cancel_after = Some((3, handle));
        session.run().unwrap_err();

        let unreliable = session.unreliable().unwrap();
        assert_eq!(unreliable.begins, 1);
        assert_eq!(unreliable.advances, 1);
        assert_eq!(unreliable.drives, 1);
        assert_eq!(unreliable.phase(), UnreliablePhase::Active);
    }

    #[test]
    fn test_waker_interrupts_unbounded_sleep() {
        init_trace();
        // Nothing tightens the timeout, so the loop sleeps unbounded; the
        // cancel must wake it through the poll waker.
        let (mut session, handle) = Session::<_, MockUnreliable, _>::new(
            config_without_unreliable(),
            MockReliable::default(),
            None,
            MockRelay::default(),
        )
        .unwrap();

        let started = Instant::now();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            handle.cancel();
        });

        let err = session.run().unwrap_err();
        assert!(matches!(err, SessionError::Interrupted));
        assert!(started.elapsed() >= Duration::from_millis(90));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    /// Relay that registers a real UDP socket and stops the session once
    /// a datagram arrives.
    struct UdpRelay {
        socket: mio::net::UdpSocket,
        registered: bool,
        received: Option<Vec<u8>>,
    }

    impl InterfaceRelay for UdpRelay {
        fn drive(&mut self, ctx: &mut SessionContext, _timeout: &mut Timeout) -> DriveResult {
            if !self.registered {
                ctx.register(&mut self.socket, mio::Interest::READABLE)?;
                self.registered = true;
            }
            let mut buf = [0u8; 2048];
            match self.socket.recv_from(&mut buf) {
                Ok((len, _from)) => {
                    self.received = Some(buf[..len].to_vec());
                    ctx.downlink.push_copy(&buf[..len])?;
                    ctx.set_quit(SessionError::Fatal("done".into()));
                    Ok(1)
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
                Err(e) => Err(e.into()),
            }
        }

        fn shutdown(&mut self, ctx: &mut SessionContext) {
            let _ = ctx.deregister(&mut self.socket);
        }
    }

    #[test]
    fn test_wakes_on_registered_readiness() {
        init_trace();
        let socket = mio::net::UdpSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = socket.local_addr().unwrap();
        let relay = UdpRelay {
            socket,
            registered: false,
            received: None,
        };

        let (mut session, _handle) = Session::<_, MockUnreliable, _>::new(
            config_without_unreliable(),
            MockReliable::default(),
            None,
            relay,
        )
        .unwrap();

        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            let sender = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
            sender.send_to(b"ping", addr).unwrap();
        });

        let started = Instant::now();
        let err = session.run().unwrap_err();

        // The loop slept unbounded until the socket became readable.
        assert_eq!(err.code(), constants::ERR_IO);
        assert!(started.elapsed() >= Duration::from_millis(90));
        assert_eq!(session.relay().received.as_deref(), Some(&b"ping"[..]));
        assert_eq!(session.context().downlink.len(), 1);
    }
}
