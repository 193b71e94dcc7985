//! Shared per-session state threaded through every driver call.
//!
//! One owned context object, passed by mutable reference; no singleton, no
//! implicit global. Drivers register their own descriptors into the
//! readiness interest sets, move packets through the uplink and downlink
//! queues, and may record a terminal cause. They must not touch another
//! driver's registrations.

use std::io;
use std::time::Duration;

use mio::event::Source;
use mio::{Interest, Registry, Token};
use tracing::debug;

use crate::core::SessionError;
use crate::queue::PacketQueue;

use super::config::SessionConfig;

/// Token reserved for the command-channel waker.
pub(crate) const WAKER_TOKEN: Token = Token(0);

/// Shared session state owned by the loop and lent to each driver call.
#[derive(Debug)]
pub struct SessionContext {
    registry: Registry,
    next_token: usize,

    /// Packets travelling host → tunnel (produced by the relay, consumed
    /// by the transports).
    pub uplink: PacketQueue,
    /// Packets travelling tunnel → host (produced by the transports,
    /// consumed by the relay).
    pub downlink: PacketQueue,

    quit: Option<SessionError>,
    reconnect_timeout: Duration,
    reconnect_interval: Duration,
}

impl SessionContext {
    pub(crate) fn new(registry: Registry, config: &SessionConfig) -> Self {
        Self {
            registry,
            next_token: WAKER_TOKEN.0 + 1,
            uplink: PacketQueue::new(),
            downlink: PacketQueue::new(),
            quit: None,
            reconnect_timeout: config.reconnect_timeout,
            reconnect_interval: config.reconnect_interval,
        }
    }

    /// Register a descriptor for readiness notification, allocating a
    /// fresh token for it.
    ///
    /// Raw tun descriptors can be wrapped in [`mio::unix::SourceFd`].
    ///
    /// # Errors
    /// Returns an error if the descriptor cannot be registered.
    pub fn register<S>(&mut self, source: &mut S, interests: Interest) -> io::Result<Token>
    where
        S: Source + ?Sized,
    {
        let token = Token(self.next_token);
        self.registry.register(source, token, interests)?;
        self.next_token += 1;
        Ok(token)
    }

    /// Change the interests of an already registered descriptor.
    ///
    /// This is how the interface relay drops and restores its read
    /// interest as the uplink queue fills and drains.
    ///
    /// # Errors
    /// Returns an error if the descriptor cannot be reregistered.
    pub fn reregister<S>(
        &mut self,
        source: &mut S,
        token: Token,
        interests: Interest,
    ) -> io::Result<()>
    where
        S: Source + ?Sized,
    {
        self.registry.reregister(source, token, interests)
    }

    /// Remove a descriptor from the interest sets.
    ///
    /// # Errors
    /// Returns an error if the descriptor cannot be deregistered.
    pub fn deregister<S>(&mut self, source: &mut S) -> io::Result<()>
    where
        S: Source + ?Sized,
    {
        self.registry.deregister(source)
    }

    /// Record a terminal cause, ending the loop after the current step.
    ///
    /// The first recorded cause wins; later, more generic causes do not
    /// overwrite an earlier, more specific classification.
    pub fn set_quit(&mut self, cause: SessionError) {
        if self.quit.is_none() {
            debug!(cause = %cause, "terminal cause recorded");
            self.quit = Some(cause);
        }
    }

    /// The recorded terminal cause, if any.
    pub fn quit_cause(&self) -> Option<&SessionError> {
        self.quit.as_ref()
    }

    /// Whether a terminal cause has been recorded.
    pub fn is_quitting(&self) -> bool {
        self.quit.is_some()
    }

    pub(crate) fn take_quit(&mut self) -> Option<SessionError> {
        self.quit.take()
    }

    /// Stored reconnect policy: total time to keep retrying.
    pub fn reconnect_timeout(&self) -> Duration {
        self.reconnect_timeout
    }

    /// Stored reconnect policy: delay between attempts.
    pub fn reconnect_interval(&self) -> Duration {
        self.reconnect_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> SessionContext {
        let poll = mio::Poll::new().unwrap();
        let registry = poll.registry().try_clone().unwrap();
        SessionContext::new(registry, &SessionConfig::default())
    }

    #[test]
    fn test_first_quit_cause_wins() {
        let mut ctx = context();
        assert!(!ctx.is_quitting());

        ctx.set_quit(SessionError::RemoteTerminated("BYE".into()));
        ctx.set_quit(SessionError::Fatal("later, more generic".into()));

        assert!(matches!(
            ctx.quit_cause(),
            Some(SessionError::RemoteTerminated(_))
        ));
    }

    #[test]
    fn test_register_allocates_distinct_tokens() {
        let mut ctx = context();
        let mut a = mio::net::UdpSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let mut b = mio::net::UdpSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap();

        let ta = ctx.register(&mut a, Interest::READABLE).unwrap();
        let tb = ctx.register(&mut b, Interest::READABLE | Interest::WRITABLE).unwrap();

        assert_ne!(ta, tb);
        assert_ne!(ta, WAKER_TOKEN);
        assert_ne!(tb, WAKER_TOKEN);

        ctx.reregister(&mut a, ta, Interest::WRITABLE).unwrap();
        ctx.deregister(&mut a).unwrap();
        ctx.deregister(&mut b).unwrap();
    }

    #[test]
    fn test_reconnect_policy_is_stored_verbatim() {
        let poll = mio::Poll::new().unwrap();
        let registry = poll.registry().try_clone().unwrap();
        let config = SessionConfig {
            reconnect_timeout: Duration::from_secs(42),
            reconnect_interval: Duration::from_secs(7),
            ..SessionConfig::default()
        };
        let ctx = SessionContext::new(registry, &config);

        assert_eq!(ctx.reconnect_timeout(), Duration::from_secs(42));
        assert_eq!(ctx.reconnect_interval(), Duration::from_secs(7));
    }
}
