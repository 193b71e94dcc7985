//! Error types for the TUNDRA session core.

use std::collections::TryReserveError;
use std::io;

use thiserror::Error;

use super::constants;

/// Errors that can occur when queueing a packet.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The packet buffer could not be allocated. The queue is unmodified.
    #[error("packet allocation failed: {0}")]
    Alloc(#[from] TryReserveError),
}

/// Terminal causes for a stopped session.
///
/// Drivers classify their own faults; the session loop trusts the
/// classification and only attaches the matching reserved return code.
/// Transient conditions (an empty readiness wait, an ordinary timeout
/// expiry) are never surfaced through this type.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Aborted locally through the command channel.
    #[error("aborted by caller")]
    Interrupted,

    /// The remote end explicitly terminated the session.
    #[error("remote end terminated the session: {0}")]
    RemoteTerminated(String),

    /// The gateway rejected our credentials (expired cookie or session).
    #[error("authentication expired: {0}")]
    AuthExpired(String),

    /// A packet buffer could not be allocated.
    #[error(transparent)]
    Allocation(#[from] QueueError),

    /// I/O error reported by a driver.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Any other driver-reported fatal condition.
    #[error("{0}")]
    Fatal(String),
}

impl SessionError {
    /// The reserved negative return code for this cause.
    ///
    /// `0` is never produced here; it is reserved for the pause return of
    /// the session loop.
    pub fn code(&self) -> i32 {
        match self {
            SessionError::Interrupted => constants::ERR_INTERRUPTED,
            SessionError::RemoteTerminated(_) => constants::ERR_REMOTE_TERMINATED,
            SessionError::AuthExpired(_) => constants::ERR_AUTH_EXPIRED,
            SessionError::Allocation(_) => constants::ERR_ALLOC,
            SessionError::Io(_) | SessionError::Fatal(_) => constants::ERR_IO,
        }
    }
}
