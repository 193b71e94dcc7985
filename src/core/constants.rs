//! Reserved return codes and default policy values.
//!
//! The numeric codes mirror the classic errno-flavored contract of VPN
//! mainloop implementations: `0` is reserved exclusively for a
//! caller-requested pause, every terminal stop is a negative value.

use std::time::Duration;

// =============================================================================
// RESERVED RETURN CODES
// =============================================================================

/// Caller-requested pause; the session is resumable.
pub const PAUSED: i32 = 0;

/// Aborted locally through the command channel (EINTR).
pub const ERR_INTERRUPTED: i32 = -4;

/// Generic I/O or driver failure (EIO). Fallback for every cause without
/// a more specific code.
pub const ERR_IO: i32 = -5;

/// Allocation failure while queueing a packet (ENOMEM).
pub const ERR_ALLOC: i32 = -12;

/// Authentication or cookie expired at the gateway (EPERM).
pub const ERR_AUTH_EXPIRED: i32 = -1;

/// Remote end explicitly terminated the session (EPIPE).
pub const ERR_REMOTE_TERMINATED: i32 = -32;

// =============================================================================
// DEFAULT POLICY VALUES
// =============================================================================

/// Default total time to keep retrying a lost connection.
///
/// Stored and forwarded to the caller's reconnect policy; the session core
/// itself never enacts reconnection.
pub const DEFAULT_RECONNECT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default delay between reconnection attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(10);

/// Default period between unreliable-transport session attempts.
pub const DEFAULT_UNRELIABLE_ATTEMPT_PERIOD: Duration = Duration::from_secs(60);

/// Default capacity of the readiness event buffer.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;
