//! # TUNDRA
//!
//! **TUN**nel **DR**iver **A**gent
//!
//! TUNDRA is the session-sustaining core of a remote-access VPN client:
//! the loop that keeps an encrypted tunnel alive across two parallel
//! transports while relaying packets to and from a local virtual network
//! interface and answering to external pause/cancel commands. It provides:
//!
//! - **Readiness multiplexing**: one blocking wait across a variable set
//!   of descriptors with different roles, driven by [mio]
//! - **Timeout arithmetic**: a single minimal wait interval derived from
//!   several independently armed deadlines ([`Timeout`])
//! - **Liveness management**: a deadline-based keepalive/dead-peer-detection
//!   state machine that never falsely declares a live peer dead nor floods
//!   it with probes ([`KeepaliveState`])
//! - **External control**: cooperative pause (resumable) and cancel
//!   (terminal) from any thread ([`session::CommandHandle`])
//!
//! Handshake negotiation, record encryption, tun read/write mechanics, and
//! authentication are external collaborators, supplied through the narrow
//! per-cycle driver traits in [`session::driver`].
//!
//! ## Modules
//!
//! - [`core`]: Error taxonomy, reserved return codes, default policy values
//! - [`queue`]: Owned packets and the FIFO packet queue
//! - [`timing`]: Tighten-only timeouts and the keepalive/DPD scheduler
//! - [`session`]: The main loop, its context, and the collaborator contracts
//!
//! ## Example Usage
//!
//! ```ignore
//! use tundra_vpn::prelude::*;
//!
//! let config = SessionConfigBuilder::new()
//!     .unreliable_attempt_period(Some(std::time::Duration::from_secs(60)))
//!     .build();
//!
//! // tls, dtls, and tun implement the collaborator traits.
//! let (mut session, handle) = Session::new(config, tls, Some(dtls), tun)?;
//!
//! match session.run() {
//!     Ok(()) => { /* paused; call session.run() again to resume */ }
//!     Err(cause) => eprintln!("session stopped: {cause} ({})", cause.code()),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod core;
pub mod queue;
pub mod session;
pub mod timing;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::{QueueError, SessionError};
    pub use crate::queue::{Packet, PacketQueue};
    pub use crate::session::{
        CommandHandle, DriveResult, InterfaceRelay, ReliableTransport, Session, SessionConfig,
        SessionConfigBuilder, SessionContext, UnreliablePhase, UnreliableTransport,
    };
    pub use crate::timing::{KeepaliveAction, KeepaliveState, Timeout};
}

// Re-export commonly used items at crate root
pub use crate::core::{QueueError, SessionError};
pub use queue::{Packet, PacketQueue};
pub use session::{Session, SessionConfig, SessionContext};
pub use timing::{KeepaliveAction, KeepaliveState, Timeout};
