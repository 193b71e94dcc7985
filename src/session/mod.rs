//! TUNDRA - Session Layer
//!
//! The top-level driver that keeps an encrypted tunnel alive across two
//! parallel transports while relaying packets to and from the local
//! virtual interface:
//!
//! - **Main loop**: [`Session`] with the fixed per-cycle driver protocol
//! - **Collaborator contracts**: [`ReliableTransport`], [`UnreliableTransport`],
//!   [`InterfaceRelay`]
//! - **Shared state**: [`SessionContext`] (interest sets, packet queues,
//!   quit cause, stored reconnect policy)
//! - **External commands**: [`CommandHandle`] for pause/cancel from other
//!   threads
//! - **Configuration**: [`SessionConfig`] and its builder
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                Session loop                   │  ← this module
//! │  unreliable → reliable → relay → commands     │
//! │        └── min-timeout readiness wait ──┘     │
//! ├──────────────┬───────────────┬───────────────┤
//! │  Unreliable  │   Reliable    │   Interface   │  ← caller-supplied
//! │  transport   │   transport   │     relay     │     drivers
//! └──────────────┴───────────────┴───────────────┘
//! ```
//!
//! Single-threaded and cooperative: one logical thread owns the loop, the
//! drivers, and all shared state. The only suspension point is the bounded
//! readiness wait; everything else is synchronous and non-blocking by
//! contract.

pub mod command;
pub mod config;
pub mod context;
pub mod driver;
pub mod mainloop;

pub use command::{CommandChannel, CommandHandle};
pub use config::{SessionConfig, SessionConfigBuilder};
pub use context::SessionContext;
pub use driver::{
    DriveResult, InterfaceRelay, ReliableTransport, UnreliablePhase, UnreliableTransport,
};
pub use mainloop::Session;
