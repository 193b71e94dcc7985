//! TUNDRA - Core Types
//!
//! Error taxonomy and protocol constants shared by every layer:
//!
//! - **Errors**: [`SessionError`] (terminal stop causes) and [`QueueError`]
//! - **Constants**: reserved return codes and default policy values
//!
//! Everything else in the crate builds on these; this module has no
//! dependencies on the queue, timing, or session layers.

pub mod constants;
pub mod error;

pub use constants::*;
pub use error::{QueueError, SessionError};
