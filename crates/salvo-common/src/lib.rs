//! # Salvo Common
//!
//! Shared identifiers and error types for the Salvo audio subsystem.
//!
//! This crate provides the small vocabulary every other Salvo crate speaks:
//! - Typed identifiers for sounds, pools, sequences, playback instances and
//!   queue entries
//! - Millisecond timestamps
//! - Common error types

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod ids;

/// Timestamp or duration in milliseconds.
pub type Millis = u64;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::Millis;
}

pub use prelude::*;
