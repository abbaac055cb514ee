//! # Salvo Audio
//!
//! Playback scheduling for sound effects and commentary.
//!
//! The audio engine underneath can only honor a limited, asynchronous set of
//! playbacks, and the game loop may pause at any time. This crate decides
//! which requested sound actually plays, when, and in what relationship to
//! other sounds:
//! - Sound registry: descriptors, pools and sequences
//! - Reference resolution with pool round-robin and selector unwrapping
//! - Immediate queue: per-frame effect batches with per-asset throttling and
//!   on/off-screen presentation
//! - Commentary queue: a strictly serialized voice-over channel with
//!   staleness, throttling, a pause-aware fallback and stuck detection
//! - Sequence engine: ordered groups that cancel when their opener is skipped
//!
//! Everything runs on the caller's thread. The host calls
//! [`Scheduler::update`] once per render tick and reports engine completions
//! either through [`AudioBackend::poll_finished`] or
//! [`Scheduler::on_instance_finished`].
//!
//! # Example
//!
//! ```ignore
//! use salvo_audio::testing::{ManualClock, RecordingBackend};
//! use salvo_audio::{PlayOptions, Scheduler, SchedulerConfig, SoundOptions, StaticPreferences};
//!
//! let mut scheduler = Scheduler::new(
//!     SchedulerConfig::default(),
//!     RecordingBackend::new(),
//!     ManualClock::new(),
//!     StaticPreferences::default(),
//! );
//!
//! let shot = scheduler
//!     .register_sound(SoundOptions::new("sfx/shot.ogg").with_throttle(100))
//!     .expect("valid sound");
//!
//! scheduler.play_effect(&shot, None, PlayOptions::default());
//! scheduler.update();
//! assert_eq!(scheduler.backend().plays().len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod backend;
pub mod clock;
pub mod commentary;
pub mod config;
pub mod descriptor;
pub mod diagnostics;
pub mod immediate;
pub mod playback;
pub mod preferences;
pub mod reference;
pub mod registry;
pub mod resolver;
pub mod scheduler;
pub mod sequence;
pub mod spatial;
pub mod throttle;
pub mod timers;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::backend::*;
    pub use crate::clock::*;
    pub use crate::commentary::*;
    pub use crate::config::*;
    pub use crate::descriptor::*;
    pub use crate::diagnostics::*;
    pub use crate::immediate::*;
    pub use crate::playback::*;
    pub use crate::preferences::*;
    pub use crate::reference::*;
    pub use crate::registry::*;
    pub use crate::resolver::*;
    pub use crate::scheduler::*;
    pub use crate::sequence::*;
    pub use crate::spatial::*;
    pub use crate::throttle::*;
    pub use crate::timers::*;
}

pub use prelude::*;
pub use salvo_common::{
    AudioError, EntryId, InstanceId, Millis, PoolId, RegistryError, SalvoError, SalvoResult,
    SequenceId, SequenceRunId, SoundId,
};
