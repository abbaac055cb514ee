//! ID types for registered sounds and scheduled playback.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic source of raw ids for runtime objects.
#[derive(Debug)]
pub struct IdGenerator {
    next_id: AtomicU64,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    /// Create a generator starting at 1 (0 is reserved as null).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// Generate the next raw id.
    pub fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

macro_rules! index_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an id from an arena index.
            #[must_use]
            pub const fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            /// Returns the arena index.
            #[must_use]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

macro_rules! raw_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Creates an id from a raw value.
            #[must_use]
            pub const fn from_raw(value: u64) -> Self {
                Self(value)
            }

            /// Returns the raw id value.
            #[must_use]
            pub const fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

index_id!(
    /// Registered sound descriptor.
    SoundId,
    "sound"
);
index_id!(
    /// Registered pool of interchangeable sounds.
    PoolId,
    "pool"
);
index_id!(
    /// Registered sequence of sounds.
    SequenceId,
    "sequence"
);
raw_id!(
    /// Playback instance handed out by the audio backend.
    InstanceId,
    "instance"
);
raw_id!(
    /// Entry in one of the playback queues.
    EntryId,
    "entry"
);
raw_id!(
    /// One playthrough of a sequence.
    SequenceRunId,
    "run"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_id_roundtrip() {
        let id = SoundId::from_index(7);
        assert_eq!(id.index(), 7);
        assert_eq!(id.to_string(), "sound#7");
    }

    #[test]
    fn test_raw_id_display() {
        assert_eq!(InstanceId::from_raw(3).to_string(), "instance#3");
        assert_eq!(SequenceRunId::from_raw(12).raw(), 12);
    }

    #[test]
    fn test_generator_starts_at_one() {
        let generator = IdGenerator::new();
        assert_eq!(generator.next(), 1);
        assert_eq!(generator.next(), 2);
    }
}
