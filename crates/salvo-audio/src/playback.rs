//! Playback requests, queue entries and outcomes.

use std::fmt;
use std::rc::Rc;

use salvo_common::{EntryId, Millis, SequenceRunId, SoundId};
use serde::{Deserialize, Serialize};

use crate::backend::PlayParams;

/// Callback invoked once when a request reaches a terminal state.
pub type FinishHandler = Rc<dyn Fn(&PlaybackOutcome)>;

/// Why a request did not play.
///
/// Handlers that only look at [`PlaybackOutcome::skipped`] cannot tell these
/// apart; the reason exists for logging and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkipReason {
    /// Sound or commentary switched off.
    Disabled,
    /// Same asset played within its throttle window.
    Throttled,
    /// Waited in the queue longer than its max delay.
    Stale,
    /// Dropped because its sequence opener was skipped.
    Cancelled,
    /// Stopped explicitly by a call site.
    Stopped,
    /// Abandoned by the pause fallback.
    Stalled,
    /// Nothing playable behind the reference.
    Unresolved,
    /// The audio backend refused the sound.
    BackendFailure,
}

/// Where an entry sits inside a sequence playthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequencePosition {
    /// Playthrough the entry belongs to.
    pub run: SequenceRunId,
    /// Zero-based step index.
    pub offset: usize,
    /// Total number of steps.
    pub length: usize,
}

impl SequencePosition {
    /// Whether this is a step after the opener.
    #[must_use]
    pub const fn is_continuing(&self) -> bool {
        self.offset > 0
    }

    /// Whether this is the final step.
    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.offset + 1 >= self.length
    }
}

/// Result passed to finish handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackOutcome {
    /// Sound that played or was skipped, if one was resolved.
    pub sound: Option<SoundId>,
    /// True when the request did not actually play.
    pub skipped: bool,
    /// Why it was skipped.
    pub reason: Option<SkipReason>,
    /// Sequence position, for sequence steps and sequence completions.
    pub sequence: Option<SequencePosition>,
}

impl PlaybackOutcome {
    /// Outcome of a sound that played to completion.
    #[must_use]
    pub const fn played(sound: SoundId) -> Self {
        Self {
            sound: Some(sound),
            skipped: false,
            reason: None,
            sequence: None,
        }
    }

    /// Outcome of a request that did not play.
    #[must_use]
    pub const fn skipped(sound: Option<SoundId>, reason: SkipReason) -> Self {
        Self {
            sound,
            skipped: true,
            reason: Some(reason),
            sequence: None,
        }
    }

    /// Attach a sequence position.
    #[must_use]
    pub const fn in_sequence(mut self, position: Option<SequencePosition>) -> Self {
        self.sequence = position;
        self
    }
}

/// Per-request overrides supplied by a call site.
#[derive(Clone, Default)]
pub struct PlayOptions {
    /// Volume override (0.0-1.0).
    pub volume: Option<f32>,
    /// Pan override (-1.0-1.0).
    pub pan: Option<f32>,
    /// Playback rate override.
    pub playback_rate: Option<f32>,
    /// Loop count override.
    pub loops: Option<u32>,
    /// Skip the throttle check for this request.
    pub exempt_from_throttle: bool,
    /// Throttle window override in milliseconds.
    pub throttle_override_ms: Option<Millis>,
    /// Max queued time before the request is dropped as stale.
    pub max_delay_ms: Option<Millis>,
    /// Bypass both queues and play right away.
    pub immediate: bool,
    /// Called once when the request plays to completion or is skipped.
    pub on_finish: Option<FinishHandler>,
}

impl fmt::Debug for PlayOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayOptions")
            .field("volume", &self.volume)
            .field("pan", &self.pan)
            .field("playback_rate", &self.playback_rate)
            .field("loops", &self.loops)
            .field("exempt_from_throttle", &self.exempt_from_throttle)
            .field("throttle_override_ms", &self.throttle_override_ms)
            .field("max_delay_ms", &self.max_delay_ms)
            .field("immediate", &self.immediate)
            .field("on_finish", &self.on_finish.is_some())
            .finish()
    }
}

impl PlayOptions {
    /// Override volume.
    #[must_use]
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume.clamp(0.0, 1.0));
        self
    }

    /// Override pan.
    #[must_use]
    pub fn with_pan(mut self, pan: f32) -> Self {
        self.pan = Some(pan.clamp(-1.0, 1.0));
        self
    }

    /// Override playback rate.
    #[must_use]
    pub fn with_rate(mut self, rate: f32) -> Self {
        self.playback_rate = Some(rate.clamp(0.25, 4.0));
        self
    }

    /// Override loop count.
    #[must_use]
    pub fn with_loops(mut self, loops: u32) -> Self {
        self.loops = Some(loops);
        self
    }

    /// Never throttle this request.
    #[must_use]
    pub fn exempt_from_throttle(mut self) -> Self {
        self.exempt_from_throttle = true;
        self
    }

    /// Use a different throttle window for this request.
    #[must_use]
    pub fn with_throttle(mut self, window_ms: Millis) -> Self {
        self.throttle_override_ms = Some(window_ms);
        self
    }

    /// Drop the request if it waits longer than this.
    #[must_use]
    pub fn with_max_delay(mut self, max_delay_ms: Millis) -> Self {
        self.max_delay_ms = Some(max_delay_ms);
        self
    }

    /// Bypass the queues.
    #[must_use]
    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    /// Register a finish handler.
    #[must_use]
    pub fn on_finish(mut self, handler: impl Fn(&PlaybackOutcome) + 'static) -> Self {
        self.on_finish = Some(Rc::new(handler));
        self
    }
}

/// Channel a play was started on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Channel {
    /// Ordinary effect, via the immediate queue or the bypass.
    Effect,
    /// Commentary line; the ticket identifies the channel slot it held.
    Commentary {
        /// Slot ticket.
        ticket: u64,
    },
}

/// A queued request: resolved sound plus local options.
#[derive(Clone)]
pub struct QueueEntry {
    /// Entry id.
    pub id: EntryId,
    /// Resolved sound.
    pub sound: SoundId,
    /// Presentation computed at enqueue time.
    pub params: PlayParams,
    /// Wall time the entry was queued.
    pub enqueued_at: Millis,
    /// Exempt from the staleness check.
    pub exclude_delay: bool,
    /// Exempt from the throttle check.
    pub exclude_throttling: bool,
    /// Throttle window override.
    pub throttle_override_ms: Option<Millis>,
    /// Effective max delay.
    pub max_delay_ms: Option<Millis>,
    /// Sequence membership.
    pub sequence: Option<SequencePosition>,
    /// Marked for skipping by a stop request.
    pub skip: bool,
    /// Local finish handler.
    pub on_finish: Option<FinishHandler>,
}

impl fmt::Debug for QueueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueEntry")
            .field("id", &self.id)
            .field("sound", &self.sound)
            .field("enqueued_at", &self.enqueued_at)
            .field("max_delay_ms", &self.max_delay_ms)
            .field("sequence", &self.sequence)
            .field("skip", &self.skip)
            .finish_non_exhaustive()
    }
}

impl QueueEntry {
    /// Whether this entry continues a sequence past its opener.
    #[must_use]
    pub fn is_continuing(&self) -> bool {
        self.sequence.is_some_and(|p| p.is_continuing())
    }

    /// Whether the entry has waited at least its max delay.
    #[must_use]
    pub fn is_stale(&self, now: Millis) -> bool {
        self.max_delay_ms
            .is_some_and(|max| now.saturating_sub(self.enqueued_at) >= max)
    }
}

/// Invoke a finish handler, if any.
pub(crate) fn notify(handler: Option<&FinishHandler>, outcome: &PlaybackOutcome) {
    if let Some(handler) = handler {
        handler(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn entry(max_delay_ms: Option<Millis>) -> QueueEntry {
        QueueEntry {
            id: EntryId::from_raw(1),
            sound: SoundId::from_index(0),
            params: PlayParams::default(),
            enqueued_at: 1000,
            exclude_delay: false,
            exclude_throttling: false,
            throttle_override_ms: None,
            max_delay_ms,
            sequence: None,
            skip: false,
            on_finish: None,
        }
    }

    #[test]
    fn test_staleness_boundary() {
        let e = entry(Some(300));
        assert!(!e.is_stale(1299));
        assert!(e.is_stale(1300));
        assert!(!entry(None).is_stale(u64::MAX));
    }

    #[test]
    fn test_sequence_position() {
        let run = SequenceRunId::from_raw(1);
        let opener = SequencePosition {
            run,
            offset: 0,
            length: 3,
        };
        let last = SequencePosition { offset: 2, ..opener };
        assert!(!opener.is_continuing());
        assert!(!opener.is_last());
        assert!(last.is_continuing());
        assert!(last.is_last());
    }

    #[test]
    fn test_play_options_builder() {
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let options = PlayOptions::default()
            .with_volume(2.0)
            .with_pan(-0.5)
            .with_max_delay(800)
            .immediate()
            .on_finish(move |_| seen.set(seen.get() + 1));

        assert_eq!(options.volume, Some(1.0));
        assert_eq!(options.pan, Some(-0.5));
        assert_eq!(options.max_delay_ms, Some(800));
        assert!(options.immediate);

        notify(
            options.on_finish.as_ref(),
            &PlaybackOutcome::skipped(None, SkipReason::Disabled),
        );
        assert_eq!(calls.get(), 1);
    }
}
