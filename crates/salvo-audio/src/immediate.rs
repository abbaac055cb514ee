//! Per-frame effect batching.
//!
//! Effects requested during a frame are collected and flushed together on
//! the next [`Scheduler::update`]. Throttling is evaluated at flush time
//! against the shared ledger, so a burst of identical requests inside one
//! frame plays the asset once.

use glam::Vec2;
use salvo_common::Millis;
use tracing::{debug, trace};

use crate::backend::AudioBackend;
use crate::clock::Clock;
use crate::descriptor::SoundDescriptor;
use crate::playback::{
    notify, Channel, FinishHandler, PlayOptions, PlaybackOutcome, QueueEntry, SkipReason,
};
use crate::preferences::Preferences;
use crate::reference::SoundRef;
use crate::resolver::Resolved;
use crate::scheduler::Scheduler;

/// Effects waiting for the next flush.
#[derive(Debug, Default)]
pub struct ImmediateQueue {
    entries: Vec<QueueEntry>,
}

impl ImmediateQueue {
    /// Create an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Queue an entry for the next flush.
    pub fn push(&mut self, entry: QueueEntry) {
        self.entries.push(entry);
    }

    /// Queued entries, in request order.
    #[must_use]
    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    /// Number of queued entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mark matching entries to be skipped at flush. Returns how many.
    pub fn mark_skip(&mut self, matches: impl Fn(&QueueEntry) -> bool) -> usize {
        let mut marked = 0;
        for entry in self.entries.iter_mut().filter(|e| !e.skip && matches(e)) {
            entry.skip = true;
            marked += 1;
        }
        marked
    }
}

impl<B: AudioBackend, C: Clock, P: Preferences> Scheduler<B, C, P> {
    /// Request an effect.
    ///
    /// The reference is resolved now, with presentation computed against the
    /// current listener. The play itself happens at the next flush unless the
    /// request or the sound asks to bypass the queue. Sequences are routed to
    /// the sequence engine.
    pub fn play_effect(&mut self, r: &SoundRef, target: Option<Vec2>, options: PlayOptions) {
        match self.resolve(r) {
            Err(reason) => {
                debug!("Effect {r:?} not played: {reason:?}");
                self.skip_unresolved(r, options.on_finish.as_ref(), reason);
            },
            Ok(Resolved::Sequence(sequence)) => self.play_sequence(sequence, target, options),
            Ok(Resolved::Sound(sound)) => {
                let bypass = options.immediate
                    || self
                        .registry
                        .sound(sound)
                        .is_some_and(SoundDescriptor::play_immediately);
                let entry = self.build_entry(sound, target, options);
                if bypass {
                    trace!("Playing {sound} immediately");
                    self.play_effect_now(entry);
                } else {
                    trace!("Queued {sound} for the next flush ({})", entry.id);
                    self.immediate.push(entry);
                }
            },
        }
    }

    /// Flush the immediate queue.
    ///
    /// Each entry is skipped if stopped or throttled and played otherwise.
    /// The queue is cleared in place, the throttle ledger is pruned, and the
    /// commentary channel gets a chance to progress.
    pub fn flush_immediate_queue(&mut self) {
        let now = self.now();
        let mut batch = std::mem::take(&mut self.immediate.entries);
        if !batch.is_empty() {
            trace!("Flushing {} effects", batch.len());
        }

        for entry in batch.drain(..) {
            if entry.skip {
                self.skip_effect(entry, SkipReason::Stopped);
            } else if !entry.exclude_throttling && self.is_throttled(&entry, now) {
                self.skip_effect(entry, SkipReason::Throttled);
            } else {
                self.play_effect_now(entry);
            }
        }

        // Keep the allocation; anything queued by a handler goes after it
        batch.append(&mut self.immediate.entries);
        self.immediate.entries = batch;

        self.throttle.prune(now, self.config.throttle_retention_ms);
        self.drain_commentary();
    }

    /// Whether an entry's asset played within its throttle window.
    pub(crate) fn is_throttled(&self, entry: &QueueEntry, now: Millis) -> bool {
        let Some(desc) = self.registry.sound(entry.sound) else {
            return false;
        };
        let window = entry.throttle_override_ms.unwrap_or_else(|| desc.throttle_ms());
        self.throttle.is_throttled(desc.primary_url(), window, now)
    }

    pub(crate) fn play_effect_now(&mut self, entry: QueueEntry) {
        if let Err((entry, reason)) = self.start_playback(entry, Channel::Effect) {
            self.skip_effect(entry, reason);
        }
    }

    /// Report a request that never resolved. A directly referenced sound
    /// gets its own handler fired too, as on the drain-time skip path.
    pub(crate) fn skip_unresolved(
        &self,
        r: &SoundRef,
        on_finish: Option<&FinishHandler>,
        reason: SkipReason,
    ) {
        let outcome = PlaybackOutcome::skipped(r.sound_id(), reason);
        match r.sound_id() {
            Some(sound) => self.notify_entry(on_finish, sound, &outcome),
            None => notify(on_finish, &outcome),
        }
    }

    fn skip_effect(&mut self, entry: QueueEntry, reason: SkipReason) {
        debug!("Skipping effect {} ({reason:?})", entry.sound);
        let outcome = PlaybackOutcome::skipped(Some(entry.sound), reason);
        self.release_instance(entry.sound, false);
        self.notify_entry(entry.on_finish.as_ref(), entry.sound, &outcome);
    }
}
