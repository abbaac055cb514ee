//! The playback scheduler.
//!
//! One [`Scheduler`] per process owns the registry, both queues, the sequence
//! book, the shared throttle ledger and the timers, and drives the injected
//! collaborators. All state changes happen synchronously inside calls made by
//! the host; there are no threads and no locks.

use std::rc::Rc;

use ahash::AHashMap;
use glam::Vec2;
use salvo_common::{EntryId, IdGenerator, InstanceId, Millis, RegistryError, SoundId};
use tracing::{debug, info, trace, warn};

use crate::backend::{AudioBackend, PlayParams};
use crate::clock::Clock;
use crate::commentary::CommentaryQueue;
use crate::config::SchedulerConfig;
use crate::descriptor::{PendingPlay, SoundDescriptor, SoundOptions};
use crate::immediate::ImmediateQueue;
use crate::playback::{
    notify, Channel, FinishHandler, PlayOptions, PlaybackOutcome, QueueEntry, SkipReason,
};
use crate::preferences::Preferences;
use crate::reference::SoundRef;
use crate::registry::{PoolOptions, SoundRegistry};
use crate::sequence::SequenceBook;
use crate::spatial::Listener;
use crate::throttle::ThrottleLedger;
use crate::timers::TimerQueue;

/// Deferred scheduler work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerAction {
    /// Start the continuing sequence step parked for this commentary slot.
    StartCommentary {
        /// Slot ticket.
        ticket: u64,
    },
    /// Pause fallback re-check for this commentary slot.
    FallbackRecheck {
        /// Slot ticket at arming time.
        ticket: u64,
    },
}

/// Sound effect and commentary scheduler.
pub struct Scheduler<B, C, P> {
    pub(crate) config: SchedulerConfig,
    pub(crate) backend: B,
    pub(crate) clock: C,
    pub(crate) preferences: P,
    pub(crate) registry: SoundRegistry,
    pub(crate) rng: fastrand::Rng,
    pub(crate) throttle: ThrottleLedger,
    pub(crate) immediate: ImmediateQueue,
    pub(crate) commentary: CommentaryQueue,
    pub(crate) sequences: SequenceBook,
    pub(crate) timers: TimerQueue<TimerAction>,
    pub(crate) instances: AHashMap<InstanceId, SoundId>,
    pub(crate) listener: Listener,
    entry_ids: IdGenerator,
}

impl<B, C, P> std::fmt::Debug for Scheduler<B, C, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("immediate", &self.immediate.len())
            .field("commentary", &self.commentary.len())
            .field("live_instances", &self.instances.len())
            .field("timers", &self.timers.len())
            .finish_non_exhaustive()
    }
}

impl<B: AudioBackend, C: Clock, P: Preferences> Scheduler<B, C, P> {
    /// Create a scheduler around its collaborators.
    pub fn new(mut config: SchedulerConfig, backend: B, clock: C, preferences: P) -> Self {
        config.validate();
        let rng = config
            .shuffle_seed
            .map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        let listener = Listener::from_config(&config);

        info!(
            "Audio scheduler ready (fallback {}ms, sequence gap {}ms)",
            config.fallback_interval_ms, config.sequence_gap_ms
        );

        Self {
            config,
            backend,
            clock,
            preferences,
            registry: SoundRegistry::new(),
            rng,
            throttle: ThrottleLedger::new(),
            immediate: ImmediateQueue::new(),
            commentary: CommentaryQueue::new(),
            sequences: SequenceBook::new(),
            timers: TimerQueue::new(),
            instances: AHashMap::new(),
            listener,
            entry_ids: IdGenerator::new(),
        }
    }

    // === Registration ===

    /// Register a sound. Its instance is created on first resolution.
    pub fn register_sound(&mut self, options: SoundOptions) -> Result<SoundRef, RegistryError> {
        let ratio = self.config.off_screen_volume_ratio;
        let sound = self.registry.register_sound(options, ratio)?;
        if let Some(desc) = self.registry.sound(sound) {
            self.throttle.reserve(desc.primary_url(), desc.throttle_ms());
        }
        Ok(SoundRef::Sound(sound))
    }

    /// Register a pool of interchangeable variants.
    pub fn register_pool(
        &mut self,
        items: Vec<SoundRef>,
        options: PoolOptions,
    ) -> Result<SoundRef, RegistryError> {
        self.registry
            .register_pool(items, options)
            .map(SoundRef::Pool)
    }

    /// Register a sequence. Only its first step may be dropped for lateness
    /// or repetition.
    pub fn register_sequence(&mut self, refs: Vec<SoundRef>) -> Result<SoundRef, RegistryError> {
        self.registry
            .register_sequence(refs, None)
            .map(SoundRef::Sequence)
    }

    /// Register a sequence whose max delay applies to every step.
    pub fn register_sequence_with_max_delay(
        &mut self,
        refs: Vec<SoundRef>,
        max_delay_ms: Millis,
    ) -> Result<SoundRef, RegistryError> {
        self.registry
            .register_sequence(refs, Some(max_delay_ms))
            .map(SoundRef::Sequence)
    }

    // === Frame Driving ===

    /// Once-per-render-tick entry point.
    ///
    /// Delivers backend completions, fires due timers, then flushes the
    /// immediate queue, which in turn gives the commentary channel a chance
    /// to progress.
    pub fn update(&mut self) {
        for instance in self.backend.poll_finished() {
            self.on_instance_finished(instance);
        }
        self.fire_due_timers();
        self.flush_immediate_queue();
    }

    fn fire_due_timers(&mut self) {
        let due = self
            .timers
            .take_due(self.clock.game_ms(), self.clock.wall_ms());
        for action in due {
            match action {
                TimerAction::StartCommentary { ticket } => self.start_delayed_commentary(ticket),
                TimerAction::FallbackRecheck { ticket } => self.pause_fallback(ticket),
            }
        }
    }

    /// Completion of one `play` call on an instance.
    ///
    /// Unknown or already torn-down instances are ignored, so a duplicate
    /// completion can never tear anything down twice.
    pub fn on_instance_finished(&mut self, instance: InstanceId) {
        let Some(&sound) = self.instances.get(&instance) else {
            trace!("Ignoring completion for unknown {instance}");
            return;
        };
        let Some(desc) = self.registry.sound_mut(sound) else {
            return;
        };
        let retain = desc.retain_instance();
        let Some(live) = desc.instance.as_mut() else {
            return;
        };
        let Some(play) = live.pending.pop_front() else {
            trace!("No pending play on {instance}");
            return;
        };
        let idle = live.pending.is_empty();

        let outcome = match play.stopped {
            Some(reason) => PlaybackOutcome::skipped(Some(sound), reason),
            None => PlaybackOutcome::played(sound),
        }
        .in_sequence(play.sequence);
        debug!(
            "{} finished {} (skipped: {})",
            sound, play.entry, outcome.skipped
        );

        if idle && !retain {
            self.release_instance(sound, false);
        }
        self.notify_entry(play.on_finish.as_ref(), sound, &outcome);

        if let Channel::Commentary { ticket } = play.channel {
            self.commentary_finished(ticket, &outcome);
        }
    }

    // === Call-Site Controls ===

    /// Stop a reference: skip its queued entries and cut short any playing
    /// instance.
    ///
    /// Playing instances are muted and seeked to their end so the backend
    /// completes them normally; their handlers see `skipped`.
    pub fn stop(&mut self, r: &SoundRef) {
        let members = self.registry.members(r);
        if members.is_empty() {
            debug!("Nothing to stop for {r:?}");
            return;
        }

        let skipped = self.immediate.mark_skip(|e| members.contains(&e.sound))
            + self.commentary.mark_skip(|e| members.contains(&e.sound));
        debug!("Stopping {r:?}: {skipped} queued entries marked");

        for sound in members {
            if self.registry.sound(sound).is_some_and(SoundDescriptor::is_playing) {
                self.silence(sound, SkipReason::Stopped, |_| true);
            } else {
                self.release_instance(sound, false);
            }
        }
        self.drain_commentary();
    }

    /// Stop everything: both queues and every playing instance.
    pub fn stop_all(&mut self) {
        let skipped =
            self.immediate.mark_skip(|_| true) + self.commentary.mark_skip(|_| true);
        info!("Stopping all audio ({skipped} queued entries)");

        let armed: Vec<SoundId> = self.instances.values().copied().collect();
        for sound in armed {
            if self.registry.sound(sound).is_some_and(SoundDescriptor::is_playing) {
                self.silence(sound, SkipReason::Stopped, |_| true);
            } else {
                self.release_instance(sound, false);
            }
        }
        self.drain_commentary();
    }

    /// Tear down idle instances behind a reference, including retained ones.
    pub fn release(&mut self, r: &SoundRef) {
        for sound in self.registry.members(r) {
            if self.registry.sound(sound).is_some_and(SoundDescriptor::is_playing) {
                debug!("Not releasing {sound}: still playing");
                continue;
            }
            self.release_instance(sound, true);
        }
    }

    /// Move the reference listener.
    pub fn set_listener(&mut self, listener: Listener) {
        self.listener = listener;
    }

    /// Move the reference listener to a position.
    pub fn set_listener_position(&mut self, position: Vec2) {
        self.listener.position = position;
    }

    // === Accessors ===

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The audio backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// The audio backend, mutably.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The clock.
    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// The clock, mutably.
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// The preference source.
    #[must_use]
    pub const fn preferences(&self) -> &P {
        &self.preferences
    }

    /// The preference source, mutably.
    pub fn preferences_mut(&mut self) -> &mut P {
        &mut self.preferences
    }

    /// The registry.
    #[must_use]
    pub const fn registry(&self) -> &SoundRegistry {
        &self.registry
    }

    /// The shared throttle ledger.
    #[must_use]
    pub const fn throttle(&self) -> &ThrottleLedger {
        &self.throttle
    }

    /// The reference listener.
    #[must_use]
    pub const fn listener(&self) -> &Listener {
        &self.listener
    }

    /// A registered sound.
    #[must_use]
    pub fn descriptor(&self, sound: SoundId) -> Option<&SoundDescriptor> {
        self.registry.sound(sound)
    }

    /// Live instance of a sound, if armed.
    #[must_use]
    pub fn instance_of(&self, sound: SoundId) -> Option<InstanceId> {
        self.registry.sound(sound).and_then(SoundDescriptor::instance_id)
    }

    /// Number of materialized instances.
    #[must_use]
    pub fn live_instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Entries waiting for the next flush.
    #[must_use]
    pub fn immediate_len(&self) -> usize {
        self.immediate.len()
    }

    /// Entries waiting on the commentary channel.
    #[must_use]
    pub fn commentary_len(&self) -> usize {
        self.commentary.len()
    }

    /// Whether nothing is queued, in flight or pending on a timer.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.immediate.is_empty()
            && self.commentary.is_empty()
            && !self.commentary.is_processing()
            && self.timers.is_empty()
    }

    // === Internals ===

    pub(crate) fn now(&self) -> Millis {
        self.clock.wall_ms()
    }

    /// Build a queue entry with presentation and local overrides applied.
    pub(crate) fn build_entry(
        &self,
        sound: SoundId,
        target: Option<Vec2>,
        options: PlayOptions,
    ) -> QueueEntry {
        let desc = self.registry.sound(sound);
        let (on_screen, off_screen) = desc.map_or((1.0, self.config.off_screen_volume_ratio), |d| {
            (d.on_screen_volume(), d.off_screen_volume())
        });
        let presentation = self
            .listener
            .present(target, on_screen, off_screen, self.config.max_pan);

        let fixed_rate = desc.is_some_and(SoundDescriptor::fixed_rate);
        let params = PlayParams {
            volume: options.volume.unwrap_or(presentation.volume),
            pan: options.pan.unwrap_or(presentation.pan),
            playback_rate: if fixed_rate {
                1.0
            } else {
                options.playback_rate.unwrap_or(1.0)
            },
            loops: options
                .loops
                .unwrap_or_else(|| desc.map_or(0, SoundDescriptor::loops)),
        };

        QueueEntry {
            id: EntryId::from_raw(self.entry_ids.next()),
            sound,
            params,
            enqueued_at: self.now(),
            exclude_delay: false,
            exclude_throttling: options.exempt_from_throttle,
            throttle_override_ms: options.throttle_override_ms,
            max_delay_ms: options
                .max_delay_ms
                .or_else(|| desc.and_then(SoundDescriptor::max_delay_ms))
                .or(self.config.default_max_delay_ms),
            sequence: None,
            skip: false,
            on_finish: options.on_finish,
        }
    }

    /// Hand an entry to the backend.
    ///
    /// On failure the entry comes back with the reason so the caller can
    /// synthesize a skip on the right channel.
    pub(crate) fn start_playback(
        &mut self,
        entry: QueueEntry,
        channel: Channel,
    ) -> Result<(), (QueueEntry, SkipReason)> {
        let instance = match self.materialize(entry.sound) {
            Ok(instance) => instance,
            Err(reason) => return Err((entry, reason)),
        };
        if let Err(e) = self.backend.play(instance, &entry.params) {
            warn!("Backend refused to play {}: {e}", entry.sound);
            return Err((entry, SkipReason::BackendFailure));
        }

        let now = self.now();
        if let Some(desc) = self.registry.sound_mut(entry.sound) {
            desc.last_played = Some(now);
            let window = entry
                .throttle_override_ms
                .map_or(desc.throttle_ms(), |w| w.max(desc.throttle_ms()));
            self.throttle.record(desc.primary_url(), now, window);
            if let Some(live) = desc.instance.as_mut() {
                live.pending.push_back(PendingPlay {
                    entry: entry.id,
                    channel,
                    sequence: entry.sequence,
                    on_finish: entry.on_finish,
                    stopped: None,
                });
            }
        }
        trace!("Started {} on {instance} ({})", entry.sound, entry.id);
        Ok(())
    }

    /// Destroy a sound's instance if nothing is playing on it.
    ///
    /// Retained instances survive unless `include_retained` is set.
    pub(crate) fn release_instance(&mut self, sound: SoundId, include_retained: bool) {
        let Some(desc) = self.registry.sound_mut(sound) else {
            return;
        };
        if desc.is_playing() || (desc.retain_instance() && !include_retained) {
            return;
        }
        let Some(mut live) = desc.instance.take() else {
            return;
        };
        if live.token.complete() {
            self.instances.remove(&live.id);
            self.backend.destroy(live.id);
            trace!("Tore down {} for {sound}", live.id);
        }
    }

    /// Cut short the pending plays of a sound that match `filter`.
    ///
    /// Marked plays report `reason` on completion. The instance is muted and
    /// seeked to its end (or stopped when the length is unknown) so the
    /// backend delivers the completion itself.
    pub(crate) fn silence(
        &mut self,
        sound: SoundId,
        reason: SkipReason,
        filter: impl Fn(&PendingPlay) -> bool,
    ) {
        let Some(live) = self
            .registry
            .sound_mut(sound)
            .and_then(|d| d.instance.as_mut())
        else {
            return;
        };

        let mut marked = 0;
        for play in live.pending.iter_mut().filter(|p| filter(p)) {
            play.stopped.get_or_insert(reason);
            marked += 1;
        }
        if marked == 0 {
            return;
        }

        let instance = live.id;
        self.backend.mute(instance);
        match self.backend.duration_ms(instance) {
            Some(end) => self.backend.set_position(instance, end),
            None => self.backend.stop(instance),
        }
        debug!("Silenced {sound} on {instance} ({reason:?})");
    }

    /// Fire the local handler, then the sound's own handler if distinct.
    pub(crate) fn notify_entry(
        &self,
        local: Option<&FinishHandler>,
        sound: SoundId,
        outcome: &PlaybackOutcome,
    ) {
        notify(local, outcome);
        let own = self
            .registry
            .sound(sound)
            .and_then(SoundDescriptor::on_finish);
        if let Some(own) = own {
            if local.map_or(true, |l| !Rc::ptr_eq(l, own)) {
                own(outcome);
            }
        }
    }
}
