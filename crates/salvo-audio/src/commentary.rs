//! Serialized commentary channel.
//!
//! Voice-over lines never overlap. The channel is either idle or holds
//! exactly one entry in flight; each time it frees up, the head of the queue
//! is checked for staleness, repetition and the commentary switch before it
//! is allowed to play.
//!
//! Normal progress comes from the backend completing the in-flight line, and
//! continuing sequence steps wait on a game-time gap. Neither happens while
//! the game is paused, so a wall-clock fallback re-checks the channel when
//! something is waiting behind a paused line.
//!
//! Each occupancy of the channel gets a ticket. Completions and timers carry
//! the ticket they were issued for and are ignored once the slot has moved
//! on, so a late completion from an abandoned line can never free the slot
//! held by the next one.

use std::collections::VecDeque;

use glam::Vec2;
use salvo_common::{EntryId, Millis, SoundId};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::backend::AudioBackend;
use crate::clock::Clock;
use crate::descriptor::SoundDescriptor;
use crate::playback::{Channel, PlayOptions, PlaybackOutcome, QueueEntry, SkipReason};
use crate::preferences::Preferences;
use crate::reference::SoundRef;
use crate::resolver::Resolved;
use crate::scheduler::{Scheduler, TimerAction};
use crate::timers::{TimerClock, TimerId};

/// Channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelState {
    /// Nothing in flight.
    Idle,
    /// One entry in flight.
    Draining,
}

/// Last commentary line handed to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPlayed {
    /// Queue entry.
    pub entry: EntryId,
    /// Sound played.
    pub sound: SoundId,
    /// Wall time playback started.
    pub started_at: Millis,
}

/// Current occupant of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InFlight {
    pub ticket: u64,
    pub entry: EntryId,
    pub sound: SoundId,
    pub since: Millis,
}

/// Continuing sequence step waiting out the gap before it starts.
#[derive(Debug)]
pub(crate) struct DelayedStep {
    pub ticket: u64,
    pub timer: TimerId,
    pub entry: QueueEntry,
}

enum Verdict {
    Play,
    Skip(SkipReason),
}

/// Commentary queue and channel state.
#[derive(Debug, Default)]
pub struct CommentaryQueue {
    pub(crate) entries: VecDeque<QueueEntry>,
    pub(crate) processing: bool,
    pub(crate) in_flight: Option<InFlight>,
    pub(crate) delayed: Option<DelayedStep>,
    pub(crate) fallback_armed: bool,
    pub(crate) last_played: Option<LastPlayed>,
    next_ticket: u64,
    stuck_reported: Option<EntryId>,
}

impl CommentaryQueue {
    /// Create an idle channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queued entries, head first.
    pub fn entries(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    /// Number of queued entries, not counting the one in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an entry holds the channel.
    #[must_use]
    pub const fn is_processing(&self) -> bool {
        self.processing
    }

    /// Channel state.
    #[must_use]
    pub const fn state(&self) -> ChannelState {
        if self.processing {
            ChannelState::Draining
        } else {
            ChannelState::Idle
        }
    }

    /// Last line handed to the backend.
    #[must_use]
    pub const fn last_played(&self) -> Option<LastPlayed> {
        self.last_played
    }

    /// Mark matching entries, including a step waiting out its gap, to be
    /// skipped when they reach the channel. Returns how many.
    pub fn mark_skip(&mut self, matches: impl Fn(&QueueEntry) -> bool) -> usize {
        let delayed = self.delayed.as_mut().map(|d| &mut d.entry);
        let mut marked = 0;
        for entry in self.entries.iter_mut().chain(delayed) {
            if !entry.skip && matches(entry) {
                entry.skip = true;
                marked += 1;
            }
        }
        marked
    }

    fn issue_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }
}

impl<B: AudioBackend, C: Clock, P: Preferences> Scheduler<B, C, P> {
    /// Request a commentary line.
    ///
    /// Sequences go to the sequence engine. Sounds declared "play
    /// immediately" go straight to the backend and never hold the channel.
    pub fn play_commentary(&mut self, r: &SoundRef, target: Option<Vec2>, options: PlayOptions) {
        match self.resolve(r) {
            Err(reason) => {
                debug!("Commentary {r:?} not played: {reason:?}");
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
                    trace!("Playing commentary {sound} outside the channel");
                    self.play_effect_now(entry);
                } else {
                    self.queue_commentary(entry);
                    self.drain_commentary();
                }
            },
        }
    }

    pub(crate) fn queue_commentary(&mut self, entry: QueueEntry) {
        trace!(
            "Queued commentary {} ({}, {} waiting)",
            entry.sound,
            entry.id,
            self.commentary.len()
        );
        self.commentary.entries.push_back(entry);
    }

    /// Advance the channel.
    ///
    /// Does nothing while an entry holds the channel, apart from arming the
    /// pause fallback. Otherwise pops entries until one starts or the queue
    /// runs dry, skipping those that are stale, repeated, stopped or
    /// disabled.
    pub fn drain_commentary(&mut self) {
        loop {
            self.check_stuck_commentary();
            if self.commentary.processing {
                self.arm_pause_fallback();
                return;
            }
            let Some(entry) = self.commentary.entries.pop_front() else {
                return;
            };
            match self.commentary_verdict(&entry) {
                Verdict::Skip(reason) => self.skip_commentary_entry(entry, reason),
                Verdict::Play => self.begin_commentary(entry),
            }
        }
    }

    fn commentary_verdict(&self, entry: &QueueEntry) -> Verdict {
        if !self.preferences.sound_enabled() || !self.preferences.commentary_enabled() {
            return Verdict::Skip(SkipReason::Disabled);
        }
        if entry.skip {
            return Verdict::Skip(SkipReason::Stopped);
        }
        if entry.is_continuing() {
            return Verdict::Play;
        }

        let now = self.now();
        if !entry.exclude_delay && entry.is_stale(now) {
            return Verdict::Skip(SkipReason::Stale);
        }
        if !entry.exclude_throttling && self.is_throttled(entry, now) {
            return Verdict::Skip(SkipReason::Throttled);
        }
        Verdict::Play
    }

    /// Take the channel for an entry. Continuing sequence steps wait out the
    /// gap on game time first.
    fn begin_commentary(&mut self, entry: QueueEntry) {
        let ticket = self.commentary.issue_ticket();
        self.commentary.processing = true;
        self.commentary.in_flight = Some(InFlight {
            ticket,
            entry: entry.id,
            sound: entry.sound,
            since: self.now(),
        });

        let gap = self.config.sequence_gap_ms;
        if entry.is_continuing() && gap > 0 {
            let due = self.clock.game_ms() + gap;
            let timer = self.timers.schedule(
                TimerClock::Frame,
                due,
                TimerAction::StartCommentary { ticket },
            );
            debug!("Delaying sequence step {} by {gap}ms", entry.sound);
            self.commentary.delayed = Some(DelayedStep {
                ticket,
                timer,
                entry,
            });
            return;
        }

        self.start_commentary(ticket, entry);
    }

    /// Hand the channel's entry to the backend. Returns whether it started;
    /// on failure the channel is released and the entry skipped.
    fn start_commentary(&mut self, ticket: u64, entry: QueueEntry) -> bool {
        let (id, sound) = (entry.id, entry.sound);
        match self.start_playback(entry, Channel::Commentary { ticket }) {
            Ok(()) => {
                let now = self.now();
                self.commentary.last_played = Some(LastPlayed {
                    entry: id,
                    sound,
                    started_at: now,
                });
                debug!("Commentary {sound} started ({id})");
                true
            },
            Err((entry, reason)) => {
                self.release_channel(ticket);
                self.skip_commentary_entry(entry, reason);
                false
            },
        }
    }

    /// Gap timer for a continuing sequence step.
    pub(crate) fn start_delayed_commentary(&mut self, ticket: u64) {
        if !self
            .commentary
            .delayed
            .as_ref()
            .is_some_and(|d| d.ticket == ticket)
        {
            trace!("Ignoring gap timer for released slot {ticket}");
            return;
        }
        let Some(step) = self.commentary.delayed.take() else {
            return;
        };
        self.timers.cancel(step.timer);

        let entry = step.entry;
        let reason = if !self.preferences.sound_enabled() || !self.preferences.commentary_enabled()
        {
            Some(SkipReason::Disabled)
        } else if entry.skip {
            Some(SkipReason::Stopped)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                self.release_channel(ticket);
                self.skip_commentary_entry(entry, reason);
            },
            None => {
                if self.start_commentary(ticket, entry) {
                    return;
                }
            },
        }
        self.drain_commentary();
    }

    /// Arm the wall-clock re-check if something waits behind a paused line.
    fn arm_pause_fallback(&mut self) {
        if self.commentary.fallback_armed
            || !self.commentary.processing
            || self.commentary.entries.is_empty()
            || !self.clock.is_paused()
        {
            return;
        }
        let Some(flight) = self.commentary.in_flight else {
            return;
        };

        let interval = self.config.fallback_interval_ms;
        let due = self.clock.wall_ms() + interval;
        self.timers.schedule(
            TimerClock::Wall,
            due,
            TimerAction::FallbackRecheck {
                ticket: flight.ticket,
            },
        );
        self.commentary.fallback_armed = true;
        debug!(
            "Game paused with {} commentary waiting, re-checking in {interval}ms",
            self.commentary.len()
        );
    }

    /// Wall-clock re-check armed while paused.
    ///
    /// If the same slot still holds the channel, a step waiting out its gap
    /// starts now; a line that never completed is cut short and the channel
    /// moves on.
    pub(crate) fn pause_fallback(&mut self, ticket: u64) {
        self.commentary.fallback_armed = false;

        let Some(flight) = self.commentary.in_flight.filter(|f| f.ticket == ticket) else {
            trace!("Commentary progressed since slot {ticket}, nothing to force");
            self.drain_commentary();
            return;
        };

        if self
            .commentary
            .delayed
            .as_ref()
            .is_some_and(|d| d.ticket == ticket)
        {
            debug!("Pause fallback starting delayed step {} early", flight.sound);
            self.start_delayed_commentary(ticket);
            return;
        }

        debug!(
            "Pause fallback releasing commentary channel held by {} for {}ms",
            flight.entry,
            self.now().saturating_sub(flight.since)
        );
        self.silence(flight.sound, SkipReason::Stalled, |play| {
            play.channel == Channel::Commentary { ticket }
        });
        self.release_channel(ticket);
        self.drain_commentary();
    }

    /// Completion of a play started on the channel.
    pub(crate) fn commentary_finished(&mut self, ticket: u64, outcome: &PlaybackOutcome) {
        if !self.release_channel(ticket) {
            debug!("Late completion for released commentary slot {ticket}");
        }
        if let Some(position) = outcome.sequence {
            self.sequence_step_finished(position, outcome);
        }
        self.drain_commentary();
    }

    /// Synthesize a skip completion for an entry that will not play.
    pub(crate) fn skip_commentary_entry(&mut self, entry: QueueEntry, reason: SkipReason) {
        debug!("Skipping commentary {} ({reason:?})", entry.sound);
        let outcome =
            PlaybackOutcome::skipped(Some(entry.sound), reason).in_sequence(entry.sequence);
        self.release_instance(entry.sound, false);
        self.notify_entry(entry.on_finish.as_ref(), entry.sound, &outcome);
        if let Some(position) = entry.sequence {
            self.sequence_step_finished(position, &outcome);
        }
    }

    /// Free the channel if `ticket` still holds it.
    fn release_channel(&mut self, ticket: u64) -> bool {
        if !self
            .commentary
            .in_flight
            .is_some_and(|f| f.ticket == ticket)
        {
            return false;
        }
        self.commentary.processing = false;
        self.commentary.in_flight = None;
        trace!("Commentary slot {ticket} released");
        true
    }

    /// Whether the head entry has waited past the stuck threshold while the
    /// channel is held.
    #[must_use]
    pub fn is_commentary_stuck(&self) -> bool {
        self.commentary.processing
            && self.commentary.entries.front().is_some_and(|head| {
                self.now().saturating_sub(head.enqueued_at) >= self.config.stuck_threshold_ms
            })
    }

    /// Log once per head entry when the channel looks stuck. The channel is
    /// left alone.
    fn check_stuck_commentary(&mut self) {
        if !self.is_commentary_stuck() {
            return;
        }
        let Some(head) = self.commentary.entries.front() else {
            return;
        };
        if self.commentary.stuck_reported == Some(head.id) {
            return;
        }

        let head_id = head.id;
        let age_ms = self.now().saturating_sub(head.enqueued_at);
        let queued: Vec<(EntryId, SoundId)> = self
            .commentary
            .entries
            .iter()
            .map(|e| (e.id, e.sound))
            .collect();
        warn!(
            head = %head_id,
            age_ms,
            ?queued,
            in_flight = ?self.commentary.in_flight,
            last_played = ?self.commentary.last_played,
            "Commentary channel looks stuck"
        );
        self.commentary.stuck_reported = Some(head_id);
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use salvo_common::InstanceId;

    use super::*;
    use crate::descriptor::SoundOptions;
    use crate::testing::{test_scheduler, CompletionLog, TestScheduler};

    fn line(scheduler: &mut TestScheduler, url: &str) -> SoundRef {
        scheduler
            .register_sound(SoundOptions::new(url))
            .expect("commentary line")
    }

    fn playing(scheduler: &TestScheduler, r: &SoundRef) -> Option<InstanceId> {
        let sound = r.sound_id()?;
        scheduler
            .instance_of(sound)
            .filter(|id| scheduler.backend().is_playing(*id))
    }

    #[test]
    fn test_lines_never_overlap() {
        let mut scheduler = test_scheduler();
        let first = line(&mut scheduler, "commentary/first.ogg");
        let second = line(&mut scheduler, "commentary/second.ogg");

        scheduler.play_commentary(&first, None, PlayOptions::default());
        scheduler.play_commentary(&second, None, PlayOptions::default());
        scheduler.update();

        assert_eq!(scheduler.commentary_diagnostics().state, ChannelState::Draining);
        assert_eq!(scheduler.backend().plays().len(), 1);
        assert!(playing(&scheduler, &second).is_none());

        let instance = playing(&scheduler, &first).expect("first playing");
        scheduler.backend_mut().finish(instance);
        scheduler.update();

        assert!(playing(&scheduler, &second).is_some());
        assert_eq!(scheduler.backend().plays().len(), 2);
    }

    #[test]
    fn test_fifo_order() {
        let mut scheduler = test_scheduler();
        let lines: Vec<_> = (0..4)
            .map(|i| line(&mut scheduler, &format!("commentary/line{i}.ogg")))
            .collect();
        for l in &lines {
            scheduler.play_commentary(l, None, PlayOptions::default());
        }

        let mut order = Vec::new();
        for _ in 0..lines.len() {
            scheduler.update();
            let current = lines
                .iter()
                .position(|l| playing(&scheduler, l).is_some())
                .expect("one line playing");
            order.push(current);
            scheduler.backend_mut().finish_all();
        }
        scheduler.update();

        assert_eq!(order, vec![0, 1, 2, 3]);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_stale_entry_skipped_at_boundary() {
        let mut scheduler = test_scheduler();
        let log = CompletionLog::new();
        let long = line(&mut scheduler, "commentary/long.ogg");
        let quick = line(&mut scheduler, "commentary/quick.ogg");
        let fresh = line(&mut scheduler, "commentary/fresh.ogg");

        scheduler.play_commentary(&long, None, PlayOptions::default());
        scheduler.play_commentary(
            &quick,
            None,
            PlayOptions::default().with_max_delay(1000).on_finish(log.handler()),
        );
        scheduler.clock_mut().advance(1);
        scheduler.play_commentary(
            &fresh,
            None,
            PlayOptions::default().with_max_delay(1000).on_finish(log.handler()),
        );

        // quick waited exactly 1000ms, fresh only 999ms
        scheduler.clock_mut().advance(999);
        scheduler.backend_mut().finish_all();
        scheduler.update();

        let outcomes = log.outcomes();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].reason, Some(SkipReason::Stale));
        assert!(playing(&scheduler, &fresh).is_some());
    }

    #[test]
    fn test_repeated_line_throttled() {
        let mut scheduler = test_scheduler();
        let log = CompletionLog::new();
        let goal = scheduler
            .register_sound(SoundOptions::new("commentary/goal.ogg").with_throttle(10_000))
            .expect("sound");

        scheduler.play_commentary(&goal, None, PlayOptions::default());
        scheduler.play_commentary(&goal, None, PlayOptions::default().on_finish(log.handler()));
        scheduler.clock_mut().advance(2000);
        scheduler.backend_mut().finish_all();
        scheduler.update();

        assert_eq!(log.skipped(), 1);
        assert_eq!(log.outcomes()[0].reason, Some(SkipReason::Throttled));
        assert_eq!(scheduler.backend().plays().len(), 1);
    }

    #[test]
    fn test_disabled_while_queued() {
        let mut scheduler = test_scheduler();
        let log = CompletionLog::new();
        let first = line(&mut scheduler, "commentary/first.ogg");
        let second = line(&mut scheduler, "commentary/second.ogg");

        scheduler.play_commentary(&first, None, PlayOptions::default());
        scheduler.play_commentary(&second, None, PlayOptions::default().on_finish(log.handler()));
        scheduler.preferences_mut().commentary_enabled = false;
        scheduler.backend_mut().finish_all();
        scheduler.update();

        assert_eq!(log.skipped(), 1);
        assert_eq!(log.outcomes()[0].reason, Some(SkipReason::Disabled));
        assert!(scheduler.is_idle());
        assert_eq!(scheduler.live_instance_count(), 0);
    }

    #[test]
    fn test_pause_fallback_frees_channel() {
        let mut scheduler = test_scheduler();
        let log = CompletionLog::new();
        let first = line(&mut scheduler, "commentary/first.ogg");
        let second = line(&mut scheduler, "commentary/second.ogg");

        scheduler.play_commentary(&first, None, PlayOptions::default().on_finish(log.handler()));
        scheduler.clock_mut().set_paused(true);
        scheduler.play_commentary(&second, None, PlayOptions::default());
        assert!(scheduler.commentary_diagnostics().fallback_armed);

        scheduler.clock_mut().advance(499);
        scheduler.update();
        assert!(playing(&scheduler, &second).is_none());

        scheduler.clock_mut().advance(1);
        scheduler.update();
        assert!(playing(&scheduler, &second).is_some());

        // The abandoned line was muted and seeked to its end
        let first_instance = scheduler
            .backend()
            .instances_of(first.sound_id().expect("sound id"))
            .next()
            .expect("first instance");
        assert!(scheduler.backend().instance(first_instance).expect("recorded").muted);

        scheduler.update();
        assert_eq!(log.skipped(), 1);
        assert_eq!(log.outcomes()[0].reason, Some(SkipReason::Stalled));
        // Its late completion does not free the slot held by second
        assert_eq!(scheduler.commentary_diagnostics().state, ChannelState::Draining);
    }

    #[test]
    fn test_pause_fallback_ignores_progressed_channel() {
        let mut scheduler = test_scheduler();
        let first = line(&mut scheduler, "commentary/first.ogg");
        let second = line(&mut scheduler, "commentary/second.ogg");
        let third = line(&mut scheduler, "commentary/third.ogg");

        scheduler.play_commentary(&first, None, PlayOptions::default());
        scheduler.clock_mut().set_paused(true);
        scheduler.play_commentary(&second, None, PlayOptions::default());
        scheduler.play_commentary(&third, None, PlayOptions::default());

        // first finishes on its own before the re-check
        scheduler.clock_mut().advance(200);
        scheduler.backend_mut().finish_all();
        scheduler.update();
        let second_instance = playing(&scheduler, &second).expect("second playing");

        scheduler.clock_mut().advance(300);
        scheduler.update();
        assert!(!scheduler.backend().instance(second_instance).expect("recorded").muted);
        assert!(playing(&scheduler, &third).is_none());
    }

    #[test]
    fn test_no_fallback_when_unpaused() {
        let mut scheduler = test_scheduler();
        let first = line(&mut scheduler, "commentary/first.ogg");
        let second = line(&mut scheduler, "commentary/second.ogg");

        scheduler.play_commentary(&first, None, PlayOptions::default());
        scheduler.play_commentary(&second, None, PlayOptions::default());
        scheduler.clock_mut().advance(5000);
        scheduler.update();

        assert!(!scheduler.commentary_diagnostics().fallback_armed);
        assert!(playing(&scheduler, &second).is_none());
    }

    #[test]
    fn test_stuck_channel_is_reported_not_reset() {
        let mut scheduler = test_scheduler();
        let first = line(&mut scheduler, "commentary/first.ogg");
        let second = line(&mut scheduler, "commentary/second.ogg");

        scheduler.play_commentary(&first, None, PlayOptions::default());
        scheduler.play_commentary(&second, None, PlayOptions::default());
        scheduler.clock_mut().advance(29_999);
        scheduler.update();
        assert!(!scheduler.is_commentary_stuck());

        scheduler.clock_mut().advance(1);
        scheduler.update();
        let diagnostics = scheduler.commentary_diagnostics();
        assert!(diagnostics.stuck);
        assert_eq!(diagnostics.state, ChannelState::Draining);
        assert_eq!(diagnostics.queued.len(), 1);
        assert!(playing(&scheduler, &first).is_some());
    }

    #[test]
    fn test_immediate_commentary_bypasses_channel() {
        let mut scheduler = test_scheduler();
        let first = line(&mut scheduler, "commentary/first.ogg");
        let sting = scheduler
            .register_sound(SoundOptions::new("commentary/sting.ogg").play_immediately())
            .expect("sound");

        scheduler.play_commentary(&first, None, PlayOptions::default());
        scheduler.play_commentary(&sting, None, PlayOptions::default());

        assert!(playing(&scheduler, &sting).is_some());
        assert_eq!(scheduler.commentary_len(), 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Request(usize),
        Advance(u64),
        FinishAll,
        Pause(bool),
        Update,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..4usize).prop_map(Op::Request),
            (0..800u64).prop_map(Op::Advance),
            Just(Op::FinishAll),
            any::<bool>().prop_map(Op::Pause),
            Just(Op::Update),
        ]
    }

    proptest! {
        #[test]
        fn prop_at_most_one_line_audible(ops in proptest::collection::vec(op(), 1..60)) {
            let mut scheduler = test_scheduler();
            let log = CompletionLog::new();
            let lines: Vec<_> = (0..4)
                .map(|i| line(&mut scheduler, &format!("commentary/line{i}.ogg")))
                .collect();
            let mut requested = 0;

            for op in ops {
                match op {
                    Op::Request(i) => {
                        requested += 1;
                        scheduler.play_commentary(
                            &lines[i],
                            None,
                            PlayOptions::default().on_finish(log.handler()),
                        );
                    },
                    Op::Advance(ms) => scheduler.clock_mut().advance(ms),
                    Op::FinishAll => {
                        scheduler.backend_mut().finish_all();
                    },
                    Op::Pause(paused) => scheduler.clock_mut().set_paused(paused),
                    Op::Update => scheduler.update(),
                }
                prop_assert!(scheduler.backend().audible_count() <= 1);
            }

            // Every request reaches a terminal state once the game resumes
            scheduler.clock_mut().set_paused(false);
            for _ in 0..(requested * 3 + 3) {
                scheduler.backend_mut().finish_all();
                scheduler.clock_mut().advance(1000);
                scheduler.update();
            }
            prop_assert_eq!(log.len(), requested);
            prop_assert!(scheduler.is_idle());
            prop_assert_eq!(scheduler.live_instance_count(), 0);
        }
    }
}
