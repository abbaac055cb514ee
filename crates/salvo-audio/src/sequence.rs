//! Sequence engine.
//!
//! A sequence plays its steps in order on the commentary channel. Only the
//! opener may be dropped for lateness or repetition; if it does not play,
//! the rest of the group is cancelled. Continuing steps start a short gap
//! after the previous one finishes.

use ahash::AHashMap;
use glam::Vec2;
use salvo_common::{IdGenerator, SequenceId, SequenceRunId, SoundId};
use tracing::{debug, trace};

use crate::backend::AudioBackend;
use crate::clock::Clock;
use crate::playback::{
    notify, FinishHandler, PlayOptions, PlaybackOutcome, SequencePosition, SkipReason,
};
use crate::preferences::Preferences;
use crate::reference::Sequence;
use crate::resolver::Resolved;
use crate::scheduler::Scheduler;

/// One playthrough of a sequence.
pub(crate) struct SequenceRun {
    pub sequence: SequenceId,
    pub length: usize,
    pub on_finish: Option<FinishHandler>,
}

/// Active sequence playthroughs.
#[derive(Default)]
pub struct SequenceBook {
    runs: AHashMap<SequenceRunId, SequenceRun>,
    ids: IdGenerator,
}

impl std::fmt::Debug for SequenceBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceBook")
            .field("active", &self.runs.len())
            .finish_non_exhaustive()
    }
}

impl SequenceBook {
    /// Create an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of playthroughs still in progress.
    #[must_use]
    pub fn active_runs(&self) -> usize {
        self.runs.len()
    }
}

impl<B: AudioBackend, C: Clock, P: Preferences> Scheduler<B, C, P> {
    /// Schedule every step of a sequence on the commentary channel.
    ///
    /// Steps are resolved now. Selectors that decline to pick a sound are
    /// filtered out and the remaining steps renumbered, so the first step
    /// left is the opener. If the opener cannot be resolved the whole group
    /// is cancelled before anything is queued. A max delay set on the
    /// sequence applies to every step. The overall handler fires once, when
    /// the last step finishes or the group is cancelled.
    pub fn play_sequence(
        &mut self,
        sequence: SequenceId,
        target: Option<Vec2>,
        options: PlayOptions,
    ) {
        let Some(registered) = self.registry.sequence(sequence).cloned() else {
            debug!("Unknown {sequence}");
            notify(
                options.on_finish.as_ref(),
                &PlaybackOutcome::skipped(None, SkipReason::Unresolved),
            );
            return;
        };

        let mut steps = Vec::with_capacity(registered.len());
        if let Err(reason) = self.resolve_steps(&registered, &mut steps, 0) {
            debug!("Opener of {sequence} not playable ({reason:?}), cancelling");
            notify(
                options.on_finish.as_ref(),
                &PlaybackOutcome::skipped(None, reason),
            );
            return;
        }
        if steps.is_empty() {
            debug!("{sequence} has nothing to play");
            notify(
                options.on_finish.as_ref(),
                &PlaybackOutcome::skipped(None, SkipReason::Unresolved),
            );
            return;
        }

        let run = SequenceRunId::from_raw(self.sequences.ids.next());
        let length = steps.len();
        let max_delay_ms = options.max_delay_ms.or(registered.max_delay_ms());
        self.sequences.runs.insert(
            run,
            SequenceRun {
                sequence,
                length,
                on_finish: options.on_finish.clone(),
            },
        );
        debug!("Scheduling {sequence} as {run} ({length} steps)");

        for (offset, sound) in steps.into_iter().enumerate() {
            let step_options = PlayOptions {
                max_delay_ms,
                immediate: false,
                on_finish: None,
                ..options.clone()
            };
            let mut entry = self.build_entry(sound, target, step_options);
            entry.sequence = Some(SequencePosition {
                run,
                offset,
                length,
            });
            if offset > 0 {
                entry.exclude_delay = true;
                entry.exclude_throttling = true;
            }
            self.queue_commentary(entry);
        }
        self.drain_commentary();
    }

    /// Resolve steps in order, flattening nested sequences.
    ///
    /// Fails with the opener's skip reason when the opener cannot be
    /// resolved. Later steps that cannot be resolved are dropped, as if
    /// skipped.
    fn resolve_steps(
        &mut self,
        sequence: &Sequence,
        out: &mut Vec<SoundId>,
        depth: usize,
    ) -> Result<(), SkipReason> {
        for step in sequence.steps() {
            match self.resolve_declinable(step) {
                Ok(None) => trace!("Selector step {step:?} declined, filtered out"),
                Ok(Some(Resolved::Sound(sound))) => out.push(sound),
                Ok(Some(Resolved::Sequence(nested))) => {
                    if depth >= self.config.selector_depth_limit {
                        debug!("Dropping {nested}: nested too deeply");
                        continue;
                    }
                    if let Some(inner) = self.registry.sequence(nested).cloned() {
                        self.resolve_steps(&inner, out, depth + 1)?;
                    }
                },
                Err(reason) if out.is_empty() => return Err(reason),
                Err(reason) => debug!("Dropping sequence step {step:?} ({reason:?})"),
            }
        }
        Ok(())
    }

    /// A step reached a terminal state.
    pub(crate) fn sequence_step_finished(
        &mut self,
        position: SequencePosition,
        outcome: &PlaybackOutcome,
    ) {
        // A stalled opener did start, so the group carries on
        let opener_missed =
            outcome.skipped && outcome.reason != Some(SkipReason::Stalled) && position.offset == 0;
        if opener_missed && !position.is_last() {
            self.cancel_sequence_run(position, outcome);
            return;
        }
        if !position.is_last() {
            return;
        }

        if let Some(run) = self.sequences.runs.remove(&position.run) {
            debug!(
                "{} finished as {} ({} steps, last skipped: {})",
                run.sequence, position.run, run.length, outcome.skipped
            );
            notify(run.on_finish.as_ref(), outcome);
        }
    }

    /// Drop every queued step of a run whose opener did not play.
    fn cancel_sequence_run(&mut self, opener: SequencePosition, outcome: &PlaybackOutcome) {
        let run = opener.run;
        let mut cancelled = Vec::new();
        self.commentary.entries.retain(|entry| {
            let member = entry.sequence.is_some_and(|p| p.run == run);
            if member {
                cancelled.push((entry.sound, entry.sequence));
            }
            !member
        });
        debug!(
            "Opener of {run} skipped ({:?}), cancelling {} steps",
            outcome.reason,
            cancelled.len()
        );

        for (sound, position) in cancelled {
            self.release_instance(sound, false);
            let step =
                PlaybackOutcome::skipped(Some(sound), SkipReason::Cancelled).in_sequence(position);
            self.notify_entry(None, sound, &step);
        }

        if let Some(state) = self.sequences.runs.remove(&run) {
            trace!("{run} cancelled");
            notify(state.on_finish.as_ref(), outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::SoundOptions;
    use crate::reference::{Selector, SoundRef};
    use crate::testing::{test_scheduler, BackendCall, CompletionLog, TestScheduler};

    fn lines(scheduler: &mut TestScheduler, names: &[&str]) -> Vec<SoundRef> {
        names
            .iter()
            .map(|name| {
                scheduler
                    .register_sound(SoundOptions::new(format!("commentary/{name}.ogg")))
                    .expect("line")
            })
            .collect()
    }

    fn started(scheduler: &TestScheduler, r: &SoundRef) -> usize {
        scheduler
            .backend()
            .plays_of(r.sound_id().expect("sound id"))
    }

    #[test]
    fn test_skipped_opener_cancels_group() {
        let mut scheduler = test_scheduler();
        let log = CompletionLog::new();
        let opener = scheduler
            .register_sound(SoundOptions::new("commentary/and_now.ogg").with_throttle(60_000))
            .expect("sound");
        let rest = lines(&mut scheduler, &["the_kick", "goal"]);
        let sequence = scheduler
            .register_sequence(vec![opener.clone(), rest[0].clone(), rest[1].clone()])
            .expect("sequence");

        // Play the opener on its own so the sequence copy is throttled
        scheduler.play_commentary(&opener, None, PlayOptions::default());
        scheduler.backend_mut().finish_all();
        scheduler.update();
        let calls_before = scheduler.backend().calls().len();

        scheduler.play_commentary(&sequence, None, PlayOptions::default().on_finish(log.handler()));
        scheduler.update();

        assert_eq!(log.len(), 1);
        assert!(log.outcomes()[0].skipped);
        assert_eq!(log.outcomes()[0].reason, Some(SkipReason::Throttled));
        assert_eq!(scheduler.commentary_len(), 0);
        assert_eq!(scheduler.live_instance_count(), 0);
        assert!(scheduler.backend().calls()[calls_before..]
            .iter()
            .all(|c| !matches!(c, BackendCall::Play(..))));
        assert_eq!(scheduler.sequences.active_runs(), 0);
    }

    #[test]
    fn test_cancelled_steps_report_to_their_descriptors() {
        let mut scheduler = test_scheduler();
        let log = CompletionLog::new();
        let opener = scheduler
            .register_sound(SoundOptions::new("commentary/and_now.ogg"))
            .expect("sound");
        let follower = scheduler
            .register_sound(SoundOptions::new("commentary/goal.ogg").on_finish(log.handler()))
            .expect("sound");
        let sequence = scheduler
            .register_sequence(vec![opener.clone(), follower])
            .expect("sequence");

        scheduler.play_commentary(&sequence, None, PlayOptions::default());
        scheduler.stop(&opener);
        scheduler.update();

        assert_eq!(log.len(), 1);
        assert_eq!(log.outcomes()[0].reason, Some(SkipReason::Cancelled));
        assert_eq!(scheduler.commentary_len(), 0);
        assert_eq!(scheduler.live_instance_count(), 0);
    }

    #[test]
    fn test_continuing_step_waits_for_gap() {
        let mut scheduler = test_scheduler();
        let steps = lines(&mut scheduler, &["a", "b"]);
        let sequence = scheduler.register_sequence(steps.clone()).expect("sequence");

        scheduler.play_commentary(&sequence, None, PlayOptions::default());
        assert_eq!(started(&scheduler, &steps[0]), 1);

        scheduler.clock_mut().advance(1500);
        scheduler.backend_mut().finish_all();
        scheduler.update();
        assert_eq!(started(&scheduler, &steps[1]), 0);

        scheduler.clock_mut().advance(499);
        scheduler.update();
        assert_eq!(started(&scheduler, &steps[1]), 0);

        scheduler.clock_mut().advance(1);
        scheduler.update();
        assert_eq!(started(&scheduler, &steps[1]), 1);
    }

    #[test]
    fn test_gap_frozen_while_paused_until_fallback() {
        let mut scheduler = test_scheduler();
        let steps = lines(&mut scheduler, &["a", "b", "c"]);
        let sequence = scheduler.register_sequence(steps.clone()).expect("sequence");

        scheduler.play_commentary(&sequence, None, PlayOptions::default());
        scheduler.backend_mut().finish_all();
        scheduler.clock_mut().set_paused(true);
        scheduler.update();

        // b is waiting out its gap on game time, which is frozen
        scheduler.clock_mut().advance(400);
        scheduler.update();
        assert_eq!(started(&scheduler, &steps[1]), 0);

        // c is still queued, so the wall-clock fallback starts b early
        scheduler.clock_mut().advance(100);
        scheduler.update();
        assert_eq!(started(&scheduler, &steps[1]), 1);
    }

    #[test]
    fn test_overall_handler_fires_on_last_step() {
        let mut scheduler = test_scheduler();
        let log = CompletionLog::new();
        let steps = lines(&mut scheduler, &["a", "b", "c"]);
        let sequence = scheduler.register_sequence(steps).expect("sequence");

        scheduler.play_commentary(&sequence, None, PlayOptions::default().on_finish(log.handler()));
        for _ in 0..4 {
            scheduler.backend_mut().finish_all();
            scheduler.clock_mut().advance(500);
            scheduler.update();
        }
        assert!(log.is_empty());

        for _ in 0..2 {
            scheduler.backend_mut().finish_all();
            scheduler.clock_mut().advance(500);
            scheduler.update();
        }

        assert_eq!(log.len(), 1);
        assert_eq!(log.played(), 1);
        assert!(scheduler.is_idle());
        assert_eq!(scheduler.live_instance_count(), 0);
    }

    #[test]
    fn test_skipped_middle_step_does_not_cancel() {
        let mut scheduler = test_scheduler();
        let log = CompletionLog::new();
        let steps = lines(&mut scheduler, &["a", "b", "c"]);
        let sequence = scheduler.register_sequence(steps.clone()).expect("sequence");

        scheduler.play_commentary(&sequence, None, PlayOptions::default().on_finish(log.handler()));
        scheduler.stop(&steps[1]);
        for _ in 0..4 {
            scheduler.backend_mut().finish_all();
            scheduler.clock_mut().advance(500);
            scheduler.update();
        }

        assert_eq!(started(&scheduler, &steps[1]), 0);
        assert_eq!(started(&scheduler, &steps[2]), 1);
        assert_eq!(log.played(), 1);
    }

    #[test]
    fn test_skipped_middle_step_fires_completions_in_order() {
        let mut scheduler = test_scheduler();
        let log = CompletionLog::new();
        let per_step = CompletionLog::new();
        let steps: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|name| {
                scheduler
                    .register_sound(
                        SoundOptions::new(format!("commentary/{name}.ogg"))
                            .on_finish(per_step.handler()),
                    )
                    .expect("line")
            })
            .collect();
        let sequence = scheduler.register_sequence(steps.clone()).expect("sequence");

        scheduler.play_commentary(&sequence, None, PlayOptions::default().on_finish(log.handler()));
        scheduler.stop(&steps[1]);

        // a completes, b is skipped and c waits out its gap
        scheduler.backend_mut().finish_all();
        scheduler.update();
        assert!(log.is_empty());

        scheduler.clock_mut().advance(500);
        scheduler.update();
        assert_eq!(started(&scheduler, &steps[2]), 1);
        assert!(log.is_empty());

        scheduler.backend_mut().finish_all();
        scheduler.update();

        let played: Vec<_> = per_step
            .outcomes()
            .iter()
            .filter(|o| !o.skipped)
            .filter_map(|o| o.sound)
            .collect();
        assert_eq!(
            played,
            vec![
                steps[0].sound_id().expect("a"),
                steps[2].sound_id().expect("c")
            ]
        );
        assert_eq!(log.len(), 1);
        assert_eq!(log.played(), 1);
    }

    #[test]
    fn test_opener_disabled_while_queued_cancels_group() {
        let mut scheduler = test_scheduler();
        let log = CompletionLog::new();
        let intro = lines(&mut scheduler, &["intro"]);
        let steps = lines(&mut scheduler, &["a", "b", "c"]);
        let sequence = scheduler.register_sequence(steps.clone()).expect("sequence");

        scheduler.play_commentary(&intro[0], None, PlayOptions::default());
        scheduler.play_commentary(&sequence, None, PlayOptions::default().on_finish(log.handler()));
        assert_eq!(scheduler.commentary_len(), 3);

        scheduler.preferences_mut().commentary_enabled = false;
        scheduler.backend_mut().finish_all();
        scheduler.update();

        assert_eq!(scheduler.commentary_len(), 0);
        assert_eq!(scheduler.live_instance_count(), 0);
        assert!(steps.iter().all(|step| started(&scheduler, step) == 0));
        assert_eq!(log.len(), 1);
        assert_eq!(log.outcomes()[0].reason, Some(SkipReason::Disabled));
    }

    #[test]
    fn test_unplayable_opener_cancels_group() {
        let mut scheduler = test_scheduler();
        let log = CompletionLog::new();
        scheduler.backend_mut().fail_create_for("commentary/a.ogg");
        let steps = lines(&mut scheduler, &["a", "b", "c"]);
        let sequence = scheduler.register_sequence(steps.clone()).expect("sequence");

        scheduler.play_commentary(&sequence, None, PlayOptions::default().on_finish(log.handler()));
        scheduler.update();

        assert!(scheduler.backend().plays().is_empty());
        assert_eq!(scheduler.commentary_len(), 0);
        assert_eq!(scheduler.live_instance_count(), 0);
        assert_eq!(scheduler.sequences.active_runs(), 0);
        assert_eq!(log.len(), 1);
        assert_eq!(log.outcomes()[0].reason, Some(SkipReason::BackendFailure));
    }

    #[test]
    fn test_unplayable_follower_is_dropped() {
        let mut scheduler = test_scheduler();
        let log = CompletionLog::new();
        scheduler.backend_mut().fail_create_for("commentary/b.ogg");
        let steps = lines(&mut scheduler, &["a", "b"]);
        let sequence = scheduler.register_sequence(steps.clone()).expect("sequence");

        scheduler.play_commentary(&sequence, None, PlayOptions::default().on_finish(log.handler()));
        assert_eq!(started(&scheduler, &steps[0]), 1);
        assert_eq!(scheduler.commentary_len(), 0);

        scheduler.backend_mut().finish_all();
        scheduler.update();
        assert_eq!(log.played(), 1);
    }

    #[test]
    fn test_continuing_steps_ignore_staleness() {
        let mut scheduler = test_scheduler();
        let steps = lines(&mut scheduler, &["a", "b"]);
        let sequence = scheduler
            .register_sequence_with_max_delay(steps.clone(), 1000)
            .expect("sequence");

        scheduler.play_commentary(&sequence, None, PlayOptions::default());
        scheduler.clock_mut().advance(5000);
        scheduler.backend_mut().finish_all();
        scheduler.update();
        scheduler.clock_mut().advance(500);
        scheduler.update();

        assert_eq!(started(&scheduler, &steps[1]), 1);
    }

    #[test]
    fn test_skip_sentinel_steps_are_dropped() {
        let mut scheduler = test_scheduler();
        let steps = lines(&mut scheduler, &["a", "b"]);
        let nothing = SoundRef::from(Selector::new(|| None));
        let sequence = scheduler
            .register_sequence(vec![nothing, steps[0].clone(), steps[1].clone()])
            .expect("sequence");

        scheduler.play_commentary(&sequence, None, PlayOptions::default());

        // a became the opener and starts without a gap
        assert_eq!(started(&scheduler, &steps[0]), 1);
        assert_eq!(scheduler.commentary_len(), 1);
    }

    #[test]
    fn test_sequence_via_play_effect() {
        let mut scheduler = test_scheduler();
        let steps = lines(&mut scheduler, &["a", "b"]);
        let sequence = scheduler.register_sequence(steps.clone()).expect("sequence");

        scheduler.play_effect(&sequence, None, PlayOptions::default());

        assert_eq!(scheduler.immediate_len(), 0);
        assert_eq!(started(&scheduler, &steps[0]), 1);
        assert_eq!(scheduler.commentary_len(), 1);
    }

    #[test]
    fn test_disabled_sequence_reports_skip() {
        let mut scheduler = test_scheduler();
        let log = CompletionLog::new();
        let steps = lines(&mut scheduler, &["a", "b"]);
        let sequence = scheduler.register_sequence(steps).expect("sequence");
        scheduler.preferences_mut().commentary_enabled = false;

        scheduler.play_commentary(&sequence, None, PlayOptions::default().on_finish(log.handler()));

        assert_eq!(log.skipped(), 1);
        assert_eq!(log.outcomes()[0].reason, Some(SkipReason::Disabled));
        assert_eq!(scheduler.live_instance_count(), 0);
    }
}
