//! Test doubles for the scheduler's collaborators.
//!
//! Compiled for this crate's tests and for dependents that enable the
//! `test-support` feature.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use salvo_common::{AudioError, InstanceId, Millis, SoundId};

use crate::backend::{AudioBackend, InstanceSpec, PlayParams};
use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::playback::PlaybackOutcome;
use crate::preferences::StaticPreferences;
use crate::scheduler::Scheduler;

/// Scheduler wired to the test doubles.
pub type TestScheduler = Scheduler<RecordingBackend, ManualClock, StaticPreferences>;

/// Scheduler with default timings, a fixed shuffle seed and everything
/// enabled.
#[must_use]
pub fn test_scheduler() -> TestScheduler {
    let config = SchedulerConfig {
        shuffle_seed: Some(7),
        ..SchedulerConfig::default()
    };
    Scheduler::new(
        config,
        RecordingBackend::new(),
        ManualClock::new(),
        StaticPreferences::default(),
    )
}

/// One call made on the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    /// Instance created for a sound.
    Create(SoundId, InstanceId),
    /// Play started.
    Play(InstanceId, PlayParams),
    /// Stop requested.
    Stop(InstanceId),
    /// Mute requested.
    Mute(InstanceId),
    /// Seek requested.
    SetPosition(InstanceId, Millis),
    /// Instance destroyed.
    Destroy(InstanceId),
}

/// State of an instance held by [`RecordingBackend`].
#[derive(Debug, Clone)]
pub struct RecordedInstance {
    /// Spec it was created from.
    pub spec: InstanceSpec,
    /// Plays started and not yet completed.
    pub playing: u32,
    /// Muted since the last play.
    pub muted: bool,
    /// Last seek position.
    pub position_ms: Millis,
}

/// Backend that records every call and completes plays only when told to.
///
/// Seeking to or past an instance's duration completes its running plays,
/// as a real engine reaching the end would.
#[derive(Debug)]
pub struct RecordingBackend {
    calls: Vec<BackendCall>,
    instances: AHashMap<InstanceId, RecordedInstance>,
    finished: Vec<InstanceId>,
    failing_urls: Vec<String>,
    fail_play: bool,
    duration_ms: Millis,
    next_id: u64,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    /// Backend whose clips last one second.
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            instances: AHashMap::new(),
            finished: Vec::new(),
            failing_urls: Vec::new(),
            fail_play: false,
            duration_ms: 1000,
            next_id: 0,
        }
    }

    /// Refuse to create instances for this locator.
    pub fn fail_create_for(&mut self, url: impl Into<String>) {
        self.failing_urls.push(url.into());
    }

    /// Refuse every play while set.
    pub fn fail_play(&mut self, fail: bool) {
        self.fail_play = fail;
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Every play so far.
    #[must_use]
    pub fn plays(&self) -> Vec<(InstanceId, PlayParams)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Play(id, params) => Some((*id, *params)),
                _ => None,
            })
            .collect()
    }

    /// Number of plays started for a sound, across all its instances.
    #[must_use]
    pub fn plays_of(&self, sound: SoundId) -> usize {
        let created: Vec<InstanceId> = self.created_for(sound).collect();
        self.plays()
            .iter()
            .filter(|(id, _)| created.contains(id))
            .count()
    }

    /// Live instances created for a sound.
    pub fn instances_of(&self, sound: SoundId) -> impl Iterator<Item = InstanceId> + '_ {
        self.created_for(sound)
            .filter(|id| self.instances.contains_key(id))
    }

    fn created_for(&self, sound: SoundId) -> impl Iterator<Item = InstanceId> + '_ {
        self.calls.iter().filter_map(move |call| match call {
            BackendCall::Create(s, id) if *s == sound => Some(*id),
            _ => None,
        })
    }

    /// A live instance.
    #[must_use]
    pub fn instance(&self, id: InstanceId) -> Option<&RecordedInstance> {
        self.instances.get(&id)
    }

    /// Whether an instance exists.
    #[must_use]
    pub fn is_live(&self, id: InstanceId) -> bool {
        self.instances.contains_key(&id)
    }

    /// Whether an instance has a running play.
    #[must_use]
    pub fn is_playing(&self, id: InstanceId) -> bool {
        self.instances.get(&id).is_some_and(|i| i.playing > 0)
    }

    /// Number of live instances.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.instances.len()
    }

    /// Number of instances playing and not muted.
    #[must_use]
    pub fn audible_count(&self) -> usize {
        self.instances
            .values()
            .filter(|i| i.playing > 0 && !i.muted)
            .count()
    }

    /// Complete the oldest running play of an instance. Returns whether one
    /// was running.
    pub fn finish(&mut self, id: InstanceId) -> bool {
        match self.instances.get_mut(&id) {
            Some(instance) if instance.playing > 0 => {
                instance.playing -= 1;
                self.finished.push(id);
                true
            },
            _ => false,
        }
    }

    /// Complete every running play. Returns how many.
    pub fn finish_all(&mut self) -> usize {
        let mut ids: Vec<InstanceId> = self.instances.keys().copied().collect();
        ids.sort_unstable();
        let mut count = 0;
        for id in ids {
            while self.finish(id) {
                count += 1;
            }
        }
        count
    }

    fn end_all_plays(&mut self, id: InstanceId) {
        while self.finish(id) {}
    }
}

impl AudioBackend for RecordingBackend {
    fn create_instance(&mut self, spec: &InstanceSpec) -> Result<InstanceId, AudioError> {
        if spec.urls.iter().any(|url| self.failing_urls.contains(url)) {
            return Err(AudioError::CreateFailed {
                url: spec.urls.first().cloned().unwrap_or_default(),
                message: "refused by test backend".to_string(),
            });
        }
        self.next_id += 1;
        let id = InstanceId::from_raw(self.next_id);
        self.instances.insert(
            id,
            RecordedInstance {
                spec: spec.clone(),
                playing: 0,
                muted: false,
                position_ms: 0,
            },
        );
        self.calls.push(BackendCall::Create(spec.sound, id));
        Ok(id)
    }

    fn play(&mut self, instance: InstanceId, params: &PlayParams) -> Result<(), AudioError> {
        if self.fail_play {
            return Err(AudioError::PlayFailed("refused by test backend".to_string()));
        }
        let recorded = self
            .instances
            .get_mut(&instance)
            .ok_or(AudioError::UnknownInstance(instance))?;
        recorded.playing += 1;
        recorded.muted = false;
        recorded.position_ms = 0;
        self.calls.push(BackendCall::Play(instance, *params));
        Ok(())
    }

    fn stop(&mut self, instance: InstanceId) {
        self.calls.push(BackendCall::Stop(instance));
        self.end_all_plays(instance);
    }

    fn mute(&mut self, instance: InstanceId) {
        self.calls.push(BackendCall::Mute(instance));
        if let Some(recorded) = self.instances.get_mut(&instance) {
            recorded.muted = true;
        }
    }

    fn set_position(&mut self, instance: InstanceId, position_ms: Millis) {
        self.calls.push(BackendCall::SetPosition(instance, position_ms));
        if let Some(recorded) = self.instances.get_mut(&instance) {
            recorded.position_ms = position_ms;
        }
        if position_ms >= self.duration_ms {
            self.end_all_plays(instance);
        }
    }

    fn duration_ms(&self, instance: InstanceId) -> Option<Millis> {
        self.instances.contains_key(&instance).then_some(self.duration_ms)
    }

    fn destroy(&mut self, instance: InstanceId) {
        self.calls.push(BackendCall::Destroy(instance));
        self.instances.remove(&instance);
    }

    fn poll_finished(&mut self) -> Vec<InstanceId> {
        std::mem::take(&mut self.finished)
    }
}

/// Clock advanced by hand. Game time stands still while paused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManualClock {
    wall_ms: Millis,
    game_ms: Millis,
    paused: bool,
}

impl ManualClock {
    /// Clock at zero, running.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            wall_ms: 0,
            game_ms: 0,
            paused: false,
        }
    }

    /// Let time pass.
    pub fn advance(&mut self, ms: Millis) {
        self.wall_ms += ms;
        if !self.paused {
            self.game_ms += ms;
        }
    }

    /// Pause or resume the game.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }
}

impl Clock for ManualClock {
    fn wall_ms(&self) -> Millis {
        self.wall_ms
    }

    fn game_ms(&self) -> Millis {
        self.game_ms
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}

/// Shared record of finish handler invocations.
#[derive(Debug, Clone, Default)]
pub struct CompletionLog {
    outcomes: Rc<RefCell<Vec<PlaybackOutcome>>>,
}

impl CompletionLog {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler that appends to this log.
    #[must_use]
    pub fn handler(&self) -> impl Fn(&PlaybackOutcome) + 'static {
        let outcomes = Rc::clone(&self.outcomes);
        move |outcome| outcomes.borrow_mut().push(*outcome)
    }

    /// Every outcome so far.
    #[must_use]
    pub fn outcomes(&self) -> Vec<PlaybackOutcome> {
        self.outcomes.borrow().clone()
    }

    /// Number of handler invocations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.borrow().len()
    }

    /// Whether no handler has fired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.borrow().is_empty()
    }

    /// Outcomes that played.
    #[must_use]
    pub fn played(&self) -> usize {
        self.outcomes.borrow().iter().filter(|o| !o.skipped).count()
    }

    /// Outcomes that were skipped.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.outcomes.borrow().iter().filter(|o| o.skipped).count()
    }
}
