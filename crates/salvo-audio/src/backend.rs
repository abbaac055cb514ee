//! Audio engine collaborator.
//!
//! The scheduler never decodes or mixes audio itself. It drives an
//! [`AudioBackend`] that owns the real playback instances and reports when
//! each `play` call has finished.

use salvo_common::{AudioError, InstanceId, Millis, SoundId};
use serde::{Deserialize, Serialize};

/// Everything the backend needs to materialize an instance for a sound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSpec {
    /// Sound the instance belongs to.
    pub sound: SoundId,
    /// Candidate asset locators, in preference order.
    pub urls: Vec<String>,
    /// Base volume (0.0-1.0).
    pub volume: f32,
    /// Ignore playback-rate overrides.
    pub fixed_rate: bool,
    /// Extra loop count (0 = play once).
    pub loops: u32,
}

/// Per-play parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayParams {
    /// Volume (0.0-1.0).
    pub volume: f32,
    /// Stereo pan (-1.0 = left, 1.0 = right).
    pub pan: f32,
    /// Playback rate multiplier.
    pub playback_rate: f32,
    /// Extra loop count (0 = play once).
    pub loops: u32,
}

impl Default for PlayParams {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pan: 0.0,
            playback_rate: 1.0,
            loops: 0,
        }
    }
}

/// Audio engine operations consumed by the scheduler.
///
/// Contract: every successful [`play`](Self::play) produces exactly one
/// completion, reported either from [`poll_finished`](Self::poll_finished) or
/// by the host calling `Scheduler::on_instance_finished`. A failed `play`
/// produces none.
pub trait AudioBackend {
    /// Create a playback instance for a sound.
    fn create_instance(&mut self, spec: &InstanceSpec) -> Result<InstanceId, AudioError>;

    /// Start (or restart) playback of an instance.
    fn play(&mut self, instance: InstanceId, params: &PlayParams) -> Result<(), AudioError>;

    /// Stop playback. Still yields the pending completion.
    fn stop(&mut self, instance: InstanceId);

    /// Silence an instance without stopping it.
    fn mute(&mut self, instance: InstanceId);

    /// Seek to a position in milliseconds.
    fn set_position(&mut self, instance: InstanceId, position_ms: Millis);

    /// Length of the instance's asset, if known.
    fn duration_ms(&self, instance: InstanceId) -> Option<Millis>;

    /// Release an instance and its resources.
    fn destroy(&mut self, instance: InstanceId);

    /// Completions observed since the last poll.
    fn poll_finished(&mut self) -> Vec<InstanceId> {
        Vec::new()
    }
}
