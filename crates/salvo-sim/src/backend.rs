//! Simulated audio engine.
//!
//! Every clip lasts a fixed length of game time. Running clips only advance
//! while the game runs, so nothing completes during a pause. Completions for
//! configured locators are swallowed to reproduce an engine that loses its
//! callbacks.

use std::collections::VecDeque;

use ahash::AHashMap;
use salvo_audio::{AudioBackend, InstanceSpec, PlayParams};
use salvo_common::{AudioError, InstanceId, Millis};
use tracing::{debug, trace};

struct SimInstance {
    url: String,
    /// Game time at which each running play ends.
    ends_at: VecDeque<Millis>,
}

/// Audio engine driven by the simulation loop.
pub struct SimBackend {
    clip_ms: Millis,
    lost_completions: Vec<String>,
    instances: AHashMap<InstanceId, SimInstance>,
    finished: Vec<InstanceId>,
    game_ms: Millis,
    next_id: u64,
    /// Plays started so far.
    pub plays: u64,
    /// Completions swallowed so far.
    pub lost: u64,
}

impl SimBackend {
    /// Engine whose clips last `clip_ms`.
    pub fn new(clip_ms: Millis, lost_completions: Vec<String>) -> Self {
        Self {
            clip_ms,
            lost_completions,
            instances: AHashMap::new(),
            finished: Vec::new(),
            game_ms: 0,
            next_id: 0,
            plays: 0,
            lost: 0,
        }
    }

    /// Advance running clips to the given game time.
    pub fn tick(&mut self, game_ms: Millis, paused: bool) {
        self.game_ms = game_ms;
        if paused {
            return;
        }
        for (id, instance) in &mut self.instances {
            while instance.ends_at.front().is_some_and(|end| *end <= game_ms) {
                instance.ends_at.pop_front();
                if self.lost_completions.contains(&instance.url) {
                    trace!("Swallowing completion of {}", instance.url);
                    self.lost += 1;
                } else {
                    self.finished.push(*id);
                }
            }
        }
    }

    /// Number of live instances.
    pub fn live_count(&self) -> usize {
        self.instances.len()
    }

    fn end_now(&mut self, instance: InstanceId) {
        let now = self.game_ms;
        if let Some(sim) = self.instances.get_mut(&instance) {
            for end in &mut sim.ends_at {
                *end = now;
            }
        }
    }
}

impl AudioBackend for SimBackend {
    fn create_instance(&mut self, spec: &InstanceSpec) -> Result<InstanceId, AudioError> {
        let url = spec
            .urls
            .first()
            .cloned()
            .ok_or_else(|| AudioError::NotLoaded(spec.sound.to_string()))?;
        self.next_id += 1;
        let id = InstanceId::from_raw(self.next_id);
        self.instances.insert(
            id,
            SimInstance {
                url,
                ends_at: VecDeque::new(),
            },
        );
        trace!("Created {id} for {}", spec.sound);
        Ok(id)
    }

    fn play(&mut self, instance: InstanceId, params: &PlayParams) -> Result<(), AudioError> {
        let end = self.game_ms + self.clip_ms * (u64::from(params.loops) + 1);
        let sim = self
            .instances
            .get_mut(&instance)
            .ok_or(AudioError::UnknownInstance(instance))?;
        sim.ends_at.push_back(end);
        self.plays += 1;
        debug!(
            "Engine playing {} (volume {:.2}, pan {:.2})",
            sim.url, params.volume, params.pan
        );
        Ok(())
    }

    fn stop(&mut self, instance: InstanceId) {
        self.end_now(instance);
    }

    fn mute(&mut self, instance: InstanceId) {
        trace!("Muted {instance}");
    }

    fn set_position(&mut self, instance: InstanceId, position_ms: Millis) {
        if position_ms >= self.clip_ms {
            self.end_now(instance);
        }
    }

    fn duration_ms(&self, instance: InstanceId) -> Option<Millis> {
        self.instances.contains_key(&instance).then_some(self.clip_ms)
    }

    fn destroy(&mut self, instance: InstanceId) {
        self.instances.remove(&instance);
    }

    fn poll_finished(&mut self) -> Vec<InstanceId> {
        std::mem::take(&mut self.finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salvo_audio::SoundId;

    fn spec(url: &str) -> InstanceSpec {
        InstanceSpec {
            sound: SoundId::from_index(0),
            urls: vec![url.to_string()],
            volume: 1.0,
            fixed_rate: false,
            loops: 0,
        }
    }

    #[test]
    fn test_clip_completes_after_game_time() {
        let mut backend = SimBackend::new(100, Vec::new());
        let id = backend.create_instance(&spec("sfx/a.ogg")).expect("create");
        backend.play(id, &PlayParams::default()).expect("play");

        backend.tick(99, false);
        assert!(backend.poll_finished().is_empty());
        backend.tick(100, false);
        assert_eq!(backend.poll_finished(), vec![id]);
    }

    #[test]
    fn test_nothing_completes_while_paused() {
        let mut backend = SimBackend::new(100, Vec::new());
        let id = backend.create_instance(&spec("sfx/a.ogg")).expect("create");
        backend.play(id, &PlayParams::default()).expect("play");
        backend.set_position(id, 100);

        backend.tick(0, true);
        assert!(backend.poll_finished().is_empty());
        backend.tick(0, false);
        assert_eq!(backend.poll_finished(), vec![id]);
    }

    #[test]
    fn test_lost_completions_are_swallowed() {
        let mut backend = SimBackend::new(100, vec!["commentary/off_air.ogg".to_string()]);
        let id = backend
            .create_instance(&spec("commentary/off_air.ogg"))
            .expect("create");
        backend.play(id, &PlayParams::default()).expect("play");

        backend.tick(500, false);
        assert!(backend.poll_finished().is_empty());
        assert_eq!(backend.lost, 1);
    }
}
