//! Reference resolution.
//!
//! Turns a [`SoundRef`] into something playable, in order: the global sound
//! switch, sequence pass-through, pool round-robin, selector unwrapping,
//! the commentary switch for commentary assets, and finally materializing
//! the sound's backend instance.

use salvo_common::{InstanceId, SequenceId, SoundId};
use tracing::{debug, trace, warn};

use crate::backend::AudioBackend;
use crate::clock::Clock;
use crate::descriptor::LiveInstance;
use crate::playback::SkipReason;
use crate::preferences::Preferences;
use crate::reference::SoundRef;
use crate::scheduler::Scheduler;

/// A resolved reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    /// A single sound with a live instance.
    Sound(SoundId),
    /// A sequence, handed to the sequence engine as-is.
    Sequence(SequenceId),
}

impl<B: AudioBackend, C: Clock, P: Preferences> Scheduler<B, C, P> {
    /// Resolve a reference.
    ///
    /// Advances pool cursors and invokes selectors, so every call may yield
    /// a different sound. A resolved sound always has a live instance.
    pub fn resolve(&mut self, r: &SoundRef) -> Result<Resolved, SkipReason> {
        self.resolve_declinable(r)?.ok_or(SkipReason::Unresolved)
    }

    /// Like [`resolve`](Self::resolve), but a selector declining to pick a
    /// sound yields `Ok(None)` instead of an error.
    pub(crate) fn resolve_declinable(
        &mut self,
        r: &SoundRef,
    ) -> Result<Option<Resolved>, SkipReason> {
        if !self.preferences.sound_enabled() {
            trace!("Sound disabled, not resolving {r:?}");
            return Err(SkipReason::Disabled);
        }

        let Some(resolved) = self.resolve_ref(r.clone(), 0)? else {
            return Ok(None);
        };
        if let Resolved::Sound(sound) = resolved {
            self.materialize(sound)?;
        }
        Ok(Some(resolved))
    }

    fn resolve_ref(
        &mut self,
        r: SoundRef,
        depth: usize,
    ) -> Result<Option<Resolved>, SkipReason> {
        let limit = self.config.selector_depth_limit;
        if depth > limit {
            warn!("Reference nesting exceeds {limit}, giving up");
            return Err(SkipReason::Unresolved);
        }

        match r {
            SoundRef::Sequence(id) => {
                if self.registry.sequence(id).is_some() {
                    Ok(Some(Resolved::Sequence(id)))
                } else {
                    Err(SkipReason::Unresolved)
                }
            },
            SoundRef::Pool(id) => {
                let min_len = self.config.reshuffle_min_len;
                let next = self
                    .registry
                    .pool_mut(id)
                    .and_then(|pool| pool.draw(&mut self.rng, min_len))
                    .ok_or(SkipReason::Unresolved)?;
                self.resolve_ref(next, depth + 1)
            },
            SoundRef::Selector(selector) => {
                let mut current = selector.select();
                let mut invocations = 1;
                while let Some(SoundRef::Selector(inner)) = current {
                    invocations += 1;
                    if invocations > limit {
                        warn!("Selector chain exceeds {limit} invocations, giving up");
                        return Err(SkipReason::Unresolved);
                    }
                    current = inner.select();
                }
                match current {
                    Some(next) => self.resolve_ref(next, depth + 1),
                    None => {
                        trace!("Selector declined to pick a sound");
                        Ok(None)
                    },
                }
            },
            SoundRef::Sound(id) => {
                let desc = self.registry.sound(id).ok_or(SkipReason::Unresolved)?;
                if desc.is_commentary_asset(&self.config.commentary_marker)
                    && !self.preferences.commentary_enabled()
                {
                    debug!("Commentary disabled, dropping {id}");
                    return Err(SkipReason::Disabled);
                }
                Ok(Some(Resolved::Sound(id)))
            },
        }
    }

    /// Ensure a sound has a backend instance, creating it if needed.
    pub(crate) fn materialize(&mut self, sound: SoundId) -> Result<InstanceId, SkipReason> {
        let desc = self
            .registry
            .sound_mut(sound)
            .ok_or(SkipReason::Unresolved)?;
        if let Some(live) = &desc.instance {
            return Ok(live.id);
        }

        match self.backend.create_instance(&desc.instance_spec()) {
            Ok(instance) => {
                desc.instance = Some(LiveInstance::new(instance));
                self.instances.insert(instance, sound);
                trace!("Materialized {instance} for {sound}");
                Ok(instance)
            },
            Err(e) => {
                warn!("Failed to create instance for {sound}: {e}");
                Err(SkipReason::BackendFailure)
            },
        }
    }
}
