//! Registry of sounds, pools and sequences.
//!
//! Registered objects live in arenas and are addressed by typed ids, so
//! references stay cheap to clone and pools can share descriptors.

use salvo_common::{Millis, PoolId, RegistryError, SequenceId, SoundId};
use tracing::debug;

use crate::descriptor::{SoundDescriptor, SoundOptions};
use crate::reference::{Sequence, SoundPool, SoundRef};

/// Options for registering a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolOptions {
    /// Keep the registration order on wraparound.
    pub exclude_reshuffle: bool,
}

/// Arena of registered sound objects.
#[derive(Debug, Default)]
pub struct SoundRegistry {
    sounds: Vec<SoundDescriptor>,
    pools: Vec<SoundPool>,
    sequences: Vec<Sequence>,
}

impl SoundRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sound. Nothing is materialized until first resolution.
    pub fn register_sound(
        &mut self,
        options: SoundOptions,
        off_screen_ratio: f32,
    ) -> Result<SoundId, RegistryError> {
        if options.urls.iter().all(|u| u.trim().is_empty()) {
            return Err(RegistryError::EmptyLocator);
        }
        if !options.volume.is_finite() || !(0.0..=1.0).contains(&options.volume) {
            return Err(RegistryError::InvalidVolume(options.volume));
        }
        if let Some(off) = options.off_screen_volume {
            if !off.is_finite() || !(0.0..=1.0).contains(&off) {
                return Err(RegistryError::InvalidVolume(off));
            }
        }

        let id = SoundId::from_index(self.sounds.len());
        debug!("Registered {} ({})", id, options.urls.join(", "));
        self.sounds
            .push(SoundDescriptor::new(id, options, off_screen_ratio));
        Ok(id)
    }

    /// Register a pool of interchangeable references.
    pub fn register_pool(
        &mut self,
        items: Vec<SoundRef>,
        options: PoolOptions,
    ) -> Result<PoolId, RegistryError> {
        if items.is_empty() {
            return Err(RegistryError::EmptyPool);
        }
        self.validate_refs(&items)?;

        let id = PoolId::from_index(self.pools.len());
        debug!("Registered {} with {} members", id, items.len());
        self.pools
            .push(SoundPool::new(items, options.exclude_reshuffle));
        Ok(id)
    }

    /// Register a sequence.
    pub fn register_sequence(
        &mut self,
        refs: Vec<SoundRef>,
        max_delay_ms: Option<Millis>,
    ) -> Result<SequenceId, RegistryError> {
        if refs.is_empty() {
            return Err(RegistryError::EmptySequence);
        }
        self.validate_refs(&refs)?;

        let id = SequenceId::from_index(self.sequences.len());
        debug!("Registered {} with {} steps", id, refs.len());
        self.sequences.push(Sequence::new(refs, max_delay_ms));
        Ok(id)
    }

    fn validate_refs(&self, refs: &[SoundRef]) -> Result<(), RegistryError> {
        for r in refs {
            match r {
                SoundRef::Sound(id) if self.sound(*id).is_none() => {
                    return Err(RegistryError::UnknownSound(*id));
                },
                SoundRef::Pool(id) if self.pool(*id).is_none() => {
                    return Err(RegistryError::UnknownPool(*id));
                },
                SoundRef::Sequence(id) if self.sequence(*id).is_none() => {
                    return Err(RegistryError::UnknownSequence(*id));
                },
                _ => {},
            }
        }
        Ok(())
    }

    /// Look up a sound.
    #[must_use]
    pub fn sound(&self, id: SoundId) -> Option<&SoundDescriptor> {
        self.sounds.get(id.index())
    }

    /// Look up a sound mutably.
    pub fn sound_mut(&mut self, id: SoundId) -> Option<&mut SoundDescriptor> {
        self.sounds.get_mut(id.index())
    }

    /// Look up a pool.
    #[must_use]
    pub fn pool(&self, id: PoolId) -> Option<&SoundPool> {
        self.pools.get(id.index())
    }

    /// Look up a pool mutably.
    pub fn pool_mut(&mut self, id: PoolId) -> Option<&mut SoundPool> {
        self.pools.get_mut(id.index())
    }

    /// Look up a sequence.
    #[must_use]
    pub fn sequence(&self, id: SequenceId) -> Option<&Sequence> {
        self.sequences.get(id.index())
    }

    /// All registered sounds.
    pub fn sounds(&self) -> impl Iterator<Item = &SoundDescriptor> {
        self.sounds.iter()
    }

    /// Every sound a reference could play, without advancing any cursor.
    ///
    /// Selectors are opaque and contribute nothing.
    #[must_use]
    pub fn members(&self, r: &SoundRef) -> Vec<SoundId> {
        let mut out = Vec::new();
        self.collect_members(r, &mut out, 0);
        out.sort_unstable();
        out.dedup();
        out
    }

    fn collect_members(&self, r: &SoundRef, out: &mut Vec<SoundId>, depth: usize) {
        if depth > 32 {
            return;
        }
        match r {
            SoundRef::Sound(id) => out.push(*id),
            SoundRef::Pool(id) => {
                if let Some(pool) = self.pool(*id) {
                    for item in pool.items() {
                        self.collect_members(item, out, depth + 1);
                    }
                }
            },
            SoundRef::Sequence(id) => {
                if let Some(sequence) = self.sequence(*id) {
                    for step in sequence.steps() {
                        self.collect_members(step, out, depth + 1);
                    }
                }
            },
            SoundRef::Selector(_) => {},
        }
    }
}
