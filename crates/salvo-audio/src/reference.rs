//! Sound references: anything a call site may ask to play.

use std::fmt;
use std::rc::Rc;

use salvo_common::{Millis, PoolId, SequenceId, SoundId};

/// Something a call site can hand to the scheduler.
#[derive(Clone)]
pub enum SoundRef {
    /// One registered sound.
    Sound(SoundId),
    /// A pool of interchangeable variants, drawn round-robin.
    Pool(PoolId),
    /// A function choosing the reference lazily.
    Selector(Selector),
    /// An ordered group played back-to-back on the commentary channel.
    Sequence(SequenceId),
}

impl SoundRef {
    /// The sound id, when this is a plain sound.
    #[must_use]
    pub const fn sound_id(&self) -> Option<SoundId> {
        match self {
            Self::Sound(id) => Some(*id),
            _ => None,
        }
    }

    /// Whether two references denote the same object.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Sound(a), Self::Sound(b)) => a == b,
            (Self::Pool(a), Self::Pool(b)) => a == b,
            (Self::Sequence(a), Self::Sequence(b)) => a == b,
            (Self::Selector(a), Self::Selector(b)) => Rc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }
}

impl fmt::Debug for SoundRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sound(id) => write!(f, "Sound({id})"),
            Self::Pool(id) => write!(f, "Pool({id})"),
            Self::Selector(_) => f.write_str("Selector(..)"),
            Self::Sequence(id) => write!(f, "Sequence({id})"),
        }
    }
}

impl From<SoundId> for SoundRef {
    fn from(id: SoundId) -> Self {
        Self::Sound(id)
    }
}

impl From<PoolId> for SoundRef {
    fn from(id: PoolId) -> Self {
        Self::Pool(id)
    }
}

impl From<SequenceId> for SoundRef {
    fn from(id: SequenceId) -> Self {
        Self::Sequence(id)
    }
}

impl From<Selector> for SoundRef {
    fn from(selector: Selector) -> Self {
        Self::Selector(selector)
    }
}

/// Zero-argument function resolved at play time.
///
/// Returning `None` means "nothing to play"; inside a sequence the step is
/// dropped.
#[derive(Clone)]
pub struct Selector(Rc<dyn Fn() -> Option<SoundRef>>);

impl Selector {
    /// Wrap a selection function.
    pub fn new(select: impl Fn() -> Option<SoundRef> + 'static) -> Self {
        Self(Rc::new(select))
    }

    /// Invoke the function once.
    #[must_use]
    pub fn select(&self) -> Option<SoundRef> {
        (self.0)()
    }
}

/// Round-robin pool of interchangeable references.
#[derive(Debug, Clone)]
pub struct SoundPool {
    items: Vec<SoundRef>,
    cursor: usize,
    last_item: bool,
    exclude_reshuffle: bool,
}

impl SoundPool {
    /// Create a pool. `items` must not be empty.
    #[must_use]
    pub fn new(items: Vec<SoundRef>, exclude_reshuffle: bool) -> Self {
        Self {
            items,
            cursor: 0,
            last_item: false,
            exclude_reshuffle,
        }
    }

    /// Current members, in draw order.
    #[must_use]
    pub fn items(&self) -> &[SoundRef] {
        &self.items
    }

    /// Index of the next member to be drawn.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// True when the last draw returned the final member before a reset.
    #[must_use]
    pub const fn last_item(&self) -> bool {
        self.last_item
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the pool has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Draw the next member and advance the cursor by one.
    ///
    /// On wraparound the cursor resets to 0 and, for pools of at least
    /// `reshuffle_min_len` members, the order is reshuffled. A reshuffle never
    /// puts the member just drawn first again.
    pub fn draw(&mut self, rng: &mut fastrand::Rng, reshuffle_min_len: usize) -> Option<SoundRef> {
        let picked = self.items.get(self.cursor)?.clone();
        self.cursor += 1;

        if self.cursor < self.items.len() {
            self.last_item = false;
            return Some(picked);
        }

        self.last_item = true;
        self.cursor = 0;
        if !self.exclude_reshuffle && self.items.len() >= reshuffle_min_len {
            rng.shuffle(&mut self.items);
            if self.items[0].same_as(&picked) {
                let last = self.items.len() - 1;
                self.items.swap(0, last);
            }
        }
        Some(picked)
    }
}

/// Ordered group of references that plays as one cancellable unit.
///
/// Only the opener can be dropped for lateness or repetition. Which step
/// opens is settled when the sequence is played, after selectors that
/// decline to pick a sound have been filtered out.
#[derive(Debug, Clone)]
pub struct Sequence {
    steps: Vec<SoundRef>,
    max_delay_ms: Option<Millis>,
}

impl Sequence {
    /// Build a sequence.
    #[must_use]
    pub fn new(steps: Vec<SoundRef>, max_delay_ms: Option<Millis>) -> Self {
        Self {
            steps,
            max_delay_ms,
        }
    }

    /// Steps in play order.
    #[must_use]
    pub fn steps(&self) -> &[SoundRef] {
        &self.steps
    }

    /// Max delay propagated to every step.
    #[must_use]
    pub const fn max_delay_ms(&self) -> Option<Millis> {
        self.max_delay_ms
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the sequence has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
