//! Sound descriptors and their live playback instances.
//!
//! A descriptor is a registered, reusable sound configuration. It owns at most
//! one backend instance at a time: "idle" (no instance) or "armed" (instance
//! materialized and not yet torn down).

use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use salvo_common::{EntryId, InstanceId, Millis, SoundId};

use crate::backend::InstanceSpec;
use crate::playback::{Channel, FinishHandler, PlaybackOutcome, SequencePosition, SkipReason};

/// Options for registering a sound.
#[derive(Clone)]
pub struct SoundOptions {
    /// Candidate asset locators, in preference order.
    pub urls: Vec<String>,
    /// On-screen volume (0.0-1.0).
    pub volume: f32,
    /// Minimum time between two plays of the same asset (0 = unthrottled).
    pub throttle_ms: Millis,
    /// Off-screen volume. Defaults to a fraction of `volume`.
    pub off_screen_volume: Option<f32>,
    /// Ignore playback-rate overrides.
    pub fixed_rate: bool,
    /// Extra loop count.
    pub loops: u32,
    /// Max queued time before a commentary request is dropped.
    pub max_delay_ms: Option<Millis>,
    /// Always bypass the queues.
    pub play_immediately: bool,
    /// Keep the instance after completion; the call site releases it.
    pub retain_instance: bool,
    /// Called after every play or skip of this sound.
    pub on_finish: Option<FinishHandler>,
}

impl fmt::Debug for SoundOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundOptions")
            .field("urls", &self.urls)
            .field("volume", &self.volume)
            .field("throttle_ms", &self.throttle_ms)
            .field("off_screen_volume", &self.off_screen_volume)
            .field("max_delay_ms", &self.max_delay_ms)
            .field("play_immediately", &self.play_immediately)
            .field("retain_instance", &self.retain_instance)
            .finish_non_exhaustive()
    }
}

impl SoundOptions {
    /// Options for a single asset at full volume, unthrottled.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            volume: 1.0,
            throttle_ms: 0,
            off_screen_volume: None,
            fixed_rate: false,
            loops: 0,
            max_delay_ms: None,
            play_immediately: false,
            retain_instance: false,
            on_finish: None,
        }
    }

    /// Add a fallback locator.
    #[must_use]
    pub fn with_alternate(mut self, url: impl Into<String>) -> Self {
        self.urls.push(url.into());
        self
    }

    /// Set the on-screen volume.
    #[must_use]
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    /// Set the throttle window.
    #[must_use]
    pub fn with_throttle(mut self, throttle_ms: Millis) -> Self {
        self.throttle_ms = throttle_ms;
        self
    }

    /// Set an explicit off-screen volume.
    #[must_use]
    pub fn with_off_screen_volume(mut self, volume: f32) -> Self {
        self.off_screen_volume = Some(volume);
        self
    }

    /// Ignore playback-rate overrides.
    #[must_use]
    pub fn fixed_rate(mut self) -> Self {
        self.fixed_rate = true;
        self
    }

    /// Set the loop count.
    #[must_use]
    pub fn with_loops(mut self, loops: u32) -> Self {
        self.loops = loops;
        self
    }

    /// Set the max delay.
    #[must_use]
    pub fn with_max_delay(mut self, max_delay_ms: Millis) -> Self {
        self.max_delay_ms = Some(max_delay_ms);
        self
    }

    /// Always bypass the queues.
    #[must_use]
    pub fn play_immediately(mut self) -> Self {
        self.play_immediately = true;
        self
    }

    /// Keep the instance alive after completion.
    #[must_use]
    pub fn retain_instance(mut self) -> Self {
        self.retain_instance = true;
        self
    }

    /// Register a descriptor-level finish handler.
    #[must_use]
    pub fn on_finish(mut self, handler: impl Fn(&PlaybackOutcome) + 'static) -> Self {
        self.on_finish = Some(Rc::new(handler));
        self
    }
}

/// One-shot guard for instance teardown.
///
/// `complete` returns true exactly once; later calls are no-ops.
#[derive(Debug, Default)]
pub struct CompletionToken {
    completed: bool,
}

impl CompletionToken {
    /// Create an unused token.
    #[must_use]
    pub const fn new() -> Self {
        Self { completed: false }
    }

    /// Mark complete. Returns false if already completed.
    pub fn complete(&mut self) -> bool {
        !std::mem::replace(&mut self.completed, true)
    }

    /// Whether `complete` has been called.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.completed
    }
}

/// A `play` call awaiting its completion.
#[derive(Clone)]
pub(crate) struct PendingPlay {
    pub entry: EntryId,
    pub channel: Channel,
    pub sequence: Option<SequencePosition>,
    pub on_finish: Option<FinishHandler>,
    /// Set when the play was cancelled; its completion reports a skip.
    pub stopped: Option<SkipReason>,
}

/// Backend instance owned by a descriptor.
pub(crate) struct LiveInstance {
    pub id: InstanceId,
    pub token: CompletionToken,
    /// Plays in start order; the backend completes them in the same order.
    pub pending: VecDeque<PendingPlay>,
}

impl LiveInstance {
    pub fn new(id: InstanceId) -> Self {
        Self {
            id,
            token: CompletionToken::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn is_playing(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// A registered sound.
pub struct SoundDescriptor {
    id: SoundId,
    urls: Vec<String>,
    on_screen_volume: f32,
    off_screen_volume: f32,
    throttle_ms: Millis,
    fixed_rate: bool,
    loops: u32,
    max_delay_ms: Option<Millis>,
    play_immediately: bool,
    retain_instance: bool,
    on_finish: Option<FinishHandler>,
    pub(crate) last_played: Option<Millis>,
    pub(crate) instance: Option<LiveInstance>,
}

impl fmt::Debug for SoundDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundDescriptor")
            .field("id", &self.id)
            .field("urls", &self.urls)
            .field("on_screen_volume", &self.on_screen_volume)
            .field("off_screen_volume", &self.off_screen_volume)
            .field("throttle_ms", &self.throttle_ms)
            .field("last_played", &self.last_played)
            .field("instance", &self.instance.as_ref().map(|i| i.id))
            .finish_non_exhaustive()
    }
}

impl SoundDescriptor {
    /// Build a descriptor. The off-screen volume defaults to
    /// `volume * off_screen_ratio`.
    pub(crate) fn new(id: SoundId, options: SoundOptions, off_screen_ratio: f32) -> Self {
        let off_screen_volume = options
            .off_screen_volume
            .unwrap_or(options.volume * off_screen_ratio);
        Self {
            id,
            urls: options.urls,
            on_screen_volume: options.volume,
            off_screen_volume,
            throttle_ms: options.throttle_ms,
            fixed_rate: options.fixed_rate,
            loops: options.loops,
            max_delay_ms: options.max_delay_ms,
            play_immediately: options.play_immediately,
            retain_instance: options.retain_instance,
            on_finish: options.on_finish,
            last_played: None,
            instance: None,
        }
    }

    /// Descriptor id.
    #[must_use]
    pub const fn id(&self) -> SoundId {
        self.id
    }

    /// Candidate locators.
    #[must_use]
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Primary locator; the throttle key.
    #[must_use]
    pub fn primary_url(&self) -> &str {
        self.urls.first().map_or("", String::as_str)
    }

    /// Volume when the emitter is on screen.
    #[must_use]
    pub const fn on_screen_volume(&self) -> f32 {
        self.on_screen_volume
    }

    /// Volume floor when the emitter is off screen.
    #[must_use]
    pub const fn off_screen_volume(&self) -> f32 {
        self.off_screen_volume
    }

    /// Throttle window.
    #[must_use]
    pub const fn throttle_ms(&self) -> Millis {
        self.throttle_ms
    }

    /// Max queued time.
    #[must_use]
    pub const fn max_delay_ms(&self) -> Option<Millis> {
        self.max_delay_ms
    }

    /// Whether playback rate overrides are ignored.
    #[must_use]
    pub const fn fixed_rate(&self) -> bool {
        self.fixed_rate
    }

    /// Default loop count.
    #[must_use]
    pub const fn loops(&self) -> u32 {
        self.loops
    }

    /// Whether requests bypass the queues.
    #[must_use]
    pub const fn play_immediately(&self) -> bool {
        self.play_immediately
    }

    /// Whether instances survive completion.
    #[must_use]
    pub const fn retain_instance(&self) -> bool {
        self.retain_instance
    }

    /// Descriptor-level finish handler.
    #[must_use]
    pub fn on_finish(&self) -> Option<&FinishHandler> {
        self.on_finish.as_ref()
    }

    /// Last time this descriptor started playing.
    #[must_use]
    pub const fn last_played(&self) -> Option<Millis> {
        self.last_played
    }

    /// Live backend instance, if armed.
    #[must_use]
    pub fn instance_id(&self) -> Option<InstanceId> {
        self.instance.as_ref().map(|i| i.id)
    }

    /// Whether an instance exists.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.instance.is_some()
    }

    /// Whether the instance has plays in progress.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.instance.as_ref().is_some_and(LiveInstance::is_playing)
    }

    /// Whether any locator contains the commentary marker.
    #[must_use]
    pub fn is_commentary_asset(&self, marker: &str) -> bool {
        !marker.is_empty() && self.urls.iter().any(|u| u.contains(marker))
    }

    /// Spec handed to the backend when materializing.
    #[must_use]
    pub fn instance_spec(&self) -> InstanceSpec {
        InstanceSpec {
            sound: self.id,
            urls: self.urls.clone(),
            volume: self.on_screen_volume,
            fixed_rate: self.fixed_rate,
            loops: self.loops,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_off_screen_defaults_to_quarter() {
        let desc = SoundDescriptor::new(
            SoundId::from_index(0),
            SoundOptions::new("sfx/boom.ogg").with_volume(0.8),
            0.25,
        );
        assert!((desc.off_screen_volume() - 0.2).abs() < 0.001);
        assert!(!desc.is_armed());
        assert_eq!(desc.primary_url(), "sfx/boom.ogg");
    }

    #[test]
    fn test_explicit_off_screen_volume() {
        let desc = SoundDescriptor::new(
            SoundId::from_index(0),
            SoundOptions::new("sfx/boom.ogg").with_off_screen_volume(0.6),
            0.25,
        );
        assert!((desc.off_screen_volume() - 0.6).abs() < 0.001);
    }

    #[test]
    fn test_commentary_marker() {
        let desc = SoundDescriptor::new(
            SoundId::from_index(0),
            SoundOptions::new("audio/commentary/first_blood.ogg"),
            0.25,
        );
        assert!(desc.is_commentary_asset("commentary/"));
        assert!(!desc.is_commentary_asset("voice/"));
        assert!(!desc.is_commentary_asset(""));
    }

    #[test]
    fn test_completion_token_fires_once() {
        let mut token = CompletionToken::new();
        assert!(token.complete());
        assert!(!token.complete());
        assert!(token.is_completed());
    }
}
