//! Operator-facing snapshot of the commentary channel.

use salvo_common::{EntryId, Millis, SoundId};
use serde::{Deserialize, Serialize};

use crate::backend::AudioBackend;
use crate::clock::Clock;
use crate::commentary::{ChannelState, LastPlayed};
use crate::playback::SequencePosition;
use crate::preferences::Preferences;
use crate::scheduler::Scheduler;

/// A queued commentary entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedEntrySummary {
    /// Entry id.
    pub entry: EntryId,
    /// Sound it will play.
    pub sound: SoundId,
    /// Primary asset locator.
    pub url: String,
    /// Time spent in the queue so far.
    pub age_ms: Millis,
    /// Sequence membership.
    pub sequence: Option<SequencePosition>,
    /// Marked by a stop request.
    pub skip: bool,
}

/// The entry holding the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InFlightSummary {
    /// Entry id.
    pub entry: EntryId,
    /// Sound playing or about to play.
    pub sound: SoundId,
    /// How long the channel has been held.
    pub held_ms: Millis,
    /// Still waiting out the sequence gap.
    pub waiting_for_gap: bool,
}

/// Snapshot of the commentary channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentaryDiagnostics {
    /// Idle or draining.
    pub state: ChannelState,
    /// Queue contents, head first.
    pub queued: Vec<QueuedEntrySummary>,
    /// Current occupant.
    pub in_flight: Option<InFlightSummary>,
    /// Last line handed to the backend.
    pub last_played: Option<LastPlayed>,
    /// Pause fallback pending.
    pub fallback_armed: bool,
    /// Head entry waited past the stuck threshold while the channel is held.
    pub stuck: bool,
    /// Sequence playthroughs still in progress.
    pub active_sequences: usize,
    /// Materialized backend instances.
    pub live_instances: usize,
}

impl CommentaryDiagnostics {
    /// Pretty JSON for logs and tooling.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl<B: AudioBackend, C: Clock, P: Preferences> Scheduler<B, C, P> {
    /// Snapshot the commentary channel.
    #[must_use]
    pub fn commentary_diagnostics(&self) -> CommentaryDiagnostics {
        let now = self.now();
        let queued = self
            .commentary
            .entries()
            .map(|entry| QueuedEntrySummary {
                entry: entry.id,
                sound: entry.sound,
                url: self
                    .registry
                    .sound(entry.sound)
                    .map(|d| d.primary_url().to_string())
                    .unwrap_or_default(),
                age_ms: now.saturating_sub(entry.enqueued_at),
                sequence: entry.sequence,
                skip: entry.skip,
            })
            .collect();

        let in_flight = self.commentary.in_flight.map(|flight| InFlightSummary {
            entry: flight.entry,
            sound: flight.sound,
            held_ms: now.saturating_sub(flight.since),
            waiting_for_gap: self
                .commentary
                .delayed
                .as_ref()
                .is_some_and(|d| d.ticket == flight.ticket),
        });

        CommentaryDiagnostics {
            state: self.commentary.state(),
            queued,
            in_flight,
            last_played: self.commentary.last_played(),
            fallback_armed: self.commentary.fallback_armed,
            stuck: self.is_commentary_stuck(),
            active_sequences: self.sequences.active_runs(),
            live_instances: self.live_instance_count(),
        }
    }
}
