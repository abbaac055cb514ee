//! Scripted match timeline.

use std::cell::Cell;
use std::rc::Rc;

use anyhow::{Context, Result};
use glam::Vec2;
use salvo_audio::{
    Clock, CommentaryDiagnostics, PlayOptions, PoolOptions, Scheduler, SoundOptions, SoundRef,
    StaticPreferences,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::backend::SimBackend;
use crate::config::SimConfig;
use crate::timing::SimClock;

type SimScheduler = Scheduler<SimBackend, SimClock, StaticPreferences>;

/// Something that happens at a given frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cue {
    Whistle,
    ShotBurst,
    Grunt,
    BuildUp,
    Strike,
    Pause(bool),
    Commentary(bool),
    Chant,
    FarExplosion,
    OffAir,
    Replay,
}

const TIMELINE: &[(u32, Cue)] = &[
    (0, Cue::Whistle),
    (30, Cue::ShotBurst),
    (31, Cue::ShotBurst),
    (45, Cue::Grunt),
    (60, Cue::Grunt),
    (75, Cue::Grunt),
    (90, Cue::BuildUp),
    (100, Cue::Strike),
    (150, Cue::Pause(true)),
    (260, Cue::Pause(false)),
    (400, Cue::Commentary(false)),
    (410, Cue::Chant),
    (480, Cue::Commentary(true)),
    (520, Cue::FarExplosion),
    (600, Cue::OffAir),
    (620, Cue::Replay),
];

/// Final state of a run.
#[derive(Debug, Serialize)]
pub struct Report {
    /// Frames simulated.
    pub frames: u32,
    /// Wall time covered.
    pub wall_ms: u64,
    /// Requests made by the timeline.
    pub requested: u64,
    /// Requests whose handler saw a completed play.
    pub played: u64,
    /// Requests whose handler saw a skip.
    pub skipped: u64,
    /// Plays the engine started.
    pub engine_plays: u64,
    /// Completions the engine swallowed.
    pub lost_completions: u64,
    /// Instances still alive.
    pub live_instances: usize,
    /// Commentary channel snapshot.
    pub commentary: CommentaryDiagnostics,
}

#[derive(Debug, Clone, Default)]
struct Tally {
    requested: Rc<Cell<u64>>,
    played: Rc<Cell<u64>>,
    skipped: Rc<Cell<u64>>,
}

impl Tally {
    /// Options for one counted request.
    fn options(&self) -> PlayOptions {
        self.requested.set(self.requested.get() + 1);
        let played = Rc::clone(&self.played);
        let skipped = Rc::clone(&self.skipped);
        PlayOptions::default().on_finish(move |outcome| {
            let counter = if outcome.skipped { &skipped } else { &played };
            counter.set(counter.get() + 1);
        })
    }
}

struct Sounds {
    whistle: SoundRef,
    shot: SoundRef,
    grunts: SoundRef,
    build_up: SoundRef,
    strike: SoundRef,
    chant: SoundRef,
    explosion: SoundRef,
    off_air: SoundRef,
    replay: SoundRef,
}

impl Sounds {
    fn register(scheduler: &mut SimScheduler) -> Result<Self> {
        let grunts = (1..=4)
            .map(|i| scheduler.register_sound(SoundOptions::new(format!("sfx/grunt_{i}.ogg"))))
            .collect::<Result<Vec<_>, _>>()?;
        let build_up = ["and_here_it_comes", "the_cross", "header"]
            .iter()
            .map(|line| scheduler.register_sound(SoundOptions::new(format!("commentary/{line}.ogg"))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            whistle: scheduler.register_sound(
                SoundOptions::new("sfx/whistle.ogg").play_immediately(),
            )?,
            shot: scheduler.register_sound(SoundOptions::new("sfx/shot.ogg").with_throttle(100))?,
            grunts: scheduler.register_pool(grunts, PoolOptions::default())?,
            build_up: scheduler.register_sequence(build_up)?,
            strike: scheduler.register_sound(
                SoundOptions::new("commentary/what_a_strike.ogg").with_max_delay(3000),
            )?,
            chant: scheduler.register_sound(SoundOptions::new("commentary/crowd_chant.ogg"))?,
            explosion: scheduler.register_sound(
                SoundOptions::new("sfx/explosion.ogg")
                    .with_alternate("sfx/explosion.wav")
                    .with_volume(0.9),
            )?,
            off_air: scheduler.register_sound(SoundOptions::new("commentary/off_air.ogg"))?,
            replay: scheduler.register_sound(SoundOptions::new("commentary/replay.ogg"))?,
        })
    }

    fn cue(&self, scheduler: &mut SimScheduler, cue: Cue, tally: &Tally) {
        debug!("Cue {cue:?}");
        match cue {
            Cue::Whistle => scheduler.play_effect(&self.whistle, None, tally.options()),
            Cue::ShotBurst => {
                for _ in 0..3 {
                    scheduler.play_effect(&self.shot, None, tally.options());
                }
            },
            Cue::Grunt => scheduler.play_effect(&self.grunts, None, tally.options()),
            Cue::BuildUp => scheduler.play_commentary(&self.build_up, None, tally.options()),
            Cue::Strike => scheduler.play_commentary(&self.strike, None, tally.options()),
            Cue::Pause(paused) => {
                info!("Game {}", if paused { "paused" } else { "resumed" });
                scheduler.clock_mut().set_paused(paused);
            },
            Cue::Commentary(enabled) => {
                info!("Commentary {}", if enabled { "enabled" } else { "disabled" });
                scheduler.preferences_mut().commentary_enabled = enabled;
            },
            Cue::Chant => scheduler.play_commentary(&self.chant, None, tally.options()),
            Cue::FarExplosion => scheduler.play_effect(
                &self.explosion,
                Some(Vec2::new(1500.0, 40.0)),
                tally.options(),
            ),
            Cue::OffAir => scheduler.play_commentary(&self.off_air, None, tally.options()),
            Cue::Replay => scheduler.play_commentary(&self.replay, None, tally.options()),
        }
    }
}

/// Run the timeline and report the final state.
pub fn run(config: &SimConfig) -> Result<Report> {
    let backend = SimBackend::new(config.clip_ms, config.lost_completions.clone());
    let clock = SimClock::new(config.frame_ms);
    let mut scheduler = Scheduler::new(
        config.scheduler.clone(),
        backend,
        clock,
        config.preferences,
    );
    let sounds = Sounds::register(&mut scheduler).context("registering sounds")?;
    let tally = Tally::default();

    info!(
        "Simulating {} frames of {}ms",
        config.frames, config.frame_ms
    );
    for frame in 0..config.frames {
        for &(_, cue) in TIMELINE.iter().filter(|(at, _)| *at == frame) {
            sounds.cue(&mut scheduler, cue, &tally);
        }

        scheduler.clock_mut().step();
        let (game_ms, paused) = (scheduler.clock().game_ms(), scheduler.clock().is_paused());
        scheduler.backend_mut().tick(game_ms, paused);
        scheduler.update();
    }

    let report = Report {
        frames: config.frames,
        wall_ms: scheduler.clock().wall_ms(),
        requested: tally.requested.get(),
        played: tally.played.get(),
        skipped: tally.skipped.get(),
        engine_plays: scheduler.backend().plays,
        lost_completions: scheduler.backend().lost,
        live_instances: scheduler.backend().live_count(),
        commentary: scheduler.commentary_diagnostics(),
    };
    info!(
        "{} requests: {} played, {} skipped",
        report.requested, report.played, report.skipped
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use salvo_audio::ChannelState;

    #[test]
    fn test_default_run_reports_stuck_channel() {
        let report = run(&SimConfig::default()).expect("run");

        assert!(report.commentary.stuck);
        assert_eq!(report.commentary.state, ChannelState::Draining);
        assert!(report.lost_completions >= 1);
        assert!(report.played > 0);
        assert!(report.skipped > 0);
    }

    #[test]
    fn test_run_settles_without_lost_completions() {
        let config = SimConfig {
            frames: 2000,
            lost_completions: Vec::new(),
            ..SimConfig::default()
        };
        let report = run(&config).expect("run");

        assert_eq!(report.commentary.state, ChannelState::Idle);
        assert!(report.commentary.queued.is_empty());
        assert_eq!(report.played + report.skipped, report.requested);
        assert_eq!(report.live_instances, 0);
    }
}
