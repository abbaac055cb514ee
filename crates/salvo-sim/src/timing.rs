//! Simulated frame clock.

use salvo_audio::Clock;
use salvo_common::Millis;

/// Fixed-step clock. Game time only moves while the game runs.
#[derive(Debug, Clone, Copy)]
pub struct SimClock {
    frame_ms: Millis,
    wall_ms: Millis,
    game_ms: Millis,
    paused: bool,
}

impl SimClock {
    /// Clock at zero stepping `frame_ms` per frame.
    pub const fn new(frame_ms: Millis) -> Self {
        Self {
            frame_ms,
            wall_ms: 0,
            game_ms: 0,
            paused: false,
        }
    }

    /// Advance one frame.
    pub fn step(&mut self) {
        self.wall_ms += self.frame_ms;
        if !self.paused {
            self.game_ms += self.frame_ms;
        }
    }

    /// Pause or resume the game.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }
}

impl Clock for SimClock {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_freezes_game_time() {
        let mut clock = SimClock::new(16);
        clock.step();
        clock.set_paused(true);
        clock.step();
        clock.step();

        assert_eq!(clock.wall_ms(), 48);
        assert_eq!(clock.game_ms(), 16);
        assert!(clock.is_paused());
    }
}
