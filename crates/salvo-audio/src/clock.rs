//! Time sources.
//!
//! The scheduler reads two clocks: wall time, which keeps running while the
//! game is paused, and game time, which only advances with unpaused frames.
//! Throttling and staleness use wall time; sequence gaps use game time.

use std::time::Instant;

use salvo_common::Millis;

/// Clock capability injected into the scheduler.
pub trait Clock {
    /// Milliseconds of wall time. Never pauses.
    fn wall_ms(&self) -> Millis;

    /// Milliseconds of game time. Frozen while paused.
    fn game_ms(&self) -> Millis;

    /// Whether the game loop is paused.
    fn is_paused(&self) -> bool;
}

/// Clock backed by [`Instant`], with pause tracking driven by the host.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
    paused_at: Option<Millis>,
    paused_total: Millis,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    /// Create a clock starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            paused_at: None,
            paused_total: 0,
        }
    }

    /// Pause or resume game time.
    pub fn set_paused(&mut self, paused: bool) {
        let now = self.wall_ms();
        match (paused, self.paused_at) {
            (true, None) => self.paused_at = Some(now),
            (false, Some(since)) => {
                self.paused_total += now.saturating_sub(since);
                self.paused_at = None;
            },
            _ => {},
        }
    }
}

impl Clock for SystemClock {
    fn wall_ms(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }

    fn game_ms(&self) -> Millis {
        let end = self.paused_at.unwrap_or_else(|| self.wall_ms());
        end.saturating_sub(self.paused_total)
    }

    fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_pause_freezes_game_time() {
        let mut clock = SystemClock::new();
        clock.set_paused(true);
        assert!(clock.is_paused());

        let frozen = clock.game_ms();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(clock.game_ms(), frozen);
        assert!(clock.wall_ms() >= frozen + 5);

        clock.set_paused(false);
        assert!(!clock.is_paused());
        assert!(clock.game_ms() <= clock.wall_ms());
    }

    #[test]
    fn test_system_clock_double_pause_is_noop() {
        let mut clock = SystemClock::new();
        clock.set_paused(true);
        clock.set_paused(true);
        clock.set_paused(false);
        clock.set_paused(false);
        assert!(!clock.is_paused());
    }
}
