//! Delayed actions on the frame clock and the wall clock.
//!
//! Frame timers are due against game time and therefore stall while the game
//! is paused. Wall timers are due against wall time and keep running. Both are
//! evaluated on every scheduler update; nothing here spawns threads.

use salvo_common::Millis;

/// Which clock a timer is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerClock {
    /// Game time; suspended while paused.
    Frame,
    /// Wall time; unaffected by pause.
    Wall,
}

/// Handle for cancelling a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Timer<A> {
    id: TimerId,
    clock: TimerClock,
    due: Millis,
    action: A,
}

/// Pending delayed actions.
#[derive(Debug)]
pub struct TimerQueue<A> {
    timers: Vec<Timer<A>>,
    next_id: u64,
}

impl<A> Default for TimerQueue<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> TimerQueue<A> {
    /// Create an empty timer queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timers: Vec::new(),
            next_id: 0,
        }
    }

    /// Schedule an action at an absolute time on the given clock.
    pub fn schedule(&mut self, clock: TimerClock, due: Millis, action: A) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer {
            id,
            clock,
            due,
            action,
        });
        id
    }

    /// Cancel a timer. Returns its action if it was still pending.
    pub fn cancel(&mut self, id: TimerId) -> Option<A> {
        let pos = self.timers.iter().position(|t| t.id == id)?;
        Some(self.timers.remove(pos).action)
    }

    /// Remove and return every due action, earliest first.
    ///
    /// Ties keep scheduling order.
    pub fn take_due(&mut self, game_now: Millis, wall_now: Millis) -> Vec<A> {
        let is_due = |t: &Timer<A>| match t.clock {
            TimerClock::Frame => t.due <= game_now,
            TimerClock::Wall => t.due <= wall_now,
        };

        if !self.timers.iter().any(is_due) {
            return Vec::new();
        }

        let (mut due, pending): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.timers).into_iter().partition(is_due);
        self.timers = pending;

        due.sort_by_key(|t| (t.due, t.id.0));
        due.into_iter().map(|t| t.action).collect()
    }

    /// Number of pending timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Check if no timers are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
