//! Per-asset throttling shared by every queue.
//!
//! Throttling is global per asset locator: the immediate queue, the
//! commentary queue and the bypass path all read and write the same ledger.

use ahash::AHashMap;
use salvo_common::Millis;

#[derive(Debug, Clone, Copy)]
struct Stamp {
    at: Millis,
    /// Largest window any play of this locator was checked against.
    window_ms: Millis,
}

/// Last-played timestamps keyed by asset locator.
#[derive(Debug, Default)]
pub struct ThrottleLedger {
    last_played: AHashMap<String, Stamp>,
    registered: AHashMap<String, Millis>,
}

impl ThrottleLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `url` played less than `window_ms` before `now`.
    ///
    /// A zero window never throttles.
    #[must_use]
    pub fn is_throttled(&self, url: &str, window_ms: Millis, now: Millis) -> bool {
        if window_ms == 0 {
            return false;
        }
        self.last_played
            .get(url)
            .is_some_and(|last| now.saturating_sub(last.at) < window_ms)
    }

    /// Record that `url` started playing at `now` under a `window_ms`
    /// throttle window.
    ///
    /// The entry remembers the largest window seen for the locator so it is
    /// never pruned while some descriptor could still be throttled by it.
    pub fn record(&mut self, url: &str, now: Millis, window_ms: Millis) {
        if let Some(last) = self.last_played.get_mut(url) {
            last.at = now;
            last.window_ms = last.window_ms.max(window_ms);
        } else {
            self.last_played
                .insert(url.to_string(), Stamp { at: now, window_ms });
        }
    }

    /// Note a registered window for `url`. Plays of the locator are kept at
    /// least this long, whichever descriptor started them.
    pub fn reserve(&mut self, url: &str, window_ms: Millis) {
        if let Some(window) = self.registered.get_mut(url) {
            *window = (*window).max(window_ms);
        } else {
            self.registered.insert(url.to_string(), window_ms);
        }
    }

    /// Last play time for `url`.
    #[must_use]
    pub fn last_played(&self, url: &str) -> Option<Millis> {
        self.last_played.get(url).map(|last| last.at)
    }

    /// Drop entries older than `retention_ms` and every window that could
    /// still throttle them.
    pub fn prune(&mut self, now: Millis, retention_ms: Millis) {
        let registered = &self.registered;
        self.last_played.retain(|url, last| {
            let reserved = registered.get(url).copied().unwrap_or(0);
            let keep_for = retention_ms.max(last.window_ms).max(reserved);
            now.saturating_sub(last.at) < keep_for
        });
    }

    /// Number of tracked locators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.last_played.len()
    }

    /// Check if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last_played.is_empty()
    }
}
