//! Fixed-window request limiter keyed by client identity.
//!
//! A window opens on the first request seen for a key and lasts `window`.
//! Up to `max_requests` requests are admitted inside it; the rest are
//! rejected until the window closes and the next request opens a new one.
//! The clock is passed in so callers (and tests) control time.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default window length: 15 minutes.
pub const DEFAULT_WINDOW_SECS: u64 = 15 * 60;

/// Default number of requests admitted per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 100;

/// Outcome of a single [`FixedWindowLimiter::check`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request is admitted.
    pub allowed: bool,
    /// Configured requests per window.
    pub limit: u32,
    /// Requests still available in the current window.
    pub remaining: u32,
    /// Time until the current window closes.
    pub reset_after: Duration,
}

impl RateDecision {
    /// Whole seconds until reset, rounded up so clients never retry early.
    pub fn reset_after_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        if self.reset_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: Instant,
    count: u32,
}

/// Thread-safe fixed-window limiter.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    window: Duration,
    max_requests: u32,
    windows: Mutex<HashMap<String, Window>>,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Record one request for `key` at `now` and decide whether it is admitted.
    pub fn check(&self, key: &str, now: Instant) -> RateDecision {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let entry = windows.entry(key.to_string()).or_insert(Window {
            started_at: now,
            count: 0,
        });

        if now.saturating_duration_since(entry.started_at) >= self.window {
            entry.started_at = now;
            entry.count = 0;
        }

        let allowed = entry.count < self.max_requests;
        if allowed {
            entry.count += 1;
        }

        let elapsed = now.saturating_duration_since(entry.started_at);
        RateDecision {
            allowed,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(entry.count),
            reset_after: self.window.saturating_sub(elapsed),
        }
    }

    /// Drop every window that has closed by `now`. Returns how many were removed.
    pub fn prune(&self, now: Instant) -> usize {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = windows.len();
        windows.retain(|_, w| now.saturating_duration_since(w.started_at) < self.window);
        before - windows.len()
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_WINDOW_SECS),
            DEFAULT_MAX_REQUESTS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32) -> FixedWindowLimiter {
        FixedWindowLimiter::new(Duration::from_secs(60), max)
    }

    #[test]
    fn admits_up_to_the_limit_then_rejects() {
        let limiter = limiter(3);
        let t0 = Instant::now();

        for expected_remaining in [2, 1, 0] {
            let d = limiter.check("10.0.0.1", t0);
            assert!(d.allowed);
            assert_eq!(d.remaining, expected_remaining);
        }

        let rejected = limiter.check("10.0.0.1", t0 + Duration::from_secs(5));
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
        assert_eq!(rejected.reset_after, Duration::from_secs(55));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = limiter(1);
        let t0 = Instant::now();
        assert!(limiter.check("a", t0).allowed);
        assert!(!limiter.check("a", t0).allowed);
        assert!(limiter.check("b", t0).allowed);
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = limiter(1);
        let t0 = Instant::now();
        assert!(limiter.check("a", t0).allowed);
        assert!(!limiter.check("a", t0 + Duration::from_secs(59)).allowed);

        let fresh = limiter.check("a", t0 + Duration::from_secs(60));
        assert!(fresh.allowed);
        assert_eq!(fresh.reset_after, Duration::from_secs(60));
    }

    #[test]
    fn rejected_requests_do_not_extend_the_window() {
        let limiter = limiter(1);
        let t0 = Instant::now();
        limiter.check("a", t0);
        for s in 1..60 {
            limiter.check("a", t0 + Duration::from_secs(s));
        }
        assert!(limiter.check("a", t0 + Duration::from_secs(60)).allowed);
    }

    #[test]
    fn prune_removes_only_closed_windows() {
        let limiter = limiter(5);
        let t0 = Instant::now();
        limiter.check("old", t0);
        limiter.check("new", t0 + Duration::from_secs(30));

        let removed = limiter.prune(t0 + Duration::from_secs(61));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn reset_after_secs_rounds_up() {
        let d = RateDecision {
            allowed: true,
            limit: 1,
            remaining: 0,
            reset_after: Duration::from_millis(1500),
        };
        assert_eq!(d.reset_after_secs(), 2);
    }

    #[test]
    fn default_is_fifteen_minutes_and_one_hundred_requests() {
        let limiter = FixedWindowLimiter::default();
        assert_eq!(limiter.window(), Duration::from_secs(900));
        assert_eq!(limiter.max_requests(), 100);
    }
}
