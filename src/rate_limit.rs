//! Fixed-window request limiter keyed by caller identity.
//!
//! Entries are never swept: an expired window is replaced the next time its
//! caller shows up.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    resets_at: Duration,
}

/// Process-wide request counter.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    /// Allow `max_requests` per caller within each `window`.
    #[must_use]
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self { window, max_requests, windows: Mutex::new(HashMap::new()) }
    }

    /// Count a request from `caller` at time `now` and report whether it is allowed.
    ///
    /// A limit of zero disables limiting.
    pub fn admit(&self, caller: &str, now: Duration) -> bool {
        if self.max_requests == 0 {
            return true;
        }
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        match windows.get_mut(caller) {
            Some(entry) if now <= entry.resets_at => {
                entry.count = entry.count.saturating_add(1);
                entry.count <= self.max_requests
            }
            _ => {
                windows.insert(
                    caller.to_string(),
                    Window { count: 1, resets_at: now + self.window },
                );
                true
            }
        }
    }

    /// Number of callers currently tracked.
    #[cfg(test)]
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
