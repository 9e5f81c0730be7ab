use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_REQUESTS: u32 = 10;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

#[derive(Debug, Default)]
struct WindowState {
    index: u64,
    counts: HashMap<String, u32>,
}

/// Counts requests per client inside discrete, non-overlapping windows.
///
/// Only the current window is retained: counters from earlier windows are
/// dropped as soon as a request lands in a new one, so memory is bounded by
/// the number of distinct clients seen within a single window.
#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    max_requests: u32,
    window: Duration,
    origin: Instant,
    state: Mutex<WindowState>,
}

impl Default for FixedWindowRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

impl FixedWindowRateLimiter {
    /// A zero-length window is treated as one millisecond.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window: window.max(Duration::from_millis(1)),
            origin: Instant::now(),
            state: Mutex::new(WindowState::default()),
        }
    }

    pub fn check(&self, client: &str) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> RateDecision {
        let elapsed = now.saturating_duration_since(self.origin);
        let window_millis = self.window.as_millis().max(1);
        let index = (elapsed.as_millis() / window_millis) as u64;

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.index != index {
            state.index = index;
            state.counts.clear();
        }

        let count = state.counts.entry(client.to_string()).or_insert(0);
        *count = count.saturating_add(1);

        if *count > self.max_requests {
            let window_end =
                Duration::from_millis(((u128::from(index) + 1) * window_millis) as u64);
            RateDecision::Limited {
                retry_after: window_end.saturating_sub(elapsed),
            }
        } else {
            RateDecision::Allowed {
                remaining: self.max_requests - *count,
            }
        }
    }

    pub fn tracked_clients(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .counts
            .len()
    }
}
