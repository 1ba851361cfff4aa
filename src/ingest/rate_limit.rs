// src/ingest/rate_limit.rs
//! Fixed-window call budget, one instance per source, shared by every
//! category fetch of that source within a run.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug)]
pub struct FixedWindowLimiter {
    state: Mutex<WindowState>,
    max_calls: u32,
    window_secs: u64,
}

#[derive(Debug)]
struct WindowState {
    window_start: u64,
    count: u32,
}

impl FixedWindowLimiter {
    pub fn new(max_calls: u32, window_secs: u64) -> Self {
        Self {
            state: Mutex::new(WindowState {
                window_start: now_unix(),
                count: 0,
            }),
            max_calls,
            window_secs,
        }
    }

    /// Claim one call against the current window. `false` means the budget
    /// is spent; the caller skips the call entirely.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(now_unix())
    }

    /// Clock-injected variant so window expiry is testable without sleeping.
    pub fn try_acquire_at(&self, now: u64) -> bool {
        let mut state = self.state.lock().expect("rate limiter mutex poisoned");
        if now.saturating_sub(state.window_start) >= self.window_secs {
            state.window_start = now;
            state.count = 0;
        }
        if state.count >= self.max_calls {
            return false;
        }
        state.count += 1;
        true
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
