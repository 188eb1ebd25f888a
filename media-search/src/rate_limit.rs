//! Single fixed-window call budget for the search endpoint.
//!
//! A slot is reserved before the request goes out and released again if the
//! request fails, so the counter reflects successful calls plus calls still in
//! flight and can never exceed the per-window maximum.

use std::time::Duration;

use tokio::time::Instant;

use crate::SearchError;

#[derive(Debug)]
pub struct RateLimitState {
    call_count: u32,
    window_start: Instant,
    /// Bumped whenever the window resets so stale reservations are ignored.
    window_generation: u64,
    max_calls_per_window: u32,
    window_duration: Duration,
}

/// A reserved slot in the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    window_generation: u64,
}

impl RateLimitState {
    pub fn new(max_calls_per_window: u32, window_duration: Duration) -> Self {
        Self {
            call_count: 0,
            window_start: Instant::now(),
            window_generation: 0,
            max_calls_per_window,
            window_duration,
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count
    }

    /// Resets the window if it has elapsed, then reserves one call or fails
    /// with [`SearchError::RateLimited`].
    pub fn reserve(&mut self, now: Instant) -> Result<Reservation, SearchError> {
        if now.saturating_duration_since(self.window_start) > self.window_duration {
            tracing::debug!(
                previous_count = self.call_count,
                "search rate limit window elapsed; resetting"
            );
            self.call_count = 0;
            self.window_start = now;
            self.window_generation += 1;
        }

        if self.call_count >= self.max_calls_per_window {
            return Err(SearchError::RateLimited {
                max_calls: self.max_calls_per_window,
                window_secs: self.window_duration.as_secs(),
            });
        }

        self.call_count += 1;
        Ok(Reservation {
            window_generation: self.window_generation,
        })
    }

    /// Gives back a reservation whose call did not succeed.
    pub fn release(&mut self, reservation: Reservation) {
        if reservation.window_generation == self.window_generation {
            self.call_count = self.call_count.saturating_sub(1);
        }
    }
}
