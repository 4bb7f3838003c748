//! Per-credential quota ledger
//!
//! Tracks units consumed against a fixed budget over a rolling window. The
//! window is measured from the first use after the last reset, not from
//! wall-clock midnight, so a run started mid-day still gets a full window.

use std::time::{Duration, Instant};

/// Tracks consumed quota units for one credential
#[derive(Debug, Clone)]
pub struct QuotaLedger {
    /// Units allowed per window
    budget: u64,

    /// Length of the rolling window
    window: Duration,

    /// Units consumed since the window started
    consumed: u64,

    /// Start of the current window; None until the first debit after a reset
    window_start: Option<Instant>,
}

impl QuotaLedger {
    /// Creates a ledger with the given budget and window length
    pub fn new(budget: u64, window: Duration) -> Self {
        Self {
            budget,
            window,
            consumed: 0,
            window_start: None,
        }
    }

    /// Records `cost` units as spent, starting the window on first use
    ///
    /// Consumed units are monotonically non-decreasing within a window.
    pub fn debit(&mut self, cost: u64) {
        if self.window_start.is_none() {
            self.window_start = Some(Instant::now());
        }
        self.consumed = self.consumed.saturating_add(cost);
    }

    /// Returns true if spending `cost` more units would exceed the budget
    ///
    /// Performs a lazy reset first: if the window has elapsed, the counter
    /// goes back to zero before the check.
    pub fn would_exceed(&mut self, cost: u64) -> bool {
        self.maybe_reset();
        self.consumed.saturating_add(cost) > self.budget
    }

    /// Units consumed in the current window
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Time remaining until the current window resets
    ///
    /// Zero when no window has started or the window has already elapsed.
    pub fn time_until_reset(&self) -> Duration {
        match self.window_start {
            Some(start) => self.window.saturating_sub(start.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Marks the entire budget as spent
    ///
    /// Used when the upstream reports quota exhaustion that the local
    /// estimate missed; upstream truth wins.
    pub fn saturate(&mut self) {
        if self.window_start.is_none() {
            self.window_start = Some(Instant::now());
        }
        self.consumed = self.budget;
    }

    /// Resets the window if it has fully elapsed
    ///
    /// Returns true if a reset happened.
    pub fn maybe_reset(&mut self) -> bool {
        if let Some(start) = self.window_start {
            if start.elapsed() >= self.window {
                self.consumed = 0;
                self.window_start = None;
                return true;
            }
        }
        false
    }
}
